use async_trait::async_trait;

use crate::event;

use super::model::{Presence, UserDto};
use super::{Id, Repository};

#[async_trait]
pub trait UserService {
    async fn find_one(&self, id: &Id) -> super::Result<UserDto>;

    async fn check_exists(&self, id: &Id) -> super::Result<()>;

    async fn presence(&self, id: &Id) -> super::Result<Presence>;
}

#[derive(Clone)]
pub struct UserServiceImpl {
    repo: Repository,
    event_service: event::Service,
}

impl UserServiceImpl {
    pub fn new(repo: Repository, event_service: event::Service) -> Self {
        Self {
            repo,
            event_service,
        }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn find_one(&self, id: &Id) -> super::Result<UserDto> {
        self.repo
            .find_by_id(id)?
            .map(UserDto::from)
            .ok_or(super::Error::NotFound(*id))
    }

    async fn check_exists(&self, id: &Id) -> super::Result<()> {
        if self.repo.exists(id)? {
            Ok(())
        } else {
            Err(super::Error::NotFound(*id))
        }
    }

    async fn presence(&self, id: &Id) -> super::Result<Presence> {
        self.check_exists(id).await?;
        let online = self.event_service.is_online(id).await;
        Ok(Presence::new(*id, online))
    }
}
