use async_trait::async_trait;
use log::debug;

use crate::{conversation, user};

use super::Repository;
use super::model::Notification;

#[async_trait]
pub trait NotificationService {
    async fn notify_new_message(
        &self,
        receiver: &user::Id,
        sender_name: &str,
        conversation_id: &conversation::Id,
    ) -> super::Result<()>;
}

#[derive(Clone)]
pub struct NotificationServiceImpl {
    repo: Repository,
}

impl NotificationServiceImpl {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl NotificationService for NotificationServiceImpl {
    async fn notify_new_message(
        &self,
        receiver: &user::Id,
        sender_name: &str,
        conversation_id: &conversation::Id,
    ) -> super::Result<()> {
        let n = Notification::new_message(*receiver, sender_name, conversation_id);
        self.repo.insert(&n)?;
        debug!("notified {receiver}: {}", n.title());
        Ok(())
    }
}
