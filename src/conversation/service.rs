use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, warn};

use crate::event::{self, model::Event};
use crate::paging::Page;
use crate::user;

use super::model::{Conversation, ConversationDto, LastMessage, NewConversation};
use super::{Flag, Id, Repository, Scope};

#[async_trait]
pub trait ConversationService {
    /// Explicit "start conversation": returns the existing conversation for the
    /// pair and scope, creating it when absent.
    async fn start(
        &self,
        me: &user::Id,
        recipient: &user::Id,
        scope: Scope,
    ) -> super::Result<ConversationDto>;

    /// Same dedup semantics as [`ConversationService::start`] without the
    /// participant lookup. The flag is `true` when the conversation was created.
    async fn find_or_create(
        &self,
        initiator: &user::Id,
        recipient: &user::Id,
        scope: Scope,
    ) -> super::Result<(Conversation, bool)>;

    /// Fails with `NotFound` or `NotMember`.
    async fn find_for_member(&self, id: &Id, member: &user::Id) -> super::Result<Conversation>;

    async fn find_one(&self, id: &Id, member: &user::Id) -> super::Result<ConversationDto>;

    async fn find_all(&self, member: &user::Id, page: &Page)
    -> super::Result<Vec<ConversationDto>>;

    async fn update_last_message(&self, id: &Id, last: &LastMessage) -> super::Result<bool>;

    async fn toggle_pin(&self, id: &Id, member: &user::Id) -> super::Result<ConversationDto>;

    async fn toggle_mute(&self, id: &Id, member: &user::Id) -> super::Result<ConversationDto>;
}

#[derive(Clone)]
pub struct ConversationServiceImpl {
    repo: Repository,
    user_service: user::Service,
    event_service: event::Service,
}

impl ConversationServiceImpl {
    pub fn new(repo: Repository, user_service: user::Service, event_service: event::Service) -> Self {
        Self {
            repo,
            user_service,
            event_service,
        }
    }
}

#[async_trait]
impl ConversationService for ConversationServiceImpl {
    async fn start(
        &self,
        me: &user::Id,
        recipient: &user::Id,
        scope: Scope,
    ) -> super::Result<ConversationDto> {
        self.user_service.check_exists(me).await?;
        self.user_service.check_exists(recipient).await?;

        let (conversation, created) = self.find_or_create(me, recipient, scope).await?;
        if !created {
            debug!("reusing conversation {}", conversation.id());
        }

        self.conversation_to_dto(conversation).await
    }

    async fn find_or_create(
        &self,
        initiator: &user::Id,
        recipient: &user::Id,
        scope: Scope,
    ) -> super::Result<(Conversation, bool)> {
        let new = NewConversation::new(*initiator, *recipient, scope)?;
        let (conversation, created) = self.repo.find_or_create(&new)?;

        if created {
            match self.conversation_to_dto(conversation.clone()).await {
                Ok(dto) => {
                    let event = Event::NewConversation(dto);
                    for member in conversation.members() {
                        self.event_service.publish(&member, &event).await;
                    }
                }
                Err(e) => warn!("could not announce conversation {}: {e}", conversation.id()),
            }
        }

        Ok((conversation, created))
    }

    async fn find_for_member(&self, id: &Id, member: &user::Id) -> super::Result<Conversation> {
        let conversation = self
            .repo
            .find_by_id(id)?
            .ok_or(super::Error::NotFound(*id))?;

        if !conversation.has_member(member) {
            return Err(super::Error::NotMember);
        }

        Ok(conversation)
    }

    async fn find_one(&self, id: &Id, member: &user::Id) -> super::Result<ConversationDto> {
        let conversation = self.find_for_member(id, member).await?;
        self.conversation_to_dto(conversation).await
    }

    async fn find_all(
        &self,
        member: &user::Id,
        page: &Page,
    ) -> super::Result<Vec<ConversationDto>> {
        let conversations = self.repo.find_by_member(member, page)?;

        try_join_all(
            conversations
                .into_iter()
                .map(|c| self.conversation_to_dto(c)),
        )
        .await
    }

    async fn update_last_message(&self, id: &Id, last: &LastMessage) -> super::Result<bool> {
        self.repo.update_last_message(id, last)
    }

    async fn toggle_pin(&self, id: &Id, member: &user::Id) -> super::Result<ConversationDto> {
        self.toggle(id, Flag::Pinned, member).await
    }

    async fn toggle_mute(&self, id: &Id, member: &user::Id) -> super::Result<ConversationDto> {
        self.toggle(id, Flag::Muted, member).await
    }
}

impl ConversationServiceImpl {
    async fn toggle(&self, id: &Id, flag: Flag, member: &user::Id) -> super::Result<ConversationDto> {
        self.find_for_member(id, member).await?;

        let conversation = self
            .repo
            .toggle_flag(id, flag, member)?
            .ok_or(super::Error::NotFound(*id))?;

        self.conversation_to_dto(conversation).await
    }

    async fn conversation_to_dto(&self, c: Conversation) -> super::Result<ConversationDto> {
        let [a, b] = c.members();
        let (a, b) = tokio::try_join!(self.user_service.find_one(&a), self.user_service.find_one(&b))?;

        Ok(ConversationDto::new(c, vec![a, b]))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::event::gateway::Hub;
    use crate::fixture::{self, InMemoryConversationRepository, InMemoryUserRepository};
    use crate::user::service::UserServiceImpl;
    use crate::conversation::{ProposalId, TaskId};

    use super::*;

    struct Ctx {
        service: ConversationServiceImpl,
        users: Arc<InMemoryUserRepository>,
        hub: Arc<Hub>,
    }

    fn ctx() -> Ctx {
        let users = Arc::new(InMemoryUserRepository::default());
        let hub = Arc::new(Hub::default());
        let user_service = Arc::new(UserServiceImpl::new(users.clone(), hub.clone()));
        let service = ConversationServiceImpl::new(
            Arc::new(InMemoryConversationRepository::default()),
            user_service,
            hub.clone(),
        );

        Ctx {
            service,
            users,
            hub,
        }
    }

    #[tokio::test]
    async fn should_return_same_conversation_for_repeated_starts() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));

        let first = ctx
            .service
            .start(jora.id(), valera.id(), Scope::default())
            .await
            .unwrap();
        let second = ctx
            .service
            .start(valera.id(), jora.id(), Scope::default())
            .await
            .unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(first.participants()[0].id(), jora.id());
        assert_eq!(first.participants()[1].id(), valera.id());
    }

    #[tokio::test]
    async fn should_separate_conversations_by_scope() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let task = Scope::new(Some(TaskId::random()), Some(ProposalId::random()));

        let plain = ctx
            .service
            .start(jora.id(), valera.id(), Scope::default())
            .await
            .unwrap();
        let scoped = ctx.service.start(jora.id(), valera.id(), task).await.unwrap();
        let again = ctx.service.start(valera.id(), jora.id(), task).await.unwrap();

        assert_ne!(plain.id(), scoped.id());
        assert_eq!(scoped.id(), again.id());
    }

    #[tokio::test]
    async fn should_reject_conversation_with_oneself() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));

        let res = ctx.service.start(jora.id(), jora.id(), Scope::default()).await;

        assert!(matches!(res, Err(super::super::Error::SelfReference)));
    }

    #[tokio::test]
    async fn should_fail_for_unknown_recipient() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));

        let res = ctx
            .service
            .start(jora.id(), &user::Id::random(), Scope::default())
            .await;

        assert!(matches!(
            res,
            Err(super::super::Error::_User(user::Error::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn should_announce_new_conversation_once() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let (_conn, mut rx) = fixture::joined(&ctx.hub, valera.id()).await;

        ctx.service
            .start(jora.id(), valera.id(), Scope::default())
            .await
            .unwrap();
        ctx.service
            .start(jora.id(), valera.id(), Scope::default())
            .await
            .unwrap();

        let events = fixture::drain(&mut rx);
        let announced = events
            .iter()
            .filter(|e| e["event"] == "conversation:new")
            .count();
        assert_eq!(announced, 1);
    }

    #[tokio::test]
    async fn should_forbid_non_members() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let radu = ctx.users.add(fixture::user("Radu"));
        let c = ctx
            .service
            .start(jora.id(), valera.id(), Scope::default())
            .await
            .unwrap();

        let res = ctx.service.find_one(c.id(), radu.id()).await;
        assert!(matches!(res, Err(super::super::Error::NotMember)));

        let res = ctx.service.find_one(&Id::random(), jora.id()).await;
        assert!(matches!(res, Err(super::super::Error::NotFound(_))));
    }

    #[tokio::test]
    async fn should_toggle_pin_for_caller_only() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let c = ctx
            .service
            .start(jora.id(), valera.id(), Scope::default())
            .await
            .unwrap();

        let pinned = ctx.service.toggle_pin(c.id(), jora.id()).await.unwrap();
        assert_eq!(pinned.pinned_for(), &[*jora.id()]);

        let muted = ctx.service.toggle_mute(c.id(), valera.id()).await.unwrap();
        assert_eq!(muted.muted_for(), &[*valera.id()]);
        assert_eq!(muted.pinned_for(), &[*jora.id()]);

        let unpinned = ctx.service.toggle_pin(c.id(), jora.id()).await.unwrap();
        assert!(unpinned.pinned_for().is_empty());
    }

    #[tokio::test]
    async fn should_list_by_latest_message() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let radu = ctx.users.add(fixture::user("Radu"));

        let quiet = ctx
            .service
            .start(jora.id(), valera.id(), Scope::default())
            .await
            .unwrap();
        let active = ctx
            .service
            .start(radu.id(), jora.id(), Scope::default())
            .await
            .unwrap();
        ctx.service
            .update_last_message(
                active.id(),
                &LastMessage::new("hi", *radu.id(), chrono::Utc::now()),
            )
            .await
            .unwrap();

        let list = ctx.service.find_all(jora.id(), &Page::default()).await.unwrap();

        let ids: Vec<_> = list.iter().map(|c| *c.id()).collect();
        assert_eq!(ids, vec![*active.id(), *quiet.id()]);
        assert_eq!(list[0].last_message().unwrap().text(), "hi");
    }
}
