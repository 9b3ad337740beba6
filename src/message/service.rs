use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, warn};

use crate::attachment::Ingestor;
use crate::conversation::{self, model::Conversation, model::ConversationSummary};
use crate::event::{self, model::Event};
use crate::notification;
use crate::paging::Page;
use crate::user;

use super::model::{EditMessage, Message, Reaction, SendMessage};
use super::{Id, Repository, Status};

#[async_trait]
pub trait MessageService {
    async fn send(&self, sender: &user::Id, msg: SendMessage) -> super::Result<Message>;

    /// A page of the conversation, oldest first. Opening a conversation is
    /// its read receipt: every unread message addressed to `viewer` is
    /// marked as read.
    async fn fetch(
        &self,
        viewer: &user::Id,
        conversation_id: &conversation::Id,
        page: &Page,
    ) -> super::Result<Vec<Message>>;

    async fn edit(&self, editor: &user::Id, id: &Id, edit: EditMessage) -> super::Result<Message>;

    async fn delete(&self, user: &user::Id, id: &Id) -> super::Result<()>;

    async fn mark_as_read(&self, user: &user::Id, id: &Id) -> super::Result<Message>;

    async fn mark_conversation_as_read(
        &self,
        user: &user::Id,
        conversation_id: &conversation::Id,
    ) -> super::Result<usize>;

    async fn toggle_reaction(
        &self,
        user: &user::Id,
        id: &Id,
        emoji: &str,
    ) -> super::Result<Vec<Reaction>>;

    async fn search(&self, user: &user::Id, query: &str, page: &Page)
    -> super::Result<Vec<Message>>;

    async fn count_unread(&self, user: &user::Id) -> super::Result<i64>;
}

#[derive(Clone)]
pub struct MessageServiceImpl {
    repo: Repository,
    conversation_service: conversation::Service,
    user_service: user::Service,
    event_service: event::Service,
    notification_service: notification::Service,
    ingestor: Ingestor,
}

impl MessageServiceImpl {
    pub fn new(
        repo: Repository,
        conversation_service: conversation::Service,
        user_service: user::Service,
        event_service: event::Service,
        notification_service: notification::Service,
        ingestor: Ingestor,
    ) -> Self {
        Self {
            repo,
            conversation_service,
            user_service,
            event_service,
            notification_service,
            ingestor,
        }
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    async fn send(&self, sender: &user::Id, msg: SendMessage) -> super::Result<Message> {
        if msg.conversation_id.is_none() && msg.receiver_id.is_none() {
            return Err(super::Error::MissingTarget);
        }
        if msg.is_empty() {
            return Err(super::Error::Empty);
        }
        self.ingestor.validate(&msg.uploads)?;

        let mut conversation = self.resolve_conversation(sender, &msg).await?;
        let receiver = conversation
            .other_member(sender)
            .ok_or(conversation::Error::NotMember)?;

        if let Some(reply_to) = &msg.reply_to {
            self.check_reply(reply_to, conversation.id())?;
        }

        let status = if self.event_service.is_online(&receiver).await {
            Status::Delivered
        } else {
            Status::Sent
        };

        let attachments = self.ingestor.ingest(&msg.uploads).await?;
        let urls: Vec<String> = attachments.iter().map(|a| a.url().to_owned()).collect();

        let message = match Message::new(
            *conversation.id(),
            *sender,
            receiver,
            msg.text,
            attachments,
            msg.reply_to,
            status,
        )
        .and_then(|m| self.repo.insert(&m).map(|_| m))
        {
            Ok(m) => m,
            Err(e) => {
                self.ingestor.discard_urls(&urls).await;
                return Err(e);
            }
        };
        debug!("message {} sent to {receiver}", message.id());

        let snapshot = message.snapshot();
        match self
            .conversation_service
            .update_last_message(conversation.id(), &snapshot)
            .await
        {
            Ok(true) => {
                conversation.apply_last_message(&snapshot);
            }
            Ok(false) => debug!("conversation {} already has a later message", conversation.id()),
            Err(e) => error!("failed to update last message of {}: {e}", conversation.id()),
        }

        let event = Event::NewMessage(message.clone());
        self.publish_to_both(&conversation.members(), &event).await;
        self.publish_summaries(&conversation).await;

        if conversation.is_muted_for(&receiver) {
            debug!("{receiver} muted conversation {}", conversation.id());
        } else {
            self.notify(&receiver, sender, conversation.id()).await;
        }

        Ok(message)
    }

    async fn fetch(
        &self,
        viewer: &user::Id,
        conversation_id: &conversation::Id,
        page: &Page,
    ) -> super::Result<Vec<Message>> {
        let conversation = self
            .conversation_service
            .find_for_member(conversation_id, viewer)
            .await?;

        let seen_at = Utc::now();
        let updated = self.repo.mark_many_as_read(conversation_id, viewer, seen_at)?;
        if updated > 0 {
            debug!("{viewer} has seen {updated} message(s) in {conversation_id}");
            if let Some(other) = conversation.other_member(viewer) {
                let event = Event::MessagesSeen {
                    conversation_id: *conversation_id,
                    seen_by: *viewer,
                    seen_at,
                };
                self.event_service.publish(&other, &event).await;
            }
        }

        self.repo.find_by_conversation(conversation_id, viewer, page)
    }

    async fn edit(&self, editor: &user::Id, id: &Id, edit: EditMessage) -> super::Result<Message> {
        let mut message = self.find_visible(id, editor)?;
        if !message.sender().eq(editor) {
            return Err(super::Error::NotSender);
        }

        let added = self.ingestor.ingest(&edit.uploads).await?;
        let added_urls: Vec<String> = added.iter().map(|a| a.url().to_owned()).collect();

        let removed = match message
            .apply_edit(editor, edit.text, &edit.remove_attachments, added)
            .and_then(|removed| self.repo.update_content(&message).map(|_| removed))
        {
            Ok(removed) => removed,
            Err(e) => {
                self.ingestor.discard_urls(&added_urls).await;
                return Err(e);
            }
        };

        let removed_urls: Vec<String> = removed.iter().map(|a| a.url().to_owned()).collect();
        self.ingestor.discard_urls(&removed_urls).await;

        self.refresh_snapshot(&message).await;

        let event = Event::EditedMessage(message.clone());
        self.publish_to_both(&[*message.sender(), *message.receiver()], &event)
            .await;

        Ok(message)
    }

    async fn delete(&self, user: &user::Id, id: &Id) -> super::Result<()> {
        let message = self.find_participant(id, user)?;

        self.repo.delete_for(id, user)?;
        debug!("message {id} deleted for {user}");

        let event = Event::DeletedMessage {
            message_id: *id,
            conversation_id: *message.conversation_id(),
            deleted_by: *user,
        };
        self.publish_to_both(&[*message.sender(), *message.receiver()], &event)
            .await;

        Ok(())
    }

    async fn mark_as_read(&self, user: &user::Id, id: &Id) -> super::Result<Message> {
        let (message, changed) = self.repo.mark_one_as_read(id, user, Utc::now())?;

        if changed {
            if let Some(seen_at) = message.read_at() {
                let event = Event::SeenMessage {
                    message_id: *id,
                    conversation_id: *message.conversation_id(),
                    seen_by: *user,
                    seen_at: *seen_at,
                };
                self.publish_to_both(&[*message.sender(), *message.receiver()], &event)
                    .await;
            }
        }

        Ok(message)
    }

    async fn mark_conversation_as_read(
        &self,
        user: &user::Id,
        conversation_id: &conversation::Id,
    ) -> super::Result<usize> {
        let conversation = self
            .conversation_service
            .find_for_member(conversation_id, user)
            .await?;

        let seen_at = Utc::now();
        let updated = self.repo.mark_many_as_read(conversation_id, user, seen_at)?;

        if updated > 0 {
            let event = Event::MessagesSeen {
                conversation_id: *conversation_id,
                seen_by: *user,
                seen_at,
            };
            self.publish_to_both(&conversation.members(), &event).await;
        }

        Ok(updated)
    }

    async fn toggle_reaction(
        &self,
        user: &user::Id,
        id: &Id,
        emoji: &str,
    ) -> super::Result<Vec<Reaction>> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(super::Error::EmptyEmoji);
        }

        let message = self.find_participant(id, user)?;
        let reactions = self.repo.toggle_reaction(id, user, emoji)?;

        let event = Event::Reaction {
            message_id: *id,
            conversation_id: *message.conversation_id(),
            reactions: reactions.clone(),
        };
        self.publish_to_both(&[*message.sender(), *message.receiver()], &event)
            .await;

        Ok(reactions)
    }

    async fn search(
        &self,
        user: &user::Id,
        query: &str,
        page: &Page,
    ) -> super::Result<Vec<Message>> {
        self.repo.search(user, query.trim(), page)
    }

    async fn count_unread(&self, user: &user::Id) -> super::Result<i64> {
        self.repo.count_unread(user)
    }
}

impl MessageServiceImpl {
    async fn resolve_conversation(
        &self,
        sender: &user::Id,
        msg: &SendMessage,
    ) -> super::Result<Conversation> {
        if let Some(id) = &msg.conversation_id {
            let conversation = match self.conversation_service.find_for_member(id, sender).await {
                Err(conversation::Error::NotMember) => return Err(super::Error::NotParticipant),
                res => res?,
            };
            if msg
                .receiver_id
                .is_some_and(|r| conversation.other_member(sender) != Some(r))
            {
                return Err(super::Error::TargetMismatch);
            }
            return Ok(conversation);
        }

        let receiver = msg.receiver_id.ok_or(super::Error::MissingTarget)?;
        if receiver.eq(sender) {
            return Err(super::Error::SelfMessage);
        }
        self.user_service.check_exists(&receiver).await?;

        let (conversation, _) = self
            .conversation_service
            .find_or_create(sender, &receiver, msg.scope)
            .await?;

        Ok(conversation)
    }

    fn check_reply(&self, reply_to: &Id, conversation_id: &conversation::Id) -> super::Result<()> {
        match self.repo.find_by_id(reply_to)? {
            Some(m) if m.conversation_id().eq(conversation_id) => Ok(()),
            _ => Err(super::Error::ReplyOutsideConversation),
        }
    }

    fn find_participant(&self, id: &Id, user: &user::Id) -> super::Result<Message> {
        let message = self
            .repo
            .find_by_id(id)?
            .ok_or(super::Error::NotFound(*id))?;

        if !message.is_participant(user) {
            return Err(super::Error::NotParticipant);
        }

        Ok(message)
    }

    fn find_visible(&self, id: &Id, user: &user::Id) -> super::Result<Message> {
        let message = self.find_participant(id, user)?;
        if !message.is_visible_to(user) {
            return Err(super::Error::NotFound(*id));
        }
        Ok(message)
    }

    /// Rewrites the conversation preview when the edited message is the one
    /// it shows.
    async fn refresh_snapshot(&self, message: &Message) {
        let conversation_id = message.conversation_id();
        let conversation = match self
            .conversation_service
            .find_for_member(conversation_id, message.sender())
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!("could not load conversation {conversation_id}: {e}");
                return;
            }
        };

        let shows_message = conversation.last_message().is_some_and(|last| {
            last.created_at().eq(message.created_at()) && last.sender().eq(message.sender())
        });
        if !shows_message {
            return;
        }

        if let Err(e) = self
            .conversation_service
            .update_last_message(conversation_id, &message.snapshot())
            .await
        {
            error!("failed to refresh last message of {conversation_id}: {e}");
        }
    }

    async fn publish_to_both(&self, members: &[user::Id], event: &Event) {
        for member in members {
            self.event_service.publish(member, event).await;
        }
    }

    /// Each participant gets its own unread count.
    async fn publish_summaries(&self, conversation: &Conversation) {
        for member in conversation.members() {
            match self
                .repo
                .count_unread_in_conversation(conversation.id(), &member)
            {
                Ok(unread) => {
                    let event = Event::ConversationUpdate(ConversationSummary::new(conversation, unread));
                    self.event_service.publish(&member, &event).await;
                }
                Err(e) => error!("failed to count unread of {member}: {e}"),
            }
        }
    }

    async fn notify(
        &self,
        receiver: &user::Id,
        sender: &user::Id,
        conversation_id: &conversation::Id,
    ) {
        let sender = match self.user_service.find_one(sender).await {
            Ok(sender) => sender,
            Err(e) => {
                warn!("skipping notification for {receiver}: {e}");
                return;
            }
        };

        if let Err(e) = self
            .notification_service
            .notify_new_message(receiver, sender.name(), conversation_id)
            .await
        {
            error!("failed to notify {receiver}: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use bytes::Bytes;
    use serde_json::Value;

    use crate::attachment::{self, Limits, form::Upload};
    use crate::conversation::Scope;
    use crate::conversation::service::ConversationServiceImpl;
    use crate::event::gateway::Hub;
    use crate::fixture::{
        self, InMemoryConversationRepository, InMemoryMessageRepository,
        InMemoryNotificationRepository, InMemoryStorage, InMemoryUserRepository,
    };
    use crate::notification::service::NotificationServiceImpl;
    use crate::user::model::User;
    use crate::user::service::UserServiceImpl;

    use super::super::Error;
    use super::*;

    struct Ctx {
        service: MessageServiceImpl,
        conversations: conversation::Service,
        users: Arc<InMemoryUserRepository>,
        notifications: Arc<InMemoryNotificationRepository>,
        storage: Arc<InMemoryStorage>,
        hub: Arc<Hub>,
    }

    fn ctx() -> Ctx {
        ctx_with(Limits::default())
    }

    fn ctx_with(limits: Limits) -> Ctx {
        let users = Arc::new(InMemoryUserRepository::default());
        let notifications = Arc::new(InMemoryNotificationRepository::default());
        let storage = Arc::new(InMemoryStorage::default());
        let hub = Arc::new(Hub::default());

        let user_service: user::Service = Arc::new(UserServiceImpl::new(users.clone(), hub.clone()));
        let conversations: conversation::Service = Arc::new(ConversationServiceImpl::new(
            Arc::new(InMemoryConversationRepository::default()),
            user_service.clone(),
            hub.clone(),
        ));
        let service = MessageServiceImpl::new(
            Arc::new(InMemoryMessageRepository::default()),
            conversations.clone(),
            user_service,
            hub.clone(),
            Arc::new(NotificationServiceImpl::new(notifications.clone())),
            Ingestor::new(storage.clone(), limits),
        );

        Ctx {
            service,
            conversations,
            users,
            notifications,
            storage,
            hub,
        }
    }

    fn text_to(receiver: &User, text: &str) -> SendMessage {
        SendMessage {
            receiver_id: Some(*receiver.id()),
            text: Some(text.to_owned()),
            ..Default::default()
        }
    }

    fn text_in(conversation_id: &conversation::Id, text: &str) -> SendMessage {
        SendMessage {
            conversation_id: Some(*conversation_id),
            text: Some(text.to_owned()),
            ..Default::default()
        }
    }

    fn named<'a>(events: &'a [Value], name: &str) -> Vec<&'a Value> {
        events.iter().filter(|e| e["event"] == name).collect()
    }

    #[tokio::test]
    async fn should_create_conversation_on_first_message() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));

        let message = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();

        let conversation = ctx
            .conversations
            .find_one(message.conversation_id(), jora.id())
            .await
            .unwrap();
        let participants: Vec<_> = conversation.participants().iter().map(|p| *p.id()).collect();
        assert_eq!(participants, vec![*jora.id(), *valera.id()]);
        assert_eq!(conversation.last_message().unwrap().text(), "hello");
        assert_eq!(message.receiver(), valera.id());
        assert_eq!(ctx.service.count_unread(valera.id()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_reuse_conversation_for_later_messages() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));

        let first = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();
        let second = ctx.service.send(valera.id(), text_to(&jora, "hi")).await.unwrap();

        assert_eq!(first.conversation_id(), second.conversation_id());
    }

    #[tokio::test]
    async fn should_reject_empty_message() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));

        let res = ctx.service.send(jora.id(), text_to(&valera, "  ")).await;

        assert!(matches!(res, Err(Error::Empty)));
        let list = ctx.conversations.find_all(jora.id(), &Page::default()).await.unwrap();
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn should_accept_attachment_only_message() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let msg = SendMessage {
            receiver_id: Some(*valera.id()),
            uploads: vec![Upload::new("cat.png", "image/png", Bytes::from_static(b"png"))],
            ..Default::default()
        };

        let message = ctx.service.send(jora.id(), msg).await.unwrap();

        assert!(message.text().is_none());
        assert_eq!(message.attachments().len(), 1);
        assert_eq!(ctx.storage.len(), 1);
    }

    #[tokio::test]
    async fn should_require_target() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let msg = SendMessage {
            text: Some("hello".into()),
            ..Default::default()
        };

        let res = ctx.service.send(jora.id(), msg).await;

        assert!(matches!(res, Err(Error::MissingTarget)));
    }

    #[tokio::test]
    async fn should_reject_message_to_oneself() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));

        let res = ctx.service.send(jora.id(), text_to(&jora, "me")).await;

        assert!(matches!(res, Err(Error::SelfMessage)));
    }

    #[tokio::test]
    async fn should_forbid_sending_into_foreign_conversation() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let radu = ctx.users.add(fixture::user("Radu"));
        let first = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();

        let res = ctx
            .service
            .send(radu.id(), text_in(first.conversation_id(), "sneaky"))
            .await;

        assert!(matches!(res, Err(Error::NotParticipant)));
    }

    #[tokio::test]
    async fn should_reject_receiver_outside_given_conversation() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let radu = ctx.users.add(fixture::user("Radu"));
        let first = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();

        let mut msg = text_in(first.conversation_id(), "to whom?");
        msg.receiver_id = Some(*radu.id());
        let res = ctx.service.send(jora.id(), msg).await;
        assert!(matches!(res, Err(Error::TargetMismatch)));

        let mut msg = text_in(first.conversation_id(), "to you");
        msg.receiver_id = Some(*valera.id());
        let sent = ctx.service.send(jora.id(), msg).await.unwrap();
        assert_eq!(sent.receiver(), valera.id());
    }

    #[tokio::test]
    async fn should_reject_oversized_upload_without_message() {
        let ctx = ctx_with(Limits::new(5, 16));
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let msg = SendMessage {
            receiver_id: Some(*valera.id()),
            uploads: vec![Upload::new("big.mp4", "video/mp4", Bytes::from(vec![0u8; 20]))],
            ..Default::default()
        };

        let res = ctx.service.send(jora.id(), msg).await;

        assert!(matches!(
            res,
            Err(Error::_Attachment(attachment::Error::FileTooLarge(..)))
        ));
        assert_eq!(ctx.service.count_unread(valera.id()).await.unwrap(), 0);
        assert_eq!(ctx.storage.len(), 0);
    }

    #[tokio::test]
    async fn should_reject_reply_from_other_conversation() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let radu = ctx.users.add(fixture::user("Radu"));
        let elsewhere = ctx.service.send(jora.id(), text_to(&radu, "hey")).await.unwrap();
        let msg = SendMessage {
            reply_to: Some(*elsewhere.id()),
            ..text_to(&valera, "re")
        };

        let res = ctx.service.send(jora.id(), msg).await;

        assert!(matches!(res, Err(Error::ReplyOutsideConversation)));
    }

    #[tokio::test]
    async fn should_publish_to_both_participants() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let (_a, mut jora_rx) = fixture::joined(&ctx.hub, jora.id()).await;
        let (_b, mut valera_rx) = fixture::joined(&ctx.hub, valera.id()).await;

        let message = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();

        let jora_events = fixture::drain(&mut jora_rx);
        let valera_events = fixture::drain(&mut valera_rx);
        assert_eq!(named(&jora_events, "message:new").len(), 1);
        assert_eq!(named(&valera_events, "message:new").len(), 1);
        assert_eq!(named(&valera_events, "message:new")[0]["data"]["text"], "hello");

        let jora_update = named(&jora_events, "conversationUpdate");
        let valera_update = named(&valera_events, "conversationUpdate");
        assert_eq!(jora_update[0]["data"]["unreadCount"], 0);
        assert_eq!(valera_update[0]["data"]["unreadCount"], 1);
        assert_eq!(message.status(), &Status::Delivered);
    }

    #[tokio::test]
    async fn should_mark_offline_receiver_as_sent() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));

        let message = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();

        assert_eq!(message.status(), &Status::Sent);
    }

    #[tokio::test]
    async fn should_notify_receiver_unless_muted() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));

        let first = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();
        assert_eq!(ctx.notifications.for_user(valera.id()).len(), 1);

        ctx.conversations
            .toggle_mute(first.conversation_id(), valera.id())
            .await
            .unwrap();
        ctx.service
            .send(jora.id(), text_in(first.conversation_id(), "again"))
            .await
            .unwrap();

        assert_eq!(ctx.notifications.for_user(valera.id()).len(), 1);
        assert!(ctx.notifications.for_user(jora.id()).is_empty());
    }

    #[tokio::test]
    async fn should_mark_read_on_fetch_and_notify_sender_once() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let first = ctx.service.send(jora.id(), text_to(&valera, "one")).await.unwrap();
        let conversation_id = *first.conversation_id();
        for text in ["two", "three"] {
            ctx.service
                .send(jora.id(), text_in(&conversation_id, text))
                .await
                .unwrap();
        }
        let (_conn, mut jora_rx) = fixture::joined(&ctx.hub, jora.id()).await;

        let messages = ctx
            .service
            .fetch(valera.id(), &conversation_id, &Page::default())
            .await
            .unwrap();

        assert_eq!(messages.len(), 3);
        assert!(messages.iter().all(Message::is_read));
        let texts: Vec<_> = messages.iter().filter_map(Message::text).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);

        let seen = named(&fixture::drain(&mut jora_rx), "messagesSeen")
            .into_iter()
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["data"]["seenBy"], valera.id().to_string());

        ctx.service
            .fetch(valera.id(), &conversation_id, &Page::default())
            .await
            .unwrap();
        assert!(named(&fixture::drain(&mut jora_rx), "messagesSeen").is_empty());
    }

    #[tokio::test]
    async fn should_reset_unread_count_after_reading_conversation() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let first = ctx.service.send(jora.id(), text_to(&valera, "one")).await.unwrap();
        let conversation_id = *first.conversation_id();
        ctx.service
            .send(jora.id(), text_in(&conversation_id, "two"))
            .await
            .unwrap();
        assert_eq!(ctx.service.count_unread(valera.id()).await.unwrap(), 2);

        let updated = ctx
            .service
            .mark_conversation_as_read(valera.id(), &conversation_id)
            .await
            .unwrap();
        let again = ctx
            .service
            .mark_conversation_as_read(valera.id(), &conversation_id)
            .await
            .unwrap();

        assert_eq!((updated, again), (2, 0));
        assert_eq!(ctx.service.count_unread(valera.id()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn should_forbid_fetch_by_outsider() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let radu = ctx.users.add(fixture::user("Radu"));
        let first = ctx.service.send(jora.id(), text_to(&valera, "one")).await.unwrap();

        let res = ctx
            .service
            .fetch(radu.id(), first.conversation_id(), &Page::default())
            .await;

        assert!(matches!(
            res,
            Err(Error::_Conversation(conversation::Error::NotMember))
        ));
    }

    #[tokio::test]
    async fn should_forbid_edit_by_receiver() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let message = ctx.service.send(valera.id(), text_to(&jora, "original")).await.unwrap();

        let res = ctx
            .service
            .edit(
                jora.id(),
                message.id(),
                EditMessage {
                    text: Some("forged".into()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(res, Err(Error::NotSender)));
        let messages = ctx
            .service
            .fetch(valera.id(), message.conversation_id(), &Page::default())
            .await
            .unwrap();
        assert_eq!(messages[0].text(), Some("original"));
        assert!(!messages[0].is_edited());
    }

    #[tokio::test]
    async fn should_edit_and_refresh_preview() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let message = ctx.service.send(jora.id(), text_to(&valera, "helo")).await.unwrap();
        let (_conn, mut valera_rx) = fixture::joined(&ctx.hub, valera.id()).await;

        let edited = ctx
            .service
            .edit(
                jora.id(),
                message.id(),
                EditMessage {
                    text: Some("hello".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.text(), Some("hello"));
        assert!(edited.is_edited());
        let conversation = ctx
            .conversations
            .find_one(message.conversation_id(), jora.id())
            .await
            .unwrap();
        assert_eq!(conversation.last_message().unwrap().text(), "hello");
        assert_eq!(named(&fixture::drain(&mut valera_rx), "message:edited").len(), 1);
    }

    #[tokio::test]
    async fn should_discard_removed_attachment_files() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let msg = SendMessage {
            uploads: vec![Upload::new("cat.png", "image/png", Bytes::from_static(b"png"))],
            ..text_to(&valera, "look")
        };
        let message = ctx.service.send(jora.id(), msg).await.unwrap();
        let url = message.attachments()[0].url().to_owned();

        let edited = ctx
            .service
            .edit(
                jora.id(),
                message.id(),
                EditMessage {
                    remove_attachments: vec![url],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(edited.attachments().is_empty());
        assert_eq!(ctx.storage.len(), 0);
    }

    #[tokio::test]
    async fn should_hide_deleted_message_from_deleter_only() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let message = ctx.service.send(jora.id(), text_to(&valera, "oops")).await.unwrap();
        let conversation_id = *message.conversation_id();

        ctx.service.delete(jora.id(), message.id()).await.unwrap();
        ctx.service.delete(jora.id(), message.id()).await.unwrap();

        let mine = ctx
            .service
            .fetch(jora.id(), &conversation_id, &Page::default())
            .await
            .unwrap();
        let theirs = ctx
            .service
            .fetch(valera.id(), &conversation_id, &Page::default())
            .await
            .unwrap();
        assert!(mine.is_empty());
        assert_eq!(theirs.len(), 1);
    }

    #[tokio::test]
    async fn should_forbid_delete_by_outsider() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let radu = ctx.users.add(fixture::user("Radu"));
        let message = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();

        let res = ctx.service.delete(radu.id(), message.id()).await;

        assert!(matches!(res, Err(Error::NotParticipant)));
    }

    #[tokio::test]
    async fn should_mark_one_as_read_by_receiver_only() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let message = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();
        let (_conn, mut jora_rx) = fixture::joined(&ctx.hub, jora.id()).await;

        let res = ctx.service.mark_as_read(jora.id(), message.id()).await;
        assert!(matches!(res, Err(Error::NotFound(_))));

        let read = ctx.service.mark_as_read(valera.id(), message.id()).await.unwrap();
        let again = ctx.service.mark_as_read(valera.id(), message.id()).await.unwrap();

        assert!(read.is_read());
        assert_eq!(read.status(), &Status::Seen);
        assert_eq!(again.read_at(), read.read_at());
        assert_eq!(named(&fixture::drain(&mut jora_rx), "message:seen").len(), 1);
    }

    #[tokio::test]
    async fn should_toggle_reaction_back_to_original() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let message = ctx.service.send(jora.id(), text_to(&valera, "hello")).await.unwrap();

        let once = ctx
            .service
            .toggle_reaction(valera.id(), message.id(), "👍")
            .await
            .unwrap();
        let twice = ctx
            .service
            .toggle_reaction(valera.id(), message.id(), "👍")
            .await
            .unwrap();

        assert_eq!(once, vec![Reaction::new("👍", *valera.id())]);
        assert!(twice.is_empty());

        let res = ctx.service.toggle_reaction(valera.id(), message.id(), " ").await;
        assert!(matches!(res, Err(Error::EmptyEmoji)));
    }

    #[tokio::test]
    async fn should_search_own_messages() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let radu = ctx.users.add(fixture::user("Radu"));
        ctx.service
            .send(jora.id(), text_to(&valera, "the invoice is ready"))
            .await
            .unwrap();
        ctx.service
            .send(radu.id(), text_to(&valera, "another invoice"))
            .await
            .unwrap();

        let found = ctx
            .service
            .search(jora.id(), "invoice", &Page::default())
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text(), Some("the invoice is ready"));
    }

    #[tokio::test]
    async fn should_scope_conversation_by_task() {
        let ctx = ctx();
        let jora = ctx.users.add(fixture::user("Jora"));
        let valera = ctx.users.add(fixture::user("Valera"));
        let scoped = SendMessage {
            scope: Scope::new(Some(conversation::TaskId::random()), None),
            ..text_to(&valera, "about the task")
        };

        let plain = ctx.service.send(jora.id(), text_to(&valera, "hi")).await.unwrap();
        let task = ctx.service.send(jora.id(), scoped).await.unwrap();

        assert_ne!(plain.conversation_id(), task.conversation_id());
    }
}
