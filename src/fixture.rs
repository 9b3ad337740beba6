//! In-memory collaborators for service tests.

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::attachment::{self, storage::FileStorage};
use crate::conversation::model::{Conversation, LastMessage, NewConversation};
use crate::conversation::repository::ConversationRepository;
use crate::conversation::{self, Flag, Scope};
use crate::event::gateway::Hub;
use crate::event::service::EventService;
use crate::event::{ConnectionId, QUEUE_CAPACITY};
use crate::message::model::{Message, Reaction};
use crate::message::repository::MessageRepository;
use crate::message;
use crate::notification::model::Notification;
use crate::notification::repository::NotificationRepository;
use crate::notification;
use crate::paging::Page;
use crate::user::model::User;
use crate::user::repository::UserRepository;
use crate::user::{self, Role};

pub fn user(name: &str) -> User {
    let id = user::Id::random();
    User::new(
        id,
        name,
        format!("{}.{id}@example.com", name.to_lowercase()),
        Role::SolutionProvider,
        None,
    )
}

/// Registers a connection and joins it to the user's room.
pub async fn joined(hub: &Hub, user: &user::Id) -> (ConnectionId, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let conn = hub.connect(tx).await;
    hub.join(&conn, user).await;
    (conn, rx)
}

/// Everything delivered so far, parsed.
pub fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<serde_json::Value> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}

fn paged<T>(items: impl Iterator<Item = T>, page: &Page) -> Vec<T> {
    items
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect()
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<user::Id, User>>,
}

impl InMemoryUserRepository {
    pub fn add(&self, u: User) -> User {
        self.users.lock().unwrap().insert(*u.id(), u.clone());
        u
    }
}

impl UserRepository for InMemoryUserRepository {
    fn find_by_id(&self, id: &user::Id) -> Result<Option<User>, user::Error> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }

    fn exists(&self, id: &user::Id) -> Result<bool, user::Error> {
        Ok(self.users.lock().unwrap().contains_key(id))
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: Mutex<Vec<Conversation>>,
}

fn same_pair(c: &Conversation, members: &[user::Id; 2], scope: &Scope) -> bool {
    let [a, b] = members;
    c.has_member(a) && c.has_member(b) && c.scope().eq(scope)
}

impl ConversationRepository for InMemoryConversationRepository {
    fn find_by_id(&self, id: &conversation::Id) -> Result<Option<Conversation>, conversation::Error> {
        let conversations = self.conversations.lock().unwrap();
        Ok(conversations.iter().find(|c| c.id().eq(id)).cloned())
    }

    fn find_by_members(
        &self,
        members: &[user::Id; 2],
        scope: &Scope,
    ) -> Result<Option<Conversation>, conversation::Error> {
        let conversations = self.conversations.lock().unwrap();
        Ok(conversations
            .iter()
            .find(|c| same_pair(c, members, scope))
            .cloned())
    }

    fn insert(&self, c: &NewConversation) -> Result<bool, conversation::Error> {
        let mut conversations = self.conversations.lock().unwrap();
        if conversations
            .iter()
            .any(|existing| same_pair(existing, &c.members(), &c.scope()))
        {
            return Ok(false);
        }
        conversations.push(Conversation::from(c));
        Ok(true)
    }

    fn find_by_member(
        &self,
        member: &user::Id,
        page: &Page,
    ) -> Result<Vec<Conversation>, conversation::Error> {
        let mut found: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.has_member(member))
            .cloned()
            .collect();

        let last_at = |c: &Conversation| c.last_message().map(|l| *l.created_at());
        found.sort_by(|a, b| match (last_at(a), last_at(b)) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.updated_at().cmp(a.updated_at()),
        });

        Ok(paged(found.into_iter(), page))
    }

    fn update_last_message(
        &self,
        id: &conversation::Id,
        last: &LastMessage,
    ) -> Result<bool, conversation::Error> {
        let mut conversations = self.conversations.lock().unwrap();
        Ok(conversations
            .iter_mut()
            .find(|c| c.id().eq(id))
            .is_some_and(|c| c.apply_last_message(last)))
    }

    fn toggle_flag(
        &self,
        id: &conversation::Id,
        flag: Flag,
        member: &user::Id,
    ) -> Result<Option<Conversation>, conversation::Error> {
        let mut conversations = self.conversations.lock().unwrap();
        Ok(conversations.iter_mut().find(|c| c.id().eq(id)).map(|c| {
            c.toggle(flag, member);
            c.clone()
        }))
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<Message>>,
}

impl InMemoryMessageRepository {
    fn modify<T>(
        &self,
        id: &message::Id,
        f: impl FnOnce(&mut Message) -> T,
    ) -> Result<T, message::Error> {
        let mut messages = self.messages.lock().unwrap();
        messages
            .iter_mut()
            .find(|m| m.id().eq(id))
            .map(f)
            .ok_or(message::Error::NotFound(*id))
    }

    fn newest_first(&self, keep: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut found: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| keep(m))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at().cmp(a.created_at()));
        found
    }
}

impl MessageRepository for InMemoryMessageRepository {
    fn insert(&self, m: &Message) -> Result<(), message::Error> {
        self.messages.lock().unwrap().push(m.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &message::Id) -> Result<Option<Message>, message::Error> {
        let messages = self.messages.lock().unwrap();
        Ok(messages.iter().find(|m| m.id().eq(id)).cloned())
    }

    fn find_by_conversation(
        &self,
        conversation_id: &conversation::Id,
        viewer: &user::Id,
        page: &Page,
    ) -> Result<Vec<Message>, message::Error> {
        let found = self.newest_first(|m| {
            m.conversation_id().eq(conversation_id) && m.is_visible_to(viewer)
        });
        let mut page = paged(found.into_iter(), page);
        page.reverse();
        Ok(page)
    }

    fn mark_many_as_read(
        &self,
        conversation_id: &conversation::Id,
        receiver: &user::Id,
        at: DateTime<Utc>,
    ) -> Result<usize, message::Error> {
        let mut messages = self.messages.lock().unwrap();
        Ok(messages
            .iter_mut()
            .filter(|m| m.conversation_id().eq(conversation_id) && m.receiver().eq(receiver))
            .filter_map(|m| m.mark_read(at).then_some(()))
            .count())
    }

    fn mark_one_as_read(
        &self,
        id: &message::Id,
        receiver: &user::Id,
        at: DateTime<Utc>,
    ) -> Result<(Message, bool), message::Error> {
        let mut messages = self.messages.lock().unwrap();
        let m = messages
            .iter_mut()
            .find(|m| m.id().eq(id) && m.receiver().eq(receiver))
            .ok_or(message::Error::NotFound(*id))?;
        let changed = m.mark_read(at);
        Ok((m.clone(), changed))
    }

    fn update_content(&self, m: &Message) -> Result<(), message::Error> {
        self.modify(m.id(), |stored| *stored = m.clone())
    }

    fn delete_for(&self, id: &message::Id, user: &user::Id) -> Result<(), message::Error> {
        self.modify(id, |m| {
            m.delete_for(user);
        })
    }

    fn toggle_reaction(
        &self,
        id: &message::Id,
        user: &user::Id,
        emoji: &str,
    ) -> Result<Vec<Reaction>, message::Error> {
        self.modify(id, |m| {
            m.toggle_reaction(user, emoji);
            m.reactions().to_vec()
        })
    }

    fn search(
        &self,
        user: &user::Id,
        query: &str,
        page: &Page,
    ) -> Result<Vec<Message>, message::Error> {
        let query = query.to_lowercase();
        let found = self.newest_first(|m| {
            m.is_participant(user)
                && m.is_visible_to(user)
                && m.text().is_some_and(|t| t.to_lowercase().contains(&query))
        });
        Ok(paged(found.into_iter(), page))
    }

    fn count_unread(&self, user: &user::Id) -> Result<i64, message::Error> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .filter(|m| m.receiver().eq(user) && !m.is_read())
            .count() as i64)
    }

    fn count_unread_in_conversation(
        &self,
        conversation_id: &conversation::Id,
        user: &user::Id,
    ) -> Result<i64, message::Error> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .filter(|m| {
                m.conversation_id().eq(conversation_id) && m.receiver().eq(user) && !m.is_read()
            })
            .count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn for_user(&self, u: &user::Id) -> Vec<Notification> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id().eq(u))
            .cloned()
            .collect()
    }
}

impl NotificationRepository for InMemoryNotificationRepository {
    fn insert(&self, n: &Notification) -> Result<(), notification::Error> {
        self.notifications.lock().unwrap().push(n.clone());
        Ok(())
    }
}

/// File storage backed by a map. Can be told to fail after `n` writes.
#[derive(Default)]
pub struct InMemoryStorage {
    files: Mutex<HashMap<String, Bytes>>,
    writes: AtomicUsize,
    fail_after: Option<usize>,
}

impl InMemoryStorage {
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl FileStorage for InMemoryStorage {
    async fn put(&self, file_name: &str, bytes: &Bytes) -> Result<String, attachment::Error> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| n >= limit) {
            return Err(io::Error::other("disk full").into());
        }

        let key = format!("{n}-{file_name}");
        self.files.lock().unwrap().insert(key.clone(), bytes.clone());
        Ok(key)
    }

    async fn remove(&self, key: &str) -> Result<(), attachment::Error> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    fn url(&self, key: &str) -> String {
        format!("/uploads/{key}")
    }
}
