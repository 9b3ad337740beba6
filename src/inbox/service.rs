use async_trait::async_trait;
use futures::future::try_join_all;
use log::debug;
use tokio::task;

use crate::conversation::{self, model::Conversation};
use crate::paging::Page;
use crate::user::{self, model::UserDto};
use crate::message;

use super::model::InboxEntry;

#[async_trait]
pub trait InboxService {
    /// Conversations of `owner` in store order, each with its unread count.
    async fn find(&self, owner: &user::Id, page: &Page) -> super::Result<Vec<InboxEntry>>;
}

#[derive(Clone)]
pub struct InboxServiceImpl {
    conversation_repo: conversation::Repository,
    message_repo: message::Repository,
    user_repo: user::Repository,
}

impl InboxServiceImpl {
    pub fn new(
        conversation_repo: conversation::Repository,
        message_repo: message::Repository,
        user_repo: user::Repository,
    ) -> Self {
        Self {
            conversation_repo,
            message_repo,
            user_repo,
        }
    }
}

#[async_trait]
impl InboxService for InboxServiceImpl {
    async fn find(&self, owner: &user::Id, page: &Page) -> super::Result<Vec<InboxEntry>> {
        let conversations = self.conversation_repo.find_by_member(owner, page)?;
        debug!("building inbox of {owner} from {} conversation(s)", conversations.len());

        let entries = conversations
            .into_iter()
            .map(|c| self.entry(c, *owner))
            .map(task::spawn_blocking);

        try_join_all(entries)
            .await?
            .into_iter()
            .collect()
    }
}

impl InboxServiceImpl {
    /// Blocking work for one conversation, run on the blocking pool so the
    /// per-conversation queries proceed side by side.
    fn entry(
        &self,
        c: Conversation,
        owner: user::Id,
    ) -> impl FnOnce() -> super::Result<InboxEntry> + Send + 'static {
        let message_repo = self.message_repo.clone();
        let user_repo = self.user_repo.clone();

        move || {
            let unread = message_repo.count_unread_in_conversation(c.id(), &owner)?;
            let other_user = match c.other_member(&owner) {
                Some(other) => user_repo.find_by_id(&other)?.map(UserDto::from),
                None => None,
            };

            Ok(InboxEntry::new(&c, &owner, other_user, unread))
        }
    }
}
