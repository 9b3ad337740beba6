use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::conversation::{self, model::Conversation, model::LastMessage};
use crate::user::{self, model::UserDto};

/// One row of a user's inbox, computed per request.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    conversation_id: conversation::Id,
    /// `None` when the other participant's account is gone.
    other_user: Option<UserDto>,
    last_message: Option<LastMessage>,
    unread_count: i64,
    pinned: bool,
    muted: bool,
    updated_at: DateTime<Utc>,
}

impl InboxEntry {
    pub fn new(c: &Conversation, owner: &user::Id, other_user: Option<UserDto>, unread_count: i64) -> Self {
        Self {
            conversation_id: *c.id(),
            other_user,
            last_message: c.last_message(),
            unread_count,
            pinned: c.is_pinned_for(owner),
            muted: c.is_muted_for(owner),
            updated_at: *c.updated_at(),
        }
    }

    pub const fn conversation_id(&self) -> &conversation::Id {
        &self.conversation_id
    }

    pub const fn other_user(&self) -> Option<&UserDto> {
        self.other_user.as_ref()
    }

    pub const fn unread_count(&self) -> i64 {
        self.unread_count
    }
}
