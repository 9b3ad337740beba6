use chrono::{DateTime, Utc};
use diesel::prelude::{Insertable, Queryable, QueryableByName, Selectable};
use serde::Serialize;

use crate::user::{self, model::UserDto};

use super::{Error, Flag, Id, ProposalId, Scope, TaskId};

#[derive(Queryable, QueryableByName, Selectable, Clone, Debug, PartialEq)]
#[diesel(table_name = crate::schema::conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Conversation {
    id: Id,
    initiator: user::Id,
    recipient: user::Id,
    is_task_conversation: bool,
    task_id: Option<TaskId>,
    proposal_id: Option<ProposalId>,
    last_message_text: Option<String>,
    last_message_sender: Option<user::Id>,
    last_message_at: Option<DateTime<Utc>>,
    pinned_for: Vec<user::Id>,
    muted_for: Vec<user::Id>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Conversation {
    pub const fn id(&self) -> &Id {
        &self.id
    }

    /// Participants in display order: initiator first.
    pub const fn members(&self) -> [user::Id; 2] {
        [self.initiator, self.recipient]
    }

    pub fn has_member(&self, u: &user::Id) -> bool {
        self.initiator.eq(u) || self.recipient.eq(u)
    }

    pub fn other_member(&self, u: &user::Id) -> Option<user::Id> {
        if self.initiator.eq(u) {
            Some(self.recipient)
        } else if self.recipient.eq(u) {
            Some(self.initiator)
        } else {
            None
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.task_id, self.proposal_id)
    }

    pub fn last_message(&self) -> Option<LastMessage> {
        match (
            &self.last_message_text,
            self.last_message_sender,
            self.last_message_at,
        ) {
            (Some(text), Some(sender), Some(created_at)) => Some(LastMessage {
                text: text.clone(),
                sender,
                created_at,
            }),
            _ => None,
        }
    }

    pub fn is_muted_for(&self, u: &user::Id) -> bool {
        self.muted_for.contains(u)
    }

    pub fn is_pinned_for(&self, u: &user::Id) -> bool {
        self.pinned_for.contains(u)
    }

    pub const fn updated_at(&self) -> &DateTime<Utc> {
        &self.updated_at
    }

    /// Overwrites the snapshot unless a newer one is already stored.
    pub fn apply_last_message(&mut self, last: &LastMessage) -> bool {
        if self
            .last_message_at
            .is_some_and(|stored| stored > last.created_at)
        {
            return false;
        }

        self.last_message_text = Some(last.text.clone());
        self.last_message_sender = Some(last.sender);
        self.last_message_at = Some(last.created_at);
        self.updated_at = Utc::now();
        true
    }

    pub fn toggle(&mut self, flag: Flag, u: &user::Id) {
        let set = match flag {
            Flag::Pinned => &mut self.pinned_for,
            Flag::Muted => &mut self.muted_for,
        };

        if let Some(pos) = set.iter().position(|m| m.eq(u)) {
            set.remove(pos);
        } else {
            set.push(*u);
        }
    }
}

impl From<&NewConversation> for Conversation {
    fn from(c: &NewConversation) -> Self {
        Self {
            id: c.id,
            initiator: c.initiator,
            recipient: c.recipient,
            is_task_conversation: c.is_task_conversation,
            task_id: c.task_id,
            proposal_id: c.proposal_id,
            last_message_text: None,
            last_message_sender: None,
            last_message_at: None,
            pinned_for: Vec::new(),
            muted_for: Vec::new(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Insertable, Clone, Debug)]
#[diesel(table_name = crate::schema::conversations)]
pub struct NewConversation {
    id: Id,
    initiator: user::Id,
    recipient: user::Id,
    is_task_conversation: bool,
    task_id: Option<TaskId>,
    proposal_id: Option<ProposalId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NewConversation {
    pub fn new(initiator: user::Id, recipient: user::Id, scope: Scope) -> Result<Self, Error> {
        if initiator == recipient {
            return Err(Error::SelfReference);
        }

        let now = Utc::now();
        Ok(Self {
            id: Id::random(),
            initiator,
            recipient,
            is_task_conversation: scope.task_id().is_some(),
            task_id: scope.task_id().copied(),
            proposal_id: scope.proposal_id().copied(),
            created_at: now,
            updated_at: now,
        })
    }

    pub const fn members(&self) -> [user::Id; 2] {
        [self.initiator, self.recipient]
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.task_id, self.proposal_id)
    }
}

/// Denormalized snapshot of the latest message in a conversation.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    text: String,
    sender: user::Id,
    created_at: DateTime<Utc>,
}

impl LastMessage {
    pub fn new(text: impl Into<String>, sender: user::Id, created_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            sender,
            created_at,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn sender(&self) -> &user::Id {
        &self.sender
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }
}

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    id: Id,
    participants: Vec<UserDto>,
    is_task_conversation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proposal_id: Option<ProposalId>,
    last_message: Option<LastMessage>,
    pinned_for: Vec<user::Id>,
    muted_for: Vec<user::Id>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationDto {
    pub fn new(c: Conversation, participants: Vec<UserDto>) -> Self {
        let last_message = c.last_message();
        Self {
            id: c.id,
            participants,
            is_task_conversation: c.is_task_conversation,
            task_id: c.task_id,
            proposal_id: c.proposal_id,
            last_message,
            pinned_for: c.pinned_for,
            muted_for: c.muted_for,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub fn participants(&self) -> &[UserDto] {
        &self.participants
    }

    pub const fn last_message(&self) -> Option<&LastMessage> {
        self.last_message.as_ref()
    }

    pub fn pinned_for(&self) -> &[user::Id] {
        &self.pinned_for
    }

    pub fn muted_for(&self) -> &[user::Id] {
        &self.muted_for
    }
}

/// Per-participant view pushed with `conversationUpdate`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    conversation_id: Id,
    last_message: Option<LastMessage>,
    unread_count: i64,
    updated_at: DateTime<Utc>,
}

impl ConversationSummary {
    pub fn new(c: &Conversation, unread_count: i64) -> Self {
        Self {
            conversation_id: c.id,
            last_message: c.last_message(),
            unread_count,
            updated_at: c.updated_at,
        }
    }

    pub const fn unread_count(&self) -> i64 {
        self.unread_count
    }
}
