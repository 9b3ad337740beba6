use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::{
    self,
    model::{ConversationDto, ConversationSummary},
};
use crate::message::{
    self,
    model::{Message, Reaction},
};
use crate::user;

/// Server to client frame: `{"event": "<name>", "data": {...}}`.
#[derive(Serialize, Clone, Debug)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum Event {
    #[serde(rename = "presence:update")]
    PresenceUpdate { user_id: user::Id, online: bool },
    #[serde(rename = "typing")]
    Typing {
        conversation_id: conversation::Id,
        from: user::Id,
        to: user::Id,
    },
    #[serde(rename = "stopTyping")]
    StopTyping {
        conversation_id: conversation::Id,
        from: user::Id,
        to: user::Id,
    },
    #[serde(rename = "message:new")]
    NewMessage(Message),
    #[serde(rename = "message:edited")]
    EditedMessage(Message),
    #[serde(rename = "message:deleted")]
    DeletedMessage {
        message_id: message::Id,
        conversation_id: conversation::Id,
        deleted_by: user::Id,
    },
    #[serde(rename = "message:seen")]
    SeenMessage {
        message_id: message::Id,
        conversation_id: conversation::Id,
        seen_by: user::Id,
        seen_at: DateTime<Utc>,
    },
    #[serde(rename = "message:reaction")]
    Reaction {
        message_id: message::Id,
        conversation_id: conversation::Id,
        reactions: Vec<Reaction>,
    },
    #[serde(rename = "messagesSeen")]
    MessagesSeen {
        conversation_id: conversation::Id,
        seen_by: user::Id,
        seen_at: DateTime<Utc>,
    },
    #[serde(rename = "conversation:new")]
    NewConversation(ConversationDto),
    #[serde(rename = "conversationUpdate")]
    ConversationUpdate(ConversationSummary),
}

/// Client to server frame.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", content = "data", rename_all_fields = "camelCase")]
pub enum Command {
    #[serde(rename = "join")]
    Join(user::Id),
    #[serde(rename = "leave")]
    Leave(user::Id),
    #[serde(rename = "typing")]
    Typing {
        conversation_id: conversation::Id,
        to: user::Id,
    },
    #[serde(rename = "stopTyping")]
    StopTyping {
        conversation_id: conversation::Id,
        to: user::Id,
    },
}
