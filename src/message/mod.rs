use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, patch, post},
};
use diesel::{deserialize::FromSqlRow, expression::AsExpression};
use serde::{Deserialize, Serialize};

use repository::MessageRepository;
use service::MessageService;

use crate::id::{text_enum, uuid_id};
use crate::{attachment, conversation, state::AppState, user};

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn MessageRepository + Send + Sync>;
pub type Service = Arc<dyn MessageService + Send + Sync>;

uuid_id!(Id);

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/messages", post(handler::api::send))
        .route(
            "/messages/{id}",
            patch(handler::api::edit).delete(handler::api::delete),
        )
        .route("/messages/{id}/read", patch(handler::api::mark_as_read))
        .route("/messages/{id}/reactions", post(handler::api::react))
        .route("/messages/search", get(handler::api::search))
        .route("/messages/unread/count", get(handler::api::count_unread))
        .with_state(s)
}

/// Display state of a message. Only ever moves forward.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Sent,
    Delivered,
    Seen,
}

impl Status {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Seen => "seen",
        }
    }
}

impl TryFrom<&str> for Status {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "seen" => Ok(Self::Seen),
            other => Err(format!("unsupported message status: {other}")),
        }
    }
}

text_enum!(Status);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message not found: {0}")]
    NotFound(Id),
    #[error("only the sender may modify the message")]
    NotSender,
    #[error("user is not a participant of the message")]
    NotParticipant,
    #[error("message must have text or attachments")]
    Empty,
    #[error("either conversationId or receiverId is required")]
    MissingTarget,
    #[error("cannot send a message to oneself")]
    SelfMessage,
    #[error("receiverId is not the other participant of the conversation")]
    TargetMismatch,
    #[error("replied message does not belong to the conversation")]
    ReplyOutsideConversation,
    #[error("emoji is required")]
    EmptyEmoji,

    #[error(transparent)]
    _Attachment(#[from] attachment::Error),
    #[error(transparent)]
    _Conversation(#[from] conversation::Error),
    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotSender | Error::NotParticipant => StatusCode::FORBIDDEN,
            Error::Empty
            | Error::MissingTarget
            | Error::SelfMessage
            | Error::TargetMismatch
            | Error::ReplyOutsideConversation
            | Error::EmptyEmoji => StatusCode::BAD_REQUEST,
            Error::_Attachment(e) => e.into(),
            Error::_Conversation(e) => e.into(),
            Error::_User(e) => e.into(),
            Error::_R2d2(_) | Error::_Diesel(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
