use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, patch, post},
};
use serde::Deserialize;

use repository::ConversationRepository;
use service::ConversationService;

use crate::id::uuid_id;
use crate::{state::AppState, user};

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn ConversationRepository + Send + Sync>;
pub type Service = Arc<dyn ConversationService + Send + Sync>;

uuid_id!(Id);
uuid_id!(TaskId);
uuid_id!(ProposalId);

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/conversations/start", post(handler::api::start))
        .route("/conversations", get(handler::api::find_all))
        .route("/conversations/{id}", get(handler::api::find_one))
        .route("/conversations/{id}/messages", get(handler::api::messages))
        .route("/conversations/{id}/read", patch(handler::api::mark_as_read))
        .route("/conversations/{id}/pin", patch(handler::api::toggle_pin))
        .route("/conversations/{id}/mute", patch(handler::api::toggle_mute))
        .with_state(s)
}

/// Optional task/proposal a conversation is bound to. Part of the dedup key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    task_id: Option<TaskId>,
    proposal_id: Option<ProposalId>,
}

impl Scope {
    pub const fn new(task_id: Option<TaskId>, proposal_id: Option<ProposalId>) -> Self {
        Self {
            task_id,
            proposal_id,
        }
    }

    pub const fn task_id(&self) -> Option<&TaskId> {
        self.task_id.as_ref()
    }

    pub const fn proposal_id(&self) -> Option<&ProposalId> {
        self.proposal_id.as_ref()
    }
}

/// Per-user flags stored on a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flag {
    Pinned,
    Muted,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("conversation not found: {0}")]
    NotFound(Id),
    #[error("user is not a participant of the conversation")]
    NotMember,
    #[error("cannot start a conversation with oneself")]
    SelfReference,
    #[error("conversation for the same participants was created concurrently")]
    Conflict,

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
            Error::NotMember => StatusCode::FORBIDDEN,
            Error::SelfReference => StatusCode::BAD_REQUEST,
            Error::Conflict => StatusCode::CONFLICT,
            Error::_User(e) => e.into(),
            Error::_R2d2(_) | Error::_Diesel(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
