use std::sync::Arc;

use axum::{Router, http::StatusCode, routing::get};

use service::InboxService;

use crate::{conversation, message, state::AppState, user};

mod handler;
pub mod model;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn InboxService + Send + Sync>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/messages/inbox", get(handler::api::find_inbox))
        .with_state(s)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _Conversation(#[from] conversation::Error),
    #[error(transparent)]
    _Message(#[from] message::Error),
    #[error(transparent)]
    _User(#[from] user::Error),
    #[error(transparent)]
    _Join(#[from] tokio::task::JoinError),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::_Conversation(e) => e.into(),
            Error::_Message(e) => e.into(),
            Error::_User(e) => e.into(),
            Error::_Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
