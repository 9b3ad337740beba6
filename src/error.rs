use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{debug, error};
use serde::Serialize;

use crate::{attachment, auth, conversation, event, inbox, message, user};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("query parameter is required: {0}")]
    QueryParamRequired(String),
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    _Attachment(#[from] attachment::Error),
    #[error(transparent)]
    _Auth(#[from] auth::Error),
    #[error(transparent)]
    _Conversation(#[from] conversation::Error),
    #[error(transparent)]
    _Event(#[from] event::Error),
    #[error(transparent)]
    _Inbox(#[from] inbox::Error),
    #[error(transparent)]
    _Message(#[from] message::Error),
    #[error(transparent)]
    _User(#[from] user::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::QueryParamRequired(_) | Error::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Error::_Attachment(e) => e.into(),
            Error::_Auth(e) => e.into(),
            Error::_Conversation(e) => e.into(),
            Error::_Event(e) => e.into(),
            Error::_Inbox(e) => e.into(),
            Error::_Message(e) => e.into(),
            Error::_User(e) => e.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = StatusCode::from(self);

        let message = if status.is_server_error() {
            error!("request failed: {message}");
            "Internal server error".to_owned()
        } else {
            debug!("request rejected with {status}: {message}");
            message
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}
