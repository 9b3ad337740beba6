use std::fmt;
use std::sync::Arc;

use axum::{Router, http::StatusCode, routing::get};
use tokio::sync::mpsc;

use service::EventService;

use crate::state::AppState;

mod context;
pub mod gateway;
mod handler;
pub mod model;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn EventService + Send + Sync>;

/// Outbound half of a live connection. Frames are serialized events.
pub type Sender = mpsc::Sender<String>;

/// Frames a connection may have queued before new ones are dropped.
pub const QUEUE_CAPACITY: usize = 256;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new().route("/ws", get(handler::ws)).with_state(s)
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
    #[error(transparent)]
    _Axum(#[from] axum::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::_ParseJson(_) | Error::_Axum(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
