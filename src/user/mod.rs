use std::sync::Arc;

use axum::{Router, http::StatusCode, routing::get};
use diesel::{deserialize::FromSqlRow, expression::AsExpression};
use serde::{Deserialize, Serialize};

use repository::UserRepository;
use service::UserService;

use crate::id::{text_enum, uuid_id};
use crate::state::AppState;

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn UserRepository + Send + Sync>;
pub type Service = Arc<dyn UserService + Send + Sync>;

uuid_id!(Id);

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/users/{id}/presence", get(handler::api::presence))
        .with_state(s)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    TaskOwner,
    SolutionProvider,
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TaskOwner => "task_owner",
            Self::SolutionProvider => "solution_provider",
            Self::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(s: &str) -> std::result::Result<Self, Self::Error> {
        match s {
            "task_owner" => Ok(Self::TaskOwner),
            "solution_provider" => Ok(Self::SolutionProvider),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unsupported role: {other}")),
        }
    }
}

text_enum!(Role);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("user not found: {0}")]
    NotFound(Id),

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::_R2d2(_) | Error::_Diesel(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
