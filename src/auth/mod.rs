use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Deserialize;

use crate::user;

pub mod middleware;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn service::AuthService + Send + Sync>;

#[derive(Clone)]
pub struct Config {
    secret: String,
}

impl Config {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Config(secret: ***)")
    }
}

/// Claims of a bearer token issued by the marketplace auth service.
#[derive(Deserialize, Clone)]
struct TokenClaims {
    sub: user::Id,
    role: user::Role,
}

/// The authenticated principal of a request.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    id: user::Id,
    role: user::Role,
}

impl User {
    pub const fn new(id: user::Id, role: user::Role) -> Self {
        Self { id, role }
    }

    pub const fn id(&self) -> &user::Id {
        &self.id
    }

    pub const fn role(&self) -> &user::Role {
        &self.role
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unauthorized to access the resource")]
    Unauthorized,
    #[error("token is malformed")]
    TokenMalformed,

    #[error(transparent)]
    _JsonWebtoken(#[from] jsonwebtoken::errors::Error),
}

impl From<Error> for StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::Unauthorized | Error::TokenMalformed | Error::_JsonWebtoken(_) => {
                StatusCode::UNAUTHORIZED
            }
        }
    }
}
