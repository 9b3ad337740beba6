use axum::extract::FromRef;

use crate::attachment::Limits;
use crate::{auth, conversation, event, inbox, message, user};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth_service: auth::Service,
    pub user_service: user::Service,
    pub conversation_service: conversation::Service,
    pub message_service: message::Service,
    pub inbox_service: inbox::Service,
    pub event_service: event::Service,
    pub limits: Limits,
}
