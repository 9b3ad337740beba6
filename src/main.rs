use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::{Router, routing::get};
use log::{error, info};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::attachment::storage::LocalStorage;
use crate::attachment::{Ingestor, Limits};
use crate::auth::service::JwtAuthService;
use crate::conversation::repository::PgConversationRepository;
use crate::conversation::service::ConversationServiceImpl;
use crate::error::{Error, Result};
use crate::event::gateway::Hub;
use crate::inbox::service::InboxServiceImpl;
use crate::message::repository::PgMessageRepository;
use crate::message::service::MessageServiceImpl;
use crate::notification::repository::PgNotificationRepository;
use crate::notification::service::NotificationServiceImpl;
use crate::state::AppState;
use crate::user::repository::PgUserRepository;
use crate::user::service::UserServiceImpl;

mod attachment;
mod auth;
mod conversation;
mod error;
mod event;
#[cfg(test)]
mod fixture;
mod id;
mod inbox;
mod integration;
mod message;
mod notification;
mod paging;
mod schema;
mod state;
mod user;

#[tokio::main]
async fn main() {
    let cfg = integration::Config::default();

    let pool = cfg.pg.connect();
    integration::db::migrate(&pool);

    let storage = match LocalStorage::new(cfg.storage.clone()).await {
        Ok(s) => Arc::new(s),
        Err(e) => panic!("Failed to prepare upload directory: {e}"),
    };
    let limits = Limits::default();

    let event_service: event::Service = Arc::new(Hub::default());
    let user_repo: user::Repository = Arc::new(PgUserRepository::new(pool.clone()));
    let conversation_repo: conversation::Repository =
        Arc::new(PgConversationRepository::new(pool.clone()));
    let message_repo: message::Repository = Arc::new(PgMessageRepository::new(pool.clone()));

    let user_service: user::Service =
        Arc::new(UserServiceImpl::new(user_repo.clone(), event_service.clone()));
    let conversation_service: conversation::Service = Arc::new(ConversationServiceImpl::new(
        conversation_repo.clone(),
        user_service.clone(),
        event_service.clone(),
    ));
    let notification_service: notification::Service = Arc::new(NotificationServiceImpl::new(
        Arc::new(PgNotificationRepository::new(pool)),
    ));
    let message_service: message::Service = Arc::new(MessageServiceImpl::new(
        message_repo.clone(),
        conversation_service.clone(),
        user_service.clone(),
        event_service.clone(),
        notification_service,
        Ingestor::new(storage, limits),
    ));
    let inbox_service: inbox::Service = Arc::new(InboxServiceImpl::new(
        conversation_repo,
        message_repo,
        user_repo,
    ));

    let state = AppState {
        auth_service: Arc::new(JwtAuthService::new(&cfg.auth)),
        user_service,
        conversation_service,
        message_service,
        inbox_service,
        event_service,
        limits,
    };

    let protected = Router::new()
        .merge(user::api(state.clone()))
        .merge(conversation::api(state.clone()))
        .merge(message::api(state.clone()))
        .merge(inbox::api(state.clone()))
        .merge(event::api(state.clone()))
        .route_layer(from_fn_with_state(
            state.clone(),
            auth::middleware::authorize,
        ));

    let app = Router::new()
        .route("/health", get(health))
        .merge(protected)
        .nest_service(cfg.storage.url_prefix(), ServeDir::new(cfg.storage.dir()))
        .layer(DefaultBodyLimit::max(limits.body_limit()))
        .layer(cfg.env.cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = cfg.env.addr();
    info!("listening on {addr}");

    let served = match cfg.env.ssl_config() {
        Some(ssl_config) => {
            axum_server::bind_openssl(addr, ssl_config)
                .serve(app.into_make_service())
                .await
        }
        None => {
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await
        }
    };

    if let Err(e) = served {
        error!("server stopped: {e}");
    }
}

async fn health() -> &'static str {
    "OK"
}
