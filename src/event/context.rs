use std::sync::Arc;

use tokio::sync::Notify;

use crate::user;

use super::ConnectionId;

#[derive(Clone)]
pub struct Ws {
    pub conn: ConnectionId,
    pub logged_user: user::Id,
    pub close: Arc<Notify>,
}

impl Ws {
    pub fn new(conn: ConnectionId, logged_user: user::Id) -> Self {
        Self {
            conn,
            logged_user,
            close: Arc::new(Notify::new()),
        }
    }
}
