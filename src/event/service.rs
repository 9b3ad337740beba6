use async_trait::async_trait;

use crate::user;

use super::model::Event;
use super::{ConnectionId, Sender};

/// Publish side of the realtime channel, plus the room bookkeeping used by
/// the websocket handler.
#[async_trait]
pub trait EventService {
    async fn connect(&self, sender: Sender) -> ConnectionId;

    /// Attaches the connection to the user's room. A connection belongs to at
    /// most one room; joining another one leaves the previous room first.
    async fn join(&self, conn: &ConnectionId, user: &user::Id);

    async fn leave(&self, conn: &ConnectionId);

    async fn disconnect(&self, conn: &ConnectionId);

    /// Fans the event out to every connection in the user's room.
    /// No live connection is not an error.
    async fn publish(&self, user: &user::Id, event: &Event);

    async fn broadcast(&self, event: &Event);

    async fn is_online(&self, user: &user::Id) -> bool;
}
