use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::{debug, error, warn};
use tokio::sync::RwLock;
use tokio::sync::mpsc::error::TrySendError;

use crate::user;

use super::model::Event;
use super::service::EventService;
use super::{ConnectionId, Sender};

struct Connection {
    sender: Sender,
    room: Option<user::Id>,
}

#[derive(Default)]
struct Rooms {
    connections: HashMap<ConnectionId, Connection>,
    members: HashMap<user::Id, HashSet<ConnectionId>>,
}

impl Rooms {
    /// Returns the user whose room became empty.
    fn detach(&mut self, conn: &ConnectionId) -> Option<user::Id> {
        let user = self.connections.get_mut(conn)?.room.take()?;

        let emptied = match self.members.get_mut(&user) {
            Some(set) => {
                set.remove(conn);
                set.is_empty()
            }
            None => false,
        };

        if emptied {
            self.members.remove(&user);
            Some(user)
        } else {
            None
        }
    }

    fn senders(&self, user: &user::Id) -> Vec<Sender> {
        self.members
            .get(user)
            .into_iter()
            .flatten()
            .filter_map(|c| self.connections.get(c))
            .map(|c| c.sender.clone())
            .collect()
    }
}

/// In-process realtime hub. A user's room is the set of its joined
/// connections; the user is online while the set is non-empty.
#[derive(Default)]
pub struct Hub {
    seq: AtomicU64,
    rooms: RwLock<Rooms>,
}

impl Hub {
    /// Never waits on a slow reader: a full queue loses the frame.
    fn send(senders: Vec<Sender>, frame: String) {
        for sender in senders {
            match sender.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("dropping frame for a stalled connection"),
                Err(TrySendError::Closed(_)) => debug!("dropping frame for a closed connection"),
            }
        }
    }

    async fn announce(&self, user: user::Id, online: bool) {
        debug!("{user} is {}", if online { "online" } else { "offline" });
        self.broadcast(&Event::PresenceUpdate {
            user_id: user,
            online,
        })
        .await;
    }
}

#[async_trait]
impl EventService for Hub {
    async fn connect(&self, sender: Sender) -> ConnectionId {
        let conn = ConnectionId::new(self.seq.fetch_add(1, Ordering::Relaxed));

        self.rooms
            .write()
            .await
            .connections
            .insert(conn, Connection { sender, room: None });

        debug!("{conn} connected");
        conn
    }

    async fn join(&self, conn: &ConnectionId, user: &user::Id) {
        let (left, came_online) = {
            let mut rooms = self.rooms.write().await;

            match rooms.connections.get(conn) {
                None => return,
                Some(c) if c.room.as_ref() == Some(user) => return,
                Some(_) => {}
            }

            let left = rooms.detach(conn);
            if let Some(c) = rooms.connections.get_mut(conn) {
                c.room = Some(*user);
            }

            let set = rooms.members.entry(*user).or_default();
            set.insert(*conn);
            (left, set.len() == 1)
        };

        if let Some(left) = left {
            self.announce(left, false).await;
        }
        if came_online {
            self.announce(*user, true).await;
        }
    }

    async fn leave(&self, conn: &ConnectionId) {
        let left = self.rooms.write().await.detach(conn);

        if let Some(user) = left {
            self.announce(user, false).await;
        }
    }

    async fn disconnect(&self, conn: &ConnectionId) {
        let left = {
            let mut rooms = self.rooms.write().await;
            let left = rooms.detach(conn);
            rooms.connections.remove(conn);
            left
        };

        debug!("{conn} disconnected");
        if let Some(user) = left {
            self.announce(user, false).await;
        }
    }

    async fn publish(&self, user: &user::Id, event: &Event) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!("failed to serialize event for {user}: {e}");
                return;
            }
        };

        let senders = self.rooms.read().await.senders(user);
        Self::send(senders, frame);
    }

    async fn broadcast(&self, event: &Event) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!("failed to serialize broadcast event: {e}");
                return;
            }
        };

        let senders = self
            .rooms
            .read()
            .await
            .connections
            .values()
            .map(|c| c.sender.clone())
            .collect();
        Self::send(senders, frame);
    }

    async fn is_online(&self, user: &user::Id) -> bool {
        self.rooms
            .read()
            .await
            .members
            .get(user)
            .is_some_and(|set| !set.is_empty())
    }
}
