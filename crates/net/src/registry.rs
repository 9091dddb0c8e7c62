//! Room registry
//!
//! Name to room map behind a read/write lock. The lock is held only for
//! lookups and inserts; room operations run under each room's own mutex,
//! and the registry lock is never taken while a room lock is held.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::room::Room;

/// A room that nobody tears down still expires on its own.
pub const ROOM_TTL: Duration = Duration::from_secs(10 * 60 * 60);

/// All live rooms, by name.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a room, creating it if absent. The requester becomes the
    /// owner only when the call creates the room; an existing room keeps
    /// its owner. Every created room gets an expiry timer.
    pub async fn get_or_create(self: &Arc<Self>, name: &str, requester: &str) -> Arc<Room> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(name) {
                return Arc::clone(room);
            }
        }

        let mut rooms = self.rooms.write().await;
        // Racing creators: one wins, the rest take its room.
        if let Some(room) = rooms.get(name) {
            return Arc::clone(room);
        }

        let room = Arc::new(Room::new(name, requester));
        rooms.insert(name.to_string(), Arc::clone(&room));
        drop(rooms);
        info!(room = %name, owner = %requester, "Room created");

        let registry = Arc::clone(self);
        let target = Arc::clone(&room);
        let expiry = tokio::spawn(async move {
            tokio::time::sleep(ROOM_TTL).await;
            debug!(room = %target.name, "Room expired");
            registry.destroy(&target).await;
        });
        room.set_expiry(expiry).await;

        room
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(name).cloned()
    }

    /// Remove a room, but only if the registry still maps its name to this
    /// very instance. A stale handle (the name was reused after an earlier
    /// teardown) must not take down the successor room.
    pub async fn destroy(&self, room: &Arc<Room>) {
        {
            let mut rooms = self.rooms.write().await;
            match rooms.get(&room.name) {
                Some(current) if Arc::ptr_eq(current, room) => {
                    rooms.remove(&room.name);
                }
                _ => {
                    debug!(room = %room.name, "Stale destroy ignored");
                    return;
                }
            }
        }
        room.clear().await;
        let age = chrono::Utc::now().signed_duration_since(room.created_at);
        info!(room = %room.name, age_secs = age.num_seconds(), "Room destroyed");
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}
