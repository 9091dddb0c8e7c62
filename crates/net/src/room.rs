//! Live room state
//!
//! Wraps the core room state machine with the connection set, per-connection
//! outbound queues, and timer handles. One async mutex per room serializes
//! every operation and timer firing; distinct rooms never block each other.
//! Delivery is best-effort per connection: a dead receiver is skipped, never
//! awaited.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use tearoom_core::event::{ChoiceSpec, ServerEvent};
use tearoom_core::room::RoomState;

/// Sender half of one connection's outbound queue.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// A room with live connections attached.
pub struct Room {
    pub name: String,
    pub created_at: DateTime<Utc>,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    state: RoomState,
    connections: HashMap<Uuid, EventSender>,
    envelope_timers: HashMap<String, JoinHandle<()>>,
    expiry: Option<JoinHandle<()>>,
}

impl RoomInner {
    /// History + fan-out, bypassing the gate (server-generated events).
    fn publish(&mut self, event: ServerEvent) {
        self.state.record(&event);
        for tx in self.connections.values() {
            let _ = tx.send(event.clone());
        }
    }

    /// Gate-checked history + fan-out for user events.
    fn deliver(&mut self, sender: &str, event: ServerEvent) {
        if !self.state.admits_broadcast(sender, &event) {
            debug!(sender = %sender, "Dropped event from non-member");
            return;
        }
        self.publish(event);
    }
}

impl Room {
    /// Create an empty room owned by `owner`.
    pub(crate) fn new(name: &str, owner: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            inner: Mutex::new(RoomInner {
                state: RoomState::new(owner),
                connections: HashMap::new(),
                envelope_timers: HashMap::new(),
                expiry: None,
            }),
        }
    }

    pub async fn is_owner(&self, username: &str) -> bool {
        self.inner.lock().await.state.is_owner(username)
    }

    pub async fn member_count(&self) -> usize {
        self.inner.lock().await.state.member_count()
    }

    /// Admit a connection. On success the joining connection receives the
    /// room snapshot and the full history, then the join itself is broadcast
    /// through the gate (and lands in history after the replayed portion).
    /// Returns false when the room is full for a first-time member.
    pub async fn join(&self, conn_id: Uuid, tx: EventSender, username: &str, info: Value) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state.admit(username, info.clone()).is_err() {
            return false;
        }
        inner.connections.insert(conn_id, tx.clone());

        let _ = tx.send(inner.state.summary());
        for event in inner.state.history() {
            let _ = tx.send(event.clone());
        }

        let event = ServerEvent::Join {
            room: self.name.clone(),
            username: username.to_string(),
            info,
        };
        inner.deliver(username, event);
        true
    }

    /// Detach a transport handle without touching membership.
    pub async fn detach(&self, conn_id: Uuid) {
        let mut inner = self.inner.lock().await;
        inner.connections.remove(&conn_id);
    }

    /// Relay a free-form chat payload through the gate. The broadcast is
    /// stamped with the verified sender, never a name the payload claims.
    pub async fn relay_message(&self, username: &str, mut body: Map<String, Value>) {
        // Reserved keys belong to the stamped frame, not the payload.
        body.remove("type");
        body.remove("username");
        let mut inner = self.inner.lock().await;
        let event = ServerEvent::Message {
            username: username.to_string(),
            body,
        };
        inner.deliver(username, event);
    }

    /// Owner-only capacity change; silent no-op otherwise.
    pub async fn set_capacity(&self, username: &str, capacity: u32) {
        let mut inner = self.inner.lock().await;
        if inner.state.set_capacity(username, capacity) {
            let event = ServerEvent::SetCapacity {
                capacity,
                username: username.to_string(),
            };
            inner.deliver(username, event);
        }
    }

    /// Drop membership. The leave broadcast passes the gate even though the
    /// sender is no longer a member; their connection stays attached.
    pub async fn leave(&self, username: &str) {
        let mut inner = self.inner.lock().await;
        inner.state.remove_member(username);
        let event = ServerEvent::Leave {
            username: username.to_string(),
        };
        inner.deliver(username, event);
    }

    /// Owner's destroy announcement, through the normal gate.
    pub async fn announce_destroy(&self, username: &str) {
        let mut inner = self.inner.lock().await;
        let event = ServerEvent::DestroyRoom {
            username: username.to_string(),
        };
        inner.deliver(username, event);
    }

    /// Register a ballot box and arm its auto-open timer if one was asked
    /// for. The timer is fire-and-forget: a late firing is absorbed by the
    /// idempotent open.
    pub async fn put_ballot(
        self: &Arc<Self>,
        username: &str,
        title: String,
        choices: ChoiceSpec,
        notify_votes: bool,
        anonymous: bool,
        timer: Option<u64>,
    ) {
        let mut inner = self.inner.lock().await;
        let (id, event) =
            inner
                .state
                .put_ballot(username, title, choices, notify_votes, anonymous, timer);
        if let Some(secs) = timer {
            let room = Arc::clone(self);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                room.open_ballot_elapsed(&id).await;
            });
        }
        inner.deliver(username, event);
    }

    /// Record a vote. A quorum-completing vote opens the box immediately;
    /// the open broadcast precedes the per-vote notice.
    pub async fn cast_vote(&self, username: &str, id: &str, vote: String) {
        let mut inner = self.inner.lock().await;
        let outcome = inner.state.cast_vote(id, username, vote);
        if let Some(event) = outcome.opened {
            inner.publish(event);
        }
        if let Some(event) = outcome.notice {
            inner.deliver(username, event);
        }
    }

    /// Creator-requested manual open; anyone else's request is silent.
    pub async fn open_ballot_requested(&self, username: &str, id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(event) = inner.state.open_ballot_by(id, username) {
            inner.publish(event);
        }
    }

    /// Timer-driven open.
    async fn open_ballot_elapsed(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(event) = inner.state.open_ballot(id) {
            debug!(ballot = %id, "Ballot timer elapsed");
            inner.publish(event);
        }
    }

    /// Register an envelope and arm its auto-reveal timer if one was asked
    /// for. The timer handle is kept so a manual reveal can cancel it.
    pub async fn put_envelope(
        self: &Arc<Self>,
        username: &str,
        title: String,
        secret: String,
        timer: Option<u64>,
    ) {
        let mut inner = self.inner.lock().await;
        let (id, event) = inner.state.put_envelope(username, title, secret, timer);
        if let Some(secs) = timer {
            let room = Arc::clone(self);
            let envelope_id = id.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                room.reveal_envelope_elapsed(&envelope_id).await;
            });
            inner.envelope_timers.insert(id, handle);
        }
        inner.deliver(username, event);
    }

    /// Creator-requested reveal. Cancels the pending auto-reveal so the
    /// secret is never broadcast twice.
    pub async fn reveal_envelope_requested(&self, username: &str, id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(event) = inner.state.reveal_envelope_by(id, username) {
            if let Some(handle) = inner.envelope_timers.remove(id) {
                handle.abort();
            }
            inner.publish(event);
        }
    }

    /// Timer-driven reveal.
    async fn reveal_envelope_elapsed(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(event) = inner.state.reveal_envelope(id) {
            debug!(envelope = %id, "Envelope timer elapsed");
            inner.envelope_timers.remove(id);
            inner.publish(event);
        }
    }

    /// Arm the room expiry timer. Called once, right after creation.
    pub(crate) async fn set_expiry(&self, handle: JoinHandle<()>) {
        let mut inner = self.inner.lock().await;
        inner.expiry = Some(handle);
    }

    /// Tear the room down: detach every connection and disarm the expiry
    /// timer. Child timers still in flight fire into an empty room.
    pub(crate) async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.connections.clear();
        if let Some(handle) = inner.expiry.take() {
            handle.abort();
        }
    }
}
