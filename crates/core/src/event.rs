//! Room protocol event vocabulary
//!
//! All events are JSON objects tagged by `type` and length-prefixed on the
//! wire. Client frames additionally carry an identity `token`, stripped
//! before any processing or broadcast.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Room configuration as carried in `roomInfo` snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub capacity: u32,
    pub owner: String,
    #[serde(rename = "history")]
    pub keep_history: bool,
}

/// Room metadata carried in `roomInfo` snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub title: String,
    pub config: RoomConfig,
}

/// Choice shape of a ballot box: a preset keyword or an explicit candidate
/// list. The server relays the shape; it never validates votes against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceSpec {
    Preset(ChoicePreset),
    Candidates(Vec<String>),
}

/// Preset ballot choice shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoicePreset {
    /// Binary yes/no.
    Yes,
    /// Rock-paper-scissors.
    Rock,
    /// A 1-5 scale.
    Five,
    /// Current room participants as the candidates.
    Participants,
    /// Free-text answers.
    Text,
}

/// Error kinds surfaced to a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The identity token failed verification.
    Verification,
    /// A join was rejected because the room is at capacity.
    Filled,
}

/// Events a client sends, minus the identity token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Enter a room, creating it if the name is unknown.
    Join {
        room: String,
        /// Opaque member profile, relayed but never interpreted.
        #[serde(default)]
        info: Value,
    },

    /// Free-form chat payload, relayed as-is to the room.
    Message {
        #[serde(flatten)]
        body: Map<String, Value>,
    },

    /// Owner-only capacity change.
    SetCapacity { capacity: u32 },

    /// Create a ballot box.
    PutBallotBox {
        title: String,
        choices: ChoiceSpec,
        #[serde(rename = "notifyVotes", default)]
        notify_votes: bool,
        #[serde(default)]
        anonymous: bool,
        #[serde(default, deserialize_with = "timer_seconds")]
        timer: Option<u64>,
    },

    /// Cast or change a vote.
    UpdateBallotBox { id: String, vote: String },

    /// Creator-only manual open.
    OpenBallotBox { id: String },

    /// Create an envelope holding a secret.
    PutEnvelope {
        title: String,
        secret: String,
        #[serde(default, deserialize_with = "timer_seconds")]
        timer: Option<u64>,
    },

    /// Creator-only manual reveal.
    RevealEnvelope { id: String },

    /// Give up room membership (the connection stays attached).
    Leave,

    /// Owner-only room teardown after a grace window.
    DestroyRoom,
}

/// Events the server sends: gated broadcasts mirroring the inbound
/// vocabulary plus server-generated replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Keep-alive reply to the raw `heartbeat` ping.
    Heartbeat,

    /// Metadata + roster snapshot sent to a joining connection before
    /// history replay.
    RoomInfo {
        room: RoomSummary,
        users: BTreeMap<String, Value>,
    },

    /// Per-connection error reply.
    Error { error: ErrorKind },

    Join {
        room: String,
        username: String,
        info: Value,
    },

    Message {
        username: String,
        #[serde(flatten)]
        body: Map<String, Value>,
    },

    SetCapacity { capacity: u32, username: String },

    /// A ballot box was created. Votes are never included.
    PutBallotBox {
        id: String,
        title: String,
        choices: ChoiceSpec,
        #[serde(rename = "notifyVotes")]
        notify_votes: bool,
        anonymous: bool,
        timer: Option<u64>,
        username: String,
    },

    /// Someone voted; sent only for boxes with `notifyVotes`, with the raw
    /// vote stripped.
    UpdateBallotBox {
        id: String,
        title: String,
        username: String,
    },

    /// A ballot box opened. `votes` is empty for anonymous boxes.
    OpenBallotBox {
        id: String,
        title: String,
        creator: String,
        votes: BTreeMap<String, String>,
        result: BTreeMap<String, u32>,
    },

    /// An envelope was created. The secret is withheld until reveal.
    PutEnvelope {
        id: String,
        title: String,
        timer: Option<u64>,
        creator: String,
        username: String,
    },

    /// An envelope was revealed, disclosing its secret.
    RevealEnvelope {
        id: String,
        title: String,
        creator: String,
        secret: String,
    },

    Leave { username: String },

    DestroyRoom { username: String },
}

impl ServerEvent {
    /// Serialize the event to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize an event from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A parsed client frame: the identity token plus the event it authorizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub token: String,
    #[serde(flatten)]
    pub event: ClientEvent,
}

impl ClientFrame {
    pub fn new(token: impl Into<String>, event: ClientEvent) -> Self {
        Self {
            token: token.into(),
            event,
        }
    }

    /// Serialize the frame to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize a frame from JSON bytes, rejecting unknown event shapes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Accepts an integer number of seconds; zero, the literal `false`, and
/// `null` all mean "no timer".
fn timer_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Disabled(bool),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Seconds(secs)) if secs > 0 => Some(secs),
        _ => None,
    })
}
