//! Room state machine
//!
//! Membership, configuration, history, and the room's child ballot boxes
//! and envelopes. All mutations here are synchronous; the network layer
//! provides per-room serialization and performs the actual fan-out.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::ballot::BallotBox;
use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::event::{ChoiceSpec, RoomConfig, RoomSummary, ServerEvent};
use crate::invariants;
use crate::titles;

/// Member capacity for freshly created rooms.
pub const DEFAULT_CAPACITY: u32 = 10;

/// Inclusive bounds accepted by a capacity change.
pub const CAPACITY_RANGE: std::ops::RangeInclusive<u32> = 2..=20;

/// Broadcast consequences of a recorded vote, in delivery order.
#[derive(Debug, Default)]
pub struct VoteOutcome {
    /// Present when this vote completed quorum; delivered before the notice.
    pub opened: Option<ServerEvent>,
    /// Per-vote notice, present when the box has `notifyVotes`.
    pub notice: Option<ServerEvent>,
}

/// The state of one room. Owns its members, history, and children.
#[derive(Debug)]
pub struct RoomState {
    pub title: String,
    pub config: RoomConfig,
    members: BTreeMap<String, Value>,
    history: Vec<ServerEvent>,
    ballots: HashMap<String, BallotBox>,
    envelopes: HashMap<String, Envelope>,
}

impl RoomState {
    /// Create a room owned by its first joiner, with a fresh random title.
    pub fn new(owner: &str) -> Self {
        let state = Self {
            title: titles::generate_title(),
            config: RoomConfig {
                capacity: DEFAULT_CAPACITY,
                owner: owner.to_string(),
                keep_history: true,
            },
            members: BTreeMap::new(),
            history: Vec::new(),
            ballots: HashMap::new(),
            envelopes: HashMap::new(),
        };
        invariants::assert_room_invariants(&state);
        state
    }

    pub fn is_member(&self, username: &str) -> bool {
        self.members.contains_key(username)
    }

    pub fn is_owner(&self, username: &str) -> bool {
        self.config.owner == username
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Admit a user, enforcing capacity for first-time joins only.
    /// Re-admitting an existing member always succeeds and refreshes their
    /// profile when one is supplied.
    pub fn admit(&mut self, username: &str, info: Value) -> Result<()> {
        if !self.is_member(username) {
            if self.member_count() >= self.config.capacity as usize {
                return Err(Error::RoomFull);
            }
            self.members.insert(username.to_string(), info);
        } else if !info.is_null() {
            self.members.insert(username.to_string(), info);
        }
        Ok(())
    }

    /// Drop a member. Their connections, ballots, and envelopes stay.
    pub fn remove_member(&mut self, username: &str) {
        self.members.remove(username);
    }

    /// Owner-only capacity change within bounds. Returns whether it applied.
    pub fn set_capacity(&mut self, requester: &str, capacity: u32) -> bool {
        if !self.is_owner(requester) || !CAPACITY_RANGE.contains(&capacity) {
            return false;
        }
        self.config.capacity = capacity;
        invariants::assert_room_invariants(self);
        true
    }

    /// Broadcast gate: an event passes if its sender is currently a member.
    /// Leave is the sole exception and always passes.
    pub fn admits_broadcast(&self, sender: &str, event: &ServerEvent) -> bool {
        self.is_member(sender) || matches!(event, ServerEvent::Leave { .. })
    }

    /// Append to history while the room keeps one.
    pub fn record(&mut self, event: &ServerEvent) {
        if self.config.keep_history {
            self.history.push(event.clone());
        }
    }

    /// Previously broadcast events, oldest first.
    pub fn history(&self) -> &[ServerEvent] {
        &self.history
    }

    /// Metadata + roster snapshot sent to a joining connection before
    /// history replay.
    pub fn summary(&self) -> ServerEvent {
        ServerEvent::RoomInfo {
            room: RoomSummary {
                title: self.title.clone(),
                config: self.config.clone(),
            },
            users: self.members.clone(),
        }
    }

    /// Register a ballot box. The returned broadcast event carries the box
    /// in full except votes.
    pub fn put_ballot(
        &mut self,
        creator: &str,
        title: String,
        choices: ChoiceSpec,
        notify_votes: bool,
        anonymous: bool,
        timer: Option<u64>,
    ) -> (String, ServerEvent) {
        let ballot = BallotBox::new(creator, title, choices, notify_votes, anonymous, timer);
        let event = ServerEvent::PutBallotBox {
            id: ballot.id.clone(),
            title: ballot.title.clone(),
            choices: ballot.choices.clone(),
            notify_votes: ballot.notify_votes,
            anonymous: ballot.anonymous,
            timer: ballot.timer,
            username: creator.to_string(),
        };
        let id = ballot.id.clone();
        self.ballots.insert(id.clone(), ballot);
        (id, event)
    }

    /// Record a vote on a box. Unknown ids and already-open boxes are
    /// silent no-ops. When the vote completes quorum (every current member
    /// has voted) the box opens immediately, superseding its timer.
    pub fn cast_vote(&mut self, id: &str, username: &str, choice: String) -> VoteOutcome {
        let members: Vec<String> = self.members.keys().cloned().collect();
        let (notice, quorum) = match self.ballots.get_mut(id) {
            Some(ballot) => {
                if !ballot.cast(username, choice) {
                    return VoteOutcome::default();
                }
                let notice = if ballot.notify_votes {
                    Some(ServerEvent::UpdateBallotBox {
                        id: ballot.id.clone(),
                        title: ballot.title.clone(),
                        username: username.to_string(),
                    })
                } else {
                    None
                };
                let quorum = members.iter().all(|member| ballot.has_voted(member));
                (notice, quorum)
            }
            None => return VoteOutcome::default(),
        };
        let opened = if quorum { self.open_ballot(id) } else { None };
        VoteOutcome { opened, notice }
    }

    /// Open a ballot box: the first trigger wins, later calls are no-ops.
    pub fn open_ballot(&mut self, id: &str) -> Option<ServerEvent> {
        let ballot = self.ballots.get_mut(id)?;
        let snapshot = ballot.open()?;
        invariants::assert_ballot_invariants(ballot);
        Some(ServerEvent::OpenBallotBox {
            id: ballot.id.clone(),
            title: ballot.title.clone(),
            creator: ballot.creator.clone(),
            votes: snapshot.votes,
            result: snapshot.result,
        })
    }

    /// Creator-requested open; anyone else's request is a silent no-op.
    pub fn open_ballot_by(&mut self, id: &str, requester: &str) -> Option<ServerEvent> {
        match self.ballots.get(id) {
            Some(ballot) if ballot.creator == requester => self.open_ballot(id),
            _ => None,
        }
    }

    /// Register an envelope. The returned broadcast event excludes the
    /// secret.
    pub fn put_envelope(
        &mut self,
        creator: &str,
        title: String,
        secret: String,
        timer: Option<u64>,
    ) -> (String, ServerEvent) {
        let envelope = Envelope::new(creator, title, secret, timer);
        let event = ServerEvent::PutEnvelope {
            id: envelope.id.clone(),
            title: envelope.title.clone(),
            timer: envelope.timer,
            creator: envelope.creator.clone(),
            username: creator.to_string(),
        };
        let id = envelope.id.clone();
        self.envelopes.insert(id.clone(), envelope);
        (id, event)
    }

    /// Reveal an envelope: disclose the secret exactly once.
    pub fn reveal_envelope(&mut self, id: &str) -> Option<ServerEvent> {
        let envelope = self.envelopes.get_mut(id)?;
        let secret = envelope.reveal()?;
        Some(ServerEvent::RevealEnvelope {
            id: envelope.id.clone(),
            title: envelope.title.clone(),
            creator: envelope.creator.clone(),
            secret,
        })
    }

    /// Creator-requested reveal; anyone else's request is a silent no-op.
    pub fn reveal_envelope_by(&mut self, id: &str, requester: &str) -> Option<ServerEvent> {
        match self.envelopes.get(id) {
            Some(envelope) if envelope.creator == requester => self.reveal_envelope(id),
            _ => None,
        }
    }
}
