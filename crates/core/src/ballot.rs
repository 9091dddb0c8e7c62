//! Ballot box state machine
//!
//! A room-scoped vote with a configurable choice shape. A box opens exactly
//! once, by creator request, by its timer, or by quorum; whichever trigger
//! fires first wins and the rest are no-ops.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::event::ChoiceSpec;

/// Snapshot taken at the moment a box opens.
#[derive(Debug, Clone)]
pub struct OpenedBallot {
    /// Recorded votes, already cleared for anonymous boxes.
    pub votes: BTreeMap<String, String>,
    /// Frequency count over the recorded votes.
    pub result: BTreeMap<String, u32>,
}

/// A timed, quorum-aware voting construct.
#[derive(Debug, Clone)]
pub struct BallotBox {
    /// `{creator}/{uuid}`: globally unique and creator-traceable.
    pub id: String,
    pub creator: String,
    pub title: String,
    pub choices: ChoiceSpec,
    pub notify_votes: bool,
    pub anonymous: bool,
    pub timer: Option<u64>,
    votes: BTreeMap<String, String>,
    opened: bool,
    result: BTreeMap<String, u32>,
}

impl BallotBox {
    pub fn new(
        creator: &str,
        title: String,
        choices: ChoiceSpec,
        notify_votes: bool,
        anonymous: bool,
        timer: Option<u64>,
    ) -> Self {
        Self {
            id: format!("{}/{}", creator, Uuid::new_v4()),
            creator: creator.to_string(),
            title,
            choices,
            notify_votes,
            anonymous,
            timer,
            votes: BTreeMap::new(),
            opened: false,
            result: BTreeMap::new(),
        }
    }

    /// Record or overwrite a vote. Returns false once the box is open.
    pub fn cast(&mut self, username: &str, choice: String) -> bool {
        if self.opened {
            return false;
        }
        self.votes.insert(username.to_string(), choice);
        true
    }

    pub fn has_voted(&self, username: &str) -> bool {
        self.votes.contains_key(username)
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Result computed at open time; empty until then.
    pub fn result(&self) -> &BTreeMap<String, u32> {
        &self.result
    }

    /// Open the box: tally the votes once and clear them if anonymous.
    /// Idempotent; returns None if already open.
    pub fn open(&mut self) -> Option<OpenedBallot> {
        if self.opened {
            return None;
        }
        self.opened = true;

        let mut result = BTreeMap::new();
        for choice in self.votes.values() {
            *result.entry(choice.clone()).or_insert(0) += 1;
        }
        self.result = result.clone();

        let votes = if self.anonymous {
            self.votes.clear();
            BTreeMap::new()
        } else {
            self.votes.clone()
        };

        Some(OpenedBallot { votes, result })
    }
}
