//! Envelope state machine
//!
//! Holds a secret until the creator or a timer reveals it. The secret is
//! withheld from every broadcast until the reveal, and a reveal happens at
//! most once.

use uuid::Uuid;

/// A delayed-disclosure construct scoped to a room.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// `{creator}/{uuid}`: globally unique and creator-traceable.
    pub id: String,
    pub creator: String,
    pub title: String,
    pub timer: Option<u64>,
    secret: String,
    opened: bool,
}

impl Envelope {
    pub fn new(creator: &str, title: String, secret: String, timer: Option<u64>) -> Self {
        Self {
            id: format!("{}/{}", creator, Uuid::new_v4()),
            creator: creator.to_string(),
            title,
            timer,
            secret,
            opened: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Disclose the secret. Idempotent; returns None if already revealed.
    pub fn reveal(&mut self) -> Option<String> {
        if self.opened {
            return None;
        }
        self.opened = true;
        Some(self.secret.clone())
    }
}
