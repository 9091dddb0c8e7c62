//! Tearoom Core Library
//!
//! Room, ballot box, and envelope state machines plus the wire event
//! vocabulary for the Tearoom chat server.

pub mod ballot;
pub mod envelope;
pub mod error;
pub mod event;
pub mod invariants;
pub mod room;
pub mod titles;

pub use ballot::{BallotBox, OpenedBallot};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use event::{
    ChoicePreset, ChoiceSpec, ClientEvent, ClientFrame, ErrorKind, RoomConfig, RoomSummary,
    ServerEvent,
};
pub use room::{RoomState, VoteOutcome, CAPACITY_RANGE, DEFAULT_CAPACITY};
