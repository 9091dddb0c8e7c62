//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::ballot::BallotBox;
use crate::room::RoomState;

/// Validate that a room's configuration is internally consistent
pub fn assert_room_invariants(room: &RoomState) {
    debug_assert!(
        !room.config.owner.trim().is_empty(),
        "Room has an empty owner"
    );

    debug_assert!(
        room.config.capacity >= 1,
        "Room capacity {} is below 1",
        room.config.capacity
    );
}

/// Validate that a ballot box's open-state is internally consistent
pub fn assert_ballot_invariants(ballot: &BallotBox) {
    // An anonymous box must not retain votes once opened
    debug_assert!(
        !(ballot.is_open() && ballot.anonymous && ballot.vote_count() > 0),
        "Anonymous ballot {} kept votes after opening",
        ballot.id
    );

    // Result exists only after opening
    debug_assert!(
        ballot.is_open() || ballot.result().is_empty(),
        "Ballot {} has a result but is not open",
        ballot.id
    );
}
