//! # Team Four
//!
//! Turn resolution for team Connect Four. Two teams share one board; on each
//! turn every member of the active team votes for a column during a timed
//! window, and the most voted column is played for the team. This crate holds
//! the board model, the vote tally and the voting window state machine, and
//! leaves transport and sessions to the embedding server.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
use serde::Serialize;

pub mod constants;

pub mod board;
pub mod config;
pub mod room_id;
pub mod rooms;
pub mod roster;
pub mod state;
pub mod tally;
pub mod timer;
pub mod turn;

/// Messages relayed to the participants of a room
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum OutgoingMessage {
    /// Snapshot of the game
    Sync(state::SyncMessage),
    /// Outcome of a resolved round
    Resolution(turn::Resolution),
    /// A vote was refused
    Rejected(turn::VoteError),
}

impl OutgoingMessage {
    /// Converts the message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{board::Team, constants::board::COLUMNS, state::GameState};

    #[test]
    fn test_sync_to_message() {
        let game = GameState::new(Team::Red);
        let message = OutgoingMessage::from(game.sync_message(0, [0; COLUMNS])).to_message();

        assert!(message.contains("Sync"));
        assert!(message.contains("Waiting"));
        assert!(message.contains("Red"));
    }

    #[test]
    fn test_rejection_to_message() {
        let message = OutgoingMessage::from(turn::VoteError::ColumnFull(4)).to_message();

        assert_eq!(message, r#"{"Rejected":{"ColumnFull":4}}"#);
    }
}
