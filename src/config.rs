//! Room options
//!
//! Settings a room chooses before its first game, validated with `garde`
//! against the limits in [`crate::constants`].

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    board::Team,
    constants::{roster, voting},
    roster::Roster,
    state::GameState,
};

type ValidationResult = garde::Result;

/// Checks that a voting window lasts a whole number of seconds within bounds
fn validate_vote_duration(val: &Duration, _ctx: &()) -> ValidationResult {
    if val.subsec_nanos() != 0 {
        return Err(garde::Error::new("must be a whole number of seconds"));
    }
    if (voting::MIN_VOTE_SECONDS..=voting::MAX_VOTE_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "outside of bounds [{},{}]",
            voting::MIN_VOTE_SECONDS,
            voting::MAX_VOTE_SECONDS
        )))
    }
}

/// Configuration of a room
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Options {
    /// How long each voting window stays open
    #[garde(custom(validate_vote_duration))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    vote_duration: Duration,
    /// Largest roster the room accepts
    #[garde(range(min = roster::MIN_PLAYER_COUNT, max = roster::MAX_PLAYER_COUNT))]
    max_players: usize,
    /// Team that plays the first round of each game
    #[garde(skip)]
    starting_team: Team,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            vote_duration: Duration::from_secs(voting::DEFAULT_VOTE_SECONDS),
            max_players: roster::MAX_PLAYER_COUNT,
            starting_team: Team::Red,
        }
    }
}

impl Options {
    /// Creates options from their parts; call `validate` before use
    pub fn new(vote_duration: Duration, max_players: usize, starting_team: Team) -> Self {
        Self {
            vote_duration,
            max_players,
            starting_team,
        }
    }

    /// Length of a voting window in whole seconds
    pub fn vote_seconds(&self) -> u64 {
        self.vote_duration.as_secs()
    }

    /// An empty roster sized for this room
    pub fn roster(&self) -> Roster {
        Roster::new(self.max_players)
    }

    /// A fresh game for this room
    pub fn new_game(&self) -> GameState {
        GameState::new(self.starting_team)
    }
}
