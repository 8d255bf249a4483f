//! Configuration constants for the team Connect Four engine
//!
//! This module contains the board dimensions and the limits used to
//! validate room options, grouped the same way the rest of the crate
//! groups its concerns.

/// Board geometry
pub mod board {
    /// Number of rows on the board (row 0 is the top)
    pub const ROWS: usize = 6;
    /// Number of columns on the board
    pub const COLUMNS: usize = 7;
    /// Number of aligned pieces needed to win
    pub const WIN_LENGTH: usize = 4;
}

/// Room roster limits
pub mod roster {
    /// Minimum number of players for a room to start a game
    pub const MIN_PLAYER_COUNT: usize = 2;
    /// Maximum number of players allowed in a single room
    pub const MAX_PLAYER_COUNT: usize = 10;
}

/// Voting window limits
pub mod voting {
    /// Minimum length in seconds of a voting window
    pub const MIN_VOTE_SECONDS: u64 = 5;
    /// Maximum length in seconds of a voting window
    pub const MAX_VOTE_SECONDS: u64 = 120;
    /// Voting window length used when a room does not configure one
    pub const DEFAULT_VOTE_SECONDS: u64 = 30;
}
