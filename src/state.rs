//! Game state
//!
//! Everything a room needs to know about the game in progress: the board,
//! whose turn it is, the open voting window (if any) and how the game ended.
//! The state is owned by the room orchestration and handed to the
//! [`TurnManager`](crate::turn::TurnManager) by reference.

use std::{collections::HashMap, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
    board::{Board, Coordinate, Team},
    constants::board::{COLUMNS, WIN_LENGTH},
    roster::{Id, Roster},
    tally::VoteTally,
};

/// Votes collected while a window is open, together with its deadline
///
/// Votes and deadline only exist together: a game without a window has
/// neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingWindow {
    /// Column chosen by each player who voted so far
    pub votes: HashMap<Id, usize>,
    /// Deadline in milliseconds since the Unix epoch
    pub ends_at: u64,
}

impl VotingWindow {
    /// Creates a window without votes closing at `ends_at`
    pub fn new(ends_at: u64) -> Self {
        Self {
            votes: HashMap::new(),
            ends_at,
        }
    }
}

/// The last piece that was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMove {
    /// Column the piece was dropped into
    pub column: usize,
    /// Row the piece landed in
    pub row: usize,
    /// Team owning the piece
    pub team: Team,
}

impl LastMove {
    /// Position of the piece on the board
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.column, self.row)
    }
}

/// How a game ended
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// A team completed a line
    Winner {
        /// The winning team
        team: Team,
        /// The four cells of the winning line, when known
        line: Option<[Coordinate; WIN_LENGTH]>,
    },
    /// The board filled up without a line
    Draw,
}

impl GameResult {
    /// Whether the game ended in a draw
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw)
    }

    /// The winning team, if any
    pub fn winner(&self) -> Option<Team> {
        match self {
            Self::Winner { team, .. } => Some(*team),
            Self::Draw => None,
        }
    }
}

/// State of one game in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub(crate) board: Board,
    pub(crate) team: Team,
    pub(crate) starting_team: Team,
    pub(crate) round: u64,
    pub(crate) window: Option<VotingWindow>,
    pub(crate) vote_counts: VoteTally,
    pub(crate) last_move: Option<LastMove>,
    pub(crate) result: Option<GameResult>,
}

/// Snapshot of a game sent to participants joining or refreshing mid-game
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// A voting window is open
    Voting {
        /// Current board
        board: Board,
        /// Team whose members are voting
        team: Team,
        /// Current round, starting at 1
        round: u64,
        /// Deadline in milliseconds since the Unix epoch
        ends_at: u64,
        /// Time left before the deadline
        #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
        remaining: Duration,
        /// Live tally of the active team's votes
        counts: VoteTally,
        /// The previous move, if any
        last_move: Option<LastMove>,
    },
    /// Between two voting windows
    Waiting {
        /// Current board
        board: Board,
        /// Team that plays next
        team: Team,
        /// Current round, starting at 1
        round: u64,
        /// Tally of the last resolved round
        counts: VoteTally,
        /// The previous move, if any
        last_move: Option<LastMove>,
    },
    /// The game is over
    Finished {
        /// Final board
        board: Board,
        /// How the game ended
        result: GameResult,
        /// Tally of the last resolved round
        counts: VoteTally,
        /// The final move, if any
        last_move: Option<LastMove>,
    },
}

impl GameState {
    /// Creates a fresh game at round 1 with `starting_team` to play
    pub fn new(starting_team: Team) -> Self {
        Self {
            board: Board::new(),
            team: starting_team,
            starting_team,
            round: 1,
            window: None,
            vote_counts: [0; COLUMNS],
            last_move: None,
            result: None,
        }
    }

    /// Replaces this game with a fresh one for the same roster
    ///
    /// Teams are kept; every player's matching vote counter is reset. Rooms
    /// with a turn manager go through [`TurnManager::rematch`], which also
    /// cancels the pending deadline.
    ///
    /// [`TurnManager::rematch`]: crate::turn::TurnManager::rematch
    #[must_use]
    pub fn rematch(&self, roster: &mut Roster) -> Self {
        roster.reset_matching_votes();
        Self::new(self.starting_team)
    }

    /// The current board
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The team whose turn it is
    pub fn team(&self) -> Team {
        self.team
    }

    /// The current round, starting at 1
    pub fn round(&self) -> u64 {
        self.round
    }

    /// The open voting window, if any
    pub fn window(&self) -> Option<&VotingWindow> {
        self.window.as_ref()
    }

    /// The vote recorded for a player in the open window
    pub fn vote_of(&self, player: Id) -> Option<usize> {
        self.window.as_ref()?.votes.get(&player).copied()
    }

    /// Deadline of the open window in milliseconds since the Unix epoch
    pub fn ends_at(&self) -> Option<u64> {
        self.window.as_ref().map(|window| window.ends_at)
    }

    /// Time left in the open window as seen from `now_millis`
    pub fn remaining(&self, now_millis: u64) -> Option<Duration> {
        self.ends_at()
            .map(|ends_at| Duration::from_millis(ends_at.saturating_sub(now_millis)))
    }

    /// Tally computed when the last round was resolved
    pub fn vote_counts(&self) -> &VoteTally {
        &self.vote_counts
    }

    /// The last piece dropped
    pub fn last_move(&self) -> Option<LastMove> {
        self.last_move
    }

    /// How the game ended, if it did
    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    /// Whether the game has ended
    pub fn is_over(&self) -> bool {
        self.result.is_some()
    }

    /// Builds the snapshot for a participant
    ///
    /// # Arguments
    ///
    /// * `now_millis` - Current time, used for the remaining duration
    /// * `live_counts` - Live tally of the active team's votes
    pub fn sync_message(&self, now_millis: u64, live_counts: VoteTally) -> SyncMessage {
        match (&self.result, &self.window) {
            (Some(result), _) => SyncMessage::Finished {
                board: self.board,
                result: *result,
                counts: self.vote_counts,
                last_move: self.last_move,
            },
            (None, Some(window)) => SyncMessage::Voting {
                board: self.board,
                team: self.team,
                round: self.round,
                ends_at: window.ends_at,
                remaining: Duration::from_millis(window.ends_at.saturating_sub(now_millis)),
                counts: live_counts,
                last_move: self.last_move,
            },
            (None, None) => SyncMessage::Waiting {
                board: self.board,
                team: self.team,
                round: self.round,
                counts: self.vote_counts,
                last_move: self.last_move,
            },
        }
    }
}
