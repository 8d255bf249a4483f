//! Voting windows and round resolution
//!
//! A [`TurnManager`] drives the voting window of a single room. It opens a
//! window with a deadline, validates votes while the window is open and
//! resolves the round exactly once, either because the orchestration saw the
//! whole active team vote or because the deadline went off.
//!
//! The deadline never resolves a round by itself. When the scheduled
//! [`Alarm`] comes back, the manager notifies the room's completion handler
//! and leaves the resolution to the orchestration, which then calls
//! [`TurnManager::finish_window`] with the generation it was told about. Every
//! resolution path first moves the window from open to closed; whoever
//! loses that race gets an error instead of resolving a second time.

use std::{fmt::Debug, time::Duration};

use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::{
    board::{Coordinate, Team},
    constants::board::COLUMNS,
    room_id::RoomId,
    roster::{Id, Roster},
    state::{GameResult, GameState, LastMove, VotingWindow},
    tally::{self, VoteTally},
    timer::{Alarm, Clock, Generation, Scheduler, TimerId},
};

/// Reasons a vote is rejected
///
/// Rejections never change any state; the message is meant to be relayed to
/// the player who voted.
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteError {
    /// No voting window is open
    #[error("voting is closed")]
    WindowClosed,
    /// The voter is not part of the room
    #[error("you are not a player in this room")]
    PlayerNotFound,
    /// The voter's team is not the one playing this round
    #[error("it is not your team's turn")]
    WrongTeam,
    /// The column does not exist
    #[error("column {0} does not exist")]
    InvalidColumn(i64),
    /// The column has no room left
    #[error("column {0} is full")]
    ColumnFull(usize),
}

/// Reasons a window operation is refused
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnError {
    /// There is no open window to resolve
    #[error("no voting window is open")]
    WindowClosed,
    /// The request was made for a window that is no longer the open one
    #[error("voting window {requested} is not the open window")]
    StaleWindow {
        /// Generation the caller asked for
        requested: Generation,
    },
    /// The game already has a result
    #[error("the game is over")]
    GameOver,
}

/// Signals delivered to a room's completion handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Completion {
    /// The deadline of a window elapsed; the handler should resolve it
    Timeout {
        /// Room whose window timed out
        room: RoomId,
        /// Window that timed out
        generation: Generation,
    },
}

/// Callback receiving completion signals for one room
pub type CompletionHandler = Box<dyn FnMut(Completion) + Send>;

/// Outcome of resolving a voting window
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Window that was resolved
    pub generation: Generation,
    /// Whether a piece was dropped
    pub move_applied: bool,
    /// Whether the game is over
    pub game_ended: bool,
    /// Column that was played
    pub chosen_column: Option<usize>,
    /// Votes per playable column
    pub counts: VoteTally,
    /// Final result when the game ended
    pub result: Option<GameResult>,
    /// Unexpected failure while applying the move
    pub error: Option<String>,
}

impl Resolution {
    /// Converts the resolution to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Lifecycle of the room's voting window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Closed,
    Open {
        generation: Generation,
        timer: TimerId,
        /// Set once the deadline has been reported to the completion handler
        timed_out: bool,
    },
}

/// Runs the voting windows of one room
///
/// The manager only keeps window metadata; the [`GameState`] and [`Roster`]
/// stay with the caller and are passed into each operation.
pub struct TurnManager<T> {
    room: RoomId,
    timer: T,
    rng: fastrand::Rng,
    generation: Generation,
    window: Window,
    on_complete: Option<CompletionHandler>,
}

impl<T> Debug for TurnManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnManager")
            .field("room", &self.room)
            .field("generation", &self.generation)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl<T: Clock + Scheduler> TurnManager<T> {
    /// Creates a manager for `room` with no open window
    pub fn new(room: RoomId, timer: T) -> Self {
        Self {
            room,
            timer,
            rng: fastrand::Rng::new(),
            generation: Generation::default(),
            window: Window::Closed,
            on_complete: None,
        }
    }

    /// Replaces the random source used to break ties
    #[must_use]
    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    /// The room this manager belongs to
    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Generation of the most recently opened window
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a window is open, including one whose deadline was reported
    pub fn is_open(&self) -> bool {
        matches!(self.window, Window::Open { .. })
    }

    /// Whether votes are currently accepted
    fn is_accepting(&self) -> bool {
        matches!(
            self.window,
            Window::Open {
                timed_out: false,
                ..
            }
        )
    }

    /// The clock and scheduler of this manager
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Registers the handler receiving this room's completion signals
    pub fn set_completion_handler(&mut self, handler: impl FnMut(Completion) + Send + 'static) {
        self.on_complete = Some(Box::new(handler));
    }

    /// Opens a voting window closing `timer_seconds` from now
    ///
    /// Any deadline still pending for this room is cancelled first. Votes of
    /// a window that is still open carry over into the new one; otherwise
    /// the window starts without votes.
    ///
    /// # Returns
    ///
    /// The generation identifying the new window
    ///
    /// # Errors
    ///
    /// Returns `TurnError::GameOver` if the game already has a result.
    pub fn start_voting(
        &mut self,
        game: &mut GameState,
        timer_seconds: u64,
    ) -> Result<Generation, TurnError> {
        if game.is_over() {
            return Err(TurnError::GameOver);
        }

        let carried_votes = match self.window {
            Window::Open { timer, .. } => {
                self.timer.cancel(timer);
                game.window.take().map(|window| window.votes)
            }
            Window::Closed => {
                if game.window.take().is_some() {
                    warn!(
                        "room {}: discarding votes of a window that was never opened here",
                        self.room
                    );
                }
                None
            }
        };

        let generation = self.generation.next();
        self.generation = generation;

        let duration = Duration::from_secs(timer_seconds);
        let ends_at = self.timer.now_millis() + timer_seconds.saturating_mul(1000);

        game.window = Some(VotingWindow {
            votes: carried_votes.unwrap_or_default(),
            ends_at,
        });

        let timer = self.timer.schedule(
            Alarm {
                room: self.room,
                generation,
            },
            duration,
        );

        self.window = Window::Open {
            generation,
            timer,
            timed_out: false,
        };

        debug!(
            "room {}: window {generation} open for {} until {ends_at}",
            self.room, game.team
        );

        Ok(generation)
    }

    /// Records a player's vote, replacing any earlier vote of theirs
    ///
    /// Casting a vote never resolves the round; callers wanting to close the
    /// window early check [`TurnManager::has_all_team_voted`].
    ///
    /// # Errors
    ///
    /// Returns the first failing check, in order: `WindowClosed`,
    /// `PlayerNotFound`, `WrongTeam`, `InvalidColumn`, `ColumnFull`.
    pub fn cast_vote(
        &self,
        game: &mut GameState,
        roster: &Roster,
        player: Id,
        column: i64,
    ) -> Result<(), VoteError> {
        if !self.is_accepting() || game.is_over() {
            return Err(VoteError::WindowClosed);
        }
        let board = game.board;
        let team = game.team;
        let Some(window) = game.window.as_mut() else {
            return Err(VoteError::WindowClosed);
        };

        let voter = roster.get(player).ok_or(VoteError::PlayerNotFound)?;
        if voter.team != team {
            return Err(VoteError::WrongTeam);
        }

        let column = usize::try_from(column)
            .ok()
            .filter(|&column| column < COLUMNS)
            .ok_or(VoteError::InvalidColumn(column))?;
        if !board.is_valid_move(column) {
            return Err(VoteError::ColumnFull(column));
        }

        window.votes.insert(player, column);
        debug!("room {}: {player} votes for column {column}", self.room);

        Ok(())
    }

    /// Whether every connected player of the active team has voted
    pub fn has_all_team_voted(&self, game: &GameState, roster: &Roster) -> bool {
        let Some(window) = game.window() else {
            return false;
        };
        roster
            .connected_team_members(game.team)
            .iter()
            .all(|id| window.votes.contains_key(id))
    }

    /// Live tally of the votes cast by members of `team`
    pub fn team_vote_counts(&self, game: &GameState, roster: &Roster, team: Team) -> VoteTally {
        game.window()
            .map_or([0; COLUMNS], |window| {
                tally::team_vote_counts(&window.votes, roster, team)
            })
    }

    /// Handles a deadline delivered by the scheduler
    ///
    /// The completion handler is notified at most once per window. Alarms for
    /// another room, for an earlier window, or repeated alarms are ignored.
    ///
    /// # Returns
    ///
    /// `true` if the completion handler was notified
    pub fn receive_alarm(&mut self, alarm: Alarm) -> bool {
        if alarm.room != self.room {
            warn!("room {}: ignoring alarm for room {}", self.room, alarm.room);
            return false;
        }

        match &mut self.window {
            Window::Open {
                generation,
                timed_out,
                ..
            } if *generation == alarm.generation && !*timed_out => {
                *timed_out = true;
                let signal = Completion::Timeout {
                    room: self.room,
                    generation: *generation,
                };
                match self.on_complete.as_mut() {
                    Some(handler) => handler(signal),
                    None => warn!("room {}: window timed out without a handler", self.room),
                }
                true
            }
            _ => {
                debug!(
                    "room {}: ignoring stale alarm for window {}",
                    self.room, alarm.generation
                );
                false
            }
        }
    }

    /// Closes the open window without resolving it
    ///
    /// Used when a room shuts down; the pending deadline is cancelled and the
    /// votes are dropped.
    pub fn cancel_voting(&mut self, game: &mut GameState) {
        self.shutdown();
        game.window = None;
    }

    /// Closes the open window and cancels its deadline
    ///
    /// Unlike [`TurnManager::cancel_voting`] this leaves the game untouched,
    /// for rooms torn down without their state at hand.
    ///
    /// # Returns
    ///
    /// `true` if a window was open
    pub fn shutdown(&mut self) -> bool {
        match std::mem::replace(&mut self.window, Window::Closed) {
            Window::Open { timer, .. } => {
                self.timer.cancel(timer);
                true
            }
            Window::Closed => false,
        }
    }

    /// Replaces `game` with a fresh one for the same roster
    ///
    /// The open window, if any, is dropped and its deadline cancelled, so a
    /// timer from the previous game can never reach the new one.
    pub fn rematch(&mut self, game: &mut GameState, roster: &mut Roster) {
        if self.shutdown() {
            debug!("room {}: rematch dropped window {}", self.room, self.generation);
        }
        *game = game.rematch(roster);
        info!("room {}: rematch, {} starts", self.room, game.team);
    }

    /// Resolves the open window, whatever its generation
    ///
    /// # Errors
    ///
    /// Returns `TurnError::WindowClosed` if no window is open, which is also
    /// what a second call for the same window gets, and `TurnError::GameOver`
    /// if the game already has a result. A game without a window of its own
    /// (one replaced by a rematch, for instance) is refused with
    /// `TurnError::WindowClosed` and left untouched, and the manager's window
    /// is closed along with its deadline.
    pub fn finish_voting(
        &mut self,
        game: &mut GameState,
        roster: &mut Roster,
    ) -> Result<Resolution, TurnError> {
        let generation = self.close_window(None, game)?;
        self.resolve(generation, game, roster)
    }

    /// Resolves the window identified by `generation`
    ///
    /// Completion handlers use this with the generation they were signalled,
    /// so a signal from an older window can never resolve a newer one.
    ///
    /// # Errors
    ///
    /// Returns `TurnError::StaleWindow` if another window is open, and the
    /// errors of [`TurnManager::finish_voting`] otherwise.
    pub fn finish_window(
        &mut self,
        generation: Generation,
        game: &mut GameState,
        roster: &mut Roster,
    ) -> Result<Resolution, TurnError> {
        let generation = self.close_window(Some(generation), game)?;
        self.resolve(generation, game, roster)
    }

    /// Moves the window from open to closed, cancelling its deadline
    fn close_window(
        &mut self,
        expected: Option<Generation>,
        game: &GameState,
    ) -> Result<Generation, TurnError> {
        let Window::Open {
            generation, timer, ..
        } = self.window
        else {
            warn!("room {}: resolution requested with no open window", self.room);
            return Err(TurnError::WindowClosed);
        };

        if let Some(requested) = expected.filter(|&requested| requested != generation) {
            warn!(
                "room {}: resolution requested for window {requested} while {generation} is open",
                self.room
            );
            return Err(TurnError::StaleWindow { requested });
        }

        self.window = Window::Closed;
        self.timer.cancel(timer);

        if game.window.is_none() {
            warn!(
                "room {}: window {generation} has no votes in this game, dropping it",
                self.room
            );
            return Err(TurnError::WindowClosed);
        }

        Ok(generation)
    }

    fn resolve(
        &mut self,
        generation: Generation,
        game: &mut GameState,
        roster: &mut Roster,
    ) -> Result<Resolution, TurnError> {
        let Some(VotingWindow { votes, .. }) = game.window.take() else {
            return Err(TurnError::WindowClosed);
        };

        if game.is_over() {
            return Err(TurnError::GameOver);
        }

        let room = self.room;
        let team = game.team;
        let valid_columns = game.board.playable_columns();

        let ended = |game: &mut GameState,
                     result: GameResult,
                     counts: VoteTally,
                     chosen_column: Option<usize>| {
            game.result = Some(result);
            info!("room {room}: game over after round {}: {result:?}", game.round);
            Resolution {
                generation,
                move_applied: chosen_column.is_some(),
                game_ended: true,
                chosen_column,
                counts,
                result: Some(result),
                error: None,
            }
        };

        if valid_columns.is_empty() {
            return Ok(ended(game, GameResult::Draw, [0; COLUMNS], None));
        }

        let counts = tally::tally_votes(votes.values().copied(), &valid_columns);
        game.vote_counts = counts;

        let Some(column) = tally::decide_column(&counts, &valid_columns, &mut self.rng) else {
            error!("room {}: no column decided from {valid_columns:?}", self.room);
            return Ok(Resolution {
                generation,
                move_applied: false,
                game_ended: false,
                chosen_column: None,
                counts,
                result: None,
                error: Some("no column could be decided".to_owned()),
            });
        };

        let matching = votes
            .iter()
            .filter(|&(_, &vote)| vote == column)
            .map(|(id, _)| *id)
            .filter(|id| roster.get(*id).is_some_and(|player| player.team == team))
            .collect_vec();
        for id in matching {
            roster.record_matching_vote(id);
        }

        let (board, row) = match game.board.apply_move(column, team) {
            Ok(applied) => applied,
            Err(e) => {
                error!("room {}: failed to play column {column}: {e}", self.room);
                return Ok(Resolution {
                    generation,
                    move_applied: false,
                    game_ended: false,
                    chosen_column: Some(column),
                    counts,
                    result: None,
                    error: Some(e.to_string()),
                });
            }
        };

        game.board = board;
        game.last_move = Some(LastMove { column, row, team });

        if let Some(win) = board.check_win(Coordinate::new(column, row)) {
            let result = GameResult::Winner {
                team: win.team,
                line: Some(win.line),
            };
            return Ok(ended(game, result, counts, Some(column)));
        }

        if board.is_full() {
            return Ok(ended(game, GameResult::Draw, counts, Some(column)));
        }

        game.team = team.next();
        game.round += 1;

        info!(
            "room {}: round {} played column {column} for {team}",
            self.room,
            game.round - 1
        );

        Ok(Resolution {
            generation,
            move_applied: true,
            game_ended: false,
            chosen_column: Some(column),
            counts,
            result: None,
            error: None,
        })
    }
}
