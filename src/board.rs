//! Board model
//!
//! The 6x7 Connect Four grid as a plain value type. Every operation that
//! places a piece hands back a new [`Board`]; the board it was called on is
//! never touched, so callers can keep earlier positions around freely.

use enum_map::Enum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::board::{COLUMNS, ROWS, WIN_LENGTH};

/// One of the two competing teams
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Enum,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
pub enum Team {
    /// The red team
    Red,
    /// The yellow team
    Yellow,
}

impl Team {
    /// Returns the team that plays after this one
    pub fn next(self) -> Self {
        match self {
            Self::Red => Self::Yellow,
            Self::Yellow => Self::Red,
        }
    }
}

/// A position on the board
///
/// Row 0 is the top of the board, row 5 the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    /// Column index in `[0, 7)`
    pub column: usize,
    /// Row index in `[0, 6)`
    pub row: usize,
}

impl Coordinate {
    /// Creates a coordinate from a column and a row
    pub fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }

    /// Moves the coordinate by the given step, returning `None` when it leaves the board
    fn offset(self, (column_step, row_step): (isize, isize)) -> Option<Self> {
        let column = self.column.checked_add_signed(column_step)?;
        let row = self.row.checked_add_signed(row_step)?;
        (column < COLUMNS && row < ROWS).then_some(Self { column, row })
    }
}

/// Reasons a piece cannot be dropped into a column
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// The column index is outside of the board
    #[error("column {0} is not on the board")]
    InvalidMove(usize),
    /// The column has no empty cell left
    #[error("column {0} is full")]
    ColumnFull(usize),
}

/// A completed line of four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Win {
    /// The team owning the line
    pub team: Team,
    /// The first four cells of the run, in scan order
    pub line: [Coordinate; WIN_LENGTH],
}

/// Horizontal, vertical, falling diagonal, rising diagonal
const AXES: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

/// The 6x7 grid, indexed as `cells[row][column]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Board {
    cells: [[Option<Team>; COLUMNS]; ROWS],
}

impl Board {
    /// Creates an empty board
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the piece at the given position, if any
    pub fn cell(&self, Coordinate { column, row }: Coordinate) -> Option<Team> {
        self.cells
            .get(row)
            .and_then(|cells| cells.get(column))
            .copied()
            .flatten()
    }

    /// Whether a piece can be dropped into `column`
    ///
    /// A column is playable iff it exists and its top cell is empty.
    pub fn is_valid_move(&self, column: usize) -> bool {
        column < COLUMNS && self.cells[0][column].is_none()
    }

    /// Drops a piece for `team` into `column`
    ///
    /// # Returns
    ///
    /// The new board and the row the piece landed in
    ///
    /// # Errors
    ///
    /// Returns `MoveError::InvalidMove` for a column outside the board and
    /// `MoveError::ColumnFull` when the column has no room left.
    pub fn apply_move(&self, column: usize, team: Team) -> Result<(Board, usize), MoveError> {
        if column >= COLUMNS {
            return Err(MoveError::InvalidMove(column));
        }
        if !self.is_valid_move(column) {
            return Err(MoveError::ColumnFull(column));
        }

        let row = (0..ROWS)
            .rev()
            .find(|&row| self.cells[row][column].is_none())
            .ok_or(MoveError::ColumnFull(column))?;

        let mut next = *self;
        next.cells[row][column] = Some(team);

        Ok((next, row))
    }

    /// Looks for a line of four passing through the last placed piece
    ///
    /// Only lines through `last` are inspected, since no other line can have
    /// been completed by that move.
    pub fn check_win(&self, last: Coordinate) -> Option<Win> {
        let team = self.cell(last)?;
        let owned = |coordinate: &Coordinate| self.cell(*coordinate) == Some(team);

        AXES.iter().find_map(|&(column_step, row_step)| {
            let start = std::iter::successors(Some(last), |c| {
                c.offset((-column_step, -row_step)).filter(owned)
            })
            .last()
            .unwrap_or(last);

            let run = std::iter::successors(Some(start), |c| {
                c.offset((column_step, row_step)).filter(owned)
            })
            .take(WIN_LENGTH)
            .collect_vec();

            let line: [Coordinate; WIN_LENGTH] = run.try_into().ok()?;
            Some(Win { team, line })
        })
    }

    /// Whether every column is topped out
    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(Option::is_some)
    }

    /// Columns that can currently receive a piece, in ascending order
    pub fn playable_columns(&self) -> Vec<usize> {
        (0..COLUMNS)
            .filter(|&column| self.is_valid_move(column))
            .collect_vec()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn play(board: Board, moves: &[(usize, Team)]) -> (Board, Coordinate) {
        moves.iter().fold(
            (board, Coordinate::new(0, 0)),
            |(board, _), &(column, team)| {
                let (board, row) = board.apply_move(column, team).unwrap();
                (board, Coordinate::new(column, row))
            },
        )
    }

    fn coords(cells: [(usize, usize); 4]) -> [Coordinate; 4] {
        cells.map(|(column, row)| Coordinate::new(column, row))
    }

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new();
        for column in 0..COLUMNS {
            assert!(board.is_valid_move(column));
            for row in 0..ROWS {
                assert_eq!(board.cell(Coordinate::new(column, row)), None);
            }
        }
        assert!(!board.is_full());
        assert_eq!(board.playable_columns(), vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_next_team_cycles() {
        assert_eq!(Team::Red.next(), Team::Yellow);
        assert_eq!(Team::Yellow.next(), Team::Red);
        assert_eq!(Team::Red.next().next(), Team::Red);
    }

    #[test]
    fn test_apply_move_leaves_input_untouched() {
        let board = Board::new();
        let (next, row) = board.apply_move(3, Team::Red).unwrap();

        assert_eq!(row, 5);
        assert_eq!(next.cell(Coordinate::new(3, 5)), Some(Team::Red));
        assert_eq!(board, Board::new());
    }

    #[test]
    fn test_moves_stack_from_the_bottom() {
        let mut board = Board::new();
        let mut team = Team::Red;
        for expected_row in (0..ROWS).rev() {
            let (next, row) = board.apply_move(2, team).unwrap();
            assert_eq!(row, expected_row);
            assert_eq!(next.cell(Coordinate::new(2, row)), Some(team));
            board = next;
            team = team.next();
        }

        assert!(!board.is_valid_move(2));
        assert_eq!(board.apply_move(2, team), Err(MoveError::ColumnFull(2)));
        assert_eq!(board.playable_columns(), vec![0, 1, 3, 4, 5, 6]);
    }

    #[test]
    fn test_out_of_range_column_is_invalid() {
        let board = Board::new();
        assert!(!board.is_valid_move(COLUMNS));
        assert!(!board.is_valid_move(usize::MAX));
        assert_eq!(
            board.apply_move(COLUMNS, Team::Red),
            Err(MoveError::InvalidMove(COLUMNS))
        );
    }

    #[test]
    fn test_full_board() {
        let mut board = Board::new();
        let mut team = Team::Red;
        for column in 0..COLUMNS {
            for _ in 0..ROWS {
                board = board.apply_move(column, team).unwrap().0;
                team = team.next();
            }
        }
        assert!(board.is_full());
        assert!(board.playable_columns().is_empty());
    }

    #[test]
    fn test_horizontal_win_on_bottom_row() {
        let (board, last) = play(
            Board::new(),
            &[
                (0, Team::Red),
                (1, Team::Red),
                (2, Team::Red),
                (3, Team::Red),
            ],
        );

        let win = board.check_win(last).unwrap();
        assert_eq!(win.team, Team::Red);
        assert_eq!(win.line, coords([(0, 5), (1, 5), (2, 5), (3, 5)]));
    }

    #[test]
    fn test_horizontal_win_from_middle_piece() {
        let (board, _) = play(
            Board::new(),
            &[(1, Team::Yellow), (2, Team::Yellow), (4, Team::Yellow)],
        );
        let (board, row) = board.apply_move(3, Team::Yellow).unwrap();

        let win = board.check_win(Coordinate::new(3, row)).unwrap();
        assert_eq!(win.team, Team::Yellow);
        assert_eq!(win.line, coords([(1, 5), (2, 5), (3, 5), (4, 5)]));
    }

    #[test]
    fn test_vertical_win() {
        let (board, last) = play(Board::new(), &[(0, Team::Red); 4]);

        let win = board.check_win(last).unwrap();
        assert_eq!(win.team, Team::Red);
        assert_eq!(win.line, coords([(0, 2), (0, 3), (0, 4), (0, 5)]));
    }

    #[test]
    fn test_rising_diagonal_win() {
        let (board, last) = play(
            Board::new(),
            &[
                (0, Team::Red),
                (1, Team::Yellow),
                (1, Team::Red),
                (2, Team::Yellow),
                (2, Team::Yellow),
                (2, Team::Red),
                (3, Team::Yellow),
                (3, Team::Yellow),
                (3, Team::Yellow),
                (3, Team::Red),
            ],
        );

        let win = board.check_win(last).unwrap();
        assert_eq!(win.team, Team::Red);
        assert_eq!(win.line, coords([(0, 5), (1, 4), (2, 3), (3, 2)]));
    }

    #[test]
    fn test_falling_diagonal_win() {
        let (board, last) = play(
            Board::new(),
            &[
                (3, Team::Red),
                (2, Team::Yellow),
                (2, Team::Red),
                (1, Team::Yellow),
                (1, Team::Yellow),
                (1, Team::Red),
                (0, Team::Yellow),
                (0, Team::Yellow),
                (0, Team::Yellow),
                (0, Team::Red),
            ],
        );

        let win = board.check_win(last).unwrap();
        assert_eq!(win.team, Team::Red);
        assert_eq!(win.line, coords([(0, 2), (1, 3), (2, 4), (3, 5)]));
    }

    #[test]
    fn test_three_in_a_row_is_not_a_win() {
        let (board, last) = play(
            Board::new(),
            &[
                (0, Team::Red),
                (1, Team::Red),
                (2, Team::Red),
                (3, Team::Yellow),
            ],
        );

        assert_eq!(board.check_win(last), None);
        assert_eq!(board.check_win(Coordinate::new(2, 5)), None);
    }

    #[test]
    fn test_check_win_on_empty_cell() {
        assert_eq!(Board::new().check_win(Coordinate::new(3, 5)), None);
    }

    #[test]
    fn test_board_serializes() {
        let (board, _) = play(Board::new(), &[(3, Team::Red)]);
        let json = serde_json::to_string(&board).unwrap();
        assert!(json.contains("Red"));
        let parsed: Board = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, board);
    }
}
