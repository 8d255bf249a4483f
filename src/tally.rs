//! Vote tallying and column decision
//!
//! Turns the votes of a round into per-column counts and picks the column
//! that gets played. Only playable columns take part: votes for anything
//! else are dropped, and the chosen column is always one the board accepts.

use std::collections::HashMap;

use itertools::Itertools;

use crate::{
    board::Team,
    constants::board::COLUMNS,
    roster::{Id, Roster},
};

/// Votes received by each column during one round
pub type VoteTally = [usize; COLUMNS];

/// Counts votes per column, ignoring votes for columns outside `valid_columns`
///
/// Votes can be given in any integer type; values that do not fit a column
/// index (negative numbers, for example) are dropped like any other
/// unplayable column.
pub fn tally_votes<C, I>(votes: I, valid_columns: &[usize]) -> VoteTally
where
    C: TryInto<usize>,
    I: IntoIterator<Item = C>,
{
    let mut counts = [0; COLUMNS];

    for column in votes
        .into_iter()
        .filter_map(|column| -> Option<usize> { column.try_into().ok() })
        .filter(|&column| column < COLUMNS && valid_columns.contains(&column))
    {
        counts[column] += 1;
    }

    counts
}

/// Picks the column to play from a tally
///
/// The most voted valid column wins, with ties broken uniformly at random.
/// When no valid column received a vote, any valid column may be picked.
/// Repeated entries in `valid_columns` count once, and entries that are not
/// board columns are ignored.
///
/// # Returns
///
/// `None` only when `valid_columns` holds no board column.
pub fn decide_column(
    counts: &VoteTally,
    valid_columns: &[usize],
    rng: &mut fastrand::Rng,
) -> Option<usize> {
    let count_of = |column: usize| counts.get(column).copied().unwrap_or(0);

    let columns = valid_columns
        .iter()
        .copied()
        .filter(|&column| column < COLUMNS)
        .unique()
        .collect_vec();

    let candidates = columns
        .iter()
        .copied()
        .max_set_by_key(|&column| count_of(column));

    let pool = match candidates.first() {
        Some(&column) if count_of(column) > 0 => candidates,
        _ => columns,
    };

    rng.choice(pool)
}

/// Live tally of the votes cast by members of `team`
///
/// Used for progress display while a window is open; it plays no part in
/// deciding the column.
pub fn team_vote_counts(votes: &HashMap<Id, usize>, roster: &Roster, team: Team) -> VoteTally {
    let all_columns = (0..COLUMNS).collect_vec();

    tally_votes(
        votes
            .iter()
            .filter(|(id, _)| roster.get(**id).is_some_and(|player| player.team == team))
            .map(|(_, column)| *column),
        &all_columns,
    )
}
