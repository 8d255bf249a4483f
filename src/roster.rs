//! Player roster
//!
//! The roster is owned by the room orchestration; the turn engine only reads
//! team assignments and connection flags from it and bumps the matching
//! vote counters when a round resolves.

use std::{
    collections::{HashMap, HashSet},
    fmt::Display,
    str::FromStr,
};

use enum_map::EnumMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::board::Team;

/// A unique identifier for a player, bound to their connection
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random player ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A member of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Connection-bound identifier
    pub id: Id,
    /// Display name
    pub name: String,
    /// Team the player votes for
    pub team: Team,
    /// Whether the player administers the room
    pub admin: bool,
    /// How many times this player's vote matched the column that got played
    pub matching_votes: u64,
    /// Whether the player currently has a live connection
    pub connected: bool,
}

impl Player {
    /// Creates a connected, non-admin player with no matching votes
    pub fn new(id: Id, name: impl Into<String>, team: Team) -> Self {
        Self {
            id,
            name: name.into(),
            team,
            admin: false,
            matching_votes: 0,
            connected: true,
        }
    }
}

/// Errors that can occur when managing the roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The room has reached its maximum number of players
    #[error("maximum number of players reached")]
    MaximumPlayers,
    /// A player with the same ID is already in the room
    #[error("player is already in the room")]
    DuplicatePlayer,
}

/// Serialization helper for Roster struct
#[derive(Deserialize)]
struct RosterSerde {
    max_players: usize,
    mapping: HashMap<Id, Player>,
}

/// All players of a room, indexed by ID and by team
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RosterSerde")]
pub struct Roster {
    max_players: usize,

    mapping: HashMap<Id, Player>,

    /// Reverse mapping organized by team for efficient filtering
    #[serde(skip_serializing)]
    reverse_mapping: EnumMap<Team, HashSet<Id>>,
}

impl From<RosterSerde> for Roster {
    /// Rebuilds the team index, which is not serialized
    fn from(serde: RosterSerde) -> Self {
        let RosterSerde {
            max_players,
            mapping,
        } = serde;
        let mut reverse_mapping: EnumMap<Team, HashSet<Id>> = EnumMap::default();
        for (id, player) in &mapping {
            reverse_mapping[player.team].insert(*id);
        }
        Self {
            max_players,
            mapping,
            reverse_mapping,
        }
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new(crate::constants::roster::MAX_PLAYER_COUNT)
    }
}

impl Roster {
    /// Creates an empty roster accepting at most `max_players` players
    pub fn new(max_players: usize) -> Self {
        Self {
            max_players,
            mapping: HashMap::default(),
            reverse_mapping: EnumMap::default(),
        }
    }

    /// Adds a player to the roster
    ///
    /// # Errors
    ///
    /// Returns `Error::MaximumPlayers` when the roster is full and
    /// `Error::DuplicatePlayer` when the ID is already present.
    pub fn add_player(&mut self, player: Player) -> Result<(), Error> {
        if self.mapping.contains_key(&player.id) {
            return Err(Error::DuplicatePlayer);
        }
        if self.mapping.len() >= self.max_players {
            return Err(Error::MaximumPlayers);
        }

        self.reverse_mapping[player.team].insert(player.id);
        self.mapping.insert(player.id, player);

        Ok(())
    }

    /// Removes a player, returning them if they were present
    pub fn remove_player(&mut self, id: Id) -> Option<Player> {
        let player = self.mapping.remove(&id)?;
        self.reverse_mapping[player.team].remove(&id);
        Some(player)
    }

    /// Gets a player by ID
    pub fn get(&self, id: Id) -> Option<&Player> {
        self.mapping.get(&id)
    }

    /// Moves a player to another team
    pub fn set_team(&mut self, id: Id, team: Team) {
        let Some(player) = self.mapping.get_mut(&id) else {
            return;
        };
        if player.team != team {
            self.reverse_mapping[player.team].remove(&id);
            self.reverse_mapping[team].insert(id);
            player.team = team;
        }
    }

    /// Marks a player as connected or disconnected
    pub fn set_connected(&mut self, id: Id, connected: bool) {
        if let Some(player) = self.mapping.get_mut(&id) {
            player.connected = connected;
        }
    }

    /// Credits a player with one more matching vote
    pub fn record_matching_vote(&mut self, id: Id) {
        if let Some(player) = self.mapping.get_mut(&id) {
            player.matching_votes += 1;
        }
    }

    /// Resets every player's matching vote counter, used on rematch
    pub fn reset_matching_votes(&mut self) {
        for player in self.mapping.values_mut() {
            player.matching_votes = 0;
        }
    }

    /// Players on a team, sorted by ID for stable output
    pub fn team_members(&self, team: Team) -> Vec<&Player> {
        self.reverse_mapping[team]
            .iter()
            .filter_map(|id| self.mapping.get(id))
            .sorted_by_key(|player| player.id)
            .collect_vec()
    }

    /// IDs of the connected players on a team
    pub fn connected_team_members(&self, team: Team) -> Vec<Id> {
        self.team_members(team)
            .into_iter()
            .filter(|player| player.connected)
            .map(|player| player.id)
            .collect_vec()
    }

    /// Number of players on each team
    pub fn team_sizes(&self) -> EnumMap<Team, usize> {
        EnumMap::from_fn(|team| self.reverse_mapping[team].len())
    }

    /// Iterates over every player
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.mapping.values()
    }

    /// Number of players in the room
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether the room has no players
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trips_through_string() {
        let id = Id::new();
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<Id>().is_err());
    }

    #[test]
    fn test_add_and_index_by_team() {
        let mut roster = Roster::default();
        let red = Id::new();
        let yellow = Id::new();
        roster.add_player(Player::new(red, "Ada", Team::Red)).unwrap();
        roster
            .add_player(Player::new(yellow, "Grace", Team::Yellow))
            .unwrap();

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.team_members(Team::Red)[0].id, red);
        assert_eq!(roster.team_sizes()[Team::Yellow], 1);
    }

    #[test]
    fn test_duplicate_and_capacity() {
        let mut roster = Roster::new(1);
        let id = Id::new();
        roster.add_player(Player::new(id, "Ada", Team::Red)).unwrap();

        assert_eq!(
            roster.add_player(Player::new(id, "Ada", Team::Red)),
            Err(Error::DuplicatePlayer)
        );
        assert_eq!(
            roster.add_player(Player::new(Id::new(), "Bob", Team::Yellow)),
            Err(Error::MaximumPlayers)
        );
    }

    #[test]
    fn test_set_team_moves_index() {
        let mut roster = Roster::default();
        let id = Id::new();
        roster.add_player(Player::new(id, "Ada", Team::Red)).unwrap();
        roster.set_team(id, Team::Yellow);

        assert!(roster.team_members(Team::Red).is_empty());
        assert_eq!(roster.connected_team_members(Team::Yellow), vec![id]);
    }

    #[test]
    fn test_disconnected_players_are_not_connected_members() {
        let mut roster = Roster::default();
        let id = Id::new();
        roster.add_player(Player::new(id, "Ada", Team::Red)).unwrap();
        roster.set_connected(id, false);

        assert!(roster.connected_team_members(Team::Red).is_empty());
        assert_eq!(roster.team_members(Team::Red).len(), 1);
    }

    #[test]
    fn test_matching_votes_and_reset() {
        let mut roster = Roster::default();
        let id = Id::new();
        roster.add_player(Player::new(id, "Ada", Team::Red)).unwrap();
        roster.record_matching_vote(id);
        roster.record_matching_vote(id);
        assert_eq!(roster.get(id).unwrap().matching_votes, 2);

        roster.reset_matching_votes();
        assert_eq!(roster.get(id).unwrap().matching_votes, 0);
    }

    #[test]
    fn test_remove_player() {
        let mut roster = Roster::default();
        let id = Id::new();
        roster.add_player(Player::new(id, "Ada", Team::Red)).unwrap();

        assert_eq!(roster.remove_player(id).map(|p| p.name), Some("Ada".into()));
        assert!(roster.is_empty());
        assert_eq!(roster.team_sizes()[Team::Red], 0);
    }

    #[test]
    fn test_serde_rebuilds_team_index() {
        let mut roster = Roster::default();
        let id = Id::new();
        roster.add_player(Player::new(id, "Ada", Team::Yellow)).unwrap();

        let json = serde_json::to_string(&roster).unwrap();
        let parsed: Roster = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.connected_team_members(Team::Yellow), vec![id]);
    }
}
