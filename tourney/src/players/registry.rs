//! Player records and the registry that owns them.

use super::PlayerId;
use crate::pairing::{GameResult, Side};
use serde::{Serialize, Serializer};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    ops::{Add, AddAssign},
};
use thiserror::Error;

/// Registry errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Player already registered: {0}")]
    DuplicatePlayer(PlayerId),

    #[error("Player name must not be empty")]
    EmptyName,

    #[error("Player not found: {0}")]
    NotFound(PlayerId),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Tournament score kept in half points so draws stay exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(u32);

impl Score {
    pub const ZERO: Score = Score(0);
    pub const DRAW: Score = Score(1);
    pub const WIN: Score = Score(2);

    /// Create a score from a number of half points
    pub const fn from_halves(halves: u32) -> Self {
        Self(halves)
    }

    /// Number of half points
    pub const fn halves(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 2.0
    }
}

impl Add for Score {
    type Output = Score;

    fn add(self, rhs: Score) -> Score {
        Score(self.0 + rhs.0)
    }
}

impl AddAssign for Score {
    fn add_assign(&mut self, rhs: Score) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 2 == 0 {
            write!(f, "{}", self.0 / 2)
        } else {
            write!(f, "{}.5", self.0 / 2)
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

/// A registered player
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    id: PlayerId,
    name: String,
    registration_order: usize,
    score: Score,
    opponents: BTreeSet<PlayerId>,
    whites: u32,
    blacks: u32,
    byes: u32,
}

impl Player {
    fn new(id: PlayerId, name: String, registration_order: usize) -> Self {
        Self {
            id,
            name,
            registration_order,
            score: Score::ZERO,
            opponents: BTreeSet::new(),
            whites: 0,
            blacks: 0,
            byes: 0,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in registration order, used as the deterministic tie-break
    pub fn registration_order(&self) -> usize {
        self.registration_order
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// Opponents already faced over the board
    pub fn opponents(&self) -> &BTreeSet<PlayerId> {
        &self.opponents
    }

    pub fn has_faced(&self, other: PlayerId) -> bool {
        self.opponents.contains(&other)
    }

    pub fn whites(&self) -> u32 {
        self.whites
    }

    pub fn blacks(&self) -> u32 {
        self.blacks
    }

    pub fn byes(&self) -> u32 {
        self.byes
    }

    /// Games actually played, byes excluded
    pub fn games_played(&self) -> u32 {
        self.whites + self.blacks
    }

    /// Whites minus blacks
    pub fn color_balance(&self) -> i64 {
        i64::from(self.whites) - i64::from(self.blacks)
    }

    pub(crate) fn record_game(&mut self, opponent: PlayerId, side: Side, result: GameResult) {
        self.opponents.insert(opponent);
        match side {
            Side::White => self.whites += 1,
            Side::Black => self.blacks += 1,
        }
        self.score += result.points_for(side);
    }

    pub(crate) fn record_bye(&mut self) {
        self.byes += 1;
        self.score += Score::WIN;
    }
}

/// Owns every registered player in registration order
#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    players: Vec<Player>,
    index: HashMap<PlayerId, usize>,
    next_id: PlayerId,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a player under the next free ID
    pub fn register(&mut self, name: impl Into<String>) -> RegistryResult<PlayerId> {
        while self.index.contains_key(&self.next_id) {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.register_with_id(id, name)?;
        Ok(id)
    }

    /// Register a player under an externally assigned ID
    pub fn register_with_id(&mut self, id: PlayerId, name: impl Into<String>) -> RegistryResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.index.contains_key(&id) {
            return Err(RegistryError::DuplicatePlayer(id));
        }

        let order = self.players.len();
        self.players.push(Player::new(id, name, order));
        self.index.insert(id, order);
        Ok(())
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.index.get(&id).map(|&idx| &self.players[idx])
    }

    pub(crate) fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.index.get(&id).map(|&idx| &mut self.players[idx])
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Players in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    /// Players ordered by score descending, then registration order
    pub fn ranked(&self) -> Vec<&Player> {
        let mut ranked: Vec<&Player> = self.players.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(a.registration_order.cmp(&b.registration_order))
        });
        ranked
    }

    /// Sum of opponents' scores (Buchholz tie-break)
    pub fn buchholz(&self, id: PlayerId) -> Score {
        self.get(id)
            .map(|player| {
                player
                    .opponents
                    .iter()
                    .filter_map(|opponent| self.get(*opponent))
                    .fold(Score::ZERO, |acc, opponent| acc + opponent.score)
            })
            .unwrap_or_default()
    }
}
