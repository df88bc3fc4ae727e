//! Pairing data models.

use crate::{
    RoundNumber,
    players::{PlayerId, Score},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
};

/// Board side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "white" => Ok(Side::White),
            "black" => Ok(Side::Black),
            _ => Err(format!("invalid side: {value}")),
        }
    }
}

/// Final result of a decided game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Win(Side),
    Draw,
}

impl GameResult {
    /// Points earned by the player on `side`
    pub fn points_for(self, side: Side) -> Score {
        match self {
            GameResult::Win(winner) if winner == side => Score::WIN,
            GameResult::Win(_) => Score::ZERO,
            GameResult::Draw => Score::DRAW,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Win(Side::White) => write!(f, "1-0"),
            GameResult::Win(Side::Black) => write!(f, "0-1"),
            GameResult::Draw => write!(f, "½-½"),
        }
    }
}

/// Pairing outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "result")]
pub enum Outcome {
    Pending,
    Decided(GameResult),
    Void,
}

/// The player sitting opposite white
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opponent {
    Player(PlayerId),
    Bye,
}

/// One scheduled game (or bye) within a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pairing {
    pub round: RoundNumber,
    /// Board number within the round (1-indexed)
    pub board: u32,
    pub white: PlayerId,
    pub black: Opponent,
    outcome: Outcome,
}

impl Pairing {
    /// Create a pending game
    pub fn new(round: RoundNumber, board: u32, white: PlayerId, black: PlayerId) -> Self {
        Self {
            round,
            board,
            white,
            black: Opponent::Player(black),
            outcome: Outcome::Pending,
        }
    }

    /// Create a bye, already decided in the player's favor
    pub fn bye(round: RoundNumber, board: u32, player: PlayerId) -> Self {
        Self {
            round,
            board,
            white: player,
            black: Opponent::Bye,
            outcome: Outcome::Decided(GameResult::Win(Side::White)),
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_bye(&self) -> bool {
        self.black == Opponent::Bye
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::Pending
    }

    /// Decided or void
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    /// Black player, if this is not a bye
    pub fn black_player(&self) -> Option<PlayerId> {
        match self.black {
            Opponent::Player(id) => Some(id),
            Opponent::Bye => None,
        }
    }

    pub fn involves(&self, player: PlayerId) -> bool {
        self.white == player || self.black_player() == Some(player)
    }

    /// Side played by `player`, if seated here
    pub fn side_of(&self, player: PlayerId) -> Option<Side> {
        if self.white == player {
            Some(Side::White)
        } else if self.black_player() == Some(player) {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// Player on a given side
    pub fn player_on(&self, side: Side) -> Option<PlayerId> {
        match side {
            Side::White => Some(self.white),
            Side::Black => self.black_player(),
        }
    }

    /// Unordered pair key, `None` for byes
    pub fn pair_key(&self) -> Option<PairKey> {
        self.black_player()
            .map(|black| PairKey::new(self.white, black))
    }

    pub fn pairing_ref(&self) -> PairingRef {
        PairingRef::new(self.round, self.board)
    }

    /// Game identifier on the game server
    pub fn game_id(&self, tournament_slug: &str) -> String {
        format!("{}-r{}-b{}", tournament_slug, self.round, self.board)
    }

    /// Move out of `Pending`. Returns false if the outcome was already set.
    pub(crate) fn settle(&mut self, outcome: Outcome) -> bool {
        if self.outcome != Outcome::Pending || outcome == Outcome::Pending {
            return false;
        }
        self.outcome = outcome;
        true
    }
}

/// Locates a pairing within the tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairingRef {
    pub round: RoundNumber,
    pub board: u32,
}

impl PairingRef {
    pub fn new(round: RoundNumber, board: u32) -> Self {
        Self { round, board }
    }
}

impl fmt::Display for PairingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {} board {}", self.round, self.board)
    }
}

/// Unordered pair of player IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(PlayerId, PlayerId);

impl PairKey {
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    pub fn players(&self) -> (PlayerId, PlayerId) {
        (self.0, self.1)
    }
}

/// Every pair already scheduled, and every bye already handed out.
///
/// Void pairings still count: a pair that was scheduled once is never
/// scheduled again while a novel alternative exists.
#[derive(Debug, Clone, Default)]
pub struct PairingHistory {
    pairs: HashSet<PairKey>,
    byes: HashMap<PlayerId, u32>,
}

impl PairingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from any sequence of pairings
    pub fn from_pairings<'a>(pairings: impl IntoIterator<Item = &'a Pairing>) -> Self {
        let mut history = Self::new();
        for pairing in pairings {
            history.record(pairing);
        }
        history
    }

    pub fn record(&mut self, pairing: &Pairing) {
        match pairing.pair_key() {
            Some(key) => {
                self.pairs.insert(key);
            }
            None => *self.byes.entry(pairing.white).or_default() += 1,
        }
    }

    pub fn have_met(&self, a: PlayerId, b: PlayerId) -> bool {
        self.pairs.contains(&PairKey::new(a, b))
    }

    pub fn byes_for(&self, player: PlayerId) -> u32 {
        self.byes.get(&player).copied().unwrap_or(0)
    }

    /// Number of distinct pairs scheduled so far
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bye_is_decided_for_player() {
        let bye = Pairing::bye(3, 5, 42);
        assert!(bye.is_bye());
        assert!(bye.is_settled());
        assert_eq!(bye.outcome(), Outcome::Decided(GameResult::Win(Side::White)));
        assert_eq!(bye.pair_key(), None);
        assert_eq!(bye.side_of(42), Some(Side::White));
    }

    #[test]
    fn test_settle_only_once() {
        let mut pairing = Pairing::new(1, 1, 10, 20);
        assert!(pairing.is_pending());

        assert!(pairing.settle(Outcome::Decided(GameResult::Draw)));
        assert!(!pairing.settle(Outcome::Void));
        assert!(!pairing.settle(Outcome::Decided(GameResult::Win(Side::Black))));
        assert_eq!(pairing.outcome(), Outcome::Decided(GameResult::Draw));
    }

    #[test]
    fn test_settle_rejects_pending_target() {
        let mut pairing = Pairing::new(1, 1, 10, 20);
        assert!(!pairing.settle(Outcome::Pending));
        assert!(pairing.is_pending());
    }

    #[test]
    fn test_pair_key_is_unordered() {
        assert_eq!(PairKey::new(3, 1), PairKey::new(1, 3));
        assert_eq!(PairKey::new(3, 1).players(), (1, 3));
    }

    #[test]
    fn test_game_id_format() {
        let pairing = Pairing::new(2, 4, 1, 2);
        assert_eq!(pairing.game_id("club-open"), "club-open-r2-b4");
    }

    #[test]
    fn test_points_for_each_side() {
        let white_win = GameResult::Win(Side::White);
        assert_eq!(white_win.points_for(Side::White), Score::WIN);
        assert_eq!(white_win.points_for(Side::Black), Score::ZERO);
        assert_eq!(GameResult::Draw.points_for(Side::Black), Score::DRAW);
    }

    #[test]
    fn test_history_records_pairs_and_byes() {
        let pairings = vec![Pairing::new(1, 1, 1, 2), Pairing::bye(1, 2, 3)];
        let history = PairingHistory::from_pairings(&pairings);

        assert!(history.have_met(2, 1));
        assert!(!history.have_met(1, 3));
        assert_eq!(history.byes_for(3), 1);
        assert_eq!(history.byes_for(1), 0);
        assert_eq!(history.pair_count(), 1);
    }

    #[test]
    fn test_side_round_trips_through_str() {
        assert_eq!("white".parse::<Side>(), Ok(Side::White));
        assert_eq!(Side::Black.to_string(), "black");
        assert!("grey".parse::<Side>().is_err());
        assert_eq!(Side::White.opposite(), Side::Black);
    }
}
