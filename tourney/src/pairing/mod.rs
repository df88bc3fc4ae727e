//! Swiss pairing.
//!
//! [`PairingEngine::compute_pairings`] turns the current standings, the
//! pairing history and per-round availability into the next round's
//! [`Pairing`]s:
//!
//! - eligible players are ranked by score, then registration order
//! - an odd field gives the lowest-ranked eligible player the bye
//! - each player meets the nearest-ranked opponent they have not met yet,
//!   searching further down the ranking when the neighbour is a rematch

pub mod engine;
pub mod models;

pub use engine::{PairingConfig, PairingEngine, PairingError, PairingResult};
pub use models::{
    GameResult, Opponent, Outcome, PairKey, Pairing, PairingHistory, PairingRef, Side,
};
