//! # Tourney
//!
//! Swiss-style tournament scheduling driven by results observed on an external
//! game server.
//!
//! The crate has two halves that meet in [`tournament::TournamentController`]:
//!
//! - **Scheduling**: [`players`] holds identities, scores and per-round
//!   availability; [`pairing`] computes each round's games without rematches
//!   or unavailable players.
//! - **Observation**: [`observer`] polls the game server with bounded retry and
//!   backoff, [`validation`] checks every payload against a configurable schema,
//!   and [`ingestion`] commits validated results into tournament state exactly once.
//!
//! ## Round lifecycle
//!
//! - **Open**: pairings computed, byes already decided
//! - **AwaitingResults**: one polling task per active pairing
//! - **Closed**: every pairing decided or void, availability rolled over
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tourney::{
//!     observer::HttpGameSource,
//!     tournament::{TournamentConfig, TournamentController},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(HttpGameSource::new("http://localhost:8080")?);
//!     let controller = TournamentController::new(TournamentConfig::swiss("Club Open", 5), source);
//!
//!     for name in ["Alice", "Bob", "Carol", "Dave"] {
//!         controller.register_player(name).await?;
//!     }
//!
//!     let reports = controller.run().await?;
//!     println!("played {} rounds", reports.len());
//!     Ok(())
//! }
//! ```

pub mod clock;

/// Player identities, scores and availability.
pub mod players;
pub use players::{AvailabilityTracker, AvailabilityUpdate, Player, PlayerId, PlayerRegistry, Score};

/// Swiss pairing engine.
pub mod pairing;
pub use pairing::{
    GameResult, Opponent, Outcome, Pairing, PairingEngine, PairingError, PairingRef, Side,
};

/// Game server polling with retry and backoff.
pub mod observer;

/// Structural validation of game server payloads.
pub mod validation;

/// Fetch, validate and commit pipeline.
pub mod ingestion;

/// Tournament state, round lifecycle and controller.
pub mod tournament;
pub use tournament::{TournamentConfig, TournamentController, TournamentError, TournamentResult};

/// Round number, starting at 1.
pub type RoundNumber = u32;
