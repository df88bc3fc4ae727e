//! Tournament lifecycle.
//!
//! This module ties the scheduling and observation halves together:
//! - Tournament configuration and presets
//! - Shared state: registry, rounds and phase behind a `RwLock`
//! - Round lifecycle: open (pair), monitor (poll), close (roll over)
//! - Operator commands and serializable snapshots
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tourney::{observer::HttpGameSource, tournament::{TournamentConfig, TournamentController}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(HttpGameSource::new("http://localhost:8080")?);
//!     let controller = TournamentController::new(TournamentConfig::swiss_for("Blitz Night", 12), source);
//!
//!     for name in ["Ana", "Ben", "Cleo"] {
//!         controller.register_player(name).await?;
//!     }
//!     controller.start().await?;
//!
//!     let round = controller.open_round().await?;
//!     let report = controller.monitor_round(round).await?;
//!     println!("{} results committed", report.committed.len());
//!     controller.close_round(round).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod controller;
pub mod errors;
pub mod models;
pub mod state;

pub use controller::TournamentController;
pub use errors::{TournamentError, TournamentResult};
pub use models::{
    FailurePolicy, Round, RoundReport, RoundSnapshot, RoundStatus, Standing, TournamentConfig,
    TournamentPhase, TournamentSnapshot, recommended_rounds,
};
pub use state::{CommitOutcome, TournamentState};
