//! Ingestion error types.

use crate::{
    observer::FetchFailure,
    pairing::PairingRef,
    validation::ValidationFailure,
};
use thiserror::Error;

/// Escalated ingestion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    /// The game server could not be reached for too many consecutive cycles
    #[error("Game for {pairing} unreachable after {failures} consecutive fetch failures: {last}")]
    PersistentFetchFailure {
        pairing: PairingRef,
        failures: u32,
        last: FetchFailure,
    },

    /// The game server kept returning payloads that do not match the schema
    #[error("Game for {pairing} failed validation {attempts} times in a row: {failure}")]
    PersistentValidationFailure {
        pairing: PairingRef,
        attempts: u32,
        failure: ValidationFailure,
    },

    /// The game server keeps answering with something that is not a game
    #[error("Unexpected response for game {game_id} ({pairing}): {detail}")]
    UnexpectedServerResponse {
        pairing: PairingRef,
        game_id: String,
        detail: String,
    },

    #[error("Unknown pairing: {0}")]
    UnknownPairing(PairingRef),

    #[error("Ingestion for {0} cancelled")]
    Cancelled(PairingRef),
}

impl IngestionError {
    pub fn pairing(&self) -> PairingRef {
        match self {
            Self::PersistentFetchFailure { pairing, .. }
            | Self::PersistentValidationFailure { pairing, .. }
            | Self::UnexpectedServerResponse { pairing, .. } => *pairing,
            Self::UnknownPairing(pairing) | Self::Cancelled(pairing) => *pairing,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

pub type IngestionResult<T> = Result<T, IngestionError>;
