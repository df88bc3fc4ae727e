//! Tournament error types.

use super::models::{RoundStatus, TournamentPhase};
use crate::{
    RoundNumber,
    pairing::{PairingError, PairingRef},
    players::{PlayerId, RegistryError},
};
use thiserror::Error;

/// Tournament errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TournamentError {
    #[error("Round {0} not found")]
    RoundNotFound(RoundNumber),

    #[error("Pairing not found: {0}")]
    PairingNotFound(PairingRef),

    #[error("Player {0} not found")]
    PlayerNotFound(PlayerId),

    #[error("Tournament not in correct phase: expected {expected:?}, got {actual:?}")]
    InvalidState {
        expected: TournamentPhase,
        actual: TournamentPhase,
    },

    #[error("Round {round} is {actual:?}, expected {expected:?}")]
    InvalidRoundStatus {
        round: RoundNumber,
        expected: RoundStatus,
        actual: RoundStatus,
    },

    #[error("Round {round} still has {pending} pending pairing(s)")]
    RoundUnresolved { round: RoundNumber, pending: usize },

    #[error("Insufficient players: need {needed}, have {current}")]
    InsufficientPlayers { needed: usize, current: usize },

    #[error("All {0} rounds have been played")]
    NoRoundsRemaining(u32),

    #[error("Pairing failed: {0}")]
    Pairing(#[from] PairingError),

    #[error("Registration failed: {0}")]
    Registry(#[from] RegistryError),
}

pub type TournamentResult<T> = Result<T, TournamentError>;
