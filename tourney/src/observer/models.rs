//! Observer request, response and failure types.

use crate::RoundNumber;
use serde::Serialize;
use std::{fmt, time::Duration};
use thiserror::Error;

/// Request for the current state of one game
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameFetchRequest {
    pub game_id: String,
    pub round: RoundNumber,
    pub board: u32,
    /// Attempt number, 1-indexed once sent
    pub attempt: u32,
}

impl GameFetchRequest {
    pub fn new(game_id: impl Into<String>, round: RoundNumber, board: u32) -> Self {
        Self {
            game_id: game_id.into(),
            round,
            board,
            attempt: 0,
        }
    }
}

impl fmt::Display for GameFetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "game {} (round {}, board {})",
            self.game_id, self.round, self.board
        )
    }
}

/// Unvalidated response from the game server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub latency: Duration,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>, latency: Duration) -> Self {
        Self {
            status,
            body: body.into(),
            latency,
        }
    }

    /// Successful response with no recorded latency
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body, Duration::ZERO)
    }
}

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFault {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    /// The server answered with a non-success status
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
}

impl TransportFault {
    /// Connection refused, reset or timed out
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TransportFault::Connection(_) | TransportFault::Timeout { .. }
        )
    }

    /// Server reachable but answered with an error status
    pub fn is_malformed_transport(&self) -> bool {
        matches!(self, TransportFault::Status { .. })
    }
}

/// Fetch gave up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("{request} failed after {attempts} attempt(s): {last_attempt}")]
    Exhausted {
        request: GameFetchRequest,
        attempts: u32,
        last_attempt: TransportFault,
    },

    #[error("{request} cancelled")]
    Cancelled { request: GameFetchRequest },
}

impl FetchFailure {
    /// The request as it stood on the last attempt
    pub fn request(&self) -> &GameFetchRequest {
        match self {
            FetchFailure::Exhausted { request, .. } | FetchFailure::Cancelled { request } => {
                request
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchFailure::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kinds() {
        assert!(TransportFault::Connection("refused".into()).is_transport());
        assert!(
            TransportFault::Timeout {
                after: Duration::from_secs(1)
            }
            .is_transport()
        );

        let status = TransportFault::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(status.is_malformed_transport());
        assert!(!status.is_transport());
    }

    #[test]
    fn test_failure_display_names_game() {
        let failure = FetchFailure::Exhausted {
            request: GameFetchRequest::new("open-r1-b2", 1, 2),
            attempts: 5,
            last_attempt: TransportFault::Connection("refused".into()),
        };
        let msg = failure.to_string();
        assert!(msg.contains("open-r1-b2"));
        assert!(msg.contains("5 attempt(s)"));
        assert_eq!(failure.request().board, 2);
        assert!(!failure.is_cancelled());
    }
}
