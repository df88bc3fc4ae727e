//! Tournament data models.

use crate::{
    RoundNumber,
    ingestion::IngestionPolicy,
    observer::FetchPolicy,
    pairing::{Outcome, Pairing, PairingConfig, PairingRef},
    players::{PlayerId, Score},
    validation::ResponseSchema,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tournament phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentPhase {
    /// Accepting registrations
    Registering,
    /// Rounds in progress
    Running,
    /// Every configured round closed
    Finished,
    /// Aborted by the operator
    Cancelled,
}

impl TournamentPhase {
    /// No further rounds can be opened
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// Round status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundStatus {
    /// Pairings published, results not yet polled
    Open,
    /// Polling tasks running
    AwaitingResults,
    /// Every pairing decided or void
    Closed,
}

/// What to do with a pairing whose result cannot be ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Void the pairing so the round can close
    #[default]
    VoidPairing,
    /// Leave it pending for an operator to resolve
    LeavePending,
}

/// Tournament configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Tournament name
    pub name: String,
    /// Number of rounds to play
    pub rounds: u32,
    /// Minimum players required to start
    pub min_players: usize,
    /// Pairing engine settings
    pub pairing: PairingConfig,
    /// A bye recipient must play a real game next round
    pub require_after_bye: bool,
    /// Handling of pairings whose ingestion escalates
    pub failure_policy: FailurePolicy,
    /// Retry policy for game server fetches
    pub fetch: FetchPolicy,
    /// Polling cadence and escalation thresholds
    pub ingestion: IngestionPolicy,
    /// Expected game server response shape
    pub schema: ResponseSchema,
}

impl TournamentConfig {
    /// Create a standard Swiss configuration
    pub fn swiss(name: impl Into<String>, rounds: u32) -> Self {
        Self {
            name: name.into(),
            rounds,
            min_players: 2,
            pairing: PairingConfig::default(),
            require_after_bye: true,
            failure_policy: FailurePolicy::default(),
            fetch: FetchPolicy::default(),
            ingestion: IngestionPolicy::default(),
            schema: ResponseSchema::default(),
        }
    }

    /// Swiss configuration with as many rounds as needed to separate a
    /// single winner from `players` entrants
    pub fn swiss_for(name: impl Into<String>, players: usize) -> Self {
        Self::swiss(name, recommended_rounds(players))
    }

    /// Allow rematches once no novel pairing exists
    pub fn with_repeat_pairings(mut self) -> Self {
        self.pairing.allow_repeat_pairings = true;
        self
    }

    /// Name lowered to `[a-z0-9-]`, used to derive game IDs
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }

        if slug.is_empty() {
            "tournament".to_string()
        } else {
            slug
        }
    }
}

/// ⌈log2(players)⌉, at least 1
pub fn recommended_rounds(players: usize) -> u32 {
    match players {
        0..=2 => 1,
        n => usize::BITS - (n - 1).leading_zeros(),
    }
}

/// One round of pairings
#[derive(Debug, Clone, Serialize)]
pub struct Round {
    pub number: RoundNumber,
    pub pairings: Vec<Pairing>,
    pub status: RoundStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Round {
    pub fn new(number: RoundNumber, pairings: Vec<Pairing>, opened_at: DateTime<Utc>) -> Self {
        Self {
            number,
            pairings,
            status: RoundStatus::Open,
            opened_at,
            closed_at: None,
        }
    }

    pub fn pairing(&self, board: u32) -> Option<&Pairing> {
        self.pairings.iter().find(|p| p.board == board)
    }

    pub(crate) fn pairing_mut(&mut self, board: u32) -> Option<&mut Pairing> {
        self.pairings.iter_mut().find(|p| p.board == board)
    }

    /// Pairings still waiting for a result
    pub fn pending(&self) -> impl Iterator<Item = &Pairing> {
        self.pairings.iter().filter(|p| p.is_pending())
    }

    /// Every pairing decided or void
    pub fn is_resolved(&self) -> bool {
        self.pairings.iter().all(Pairing::is_settled)
    }

    /// Player receiving this round's bye, if any
    pub fn bye_recipient(&self) -> Option<PlayerId> {
        self.pairings.iter().find(|p| p.is_bye()).map(|p| p.white)
    }
}

/// Summary of a monitored round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundReport {
    pub round: RoundNumber,
    /// Results committed by polling tasks
    pub committed: Vec<PairingRef>,
    /// Pairings already settled when their task ran
    pub already_settled: Vec<PairingRef>,
    /// Pairings voided after their ingestion escalated
    pub voided: Vec<PairingRef>,
    /// Tasks stopped by cancellation
    pub cancelled: Vec<PairingRef>,
    /// Escalated errors, rendered for operators
    pub anomalies: Vec<String>,
}

impl RoundReport {
    pub fn new(round: RoundNumber) -> Self {
        Self {
            round,
            ..Self::default()
        }
    }
}

/// A player's line in the standings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub player_id: PlayerId,
    pub name: String,
    pub score: Score,
    pub buchholz: Score,
    pub games_played: u32,
    pub byes: u32,
    pub withdrawn: bool,
}

/// Serializable view of one pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingSnapshot {
    pub board: u32,
    pub game_id: Option<String>,
    pub white: PlayerId,
    pub black: Option<PlayerId>,
    pub bye: bool,
    pub outcome: Outcome,
}

/// Serializable view of one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSnapshot {
    pub number: RoundNumber,
    pub status: RoundStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub pairings: Vec<PairingSnapshot>,
}

/// Point-in-time view of the whole tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TournamentSnapshot {
    pub name: String,
    pub phase: TournamentPhase,
    pub current_round: Option<RoundNumber>,
    pub total_rounds: u32,
    pub standings: Vec<Standing>,
    pub rounds: Vec<RoundSnapshot>,
    pub taken_at: DateTime<Utc>,
}
