//! Fetch, validate and commit pipeline.

use super::errors::{IngestionError, IngestionResult};
use crate::{
    observer::{FetchFailure, GameFetchRequest, GameFetcher},
    pairing::{GameResult, PairingRef},
    tournament::state::{CommitOutcome, TournamentState},
    validation::{ResponseValidator, ValidationFailure},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Polling cadence and escalation thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionPolicy {
    /// Pause between polling cycles of one pairing
    pub poll_interval: Duration,

    /// Consecutive validation failures tolerated before escalating
    pub validation_allowance: u32,

    /// Consecutive fetch failures tolerated before escalating
    pub fetch_failure_ceiling: u32,
}

impl Default for IngestionPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            validation_allowance: 3,
            fetch_failure_ceiling: 10,
        }
    }
}

/// Result of one polling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A final result was committed by this cycle
    Committed(GameResult),
    /// Game still running, or a tolerated failure was recorded
    StillPending,
    /// Pairing was already settled; nothing changed
    StaleCommit,
}

impl IngestOutcome {
    /// No further polling needed
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::StillPending)
    }
}

#[derive(Debug, Default)]
struct FailureLog {
    fetch: u32,
    validation: u32,
}

/// Turns observed games into committed results
pub struct ResultIngestionPipeline {
    fetcher: GameFetcher,
    validator: ResponseValidator,
    policy: IngestionPolicy,
    state: Arc<RwLock<TournamentState>>,
    failures: Mutex<HashMap<PairingRef, FailureLog>>,
}

impl ResultIngestionPipeline {
    pub fn new(
        fetcher: GameFetcher,
        validator: ResponseValidator,
        policy: IngestionPolicy,
        state: Arc<RwLock<TournamentState>>,
    ) -> Self {
        Self {
            fetcher,
            validator,
            policy,
            state,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &IngestionPolicy {
        &self.policy
    }

    /// Run one polling cycle for a pairing.
    ///
    /// # Errors
    ///
    /// - [`IngestionError::UnknownPairing`] if the pairing does not exist
    /// - [`IngestionError::Cancelled`] if `cancel` fires during the fetch
    /// - [`IngestionError::PersistentFetchFailure`],
    ///   [`IngestionError::PersistentValidationFailure`] or
    ///   [`IngestionError::UnexpectedServerResponse`] once consecutive
    ///   failures pass the policy thresholds
    pub async fn ingest(
        &self,
        at: PairingRef,
        cancel: &CancellationToken,
    ) -> IngestionResult<IngestOutcome> {
        let game_id = {
            let state = self.state.read().await;
            let pairing = state
                .pairing(at)
                .map_err(|_| IngestionError::UnknownPairing(at))?;
            if pairing.is_bye() || pairing.is_settled() {
                return Ok(IngestOutcome::StaleCommit);
            }
            pairing.game_id(state.slug())
        };

        let request = GameFetchRequest::new(&game_id, at.round, at.board);
        let response = match self.fetcher.fetch(&request, cancel).await {
            Ok(response) => response,
            Err(FetchFailure::Cancelled { .. }) => return Err(IngestionError::Cancelled(at)),
            Err(failure) => return self.record_fetch_failure(at, failure),
        };

        let validated = match self.validator.validate(&response) {
            Ok(validated) => validated,
            Err(failure) => return self.record_validation_failure(at, &game_id, failure),
        };

        self.clear_failures(at);

        let Some(result) = validated.game_result() else {
            log::debug!("Game {game_id} ({at}) still in progress");
            return Ok(IngestOutcome::StillPending);
        };

        self.commit(at, result).await
    }

    /// Poll a pairing until it is settled, escalates or is cancelled
    pub async fn watch(
        &self,
        at: PairingRef,
        cancel: &CancellationToken,
    ) -> IngestionResult<IngestOutcome> {
        loop {
            let outcome = self.ingest(at, cancel).await?;
            if outcome.is_terminal() {
                return Ok(outcome);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IngestionError::Cancelled(at)),
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
            }
        }
    }

    /// Commit under the state write lock
    async fn commit(&self, at: PairingRef, result: GameResult) -> IngestionResult<IngestOutcome> {
        let mut state = self.state.write().await;
        match state.commit_result(at, result) {
            Ok(CommitOutcome::Applied) => {
                log::info!("Committed {result} for {at}");
                Ok(IngestOutcome::Committed(result))
            }
            Ok(CommitOutcome::Stale) => {
                log::debug!("Result for {at} already settled, ignoring {result}");
                Ok(IngestOutcome::StaleCommit)
            }
            Err(_) => Err(IngestionError::UnknownPairing(at)),
        }
    }

    fn record_fetch_failure(
        &self,
        at: PairingRef,
        failure: FetchFailure,
    ) -> IngestionResult<IngestOutcome> {
        let failures = self.bump(at, |log| {
            log.fetch += 1;
            log.fetch
        });

        if failures > self.policy.fetch_failure_ceiling {
            log::error!("Fetch for {at} failed {failures} cycles in a row, escalating");
            self.clear_failures(at);
            return Err(IngestionError::PersistentFetchFailure {
                pairing: at,
                failures,
                last: failure,
            });
        }

        log::warn!("Fetch for {at} failed (cycle {failures}): {failure}");
        Ok(IngestOutcome::StillPending)
    }

    fn record_validation_failure(
        &self,
        at: PairingRef,
        game_id: &str,
        failure: ValidationFailure,
    ) -> IngestionResult<IngestOutcome> {
        let attempts = self.bump(at, |log| {
            log.fetch = 0;
            log.validation += 1;
            log.validation
        });

        if attempts <= self.policy.validation_allowance {
            log::warn!("Invalid payload for game {game_id} ({at}), attempt {attempts}: {failure}");
            return Ok(IngestOutcome::StillPending);
        }

        log::error!("Game {game_id} ({at}) failed validation {attempts} times, escalating");
        self.clear_failures(at);
        if failure.is_shape_level() {
            Err(IngestionError::UnexpectedServerResponse {
                pairing: at,
                game_id: game_id.to_string(),
                detail: failure.to_string(),
            })
        } else {
            Err(IngestionError::PersistentValidationFailure {
                pairing: at,
                attempts,
                failure,
            })
        }
    }

    fn bump(&self, at: PairingRef, update: impl FnOnce(&mut FailureLog) -> u32) -> u32 {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        update(failures.entry(at).or_default())
    }

    fn clear_failures(&self, at: PairingRef) {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures.remove(&at);
    }
}
