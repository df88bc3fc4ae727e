//! Tournament controller.

use super::{
    errors::{TournamentError, TournamentResult},
    models::{
        FailurePolicy, Round, RoundReport, RoundSnapshot, RoundStatus, Standing,
        TournamentConfig, TournamentPhase, TournamentSnapshot,
    },
    state::{CommitOutcome, TournamentState},
};
use crate::{
    RoundNumber,
    clock::{Clock, SystemClock},
    ingestion::{IngestOutcome, IngestionError, ResultIngestionPipeline},
    observer::{GameFetcher, GameSource},
    pairing::{GameResult, PairingEngine, PairingRef},
    players::{AvailabilityTracker, AvailabilityUpdate, PlayerId},
    validation::ResponseValidator,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::{sync::RwLock, task::JoinSet};
use tokio_util::sync::CancellationToken;

/// Drives the round lifecycle of one tournament.
///
/// Locks are always taken in the order state, then availability.
pub struct TournamentController {
    config: TournamentConfig,
    state: Arc<RwLock<TournamentState>>,
    availability: Arc<RwLock<AvailabilityTracker>>,
    engine: PairingEngine,
    pipeline: Arc<ResultIngestionPipeline>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    round_tokens: Mutex<HashMap<RoundNumber, CancellationToken>>,
    reports: Mutex<Vec<RoundReport>>,
}

impl TournamentController {
    /// Create a controller polling `source` for results
    pub fn new(config: TournamentConfig, source: Arc<dyn GameSource>) -> Self {
        Self::with_clock(config, source, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: TournamentConfig,
        source: Arc<dyn GameSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = Arc::new(RwLock::new(TournamentState::new(&config)));
        let pipeline = ResultIngestionPipeline::new(
            GameFetcher::new(source, config.fetch.clone()),
            ResponseValidator::new(config.schema.clone()),
            config.ingestion.clone(),
            state.clone(),
        );

        Self {
            engine: PairingEngine::new(config.pairing.clone()),
            config,
            state,
            availability: Arc::new(RwLock::new(AvailabilityTracker::new())),
            pipeline: Arc::new(pipeline),
            clock,
            cancel: CancellationToken::new(),
            round_tokens: Mutex::new(HashMap::new()),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &TournamentConfig {
        &self.config
    }

    /// Shared tournament state
    pub fn state(&self) -> Arc<RwLock<TournamentState>> {
        self.state.clone()
    }

    /// Token cancelled by [`abort`](Self::abort). Cancelling it directly stops
    /// every polling task without voiding anything.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn phase(&self) -> TournamentPhase {
        self.state.read().await.phase()
    }

    /// Register a player while registration is open
    ///
    /// # Errors
    ///
    /// - [`TournamentError::InvalidState`] once the tournament has started
    /// - [`TournamentError::Registry`] for an empty name
    pub async fn register_player(&self, name: impl Into<String>) -> TournamentResult<PlayerId> {
        let mut state = self.state.write().await;
        Self::expect_phase(&state, TournamentPhase::Registering)?;

        let name = name.into();
        let id = state.registry_mut().register(name.clone())?;
        log::info!("Registered player {id} ({name})");
        Ok(id)
    }

    /// Close registration and start the tournament
    pub async fn start(&self) -> TournamentResult<()> {
        let mut state = self.state.write().await;
        Self::expect_phase(&state, TournamentPhase::Registering)?;

        let current = state.registry().len();
        if current < self.config.min_players {
            return Err(TournamentError::InsufficientPlayers {
                needed: self.config.min_players,
                current,
            });
        }

        state.set_phase(TournamentPhase::Running);
        log::info!(
            "Tournament {} started with {current} players, {} rounds",
            state.name(),
            state.total_rounds()
        );
        Ok(())
    }

    /// Pair and open the next round.
    ///
    /// # Errors
    ///
    /// - [`TournamentError::InvalidState`] unless the tournament is running
    /// - [`TournamentError::InvalidRoundStatus`] if the latest round is not closed
    /// - [`TournamentError::NoRoundsRemaining`] after the last round
    /// - [`TournamentError::Pairing`] if no legal pairing exists
    pub async fn open_round(&self) -> TournamentResult<RoundNumber> {
        let mut state = self.state.write().await;
        Self::expect_phase(&state, TournamentPhase::Running)?;

        if let Some(latest) = state.latest_round()
            && latest.status != RoundStatus::Closed
        {
            return Err(TournamentError::InvalidRoundStatus {
                round: latest.number,
                expected: RoundStatus::Closed,
                actual: latest.status,
            });
        }

        let number = state.current_round().unwrap_or(0) + 1;
        if number > state.total_rounds() {
            return Err(TournamentError::NoRoundsRemaining(state.total_rounds()));
        }

        let pairings = {
            let availability = self.availability.read().await;
            self.engine.compute_pairings(
                number,
                state.registry(),
                &state.history(),
                &availability,
            )?
        };

        let boards = pairings.len();
        state.install_round(Round::new(number, pairings, self.clock.now()))?;
        log::info!("Round {number} opened with {boards} pairing(s)");
        Ok(number)
    }

    /// Poll every pending pairing of a round until each is settled,
    /// escalates or is cancelled.
    ///
    /// Escalated pairings are voided or left pending according to
    /// [`TournamentConfig::failure_policy`].
    pub async fn monitor_round(&self, number: RoundNumber) -> TournamentResult<RoundReport> {
        let pending: Vec<PairingRef> = {
            let mut state = self.state.write().await;
            let round = state
                .round_mut(number)
                .ok_or(TournamentError::RoundNotFound(number))?;

            if round.status == RoundStatus::Closed {
                return Err(TournamentError::InvalidRoundStatus {
                    round: number,
                    expected: RoundStatus::Open,
                    actual: round.status,
                });
            }

            round.status = RoundStatus::AwaitingResults;
            round.pending().map(|pairing| pairing.pairing_ref()).collect()
        };

        let token = self.cancel.child_token();
        self.lock_tokens().insert(number, token.clone());

        log::info!(
            "Round {number}: monitoring {} pending pairing(s)",
            pending.len()
        );

        let mut tasks = JoinSet::new();
        for at in pending {
            let pipeline = self.pipeline.clone();
            let token = token.clone();
            tasks.spawn(async move { (at, pipeline.watch(at, &token).await) });
        }

        let mut report = RoundReport::new(number);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((at, Ok(IngestOutcome::Committed(_)))) => report.committed.push(at),
                Ok((at, Ok(_))) => report.already_settled.push(at),
                Ok((at, Err(IngestionError::Cancelled(_)))) => report.cancelled.push(at),
                Ok((at, Err(error))) => self.escalate(at, error, &mut report).await,
                Err(join_error) => {
                    log::error!("Round {number}: polling task failed: {join_error}");
                    report.anomalies.push(join_error.to_string());
                }
            }
        }

        self.lock_tokens().remove(&number);
        log::info!(
            "Round {number}: {} committed, {} voided, {} cancelled, {} anomalies",
            report.committed.len(),
            report.voided.len(),
            report.cancelled.len(),
            report.anomalies.len()
        );
        lock_ignoring_poison(&self.reports).push(report.clone());
        Ok(report)
    }

    /// Take every report produced by [`Self::monitor_round`] since the last
    /// call. Reports survive a `run` that ends in an error.
    pub fn drain_reports(&self) -> Vec<RoundReport> {
        std::mem::take(&mut *lock_ignoring_poison(&self.reports))
    }

    async fn escalate(&self, at: PairingRef, error: IngestionError, report: &mut RoundReport) {
        log::error!("Ingestion for {at} escalated: {error}");
        report.anomalies.push(error.to_string());

        if self.config.failure_policy == FailurePolicy::VoidPairing {
            let mut state = self.state.write().await;
            if let Ok(CommitOutcome::Applied) = state.void_pairing(at) {
                log::warn!("Voided {at}");
                report.voided.push(at);
            }
        }
    }

    /// Cancel the polling tasks of one round. Returns false if the round is
    /// not being monitored.
    pub fn abandon_round(&self, number: RoundNumber) -> bool {
        match self.lock_tokens().get(&number) {
            Some(token) => {
                log::warn!("Abandoning round {number}");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Close a fully settled round and roll availability over.
    ///
    /// Bye recipients are required to play the next round when
    /// [`TournamentConfig::require_after_bye`] is set. Closing the last
    /// round finishes the tournament.
    ///
    /// # Errors
    ///
    /// - [`TournamentError::RoundNotFound`] for an unknown round
    /// - [`TournamentError::InvalidRoundStatus`] if it is already closed
    /// - [`TournamentError::RoundUnresolved`] while any pairing is pending
    pub async fn close_round(&self, number: RoundNumber) -> TournamentResult<()> {
        let mut state = self.state.write().await;
        let closed_at = self.clock.now();
        let round = state
            .round_mut(number)
            .ok_or(TournamentError::RoundNotFound(number))?;

        if round.status == RoundStatus::Closed {
            return Err(TournamentError::InvalidRoundStatus {
                round: number,
                expected: RoundStatus::AwaitingResults,
                actual: round.status,
            });
        }

        let pending = round.pending().count();
        if pending > 0 {
            return Err(TournamentError::RoundUnresolved {
                round: number,
                pending,
            });
        }

        round.status = RoundStatus::Closed;
        round.closed_at = Some(closed_at);
        let bye = round.bye_recipient();

        let finished = number >= state.total_rounds();
        if finished && !state.phase().is_terminal() {
            state.set_phase(TournamentPhase::Finished);
        }

        let mut availability = self.availability.write().await;
        availability.rollover(number);
        if let Some(player) = bye
            && self.config.require_after_bye
            && !finished
        {
            availability.mark_required(player, number + 1);
        }

        log::info!("Round {number} closed");
        if finished {
            log::info!("Tournament {} finished", state.name());
        }
        Ok(())
    }

    /// Play every remaining round.
    ///
    /// Starts the tournament if registration is still open, resumes a round
    /// left open by an earlier call, and stops early on cancellation.
    ///
    /// # Errors
    ///
    /// Any error from opening, monitoring or closing a round. With
    /// [`FailurePolicy::LeavePending`] an escalated pairing surfaces as
    /// [`TournamentError::RoundUnresolved`]; resolve it and call `run` again.
    /// Reports of rounds monitored before the error stay available through
    /// [`Self::drain_reports`].
    pub async fn run(&self) -> TournamentResult<Vec<RoundReport>> {
        if self.phase().await == TournamentPhase::Registering {
            self.start().await?;
        }

        let mut reports = Vec::new();
        while !self.cancel.is_cancelled() {
            let number = {
                let state = self.state.read().await;
                if state.phase().is_terminal() {
                    break;
                }
                state
                    .latest_round()
                    .filter(|round| round.status != RoundStatus::Closed)
                    .map(|round| round.number)
            };

            let number = match number {
                Some(number) => {
                    log::info!("Resuming round {number}");
                    number
                }
                None => self.open_round().await?,
            };

            let report = self.monitor_round(number).await?;
            let interrupted = !report.cancelled.is_empty() || self.cancel.is_cancelled();
            reports.push(report);
            if interrupted {
                break;
            }

            self.close_round(number).await?;
        }

        Ok(reports)
    }

    /// Cancel every in-flight fetch, void what is still pending and mark the
    /// tournament cancelled. Returns the voided pairings.
    pub async fn abort(&self) -> Vec<PairingRef> {
        self.cancel.cancel();

        let mut state = self.state.write().await;
        let open: Vec<RoundNumber> = state
            .rounds()
            .iter()
            .filter(|round| round.status != RoundStatus::Closed)
            .map(|round| round.number)
            .collect();

        let voided: Vec<PairingRef> = open
            .into_iter()
            .flat_map(|number| state.void_pending(number))
            .collect();

        if state.phase() != TournamentPhase::Finished {
            state.set_phase(TournamentPhase::Cancelled);
        }
        log::warn!(
            "Tournament {} aborted, {} pairing(s) voided",
            state.name(),
            voided.len()
        );
        voided
    }

    pub async fn snapshot(&self) -> TournamentSnapshot {
        let state = self.state.read().await;
        let availability = self.availability.read().await;
        state.snapshot(&availability, self.clock.now())
    }

    pub async fn standings(&self) -> Vec<Standing> {
        let state = self.state.read().await;
        let availability = self.availability.read().await;
        state.standings(&availability)
    }

    pub async fn round_snapshot(&self, number: RoundNumber) -> Option<RoundSnapshot> {
        self.state.read().await.round_snapshot(number)
    }

    /// Mark a player unavailable for a round that has not been paired yet
    pub async fn force_unavailable(
        &self,
        player: PlayerId,
        round: RoundNumber,
    ) -> TournamentResult<AvailabilityUpdate> {
        self.with_availability(player, |availability| {
            availability.mark_unavailable(player, round)
        })
        .await
    }

    pub async fn mark_available(
        &self,
        player: PlayerId,
        round: RoundNumber,
    ) -> TournamentResult<AvailabilityUpdate> {
        self.with_availability(player, |availability| {
            availability.mark_available(player, round)
        })
        .await
    }

    /// Require a player to play a real game in `round`
    pub async fn require_player(
        &self,
        player: PlayerId,
        round: RoundNumber,
    ) -> TournamentResult<AvailabilityUpdate> {
        self.with_availability(player, |availability| {
            availability.mark_required(player, round)
        })
        .await
    }

    pub async fn release_player(
        &self,
        player: PlayerId,
        round: RoundNumber,
    ) -> TournamentResult<AvailabilityUpdate> {
        self.with_availability(player, |availability| availability.release(player, round))
            .await
    }

    /// Withdraw a player from all future rounds. Their record is kept.
    pub async fn withdraw_player(&self, player: PlayerId) -> TournamentResult<AvailabilityUpdate> {
        self.with_availability(player, |availability| availability.withdraw(player))
            .await
    }

    /// Void a pending pairing
    pub async fn void_pairing(
        &self,
        round: RoundNumber,
        board: u32,
    ) -> TournamentResult<CommitOutcome> {
        let at = PairingRef::new(round, board);
        let outcome = self.state.write().await.void_pairing(at)?;
        if outcome == CommitOutcome::Applied {
            log::warn!("Operator voided {at}");
        }
        Ok(outcome)
    }

    /// Enter a result by hand. Goes through the same exactly-once commit as
    /// observed results.
    pub async fn record_result(
        &self,
        round: RoundNumber,
        board: u32,
        result: GameResult,
    ) -> TournamentResult<CommitOutcome> {
        let at = PairingRef::new(round, board);
        let outcome = self.state.write().await.commit_result(at, result)?;
        if outcome == CommitOutcome::Applied {
            log::info!("Operator recorded {result} for {at}");
        }
        Ok(outcome)
    }

    async fn with_availability(
        &self,
        player: PlayerId,
        update: impl FnOnce(&mut AvailabilityTracker) -> AvailabilityUpdate,
    ) -> TournamentResult<AvailabilityUpdate> {
        let state = self.state.read().await;
        if !state.registry().contains(player) {
            return Err(TournamentError::PlayerNotFound(player));
        }

        let mut availability = self.availability.write().await;
        Ok(update(&mut availability))
    }

    fn expect_phase(state: &TournamentState, expected: TournamentPhase) -> TournamentResult<()> {
        if state.phase() == expected {
            Ok(())
        } else {
            Err(TournamentError::InvalidState {
                expected,
                actual: state.phase(),
            })
        }
    }

    fn lock_tokens(&self) -> MutexGuard<'_, HashMap<RoundNumber, CancellationToken>> {
        lock_ignoring_poison(&self.round_tokens)
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
