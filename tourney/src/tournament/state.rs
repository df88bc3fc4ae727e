//! Shared tournament state.
//!
//! Held behind a `tokio::sync::RwLock` by the controller. Every mutation
//! (installing a round, committing a result, voiding a pairing) happens under
//! the write guard, so commits and pairing computations never interleave.

use super::{
    errors::{TournamentError, TournamentResult},
    models::{
        PairingSnapshot, Round, RoundSnapshot, RoundStatus, Standing, TournamentConfig,
        TournamentPhase, TournamentSnapshot,
    },
};
use crate::{
    RoundNumber,
    pairing::{GameResult, Outcome, Pairing, PairingHistory, PairingRef, Side},
    players::{AvailabilityTracker, PlayerRegistry},
};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;

/// Result of a commit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Outcome set and scores updated
    Applied,
    /// Pairing was already decided or void; nothing changed
    Stale,
}

/// Registry, rounds and phase of one tournament
#[derive(Debug, Clone)]
pub struct TournamentState {
    name: String,
    slug: String,
    total_rounds: u32,
    registry: PlayerRegistry,
    rounds: Vec<Round>,
    phase: TournamentPhase,
}

impl TournamentState {
    pub fn new(config: &TournamentConfig) -> Self {
        Self {
            name: config.name.clone(),
            slug: config.slug(),
            total_rounds: config.rounds,
            registry: PlayerRegistry::new(),
            rounds: Vec::new(),
            phase: TournamentPhase::Registering,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn phase(&self) -> TournamentPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: TournamentPhase) {
        self.phase = phase;
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut PlayerRegistry {
        &mut self.registry
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn round(&self, number: RoundNumber) -> Option<&Round> {
        Self::index(number).and_then(|idx| self.rounds.get(idx))
    }

    pub(crate) fn round_mut(&mut self, number: RoundNumber) -> Option<&mut Round> {
        Self::index(number).and_then(|idx| self.rounds.get_mut(idx))
    }

    /// Number of the latest round opened
    pub fn current_round(&self) -> Option<RoundNumber> {
        self.rounds.last().map(|round| round.number)
    }

    pub fn latest_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Every pairing scheduled so far, voids included
    pub fn history(&self) -> PairingHistory {
        PairingHistory::from_pairings(self.rounds.iter().flat_map(|round| &round.pairings))
    }

    /// Append the next round and credit its bye.
    ///
    /// # Errors
    ///
    /// Returns [`TournamentError::RoundNotFound`] if `round` does not follow
    /// the latest round.
    pub(crate) fn install_round(&mut self, round: Round) -> TournamentResult<()> {
        let expected = self.current_round().unwrap_or(0) + 1;
        if round.number != expected {
            return Err(TournamentError::RoundNotFound(round.number));
        }

        if let Some(player) = round
            .bye_recipient()
            .and_then(|id| self.registry.get_mut(id))
        {
            player.record_bye();
        }

        self.rounds.push(round);
        Ok(())
    }

    pub fn pairing(&self, at: PairingRef) -> TournamentResult<&Pairing> {
        self.round(at.round)
            .and_then(|round| round.pairing(at.board))
            .ok_or(TournamentError::PairingNotFound(at))
    }

    /// Game identifier of a pairing on the game server
    pub fn game_id(&self, at: PairingRef) -> TournamentResult<String> {
        self.pairing(at).map(|pairing| pairing.game_id(&self.slug))
    }

    /// Commit a result exactly once.
    ///
    /// Sets the outcome and updates both players' scores, opponent sets and
    /// colors. A pairing that is already decided or void is left untouched
    /// and reported as [`CommitOutcome::Stale`].
    ///
    /// # Errors
    ///
    /// Returns [`TournamentError::PairingNotFound`] for an unknown pairing.
    pub fn commit_result(
        &mut self,
        at: PairingRef,
        result: GameResult,
    ) -> TournamentResult<CommitOutcome> {
        let pairing = Self::index(at.round)
            .and_then(|idx| self.rounds.get_mut(idx))
            .and_then(|round| round.pairing_mut(at.board))
            .ok_or(TournamentError::PairingNotFound(at))?;

        let Some(black) = pairing.black_player() else {
            return Ok(CommitOutcome::Stale);
        };
        if !pairing.settle(Outcome::Decided(result)) {
            return Ok(CommitOutcome::Stale);
        }
        let white = pairing.white;

        for (player, opponent, side) in [(white, black, Side::White), (black, white, Side::Black)] {
            if let Some(player) = self.registry.get_mut(player) {
                player.record_game(opponent, side, result);
            }
        }

        Ok(CommitOutcome::Applied)
    }

    /// Void a pending pairing. Scores are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`TournamentError::PairingNotFound`] for an unknown pairing.
    pub fn void_pairing(&mut self, at: PairingRef) -> TournamentResult<CommitOutcome> {
        let pairing = Self::index(at.round)
            .and_then(|idx| self.rounds.get_mut(idx))
            .and_then(|round| round.pairing_mut(at.board))
            .ok_or(TournamentError::PairingNotFound(at))?;

        if pairing.settle(Outcome::Void) {
            Ok(CommitOutcome::Applied)
        } else {
            Ok(CommitOutcome::Stale)
        }
    }

    /// Void every pending pairing of a round
    pub(crate) fn void_pending(&mut self, number: RoundNumber) -> Vec<PairingRef> {
        let Some(round) = self.round_mut(number) else {
            return Vec::new();
        };

        round
            .pairings
            .iter_mut()
            .filter_map(|pairing| pairing.settle(Outcome::Void).then(|| pairing.pairing_ref()))
            .collect()
    }

    /// Standings by score, then Buchholz, then registration order
    pub fn standings(&self, availability: &AvailabilityTracker) -> Vec<Standing> {
        let mut rows: Vec<(Standing, usize)> = self
            .registry
            .iter()
            .map(|player| {
                let standing = Standing {
                    rank: 0,
                    player_id: player.id(),
                    name: player.name().to_string(),
                    score: player.score(),
                    buchholz: self.registry.buchholz(player.id()),
                    games_played: player.games_played(),
                    byes: player.byes(),
                    withdrawn: availability.is_withdrawn(player.id()),
                };
                (standing, player.registration_order())
            })
            .collect();

        rows.sort_by_key(|(standing, order)| {
            (Reverse(standing.score), Reverse(standing.buchholz), *order)
        });

        rows.into_iter()
            .zip(1..)
            .map(|((standing, _), rank)| Standing { rank, ..standing })
            .collect()
    }

    pub fn round_snapshot(&self, number: RoundNumber) -> Option<RoundSnapshot> {
        self.round(number).map(|round| RoundSnapshot {
            number: round.number,
            status: round.status,
            opened_at: round.opened_at,
            closed_at: round.closed_at,
            pairings: round
                .pairings
                .iter()
                .map(|pairing| PairingSnapshot {
                    board: pairing.board,
                    game_id: (!pairing.is_bye()).then(|| pairing.game_id(&self.slug)),
                    white: pairing.white,
                    black: pairing.black_player(),
                    bye: pairing.is_bye(),
                    outcome: pairing.outcome(),
                })
                .collect(),
        })
    }

    pub fn snapshot(
        &self,
        availability: &AvailabilityTracker,
        taken_at: DateTime<Utc>,
    ) -> TournamentSnapshot {
        TournamentSnapshot {
            name: self.name.clone(),
            phase: self.phase,
            current_round: self.current_round(),
            total_rounds: self.total_rounds,
            standings: self.standings(availability),
            rounds: self
                .rounds
                .iter()
                .filter_map(|round| self.round_snapshot(round.number))
                .collect(),
            taken_at,
        }
    }

    /// True once the latest round is closed, or no round exists yet
    pub fn latest_round_closed(&self) -> bool {
        self.latest_round()
            .is_none_or(|round| round.status == RoundStatus::Closed)
    }

    fn index(number: RoundNumber) -> Option<usize> {
        (number as usize).checked_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::players::{PlayerId, Score};

    fn state_with(names: &[&str]) -> (TournamentState, Vec<PlayerId>) {
        let mut state = TournamentState::new(&TournamentConfig::swiss("Club Open", 3));
        let ids = names
            .iter()
            .map(|name| state.registry_mut().register(*name).unwrap())
            .collect();
        (state, ids)
    }

    fn install(state: &mut TournamentState, number: RoundNumber, pairings: Vec<Pairing>) {
        state
            .install_round(Round::new(number, pairings, Utc::now()))
            .unwrap();
    }

    #[test]
    fn test_double_commit_counts_once() {
        let (mut state, ids) = state_with(&["A", "B"]);
        install(&mut state, 1, vec![Pairing::new(1, 1, ids[0], ids[1])]);
        let at = PairingRef::new(1, 1);

        let first = state.commit_result(at, GameResult::Win(Side::White)).unwrap();
        let second = state.commit_result(at, GameResult::Win(Side::Black)).unwrap();

        assert_eq!(first, CommitOutcome::Applied);
        assert_eq!(second, CommitOutcome::Stale);

        let a = state.registry().get(ids[0]).unwrap();
        let b = state.registry().get(ids[1]).unwrap();
        assert_eq!(a.score(), Score::WIN);
        assert_eq!(b.score(), Score::ZERO);
        assert_eq!(a.whites(), 1);
        assert_eq!(b.blacks(), 1);
        assert!(a.has_faced(ids[1]));
        assert_eq!(
            state.pairing(at).unwrap().outcome(),
            Outcome::Decided(GameResult::Win(Side::White))
        );
    }

    #[test]
    fn test_draw_gives_half_point_each() {
        let (mut state, ids) = state_with(&["A", "B"]);
        install(&mut state, 1, vec![Pairing::new(1, 1, ids[1], ids[0])]);

        state
            .commit_result(PairingRef::new(1, 1), GameResult::Draw)
            .unwrap();

        for id in &ids {
            assert_eq!(state.registry().get(*id).unwrap().score(), Score::DRAW);
        }
    }

    #[test]
    fn test_bye_is_credited_on_install() {
        let (mut state, ids) = state_with(&["A", "B", "C"]);
        install(
            &mut state,
            1,
            vec![Pairing::new(1, 1, ids[0], ids[1]), Pairing::bye(1, 2, ids[2])],
        );

        let c = state.registry().get(ids[2]).unwrap();
        assert_eq!(c.score(), Score::WIN);
        assert_eq!(c.byes(), 1);
        assert_eq!(c.games_played(), 0);

        let commit = state
            .commit_result(PairingRef::new(1, 2), GameResult::Draw)
            .unwrap();
        assert_eq!(commit, CommitOutcome::Stale);
        assert_eq!(state.registry().get(ids[2]).unwrap().score(), Score::WIN);
    }

    #[test]
    fn test_void_blocks_later_commit() {
        let (mut state, ids) = state_with(&["A", "B"]);
        install(&mut state, 1, vec![Pairing::new(1, 1, ids[0], ids[1])]);
        let at = PairingRef::new(1, 1);

        assert_eq!(state.void_pairing(at).unwrap(), CommitOutcome::Applied);
        assert_eq!(
            state.commit_result(at, GameResult::Draw).unwrap(),
            CommitOutcome::Stale
        );
        assert_eq!(state.registry().get(ids[0]).unwrap().score(), Score::ZERO);
        assert!(state.history().have_met(ids[0], ids[1]));
    }

    #[test]
    fn test_rounds_must_be_installed_in_order() {
        let (mut state, ids) = state_with(&["A", "B"]);
        let error = state
            .install_round(Round::new(2, vec![Pairing::new(2, 1, ids[0], ids[1])], Utc::now()))
            .unwrap_err();
        assert_eq!(error, TournamentError::RoundNotFound(2));
    }

    #[test]
    fn test_unknown_pairing() {
        let (mut state, _) = state_with(&["A", "B"]);
        let at = PairingRef::new(4, 1);
        assert_eq!(
            state.commit_result(at, GameResult::Draw).unwrap_err(),
            TournamentError::PairingNotFound(at)
        );
    }

    #[test]
    fn test_standings_use_buchholz_tie_break() {
        let (mut state, ids) = state_with(&["A", "B", "C", "D"]);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
        install(
            &mut state,
            1,
            vec![Pairing::new(1, 1, a, b), Pairing::new(1, 2, c, d)],
        );
        state
            .commit_result(PairingRef::new(1, 1), GameResult::Win(Side::White))
            .unwrap();
        state
            .commit_result(PairingRef::new(1, 2), GameResult::Draw)
            .unwrap();

        state.rounds[0].status = RoundStatus::Closed;
        install(
            &mut state,
            2,
            vec![Pairing::new(2, 1, a, d), Pairing::new(2, 2, c, b)],
        );
        state
            .commit_result(PairingRef::new(2, 1), GameResult::Win(Side::White))
            .unwrap();
        state
            .commit_result(PairingRef::new(2, 2), GameResult::Win(Side::Black))
            .unwrap();

        // A 2, B 1, C and D 0.5 each; D met the stronger opponents
        let standings = state.standings(&AvailabilityTracker::new());
        let order: Vec<PlayerId> = standings.iter().map(|s| s.player_id).collect();
        assert_eq!(order, vec![a, b, d, c]);
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[2].buchholz, Score::from_halves(5));
        assert_eq!(standings[3].buchholz, Score::from_halves(3));
        assert_eq!(standings[3].rank, 4);
    }

    #[test]
    fn test_snapshot_lists_rounds_and_game_ids() {
        let (mut state, ids) = state_with(&["A", "B", "C"]);
        install(
            &mut state,
            1,
            vec![Pairing::new(1, 1, ids[0], ids[1]), Pairing::bye(1, 2, ids[2])],
        );

        let snapshot = state.snapshot(&AvailabilityTracker::new(), Utc::now());
        assert_eq!(snapshot.current_round, Some(1));
        assert_eq!(snapshot.rounds.len(), 1);
        assert_eq!(
            snapshot.rounds[0].pairings[0].game_id.as_deref(),
            Some("club-open-r1-b1")
        );
        assert_eq!(snapshot.rounds[0].pairings[1].game_id, None);
        assert!(serde_json::to_string(&snapshot).is_ok());
    }
}
