//! Swiss pairing engine.

use super::models::{Pairing, PairingHistory};
use crate::{
    RoundNumber,
    players::{AvailabilityTracker, Player, PlayerId, PlayerRegistry},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Pairing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    /// A player who must play this round cannot be scheduled.
    /// Needs an operator decision; never retried automatically.
    #[error("Player {0} is required to play but cannot be scheduled")]
    PlayerUnavailable(PlayerId),

    /// Every complete pairing of the field would repeat a game
    #[error("No pairing for round {round} avoids a rematch")]
    Exhausted { round: RoundNumber },

    /// Availability refers to a player the registry does not know
    #[error("Unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// The search gave up before proving whether a pairing exists
    #[error("Pairing search for round {round} gave up after {budget} nodes")]
    SearchBudgetExhausted { round: RoundNumber, budget: usize },
}

pub type PairingResult<T> = Result<T, PairingError>;

/// Pairing engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Fall back to rematches once no novel complete pairing exists
    pub allow_repeat_pairings: bool,

    /// Maximum search nodes explored per attempt
    pub search_budget: usize,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            allow_repeat_pairings: false,
            search_budget: 250_000,
        }
    }
}

/// Indices into the ranked eligible list
#[derive(Debug, PartialEq, Eq)]
struct Assignment {
    games: Vec<(usize, usize)>,
    bye: Option<usize>,
}

/// Result of one search pass
#[derive(Debug, PartialEq, Eq)]
enum Search {
    Paired(Assignment),
    /// Every branch was explored
    Impossible,
    OutOfBudget,
}

impl Search {
    fn failed(budget_left: usize) -> Self {
        if budget_left == 0 {
            Search::OutOfBudget
        } else {
            Search::Impossible
        }
    }
}

/// Computes the pairings of a round
#[derive(Debug, Clone, Default)]
pub struct PairingEngine {
    config: PairingConfig,
}

impl PairingEngine {
    pub fn new(config: PairingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// Compute the pairings of `round`.
    ///
    /// Eligible players are ranked by score descending, then registration
    /// order. With an odd field the lowest-ranked player who is not required
    /// to play, preferring players without a previous bye, sits out with a
    /// bye. The rest are paired top-down: each player takes the nearest-ranked
    /// opponent they have not met, widening the search down the ranking and
    /// backtracking when a later player would be left without a legal
    /// opponent.
    ///
    /// # Errors
    ///
    /// - [`PairingError::PlayerUnavailable`] if a required player is
    ///   unavailable or is the one blocking every rematch-free pairing
    /// - [`PairingError::Exhausted`] if no rematch-free pairing exists and
    ///   repeats are not allowed
    /// - [`PairingError::UnknownPlayer`] if an unregistered player is
    ///   required for the round
    /// - [`PairingError::SearchBudgetExhausted`] if the search gave up
    ///   before finding or ruling out a pairing
    pub fn compute_pairings(
        &self,
        round: RoundNumber,
        registry: &PlayerRegistry,
        history: &PairingHistory,
        availability: &AvailabilityTracker,
    ) -> PairingResult<Vec<Pairing>> {
        if let Some(unknown) = availability
            .required_in(round)
            .into_iter()
            .find(|&id| !registry.contains(id))
        {
            return Err(PairingError::UnknownPlayer(unknown));
        }

        if let Some(player) = registry.iter().find(|player| {
            availability.is_required(player.id(), round)
                && !availability.is_available(player.id(), round)
        }) {
            log::warn!(
                "Round {round}: player {} is required but unavailable",
                player.id()
            );
            return Err(PairingError::PlayerUnavailable(player.id()));
        }

        let ranked: Vec<&Player> = registry
            .ranked()
            .into_iter()
            .filter(|player| availability.is_available(player.id(), round))
            .collect();

        if ranked.is_empty() {
            log::info!("Round {round}: no eligible players");
            return Ok(Vec::new());
        }

        let required: Vec<bool> = ranked
            .iter()
            .map(|player| availability.is_required(player.id(), round))
            .collect();

        let outcome = match self.solve(&ranked, &required, history, false) {
            Search::Paired(assignment) => Search::Paired(assignment),
            failed if self.config.allow_repeat_pairings => {
                if failed == Search::OutOfBudget {
                    log::warn!(
                        "Round {round}: search budget of {} ran out before a rematch-free \
                         pairing was found, allowing rematches",
                        self.config.search_budget
                    );
                } else {
                    log::info!("Round {round}: novel pairings exhausted, allowing rematches");
                }
                self.solve(&ranked, &required, history, true)
            }
            failed => failed,
        };

        let assignment = match outcome {
            Search::Paired(assignment) => assignment,
            Search::OutOfBudget => {
                log::warn!(
                    "Round {round}: search budget of {} ran out",
                    self.config.search_budget
                );
                return Err(self.out_of_budget(round));
            }
            Search::Impossible => {
                let error = self.diagnose(round, &ranked, &required, history);
                log::warn!("Round {round}: pairing failed: {error}");
                return Err(error);
            }
        };

        let pairings = Self::build(round, &ranked, assignment);
        log::info!(
            "Round {round}: {} pairing(s) for {} eligible player(s)",
            pairings.len(),
            ranked.len()
        );
        Ok(pairings)
    }

    fn solve(
        &self,
        ranked: &[&Player],
        required: &[bool],
        history: &PairingHistory,
        allow_repeats: bool,
    ) -> Search {
        let mut budget = self.config.search_budget;
        let everyone: Vec<usize> = (0..ranked.len()).collect();

        if ranked.len() % 2 == 0 {
            return match Self::match_all(everyone, ranked, history, allow_repeats, &mut budget) {
                Some(games) => Search::Paired(Assignment { games, bye: None }),
                None => Search::failed(budget),
            };
        }

        for candidate in Self::bye_candidates(ranked, required, history) {
            let rest: Vec<usize> = everyone
                .iter()
                .copied()
                .filter(|&idx| idx != candidate)
                .collect();

            if let Some(games) = Self::match_all(rest, ranked, history, allow_repeats, &mut budget)
            {
                return Search::Paired(Assignment {
                    games,
                    bye: Some(candidate),
                });
            }

            if budget == 0 {
                break;
            }
        }

        Search::failed(budget)
    }

    /// Work out which error explains a failed search.
    ///
    /// A required player is blamed, highest-ranked first, when they have no
    /// legal opponent left in the field, when the field pairs without them,
    /// or when the only solution hands them the bye.
    fn diagnose(
        &self,
        round: RoundNumber,
        ranked: &[&Player],
        required: &[bool],
        history: &PairingHistory,
    ) -> PairingError {
        let allow_repeats = self.config.allow_repeat_pairings;

        for idx in (0..ranked.len()).filter(|&idx| required[idx]) {
            let id = ranked[idx].id();
            let has_opponent = ranked.iter().any(|other| {
                other.id() != id && (allow_repeats || !history.have_met(id, other.id()))
            });
            if !has_opponent {
                return PairingError::PlayerUnavailable(id);
            }

            let rest: Vec<&Player> = ranked
                .iter()
                .enumerate()
                .filter(|&(other, _)| other != idx)
                .map(|(_, player)| *player)
                .collect();
            let rest_required: Vec<bool> = required
                .iter()
                .enumerate()
                .filter(|&(other, _)| other != idx)
                .map(|(_, flag)| *flag)
                .collect();
            if let Search::Paired(_) = self.solve(&rest, &rest_required, history, allow_repeats) {
                return PairingError::PlayerUnavailable(id);
            }
        }

        let unconstrained = vec![false; ranked.len()];
        match self.solve(ranked, &unconstrained, history, allow_repeats) {
            Search::Paired(Assignment {
                bye: Some(bye), ..
            }) if required[bye] => PairingError::PlayerUnavailable(ranked[bye].id()),
            Search::OutOfBudget => self.out_of_budget(round),
            _ => PairingError::Exhausted { round },
        }
    }

    fn out_of_budget(&self, round: RoundNumber) -> PairingError {
        PairingError::SearchBudgetExhausted {
            round,
            budget: self.config.search_budget,
        }
    }

    /// Bye candidates from the bottom of the ranking up, fewest byes first
    fn bye_candidates(
        ranked: &[&Player],
        required: &[bool],
        history: &PairingHistory,
    ) -> Vec<usize> {
        let mut candidates: Vec<usize> = (0..ranked.len())
            .rev()
            .filter(|&idx| !required[idx])
            .collect();
        candidates.sort_by_key(|&idx| history.byes_for(ranked[idx].id()));
        candidates
    }

    fn match_all(
        mut unpaired: Vec<usize>,
        ranked: &[&Player],
        history: &PairingHistory,
        allow_repeats: bool,
        budget: &mut usize,
    ) -> Option<Vec<(usize, usize)>> {
        let mut games = Vec::with_capacity(unpaired.len() / 2);
        Self::search(
            &mut unpaired,
            &mut games,
            ranked,
            history,
            allow_repeats,
            budget,
        )
        .then_some(games)
    }

    /// Depth-first search pairing the highest-ranked unpaired player first.
    /// `unpaired` stays sorted by rank across calls.
    fn search(
        unpaired: &mut Vec<usize>,
        games: &mut Vec<(usize, usize)>,
        ranked: &[&Player],
        history: &PairingHistory,
        allow_repeats: bool,
        budget: &mut usize,
    ) -> bool {
        let Some(&top) = unpaired.first() else {
            return true;
        };
        if *budget == 0 {
            return false;
        }
        *budget -= 1;

        unpaired.remove(0);
        for pos in Self::candidate_positions(top, unpaired, ranked, history, allow_repeats) {
            let partner = unpaired.remove(pos);
            games.push((top, partner));

            if Self::search(unpaired, games, ranked, history, allow_repeats, budget) {
                return true;
            }

            games.pop();
            unpaired.insert(pos, partner);
        }
        unpaired.insert(0, top);

        false
    }

    /// Positions in `unpaired` to try for `top`, nearest rank first.
    /// Rematches come last and only when allowed.
    fn candidate_positions(
        top: usize,
        unpaired: &[usize],
        ranked: &[&Player],
        history: &PairingHistory,
        allow_repeats: bool,
    ) -> Vec<usize> {
        let top_id = ranked[top].id();
        let (novel, repeats): (Vec<usize>, Vec<usize>) = (0..unpaired.len())
            .partition(|&pos| !history.have_met(top_id, ranked[unpaired[pos]].id()));

        if allow_repeats {
            novel.into_iter().chain(repeats).collect()
        } else {
            novel
        }
    }

    fn build(round: RoundNumber, ranked: &[&Player], assignment: Assignment) -> Vec<Pairing> {
        let mut games = assignment.games;
        games.sort_by_key(|&(higher, lower)| higher.min(lower));

        let mut pairings: Vec<Pairing> = games
            .into_iter()
            .zip(1u32..)
            .map(|((higher, lower), board)| {
                let (white, black) = Self::allocate_colors(round, ranked[higher], ranked[lower]);
                Pairing::new(round, board, white, black)
            })
            .collect();

        if let Some(bye) = assignment.bye {
            let board = pairings.len() as u32 + 1;
            pairings.push(Pairing::bye(round, board, ranked[bye].id()));
        }

        pairings
    }

    /// The player owed white gets it; otherwise alternate by round parity
    fn allocate_colors(
        round: RoundNumber,
        higher: &Player,
        lower: &Player,
    ) -> (PlayerId, PlayerId) {
        match higher.color_balance().cmp(&lower.color_balance()) {
            Ordering::Less => (higher.id(), lower.id()),
            Ordering::Greater => (lower.id(), higher.id()),
            Ordering::Equal if round % 2 == 1 => (higher.id(), lower.id()),
            Ordering::Equal => (lower.id(), higher.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::{GameResult, PairKey, Side};
    use std::collections::HashSet;

    fn registry_of(names: &[&str]) -> (PlayerRegistry, Vec<PlayerId>) {
        let mut registry = PlayerRegistry::new();
        let ids = names
            .iter()
            .map(|name| registry.register(*name).unwrap())
            .collect();
        (registry, ids)
    }

    fn keys(pairings: &[Pairing]) -> HashSet<PairKey> {
        pairings.iter().filter_map(Pairing::pair_key).collect()
    }

    fn play(registry: &mut PlayerRegistry, pairing: &Pairing, result: GameResult) {
        let black = pairing.black_player().unwrap();
        registry
            .get_mut(pairing.white)
            .unwrap()
            .record_game(black, Side::White, result);
        registry
            .get_mut(black)
            .unwrap()
            .record_game(pairing.white, Side::Black, result);
    }

    #[test]
    fn test_four_player_two_rounds() {
        let (mut registry, ids) = registry_of(&["A", "B", "C", "D"]);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
        let engine = PairingEngine::default();
        let availability = AvailabilityTracker::new();
        let mut history = PairingHistory::new();

        let round_one = engine
            .compute_pairings(1, &registry, &history, &availability)
            .unwrap();
        assert_eq!(
            keys(&round_one),
            HashSet::from([PairKey::new(a, b), PairKey::new(c, d)])
        );

        for pairing in &round_one {
            history.record(pairing);
            let winner_side = if pairing.white == a || pairing.white == c {
                Side::White
            } else {
                Side::Black
            };
            play(&mut registry, pairing, GameResult::Win(winner_side));
        }
        assert_eq!(registry.get(a).unwrap().score().halves(), 2);
        assert_eq!(registry.get(c).unwrap().score().halves(), 2);

        let round_two = engine
            .compute_pairings(2, &registry, &history, &availability)
            .unwrap();
        assert_eq!(
            keys(&round_two),
            HashSet::from([PairKey::new(a, c), PairKey::new(b, d)])
        );
    }

    #[test]
    fn test_odd_field_gives_lowest_ranked_the_bye() {
        let (registry, ids) = registry_of(&["A", "B", "C", "D", "E"]);
        let pairings = PairingEngine::default()
            .compute_pairings(1, &registry, &PairingHistory::new(), &AvailabilityTracker::new())
            .unwrap();

        assert_eq!(pairings.len(), 3);
        let byes: Vec<&Pairing> = pairings.iter().filter(|p| p.is_bye()).collect();
        assert_eq!(byes.len(), 1);
        assert_eq!(byes[0].white, ids[4]);
        assert_eq!(byes[0].board, 3);
    }

    #[test]
    fn test_bye_skips_player_who_already_had_one() {
        let (registry, ids) = registry_of(&["A", "B", "C", "D", "E"]);
        let history = PairingHistory::from_pairings(&[Pairing::bye(1, 3, ids[4])]);

        let pairings = PairingEngine::default()
            .compute_pairings(2, &registry, &history, &AvailabilityTracker::new())
            .unwrap();

        let bye = pairings.iter().find(|p| p.is_bye()).unwrap();
        assert_eq!(bye.white, ids[3]);
    }

    #[test]
    fn test_unavailable_players_are_skipped() {
        let (registry, ids) = registry_of(&["A", "B", "C", "D"]);
        let mut availability = AvailabilityTracker::new();
        availability.mark_unavailable(ids[1], 1);

        let pairings = PairingEngine::default()
            .compute_pairings(1, &registry, &PairingHistory::new(), &availability)
            .unwrap();

        assert_eq!(pairings.len(), 2);
        assert!(pairings.iter().all(|p| !p.involves(ids[1])));
        assert_eq!(keys(&pairings), HashSet::from([PairKey::new(ids[0], ids[2])]));
    }

    #[test]
    fn test_backtracks_to_avoid_stranded_rematch() {
        let (registry, ids) = registry_of(&["A", "B", "C", "D"]);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
        // A-B first would strand C and D, who have met
        let history = PairingHistory::from_pairings(&[Pairing::new(1, 1, c, d)]);

        let pairings = PairingEngine::default()
            .compute_pairings(2, &registry, &history, &AvailabilityTracker::new())
            .unwrap();

        assert_eq!(
            keys(&pairings),
            HashSet::from([PairKey::new(a, c), PairKey::new(b, d)])
        );
    }

    #[test]
    fn test_exhausted_without_repeats() {
        let (registry, ids) = registry_of(&["A", "B"]);
        let history = PairingHistory::from_pairings(&[Pairing::new(1, 1, ids[0], ids[1])]);

        let result = PairingEngine::default().compute_pairings(
            2,
            &registry,
            &history,
            &AvailabilityTracker::new(),
        );
        assert_eq!(result, Err(PairingError::Exhausted { round: 2 }));
    }

    #[test]
    fn test_repeats_allowed_once_novel_pairings_run_out() {
        let (registry, ids) = registry_of(&["A", "B"]);
        let history = PairingHistory::from_pairings(&[Pairing::new(1, 1, ids[0], ids[1])]);
        let engine = PairingEngine::new(PairingConfig {
            allow_repeat_pairings: true,
            ..Default::default()
        });

        let pairings = engine
            .compute_pairings(2, &registry, &history, &AvailabilityTracker::new())
            .unwrap();
        assert_eq!(keys(&pairings), HashSet::from([PairKey::new(ids[0], ids[1])]));
    }

    #[test]
    fn test_required_but_unavailable_player_fails() {
        let (registry, ids) = registry_of(&["A", "B", "C", "D"]);
        let mut availability = AvailabilityTracker::new();
        availability.mark_required(ids[2], 1);
        availability.mark_unavailable(ids[2], 1);

        let result = PairingEngine::default().compute_pairings(
            1,
            &registry,
            &PairingHistory::new(),
            &availability,
        );
        assert_eq!(result, Err(PairingError::PlayerUnavailable(ids[2])));
    }

    #[test]
    fn test_required_player_never_takes_the_bye() {
        let (registry, ids) = registry_of(&["A", "B", "C"]);
        let mut availability = AvailabilityTracker::new();
        availability.mark_required(ids[2], 1);

        let pairings = PairingEngine::default()
            .compute_pairings(1, &registry, &PairingHistory::new(), &availability)
            .unwrap();

        let bye = pairings.iter().find(|p| p.is_bye()).unwrap();
        assert_eq!(bye.white, ids[1]);
    }

    #[test]
    fn test_required_player_blocked_by_rematches() {
        let (registry, ids) = registry_of(&["A", "B", "C"]);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        // C has met everyone, so only the bye could seat C
        let history =
            PairingHistory::from_pairings(&[Pairing::new(1, 1, a, c), Pairing::new(2, 1, b, c)]);
        let mut availability = AvailabilityTracker::new();
        availability.mark_required(c, 3);

        let result = PairingEngine::default().compute_pairings(3, &registry, &history, &availability);
        assert_eq!(result, Err(PairingError::PlayerUnavailable(c)));
    }

    #[test]
    fn test_required_player_blocked_in_even_field() {
        let (registry, ids) = registry_of(&["A", "B", "C", "D"]);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
        // No bye in an even field; D has met everyone else
        let history = PairingHistory::from_pairings(&[
            Pairing::new(1, 1, d, a),
            Pairing::new(2, 1, b, d),
            Pairing::new(3, 1, d, c),
        ]);
        let mut availability = AvailabilityTracker::new();
        availability.mark_required(d, 4);

        let result = PairingEngine::default().compute_pairings(4, &registry, &history, &availability);
        assert_eq!(result, Err(PairingError::PlayerUnavailable(d)));

        // Without the requirement nobody is singled out
        let result = PairingEngine::default().compute_pairings(
            4,
            &registry,
            &history,
            &AvailabilityTracker::new(),
        );
        assert_eq!(result, Err(PairingError::Exhausted { round: 4 }));
    }

    #[test]
    fn test_highest_ranked_blocking_player_is_reported() {
        let (registry, ids) = registry_of(&["A", "B", "C", "D", "E", "F"]);
        let (a, b, c, d, e, f) = (ids[0], ids[1], ids[2], ids[3], ids[4], ids[5]);
        // B and E have each met everyone
        let mut games = Vec::new();
        for (round, opponent) in (1..).zip([a, c, d, e, f]) {
            games.push(Pairing::new(round, 1, b, opponent));
        }
        for (round, opponent) in (1..).zip([a, c, d, f]) {
            games.push(Pairing::new(round, 2, e, opponent));
        }
        let history = PairingHistory::from_pairings(&games);
        let mut availability = AvailabilityTracker::new();
        availability.mark_required(e, 6);
        availability.mark_required(b, 6);

        let result = PairingEngine::default().compute_pairings(6, &registry, &history, &availability);
        assert_eq!(result, Err(PairingError::PlayerUnavailable(b)));
    }

    #[test]
    fn test_search_budget_exhaustion_is_reported() {
        let (registry, _) = registry_of(&["A", "B", "C", "D"]);
        let config = PairingConfig {
            search_budget: 1,
            ..Default::default()
        };

        let result = PairingEngine::new(config.clone()).compute_pairings(
            1,
            &registry,
            &PairingHistory::new(),
            &AvailabilityTracker::new(),
        );
        assert_eq!(
            result,
            Err(PairingError::SearchBudgetExhausted {
                round: 1,
                budget: 1
            })
        );

        let with_repeats = PairingEngine::new(PairingConfig {
            allow_repeat_pairings: true,
            ..config
        });
        let result = with_repeats.compute_pairings(
            1,
            &registry,
            &PairingHistory::new(),
            &AvailabilityTracker::new(),
        );
        assert!(matches!(
            result,
            Err(PairingError::SearchBudgetExhausted { .. })
        ));
    }

    #[test]
    fn test_lone_player_gets_bye() {
        let (registry, ids) = registry_of(&["Solo"]);
        let pairings = PairingEngine::default()
            .compute_pairings(1, &registry, &PairingHistory::new(), &AvailabilityTracker::new())
            .unwrap();

        assert_eq!(pairings, vec![Pairing::bye(1, 1, ids[0])]);
    }

    #[test]
    fn test_no_eligible_players() {
        let registry = PlayerRegistry::new();
        let pairings = PairingEngine::default()
            .compute_pairings(1, &registry, &PairingHistory::new(), &AvailabilityTracker::new())
            .unwrap();
        assert!(pairings.is_empty());
    }

    #[test]
    fn test_colors_follow_balance() {
        let (mut registry, ids) = registry_of(&["A", "B", "C", "D"]);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);
        // A has had white, C has had black; both drew
        play(&mut registry, &Pairing::new(1, 1, a, b), GameResult::Draw);
        play(&mut registry, &Pairing::new(1, 2, d, c), GameResult::Draw);
        let history = PairingHistory::from_pairings(&[
            Pairing::new(1, 1, a, b),
            Pairing::new(1, 2, d, c),
        ]);

        let pairings = PairingEngine::default()
            .compute_pairings(2, &registry, &history, &AvailabilityTracker::new())
            .unwrap();

        let board_one = &pairings[0];
        assert_eq!(board_one.pair_key(), Some(PairKey::new(a, c)));
        assert_eq!(board_one.white, c);
    }

    #[test]
    fn test_required_unknown_player_is_rejected() {
        let (registry, _) = registry_of(&["A", "B"]);
        let mut availability = AvailabilityTracker::new();
        availability.mark_required(99, 1);

        let error = PairingEngine::default()
            .compute_pairings(1, &registry, &PairingHistory::new(), &availability)
            .unwrap_err();
        assert_eq!(error, PairingError::UnknownPlayer(99));
    }
}
