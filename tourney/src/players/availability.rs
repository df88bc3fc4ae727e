//! Per-round availability state.

use super::PlayerId;
use crate::RoundNumber;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Result of an availability mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AvailabilityUpdate {
    /// State changed
    Applied,
    /// State already matched the request
    Unchanged,
    /// Round already closed, nothing recorded
    Stale {
        round: RoundNumber,
        closed_through: RoundNumber,
    },
}

impl AvailabilityUpdate {
    pub fn is_stale(&self) -> bool {
        matches!(self, AvailabilityUpdate::Stale { .. })
    }
}

/// Tracks which players may be paired in which round.
///
/// Everyone is available unless marked otherwise. Flags for a round are
/// dropped when that round rolls over; updates aimed at a closed round are
/// reported as [`AvailabilityUpdate::Stale`] rather than rejected.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityTracker {
    unavailable: HashMap<RoundNumber, HashSet<PlayerId>>,
    required: HashMap<RoundNumber, HashSet<PlayerId>>,
    withdrawn: HashSet<PlayerId>,
    closed_through: RoundNumber,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest round already rolled over (0 before the first close)
    pub fn closed_through(&self) -> RoundNumber {
        self.closed_through
    }

    /// Mark a player unavailable for a round
    pub fn mark_unavailable(&mut self, player: PlayerId, round: RoundNumber) -> AvailabilityUpdate {
        if let Some(stale) = self.stale(round) {
            log::debug!("Ignoring unavailability of player {player} for closed round {round}");
            return stale;
        }

        if self.unavailable.entry(round).or_default().insert(player) {
            log::info!("Player {player} marked unavailable for round {round}");
            AvailabilityUpdate::Applied
        } else {
            AvailabilityUpdate::Unchanged
        }
    }

    /// Clear a previous unavailability mark
    pub fn mark_available(&mut self, player: PlayerId, round: RoundNumber) -> AvailabilityUpdate {
        if let Some(stale) = self.stale(round) {
            return stale;
        }

        let removed = self
            .unavailable
            .get_mut(&round)
            .is_some_and(|players| players.remove(&player));

        if removed {
            log::info!("Player {player} marked available for round {round}");
            AvailabilityUpdate::Applied
        } else {
            AvailabilityUpdate::Unchanged
        }
    }

    /// Whether a player may be paired in a round
    pub fn is_available(&self, player: PlayerId, round: RoundNumber) -> bool {
        !self.withdrawn.contains(&player)
            && !self
                .unavailable
                .get(&round)
                .is_some_and(|players| players.contains(&player))
    }

    /// Require a player to play a real game in a round (no bye)
    pub fn mark_required(&mut self, player: PlayerId, round: RoundNumber) -> AvailabilityUpdate {
        if let Some(stale) = self.stale(round) {
            return stale;
        }

        if self.required.entry(round).or_default().insert(player) {
            AvailabilityUpdate::Applied
        } else {
            AvailabilityUpdate::Unchanged
        }
    }

    /// Lift a play requirement
    pub fn release(&mut self, player: PlayerId, round: RoundNumber) -> AvailabilityUpdate {
        if let Some(stale) = self.stale(round) {
            return stale;
        }

        let removed = self
            .required
            .get_mut(&round)
            .is_some_and(|players| players.remove(&player));

        if removed {
            AvailabilityUpdate::Applied
        } else {
            AvailabilityUpdate::Unchanged
        }
    }

    pub fn is_required(&self, player: PlayerId, round: RoundNumber) -> bool {
        self.required
            .get(&round)
            .is_some_and(|players| players.contains(&player))
    }

    /// Withdraw a player from every future round
    pub fn withdraw(&mut self, player: PlayerId) -> AvailabilityUpdate {
        if self.withdrawn.insert(player) {
            log::info!("Player {player} withdrawn");
            AvailabilityUpdate::Applied
        } else {
            AvailabilityUpdate::Unchanged
        }
    }

    pub fn is_withdrawn(&self, player: PlayerId) -> bool {
        self.withdrawn.contains(&player)
    }

    /// Players explicitly marked unavailable for a round, sorted
    pub fn unavailable_in(&self, round: RoundNumber) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self
            .unavailable
            .get(&round)
            .map(|players| players.iter().copied().collect())
            .unwrap_or_default();
        players.sort_unstable();
        players
    }

    /// Players required to play in a round, sorted
    pub fn required_in(&self, round: RoundNumber) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self
            .required
            .get(&round)
            .map(|players| players.iter().copied().collect())
            .unwrap_or_default();
        players.sort_unstable();
        players
    }

    /// Drop all per-round flags up to and including `closed_round`
    pub fn rollover(&mut self, closed_round: RoundNumber) {
        self.unavailable.retain(|round, _| *round > closed_round);
        self.required.retain(|round, _| *round > closed_round);
        self.closed_through = self.closed_through.max(closed_round);
    }

    fn stale(&self, round: RoundNumber) -> Option<AvailabilityUpdate> {
        (round <= self.closed_through).then_some(AvailabilityUpdate::Stale {
            round,
            closed_through: self.closed_through,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_players_default_to_available() {
        let tracker = AvailabilityTracker::new();
        assert!(tracker.is_available(1, 1));
        assert!(tracker.is_available(42, 9));
    }

    #[test]
    fn test_mark_unavailable_is_per_round() {
        let mut tracker = AvailabilityTracker::new();
        assert_eq!(tracker.mark_unavailable(1, 2), AvailabilityUpdate::Applied);
        assert_eq!(tracker.mark_unavailable(1, 2), AvailabilityUpdate::Unchanged);

        assert!(!tracker.is_available(1, 2));
        assert!(tracker.is_available(1, 1));
        assert!(tracker.is_available(1, 3));
        assert_eq!(tracker.unavailable_in(2), vec![1]);
    }

    #[test]
    fn test_mark_available_clears_flag() {
        let mut tracker = AvailabilityTracker::new();
        tracker.mark_unavailable(3, 1);

        assert_eq!(tracker.mark_available(3, 1), AvailabilityUpdate::Applied);
        assert!(tracker.is_available(3, 1));
        assert_eq!(tracker.mark_available(3, 1), AvailabilityUpdate::Unchanged);
    }

    #[test]
    fn test_closed_round_updates_are_stale() {
        let mut tracker = AvailabilityTracker::new();
        tracker.mark_unavailable(1, 1);
        tracker.rollover(1);

        let update = tracker.mark_unavailable(2, 1);
        assert_eq!(
            update,
            AvailabilityUpdate::Stale {
                round: 1,
                closed_through: 1
            }
        );
        assert!(update.is_stale());
        assert!(tracker.mark_available(1, 1).is_stale());
        assert!(tracker.mark_required(1, 1).is_stale());
    }

    #[test]
    fn test_rollover_clears_closed_rounds_only() {
        let mut tracker = AvailabilityTracker::new();
        tracker.mark_unavailable(1, 1);
        tracker.mark_unavailable(2, 2);
        tracker.mark_required(3, 2);

        tracker.rollover(1);

        assert!(tracker.unavailable_in(1).is_empty());
        assert_eq!(tracker.unavailable_in(2), vec![2]);
        assert!(tracker.is_required(3, 2));
        assert_eq!(tracker.closed_through(), 1);
    }

    #[test]
    fn test_withdrawn_players_are_never_available() {
        let mut tracker = AvailabilityTracker::new();
        assert_eq!(tracker.withdraw(5), AvailabilityUpdate::Applied);
        assert_eq!(tracker.withdraw(5), AvailabilityUpdate::Unchanged);

        assert!(!tracker.is_available(5, 1));
        assert!(!tracker.is_available(5, 10));
        assert!(tracker.is_withdrawn(5));
    }

    #[test]
    fn test_required_flags() {
        let mut tracker = AvailabilityTracker::new();
        tracker.mark_required(4, 3);
        tracker.mark_required(2, 3);

        assert!(tracker.is_required(4, 3));
        assert!(!tracker.is_required(4, 2));
        assert_eq!(tracker.required_in(3), vec![2, 4]);

        assert_eq!(tracker.release(4, 3), AvailabilityUpdate::Applied);
        assert!(!tracker.is_required(4, 3));
    }
}
