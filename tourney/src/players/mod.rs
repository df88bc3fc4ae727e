//! Player registry and availability tracking.
//!
//! [`PlayerRegistry`] owns every registered [`Player`] in registration order.
//! Identities never change once registered; score, opponent history and
//! color counts are only written when a result is committed.
//!
//! [`AvailabilityTracker`] owns per-round availability. Players default to
//! available, may be marked unavailable (or required to play) ahead of pairing,
//! and all per-round flags are cleared when the round rolls over.

pub mod availability;
pub mod registry;

pub use availability::{AvailabilityTracker, AvailabilityUpdate};
pub use registry::{Player, PlayerRegistry, RegistryError, RegistryResult, Score};

/// Player ID type
pub type PlayerId = i64;
