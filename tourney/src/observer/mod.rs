//! Game server observer.
//!
//! A [`GameSource`] performs a single request against the game server;
//! [`HttpGameSource`] is the reqwest-backed implementation. [`GameFetcher`]
//! wraps a source with the retry policy:
//!
//! - at most [`FetchPolicy::max_attempts`] attempts, each bounded by its own timeout
//! - exponential backoff with jitter between attempts
//! - connection faults, timeouts and non-success statuses all spend the budget
//! - cancellation interrupts both in-flight requests and backoff sleeps
//!
//! Payloads are returned as-is; checking them is the job of
//! [`crate::validation`].

pub mod fetcher;
pub mod models;
pub mod source;

pub use fetcher::{FetchPolicy, GameFetcher};
pub use models::{FetchFailure, GameFetchRequest, RawResponse, TransportFault};
pub use source::{GameSource, HttpGameSource};
