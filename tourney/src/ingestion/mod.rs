//! Result ingestion.
//!
//! One [`ResultIngestionPipeline::ingest`] call is one polling cycle for one
//! pairing: fetch the game, validate the payload, and commit a final result
//! into tournament state exactly once. Repeated failures are tracked per
//! pairing and escalate to an [`IngestionError`] once they pass the
//! configured thresholds.

pub mod errors;
pub mod pipeline;

pub use errors::{IngestionError, IngestionResult};
pub use pipeline::{IngestOutcome, IngestionPolicy, ResultIngestionPipeline};
