//! Structured logging setup.
//!
//! The library crate logs through the `log` facade. Those records are bridged
//! into the tracing subscriber installed here.

use tourney::tournament::RoundReport;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Initialize structured logging, honoring `RUST_LOG` when set
///
/// # Example
///
/// ```no_run
/// use tourney_server::logging;
///
/// logging::init();
/// tracing::info!("Server starting");
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log the outcome of one monitored round
pub fn log_round_report(report: &RoundReport) {
    tracing::info!(
        round = report.round,
        committed = report.committed.len(),
        already_settled = report.already_settled.len(),
        voided = report.voided.len(),
        cancelled = report.cancelled.len(),
        "Round monitored"
    );

    for anomaly in &report.anomalies {
        tracing::warn!(round = report.round, anomaly = %anomaly, "Round anomaly");
    }
}

/// Log an operator command received over the API
pub fn log_operator_action(request_id: &str, action: &str, target: &str) {
    tracing::info!(
        request_id = request_id,
        action = action,
        target = target,
        "Operator action"
    );
}
