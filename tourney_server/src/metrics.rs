//! Prometheus metrics for tournament progress and API traffic.
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter, so the
//! helpers are safe to call from tests.
//!
//! ```rust,no_run
//! use tourney_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//! metrics::http_requests_total("GET", "/api/v1/standings", 200);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tourney::tournament::RoundReport;

/// Install the Prometheus exporter, scraped at `http://<addr>/metrics`
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Tournament Metrics
// ============================================================================

/// Set the round currently being played
pub fn current_round(round: u32) {
    metrics::gauge!("tournament_current_round").set(f64::from(round));
}

/// Set the number of registered players
pub fn registered_players(count: usize) {
    metrics::gauge!("tournament_registered_players").set(count as f64);
}

/// Fold one round report into the counters
pub fn record_round_report(report: &RoundReport) {
    metrics::counter!("tournament_rounds_monitored_total").increment(1);
    metrics::counter!("tournament_results_committed_total")
        .increment(report.committed.len() as u64);
    metrics::counter!("tournament_results_stale_total")
        .increment(report.already_settled.len() as u64);
    metrics::counter!("tournament_pairings_voided_total").increment(report.voided.len() as u64);
    metrics::counter!("tournament_anomalies_total").increment(report.anomalies.len() as u64);
}

/// Count a pairing voided by an operator
pub fn operator_void() {
    metrics::counter!("tournament_operator_voids_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter() {
        http_requests_total("GET", "/health", 200);
        http_request_duration_ms("GET", "/health", 1.5);
        current_round(3);
        registered_players(8);
        record_round_report(&RoundReport::default());
        operator_void();
    }
}
