//! Tournament driver loop.

use crate::{logging, metrics};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tourney::{TournamentController, TournamentError, tournament::RoundReport};

/// Run the tournament to completion. A round left unresolved, or a round
/// that cannot be paired, is retried after `retry_every` so operators can
/// fix it over the API.
pub async fn drive(controller: Arc<TournamentController>, retry_every: Duration) {
    let token: CancellationToken = controller.cancellation_token();

    loop {
        let outcome = controller.run().await;
        record_reports(&controller.drain_reports());

        match outcome {
            Ok(_) => {
                let phase = controller.phase().await;
                tracing::info!(phase = ?phase, "Tournament run finished");
                break;
            }
            Err(TournamentError::RoundUnresolved { round, pending }) => {
                tracing::warn!(round, pending, "Round awaits operator action");
                metrics::current_round(round);
            }
            Err(TournamentError::Pairing(e)) => {
                tracing::warn!("Next round cannot be paired, awaiting operator action: {e}");
            }
            Err(e) => {
                tracing::error!("Tournament stopped: {e}");
                break;
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(retry_every) => {}
        }
    }
}

pub fn record_reports(reports: &[RoundReport]) {
    for report in reports {
        logging::log_round_report(report);
        metrics::record_round_report(report);
        metrics::current_round(report.round);
    }
}
