//! Swiss tournament server.
//!
//! Pairs rounds, watches the game server for results and serves standings
//! over HTTP until interrupted.

use std::sync::Arc;

use anyhow::{Context, Error};
use ctrlc::set_handler;
use pico_args::Arguments;
use tourney::{TournamentController, observer::HttpGameSource};
use tourney_server::{
    api::{AppState, create_router},
    config::{Overrides, ServerConfig},
    logging, metrics, runner,
};

const HELP: &str = "\
Run a Swiss tournament against a remote game server

USAGE:
  tourney_server [OPTIONS]

OPTIONS:
  --bind          IP:PORT   HTTP API bind address      [default: env SERVER_BIND or 127.0.0.1:7070]
  --game-server   URL       Game server base URL       [default: env GAME_SERVER_URL or http://127.0.0.1:8080]
  --players       A,B,...   Player names, in order     [default: env TOURNAMENT_PLAYERS]
  --rounds        N         Number of rounds           [default: env TOURNAMENT_ROUNDS or ceil(log2 players)]
  --metrics-bind  IP:PORT   Prometheus exporter bind   [default: env METRICS_BIND, disabled when unset]

FLAGS:
  -h, --help                Print help information

ENVIRONMENT:
  TOURNAMENT_NAME           Tournament name, also the game ID prefix
  FETCH_MAX_ATTEMPTS        Attempts per poll before giving up        [default: 5]
  FETCH_BASE_DELAY_MS       First retry delay                         [default: 250]
  FETCH_MAX_DELAY_MS        Retry delay cap                           [default: 10000]
  FETCH_TIMEOUT_MS          Per-attempt timeout                       [default: 5000]
  FETCH_JITTER_RATIO        Random extra delay, fraction of backoff   [default: 0.5]
  FETCH_SEED                Seed for reproducible jitter
  POLL_INTERVAL_MS          Delay between polls of an ongoing game    [default: 2000]
  VALIDATION_ALLOWANCE      Invalid responses tolerated per pairing   [default: 3]
  FETCH_FAILURE_CEILING     Failed polls tolerated per pairing        [default: 10]
  ALLOW_REPEAT_PAIRINGS     Fall back to rematches                    [default: false]
  REQUIRE_AFTER_BYE         Bye recipient must play next round        [default: true]
  FAILURE_POLICY            void | leave                              [default: void]
  RESPONSE_SCHEMA_FILE      JSON file overriding the response schema
  RUST_LOG                  Log filter
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        bind: pargs.opt_value_from_str("--bind")?,
        game_server: pargs.opt_value_from_str("--game-server")?,
        players: pargs.opt_value_from_str("--players")?,
        rounds: pargs.opt_value_from_str("--rounds")?,
        metrics_bind: pargs.opt_value_from_str("--metrics-bind")?,
    };

    logging::init();

    let config = ServerConfig::from_env(overrides)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        tracing::info!("Metrics exporter listening on http://{addr}/metrics");
    }

    let source = HttpGameSource::new(config.game_server.clone())
        .context("Failed to build HTTP client")?;
    let controller = Arc::new(TournamentController::new(
        config.tournament.clone(),
        Arc::new(source),
    ));

    for name in &config.players {
        let id = controller.register_player(name.clone()).await?;
        tracing::debug!(player_id = id, name = %name, "Registered");
    }
    metrics::registered_players(config.players.len());

    tracing::info!(
        name = %config.tournament.name,
        players = config.players.len(),
        rounds = config.tournament.rounds,
        game_server = %config.game_server,
        "Tournament configured"
    );

    let shutdown = controller.cancellation_token();
    let handler_token = shutdown.clone();
    set_handler(move || {
        tracing::info!("Interrupt received, shutting down");
        handler_token.cancel();
    })?;

    let driver = tokio::spawn(runner::drive(
        controller.clone(),
        config.tournament.ingestion.poll_interval,
    ));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("HTTP API listening on http://{}", config.bind);

    let app = create_router(AppState::new(controller.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    shutdown.cancel();
    if let Err(e) = driver.await {
        tracing::error!("Tournament task panicked: {e}");
    }

    let voided = controller.abort().await;
    if !voided.is_empty() {
        tracing::warn!(count = voided.len(), "Voided unfinished pairings on shutdown");
    }

    let standings = controller.standings().await;
    for standing in standings.iter().take(3) {
        tracing::info!(
            rank = standing.rank,
            name = %standing.name,
            score = %standing.score,
            "Final standing"
        );
    }

    tracing::info!("Shutting down server...");

    Ok(())
}
