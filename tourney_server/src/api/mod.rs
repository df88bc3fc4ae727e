//! HTTP API for the tournament server.
//!
//! Read endpoints expose snapshots of the running tournament. Operator
//! endpoints adjust availability and settle pairings by hand.
//!
//! # Endpoints
//!
//! ```text
//! GET  /health
//! GET  /api/v1/tournament
//! GET  /api/v1/standings
//! GET  /api/v1/rounds/{round}
//! POST /api/v1/rounds/{round}/boards/{board}/void
//! POST /api/v1/rounds/{round}/boards/{board}/result   {"result": "white" | "black" | "draw"}
//! POST /api/v1/players/{id}/unavailable               {"round": n}
//! POST /api/v1/players/{id}/available                 {"round": n}
//! POST /api/v1/players/{id}/require                   {"round": n}
//! POST /api/v1/players/{id}/release                   {"round": n}
//! POST /api/v1/players/{id}/withdraw
//! ```
//!
//! CORS is permissive; the server is meant to sit behind an operator network.

pub mod players;
pub mod request_id;
pub mod tournament;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tourney::{TournamentController, TournamentError};
use tower_http::cors::CorsLayer;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<TournamentController>,
}

impl AppState {
    pub fn new(controller: Arc<TournamentController>) -> Self {
        Self { controller }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a controller error onto a status code and JSON body
pub fn error_response(err: TournamentError) -> ApiError {
    let status = match &err {
        TournamentError::RoundNotFound(_)
        | TournamentError::PairingNotFound(_)
        | TournamentError::PlayerNotFound(_) => StatusCode::NOT_FOUND,
        TournamentError::InvalidState { .. }
        | TournamentError::InvalidRoundStatus { .. }
        | TournamentError::RoundUnresolved { .. }
        | TournamentError::NoRoundsRemaining(_) => StatusCode::CONFLICT,
        TournamentError::InsufficientPlayers { .. }
        | TournamentError::Pairing(_)
        | TournamentError::Registry(_) => StatusCode::BAD_REQUEST,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Build the router with every endpoint and middleware
///
/// ```rust,no_run
/// # use tourney_server::api::{create_router, AppState};
/// # async fn example(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:7070").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    let read_routes = Router::new()
        .route("/tournament", get(tournament::get_tournament))
        .route("/standings", get(tournament::get_standings))
        .route("/rounds/{round}", get(tournament::get_round));

    let operator_routes = Router::new()
        .route(
            "/rounds/{round}/boards/{board}/void",
            post(tournament::void_board),
        )
        .route(
            "/rounds/{round}/boards/{board}/result",
            post(tournament::record_board_result),
        )
        .route("/players/{player_id}/unavailable", post(players::mark_unavailable))
        .route("/players/{player_id}/available", post(players::mark_available))
        .route("/players/{player_id}/require", post(players::require))
        .route("/players/{player_id}/release", post(players::release))
        .route("/players/{player_id}/withdraw", post(players::withdraw));

    Router::new().merge(read_routes).merge(operator_routes)
}

/// Liveness plus a summary of tournament progress
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let phase = state.controller.phase().await;
    let current_round = state
        .controller
        .state()
        .read()
        .await
        .current_round();

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "tournament": {
            "phase": phase,
            "current_round": current_round,
            "total_rounds": state.controller.config().rounds,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
