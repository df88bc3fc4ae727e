//! Player availability commands.

use super::{ApiError, AppState, error_response, request_id::RequestId};
use crate::logging;
use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tourney::{AvailabilityUpdate, PlayerId, RoundNumber};

#[derive(Debug, Deserialize)]
pub struct RoundRequest {
    pub round: RoundNumber,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub player_id: PlayerId,
    pub round: Option<RoundNumber>,
    pub update: AvailabilityUpdate,
}

fn respond(
    player_id: PlayerId,
    round: Option<RoundNumber>,
    update: AvailabilityUpdate,
) -> Json<AvailabilityResponse> {
    if update.is_stale() {
        tracing::warn!(player_id, ?round, "Availability update for a closed round ignored");
    }
    Json(AvailabilityResponse {
        player_id,
        round,
        update,
    })
}

/// Keep a player out of a round that has not been paired yet
pub async fn mark_unavailable(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(player_id): Path<PlayerId>,
    Json(request): Json<RoundRequest>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    logging::log_operator_action(
        request_id.as_str(),
        "unavailable",
        &format!("player {player_id} round {}", request.round),
    );
    let update = state
        .controller
        .force_unavailable(player_id, request.round)
        .await
        .map_err(error_response)?;
    Ok(respond(player_id, Some(request.round), update))
}

pub async fn mark_available(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(player_id): Path<PlayerId>,
    Json(request): Json<RoundRequest>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    logging::log_operator_action(
        request_id.as_str(),
        "available",
        &format!("player {player_id} round {}", request.round),
    );
    let update = state
        .controller
        .mark_available(player_id, request.round)
        .await
        .map_err(error_response)?;
    Ok(respond(player_id, Some(request.round), update))
}

/// Forbid a bye for the player in the given round
pub async fn require(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(player_id): Path<PlayerId>,
    Json(request): Json<RoundRequest>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    logging::log_operator_action(
        request_id.as_str(),
        "require",
        &format!("player {player_id} round {}", request.round),
    );
    let update = state
        .controller
        .require_player(player_id, request.round)
        .await
        .map_err(error_response)?;
    Ok(respond(player_id, Some(request.round), update))
}

pub async fn release(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(player_id): Path<PlayerId>,
    Json(request): Json<RoundRequest>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    logging::log_operator_action(
        request_id.as_str(),
        "release",
        &format!("player {player_id} round {}", request.round),
    );
    let update = state
        .controller
        .release_player(player_id, request.round)
        .await
        .map_err(error_response)?;
    Ok(respond(player_id, Some(request.round), update))
}

/// Remove a player from all future rounds
pub async fn withdraw(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    logging::log_operator_action(
        request_id.as_str(),
        "withdraw",
        &format!("player {player_id}"),
    );
    let update = state
        .controller
        .withdraw_player(player_id)
        .await
        .map_err(error_response)?;
    Ok(respond(player_id, None, update))
}
