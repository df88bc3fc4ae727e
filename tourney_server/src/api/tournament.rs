//! Tournament read endpoints and board-level operator commands.

use super::{ApiError, AppState, ErrorResponse, error_response, request_id::RequestId};
use crate::{logging, metrics};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tourney::{
    GameResult, RoundNumber, Side,
    tournament::{CommitOutcome, RoundSnapshot, Standing, TournamentSnapshot},
};

/// Result entered by an operator
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultPayload {
    White,
    Black,
    Draw,
}

impl From<ResultPayload> for GameResult {
    fn from(payload: ResultPayload) -> Self {
        match payload {
            ResultPayload::White => GameResult::Win(Side::White),
            ResultPayload::Black => GameResult::Win(Side::Black),
            ResultPayload::Draw => GameResult::Draw,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordResultRequest {
    pub result: ResultPayload,
}

/// Response to a board command. `applied` is false when the pairing was
/// already settled.
#[derive(Debug, Serialize)]
pub struct BoardCommandResponse {
    pub round: RoundNumber,
    pub board: u32,
    pub applied: bool,
}

/// Full snapshot: phase, standings and every round so far
pub async fn get_tournament(State(state): State<AppState>) -> Json<TournamentSnapshot> {
    Json(state.controller.snapshot().await)
}

pub async fn get_standings(State(state): State<AppState>) -> Json<Vec<Standing>> {
    Json(state.controller.standings().await)
}

/// # Errors
///
/// - `404 Not Found`: round has not been opened
pub async fn get_round(
    State(state): State<AppState>,
    Path(round): Path<RoundNumber>,
) -> Result<Json<RoundSnapshot>, ApiError> {
    state
        .controller
        .round_snapshot(round)
        .await
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Round {round} not found"),
                }),
            )
        })
}

/// Void a pending pairing. Neither player scores and the pair still counts
/// as having met.
pub async fn void_board(
    State(state): State<AppState>,
    request_id: RequestId,
    Path((round, board)): Path<(RoundNumber, u32)>,
) -> Result<Json<BoardCommandResponse>, ApiError> {
    logging::log_operator_action(
        request_id.as_str(),
        "void",
        &format!("round {round} board {board}"),
    );

    let outcome = state
        .controller
        .void_pairing(round, board)
        .await
        .map_err(error_response)?;

    if outcome == CommitOutcome::Applied {
        metrics::operator_void();
    }

    Ok(Json(BoardCommandResponse {
        round,
        board,
        applied: outcome == CommitOutcome::Applied,
    }))
}

/// Enter a result by hand
pub async fn record_board_result(
    State(state): State<AppState>,
    request_id: RequestId,
    Path((round, board)): Path<(RoundNumber, u32)>,
    Json(request): Json<RecordResultRequest>,
) -> Result<Json<BoardCommandResponse>, ApiError> {
    let result = GameResult::from(request.result);
    logging::log_operator_action(
        request_id.as_str(),
        "record_result",
        &format!("round {round} board {board}: {result}"),
    );

    let outcome = state
        .controller
        .record_result(round, board, result)
        .await
        .map_err(error_response)?;

    Ok(Json(BoardCommandResponse {
        round,
        board,
        applied: outcome == CommitOutcome::Applied,
    }))
}
