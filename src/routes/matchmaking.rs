use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        game::GameStateView,
        matchmaking::{ChallengeRequest, JoinQueueResponse, PlayerQueueStatus, QueueBucketStatus, QueueRequest},
    },
    error::AppError,
    routes::identity::PlayerIdentity,
    services::matchmaking_service,
    state::{SharedState, game::PlayerId},
};

/// Routes for the matchmaking queue.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/matchmaking/queue", post(join_queue).get(queue_status))
        .route("/matchmaking/queue/cancel", post(cancel_queue))
        .route("/matchmaking/queue/me", get(my_queue_status))
        .route("/matchmaking/challenge/{player_id}", post(challenge_player))
}

/// Queue the caller for a board size.
#[utoipa::path(
    post,
    path = "/matchmaking/queue",
    tag = "matchmaking",
    params(("x-player-id" = u64, Header, description = "Verified player id")),
    request_body = QueueRequest,
    responses(
        (status = 200, description = "Queued or matched", body = JoinQueueResponse),
        (status = 400, description = "Unknown board size", body = crate::error::ErrorBody),
        (status = 409, description = "Player already in a game", body = crate::error::ErrorBody),
        (status = 503, description = "Storage unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn join_queue(
    State(state): State<SharedState>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(payload): Json<QueueRequest>,
) -> Result<Json<JoinQueueResponse>, AppError> {
    payload.validate()?;
    let response = matchmaking_service::join(&state, player_id, payload.board_size).await?;
    Ok(Json(response))
}

/// Withdraw the caller from a board size queue.
#[utoipa::path(
    post,
    path = "/matchmaking/queue/cancel",
    tag = "matchmaking",
    params(("x-player-id" = u64, Header, description = "Verified player id")),
    request_body = QueueRequest,
    responses(
        (status = 204, description = "Entry withdrawn or already gone"),
        (status = 400, description = "Unknown board size", body = crate::error::ErrorBody)
    )
)]
pub async fn cancel_queue(
    State(state): State<SharedState>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(payload): Json<QueueRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    matchmaking_service::cancel(&state, player_id, payload.board_size).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Waiting depth and estimated wait per board size.
#[utoipa::path(
    get,
    path = "/matchmaking/queue",
    tag = "matchmaking",
    responses(
        (status = 200, description = "Queue status", body = [QueueBucketStatus])
    )
)]
pub async fn queue_status(State(state): State<SharedState>) -> Json<Vec<QueueBucketStatus>> {
    Json(matchmaking_service::queue_status(&state).await)
}

/// Whether the caller is still waiting or already seated in a matched game.
#[utoipa::path(
    get,
    path = "/matchmaking/queue/me",
    tag = "matchmaking",
    params(("x-player-id" = u64, Header, description = "Verified player id")),
    responses(
        (status = 200, description = "Caller's queue status", body = PlayerQueueStatus),
        (status = 404, description = "Caller neither queued nor matched", body = crate::error::ErrorBody)
    )
)]
pub async fn my_queue_status(
    State(state): State<SharedState>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<PlayerQueueStatus>, AppError> {
    Ok(Json(matchmaking_service::player_status(&state, player_id).await?))
}

/// Start a game against a named player, skipping the queue.
#[utoipa::path(
    post,
    path = "/matchmaking/challenge/{player_id}",
    tag = "matchmaking",
    params(
        ("player_id" = u64, Path, description = "Challenged player"),
        ("x-player-id" = u64, Header, description = "Verified player id")
    ),
    request_body = ChallengeRequest,
    responses(
        (status = 200, description = "Game created", body = GameStateView),
        (status = 400, description = "Unknown board size or self-challenge", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown challenged player", body = crate::error::ErrorBody),
        (status = 409, description = "A player is already in a game", body = crate::error::ErrorBody),
        (status = 503, description = "Storage unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn challenge_player(
    State(state): State<SharedState>,
    PlayerIdentity(player_id): PlayerIdentity,
    Path(challenged): Path<PlayerId>,
    Json(payload): Json<ChallengeRequest>,
) -> Result<Json<GameStateView>, AppError> {
    payload.validate()?;
    let view = matchmaking_service::challenge(&state, player_id, challenged, payload.board_size).await?;
    Ok(Json(view))
}
