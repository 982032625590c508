use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::game::{CreateBotGameRequest, GameStateView, MoveOutcome, SubmitMoveRequest},
    error::AppError,
    routes::identity::PlayerIdentity,
    services::game_service,
    state::SharedState,
};

/// Routes for playing and reading games.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/bot", post(create_bot_game))
        .route("/games/{id}", get(get_game))
        .route("/games/{id}/moves", post(submit_move))
        .route("/games/{id}/bot-move", post(bot_move))
        .route("/games/{id}/surrender", post(surrender))
}

/// Start a practice game against the bot.
#[utoipa::path(
    post,
    path = "/games/bot",
    tag = "game",
    params(("x-player-id" = u64, Header, description = "Verified player id")),
    request_body = CreateBotGameRequest,
    responses(
        (status = 200, description = "Practice game created", body = GameStateView),
        (status = 400, description = "Unknown board size", body = crate::error::ErrorBody),
        (status = 409, description = "Player already in a game", body = crate::error::ErrorBody),
        (status = 503, description = "Storage unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn create_bot_game(
    State(state): State<SharedState>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(payload): Json<CreateBotGameRequest>,
) -> Result<Json<GameStateView>, AppError> {
    payload.validate()?;
    let view = game_service::create_bot_game(
        &state,
        player_id,
        payload.board_size,
        payload.difficulty,
        payload.symbol,
    )
    .await?;
    Ok(Json(view))
}

/// Read a game's board, status, turn and move log.
#[utoipa::path(
    get,
    path = "/games/{id}",
    tag = "game",
    params(("id" = Uuid, Path, description = "Game identifier")),
    responses(
        (status = 200, description = "Current game state", body = GameStateView),
        (status = 404, description = "Unknown game", body = crate::error::ErrorBody)
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GameStateView>, AppError> {
    Ok(Json(game_service::get_state(&state, id).await?))
}

/// Submit a move as the calling player.
#[utoipa::path(
    post,
    path = "/games/{id}/moves",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-player-id" = u64, Header, description = "Verified player id")
    ),
    request_body = SubmitMoveRequest,
    responses(
        (status = 200, description = "Move committed", body = MoveOutcome),
        (status = 400, description = "Malformed or out-of-bounds coordinates", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not a player of this game", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown game", body = crate::error::ErrorBody),
        (status = 409, description = "Move conflicts with the game state", body = crate::error::ErrorBody),
        (status = 503, description = "Storage unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn submit_move(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    PlayerIdentity(player_id): PlayerIdentity,
    Json(payload): Json<SubmitMoveRequest>,
) -> Result<Json<MoveOutcome>, AppError> {
    payload.validate()?;
    let outcome = game_service::create_move(&state, id, player_id, payload.into()).await?;
    Ok(Json(outcome))
}

/// Let the bot play its turn in the caller's practice game.
#[utoipa::path(
    post,
    path = "/games/{id}/bot-move",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-player-id" = u64, Header, description = "Verified player id")
    ),
    responses(
        (status = 200, description = "Bot move committed", body = MoveOutcome),
        (status = 409, description = "Not the bot's turn or not a practice game", body = crate::error::ErrorBody)
    )
)]
pub async fn bot_move(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<MoveOutcome>, AppError> {
    Ok(Json(game_service::create_bot_move(&state, id, player_id).await?))
}

/// Concede the game.
#[utoipa::path(
    post,
    path = "/games/{id}/surrender",
    tag = "game",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("x-player-id" = u64, Header, description = "Verified player id")
    ),
    responses(
        (status = 200, description = "Game finished", body = GameStateView),
        (status = 409, description = "Game already finished", body = crate::error::ErrorBody)
    )
)]
pub async fn surrender(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    PlayerIdentity(player_id): PlayerIdentity,
) -> Result<Json<GameStateView>, AppError> {
    Ok(Json(game_service::surrender(&state, id, player_id).await?))
}
