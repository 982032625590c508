use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{routes::identity::PlayerIdentity, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws/games/{id}",
    tag = "websocket",
    params(
        ("id" = Uuid, Path, description = "Game to follow"),
        ("x-player-id" = Option<u64>, Header, description = "Verified player id; omit to observe")
    ),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade into a game socket streaming committed moves of one game.
pub async fn game_ws_handler(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    player: Option<PlayerIdentity>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let player_id = player.map(|PlayerIdentity(id)| id);
    ws.on_upgrade(move |socket| websocket_service::handle_game_socket(state, socket, id, player_id))
}

#[utoipa::path(
    get,
    path = "/ws/queue",
    tag = "websocket",
    params(("x-player-id" = u64, Header, description = "Verified player id")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Missing player identity", body = crate::error::ErrorBody)
    )
)]
/// Upgrade into a queue socket receiving the caller's match notifications.
pub async fn queue_ws_handler(
    State(state): State<SharedState>,
    PlayerIdentity(player_id): PlayerIdentity,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_queue_socket(state, socket, player_id))
}

/// Configure the WebSocket endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/ws/games/{id}", get(game_ws_handler))
        .route("/ws/queue", get(queue_ws_handler))
}
