use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod game;
pub mod identity;
pub mod matchmaking;
pub mod websocket;

/// Compose the queue, game, socket and documentation routes over the shared state.
pub fn router(state: SharedState) -> Router<()> {
    matchmaking::router()
        .merge(game::router())
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}
