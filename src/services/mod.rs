/// Practice opponent move selection.
pub mod bot;
/// OpenAPI documentation generation.
pub mod documentation;
/// Post-commit event outbox and dispatcher.
pub mod event_bridge;
/// Moves, practice games, surrender and timeouts.
pub mod game_service;
/// Queue join, cancel and pairing passes.
pub mod matchmaking_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod websocket_service;
