use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the game backend.
#[openapi(
    paths(
        crate::routes::matchmaking::join_queue,
        crate::routes::matchmaking::cancel_queue,
        crate::routes::matchmaking::queue_status,
        crate::routes::matchmaking::my_queue_status,
        crate::routes::matchmaking::challenge_player,
        crate::routes::game::create_bot_game,
        crate::routes::game::get_game,
        crate::routes::game::submit_move,
        crate::routes::game::bot_move,
        crate::routes::game::surrender,
        crate::routes::websocket::game_ws_handler,
        crate::routes::websocket::queue_ws_handler,
    ),
    components(
        schemas(
            crate::dto::matchmaking::QueueRequest,
            crate::dto::matchmaking::JoinQueueResponse,
            crate::dto::matchmaking::QueueBucketStatus,
            crate::dto::matchmaking::QueueEntryStatus,
            crate::dto::matchmaking::PlayerQueueStatus,
            crate::dto::matchmaking::ChallengeRequest,
            crate::dto::game::SubmitMoveRequest,
            crate::dto::game::CreateBotGameRequest,
            crate::dto::game::GameStateView,
            crate::dto::game::MoveView,
            crate::dto::game::MoveOutcome,
            crate::dto::ws::ClientMessage,
            crate::dto::events::MatchFormedEvent,
            crate::dto::events::MoveAppliedEvent,
            crate::dto::events::TimerUpdateEvent,
            crate::dto::events::GameFinishedEvent,
            crate::dto::events::MoveRejectedMessage,
            crate::dto::events::ErrorMessage,
            crate::error::ErrorBody,
            crate::error::RejectionKind,
        )
    ),
    tags(
        (name = "matchmaking", description = "Queue operations"),
        (name = "game", description = "Game play and state"),
        (name = "websocket", description = "Live game and queue notifications"),
    )
)]
pub struct ApiDoc;
