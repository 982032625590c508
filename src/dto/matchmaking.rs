use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_board_size},
    state::{
        game::PlayerId,
        matchmaking::{QueueEntry, QueueStatus},
    },
};

/// Board size a queue operation applies to.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct QueueRequest {
    /// Grid dimension.
    #[validate(custom(function = "validate_board_size"))]
    pub board_size: usize,
}

/// Board size of a direct challenge.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct ChallengeRequest {
    /// Grid dimension.
    #[validate(custom(function = "validate_board_size"))]
    pub board_size: usize,
}

/// State of the caller's queue entry after joining.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JoinQueueResponse {
    /// `WAITING` while queued, `MATCHED` when the join paired immediately.
    pub status: QueueStatus,
    /// Requested grid dimension.
    pub board_size: usize,
    /// Advisory wait in seconds; zero once matched.
    pub estimated_wait_time: u64,
    /// RFC 3339 join time.
    pub joined_at: String,
    /// Game created for the match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<Uuid>,
    /// Opponent of the match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_id: Option<PlayerId>,
}

impl JoinQueueResponse {
    /// Build the response for `entry` with an advisory wait in seconds.
    pub fn new(entry: &QueueEntry, estimated_wait_secs: u64) -> Self {
        let matched = entry.match_ref;
        Self {
            status: entry.status,
            board_size: entry.board_size,
            estimated_wait_time: if matched.is_some() { 0 } else { estimated_wait_secs },
            joined_at: format_system_time(entry.joined_at_wall),
            game_id: matched.map(|m| m.game_id),
            opponent_id: matched.map(|m| m.opponent_id),
        }
    }
}

/// Depth and estimate of one bucket.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueBucketStatus {
    /// Grid dimension.
    pub board_size: usize,
    /// Players currently waiting.
    pub waiting: usize,
    /// Advisory wait in seconds for a newcomer.
    pub estimated_wait_time: u64,
}

/// One bucket the caller waits in.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueEntryStatus {
    /// Grid dimension.
    pub board_size: usize,
    /// RFC 3339 join time.
    pub joined_at: String,
    /// Advisory wait in seconds.
    pub estimated_wait_time: u64,
}

/// Where the caller stands: waiting in one or more buckets, or seated in a matched game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerQueueStatus {
    /// Caller.
    pub player_id: PlayerId,
    /// `WAITING` or `MATCHED`.
    pub status: QueueStatus,
    /// Game the caller is seated in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<Uuid>,
    /// Opponent in that game.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_id: Option<PlayerId>,
    /// Grid dimension of that game.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_size: Option<usize>,
    /// Buckets the caller waits in, empty once matched.
    pub entries: Vec<QueueEntryStatus>,
}

impl PlayerQueueStatus {
    /// Caller seated in `game_id` against `opponent_id`.
    pub fn matched(player_id: PlayerId, game_id: Uuid, opponent_id: Option<PlayerId>, board_size: usize) -> Self {
        Self {
            player_id,
            status: QueueStatus::Matched,
            game_id: Some(game_id),
            opponent_id,
            board_size: Some(board_size),
            entries: Vec::new(),
        }
    }

    /// Caller still waiting in `entries`.
    pub fn waiting(player_id: PlayerId, entries: Vec<QueueEntryStatus>) -> Self {
        Self {
            player_id,
            status: QueueStatus::Waiting,
            game_id: None,
            opponent_id: None,
            board_size: None,
            entries,
        }
    }
}

impl QueueEntryStatus {
    /// Status of `entry` with an advisory wait in seconds.
    pub fn new(entry: &QueueEntry, estimated_wait_secs: u64) -> Self {
        Self {
            board_size: entry.board_size,
            joined_at: format_system_time(entry.joined_at_wall),
            estimated_wait_time: estimated_wait_secs,
        }
    }
}
