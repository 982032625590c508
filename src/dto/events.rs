use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::game::GameStateView,
    error::RejectionKind,
    services::event_bridge::DomainEvent,
    state::{board::Symbol, game::PlayerId, state_machine::GameStatus},
};

/// Pairing notification pushed to both matched players.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MatchFormedEvent {
    /// Newly created game.
    pub game_id: Uuid,
    /// Player holding `X`, who moves first.
    pub player1_id: PlayerId,
    /// Player holding `O`.
    pub player2_id: PlayerId,
    /// Grid dimension.
    pub board_size: usize,
}

/// Committed move pushed to every game subscriber.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MoveAppliedEvent {
    /// Game the move belongs to.
    pub game_id: Uuid,
    /// Move identifier.
    pub move_id: Uuid,
    /// Position in the move log.
    pub sequence: u32,
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
    /// Symbol placed.
    pub symbol: Symbol,
    /// Author, absent for bot moves.
    pub author_id: Option<PlayerId>,
    /// Symbol to move next, absent once the game is over.
    pub next_turn: Option<Symbol>,
    /// Board after the move.
    pub board: Vec<Vec<Option<Symbol>>>,
    /// Game version after the move.
    pub version: u64,
}

/// Terminal status pushed to every game subscriber.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameFinishedEvent {
    /// Finished game.
    pub game_id: Uuid,
    /// Terminal status.
    pub status: GameStatus,
    /// Winning player, if a human won.
    pub winner_id: Option<PlayerId>,
    /// Winning symbol, if anyone won.
    pub winner_symbol: Option<Symbol>,
    /// Game version after the change.
    pub version: u64,
}

/// Countdown pushed to game subscribers while a matched game waits for a move.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimerUpdateEvent {
    /// Game being timed.
    pub game_id: Uuid,
    /// Whole seconds left before the player on turn forfeits.
    pub remaining_seconds: u64,
    /// Symbol on turn.
    pub current_player_symbol: Symbol,
}

/// Refusal of a move sent over the socket. Only the sender receives it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MoveRejectedMessage {
    /// Reason category, absent for storage failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RejectionKind>,
    /// Human-readable detail.
    pub message: String,
}

/// Generic protocol error.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorMessage {
    /// Human-readable detail.
    pub message: String,
}

/// Every frame the server pushes over game and queue sockets.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current state, sent once on connect.
    Snapshot(GameStateView),
    /// The player's queue entry was paired.
    MatchFormed(MatchFormedEvent),
    /// A move was committed.
    MoveApplied(MoveAppliedEvent),
    /// The game reached a terminal status.
    GameFinished(GameFinishedEvent),
    /// Time left for the player on turn.
    TimerUpdate(TimerUpdateEvent),
    /// The sender's move was refused.
    MoveRejected(MoveRejectedMessage),
    /// Reply to a client `ping`.
    Pong,
    /// Malformed or unsupported frame.
    Error(ErrorMessage),
}

impl ServerMessage {
    /// Build an error frame.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            message: message.into(),
        })
    }
}

impl From<&DomainEvent> for ServerMessage {
    fn from(event: &DomainEvent) -> Self {
        match event {
            DomainEvent::MatchFormed {
                game_id,
                player1_id,
                player2_id,
                board_size,
            } => ServerMessage::MatchFormed(MatchFormedEvent {
                game_id: *game_id,
                player1_id: *player1_id,
                player2_id: *player2_id,
                board_size: *board_size,
            }),
            DomainEvent::MoveApplied {
                game_id,
                version,
                record,
                next_turn,
                board,
            } => ServerMessage::MoveApplied(MoveAppliedEvent {
                game_id: *game_id,
                move_id: record.id,
                sequence: record.sequence,
                row: record.row,
                col: record.col,
                symbol: record.symbol,
                author_id: record.author_id,
                next_turn: *next_turn,
                board: board.clone(),
                version: *version,
            }),
            DomainEvent::GameFinished {
                game_id,
                version,
                status,
                winner_id,
                winner_symbol,
            } => ServerMessage::GameFinished(GameFinishedEvent {
                game_id: *game_id,
                status: *status,
                winner_id: *winner_id,
                winner_symbol: *winner_symbol,
                version: *version,
            }),
            DomainEvent::TurnTimer {
                game_id,
                remaining_seconds,
                turn,
                ..
            } => ServerMessage::TimerUpdate(TimerUpdateEvent {
                game_id: *game_id,
                remaining_seconds: *remaining_seconds,
                current_player_symbol: *turn,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_carry_a_type_tag() {
        let event = DomainEvent::GameFinished {
            game_id: Uuid::nil(),
            version: 4,
            status: GameStatus::FinishedWin,
            winner_id: Some(3),
            winner_symbol: Some(Symbol::X),
        };
        let value = serde_json::to_value(ServerMessage::from(&event)).unwrap();
        assert_eq!(value["type"], "game_finished");
        assert_eq!(value["status"], "FINISHED_WIN");
        assert_eq!(value["winner_id"], 3);

        let timer = DomainEvent::TurnTimer {
            game_id: Uuid::nil(),
            version: 2,
            remaining_seconds: 41,
            turn: Symbol::O,
        };
        let value = serde_json::to_value(ServerMessage::from(&timer)).unwrap();
        assert_eq!(value["type"], "timer_update");
        assert_eq!(value["remaining_seconds"], 41);
        assert_eq!(value["current_player_symbol"], "O");

        let pong = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(pong, serde_json::json!({ "type": "pong" }));
    }
}
