use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::game::SubmitMoveRequest, state::board::Symbol};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from game WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Place a symbol.
    Move {
        /// Zero-based row.
        row: i32,
        /// Zero-based column.
        col: i32,
        /// Symbol being placed.
        symbol: Symbol,
    },
    /// Give up the game.
    Surrender,
    /// Application-level keepalive.
    Ping,
    /// Anything else.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame, validating move coordinates.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        let message: Self = serde_json::from_str(raw).map_err(|err| err.to_string())?;
        if let ClientMessage::Move { row, col, symbol } = &message {
            SubmitMoveRequest {
                row: *row,
                col: *col,
                symbol: *symbol,
            }
            .validate()
            .map_err(|err| err.to_string())?;
        }
        Ok(message)
    }
}
