use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::state::board::Symbol;

/// Lifecycle status of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Session exists but play has not begun.
    Waiting,
    /// Moves are being accepted.
    InProgress,
    /// A player completed a line, surrendered, or the opponent timed out.
    FinishedWin,
    /// The board filled up with no line.
    FinishedDraw,
    /// Nobody ever moved before the session expired.
    Abandoned,
}

impl GameStatus {
    /// Whether the session accepts no further changes.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GameStatus::FinishedWin | GameStatus::FinishedDraw | GameStatus::Abandoned
        )
    }
}

/// Events that drive the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Both seats are filled; play begins.
    Start,
    /// A move was applied and play goes on.
    MovePlayed,
    /// A move completed a line for `symbol`.
    LineCompleted(Symbol),
    /// A move filled the board without a line.
    BoardFilled,
    /// The holder of `loser` gave up or ran out of time.
    Forfeit {
        /// Symbol of the forfeiting side.
        loser: Symbol,
    },
    /// The session expired before any move.
    Abandon,
}

/// Error returned when an event does not apply to the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Status the session was in.
    pub from: GameStatus,
    /// Offending event.
    pub event: GameEvent,
}

/// Compute the status reached by applying `event` to `from`.
pub fn transition(from: GameStatus, event: GameEvent) -> Result<GameStatus, InvalidTransition> {
    use GameEvent::*;
    use GameStatus::*;

    let next = match (from, event) {
        (Waiting, Start) => InProgress,
        (Waiting, Abandon) => Abandoned,
        (InProgress, MovePlayed) => InProgress,
        (InProgress, LineCompleted(_)) => FinishedWin,
        (InProgress, BoardFilled) => FinishedDraw,
        (InProgress, Forfeit { .. }) => FinishedWin,
        (InProgress, Abandon) => Abandoned,
        _ => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}
