use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        validation::{validate_board_size, validate_coordinate},
    },
    state::{
        board::{Outcome, Placement, Symbol},
        game::{BotDifficulty, GameKind, GameSession, MoveRecord, PlayerId},
        state_machine::GameStatus,
    },
};

/// Move submitted by a player.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct SubmitMoveRequest {
    /// Zero-based row.
    #[validate(custom(function = "validate_coordinate"))]
    pub row: i32,
    /// Zero-based column.
    #[validate(custom(function = "validate_coordinate"))]
    pub col: i32,
    /// Symbol being placed; must be the submitter's own.
    pub symbol: Symbol,
}

impl From<SubmitMoveRequest> for Placement {
    fn from(value: SubmitMoveRequest) -> Self {
        Self {
            row: value.row,
            col: value.col,
            symbol: value.symbol,
        }
    }
}

/// Request to start a practice game against the bot.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateBotGameRequest {
    /// Grid dimension.
    #[validate(custom(function = "validate_board_size"))]
    pub board_size: usize,
    /// Bot strength.
    pub difficulty: BotDifficulty,
    /// Symbol the player wants; defaults to `X` (moving first).
    #[serde(default)]
    pub symbol: Option<Symbol>,
}

/// Seat kind exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameKindDto {
    /// Two humans.
    Pvp,
    /// Practice game.
    VsBot,
}

/// Move log entry as exposed to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MoveView {
    /// Move identifier.
    pub id: Uuid,
    /// Position in the log, starting at 1.
    pub sequence: u32,
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
    /// Symbol placed.
    pub symbol: Symbol,
    /// Author, absent for bot moves.
    pub author_id: Option<PlayerId>,
    /// RFC 3339 commit time.
    pub created_at: String,
}

impl From<&MoveRecord> for MoveView {
    fn from(value: &MoveRecord) -> Self {
        Self {
            id: value.id,
            sequence: value.sequence,
            row: value.row,
            col: value.col,
            symbol: value.symbol,
            author_id: value.author_id,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Full read view of a game.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameStateView {
    /// Game identifier.
    pub id: Uuid,
    /// Seat kind.
    pub kind: GameKindDto,
    /// Bot strength for practice games.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<BotDifficulty>,
    /// Grid dimension.
    pub board_size: usize,
    /// First seat.
    pub player1_id: PlayerId,
    /// Second seat, absent when the bot plays it.
    pub player2_id: Option<PlayerId>,
    /// Symbol of the first seat.
    pub player1_symbol: Symbol,
    /// Rows of cells, `null` for empty cells.
    pub board: Vec<Vec<Option<Symbol>>>,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Symbol to move, absent once the game is over.
    pub turn: Option<Symbol>,
    /// Winning player.
    pub winner_id: Option<PlayerId>,
    /// Winning symbol.
    pub winner_symbol: Option<Symbol>,
    /// Move log in sequence order.
    pub moves: Vec<MoveView>,
    /// Committed change counter; events with a higher version are newer than this view.
    pub version: u64,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 last change time.
    pub updated_at: String,
}

impl From<&GameSession> for GameStateView {
    fn from(value: &GameSession) -> Self {
        let (kind, difficulty) = match value.kind {
            GameKind::Pvp => (GameKindDto::Pvp, None),
            GameKind::VsBot(difficulty) => (GameKindDto::VsBot, Some(difficulty)),
        };
        Self {
            id: value.id,
            kind,
            difficulty,
            board_size: value.board_size(),
            player1_id: value.player1_id,
            player2_id: value.player2_id,
            player1_symbol: value.player1_symbol,
            board: value.board.rows(),
            status: value.status,
            turn: value.next_turn(),
            winner_id: value.winner_id,
            winner_symbol: value.winner_symbol,
            moves: value.moves.iter().map(MoveView::from).collect(),
            version: value.version,
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

/// Engine verdict for an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveResult {
    /// Play goes on.
    Continue,
    /// The move completed a line.
    Win,
    /// The move filled the board.
    Draw,
}

impl From<Outcome> for MoveResult {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Win(_) => MoveResult::Win,
            Outcome::Draw => MoveResult::Draw,
            Outcome::Continue => MoveResult::Continue,
        }
    }
}

/// Response to an accepted move.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MoveOutcome {
    /// Game identifier.
    pub game_id: Uuid,
    /// The committed move.
    #[serde(rename = "move")]
    pub applied: MoveView,
    /// Engine verdict.
    pub result: MoveResult,
    /// Status after the move.
    pub status: GameStatus,
    /// Symbol to move next, absent once the game is over.
    pub next_turn: Option<Symbol>,
    /// Winning player, if any.
    pub winner_id: Option<PlayerId>,
    /// Board after the move.
    pub board: Vec<Vec<Option<Symbol>>>,
    /// Version after the move.
    pub version: u64,
}

impl MoveOutcome {
    /// Build the response from the committed session and the move just appended.
    pub fn new(session: &GameSession, record: &MoveRecord, outcome: Outcome) -> Self {
        Self {
            game_id: session.id,
            applied: MoveView::from(record),
            result: outcome.into(),
            status: session.status,
            next_turn: session.next_turn(),
            winner_id: session.winner_id,
            board: session.board.rows(),
            version: session.version,
        }
    }
}
