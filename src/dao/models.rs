use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::state::{
    board::{self, Placement, Symbol},
    game::{BotDifficulty, GameId, GameKind, GameSession, MoveRecord, PlayerId},
    state_machine::GameStatus,
};

/// Persisted player profile and standing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Identity supplied by the identity layer.
    pub id: PlayerId,
    /// Display name, absent for guests.
    pub username: Option<String>,
    /// Skill score.
    pub score: i32,
    /// Finished games counted for this player.
    pub games_played: u32,
    /// Finished games won by this player.
    pub games_won: u32,
}

impl PlayerEntity {
    /// Fresh guest record seeded with `score`.
    pub fn guest(id: PlayerId, score: i32) -> Self {
        Self {
            id,
            username: None,
            score,
            games_played: 0,
            games_won: 0,
        }
    }
}

/// Persisted seat kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameKindEntity {
    /// Two humans.
    Pvp,
    /// Human against the bot.
    VsBot {
        /// Bot strength.
        difficulty: BotDifficulty,
    },
}

impl From<GameKind> for GameKindEntity {
    fn from(value: GameKind) -> Self {
        match value {
            GameKind::Pvp => GameKindEntity::Pvp,
            GameKind::VsBot(difficulty) => GameKindEntity::VsBot { difficulty },
        }
    }
}

impl From<GameKindEntity> for GameKind {
    fn from(value: GameKindEntity) -> Self {
        match value {
            GameKindEntity::Pvp => GameKind::Pvp,
            GameKindEntity::VsBot { difficulty } => GameKind::VsBot(difficulty),
        }
    }
}

/// Persisted game header. The board is rebuilt from the move log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntity {
    /// Game identifier.
    pub id: GameId,
    /// Declared board size.
    pub board_size: usize,
    /// Seat kind.
    pub kind: GameKindEntity,
    /// First seat.
    pub player1_id: PlayerId,
    /// Second seat, absent for practice games.
    pub player2_id: Option<PlayerId>,
    /// Symbol of the first seat.
    pub player1_symbol: Symbol,
    /// Symbol expected to move next.
    pub turn: Symbol,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Winning player.
    pub winner_id: Option<PlayerId>,
    /// Winning symbol.
    pub winner_symbol: Option<Symbol>,
    /// Committed change counter.
    pub version: u64,
    /// Creation time.
    pub created_at: SystemTime,
    /// Last change time.
    pub updated_at: SystemTime,
}

impl From<&GameSession> for GameEntity {
    fn from(value: &GameSession) -> Self {
        Self {
            id: value.id,
            board_size: value.board_size(),
            kind: value.kind.into(),
            player1_id: value.player1_id,
            player2_id: value.player2_id,
            player1_symbol: value.player1_symbol,
            turn: value.turn,
            status: value.status,
            winner_id: value.winner_id,
            winner_symbol: value.winner_symbol,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Persisted move log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEntity {
    /// Move identifier.
    pub id: Uuid,
    /// Owning game.
    pub game_id: GameId,
    /// Position in the game's log, starting at 1.
    pub sequence: u32,
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
    /// Symbol placed.
    pub symbol: Symbol,
    /// Author, absent for bot moves.
    pub author_id: Option<PlayerId>,
    /// Commit time.
    pub created_at: SystemTime,
}

impl MoveEntity {
    /// Build the persisted form of `record` for `game_id`.
    pub fn from_record(game_id: GameId, record: &MoveRecord) -> Self {
        Self {
            id: record.id,
            game_id,
            sequence: record.sequence,
            row: record.row,
            col: record.col,
            symbol: record.symbol,
            author_id: record.author_id,
            created_at: record.created_at,
        }
    }
}

impl From<MoveEntity> for MoveRecord {
    fn from(value: MoveEntity) -> Self {
        Self {
            id: value.id,
            sequence: value.sequence,
            row: value.row,
            col: value.col,
            symbol: value.symbol,
            author_id: value.author_id,
            created_at: value.created_at,
        }
    }
}

/// One durable unit of work: the game header, at most one new move, and affected players.
#[derive(Debug, Clone)]
pub struct GameCommit {
    /// Header to upsert.
    pub game: GameEntity,
    /// Move to append, if the change placed a symbol.
    pub new_move: Option<MoveEntity>,
    /// Player records to upsert (ranking changes).
    pub players: Vec<PlayerEntity>,
}

/// Raised when a persisted game cannot be replayed into a consistent session.
#[derive(Debug, Error)]
#[error("game `{game_id}` cannot be restored: {reason}")]
pub struct RestoreError {
    /// Offending game.
    pub game_id: GameId,
    /// What went wrong.
    pub reason: String,
}

impl GameEntity {
    /// Rebuild the in-memory session by replaying `moves` in sequence order.
    pub fn restore(self, mut moves: Vec<MoveEntity>) -> Result<GameSession, RestoreError> {
        let game_id = self.id;
        let fail = |reason: String| RestoreError { game_id, reason };

        moves.sort_by_key(|entry| entry.sequence);
        let mut board = board::Board::new(self.board_size);
        let mut turn = Symbol::X;
        let mut log = Vec::with_capacity(moves.len());

        for (index, entry) in moves.into_iter().enumerate() {
            if entry.sequence as usize != index + 1 {
                return Err(fail(format!(
                    "move log has a gap at sequence {}",
                    entry.sequence
                )));
            }
            let placement = Placement {
                row: entry.row as i32,
                col: entry.col as i32,
                symbol: entry.symbol,
            };
            board = board::apply(&board, placement, turn)
                .map_err(|err| fail(format!("move {} does not replay: {err}", entry.sequence)))?
                .0;
            turn = turn.opponent();
            log.push(MoveRecord::from(entry));
        }

        if turn != self.turn {
            return Err(fail("stored turn does not match move log".into()));
        }

        Ok(GameSession {
            id: self.id,
            kind: self.kind.into(),
            player1_id: self.player1_id,
            player2_id: self.player2_id,
            player1_symbol: self.player1_symbol,
            board,
            turn,
            status: self.status,
            winner_id: self.winner_id,
            winner_symbol: self.winner_symbol,
            moves: log,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_replays_the_move_log() {
        let now = SystemTime::now();
        let mut session = GameSession::new_match(Uuid::new_v4(), 3, 1, 2, now).unwrap();
        let mut moves = Vec::new();
        for (player, row, col, symbol) in [(1, 0, 0, Symbol::X), (2, 2, 2, Symbol::O)] {
            let planned = session
                .plan_move(Some(player), Placement { row, col, symbol }, now)
                .unwrap();
            moves.push(MoveEntity::from_record(session.id, &planned.record));
            session = planned.session;
        }

        moves.reverse();
        let restored = GameEntity::from(&session).restore(moves).unwrap();
        assert_eq!(restored.board, session.board);
        assert_eq!(restored.turn, Symbol::X);
        assert_eq!(restored.moves, session.moves);
        assert_eq!(restored.version, 2);
    }

    #[test]
    fn restore_rejects_gaps() {
        let now = SystemTime::now();
        let session = GameSession::new_match(Uuid::new_v4(), 3, 1, 2, now).unwrap();
        let entity = GameEntity::from(&session);
        let stray = MoveEntity {
            id: Uuid::new_v4(),
            game_id: session.id,
            sequence: 2,
            row: 0,
            col: 0,
            symbol: Symbol::X,
            author_id: Some(1),
            created_at: now,
        };
        assert!(entity.restore(vec![stray]).is_err());
    }
}
