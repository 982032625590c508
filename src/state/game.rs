use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    board::{self, Board, MoveRejection, Outcome, Placement, Symbol},
    state_machine::{self, GameEvent, GameStatus, InvalidTransition},
};

/// Numeric player identity supplied by the upstream identity layer.
pub type PlayerId = u64;
/// Identifier of a game session.
pub type GameId = Uuid;

/// Strength of the built-in opponent in practice games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotDifficulty {
    /// Random free cell.
    Easy,
    /// Wins or blocks when it can, random otherwise.
    Medium,
    /// Medium plus centre and corner preferences.
    Hard,
}

/// Who sits in the second seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    /// Two matched human players.
    Pvp,
    /// A human against the built-in bot.
    VsBot(BotDifficulty),
}

/// Immutable entry of a game's move log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    /// Unique move identifier.
    pub id: Uuid,
    /// Position in the game's log, starting at 1.
    pub sequence: u32,
    /// Row of the placed symbol.
    pub row: usize,
    /// Column of the placed symbol.
    pub col: usize,
    /// Symbol placed.
    pub symbol: Symbol,
    /// Author of the move, absent for bot moves.
    pub author_id: Option<PlayerId>,
    /// When the move was committed.
    pub created_at: SystemTime,
}

/// Errors raised while evaluating a change against a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// The board engine refused the placement.
    #[error(transparent)]
    Rejected(#[from] MoveRejection),
    /// The session is already in a terminal status.
    #[error("game already finished")]
    GameAlreadyFinished,
    /// The submitting player does not hold a seat in this session.
    #[error("player is not part of this game")]
    NotAPlayer,
    /// The submitted symbol belongs to the other seat.
    #[error("symbol {got:?} is not yours (you play {assigned:?})")]
    WrongSymbol {
        /// Symbol held by the submitting seat.
        assigned: Symbol,
        /// Symbol that was submitted.
        got: Symbol,
    },
    /// A bot move was requested on a session without a bot.
    #[error("game has no bot opponent")]
    NotAPracticeGame,
    /// Lifecycle table refused the change.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Next session state produced by a validated move, not yet committed.
#[derive(Debug, Clone)]
pub struct PlannedMove {
    /// Session as it will be once the move commits.
    pub session: GameSession,
    /// Move log entry to append.
    pub record: MoveRecord,
    /// Engine verdict for the move.
    pub outcome: Outcome,
}

/// Authoritative state of a single game.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Session identifier.
    pub id: GameId,
    /// Seat kind.
    pub kind: GameKind,
    /// First seat, always a human.
    pub player1_id: PlayerId,
    /// Second seat, absent when the bot plays it.
    pub player2_id: Option<PlayerId>,
    /// Symbol held by the first seat.
    pub player1_symbol: Symbol,
    /// Current grid.
    pub board: Board,
    /// Symbol expected to move next.
    pub turn: Symbol,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Winning player, absent for draws, abandons and bot wins.
    pub winner_id: Option<PlayerId>,
    /// Winning symbol when the game finished with a winner.
    pub winner_symbol: Option<Symbol>,
    /// Append-only move log.
    pub moves: Vec<MoveRecord>,
    /// Number of committed changes since creation.
    pub version: u64,
    /// Creation time.
    pub created_at: SystemTime,
    /// Time of the last committed change.
    pub updated_at: SystemTime,
}

impl GameSession {
    /// Start a matched game. `x_player` takes the first seat and opens.
    pub fn new_match(
        id: GameId,
        board_size: usize,
        x_player: PlayerId,
        o_player: PlayerId,
        now: SystemTime,
    ) -> Result<Self, GameError> {
        Self::started(
            id,
            GameKind::Pvp,
            board_size,
            x_player,
            Some(o_player),
            Symbol::X,
            now,
        )
    }

    /// Start a practice game against the bot.
    pub fn new_practice(
        id: GameId,
        board_size: usize,
        player_id: PlayerId,
        player_symbol: Symbol,
        difficulty: BotDifficulty,
        now: SystemTime,
    ) -> Result<Self, GameError> {
        Self::started(
            id,
            GameKind::VsBot(difficulty),
            board_size,
            player_id,
            None,
            player_symbol,
            now,
        )
    }

    fn started(
        id: GameId,
        kind: GameKind,
        board_size: usize,
        player1_id: PlayerId,
        player2_id: Option<PlayerId>,
        player1_symbol: Symbol,
        now: SystemTime,
    ) -> Result<Self, GameError> {
        Ok(Self {
            id,
            kind,
            player1_id,
            player2_id,
            player1_symbol,
            board: Board::new(board_size),
            turn: Symbol::X,
            status: state_machine::transition(GameStatus::Waiting, GameEvent::Start)?,
            winner_id: None,
            winner_symbol: None,
            moves: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Declared board size.
    pub fn board_size(&self) -> usize {
        self.board.size()
    }

    /// Human participants of the session.
    pub fn participants(&self) -> Vec<PlayerId> {
        std::iter::once(self.player1_id)
            .chain(self.player2_id)
            .collect()
    }

    /// Symbol held by `player`, if seated.
    pub fn symbol_of(&self, player: PlayerId) -> Option<Symbol> {
        if player == self.player1_id {
            Some(self.player1_symbol)
        } else if Some(player) == self.player2_id {
            Some(self.player1_symbol.opponent())
        } else {
            None
        }
    }

    /// Human holding `symbol`, `None` when the bot holds it.
    pub fn player_for(&self, symbol: Symbol) -> Option<PlayerId> {
        if symbol == self.player1_symbol {
            Some(self.player1_id)
        } else {
            self.player2_id
        }
    }

    /// Symbol played by the bot in practice games.
    pub fn bot_symbol(&self) -> Option<Symbol> {
        match self.kind {
            GameKind::VsBot(_) => Some(self.player1_symbol.opponent()),
            GameKind::Pvp => None,
        }
    }

    /// Turn to report to clients, absent once the game is over.
    pub fn next_turn(&self) -> Option<Symbol> {
        (!self.status.is_terminal()).then_some(self.turn)
    }

    /// Validate and stage a move authored by `author` (`None` for the bot).
    pub fn plan_move(
        &self,
        author: Option<PlayerId>,
        placement: Placement,
        now: SystemTime,
    ) -> Result<PlannedMove, GameError> {
        if self.status.is_terminal() {
            return Err(GameError::GameAlreadyFinished);
        }

        let assigned = match author {
            Some(player) => self.symbol_of(player).ok_or(GameError::NotAPlayer)?,
            None => self.bot_symbol().ok_or(GameError::NotAPracticeGame)?,
        };
        if assigned != placement.symbol {
            return Err(GameError::WrongSymbol {
                assigned,
                got: placement.symbol,
            });
        }

        let (board, outcome) = board::apply(&self.board, placement, self.turn)?;
        let event = match outcome {
            Outcome::Win(symbol) => GameEvent::LineCompleted(symbol),
            Outcome::Draw => GameEvent::BoardFilled,
            Outcome::Continue => GameEvent::MovePlayed,
        };
        let status = state_machine::transition(self.status, event)?;

        let record = MoveRecord {
            id: Uuid::new_v4(),
            sequence: self.moves.len() as u32 + 1,
            // Bounds were checked by the engine.
            row: placement.row as usize,
            col: placement.col as usize,
            symbol: placement.symbol,
            author_id: author,
            created_at: now,
        };

        let mut session = self.clone();
        session.board = board;
        session.turn = self.turn.opponent();
        session.status = status;
        if let Outcome::Win(symbol) = outcome {
            session.winner_symbol = Some(symbol);
            session.winner_id = self.player_for(symbol);
        }
        session.moves.push(record.clone());
        session.version += 1;
        session.updated_at = now;

        Ok(PlannedMove {
            session,
            record,
            outcome,
        })
    }

    /// Stage a move-less terminal change (forfeit or abandon).
    pub fn plan_finish(&self, event: GameEvent, now: SystemTime) -> Result<GameSession, GameError> {
        if self.status.is_terminal() {
            return Err(GameError::GameAlreadyFinished);
        }

        let status = state_machine::transition(self.status, event)?;
        let mut session = self.clone();
        session.status = status;
        if let GameEvent::Forfeit { loser } = event {
            let winner = loser.opponent();
            session.winner_symbol = Some(winner);
            session.winner_id = self.player_for(winner);
        }
        session.version += 1;
        session.updated_at = now;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> GameSession {
        GameSession::new_match(Uuid::new_v4(), 3, 1, 2, SystemTime::now()).unwrap()
    }

    fn place(row: i32, col: i32, symbol: Symbol) -> Placement {
        Placement { row, col, symbol }
    }

    #[test]
    fn sequence_and_turn_advance_with_each_move() {
        let mut game = session();
        let script = [(1, 0, 0, Symbol::X), (2, 1, 1, Symbol::O), (1, 2, 2, Symbol::X)];
        for (index, (player, row, col, symbol)) in script.into_iter().enumerate() {
            let planned = game
                .plan_move(Some(player), place(row, col, symbol), SystemTime::now())
                .unwrap();
            assert_eq!(planned.record.sequence, index as u32 + 1);
            assert_eq!(planned.session.turn, symbol.opponent());
            assert_eq!(planned.session.board.occupied(), planned.session.moves.len());
            game = planned.session;
        }
        assert_eq!(game.version, 3);
    }

    #[test]
    fn planning_does_not_touch_the_current_session() {
        let game = session();
        let _ = game
            .plan_move(Some(1), place(0, 0, Symbol::X), SystemTime::now())
            .unwrap();
        assert!(game.moves.is_empty());
        assert_eq!(game.version, 0);
    }

    #[test]
    fn outsiders_and_wrong_symbols_are_rejected() {
        let game = session();
        assert_eq!(
            game.plan_move(Some(99), place(0, 0, Symbol::X), SystemTime::now())
                .unwrap_err(),
            GameError::NotAPlayer
        );
        assert_eq!(
            game.plan_move(Some(2), place(0, 0, Symbol::X), SystemTime::now())
                .unwrap_err(),
            GameError::WrongSymbol {
                assigned: Symbol::O,
                got: Symbol::X
            }
        );
        assert_eq!(
            game.plan_move(None, place(0, 0, Symbol::X), SystemTime::now())
                .unwrap_err(),
            GameError::NotAPracticeGame
        );
    }

    #[test]
    fn forfeit_awards_the_opponent() {
        let game = session();
        let finished = game
            .plan_finish(GameEvent::Forfeit { loser: Symbol::X }, SystemTime::now())
            .unwrap();
        assert_eq!(finished.status, GameStatus::FinishedWin);
        assert_eq!(finished.winner_id, Some(2));
        assert_eq!(finished.next_turn(), None);
        assert_eq!(
            finished
                .plan_move(Some(2), place(0, 0, Symbol::O), SystemTime::now())
                .unwrap_err(),
            GameError::GameAlreadyFinished
        );
    }

    #[test]
    fn bot_win_has_symbol_but_no_winner_id() {
        let game = GameSession::new_practice(
            Uuid::new_v4(),
            3,
            7,
            Symbol::X,
            BotDifficulty::Easy,
            SystemTime::now(),
        )
        .unwrap();
        assert_eq!(game.bot_symbol(), Some(Symbol::O));
        assert_eq!(game.participants(), vec![7]);

        let finished = game
            .plan_finish(GameEvent::Forfeit { loser: Symbol::X }, SystemTime::now())
            .unwrap();
        assert_eq!(finished.winner_symbol, Some(Symbol::O));
        assert_eq!(finished.winner_id, None);
    }
}
