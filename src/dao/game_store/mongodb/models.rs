use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::{
    dao::models::{GameEntity, GameKindEntity, MoveEntity, PlayerEntity},
    state::{board::Symbol, state_machine::GameStatus},
};

/// Stored game header. Identifiers are kept as strings, player ids as signed integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    id: String,
    board_size: i32,
    kind: GameKindEntity,
    player1_id: i64,
    player2_id: Option<i64>,
    player1_symbol: Symbol,
    turn: Symbol,
    status: GameStatus,
    winner_id: Option<i64>,
    winner_symbol: Option<Symbol>,
    version: i64,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            board_size: value.board_size as i32,
            kind: value.kind,
            player1_id: value.player1_id as i64,
            player2_id: value.player2_id.map(|id| id as i64),
            player1_symbol: value.player1_symbol,
            turn: value.turn,
            status: value.status,
            winner_id: value.winner_id.map(|id| id as i64),
            winner_symbol: value.winner_symbol,
            version: value.version as i64,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoGameDocument> for GameEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoGameDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&value.id)?,
            board_size: value.board_size as usize,
            kind: value.kind,
            player1_id: value.player1_id as u64,
            player2_id: value.player2_id.map(|id| id as u64),
            player1_symbol: value.player1_symbol,
            turn: value.turn,
            status: value.status,
            winner_id: value.winner_id.map(|id| id as u64),
            winner_symbol: value.winner_symbol,
            version: value.version as u64,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

/// Stored move log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMoveDocument {
    #[serde(rename = "_id")]
    id: String,
    game_id: String,
    sequence: i32,
    row: i32,
    col: i32,
    symbol: Symbol,
    author_id: Option<i64>,
    created_at: DateTime,
}

impl From<MoveEntity> for MongoMoveDocument {
    fn from(value: MoveEntity) -> Self {
        Self {
            id: value.id.to_string(),
            game_id: value.game_id.to_string(),
            sequence: value.sequence as i32,
            row: value.row as i32,
            col: value.col as i32,
            symbol: value.symbol,
            author_id: value.author_id.map(|id| id as i64),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl TryFrom<MongoMoveDocument> for MoveEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoMoveDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&value.id)?,
            game_id: parse_uuid(&value.game_id)?,
            sequence: value.sequence as u32,
            row: value.row as usize,
            col: value.col as usize,
            symbol: value.symbol,
            author_id: value.author_id.map(|id| id as u64),
            created_at: value.created_at.to_system_time(),
        })
    }
}

/// Stored player record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: i64,
    username: Option<String>,
    score: i32,
    games_played: i64,
    games_won: i64,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id as i64,
            username: value.username,
            score: value.score,
            games_played: i64::from(value.games_played),
            games_won: i64::from(value.games_won),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: value.id as u64,
            username: value.username,
            score: value.score,
            games_played: value.games_played.max(0) as u32,
            games_won: value.games_won.max(0) as u32,
        }
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(raw).map_err(|err| MongoDaoError::Malformed {
        id: raw.to_owned(),
        reason: err.to_string(),
    })
}

/// Filter matching a document by its string identifier.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching a player document.
pub fn player_id(id: u64) -> Document {
    doc! {"_id": id as i64}
}
