pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;

use crate::dao::models::{GameCommit, GameEntity, MoveEntity, PlayerEntity};
use crate::dao::storage::StorageResult;
use crate::state::game::{GameId, PlayerId};

pub use memory::MemoryGameStore;

/// Abstraction over the persistence layer for games, their move logs and players.
///
/// `commit` is the durable unit of work: either every record in the [`GameCommit`] is stored,
/// or none is.
pub trait GameStore: Send + Sync {
    /// Load a player record.
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Upsert a player record outside of a game commit.
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a game header.
    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Load a game's move log in sequence order.
    fn find_moves(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<MoveEntity>>>;
    /// Atomically persist a game change.
    fn commit(&self, commit: GameCommit) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness check.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
