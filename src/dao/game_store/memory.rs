use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;

use crate::{
    dao::{
        game_store::GameStore,
        models::{GameCommit, GameEntity, MoveEntity, PlayerEntity},
        storage::{StorageError, StorageResult},
    },
    state::game::{GameId, PlayerId},
};

/// Process-local [`GameStore`] used when no database is configured and in tests.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<Mutex<MemoryTables>>,
}

#[derive(Default)]
struct MemoryTables {
    games: HashMap<GameId, GameEntity>,
    moves: HashMap<GameId, Vec<MoveEntity>>,
    players: HashMap<PlayerId, PlayerEntity>,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(&self, f: impl FnOnce(&mut MemoryTables) -> StorageResult<T>) -> StorageResult<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StorageError::rejected("memory store lock poisoned"))?;
        f(&mut guard)
    }
}

impl MemoryTables {
    fn apply(&mut self, commit: GameCommit) -> StorageResult<()> {
        let GameCommit {
            game,
            new_move,
            players,
        } = commit;

        // Validate everything before touching any table.
        if let Some(stored) = self.games.get(&game.id) {
            if game.version <= stored.version {
                return Err(StorageError::rejected(format!(
                    "stale version {} for game `{}` (stored {})",
                    game.version, game.id, stored.version
                )));
            }
        }
        if let Some(entry) = &new_move {
            let expected = self.moves.get(&game.id).map_or(0, Vec::len) as u32 + 1;
            if entry.sequence != expected {
                return Err(StorageError::rejected(format!(
                    "move sequence {} for game `{}` (expected {expected})",
                    entry.sequence, game.id
                )));
            }
        }

        if let Some(entry) = new_move {
            self.moves.entry(game.id).or_default().push(entry);
        }
        for player in players {
            self.players.insert(player.id, player);
        }
        self.games.insert(game.id, game);
        Ok(())
    }
}

impl GameStore for MemoryGameStore {
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let result = self.with_tables(|tables| Ok(tables.players.get(&id).cloned()));
        Box::pin(async move { result })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.with_tables(|tables| {
            tables.players.insert(player.id, player);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let result = self.with_tables(|tables| Ok(tables.games.get(&id).cloned()));
        Box::pin(async move { result })
    }

    fn find_moves(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<MoveEntity>>> {
        let result =
            self.with_tables(|tables| Ok(tables.moves.get(&game_id).cloned().unwrap_or_default()));
        Box::pin(async move { result })
    }

    fn commit(&self, commit: GameCommit) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.with_tables(|tables| tables.apply(commit));
        Box::pin(async move { result })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::state::{
        board::{Placement, Symbol},
        game::GameSession,
    };

    #[tokio::test]
    async fn commit_is_all_or_nothing() {
        let store = MemoryGameStore::new();
        let now = SystemTime::now();
        let session = GameSession::new_match(Uuid::new_v4(), 3, 1, 2, now).unwrap();
        store
            .commit(GameCommit {
                game: GameEntity::from(&session),
                new_move: None,
                players: vec![],
            })
            .await
            .unwrap();

        let planned = session
            .plan_move(
                Some(1),
                Placement {
                    row: 0,
                    col: 0,
                    symbol: Symbol::X,
                },
                now,
            )
            .unwrap();
        let mut bad_move = MoveEntity::from_record(session.id, &planned.record);
        bad_move.sequence = 3;
        let err = store
            .commit(GameCommit {
                game: GameEntity::from(&planned.session),
                new_move: Some(bad_move),
                players: vec![PlayerEntity::guest(1, 1300)],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { .. }));

        assert!(store.find_player(1).await.unwrap().is_none());
        assert!(store.find_moves(session.id).await.unwrap().is_empty());
        assert_eq!(store.find_game(session.id).await.unwrap().unwrap().version, 0);
    }

    #[tokio::test]
    async fn stale_versions_are_rejected() {
        let store = MemoryGameStore::new();
        let session =
            GameSession::new_match(Uuid::new_v4(), 3, 1, 2, SystemTime::now()).unwrap();
        let commit = GameCommit {
            game: GameEntity::from(&session),
            new_move: None,
            players: vec![],
        };
        store.commit(commit.clone()).await.unwrap();
        assert!(store.commit(commit).await.is_err());
    }
}
