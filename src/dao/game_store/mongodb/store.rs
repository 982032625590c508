use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel, bson::doc, options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, MongoMoveDocument, MongoPlayerDocument, doc_id, player_id},
};
use crate::{
    dao::{
        game_store::GameStore,
        models::{GameCommit, GameEntity, MoveEntity, PlayerEntity},
        storage::StorageResult,
    },
    state::game::{GameId, PlayerId},
};

const GAME_COLLECTION_NAME: &str = "games";
const MOVE_COLLECTION_NAME: &str = "moves";
const PLAYER_COLLECTION_NAME: &str = "players";

/// MongoDB-backed [`GameStore`]. Commits run inside a multi-document transaction, which
/// requires a replica set or sharded deployment.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();
        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let moves = self.moves().await;
        let sequence_index = IndexModel::builder()
            .keys(doc! {"game_id": 1, "sequence": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("move_sequence_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        moves
            .create_index(sequence_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: MOVE_COLLECTION_NAME,
                index: "game_id,sequence",
                source,
            })?;

        let games = self.games().await;
        let status_index = IndexModel::builder()
            .keys(doc! {"status": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_status_idx".to_owned()))
                    .build(),
            )
            .build();
        games
            .create_index(status_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "status",
                source,
            })?;

        Ok(())
    }

    async fn handles(&self) -> (Client, Database) {
        let guard = self.inner.state.read().await;
        (guard.client.clone(), guard.database.clone())
    }

    async fn games(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard.database.collection(GAME_COLLECTION_NAME)
    }

    async fn moves(&self) -> Collection<MongoMoveDocument> {
        let guard = self.inner.state.read().await;
        guard.database.collection(MOVE_COLLECTION_NAME)
    }

    async fn players(&self) -> Collection<MongoPlayerDocument> {
        let guard = self.inner.state.read().await;
        guard.database.collection(PLAYER_COLLECTION_NAME)
    }

    async fn find_player(&self, id: PlayerId) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .players()
            .await
            .find_one(player_id(id))
            .await
            .map_err(|source| MongoDaoError::Player { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn save_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let id = player.id;
        let document: MongoPlayerDocument = player.into();
        self.players()
            .await
            .replace_one(player_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Player { id, source })?;
        Ok(())
    }

    async fn find_game(&self, id: GameId) -> MongoResult<Option<GameEntity>> {
        let document = self
            .games()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadGame { id, source })?;
        document.map(GameEntity::try_from).transpose()
    }

    async fn find_moves(&self, game_id: GameId) -> MongoResult<Vec<MoveEntity>> {
        let documents: Vec<MongoMoveDocument> = self
            .moves()
            .await
            .find(doc! {"game_id": game_id.to_string()})
            .sort(doc! {"sequence": 1})
            .await
            .map_err(|source| MongoDaoError::LoadGame { id: game_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadGame { id: game_id, source })?;

        documents.into_iter().map(MoveEntity::try_from).collect()
    }

    async fn commit(&self, commit: GameCommit) -> MongoResult<()> {
        let id = commit.game.id;
        let (client, database) = self.handles().await;

        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Commit { id, source })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::Commit { id, source })?;

        match write_commit(&database, &mut session, commit).await {
            Ok(()) => session
                .commit_transaction()
                .await
                .map_err(|source| MongoDaoError::Commit { id, source }),
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!(game_id = %id, error = %abort_err, "failed to abort game commit");
                }
                Err(err)
            }
        }
    }
}

/// Write every record of `commit` inside the open transaction of `session`.
async fn write_commit(
    database: &Database,
    session: &mut ClientSession,
    commit: GameCommit,
) -> MongoResult<()> {
    let GameCommit {
        game,
        new_move,
        players,
    } = commit;
    let id: Uuid = game.id;
    let version = game.version;
    let games = database.collection::<MongoGameDocument>(GAME_COLLECTION_NAME);
    let document: MongoGameDocument = game.into();

    if version == 0 {
        games
            .insert_one(&document)
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::Commit { id, source })?;
    } else {
        let mut filter = doc_id(id);
        filter.insert("version", (version - 1) as i64);
        let result = games
            .replace_one(filter, &document)
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::Commit { id, source })?;
        if result.matched_count == 0 {
            return Err(MongoDaoError::StaleVersion {
                id,
                expected: version - 1,
            });
        }
    }

    if let Some(entry) = new_move {
        let document: MongoMoveDocument = entry.into();
        database
            .collection::<MongoMoveDocument>(MOVE_COLLECTION_NAME)
            .insert_one(&document)
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::Commit { id, source })?;
    }

    let player_collection = database.collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME);
    for player in players {
        let filter = player_id(player.id);
        let document: MongoPlayerDocument = player.into();
        player_collection
            .replace_one(filter, &document)
            .upsert(true)
            .session(&mut *session)
            .await
            .map_err(|source| MongoDaoError::Commit { id, source })?;
    }

    Ok(())
}

impl GameStore for MongoGameStore {
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(id).await.map_err(Into::into) })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_player(player).await.map_err(Into::into) })
    }

    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(id).await.map_err(Into::into) })
    }

    fn find_moves(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<MoveEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_moves(game_id).await.map_err(Into::into) })
    }

    fn commit(&self, commit: GameCommit) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit(commit).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
