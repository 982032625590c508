use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::extract::ws::Message;
use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use tokio::{sync::mpsc, time::timeout};

use tbs_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, MemoryGameStore},
        models::{GameCommit, GameEntity, MoveEntity, PlayerEntity},
        storage::{StorageError, StorageResult},
    },
    error::{RejectionKind, ServiceError},
    services::{game_service, matchmaking_service},
    state::{
        AppState, SharedState,
        board::{Placement, Symbol},
        broadcaster::Connection,
        game::{GameId, PlayerId},
        matchmaking::QueueStatus,
        state_machine::GameStatus,
    },
};

/// Memory store whose commits can be made to fail on demand.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryGameStore,
    fail_commits: Arc<AtomicBool>,
}

impl GameStore for FlakyStore {
    fn find_player(&self, id: PlayerId) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.inner.find_player(id)
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_player(player)
    }

    fn find_game(&self, id: GameId) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        self.inner.find_game(id)
    }

    fn find_moves(&self, game_id: GameId) -> BoxFuture<'static, StorageResult<Vec<MoveEntity>>> {
        self.inner.find_moves(game_id)
    }

    fn commit(&self, commit: GameCommit) -> BoxFuture<'static, StorageResult<()>> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Box::pin(async { Err(StorageError::rejected("commit refused by test")) });
        }
        self.inner.commit(commit)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

async fn state_with(store: Arc<dyn GameStore>) -> SharedState {
    let state = AppState::new(AppConfig::default());
    state.install_game_store(store).await;
    state
}

fn channel() -> (Connection, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Connection::new(tx), rx)
}

async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
    let message = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("frame within deadline")
        .expect("connection still open");
    match message {
        Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    }
}

async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<Message>) {
    assert!(
        timeout(Duration::from_millis(150), rx.recv()).await.is_err(),
        "no frame expected"
    );
}

/// Queue two players on a 3x3 board and return the game with its X and O players.
async fn matched_game(state: &SharedState, a: PlayerId, b: PlayerId) -> (GameId, PlayerId, PlayerId) {
    matchmaking_service::join(state, a, 3).await.unwrap();
    let response = matchmaking_service::join(state, b, 3).await.unwrap();
    let game_id = response.game_id.expect("second join pairs both players");

    let view = game_service::get_state(state, game_id).await.unwrap();
    let other = view.player2_id.unwrap();
    if view.player1_symbol == Symbol::X {
        (game_id, view.player1_id, other)
    } else {
        (game_id, other, view.player1_id)
    }
}

fn place(row: i32, col: i32, symbol: Symbol) -> Placement {
    Placement { row, col, symbol }
}

#[tokio::test]
async fn matched_players_hear_about_it_and_x_takes_the_top_row() {
    let store = MemoryGameStore::new();
    let state = state_with(Arc::new(store.clone())).await;
    let (a_queue, mut a_rx) = channel();
    let (b_queue, mut b_rx) = channel();
    state.broadcaster().subscribe_queue(1, a_queue);
    state.broadcaster().subscribe_queue(2, b_queue);

    let waiting = matchmaking_service::join(&state, 1, 3).await.unwrap();
    assert_eq!(waiting.status, QueueStatus::Waiting);
    let matched = matchmaking_service::join(&state, 2, 3).await.unwrap();
    assert_eq!(matched.status, QueueStatus::Matched);
    assert_eq!(matched.opponent_id, Some(1));
    assert_eq!(matched.estimated_wait_time, 0);
    let game_id = matched.game_id.unwrap();

    for rx in [&mut a_rx, &mut b_rx] {
        let frame = next_frame(rx).await;
        assert_eq!(frame["type"], "match_formed");
        assert_eq!(frame["game_id"], game_id.to_string());
        assert_eq!(frame["board_size"], 3);
    }

    let view = game_service::get_state(&state, game_id).await.unwrap();
    let (x, o) = if view.player1_symbol == Symbol::X {
        (view.player1_id, view.player2_id.unwrap())
    } else {
        (view.player2_id.unwrap(), view.player1_id)
    };

    let (observer, mut observer_rx) = channel();
    game_service::subscribe(&state, game_id, observer).await.unwrap();
    let snapshot = next_frame(&mut observer_rx).await;
    assert_eq!(snapshot["type"], "snapshot");
    assert_eq!(snapshot["status"], "IN_PROGRESS");

    let script = [
        (x, 0, 0, Symbol::X),
        (o, 1, 0, Symbol::O),
        (x, 0, 1, Symbol::X),
        (o, 1, 1, Symbol::O),
        (x, 0, 2, Symbol::X),
    ];
    for (player, row, col, symbol) in script {
        game_service::create_move(&state, game_id, player, place(row, col, symbol))
            .await
            .unwrap();
    }

    for sequence in 1..=5u64 {
        let frame = next_frame(&mut observer_rx).await;
        assert_eq!(frame["type"], "move_applied");
        assert_eq!(frame["sequence"], sequence);
    }
    let finished = next_frame(&mut observer_rx).await;
    assert_eq!(finished["type"], "game_finished");
    assert_eq!(finished["winner_symbol"], "X");
    assert_eq!(finished["winner_id"], x);

    let view = game_service::get_state(&state, game_id).await.unwrap();
    assert_eq!(view.status, GameStatus::FinishedWin);
    assert_eq!(view.winner_id, Some(x));
    assert_eq!(view.turn, None);
    assert_eq!(state.sessions().active_game_of(x), None);
    assert_eq!(state.sessions().active_game_of(o), None);

    let winner = store.find_player(x).await.unwrap().unwrap();
    let loser = store.find_player(o).await.unwrap().unwrap();
    assert!(winner.score > 1200);
    assert!(loser.score < 1200);
    assert_eq!((winner.games_won, loser.games_won), (1, 0));
}

#[tokio::test]
async fn out_of_bounds_move_changes_nothing() {
    let state = state_with(Arc::new(MemoryGameStore::new())).await;
    let (game_id, x, _o) = matched_game(&state, 10, 11).await;

    let (observer, mut rx) = channel();
    game_service::subscribe(&state, game_id, observer).await.unwrap();
    assert_eq!(next_frame(&mut rx).await["type"], "snapshot");

    let err = game_service::create_move(&state, game_id, x, place(5, 0, Symbol::X))
        .await
        .unwrap_err();
    assert_eq!(err.rejection_kind(), Some(RejectionKind::OutOfBounds));
    assert_silent(&mut rx).await;

    let view = game_service::get_state(&state, game_id).await.unwrap();
    assert_eq!(view.status, GameStatus::InProgress);
    assert_eq!(view.version, 0);
    assert!(view.moves.is_empty());
    assert_eq!(view.turn, Some(Symbol::X));
}

#[tokio::test]
async fn failed_commit_publishes_nothing() {
    let store = FlakyStore::default();
    let state = state_with(Arc::new(store.clone())).await;
    let (game_id, x, _o) = matched_game(&state, 20, 21).await;

    let (observer, mut rx) = channel();
    game_service::subscribe(&state, game_id, observer).await.unwrap();
    assert_eq!(next_frame(&mut rx).await["type"], "snapshot");

    store.fail_commits.store(true, Ordering::SeqCst);
    let err = game_service::create_move(&state, game_id, x, place(1, 1, Symbol::X))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)));
    assert_silent(&mut rx).await;
    let view = game_service::get_state(&state, game_id).await.unwrap();
    assert_eq!(view.version, 0);
    assert!(view.board[1][1].is_none());

    store.fail_commits.store(false, Ordering::SeqCst);
    game_service::create_move(&state, game_id, x, place(1, 1, Symbol::X))
        .await
        .unwrap();
    let frame = next_frame(&mut rx).await;
    assert_eq!(frame["type"], "move_applied");
    assert_eq!(frame["sequence"], 1);
    assert_eq!(frame["version"], 1);
}

#[tokio::test]
async fn racing_moves_on_one_cell_commit_once() {
    let state = state_with(Arc::new(MemoryGameStore::new())).await;
    let (game_id, x, _o) = matched_game(&state, 30, 31).await;

    let (observer, mut rx) = channel();
    game_service::subscribe(&state, game_id, observer).await.unwrap();
    assert_eq!(next_frame(&mut rx).await["type"], "snapshot");

    let attempts = (0..4).map(|_| {
        let state = state.clone();
        tokio::spawn(async move {
            game_service::create_move(&state, game_id, x, place(2, 2, Symbol::X)).await
        })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(matches!(
            err.rejection_kind(),
            Some(RejectionKind::OutOfTurn | RejectionKind::CellOccupied)
        ));
    }

    assert_eq!(next_frame(&mut rx).await["type"], "move_applied");
    assert_silent(&mut rx).await;
    let view = game_service::get_state(&state, game_id).await.unwrap();
    assert_eq!(view.moves.len(), 1);
    assert_eq!(view.version, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_symbols_racing_for_the_centre_commit_once() {
    let state = state_with(Arc::new(MemoryGameStore::new())).await;

    for round in 0..8u64 {
        let (game_id, x, o) = matched_game(&state, 100 + 2 * round, 101 + 2 * round).await;
        let (observer, mut rx) = channel();
        game_service::subscribe(&state, game_id, observer).await.unwrap();
        assert_eq!(next_frame(&mut rx).await["type"], "snapshot");

        let attempts = [(x, Symbol::X), (o, Symbol::O)].map(|(player, symbol)| {
            let state = state.clone();
            tokio::spawn(async move {
                game_service::create_move(&state, game_id, player, place(1, 1, symbol)).await
            })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert!(results[0].is_ok(), "round {round}: X must win the cell");
        let refused = results[1].as_ref().unwrap_err();
        assert!(matches!(
            refused.rejection_kind(),
            Some(RejectionKind::OutOfTurn | RejectionKind::CellOccupied)
        ));

        let frame = next_frame(&mut rx).await;
        assert_eq!(frame["type"], "move_applied");
        assert_eq!(frame["symbol"], "X");
        assert_silent(&mut rx).await;
        let view = game_service::get_state(&state, game_id).await.unwrap();
        assert_eq!((view.moves.len(), view.version), (1, 1));
    }
}

#[tokio::test]
async fn sequence_and_turn_follow_the_move_log() {
    let state = state_with(Arc::new(MemoryGameStore::new())).await;
    let (game_id, x, o) = matched_game(&state, 40, 41).await;

    let out_of_turn = game_service::create_move(&state, game_id, o, place(0, 0, Symbol::O))
        .await
        .unwrap_err();
    assert_eq!(out_of_turn.rejection_kind(), Some(RejectionKind::OutOfTurn));

    let first = game_service::create_move(&state, game_id, x, place(0, 0, Symbol::X))
        .await
        .unwrap();
    assert_eq!(first.applied.sequence, 1);
    assert_eq!(first.next_turn, Some(Symbol::O));

    let occupied = game_service::create_move(&state, game_id, o, place(0, 0, Symbol::O))
        .await
        .unwrap_err();
    assert_eq!(occupied.rejection_kind(), Some(RejectionKind::CellOccupied));

    let stranger = game_service::create_move(&state, game_id, 99, place(2, 2, Symbol::O))
        .await
        .unwrap_err();
    assert_eq!(stranger.rejection_kind(), Some(RejectionKind::NotAPlayer));

    let second = game_service::create_move(&state, game_id, o, place(2, 2, Symbol::O))
        .await
        .unwrap();
    assert_eq!(second.applied.sequence, 2);
    assert_eq!(second.next_turn, Some(Symbol::X));

    let view = game_service::get_state(&state, game_id).await.unwrap();
    let sequences: Vec<_> = view.moves.iter().map(|entry| entry.sequence).collect();
    assert_eq!(sequences, vec![1, 2]);
    assert_eq!(view.version, 2);
}

#[tokio::test]
async fn joining_twice_keeps_one_entry() {
    let state = state_with(Arc::new(MemoryGameStore::new())).await;

    let first = matchmaking_service::join(&state, 50, 4).await.unwrap();
    let second = matchmaking_service::join(&state, 50, 4).await.unwrap();
    assert_eq!(first.status, QueueStatus::Waiting);
    assert_eq!(second.joined_at, first.joined_at);

    let status = matchmaking_service::queue_status(&state).await;
    let bucket = status.iter().find(|bucket| bucket.board_size == 4).unwrap();
    assert_eq!(bucket.waiting, 1);

    matchmaking_service::cancel(&state, 50, 4).await.unwrap();
    matchmaking_service::cancel(&state, 50, 4).await.unwrap();
    let status = matchmaking_service::queue_status(&state).await;
    assert_eq!(status.iter().find(|bucket| bucket.board_size == 4).unwrap().waiting, 0);
}

#[tokio::test]
async fn seated_players_cannot_queue_again() {
    let state = state_with(Arc::new(MemoryGameStore::new())).await;
    let (game_id, x, _o) = matched_game(&state, 60, 61).await;

    let err = matchmaking_service::join(&state, x, 3).await.unwrap_err();
    assert_eq!(err.rejection_kind(), Some(RejectionKind::PlayerBusy));

    game_service::surrender(&state, game_id, x).await.unwrap();
    let response = matchmaking_service::join(&state, x, 3).await.unwrap();
    assert_eq!(response.status, QueueStatus::Waiting);
}
