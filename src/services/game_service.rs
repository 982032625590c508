use std::time::{Duration, SystemTime};

use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        models::{GameCommit, GameEntity, MoveEntity, PlayerEntity},
        storage::StorageError,
    },
    dto::{
        events::ServerMessage,
        game::{GameStateView, MoveOutcome},
    },
    error::{RejectionKind, ServiceError},
    services::{
        bot,
        event_bridge::{DomainEvent, Outbox},
        websocket_service::send_message_to_websocket,
    },
    state::{
        SharedState,
        board::{Placement, Symbol},
        broadcaster::Connection,
        game::{BotDifficulty, GameError, GameId, GameKind, GameSession, PlannedMove, PlayerId},
        ranking,
        sessions::SessionHandle,
        state_machine::{GameEvent, GameStatus},
    },
};

/// Submit a human move on behalf of `player_id`.
pub async fn create_move(
    state: &SharedState,
    game_id: GameId,
    player_id: PlayerId,
    placement: Placement,
) -> Result<MoveOutcome, ServiceError> {
    let store = state.require_game_store().await?;
    let handle = session_handle(state, game_id).await?;
    let mut session = handle.lock().await;

    let planned = session
        .plan_move(Some(player_id), placement, SystemTime::now())
        .inspect_err(|err| debug!(game_id = %game_id, player_id, error = %err, "move rejected"))?;
    commit_move(state, store.as_ref(), &mut session, planned).await
}

/// Let the bot play its turn in a practice game owned by `requester`.
pub async fn create_bot_move(
    state: &SharedState,
    game_id: GameId,
    requester: PlayerId,
) -> Result<MoveOutcome, ServiceError> {
    let store = state.require_game_store().await?;
    let handle = session_handle(state, game_id).await?;
    let mut session = handle.lock().await;

    if session.status.is_terminal() {
        return Err(GameError::GameAlreadyFinished.into());
    }
    if session.symbol_of(requester).is_none() {
        return Err(GameError::NotAPlayer.into());
    }
    play_bot_turn(state, store.as_ref(), &mut session).await
}

/// Start a practice game for `player_id` against the bot.
///
/// When the player picks `O` the bot opens immediately.
pub async fn create_bot_game(
    state: &SharedState,
    player_id: PlayerId,
    board_size: usize,
    difficulty: BotDifficulty,
    symbol: Option<Symbol>,
) -> Result<GameStateView, ServiceError> {
    let config = state.config();
    if !config.supports_board_size(board_size) {
        return Err(ServiceError::InvalidInput(format!(
            "unknown board size {board_size}"
        )));
    }
    let store = state.require_game_store().await?;

    let game_id = Uuid::new_v4();
    let session = GameSession::new_practice(
        game_id,
        board_size,
        player_id,
        symbol.unwrap_or(Symbol::X),
        difficulty,
        SystemTime::now(),
    )?;

    state
        .sessions()
        .reserve(player_id, game_id)
        .map_err(|active| player_busy(player_id, active))?;

    let players = match load_player(store.as_ref(), player_id).await {
        Ok(None) => vec![PlayerEntity::guest(player_id, config.ranking.initial_score)],
        Ok(Some(_)) => Vec::new(),
        Err(err) => {
            state.sessions().release(player_id, game_id);
            return Err(err);
        }
    };
    let commit = GameCommit {
        game: GameEntity::from(&session),
        new_move: None,
        players,
    };
    if let Err(err) = store.commit(commit).await {
        state.sessions().release(player_id, game_id);
        return Err(err.into());
    }

    info!(game_id = %game_id, player_id, board_size, difficulty = ?difficulty, "practice game created");
    let handle = state.sessions().insert(session);
    let mut session = handle.lock().await;
    if session.bot_symbol() == Some(session.turn) {
        // The game exists either way; the owner can still request the bot move explicitly.
        if let Err(err) = play_bot_turn(state, store.as_ref(), &mut session).await {
            warn!(game_id = %game_id, error = %err, "bot opening move failed");
        }
    }
    Ok(GameStateView::from(&*session))
}

/// Concede the game; the opponent (or the bot) wins.
pub async fn surrender(
    state: &SharedState,
    game_id: GameId,
    player_id: PlayerId,
) -> Result<GameStateView, ServiceError> {
    let store = state.require_game_store().await?;
    let handle = session_handle(state, game_id).await?;
    let mut session = handle.lock().await;

    if session.status.is_terminal() {
        return Err(GameError::GameAlreadyFinished.into());
    }
    let loser = session.symbol_of(player_id).ok_or(GameError::NotAPlayer)?;
    let next = session.plan_finish(GameEvent::Forfeit { loser }, SystemTime::now())?;
    commit_finish(state, store.as_ref(), &mut session, next).await?;
    info!(game_id = %game_id, player_id, "player surrendered");
    Ok(GameStateView::from(&*session))
}

/// Current view of a game, loading it from storage when needed.
pub async fn get_state(state: &SharedState, game_id: GameId) -> Result<GameStateView, ServiceError> {
    let handle = session_handle(state, game_id).await?;
    let session = handle.lock().await;
    Ok(GameStateView::from(&*session))
}

/// Attach `connection` to a live game, sending it the snapshot it starts from.
///
/// The snapshot is queued on the connection and the subscription registered under the game
/// lock, so every later committed change reaches the connection exactly once and after it.
pub async fn subscribe(
    state: &SharedState,
    game_id: GameId,
    connection: Connection,
) -> Result<GameStateView, ServiceError> {
    let handle = session_handle(state, game_id).await?;
    let session = handle.lock().await;
    if session.status.is_terminal() {
        return Err(GameError::GameAlreadyFinished.into());
    }

    let view = GameStateView::from(&*session);
    if send_message_to_websocket(&connection.tx, &ServerMessage::Snapshot(view.clone())).is_err() {
        debug!(game_id = %game_id, connection_id = %connection.id, "connection closed before subscribing");
        return Ok(view);
    }
    state
        .broadcaster()
        .subscribe(game_id, connection, session.version);
    Ok(view)
}

/// Whether the game is a practice game whose bot is due to move.
pub async fn bot_to_move(state: &SharedState, game_id: GameId) -> bool {
    let Some(handle) = state.sessions().handle(game_id) else {
        return false;
    };
    let session = handle.lock().await;
    !session.status.is_terminal() && session.bot_symbol() == Some(session.turn)
}

/// Create and persist a matched game between two queued players.
///
/// Which player holds `X` is random. Both players must be free; their records are created as
/// guests when missing. No event is produced here: the caller owns the match outbox.
pub(crate) async fn open_match(
    state: &SharedState,
    store: &dyn GameStore,
    board_size: usize,
    first: PlayerId,
    second: PlayerId,
) -> Result<GameSession, ServiceError> {
    let game_id = Uuid::new_v4();
    let (x_player, o_player) = if rand::random::<bool>() {
        (first, second)
    } else {
        (second, first)
    };
    let session = GameSession::new_match(game_id, board_size, x_player, o_player, SystemTime::now())?;

    state
        .sessions()
        .reserve_pair(x_player, o_player, game_id)
        .map_err(|busy| {
            player_busy(
                busy,
                state.sessions().active_game_of(busy).unwrap_or(game_id),
            )
        })?;

    let initial_score = state.config().ranking.initial_score;
    let result = async {
        let mut players = Vec::new();
        for player in [x_player, o_player] {
            if load_player(store, player).await?.is_none() {
                players.push(PlayerEntity::guest(player, initial_score));
            }
        }
        store
            .commit(GameCommit {
                game: GameEntity::from(&session),
                new_move: None,
                players,
            })
            .await
            .map_err(ServiceError::from)
    }
    .await;

    if let Err(err) = result {
        state.sessions().release(x_player, game_id);
        state.sessions().release(o_player, game_id);
        return Err(err);
    }

    state.sessions().insert(session.clone());
    Ok(session)
}

/// Finish every PvP game whose player to move ran out of time. Returns how many finished.
///
/// A game without any move is abandoned; otherwise the player on turn forfeits. Finished games
/// nobody watches are evicted from memory.
pub async fn sweep_expired(state: &SharedState, now: SystemTime) -> usize {
    let Some(timeout) = state.config().games.move_timeout else {
        return 0;
    };
    let store = match state.require_game_store().await {
        Ok(store) => store,
        Err(_) => {
            debug!("storage degraded; skipping timeout sweep");
            return 0;
        }
    };

    let mut finished = 0;
    for (game_id, handle) in state.sessions().handles() {
        let mut session = handle.lock().await;
        if session.status.is_terminal() {
            if state.broadcaster().subscriber_count(game_id) == 0 {
                state.sessions().evict(game_id);
            }
            continue;
        }
        if session.kind != GameKind::Pvp {
            continue;
        }
        let left = time_left(&session, now, timeout);
        if !left.is_zero() {
            if state.broadcaster().subscriber_count(game_id) > 0 {
                let mut outbox = Outbox::new();
                outbox.record(DomainEvent::turn_timer(&session, left.as_secs()));
                outbox.release(state.bridge());
            }
            continue;
        }

        let event = if session.moves.is_empty() {
            GameEvent::Abandon
        } else {
            GameEvent::Forfeit {
                loser: session.turn,
            }
        };
        let next = match session.plan_finish(event, now) {
            Ok(next) => next,
            Err(err) => {
                warn!(game_id = %game_id, error = %err, "cannot time out game");
                continue;
            }
        };
        match commit_finish(state, store.as_ref(), &mut session, next).await {
            Ok(()) => {
                info!(game_id = %game_id, status = ?session.status, "game timed out");
                finished += 1;
            }
            Err(err) => warn!(game_id = %game_id, error = %err, "failed to persist timeout"),
        }
    }
    finished
}

/// Periodically run [`sweep_expired`] until the process stops.
pub async fn run_timeout_sweeper(state: SharedState) {
    if state.config().games.move_timeout.is_none() {
        info!("move timeout disabled; sweeper not started");
        return;
    }
    let mut ticker = tokio::time::interval(state.config().games.sweep_interval);
    loop {
        ticker.tick().await;
        sweep_expired(&state, SystemTime::now()).await;
    }
}

/// Time the player on turn has left. A clock behind `updated_at` leaves the whole timeout.
fn time_left(session: &GameSession, now: SystemTime, timeout: Duration) -> Duration {
    let idle = now.duration_since(session.updated_at).unwrap_or_default();
    timeout.saturating_sub(idle)
}

/// Handle of a loaded session, hydrating it from storage when not in memory.
async fn session_handle(state: &SharedState, game_id: GameId) -> Result<SessionHandle, ServiceError> {
    if let Some(handle) = state.sessions().handle(game_id) {
        return Ok(handle);
    }

    let store = state.game_store().await.ok_or(ServiceError::Degraded)?;
    let Some(entity) = store.find_game(game_id).await? else {
        return Err(ServiceError::NotFound(format!("game `{game_id}` not found")));
    };
    let moves = store.find_moves(game_id).await?;
    let session = entity.restore(moves).map_err(|err| {
        warn!(game_id = %game_id, error = %err, "stored game is inconsistent");
        ServiceError::Unavailable(StorageError::rejected(err.to_string()))
    })?;

    let session = if session.status.is_terminal() {
        session
    } else {
        seat_or_abandon(state, store.as_ref(), session).await?
    };
    debug!(game_id = %game_id, version = session.version, "game hydrated from storage");
    Ok(state.sessions().insert(session))
}

/// Seat the players of an unfinished stored game, or abandon it when one of them already plays
/// another game.
async fn seat_or_abandon(
    state: &SharedState,
    store: &dyn GameStore,
    session: GameSession,
) -> Result<GameSession, ServiceError> {
    let game_id = session.id;
    let conflict = session.participants().into_iter().find_map(|player| {
        state
            .sessions()
            .reserve(player, game_id)
            .err()
            .map(|other| (player, other))
    });
    let Some((player_id, other_game)) = conflict else {
        return Ok(session);
    };
    for player in session.participants() {
        state.sessions().release(player, game_id);
    }

    let next = session.plan_finish(GameEvent::Abandon, SystemTime::now())?;
    store
        .commit(GameCommit {
            game: GameEntity::from(&next),
            new_move: None,
            players: Vec::new(),
        })
        .await?;
    let mut outbox = Outbox::new();
    outbox.record(DomainEvent::game_finished(&next));
    outbox.release(state.bridge());
    warn!(game_id = %game_id, player_id, other_game = %other_game, "stored game abandoned: player seated elsewhere");
    Ok(next)
}

async fn load_player(store: &dyn GameStore, player_id: PlayerId) -> Result<Option<PlayerEntity>, ServiceError> {
    Ok(store.find_player(player_id).await?)
}

async fn load_or_guest(state: &SharedState, store: &dyn GameStore, player_id: PlayerId) -> Result<PlayerEntity, ServiceError> {
    Ok(load_player(store, player_id)
        .await?
        .unwrap_or_else(|| PlayerEntity::guest(player_id, state.config().ranking.initial_score)))
}

fn player_busy(player_id: PlayerId, active: GameId) -> ServiceError {
    ServiceError::Rejected {
        kind: RejectionKind::PlayerBusy,
        message: format!("player {player_id} is already playing game `{active}`"),
    }
}

async fn play_bot_turn(
    state: &SharedState,
    store: &dyn GameStore,
    session: &mut MutexGuard<'_, GameSession>,
) -> Result<MoveOutcome, ServiceError> {
    let (symbol, difficulty) = match (session.bot_symbol(), session.kind) {
        (Some(symbol), GameKind::VsBot(difficulty)) => (symbol, difficulty),
        _ => return Err(GameError::NotAPracticeGame.into()),
    };
    let cell = {
        let mut rng = rand::rng();
        bot::choose_move(&session.board, symbol, difficulty, &mut rng)
    };
    let Some((row, col)) = cell else {
        return Err(GameError::GameAlreadyFinished.into());
    };

    let placement = Placement {
        row: row as i32,
        col: col as i32,
        symbol,
    };
    let planned = session.plan_move(None, placement, SystemTime::now())?;
    commit_move(state, store, session, planned).await
}

/// Persist a planned move, then swap it in and release its events.
async fn commit_move(
    state: &SharedState,
    store: &dyn GameStore,
    session: &mut MutexGuard<'_, GameSession>,
    planned: PlannedMove,
) -> Result<MoveOutcome, ServiceError> {
    let PlannedMove {
        session: next,
        record,
        outcome,
    } = planned;

    let mut outbox = Outbox::new();
    outbox.record(DomainEvent::move_applied(&next, &record));
    if next.status.is_terminal() {
        outbox.record(DomainEvent::game_finished(&next));
    }

    let new_move = MoveEntity::from_record(next.id, &record);
    persist(state, store, session, next, Some(new_move), outbox).await?;
    Ok(MoveOutcome::new(&**session, &record, outcome))
}

/// Persist a move-less terminal change, then swap it in and release its event.
async fn commit_finish(
    state: &SharedState,
    store: &dyn GameStore,
    session: &mut MutexGuard<'_, GameSession>,
    next: GameSession,
) -> Result<(), ServiceError> {
    let mut outbox = Outbox::new();
    outbox.record(DomainEvent::game_finished(&next));
    persist(state, store, session, next, None, outbox).await
}

/// The durable unit of work of every game change.
///
/// Ranking updates ride in the same commit as the finishing change. The in-memory session only
/// moves forward and the outbox is only released once the store accepted the commit.
async fn persist(
    state: &SharedState,
    store: &dyn GameStore,
    session: &mut MutexGuard<'_, GameSession>,
    next: GameSession,
    new_move: Option<MoveEntity>,
    outbox: Outbox,
) -> Result<(), ServiceError> {
    let players = settle_players(state, store, &next).await?;
    let commit = GameCommit {
        game: GameEntity::from(&next),
        new_move,
        players,
    };
    store.commit(commit).await.inspect_err(|err| {
        warn!(game_id = %next.id, version = next.version, error = %err, "game commit failed");
    })?;

    let finished = next.status.is_terminal();
    **session = next;
    outbox.release(state.bridge());

    if finished {
        for player in session.participants() {
            state.sessions().release(player, session.id);
        }
        info!(
            game_id = %session.id,
            status = ?session.status,
            winner_id = ?session.winner_id,
            "game finished"
        );
    }
    Ok(())
}

/// Player records updated by a finishing change; empty while the game goes on or when abandoned.
async fn settle_players(
    state: &SharedState,
    store: &dyn GameStore,
    next: &GameSession,
) -> Result<Vec<PlayerEntity>, ServiceError> {
    let draw = match next.status {
        GameStatus::FinishedWin => false,
        GameStatus::FinishedDraw => true,
        _ => return Ok(Vec::new()),
    };
    let config = state.config();
    let ranking_settings = &config.ranking;
    let k_factor = ranking_settings.k_for(next.board_size());
    let floor = ranking_settings.min_score;

    match (next.kind, next.player2_id) {
        (GameKind::Pvp, Some(player2_id)) => {
            let mut first = load_or_guest(state, store, next.player1_id).await?;
            let mut second = load_or_guest(state, store, player2_id).await?;
            if next.winner_id == Some(player2_id) {
                std::mem::swap(&mut first, &mut second);
            }
            // `first` is the winner unless the game is drawn.
            let (first_score, second_score) = ranking::settle(first.score, second.score, draw, k_factor);
            ranking::record_result(&mut first, first_score, !draw, floor);
            ranking::record_result(&mut second, second_score, false, floor);
            Ok(vec![first, second])
        }
        (GameKind::VsBot(difficulty), _) => {
            let mut human = load_or_guest(state, store, next.player1_id).await?;
            let bot_rating = ranking_settings.bot_rating(difficulty);
            let human_won = next.winner_id == Some(human.id);
            let new_score = if draw || human_won {
                ranking::settle(human.score, bot_rating, draw, k_factor).0
            } else {
                ranking::settle(bot_rating, human.score, false, k_factor).1
            };
            ranking::record_result(&mut human, new_score, human_won, floor);
            Ok(vec![human])
        }
        (GameKind::Pvp, None) => {
            warn!(game_id = %next.id, "matched game without second player; skipping ranking");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::game_store::MemoryGameStore, state::AppState};

    async fn ready_state() -> (SharedState, MemoryGameStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        state.install_game_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn place(row: i32, col: i32, symbol: Symbol) -> Placement {
        Placement { row, col, symbol }
    }

    #[tokio::test]
    async fn practice_game_with_o_lets_the_bot_open() {
        let (state, _store) = ready_state().await;
        let view = create_bot_game(&state, 5, 3, BotDifficulty::Hard, Some(Symbol::O))
            .await
            .unwrap();
        assert_eq!(view.moves.len(), 1);
        assert_eq!(view.moves[0].author_id, None);
        assert_eq!(view.moves[0].symbol, Symbol::X);
        assert_eq!(view.turn, Some(Symbol::O));
    }

    #[tokio::test]
    async fn second_game_for_a_busy_player_is_refused() {
        let (state, _store) = ready_state().await;
        create_bot_game(&state, 5, 3, BotDifficulty::Easy, None)
            .await
            .unwrap();
        let err = create_bot_game(&state, 5, 3, BotDifficulty::Easy, None)
            .await
            .unwrap_err();
        assert_eq!(err.rejection_kind(), Some(RejectionKind::PlayerBusy));
    }

    #[tokio::test]
    async fn unknown_board_size_is_invalid_input() {
        let (state, _store) = ready_state().await;
        let err = create_bot_game(&state, 5, 7, BotDifficulty::Easy, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn degraded_state_refuses_moves() {
        let state = AppState::new(AppConfig::default());
        let err = create_move(&state, Uuid::new_v4(), 1, place(0, 0, Symbol::X))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }

    #[tokio::test]
    async fn surrender_in_practice_lowers_only_the_human() {
        let (state, store) = ready_state().await;
        let view = create_bot_game(&state, 9, 3, BotDifficulty::Hard, None)
            .await
            .unwrap();
        let finished = surrender(&state, view.id, 9).await.unwrap();
        assert_eq!(finished.status, GameStatus::FinishedWin);
        assert_eq!(finished.winner_id, None);
        assert_eq!(finished.winner_symbol, Some(Symbol::O));

        let player = store.find_player(9).await.unwrap().unwrap();
        assert!(player.score < 1200);
        assert_eq!((player.games_played, player.games_won), (1, 0));
        assert_eq!(state.sessions().active_game_of(9), None);
    }

    #[tokio::test]
    async fn idle_match_without_moves_is_abandoned() {
        let (state, store) = ready_state().await;
        let session = open_match(&state, &store, 3, 1, 2).await.unwrap();

        let later = SystemTime::now() + Duration::from_secs(600);
        assert_eq!(sweep_expired(&state, later).await, 1);

        let view = get_state(&state, session.id).await.unwrap();
        assert_eq!(view.status, GameStatus::Abandoned);
        assert_eq!(state.sessions().active_game_of(1), None);
        let player = store.find_player(1).await.unwrap().unwrap();
        assert_eq!(player.games_played, 0);
    }

    #[test]
    fn time_left_counts_down_from_the_last_change() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let session = GameSession::new_match(Uuid::new_v4(), 3, 1, 2, start).unwrap();
        let timeout = Duration::from_secs(120);

        assert_eq!(time_left(&session, start + Duration::from_secs(30), timeout), Duration::from_secs(90));
        assert!(time_left(&session, start + timeout, timeout).is_zero());
        assert!(time_left(&session, start + Duration::from_secs(500), timeout).is_zero());
        assert_eq!(time_left(&session, start - Duration::from_secs(5), timeout), timeout);
    }

    #[tokio::test]
    async fn sweep_pushes_the_countdown_to_subscribers() {
        let (state, store) = ready_state().await;
        let session = open_match(&state, &store, 3, 1, 2).await.unwrap();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        subscribe(&state, session.id, Connection::new(tx)).await.unwrap();
        rx.recv().await.unwrap();

        let later = session.updated_at + Duration::from_secs(30);
        assert_eq!(sweep_expired(&state, later).await, 0);

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let axum::extract::ws::Message::Text(text) = frame else {
            panic!("unexpected frame: {frame:?}");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["type"], "timer_update");
        assert_eq!(value["remaining_seconds"], 90);
        assert_eq!(value["current_player_symbol"], "X");
    }

    #[tokio::test]
    async fn idle_player_on_turn_forfeits() {
        let (state, store) = ready_state().await;
        let session = open_match(&state, &store, 3, 1, 2).await.unwrap();
        let x_player = session.player1_id;
        let o_player = session.player2_id.unwrap();
        create_move(&state, session.id, x_player, place(0, 0, Symbol::X))
            .await
            .unwrap();

        let later = SystemTime::now() + Duration::from_secs(600);
        assert_eq!(sweep_expired(&state, later).await, 1);

        let view = get_state(&state, session.id).await.unwrap();
        assert_eq!(view.status, GameStatus::FinishedWin);
        assert_eq!(view.winner_id, Some(x_player));
        assert!(store.find_player(o_player).await.unwrap().unwrap().score < 1200);
    }

    #[tokio::test]
    async fn evicted_games_are_hydrated_from_storage() {
        let (state, store) = ready_state().await;
        let session = open_match(&state, &store, 3, 1, 2).await.unwrap();
        create_move(&state, session.id, session.player1_id, place(1, 1, Symbol::X))
            .await
            .unwrap();
        state.sessions().evict(session.id);

        let view = get_state(&state, session.id).await.unwrap();
        assert_eq!(view.version, 1);
        assert_eq!(view.moves.len(), 1);
        assert_eq!(view.turn, Some(Symbol::O));

        let err = get_state(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn stored_game_of_a_reseated_player_is_abandoned() {
        let (state, store) = ready_state().await;
        let session = open_match(&state, &store, 3, 1, 2).await.unwrap();
        create_move(&state, session.id, session.player1_id, place(1, 1, Symbol::X))
            .await
            .unwrap();
        state.sessions().evict(session.id);
        state.sessions().release(2, session.id);
        let elsewhere = Uuid::new_v4();
        state.sessions().reserve(2, elsewhere).unwrap();

        let view = get_state(&state, session.id).await.unwrap();
        assert_eq!(view.status, GameStatus::Abandoned);
        assert_eq!(view.version, 2);
        assert_eq!(state.sessions().active_game_of(1), None);
        assert_eq!(state.sessions().active_game_of(2), Some(elsewhere));

        let stored = store.find_game(session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, GameStatus::Abandoned);
        assert_eq!(store.find_player(1).await.unwrap().unwrap().games_played, 0);
    }
}
