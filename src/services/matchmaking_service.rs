use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    dao::{game_store::GameStore, models::PlayerEntity},
    dto::{
        game::GameStateView,
        matchmaking::{JoinQueueResponse, PlayerQueueStatus, QueueBucketStatus, QueueEntryStatus},
    },
    error::{RejectionKind, ServiceError},
    services::{
        event_bridge::{DomainEvent, Outbox},
        game_service,
    },
    state::{
        SharedState,
        game::{GameId, GameKind, PlayerId},
        matchmaking::{MatchRef, MatchmakingBucket, QueueEntry},
    },
};

/// Reasons a queue request is refused before reaching a bucket.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No bucket serves the requested size.
    #[error("unknown board size {0}")]
    UnknownBoardSize(usize),
    /// The player is seated in an unfinished game.
    #[error("player {player_id} is already playing game `{game_id}`")]
    PlayerBusy {
        /// Requesting player.
        player_id: PlayerId,
        /// Game the player is seated in.
        game_id: GameId,
    },
}

impl From<QueueError> for ServiceError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::UnknownBoardSize(_) => ServiceError::InvalidInput(err.to_string()),
            QueueError::PlayerBusy { .. } => ServiceError::Rejected {
                kind: RejectionKind::PlayerBusy,
                message: err.to_string(),
            },
        }
    }
}

/// Queue `player_id` for `board_size`, running a pairing pass right away.
///
/// Joining twice returns the existing entry unchanged.
pub async fn join(
    state: &SharedState,
    player_id: PlayerId,
    board_size: usize,
) -> Result<JoinQueueResponse, ServiceError> {
    let bucket = state
        .bucket(board_size)
        .ok_or(QueueError::UnknownBoardSize(board_size))?;
    if let Some(game_id) = state.sessions().active_game_of(player_id) {
        return Err(QueueError::PlayerBusy { player_id, game_id }.into());
    }
    let store = state.require_game_store().await?;
    let player = player_record(state, store.as_ref(), player_id).await?;

    let config = state.config();
    let settings = &config.matchmaking;
    let mut guard = bucket.lock().await;
    let now = Instant::now();
    let (entry, created) = guard.join(player_id, player.score, now);
    if created {
        info!(player_id, board_size, score = player.score, "player joined queue");
    }

    let matched = pair_bucket(state, store.as_ref(), &mut guard, now).await;
    let wait = guard.estimated_wait(
        Some(player_id),
        now,
        settings.rate_window,
        settings.default_wait,
    );
    drop(guard);

    let response = match matched.iter().find(|entry| entry.player_id == player_id) {
        Some(own) => JoinQueueResponse::new(own, 0),
        None => JoinQueueResponse::new(&entry, whole_seconds(wait)),
    };
    cancel_elsewhere(state, board_size, &matched).await;
    Ok(response)
}

/// Withdraw `player_id` from `board_size`. Absent or already matched entries are ignored.
pub async fn cancel(
    state: &SharedState,
    player_id: PlayerId,
    board_size: usize,
) -> Result<(), ServiceError> {
    let bucket = state
        .bucket(board_size)
        .ok_or(QueueError::UnknownBoardSize(board_size))?;
    if bucket.lock().await.cancel(player_id).is_some() {
        info!(player_id, board_size, "player left queue");
    }
    Ok(())
}

/// Withdraw `player_id` from every bucket.
pub async fn cancel_all(state: &SharedState, player_id: PlayerId) {
    for (board_size, bucket) in state.buckets() {
        if bucket.lock().await.cancel(player_id).is_some() {
            info!(player_id, board_size, "player left queue");
        }
    }
}

/// One pairing pass over every bucket. Returns the number of games created.
pub async fn tick(state: &SharedState) -> usize {
    let store = match state.require_game_store().await {
        Ok(store) => store,
        Err(_) => {
            debug!("storage degraded; skipping matchmaking pass");
            return 0;
        }
    };

    let mut games = 0;
    for (board_size, bucket) in state.buckets() {
        let matched = {
            let mut guard = bucket.lock().await;
            if guard.len() < 2 {
                continue;
            }
            pair_bucket(state, store.as_ref(), &mut guard, Instant::now()).await
        };
        games += matched.len() / 2;
        cancel_elsewhere(state, board_size, &matched).await;
    }
    games
}

/// Depth and advisory wait of every bucket.
pub async fn queue_status(state: &SharedState) -> Vec<QueueBucketStatus> {
    let config = state.config();
    let settings = &config.matchmaking;
    let now = Instant::now();

    let mut statuses = Vec::new();
    for (board_size, bucket) in state.buckets() {
        let mut guard = bucket.lock().await;
        let wait = guard.estimated_wait(None, now, settings.rate_window, settings.default_wait);
        statuses.push(QueueBucketStatus {
            board_size,
            waiting: guard.len(),
            estimated_wait_time: whole_seconds(wait),
        });
    }
    statuses
}

/// Where `player_id` stands: seated in a matched game, or waiting in one or more buckets.
pub async fn player_status(
    state: &SharedState,
    player_id: PlayerId,
) -> Result<PlayerQueueStatus, ServiceError> {
    if let Some(handle) = state
        .sessions()
        .active_game_of(player_id)
        .and_then(|game_id| state.sessions().handle(game_id))
    {
        let session = handle.lock().await;
        if session.kind == GameKind::Pvp && !session.status.is_terminal() {
            let opponent = session.participants().into_iter().find(|id| *id != player_id);
            return Ok(PlayerQueueStatus::matched(
                player_id,
                session.id,
                opponent,
                session.board_size(),
            ));
        }
    }

    let config = state.config();
    let settings = &config.matchmaking;
    let now = Instant::now();
    let mut entries = Vec::new();
    for (_, bucket) in state.buckets() {
        let mut guard = bucket.lock().await;
        let Some(entry) = guard.get(player_id).cloned() else {
            continue;
        };
        let wait = guard.estimated_wait(Some(player_id), now, settings.rate_window, settings.default_wait);
        entries.push(QueueEntryStatus::new(&entry, whole_seconds(wait)));
    }
    if entries.is_empty() {
        return Err(ServiceError::NotFound(format!(
            "player {player_id} is neither queued nor matched"
        )));
    }
    Ok(PlayerQueueStatus::waiting(player_id, entries))
}

/// Start a game between `challenger` and `challenged` without going through the queue.
///
/// The challenged player must be known to storage and neither side may be seated elsewhere.
/// Both players leave every bucket they waited in.
pub async fn challenge(
    state: &SharedState,
    challenger: PlayerId,
    challenged: PlayerId,
    board_size: usize,
) -> Result<GameStateView, ServiceError> {
    if state.bucket(board_size).is_none() {
        return Err(QueueError::UnknownBoardSize(board_size).into());
    }
    if challenger == challenged {
        return Err(ServiceError::Rejected {
            kind: RejectionKind::SelfChallenge,
            message: format!("player {challenger} cannot challenge themselves"),
        });
    }
    if let Some(game_id) = state.sessions().active_game_of(challenger) {
        return Err(QueueError::PlayerBusy {
            player_id: challenger,
            game_id,
        }
        .into());
    }
    let store = state.require_game_store().await?;
    if store.find_player(challenged).await?.is_none() {
        return Err(ServiceError::NotFound(format!("player {challenged} not found")));
    }
    if let Some(game_id) = state.sessions().active_game_of(challenged) {
        return Err(QueueError::PlayerBusy {
            player_id: challenged,
            game_id,
        }
        .into());
    }
    player_record(state, store.as_ref(), challenger).await?;

    let session =
        game_service::open_match(state, store.as_ref(), board_size, challenger, challenged).await?;
    let game_id = session.id;
    let x_player = session.player1_id;
    let o_player = if x_player == challenger { challenged } else { challenger };

    let mut outbox = Outbox::new();
    outbox.record(DomainEvent::MatchFormed {
        game_id,
        player1_id: x_player,
        player2_id: o_player,
        board_size,
    });
    outbox.release(state.bridge());
    info!(game_id = %game_id, board_size, challenger, challenged, "challenge accepted");

    for player in [challenger, challenged] {
        cancel_all(state, player).await;
    }
    Ok(GameStateView::from(&session))
}

/// Run [`tick`] periodically until the process stops.
pub async fn run_matchmaker(state: SharedState) {
    let mut ticker = tokio::time::interval(state.config().matchmaking.tick_interval);
    loop {
        ticker.tick().await;
        let games = tick(&state).await;
        if games > 0 {
            debug!(games, "matchmaking pass formed games");
        }
    }
}

/// Pair what the policy allows in a locked bucket and commit a game per pair.
///
/// Runs under the bucket lock: each pairing's `MatchFormed` is released right after its game
/// commits. Returns the entries that left the bucket matched.
async fn pair_bucket(
    state: &SharedState,
    store: &dyn GameStore,
    bucket: &mut MatchmakingBucket,
    now: Instant,
) -> Vec<QueueEntry> {
    let config = state.config();
    let settings = &config.matchmaking;
    let board_size = bucket.board_size();
    let mut matched = Vec::new();

    for (first, second) in bucket.find_pairs(&settings.tolerance, now) {
        let session = match game_service::open_match(state, store, board_size, first, second).await {
            Ok(session) => session,
            Err(ServiceError::Rejected {
                kind: RejectionKind::PlayerBusy,
                message,
            }) => {
                debug!(board_size, first, second, reason = %message, "pairing skipped");
                for player in [first, second] {
                    if state.sessions().active_game_of(player).is_some() {
                        bucket.cancel(player);
                    }
                }
                continue;
            }
            Err(err) => {
                warn!(board_size, error = %err, "failed to create matched game; pairing pass stopped");
                break;
            }
        };

        let game_id = session.id;
        let x_player = session.player1_id;
        let o_player = if x_player == first { second } else { first };
        for (player, opponent_id) in [(first, second), (second, first)] {
            if let Some(entry) = bucket.take_matched(player, MatchRef { opponent_id, game_id }) {
                matched.push(entry);
            }
        }
        bucket.record_match(now, settings.rate_window);

        let mut outbox = Outbox::new();
        outbox.record(DomainEvent::MatchFormed {
            game_id,
            player1_id: x_player,
            player2_id: o_player,
            board_size,
        });
        outbox.release(state.bridge());
        info!(game_id = %game_id, board_size, player1_id = x_player, player2_id = o_player, "match formed");
    }

    matched
}

/// Drop the matched players' entries for other board sizes.
async fn cancel_elsewhere(state: &SharedState, board_size: usize, matched: &[QueueEntry]) {
    if matched.is_empty() {
        return;
    }
    for (other_size, bucket) in state.buckets() {
        if other_size == board_size {
            continue;
        }
        let mut guard = bucket.lock().await;
        for entry in matched {
            if guard.cancel(entry.player_id).is_some() {
                debug!(player_id = entry.player_id, board_size = other_size, "entry cancelled after match");
            }
        }
    }
}

/// Stored record of `player_id`, created as a guest on first contact.
async fn player_record(
    state: &SharedState,
    store: &dyn GameStore,
    player_id: PlayerId,
) -> Result<PlayerEntity, ServiceError> {
    if let Some(player) = store.find_player(player_id).await? {
        return Ok(player);
    }
    let guest = PlayerEntity::guest(player_id, state.config().ranking.initial_score);
    store.save_player(guest.clone()).await?;
    debug!(player_id, "guest player created");
    Ok(guest)
}

fn whole_seconds(wait: Duration) -> u64 {
    wait.as_secs_f64().ceil() as u64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::MemoryGameStore,
        state::{AppState, broadcaster::Connection, matchmaking::QueueStatus},
    };

    async fn next_type(rx: &mut mpsc::UnboundedReceiver<Message>) -> String {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("unexpected frame: {frame:?}");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        value["type"].as_str().unwrap().to_string()
    }

    async fn ready_state() -> (SharedState, MemoryGameStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryGameStore::new();
        state.install_game_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn second_join_pairs_both_players() {
        let (state, _store) = ready_state().await;
        let first = join(&state, 1, 3).await.unwrap();
        assert_eq!(first.status, QueueStatus::Waiting);
        assert_eq!(first.estimated_wait_time, 30);

        let second = join(&state, 2, 3).await.unwrap();
        assert_eq!(second.status, QueueStatus::Matched);
        assert_eq!(second.opponent_id, Some(1));
        let game_id = second.game_id.unwrap();
        assert_eq!(state.sessions().active_game_of(1), Some(game_id));
        assert_eq!(state.sessions().active_game_of(2), Some(game_id));
    }

    #[tokio::test]
    async fn busy_player_cannot_queue() {
        let (state, _store) = ready_state().await;
        join(&state, 1, 3).await.unwrap();
        join(&state, 2, 3).await.unwrap();
        let err = join(&state, 1, 4).await.unwrap_err();
        assert_eq!(err.rejection_kind(), Some(RejectionKind::PlayerBusy));
    }

    #[tokio::test]
    async fn match_clears_entries_for_other_sizes() {
        let (state, _store) = ready_state().await;
        join(&state, 1, 4).await.unwrap();
        join(&state, 1, 3).await.unwrap();
        join(&state, 2, 3).await.unwrap();

        let sizes = queue_status(&state).await;
        assert!(sizes.iter().all(|status| status.waiting == 0));
    }

    #[tokio::test]
    async fn unknown_size_and_absent_cancel() {
        let (state, _store) = ready_state().await;
        assert!(matches!(
            join(&state, 1, 9).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        cancel(&state, 1, 3).await.unwrap();
    }

    #[tokio::test]
    async fn distant_scores_wait_for_the_tick() {
        let (state, store) = ready_state().await;
        store.save_player(PlayerEntity::guest(1, 400)).await.unwrap();
        store.save_player(PlayerEntity::guest(2, 2400)).await.unwrap();
        join(&state, 1, 5).await.unwrap();
        let second = join(&state, 2, 5).await.unwrap();
        assert_eq!(second.status, QueueStatus::Waiting);
        assert_eq!(tick(&state).await, 0);
    }

    #[tokio::test]
    async fn queued_player_learns_about_the_match() {
        let (state, _store) = ready_state().await;
        join(&state, 1, 3).await.unwrap();
        let waiting = player_status(&state, 1).await.unwrap();
        assert_eq!(waiting.status, QueueStatus::Waiting);
        assert_eq!(waiting.entries.len(), 1);
        assert_eq!(waiting.entries[0].board_size, 3);

        let second = join(&state, 2, 3).await.unwrap();
        let status = player_status(&state, 1).await.unwrap();
        assert_eq!(status.status, QueueStatus::Matched);
        assert_eq!(status.game_id, second.game_id);
        assert_eq!(status.opponent_id, Some(2));
        assert_eq!(status.board_size, Some(3));
        assert!(status.entries.is_empty());

        assert!(matches!(
            player_status(&state, 7).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn challenge_opens_a_game_and_notifies_both() {
        let (state, store) = ready_state().await;
        store.save_player(PlayerEntity::guest(2, 1200)).await.unwrap();
        join(&state, 1, 4).await.unwrap();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        state.broadcaster().subscribe_queue(1, Connection::new(a_tx));
        state.broadcaster().subscribe_queue(2, Connection::new(b_tx));

        let view = challenge(&state, 1, 2, 3).await.unwrap();
        assert_eq!(state.sessions().active_game_of(1), Some(view.id));
        assert_eq!(state.sessions().active_game_of(2), Some(view.id));
        assert_eq!(next_type(&mut a_rx).await, "match_formed");
        assert_eq!(next_type(&mut b_rx).await, "match_formed");
        assert!(queue_status(&state).await.iter().all(|bucket| bucket.waiting == 0));
    }

    #[tokio::test]
    async fn challenging_oneself_is_refused() {
        let (state, _store) = ready_state().await;
        let err = challenge(&state, 1, 1, 3).await.unwrap_err();
        assert_eq!(err.rejection_kind(), Some(RejectionKind::SelfChallenge));
        assert_eq!(state.sessions().active_game_of(1), None);
    }

    #[tokio::test]
    async fn busy_or_unknown_opponents_cannot_be_challenged() {
        let (state, _store) = ready_state().await;
        join(&state, 1, 3).await.unwrap();
        join(&state, 2, 3).await.unwrap();
        let seated = state.sessions().active_game_of(2);

        let err = challenge(&state, 3, 2, 3).await.unwrap_err();
        assert_eq!(err.rejection_kind(), Some(RejectionKind::PlayerBusy));
        assert_eq!(state.sessions().active_game_of(2), seated);
        assert_eq!(state.sessions().active_game_of(3), None);

        let err = challenge(&state, 1, 4, 3).await.unwrap_err();
        assert_eq!(err.rejection_kind(), Some(RejectionKind::PlayerBusy));

        let err = challenge(&state, 3, 99, 3).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
