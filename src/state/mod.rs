pub mod board;
pub mod broadcaster;
pub mod game;
pub mod matchmaking;
pub mod ranking;
pub mod sessions;
pub mod state_machine;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, RwLock, watch};

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    error::ServiceError,
    services::event_bridge::{self, EventBridge},
    state::{broadcaster::NotificationBroadcaster, matchmaking::MatchmakingBucket, sessions::GameSessions},
};

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, live games, queues and subscribers.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
    sessions: GameSessions,
    buckets: HashMap<usize, Mutex<MatchmakingBucket>>,
    broadcaster: Arc<NotificationBroadcaster>,
    bridge: EventBridge,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed. The event
    /// dispatcher is spawned on the current Tokio runtime.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (bridge, receiver) = EventBridge::new();
        let broadcaster = Arc::new(NotificationBroadcaster::new());
        tokio::spawn(event_bridge::run_dispatcher(receiver, broadcaster.clone()));

        let buckets = config
            .board_sizes
            .iter()
            .map(|size| (*size, Mutex::new(MatchmakingBucket::new(*size))))
            .collect();

        Arc::new(Self {
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            config: Arc::new(config),
            sessions: GameSessions::new(),
            buckets,
            broadcaster,
            bridge,
        })
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current game store, or [`ServiceError::Degraded`] when storage cannot take writes.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Shared configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Live sessions and seated players.
    pub fn sessions(&self) -> &GameSessions {
        &self.sessions
    }

    /// Waiting list for `board_size`, if that size is offered.
    pub fn bucket(&self, board_size: usize) -> Option<&Mutex<MatchmakingBucket>> {
        self.buckets.get(&board_size)
    }

    /// Every offered board size with its waiting list, smallest first.
    pub fn buckets(&self) -> Vec<(usize, &Mutex<MatchmakingBucket>)> {
        let mut buckets: Vec<_> = self.buckets.iter().map(|(size, bucket)| (*size, bucket)).collect();
        buckets.sort_unstable_by_key(|(size, _)| *size);
        buckets
    }

    /// Subscriber registry fed by the event dispatcher.
    pub fn broadcaster(&self) -> &NotificationBroadcaster {
        &self.broadcaster
    }

    /// Post-commit event channel.
    pub fn bridge(&self) -> &EventBridge {
        &self.bridge
    }
}
