//! In-memory registry of live game sessions and of the players currently seated in one.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Mutex;

use crate::state::game::{GameId, GameSession, PlayerId};

/// Exclusive handle on a single session; holding its lock makes the holder the game's only writer.
pub type SessionHandle = Arc<Mutex<GameSession>>;

/// Live sessions plus the one-active-game-per-player index.
#[derive(Default)]
pub struct GameSessions {
    games: DashMap<GameId, SessionHandle>,
    active_players: DashMap<PlayerId, GameId>,
}

impl GameSessions {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of a loaded session.
    pub fn handle(&self, id: GameId) -> Option<SessionHandle> {
        self.games.get(&id).map(|entry| entry.value().clone())
    }

    /// Register a session, returning the handle that won if another caller inserted it first.
    pub fn insert(&self, session: GameSession) -> SessionHandle {
        self.games
            .entry(session.id)
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .value()
            .clone()
    }

    /// Handles of every loaded session.
    pub fn handles(&self) -> Vec<(GameId, SessionHandle)> {
        self.games
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Forget a loaded session.
    pub fn evict(&self, id: GameId) {
        self.games.remove(&id);
    }

    /// Game `player` is currently seated in.
    pub fn active_game_of(&self, player: PlayerId) -> Option<GameId> {
        self.active_players.get(&player).map(|entry| *entry.value())
    }

    /// Seat `player` in `game`. Fails with the game already held otherwise.
    pub fn reserve(&self, player: PlayerId, game: GameId) -> Result<(), GameId> {
        match self.active_players.entry(player) {
            Entry::Occupied(existing) if *existing.get() != game => Err(*existing.get()),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(game);
                Ok(())
            }
        }
    }

    /// Seat both players in `game`, or neither.
    pub fn reserve_pair(&self, first: PlayerId, second: PlayerId, game: GameId) -> Result<(), PlayerId> {
        self.reserve(first, game).map_err(|_| first)?;
        if self.reserve(second, game).is_err() {
            self.release(first, game);
            return Err(second);
        }
        Ok(())
    }

    /// Unseat `player` if still seated in `game`.
    pub fn release(&self, player: PlayerId, game: GameId) {
        self.active_players
            .remove_if(&player, |_, active| *active == game);
    }
}
