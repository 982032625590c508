//! Fan-out of committed events to live WebSocket connections.

use std::collections::HashMap;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::events::ServerMessage,
    services::{event_bridge::DomainEvent, websocket_service::send_message_to_websocket},
    state::game::{GameId, PlayerId},
};

/// Identifier of one live socket.
pub type ConnectionId = Uuid;

#[derive(Clone, Debug)]
/// Handle used to push messages to a connected client.
pub struct Connection {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Writer channel of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Wrap a writer channel under a fresh identifier.
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }
}

/// Place of an event in a game's stream: the version it commits, then `move_applied` before
/// `game_finished` when one commit produces both.
type StreamPosition = (u64, u8);

#[derive(Debug)]
struct GameSubscriber {
    connection: Connection,
    /// Last stream position this connection has already seen.
    seen: StreamPosition,
}

/// Registry of game and queue subscribers.
#[derive(Default)]
pub struct NotificationBroadcaster {
    games: DashMap<GameId, HashMap<ConnectionId, GameSubscriber>>,
    queues: DashMap<PlayerId, HashMap<ConnectionId, Connection>>,
}

impl NotificationBroadcaster {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `connection` to `game_id`. Events up to `seen_version` are assumed delivered.
    ///
    /// Callers hold the game's lock while taking the snapshot that `seen_version` refers to.
    pub fn subscribe(&self, game_id: GameId, connection: Connection, seen_version: u64) {
        debug!(game_id = %game_id, connection_id = %connection.id, seen_version, "game subscriber added");
        self.games.entry(game_id).or_default().insert(
            connection.id,
            GameSubscriber {
                connection,
                seen: (seen_version, 0),
            },
        );
    }

    /// Detach a connection from `game_id`. Unknown connections are ignored.
    pub fn unsubscribe(&self, game_id: GameId, connection_id: ConnectionId) {
        let now_empty = match self.games.get_mut(&game_id) {
            Some(mut subscribers) => {
                subscribers.remove(&connection_id);
                subscribers.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.games.remove_if(&game_id, |_, subscribers| subscribers.is_empty());
        }
    }

    /// Attach `connection` to the queue notifications of `player_id`.
    pub fn subscribe_queue(&self, player_id: PlayerId, connection: Connection) {
        self.queues
            .entry(player_id)
            .or_default()
            .insert(connection.id, connection);
    }

    /// Detach a queue connection. Unknown connections are ignored.
    pub fn unsubscribe_queue(&self, player_id: PlayerId, connection_id: ConnectionId) {
        let now_empty = match self.queues.get_mut(&player_id) {
            Some(mut connections) => {
                connections.remove(&connection_id);
                connections.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.queues
                .remove_if(&player_id, |_, connections| connections.is_empty());
        }
    }

    /// Number of queue connections open for `player_id`.
    pub fn queue_subscriber_count(&self, player_id: PlayerId) -> usize {
        self.queues.get(&player_id).map_or(0, |connections| connections.len())
    }

    /// Number of connections following `game_id`.
    pub fn subscriber_count(&self, game_id: GameId) -> usize {
        self.games.get(&game_id).map_or(0, |subscribers| subscribers.len())
    }

    /// Deliver a committed event to everyone concerned.
    pub fn publish(&self, event: &DomainEvent) {
        let message = ServerMessage::from(event);
        match event {
            DomainEvent::MatchFormed {
                game_id,
                player1_id,
                player2_id,
                ..
            } => {
                for player in [*player1_id, *player2_id] {
                    self.publish_queue(player, &message);
                }
                debug!(game_id = %game_id, "match_formed delivered");
            }
            DomainEvent::MoveApplied { game_id, version, .. } => {
                self.publish_game(*game_id, (*version, 0), true, &message);
            }
            DomainEvent::GameFinished { game_id, version, .. } => {
                self.publish_game(*game_id, (*version, 1), true, &message);
            }
            DomainEvent::TurnTimer { game_id, version, .. } => {
                self.publish_game(*game_id, (*version, 0), false, &message);
            }
        }
    }

    /// Tracked events reach each connection once, in stream order. Untracked ones (countdowns)
    /// reach every connection that has not seen anything newer, and may repeat.
    fn publish_game(
        &self,
        game_id: GameId,
        position: StreamPosition,
        tracked: bool,
        message: &ServerMessage,
    ) {
        let Some(mut subscribers) = self.games.get_mut(&game_id) else {
            return;
        };

        subscribers.retain(|connection_id, subscriber| {
            if tracked {
                if position <= subscriber.seen {
                    return true;
                }
                subscriber.seen = position;
            } else if position < subscriber.seen {
                return true;
            }
            match send_message_to_websocket(&subscriber.connection.tx, message) {
                Ok(()) => true,
                Err(err) => {
                    warn!(game_id = %game_id, connection_id = %connection_id, error = %err, "dropping game subscriber");
                    false
                }
            }
        });

        let now_empty = subscribers.is_empty();
        drop(subscribers);
        if now_empty {
            self.games.remove_if(&game_id, |_, subscribers| subscribers.is_empty());
        }
    }

    fn publish_queue(&self, player_id: PlayerId, message: &ServerMessage) {
        let Some(mut connections) = self.queues.get_mut(&player_id) else {
            debug!(player_id, "no queue subscriber for match notification");
            return;
        };

        connections.retain(|connection_id, connection| {
            match send_message_to_websocket(&connection.tx, message) {
                Ok(()) => true,
                Err(err) => {
                    warn!(player_id, connection_id = %connection_id, error = %err, "dropping queue subscriber");
                    false
                }
            }
        });
    }
}
