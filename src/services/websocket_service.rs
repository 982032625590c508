use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        events::{MoveRejectedMessage, ServerMessage},
        ws::ClientMessage,
    },
    error::ServiceError,
    services::{game_service, matchmaking_service},
    state::{
        SharedState,
        board::Placement,
        broadcaster::Connection,
        game::{GameId, PlayerId},
    },
};

/// The socket's writer task is gone.
#[derive(Debug, Error)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// Handle the full lifecycle of a game socket, for a seated player or an observer.
pub async fn handle_game_socket(
    state: SharedState,
    socket: WebSocket,
    game_id: GameId,
    player_id: Option<PlayerId>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection = Connection::new(outbound_tx.clone());
    let connection_id = connection.id;
    if let Err(err) = game_service::subscribe(&state, game_id, connection).await {
        info!(game_id = %game_id, error = %err, "refusing game socket");
        let _ = send_message_to_websocket(&outbound_tx, &ServerMessage::error(err.to_string()));
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }
    info!(game_id = %game_id, connection_id = %connection_id, player_id = ?player_id, "game socket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let inbound = match ClientMessage::from_json_str(&text) {
                    Ok(inbound) => inbound,
                    Err(err) => {
                        debug!(game_id = %game_id, error = %err, "malformed game message");
                        if send_message_to_websocket(&outbound_tx, &ServerMessage::error(err)).is_err() {
                            break;
                        }
                        continue;
                    }
                };
                if handle_game_message(&state, game_id, player_id, inbound, &outbound_tx)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(game_id = %game_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.broadcaster().unsubscribe(game_id, connection_id);
    info!(game_id = %game_id, connection_id = %connection_id, "game socket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Handle the lifecycle of a player's queue socket, which only receives `match_formed`.
///
/// Closing the player's last queue socket withdraws their waiting entries.
pub async fn handle_queue_socket(state: SharedState, socket: WebSocket, player_id: PlayerId) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection = Connection::new(outbound_tx.clone());
    let connection_id = connection.id;
    state.broadcaster().subscribe_queue(player_id, connection);
    info!(player_id, connection_id = %connection_id, "queue socket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = match ClientMessage::from_json_str(&text) {
                    Ok(ClientMessage::Ping) => ServerMessage::Pong,
                    Ok(_) => ServerMessage::error("queue sockets only accept ping"),
                    Err(err) => ServerMessage::error(err),
                };
                if send_message_to_websocket(&outbound_tx, &reply).is_err() {
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.broadcaster().unsubscribe_queue(player_id, connection_id);
    if state.broadcaster().queue_subscriber_count(player_id) == 0 {
        matchmaking_service::cancel_all(&state, player_id).await;
    }
    info!(player_id, connection_id = %connection_id, "queue socket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Apply one client frame. Failures are answered to this connection only.
async fn handle_game_message(
    state: &SharedState,
    game_id: GameId,
    player_id: Option<PlayerId>,
    inbound: ClientMessage,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ConnectionClosed> {
    match inbound {
        ClientMessage::Ping => send_message_to_websocket(outbound_tx, &ServerMessage::Pong),
        ClientMessage::Unknown => send_message_to_websocket(
            outbound_tx,
            &ServerMessage::error("unsupported message type"),
        ),
        ClientMessage::Move { row, col, symbol } => {
            let Some(player_id) = player_id else {
                return send_rejection(outbound_tx, &missing_identity());
            };
            let placement = Placement { row, col, symbol };
            match game_service::create_move(state, game_id, player_id, placement).await {
                Ok(_) => {
                    // The committed move reaches this socket through the broadcaster.
                    if game_service::bot_to_move(state, game_id).await {
                        if let Err(err) = game_service::create_bot_move(state, game_id, player_id).await {
                            warn!(game_id = %game_id, error = %err, "bot reply failed");
                        }
                    }
                    Ok(())
                }
                Err(err) => send_rejection(outbound_tx, &err),
            }
        }
        ClientMessage::Surrender => {
            let Some(player_id) = player_id else {
                return send_rejection(outbound_tx, &missing_identity());
            };
            match game_service::surrender(state, game_id, player_id).await {
                Ok(_) => Ok(()),
                Err(err) => send_rejection(outbound_tx, &err),
            }
        }
    }
}

fn missing_identity() -> ServiceError {
    ServiceError::Unauthorized("player identity required".into())
}

fn send_rejection(
    tx: &mpsc::UnboundedSender<Message>,
    err: &ServiceError,
) -> Result<(), ConnectionClosed> {
    send_message_to_websocket(
        tx,
        &ServerMessage::MoveRejected(MoveRejectedMessage {
            kind: err.rejection_kind(),
            message: err.to_string(),
        }),
    )
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is reported.
pub fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), ConnectionClosed>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
