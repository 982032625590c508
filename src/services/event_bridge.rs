//! Post-commit event hand-off between the mutating services and the broadcaster.
//!
//! A mutating operation records its events in an [`Outbox`] while it works. Only once the
//! store has committed does it [`Outbox::release`] them into the bridge, still under the
//! per-game (or per-bucket) lock, so the bridge's single channel carries each game's events in
//! commit order. A dispatcher task drains the channel off the request path.

use std::{mem, sync::Arc};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::state::{
    board::Symbol,
    broadcaster::NotificationBroadcaster,
    game::{GameId, GameSession, MoveRecord, PlayerId},
    state_machine::GameStatus,
};

/// Something subscribers learn about committed state.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// Two queued players were paired into a new game.
    MatchFormed {
        /// New game.
        game_id: GameId,
        /// Player holding `X`.
        player1_id: PlayerId,
        /// Player holding `O`.
        player2_id: PlayerId,
        /// Grid dimension.
        board_size: usize,
    },
    /// A move was appended to a game.
    MoveApplied {
        /// Game the move belongs to.
        game_id: GameId,
        /// Game version after the move.
        version: u64,
        /// The committed move.
        record: MoveRecord,
        /// Symbol to move next, absent once the game is over.
        next_turn: Option<Symbol>,
        /// Board after the move.
        board: Vec<Vec<Option<Symbol>>>,
    },
    /// A game reached a terminal status.
    GameFinished {
        /// Finished game.
        game_id: GameId,
        /// Game version after the change.
        version: u64,
        /// Terminal status.
        status: GameStatus,
        /// Winning player, if a human won.
        winner_id: Option<PlayerId>,
        /// Winning symbol, if anyone won.
        winner_symbol: Option<Symbol>,
    },
    /// Countdown of the player on turn, read from the committed session by the timeout sweeper.
    TurnTimer {
        /// Game being timed.
        game_id: GameId,
        /// Game version the countdown was read at.
        version: u64,
        /// Whole seconds left before the player on turn forfeits.
        remaining_seconds: u64,
        /// Symbol on turn.
        turn: Symbol,
    },
}

impl DomainEvent {
    /// `MoveApplied` for the last move of `session`.
    pub fn move_applied(session: &GameSession, record: &MoveRecord) -> Self {
        DomainEvent::MoveApplied {
            game_id: session.id,
            version: session.version,
            record: record.clone(),
            next_turn: session.next_turn(),
            board: session.board.rows(),
        }
    }

    /// `GameFinished` for a terminal `session`.
    pub fn game_finished(session: &GameSession) -> Self {
        DomainEvent::GameFinished {
            game_id: session.id,
            version: session.version,
            status: session.status,
            winner_id: session.winner_id,
            winner_symbol: session.winner_symbol,
        }
    }

    /// `TurnTimer` for the player on turn in `session`.
    pub fn turn_timer(session: &GameSession, remaining_seconds: u64) -> Self {
        DomainEvent::TurnTimer {
            game_id: session.id,
            version: session.version,
            remaining_seconds,
            turn: session.turn,
        }
    }

    /// Game the event belongs to.
    pub fn game_id(&self) -> GameId {
        match self {
            DomainEvent::MatchFormed { game_id, .. }
            | DomainEvent::MoveApplied { game_id, .. }
            | DomainEvent::GameFinished { game_id, .. }
            | DomainEvent::TurnTimer { game_id, .. } => *game_id,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::MatchFormed { .. } => "match_formed",
            DomainEvent::MoveApplied { .. } => "move_applied",
            DomainEvent::GameFinished { .. } => "game_finished",
            DomainEvent::TurnTimer { .. } => "timer_update",
        }
    }
}

/// Events staged by one unit of work, discarded unless released after commit.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<DomainEvent>,
}

impl Outbox {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an event.
    pub fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Number of staged events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Hand the staged events to the bridge. Call only after the store committed.
    pub fn release(mut self, bridge: &EventBridge) {
        for event in mem::take(&mut self.events) {
            bridge.enqueue(event);
        }
    }
}

impl Drop for Outbox {
    fn drop(&mut self) {
        if !self.events.is_empty() {
            debug!(
                count = self.events.len(),
                "discarding events of an uncommitted change"
            );
        }
    }
}

/// Sending half of the ordered post-commit channel.
#[derive(Clone)]
pub struct EventBridge {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl EventBridge {
    /// Create the bridge and the receiver its dispatcher drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn enqueue(&self, event: DomainEvent) {
        if let Err(err) = self.sender.send(event) {
            warn!(event = err.0.name(), game_id = %err.0.game_id(), "event dispatcher stopped; dropping event");
        }
    }
}

/// Drain committed events into the broadcaster until every bridge handle is gone.
pub async fn run_dispatcher(
    mut receiver: mpsc::UnboundedReceiver<DomainEvent>,
    broadcaster: Arc<NotificationBroadcaster>,
) {
    while let Some(event) = receiver.recv().await {
        broadcaster.publish(&event);
    }
    debug!("event dispatcher finished");
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::state::{board::Placement, state_machine::GameEvent};

    fn finished(game_id: GameId, version: u64) -> DomainEvent {
        DomainEvent::GameFinished {
            game_id,
            version,
            status: GameStatus::FinishedDraw,
            winner_id: None,
            winner_symbol: None,
        }
    }

    #[test]
    fn dropped_outbox_never_reaches_the_bridge() {
        let (bridge, mut receiver) = EventBridge::new();
        let mut outbox = Outbox::new();
        outbox.record(finished(Uuid::new_v4(), 1));
        drop(outbox);
        drop(bridge);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn released_events_keep_their_order() {
        let (bridge, mut receiver) = EventBridge::new();
        let game_id = Uuid::new_v4();
        let mut outbox = Outbox::new();
        for version in 1..=3 {
            outbox.record(finished(game_id, version));
        }
        assert_eq!(outbox.len(), 3);
        outbox.release(&bridge);

        for version in 1..=3 {
            assert_eq!(receiver.try_recv().unwrap(), finished(game_id, version));
        }
    }

    #[test]
    fn forfeit_names_the_remaining_player() {
        let session = GameSession::new_match(Uuid::new_v4(), 3, 1, 2, SystemTime::now()).unwrap();
        let finished = session
            .plan_finish(GameEvent::Forfeit { loser: Symbol::O }, SystemTime::now())
            .unwrap();
        match DomainEvent::game_finished(&finished) {
            DomainEvent::GameFinished {
                winner_id, version, ..
            } => {
                assert_eq!(winner_id, Some(1));
                assert_eq!(version, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn move_applied_reports_no_turn_after_finish() {
        let mut session = GameSession::new_match(Uuid::new_v4(), 3, 1, 2, SystemTime::now()).unwrap();
        let script = [
            (1, 0, 0, Symbol::X),
            (2, 1, 0, Symbol::O),
            (1, 0, 1, Symbol::X),
            (2, 1, 1, Symbol::O),
        ];
        for (player, row, col, symbol) in script {
            let planned = session
                .plan_move(Some(player), Placement { row, col, symbol }, SystemTime::now())
                .unwrap();
            match DomainEvent::move_applied(&planned.session, &planned.record) {
                DomainEvent::MoveApplied { next_turn, .. } => {
                    assert_eq!(next_turn, Some(symbol.opponent()))
                }
                other => panic!("unexpected event: {other:?}"),
            }
            session = planned.session;
        }

        let winning = session
            .plan_move(Some(1), Placement { row: 0, col: 2, symbol: Symbol::X }, SystemTime::now())
            .unwrap();
        assert!(winning.session.status.is_terminal());
        match DomainEvent::move_applied(&winning.session, &winning.record) {
            DomainEvent::MoveApplied {
                next_turn, version, ..
            } => {
                assert_eq!(next_turn, None);
                assert_eq!(version, 5);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
