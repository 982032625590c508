//! Per-board-size waiting lists and the pure pairing pass run over them.

use std::{
    collections::{HashSet, VecDeque},
    time::{Duration, Instant, SystemTime},
};

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::game::{GameId, PlayerId};

/// Lifecycle of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Entry sits in its bucket.
    Waiting,
    /// Entry was paired and left the bucket.
    Matched,
    /// Entry was withdrawn.
    Cancelled,
}

/// Result of a pairing, attached to the matched entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRef {
    /// The other player of the pairing.
    pub opponent_id: PlayerId,
    /// Game created for the pairing.
    pub game_id: GameId,
}

/// A player's pending request to play at a given board size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Waiting player.
    pub player_id: PlayerId,
    /// Requested board size.
    pub board_size: usize,
    /// Skill score captured at join time.
    pub score: i32,
    /// Monotonic join instant, drives ordering and tolerance.
    pub joined_at: Instant,
    /// Wall-clock join time for clients.
    pub joined_at_wall: SystemTime,
    /// Current status.
    pub status: QueueStatus,
    /// Pairing result once matched.
    pub match_ref: Option<MatchRef>,
}

/// Maximum score gap accepted for a pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceBand {
    /// Gap must not exceed the given number of points.
    Within(u32),
    /// Any gap is accepted.
    Unbounded,
}

impl ToleranceBand {
    /// Whether a score gap of `gap` fits in the band.
    pub fn admits(self, gap: u32) -> bool {
        match self {
            ToleranceBand::Within(limit) => gap <= limit,
            ToleranceBand::Unbounded => true,
        }
    }
}

/// Widening policy mapping time spent waiting to a tolerance band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TolerancePolicy {
    /// Band granted on join.
    pub base: u32,
    /// Points added per second of waiting.
    pub growth_per_sec: f64,
    /// Wait after which the band becomes unbounded.
    pub max_wait: Duration,
}

impl TolerancePolicy {
    /// Band granted after waiting `waited`. Never narrows as `waited` grows.
    pub fn band(&self, waited: Duration) -> ToleranceBand {
        if waited >= self.max_wait {
            return ToleranceBand::Unbounded;
        }
        let grown = f64::from(self.base) + self.growth_per_sec.max(0.0) * waited.as_secs_f64();
        if grown >= f64::from(u32::MAX) {
            ToleranceBand::Unbounded
        } else {
            ToleranceBand::Within(grown.floor() as u32)
        }
    }
}

/// Ordered set of waiting entries for one board size.
#[derive(Debug)]
pub struct MatchmakingBucket {
    board_size: usize,
    entries: IndexMap<PlayerId, QueueEntry>,
    recent_matches: VecDeque<Instant>,
}

impl MatchmakingBucket {
    /// Create an empty bucket.
    pub fn new(board_size: usize) -> Self {
        Self {
            board_size,
            entries: IndexMap::new(),
            recent_matches: VecDeque::new(),
        }
    }

    /// Board size served by this bucket.
    pub fn board_size(&self) -> usize {
        self.board_size
    }

    /// Number of waiting entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Waiting entry of `player`, if any.
    pub fn get(&self, player: PlayerId) -> Option<&QueueEntry> {
        self.entries.get(&player)
    }

    /// Add `player` unless already waiting. Returns the entry and whether it was created.
    pub fn join(&mut self, player: PlayerId, score: i32, now: Instant) -> (QueueEntry, bool) {
        if let Some(existing) = self.entries.get(&player) {
            return (existing.clone(), false);
        }

        let entry = QueueEntry {
            player_id: player,
            board_size: self.board_size,
            score,
            joined_at: now,
            joined_at_wall: SystemTime::now(),
            status: QueueStatus::Waiting,
            match_ref: None,
        };
        self.entries.insert(player, entry.clone());
        (entry, true)
    }

    /// Withdraw `player`. Absent players are ignored.
    pub fn cancel(&mut self, player: PlayerId) -> Option<QueueEntry> {
        self.entries.shift_remove(&player).map(|mut entry| {
            entry.status = QueueStatus::Cancelled;
            entry
        })
    }

    /// Remove a paired entry, stamping it with its match.
    pub fn take_matched(&mut self, player: PlayerId, match_ref: MatchRef) -> Option<QueueEntry> {
        self.entries.shift_remove(&player).map(|mut entry| {
            entry.status = QueueStatus::Matched;
            entry.match_ref = Some(match_ref);
            entry
        })
    }

    /// Pairs formed by one matching pass, in join order of the earlier entry.
    ///
    /// Each unmatched entry takes the closest-score unmatched entry admitted by its own band,
    /// the earlier joiner winning ties. The bucket itself is left untouched.
    pub fn find_pairs(&self, policy: &TolerancePolicy, now: Instant) -> Vec<(PlayerId, PlayerId)> {
        let mut taken = HashSet::new();
        let mut pairs = Vec::new();

        for (index, entry) in self.entries.values().enumerate() {
            if taken.contains(&entry.player_id) {
                continue;
            }
            let band = policy.band(now.saturating_duration_since(entry.joined_at));

            let best = self
                .entries
                .values()
                .skip(index + 1)
                .filter(|candidate| !taken.contains(&candidate.player_id))
                .map(|candidate| (candidate, entry.score.abs_diff(candidate.score)))
                .filter(|(_, gap)| band.admits(*gap))
                .fold(None::<(&QueueEntry, u32)>, |best, (candidate, gap)| match best {
                    Some((_, best_gap)) if best_gap <= gap => best,
                    _ => Some((candidate, gap)),
                });

            if let Some((partner, _)) = best {
                taken.insert(entry.player_id);
                taken.insert(partner.player_id);
                pairs.push((entry.player_id, partner.player_id));
            }
        }

        pairs
    }

    /// Remember that a pairing happened at `now`, forgetting pairings older than `window`.
    pub fn record_match(&mut self, now: Instant, window: Duration) {
        self.recent_matches.push_back(now);
        self.prune(now, window);
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while self
            .recent_matches
            .front()
            .is_some_and(|at| now.saturating_duration_since(*at) > window)
        {
            self.recent_matches.pop_front();
        }
    }

    /// Advisory wait for `player` (or a newcomer when absent) from recent match rate and depth.
    pub fn estimated_wait(
        &mut self,
        player: Option<PlayerId>,
        now: Instant,
        window: Duration,
        fallback: Duration,
    ) -> Duration {
        self.prune(now, window);

        let position = player
            .and_then(|id| self.entries.get_index_of(&id))
            .map(|index| index + 1)
            .unwrap_or(self.entries.len() + 1);

        let matches = self.recent_matches.len();
        if matches == 0 || window.is_zero() {
            return fallback;
        }

        let pairs_ahead = position.div_ceil(2) as f64;
        let secs = pairs_ahead * window.as_secs_f64() / matches as f64;
        Duration::from_secs_f64(secs.max(1.0))
    }
}
