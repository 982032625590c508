//! Skill rating adjustment applied when a game finishes.
//!
//! Ratings follow an Elo-style curve: the expected result of a pairing is derived from the score
//! gap, and the adjustment is `k * (actual - expected)` rounded to the nearest point.

use crate::dao::models::PlayerEntity;

/// Score gap at which the stronger side is expected to win ten times out of eleven.
const RATING_SCALE: f64 = 400.0;

/// Expected result (0..=1) of a player rated `score` against `opponent`.
pub fn expected_result(score: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent - score) / RATING_SCALE))
}

/// New scores for a finished pairing.
///
/// With `outcome_is_draw` the first argument is simply one side of the draw. A win never
/// lowers the winner and a loss never raises the loser; a draw moves both scores toward each
/// other and never past each other.
pub fn settle(
    winner_score: i32,
    loser_score: i32,
    outcome_is_draw: bool,
    k_factor: f64,
) -> (i32, i32) {
    let expected = expected_result(winner_score, loser_score);
    let actual = if outcome_is_draw { 0.5 } else { 1.0 };
    let mut delta = (k_factor.max(0.0) * (actual - expected)).round() as i32;

    if outcome_is_draw {
        // Never swap the ordering of the two players.
        let gap = (winner_score - loser_score).abs() / 2;
        delta = delta.clamp(-gap, gap);
    } else {
        delta = delta.max(0);
    }

    (winner_score + delta, loser_score - delta)
}

/// Clamp a lowered score to `floor` without ever raising it.
pub fn floor_score(previous: i32, next: i32, floor: i32) -> i32 {
    if next >= previous {
        next
    } else {
        next.max(floor.min(previous))
    }
}

/// Apply a settled result to a player record, bumping its counters.
pub fn record_result(player: &mut PlayerEntity, new_score: i32, won: bool, floor: i32) {
    player.score = floor_score(player.score, new_score, floor);
    player.games_played += 1;
    if won {
        player.games_won += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn underdog_gains_more_than_favourite() {
        let (favourite_after, _) = settle(1600, 1200, false, 32.0);
        let (underdog_after, _) = settle(1200, 1600, false, 32.0);
        assert!(underdog_after - 1200 > favourite_after - 1600);
    }

    #[test]
    fn wins_and_losses_are_monotonic() {
        for winner in (0..3000).step_by(137) {
            for loser in (0..3000).step_by(151) {
                for k in [0.0, 16.0, 32.0, 64.0] {
                    let (w, l) = settle(winner, loser, false, k);
                    assert!(w >= winner, "winner {winner} vs {loser} dropped to {w}");
                    assert!(l <= loser, "loser {loser} vs {winner} rose to {l}");
                }
            }
        }
    }

    #[test]
    fn draws_pull_scores_together() {
        for a in (0..3000).step_by(97) {
            for b in (0..3000).step_by(113) {
                let (a2, b2) = settle(a, b, true, 48.0);
                let stronger_gain = if a >= b { a2 - a } else { b2 - b };
                let weaker_gain = if a >= b { b2 - b } else { a2 - a };
                assert!(stronger_gain <= weaker_gain);
                assert!((a2 - b2).abs() <= (a - b).abs());
                if a > b {
                    assert!(a2 >= b2);
                }
            }
        }
    }

    #[test]
    fn equal_draw_changes_nothing() {
        assert_eq!(settle(1200, 1200, true, 32.0), (1200, 1200));
    }

    #[test]
    fn floor_never_raises_a_loser() {
        assert_eq!(floor_score(10, -5, 0), 0);
        assert_eq!(floor_score(-20, -30, 0), -20);
        assert_eq!(floor_score(50, 60, 0), 60);
    }

    #[test]
    fn record_result_updates_counters() {
        let mut player = PlayerEntity::guest(1, 1200);
        record_result(&mut player, 1216, true, 0);
        assert_eq!((player.score, player.games_played, player.games_won), (1216, 1, 1));
        record_result(&mut player, 1200, false, 0);
        assert_eq!((player.score, player.games_played, player.games_won), (1200, 2, 1));
    }
}
