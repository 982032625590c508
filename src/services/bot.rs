//! Move selection for the practice opponent.

use rand::{Rng, seq::IndexedRandom};

use crate::state::{
    board::{self, Board, Outcome, Placement, Symbol},
    game::BotDifficulty,
};

/// Cell the bot plays as `symbol`, or `None` on a full board.
pub fn choose_move<R>(
    board: &Board,
    symbol: Symbol,
    difficulty: BotDifficulty,
    rng: &mut R,
) -> Option<(usize, usize)>
where
    R: Rng + ?Sized,
{
    let free = board.free_cells();
    if free.is_empty() {
        return None;
    }

    if difficulty != BotDifficulty::Easy {
        if let Some(cell) = completing_cell(board, &free, symbol) {
            return Some(cell);
        }
        if let Some(cell) = completing_cell(board, &free, symbol.opponent()) {
            return Some(cell);
        }
    }

    if difficulty == BotDifficulty::Hard {
        let centre: Vec<_> = centre_cells(board.size())
            .into_iter()
            .filter(|cell| free.contains(cell))
            .collect();
        if let Some(cell) = centre.choose(rng) {
            return Some(*cell);
        }
        let last = board.size() - 1;
        let corners: Vec<_> = [(0, 0), (0, last), (last, 0), (last, last)]
            .into_iter()
            .filter(|cell| free.contains(cell))
            .collect();
        if let Some(cell) = corners.choose(rng) {
            return Some(*cell);
        }
    }

    free.choose(rng).copied()
}

/// First free cell that would complete a line for `symbol`.
fn completing_cell(board: &Board, free: &[(usize, usize)], symbol: Symbol) -> Option<(usize, usize)> {
    free.iter().copied().find(|&(row, col)| {
        let placement = Placement {
            row: row as i32,
            col: col as i32,
            symbol,
        };
        matches!(
            board::apply(board, placement, symbol),
            Ok((_, Outcome::Win(_)))
        )
    })
}

/// The middle cell of odd boards, the middle four of even ones.
fn centre_cells(size: usize) -> Vec<(usize, usize)> {
    let half = size / 2;
    if size % 2 == 1 {
        vec![(half, half)]
    } else {
        vec![
            (half - 1, half - 1),
            (half - 1, half),
            (half, half - 1),
            (half, half),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(size: usize, cells: &[(usize, usize, Symbol)]) -> Board {
        let mut board = Board::new(size);
        for &(row, col, symbol) in cells {
            // Expected turn follows the cell so any occupancy pattern can be set up.
            let placement = Placement {
                row: row as i32,
                col: col as i32,
                symbol,
            };
            board = board::apply(&board, placement, symbol).unwrap().0;
        }
        board
    }

    #[test]
    fn medium_takes_the_win_before_blocking() {
        let board = board_with(
            3,
            &[
                (0, 0, Symbol::O),
                (0, 1, Symbol::O),
                (1, 0, Symbol::X),
                (1, 1, Symbol::X),
            ],
        );
        let mut rng = rand::rng();
        assert_eq!(
            choose_move(&board, Symbol::O, BotDifficulty::Medium, &mut rng),
            Some((0, 2))
        );
    }

    #[test]
    fn medium_blocks_an_immediate_threat() {
        let board = board_with(3, &[(2, 0, Symbol::X), (2, 1, Symbol::X), (0, 0, Symbol::O)]);
        let mut rng = rand::rng();
        assert_eq!(
            choose_move(&board, Symbol::O, BotDifficulty::Medium, &mut rng),
            Some((2, 2))
        );
    }

    #[test]
    fn hard_opens_in_the_centre_then_corners() {
        let mut rng = rand::rng();
        assert_eq!(
            choose_move(&Board::new(5), Symbol::X, BotDifficulty::Hard, &mut rng),
            Some((2, 2))
        );

        let board = board_with(3, &[(1, 1, Symbol::X)]);
        let cell = choose_move(&board, Symbol::O, BotDifficulty::Hard, &mut rng).unwrap();
        assert!([(0, 0), (0, 2), (2, 0), (2, 2)].contains(&cell));
    }

    #[test]
    fn easy_always_picks_a_free_cell() {
        let board = board_with(3, &[(0, 0, Symbol::X), (1, 1, Symbol::O)]);
        let mut rng = rand::rng();
        for _ in 0..50 {
            let cell = choose_move(&board, Symbol::X, BotDifficulty::Easy, &mut rng).unwrap();
            assert!(board.get(cell.0, cell.1).is_none());
        }
    }

    #[test]
    fn full_board_has_no_move() {
        let mut board = Board::new(1);
        board = board::apply(
            &board,
            Placement {
                row: 0,
                col: 0,
                symbol: Symbol::X,
            },
            Symbol::X,
        )
        .unwrap()
        .0;
        let mut rng = rand::rng();
        assert_eq!(choose_move(&board, Symbol::O, BotDifficulty::Hard, &mut rng), None);
    }
}
