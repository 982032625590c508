//! Pure board engine: move validation, placement and terminal outcome detection.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Symbol a player places on the grid. `X` always opens the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Symbol {
    /// First mover.
    X,
    /// Second mover.
    O,
}

impl Symbol {
    /// The symbol expected to move after `self`.
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }
}

/// A candidate move. Coordinates are signed so malformed input can be rejected as out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Zero-based row index.
    pub row: i32,
    /// Zero-based column index.
    pub col: i32,
    /// Symbol being placed.
    pub symbol: Symbol,
}

/// Result of evaluating the board after a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The placed symbol completed a full row, column or diagonal.
    Win(Symbol),
    /// The board is full and nobody completed a line.
    Draw,
    /// Play goes on.
    Continue,
}

/// Reasons the engine refuses a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveRejection {
    /// The symbol does not match the one expected to move.
    #[error("out of turn: expected {expected:?}, got {got:?}")]
    OutOfTurn {
        /// Symbol whose turn it is.
        expected: Symbol,
        /// Symbol that was submitted.
        got: Symbol,
    },
    /// Target cell already holds a symbol.
    #[error("cell ({row}, {col}) is already occupied")]
    CellOccupied {
        /// Row of the target cell.
        row: usize,
        /// Column of the target cell.
        col: usize,
    },
    /// Coordinates fall outside the grid.
    #[error("cell ({row}, {col}) is outside a {size}x{size} board")]
    OutOfBounds {
        /// Submitted row.
        row: i32,
        /// Submitted column.
        col: i32,
        /// Declared board size.
        size: usize,
    },
}

/// Square grid of optional symbols stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<Option<Symbol>>,
}

impl Board {
    /// Create an empty `size`x`size` board.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    /// Declared board dimension.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Symbol at the given cell, `None` when empty or outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<Symbol> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.cells[row * self.size + col]
    }

    /// Number of occupied cells.
    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    /// Whether every cell holds a symbol.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Coordinates of every empty cell, row-major.
    pub fn free_cells(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(index, _)| (index / self.size, index % self.size))
            .collect()
    }

    /// Board as nested rows, the shape sent to clients.
    pub fn rows(&self) -> Vec<Vec<Option<Symbol>>> {
        self.cells
            .chunks(self.size.max(1))
            .map(<[Option<Symbol>]>::to_vec)
            .collect()
    }

    /// Whether placing `symbol` at `(row, col)` would produce a complete line.
    fn completes_line(&self, row: usize, col: usize, symbol: Symbol) -> bool {
        let n = self.size;
        let owns = |r: usize, c: usize| self.get(r, c) == Some(symbol);

        if (0..n).all(|c| owns(row, c)) || (0..n).all(|r| owns(r, col)) {
            return true;
        }
        if row == col && (0..n).all(|i| owns(i, i)) {
            return true;
        }
        row + col == n - 1 && (0..n).all(|i| owns(i, n - 1 - i))
    }
}

/// Validate `placement` against `board` and `expected_turn`, returning the next board and outcome.
///
/// Checks run in order: turn, bounds, occupancy. The input board is never mutated.
pub fn apply(
    board: &Board,
    placement: Placement,
    expected_turn: Symbol,
) -> Result<(Board, Outcome), MoveRejection> {
    if placement.symbol != expected_turn {
        return Err(MoveRejection::OutOfTurn {
            expected: expected_turn,
            got: placement.symbol,
        });
    }

    let size = board.size;
    let (row, col) = match (usize::try_from(placement.row), usize::try_from(placement.col)) {
        (Ok(row), Ok(col)) if row < size && col < size => (row, col),
        _ => {
            return Err(MoveRejection::OutOfBounds {
                row: placement.row,
                col: placement.col,
                size,
            });
        }
    };

    if board.get(row, col).is_some() {
        return Err(MoveRejection::CellOccupied { row, col });
    }

    let mut next = board.clone();
    next.cells[row * size + col] = Some(placement.symbol);

    let outcome = if next.completes_line(row, col, placement.symbol) {
        Outcome::Win(placement.symbol)
    } else if next.is_full() {
        Outcome::Draw
    } else {
        Outcome::Continue
    };

    Ok((next, outcome))
}
