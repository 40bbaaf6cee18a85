//! Game board representation and collision detection

use crate::piece::{Piece, Shape};
use crate::tetromino::TetrominoType;

/// Standard board dimensions
pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;

/// A cell on the board - either empty or filled by a piece type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Filled(TetrominoType),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Cell::Filled(_))
    }

    /// Render id: 0 for empty, the piece type id otherwise
    pub fn id(&self) -> u8 {
        match self {
            Cell::Empty => 0,
            Cell::Filled(t) => t.id(),
        }
    }
}

/// The game board
#[derive(Debug, Clone)]
pub struct Board {
    width: usize,
    height: usize,
    /// Grid stored as [row][col], row 0 is the top visible row
    cells: Vec<Vec<Cell>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BOARD_WIDTH, BOARD_HEIGHT)
    }
}

impl Board {
    /// Create a new empty board. Dimensions are fixed for its lifetime.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![vec![Cell::Empty; width]; height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the cell at (x, y). Returns None if out of bounds.
    pub fn get(&self, x: i32, y: i32) -> Option<Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        self.cells
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
    }

    /// Set a cell. Returns false if out of bounds.
    pub fn set(&mut self, x: i32, y: i32, cell: Cell) -> bool {
        if x < 0 || y < 0 {
            return false;
        }
        match self
            .cells
            .get_mut(y as usize)
            .and_then(|row| row.get_mut(x as usize))
        {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// Would `shape` anchored at (x, y) collide with walls, floor or terrain?
    ///
    /// Rows above the ceiling (negative y) only count as a collision when
    /// `allow_above_ceiling` is false.
    pub fn collides(&self, x: i32, y: i32, shape: &Shape, allow_above_ceiling: bool) -> bool {
        shape.filled_cells().any(|(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || nx >= self.width as i32 {
                return true;
            }
            if ny >= self.height as i32 {
                return true;
            }
            if ny < 0 {
                return !allow_above_ceiling;
            }
            self.cells[ny as usize][nx as usize].is_filled()
        })
    }

    /// Write a piece into the grid. Cells above the ceiling are dropped.
    pub fn lock(&mut self, piece: &Piece) {
        for (x, y) in piece.block_positions() {
            self.set(x, y, Cell::Filled(piece.piece_type));
        }
    }

    /// Remove every full row and return how many were removed.
    ///
    /// Scans bottom to top. After a clear the same index is examined again,
    /// since the row above has just moved into it.
    pub fn clear_full_rows(&mut self) -> usize {
        let mut cleared = 0;
        let mut row = self.height;
        while row > 0 {
            let y = row - 1;
            if self.is_row_full(y) {
                for r in (1..=y).rev() {
                    let (above, below) = self.cells.split_at_mut(r);
                    below[0].copy_from_slice(&above[r - 1]);
                }
                self.cells[0].fill(Cell::Empty);
                cleared += 1;
            } else {
                row -= 1;
            }
        }
        cleared
    }

    /// Check if a row is completely filled
    fn is_row_full(&self, y: usize) -> bool {
        self.cells[y].iter().all(Cell::is_filled)
    }

    /// Check if the board is completely empty
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|row| row.iter().all(Cell::is_empty))
    }

    /// Id matrix (`[y][x]`) with `piece` merged in, for snapshots
    pub fn render(&self, piece: Option<&Piece>) -> Vec<Vec<u8>> {
        let mut ids: Vec<Vec<u8>> = self
            .cells
            .iter()
            .map(|row| row.iter().map(Cell::id).collect())
            .collect();
        if let Some(piece) = piece {
            let id = piece.piece_type.id();
            for (x, y) in piece.block_positions() {
                if (0..self.width as i32).contains(&x) && (0..self.height as i32).contains(&y) {
                    ids[y as usize][x as usize] = id;
                }
            }
        }
        ids
    }
}
