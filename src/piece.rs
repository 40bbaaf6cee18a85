//! Piece geometry: shape matrices and anchored pieces
//!
//! A piece knows nothing about the board. Movement validity is the
//! simulation's business; this module only does geometry.

use crate::tetromino::TetrominoType;

/// A boolean occupancy matrix, `cells[row][col]`, row 0 on top
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    cells: Vec<Vec<bool>>,
}

impl Shape {
    /// Build a shape from rows. All rows must have the same length.
    pub fn from_rows(cells: Vec<Vec<bool>>) -> Self {
        debug_assert!(cells.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { cells }
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// Offsets `(dx, dy)` of every filled cell
    pub fn filled_cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.cells.iter().enumerate().flat_map(|(dy, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, filled)| *filled)
                .map(move |(dx, _)| (dx as i32, dy as i32))
        })
    }

    /// A new matrix rotated 90 degrees clockwise.
    /// rows x cols becomes cols x rows: transpose, then reverse each row.
    pub fn rotated_clockwise(&self) -> Shape {
        let (rows, cols) = (self.rows(), self.cols());
        let mut rotated = vec![vec![false; rows]; cols];
        for (i, row) in self.cells.iter().enumerate() {
            for (j, &filled) in row.iter().enumerate() {
                rotated[j][i] = filled;
            }
        }
        for row in &mut rotated {
            row.reverse();
        }
        Shape { cells: rotated }
    }
}

/// An anchored piece. `(x, y)` is the board position of the shape's
/// top-left cell; `y` may be negative while the piece is above the ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub piece_type: TetrominoType,
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    /// A piece of the given type in spawn orientation at the origin
    pub fn new(piece_type: TetrominoType) -> Self {
        Self {
            piece_type,
            shape: piece_type.shape(),
            x: 0,
            y: 0,
        }
    }

    /// Absolute board positions `(x, y)` of every filled cell
    pub fn block_positions(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.shape
            .filled_cells()
            .map(|(dx, dy)| (self.x + dx, self.y + dy))
    }

    pub fn rotate_clockwise(&mut self) {
        self.shape = self.shape.rotated_clockwise();
    }

    /// Three clockwise turns; shapes are at most 4x4 so there is no
    /// separate inverse transform.
    pub fn rotate_counter_clockwise(&mut self) {
        for _ in 0..3 {
            self.rotate_clockwise();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_i_changes_dimensions() {
        let mut piece = Piece::new(TetrominoType::I);
        assert_eq!((piece.shape.rows(), piece.shape.cols()), (1, 4));
        piece.rotate_clockwise();
        assert_eq!((piece.shape.rows(), piece.shape.cols()), (4, 1));
    }

    #[test]
    fn test_rotate_t_clockwise() {
        // .T.      T.
        // TTT  ->  TT
        //          T.
        let mut piece = Piece::new(TetrominoType::T);
        piece.rotate_clockwise();
        let expected = Shape::from_rows(vec![
            vec![true, false],
            vec![true, true],
            vec![true, false],
        ]);
        assert_eq!(piece.shape, expected);
    }

    #[test]
    fn test_four_rotations_restore_every_shape() {
        for t in TetrominoType::all() {
            let mut piece = Piece::new(t);
            for _ in 0..4 {
                piece.rotate_clockwise();
            }
            assert_eq!(piece.shape, t.shape(), "{t}");
        }
    }

    #[test]
    fn test_counter_clockwise_undoes_clockwise() {
        for t in TetrominoType::all() {
            let mut piece = Piece::new(t);
            piece.rotate_clockwise();
            piece.rotate_counter_clockwise();
            assert_eq!(piece.shape, t.shape(), "{t}");
        }
    }

    #[test]
    fn test_clone_does_not_alias_shape() {
        let preview = Piece::new(TetrominoType::L);
        let mut active = preview.clone();
        active.rotate_clockwise();
        assert_eq!(preview.shape, TetrominoType::L.shape());
        assert_ne!(active.shape, preview.shape);
    }

    #[test]
    fn test_block_positions_are_translated() {
        let mut piece = Piece::new(TetrominoType::O);
        piece.x = 4;
        piece.y = -1;
        let positions: Vec<_> = piece.block_positions().collect();
        assert_eq!(positions, vec![(4, -1), (5, -1), (4, 0), (5, 0)]);
    }
}
