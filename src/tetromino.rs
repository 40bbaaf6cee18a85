//! Tetromino definitions and base shapes
//!
//! All 7 canonical tetrominoes in their spawn orientation. Shapes are written
//! top row first, so row 0 of a matrix is the highest row of the piece.

use serde::{Deserialize, Serialize};

use crate::piece::Shape;

/// Number of distinct piece types; board cell ids live in `0..=TYPE_COUNT`
pub const TYPE_COUNT: u8 = 7;

/// The 7 tetromino types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TetrominoType {
    I, // long bar
    O, // square
    T,
    S,
    Z,
    J,
    L,
}

impl TetrominoType {
    /// Get all tetromino types, in id order
    pub fn all() -> [TetrominoType; 7] {
        [
            TetrominoType::I,
            TetrominoType::O,
            TetrominoType::T,
            TetrominoType::S,
            TetrominoType::Z,
            TetrominoType::J,
            TetrominoType::L,
        ]
    }

    /// Cell id written into the board for this type (1..=7, 0 is empty).
    /// Only used by renderers to pick a color.
    pub fn id(&self) -> u8 {
        match self {
            TetrominoType::I => 1,
            TetrominoType::O => 2,
            TetrominoType::T => 3,
            TetrominoType::S => 4,
            TetrominoType::Z => 5,
            TetrominoType::J => 6,
            TetrominoType::L => 7,
        }
    }

    /// Inverse of [`TetrominoType::id`]
    pub fn from_id(id: u8) -> Option<TetrominoType> {
        match id {
            1..=TYPE_COUNT => Some(Self::all()[(id - 1) as usize]),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TetrominoType::I => "I",
            TetrominoType::O => "O",
            TetrominoType::T => "T",
            TetrominoType::S => "S",
            TetrominoType::Z => "Z",
            TetrominoType::J => "J",
            TetrominoType::L => "L",
        }
    }

    /// Spawn-orientation shape as a fresh matrix
    pub fn shape(&self) -> Shape {
        // 1 = filled
        let rows: &[&[u8]] = match self {
            TetrominoType::I => &[&[1, 1, 1, 1]],
            TetrominoType::O => &[&[1, 1], &[1, 1]],
            TetrominoType::T => &[&[0, 1, 0], &[1, 1, 1]],
            TetrominoType::S => &[&[0, 1, 1], &[1, 1, 0]],
            TetrominoType::Z => &[&[1, 1, 0], &[0, 1, 1]],
            TetrominoType::J => &[&[1, 0, 0], &[1, 1, 1]],
            TetrominoType::L => &[&[0, 0, 1], &[1, 1, 1]],
        };
        Shape::from_rows(
            rows.iter()
                .map(|row| row.iter().map(|&c| c != 0).collect())
                .collect(),
        )
    }
}

impl std::fmt::Display for TetrominoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip_and_stay_in_range() {
        for t in TetrominoType::all() {
            assert!((1..=TYPE_COUNT).contains(&t.id()));
            assert_eq!(TetrominoType::from_id(t.id()), Some(t));
        }
        assert_eq!(TetrominoType::from_id(0), None);
        assert_eq!(TetrominoType::from_id(8), None);
    }

    #[test]
    fn test_every_shape_has_four_cells() {
        for t in TetrominoType::all() {
            assert_eq!(t.shape().filled_cells().count(), 4, "{t}");
        }
    }
}
