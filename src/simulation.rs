//! Board + piece mechanics, without score or level bookkeeping
//!
//! Locking only writes cells and clears the active piece. Line clearing and
//! respawn are separate steps driven by the owning session, so scoring can
//! happen in between.

use crate::board::Board;
use crate::piece::Piece;
use crate::randomizer::Randomizer;
use crate::tetromino::TetrominoType;

/// Grid plus active and preview pieces
#[derive(Debug, Clone)]
pub struct Simulation {
    board: Board,
    /// None only between a lock and the next spawn
    active: Option<Piece>,
    preview: Piece,
    randomizer: Randomizer,
}

impl Simulation {
    /// Empty board with a preview piece ready. Call [`Simulation::spawn`]
    /// to bring in the first active piece.
    pub fn new(width: usize, height: usize, mut randomizer: Randomizer) -> Self {
        let preview = Piece::new(randomizer.next_type());
        Self {
            board: Board::new(width, height),
            active: None,
            preview,
            randomizer,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn active(&self) -> Option<&Piece> {
        self.active.as_ref()
    }

    pub fn preview(&self) -> &Piece {
        &self.preview
    }

    pub fn active_type(&self) -> Option<TetrominoType> {
        self.active.as_ref().map(|p| p.piece_type)
    }

    /// Promote the preview piece and draw a new preview.
    ///
    /// The piece is centered and its lowest row lands on the top visible
    /// row, anything taller stays hidden above the ceiling. Returns false
    /// when that position is already blocked: the board is full. The
    /// blocked piece is kept as active so the final frame shows it.
    pub fn spawn(&mut self) -> bool {
        let next = Piece::new(self.randomizer.next_type());
        let mut piece = std::mem::replace(&mut self.preview, next);
        piece.x = self.board.width() as i32 / 2 - piece.shape.cols() as i32 / 2;
        piece.y = 1 - piece.shape.rows() as i32;

        let blocked = self.board.collides(piece.x, piece.y, &piece.shape, true);
        self.active = Some(piece);
        !blocked
    }

    pub fn move_left(&mut self) -> bool {
        self.translate(-1, 0)
    }

    pub fn move_right(&mut self) -> bool {
        self.translate(1, 0)
    }

    /// Step down one row. A piece that cannot fall is locked immediately.
    pub fn move_down(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        if self.translate(0, 1) {
            return true;
        }
        self.lock();
        false
    }

    /// Drop until the piece locks
    pub fn hard_drop(&mut self) {
        while self.move_down() {}
    }

    /// Rotate clockwise, trying one column left then one right on collision.
    /// If every candidate collides the piece is turned back.
    pub fn rotate(&mut self) {
        let Some(piece) = self.active.as_mut() else {
            return;
        };
        piece.rotate_clockwise();
        if !self.board.collides(piece.x, piece.y, &piece.shape, true) {
            return;
        }
        for kick in [-1, 1] {
            if !self.board.collides(piece.x + kick, piece.y, &piece.shape, true) {
                piece.x += kick;
                return;
            }
        }
        piece.rotate_counter_clockwise();
    }

    /// Clear full rows, returning the count
    pub fn clear_lines(&mut self) -> usize {
        self.board.clear_full_rows()
    }

    /// Board ids with the active piece merged in
    pub fn render(&self) -> Vec<Vec<u8>> {
        self.board.render(self.active.as_ref())
    }

    fn translate(&mut self, dx: i32, dy: i32) -> bool {
        let Some(piece) = self.active.as_mut() else {
            return false;
        };
        if self
            .board
            .collides(piece.x + dx, piece.y + dy, &piece.shape, true)
        {
            return false;
        }
        piece.x += dx;
        piece.y += dy;
        true
    }

    fn lock(&mut self) {
        if let Some(piece) = self.active.take() {
            self.board.lock(&piece);
        }
    }

    #[cfg(test)]
    pub(crate) fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    #[cfg(test)]
    pub(crate) fn set_active(&mut self, piece: Option<Piece>) {
        self.active = piece;
    }
}
