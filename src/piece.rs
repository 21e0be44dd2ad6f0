//! Active falling piece logic

use crate::board::{Board, BOARD_WIDTH};
use crate::tetromino::{PieceKind, Shape};

/// Offsets tried, in order, when a rotation collides
pub const ROTATION_KICKS: [(i32, i32); 6] = [(0, 0), (-1, 0), (1, 0), (0, -1), (-2, 0), (2, 0)];

/// A falling (or queued) piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub kind: PieceKind,
    /// Current rotation state
    pub shape: Shape,
    /// Board column of the matrix's left edge
    pub x: i32,
    /// Board row of the matrix's top edge, negative while in the hidden buffer
    pub y: i32,
}

impl Piece {
    /// Create a piece at its spawn position: horizontally centered, with the
    /// matrix's bottom row on row 0 so it enters from above.
    pub fn spawn(kind: PieceKind) -> Self {
        let shape = kind.base_shape();
        let size = shape.size() as i32;
        Self {
            kind,
            shape,
            x: BOARD_WIDTH as i32 / 2 - (size + 1) / 2,
            y: -(size - 1),
        }
    }

    /// Board coordinates (row, col) of every occupied cell
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.shape.occupied().map(|(r, c)| (self.y + r, self.x + c))
    }

    /// Whether any occupied cell sits above the visible board
    pub fn is_above_board(&self) -> bool {
        self.cells().any(|(row, _)| row < 0)
    }

    /// Try to translate, returns true if successful
    pub fn try_move(&mut self, dx: i32, dy: i32, board: &Board) -> bool {
        if board.collides(&self.shape, self.x + dx, self.y + dy) {
            return false;
        }
        self.x += dx;
        self.y += dy;
        true
    }

    /// Rotate clockwise, committing at the first kick offset that fits.
    /// Returns the offset used, or None if every kick collided.
    pub fn try_rotate(&mut self, board: &Board) -> Option<(i32, i32)> {
        let rotated = self.shape.rotate_cw();
        self.try_place(rotated, board)
    }

    /// Swap in another kind's base shape at the current position, kicked the
    /// same way a rotation is. Returns false and leaves the piece untouched if
    /// nothing fits.
    pub fn try_replace(&mut self, kind: PieceKind, board: &Board) -> bool {
        if self.try_place(kind.base_shape(), board).is_some() {
            self.kind = kind;
            true
        } else {
            false
        }
    }

    fn try_place(&mut self, shape: Shape, board: &Board) -> Option<(i32, i32)> {
        let (dx, dy) = ROTATION_KICKS
            .into_iter()
            .find(|&(dx, dy)| !board.collides(&shape, self.x + dx, self.y + dy))?;
        self.shape = shape;
        self.x += dx;
        self.y += dy;
        Some((dx, dy))
    }

    /// Lowest row the piece can fall to from where it is
    pub fn rest_y(&self, board: &Board) -> i32 {
        let mut y = self.y;
        while !board.collides(&self.shape, self.x, y + 1) {
            y += 1;
        }
        y
    }
}
