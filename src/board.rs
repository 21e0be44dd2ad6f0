//! Game board representation and collision detection

use crate::tetromino::{PieceKind, Shape};

/// Board dimensions
pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;

/// A cell on the board - either empty or filled by a piece kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Filled(PieceKind),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Cell::Filled(_))
    }
}

pub type Grid = [[Cell; BOARD_WIDTH]; BOARD_HEIGHT];

const EMPTY_ROW: [Cell; BOARD_WIDTH] = [Cell::Empty; BOARD_WIDTH];

/// The locked cells of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Grid stored as [row][col], row 0 is the top edge
    cells: Grid,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Create a new empty board
    pub fn new() -> Self {
        Self {
            cells: [EMPTY_ROW; BOARD_HEIGHT],
        }
    }

    /// Get the cell at (row, col), None if out of bounds
    pub fn get(&self, row: i32, col: i32) -> Option<Cell> {
        if row < 0 || col < 0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= BOARD_HEIGHT || col >= BOARD_WIDTH {
            return None;
        }
        Some(self.cells[row][col])
    }

    /// Set a cell, returns false if out of bounds
    pub fn set(&mut self, row: i32, col: i32, cell: Cell) -> bool {
        if row < 0 || col < 0 {
            return false;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= BOARD_HEIGHT || col >= BOARD_WIDTH {
            return false;
        }
        self.cells[row][col] = cell;
        true
    }

    /// Whether `shape` placed with its top-left corner at (x, y) is illegal.
    ///
    /// Cells above row 0 only check the side walls, so pieces can spawn and
    /// fall through the hidden buffer above the board.
    pub fn collides(&self, shape: &Shape, x: i32, y: i32) -> bool {
        shape.occupied().any(|(r, c)| {
            let (nx, ny) = (x + c, y + r);
            if nx < 0 || nx >= BOARD_WIDTH as i32 || ny >= BOARD_HEIGHT as i32 {
                return true;
            }
            ny >= 0 && self.get(ny, nx).is_some_and(|cell| cell.is_filled())
        })
    }

    /// Write a placed shape's cells. Callers must have checked that every
    /// cell lies on the board.
    pub fn lock_shape(&mut self, shape: &Shape, x: i32, y: i32, kind: PieceKind) {
        for (r, c) in shape.occupied() {
            self.set(y + r, x + c, Cell::Filled(kind));
        }
    }

    /// Remove every full row, shifting the rest down. Returns rows removed.
    pub fn clear_full_rows(&mut self) -> usize {
        let mut write_row = BOARD_HEIGHT;

        // Compact from the bottom up so surviving rows keep their order
        for read_row in (0..BOARD_HEIGHT).rev() {
            if !self.is_row_full(read_row) {
                write_row -= 1;
                if write_row != read_row {
                    self.cells[write_row] = self.cells[read_row];
                }
            }
        }

        for row in 0..write_row {
            self.cells[row] = EMPTY_ROW;
        }

        write_row
    }

    /// Remove one row and prepend an empty row at the top
    pub fn remove_row(&mut self, row: usize) {
        if row >= BOARD_HEIGHT {
            return;
        }
        self.cells.copy_within(0..row, 1);
        self.cells[0] = EMPTY_ROW;
    }

    /// Indices of rows holding at least one filled cell, top to bottom
    pub fn occupied_rows(&self) -> Vec<usize> {
        (0..BOARD_HEIGHT)
            .filter(|&row| self.cells[row].iter().any(Cell::is_filled))
            .collect()
    }

    pub fn is_row_full(&self, row: usize) -> bool {
        self.cells[row].iter().all(Cell::is_filled)
    }

    pub fn is_empty(&self) -> bool {
        self.cells
            .iter()
            .all(|row| row.iter().all(Cell::is_empty))
    }

    #[cfg(test)]
    pub fn filled_count(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|c| c.is_filled()).count())
            .sum()
    }

    /// Copy of the grid with a piece drawn over it. Cells above the board are
    /// dropped.
    pub fn composite(&self, shape: &Shape, x: i32, y: i32, kind: PieceKind) -> Grid {
        let mut grid = self.cells;
        for (r, c) in shape.occupied() {
            let (row, col) = (y + r, x + c);
            if (0..BOARD_HEIGHT as i32).contains(&row) && (0..BOARD_WIDTH as i32).contains(&col) {
                grid[row as usize][col as usize] = Cell::Filled(kind);
            }
        }
        grid
    }
}
