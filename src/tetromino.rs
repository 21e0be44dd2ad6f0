//! Piece kinds and their shape matrices
//!
//! Each kind has exactly one stored base matrix. Every other rotation state is
//! derived from the current one with [`Shape::rotate_cw`].

use ratatui::style::Color;

/// Largest shape side (the I piece)
pub const MAX_SHAPE_SIZE: usize = 4;

/// The 7 piece kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceKind {
    I, // Cyan - long bar
    J, // Blue
    L, // Orange
    O, // Yellow - square
    S, // Green
    T, // Purple
    Z, // Red
}

impl PieceKind {
    /// Get the color for this kind
    pub fn color(&self) -> Color {
        match self {
            PieceKind::I => Color::Rgb(0x00, 0xe5, 0xff),
            PieceKind::J => Color::Rgb(0x22, 0x33, 0xff),
            PieceKind::L => Color::Rgb(0xff, 0x97, 0x00),
            PieceKind::O => Color::Rgb(0xff, 0xd4, 0x00),
            PieceKind::S => Color::Rgb(0x00, 0xd9, 0x44),
            PieceKind::T => Color::Rgb(0xb1, 0x3c, 0xff),
            PieceKind::Z => Color::Rgb(0xff, 0x3b, 0x3b),
        }
    }

    /// All kinds, in catalog order
    pub fn all() -> [PieceKind; 7] {
        [
            PieceKind::I,
            PieceKind::J,
            PieceKind::L,
            PieceKind::O,
            PieceKind::S,
            PieceKind::T,
            PieceKind::Z,
        ]
    }

    /// The spawn orientation for this kind
    pub fn base_shape(&self) -> Shape {
        match self {
            PieceKind::I => Shape::from_rows(&[
                &[0, 0, 0, 0],
                &[1, 1, 1, 1],
                &[0, 0, 0, 0],
                &[0, 0, 0, 0],
            ]),
            PieceKind::J => Shape::from_rows(&[&[1, 0, 0], &[1, 1, 1], &[0, 0, 0]]),
            PieceKind::L => Shape::from_rows(&[&[0, 0, 1], &[1, 1, 1], &[0, 0, 0]]),
            PieceKind::O => Shape::from_rows(&[&[1, 1], &[1, 1]]),
            PieceKind::S => Shape::from_rows(&[&[0, 1, 1], &[1, 1, 0], &[0, 0, 0]]),
            PieceKind::T => Shape::from_rows(&[&[0, 1, 0], &[1, 1, 1], &[0, 0, 0]]),
            PieceKind::Z => Shape::from_rows(&[&[1, 1, 0], &[0, 1, 1], &[0, 0, 0]]),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PieceKind::I => "I",
            PieceKind::J => "J",
            PieceKind::L => "L",
            PieceKind::O => "O",
            PieceKind::S => "S",
            PieceKind::T => "T",
            PieceKind::Z => "Z",
        }
    }
}

/// A square occupancy matrix for one rotation state
///
/// Only the top-left `size × size` corner of `cells` is meaningful; the rest
/// stays `false`, so two shapes of the same kind compare equal iff their
/// occupied cells match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    size: usize,
    cells: [[bool; MAX_SHAPE_SIZE]; MAX_SHAPE_SIZE],
}

impl Shape {
    fn from_rows(rows: &[&[u8]]) -> Self {
        let mut cells = [[false; MAX_SHAPE_SIZE]; MAX_SHAPE_SIZE];
        for (r, row) in rows.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                cells[r][c] = v != 0;
            }
        }
        Self {
            size: rows.len(),
            cells,
        }
    }

    /// Side length N of the matrix
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_filled(&self, row: usize, col: usize) -> bool {
        row < self.size && col < self.size && self.cells[row][col]
    }

    /// Occupied cells as (row, col) offsets from the matrix's top-left corner
    pub fn occupied(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (0..self.size).flat_map(move |r| {
            (0..self.size)
                .filter(move |&c| self.cells[r][c])
                .map(move |c| (r as i32, c as i32))
        })
    }

    /// 90° clockwise rotation: `result[x][N-1-y] = self[y][x]`
    pub fn rotate_cw(&self) -> Shape {
        let n = self.size;
        let mut cells = [[false; MAX_SHAPE_SIZE]; MAX_SHAPE_SIZE];
        for y in 0..n {
            for x in 0..n {
                cells[x][n - 1 - y] = self.cells[y][x];
            }
        }
        Shape { size: n, cells }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_sizes() {
        assert_eq!(PieceKind::O.base_shape().size(), 2);
        assert_eq!(PieceKind::I.base_shape().size(), 4);
        for kind in [PieceKind::J, PieceKind::L, PieceKind::S, PieceKind::T, PieceKind::Z] {
            assert_eq!(kind.base_shape().size(), 3);
        }
    }

    #[test]
    fn test_every_kind_has_four_cells() {
        for kind in PieceKind::all() {
            assert_eq!(kind.base_shape().occupied().count(), 4, "{}", kind.name());
        }
    }

    #[test]
    fn test_four_rotations_return_to_base() {
        for kind in PieceKind::all() {
            let base = kind.base_shape();
            let spun = base.rotate_cw().rotate_cw().rotate_cw().rotate_cw();
            assert_eq!(spun, base, "{}", kind.name());
        }
    }

    #[test]
    fn test_i_rotates_to_vertical_column_two() {
        let vertical = PieceKind::I.base_shape().rotate_cw();
        let cells: Vec<_> = vertical.occupied().collect();
        assert_eq!(cells, vec![(0, 2), (1, 2), (2, 2), (3, 2)]);
    }

    #[test]
    fn test_t_rotates_clockwise() {
        // .T.      .T.
        // TTT  ->  .TT
        // ...      .T.
        let rotated = PieceKind::T.base_shape().rotate_cw();
        let cells: Vec<_> = rotated.occupied().collect();
        assert_eq!(cells, vec![(0, 1), (1, 1), (1, 2), (2, 1)]);
    }
}
