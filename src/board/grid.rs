//! Grid storage and stable piece identifiers.
//!
//! The grid holds `PieceId`s rather than piece data: a multi-cell piece is
//! referenced from every cell of its footprint, so "which piece occupies this
//! cell" is an identifier lookup into the board's arena. Ids are allocated
//! monotonically per board and never reused.

use serde::Serialize;

/// Stable identifier for a piece within one board's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PieceId(pub(crate) u32);

/// A cell coordinate. Row 0 is the bottom of the board, column 0 the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Pos {
    pub row: usize,
    pub col: usize,
}

impl Pos {
    pub const fn new(row: usize, col: usize) -> Self {
        Pos { row, col }
    }
}

/// Footprint dimensions in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Size {
    pub height: usize,
    pub width: usize,
}

impl Size {
    pub const ZERO: Size = Size { height: 0, width: 0 };

    pub const fn new(height: usize, width: usize) -> Self {
        Size { height, width }
    }

    /// A single-cell footprint.
    pub const fn unit() -> Self {
        Size { height: 1, width: 1 }
    }

    /// True for (0, 0), the "incapable of this operation" sentinel.
    pub fn is_zero(&self) -> bool {
        self.height == 0 || self.width == 0
    }
}

/// Iterates the cells of a rectangle anchored at `pos`, row-major from the
/// bottom-left corner.
pub fn footprint(pos: Pos, size: Size) -> impl Iterator<Item = Pos> {
    (pos.row..pos.row + size.height)
        .flat_map(move |row| (pos.col..pos.col + size.width).map(move |col| Pos { row, col }))
}

/// Rectangular cell storage, row-major, with nullable piece references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    height: usize,
    width: usize,
    cells: Vec<Option<PieceId>>,
}

impl Grid {
    /// Creates an empty grid of the given dimensions.
    pub fn new(height: usize, width: usize) -> Self {
        Grid {
            height,
            width,
            cells: vec![None; height * width],
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width
    }

    fn idx(&self, row: usize, col: usize) -> usize {
        debug_assert!(self.in_bounds(row, col));
        row * self.width + col
    }

    /// Returns the occupant of an in-bounds cell, or `None` if empty.
    pub fn get(&self, row: usize, col: usize) -> Option<PieceId> {
        self.cells[self.idx(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: Option<PieceId>) {
        let idx = self.idx(row, col);
        self.cells[idx] = value;
    }

    /// Distinct occupants of one column, bottom to top by first appearance.
    pub fn column_pieces(&self, col: usize) -> Vec<PieceId> {
        let mut ids = Vec::new();
        for row in 0..self.height {
            if let Some(id) = self.get(row, col) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}
