//! Gravity and priority packing.
//!
//! Each column is repacked from the bottom with its occupants sorted by
//! descending slide priority (stable, so equal priorities keep their vertical
//! order). Column-local repacking can tear a multi-column piece apart; a
//! repair pass then realigns every 2x2 piece by shifting the cell blocks of
//! its two columns until the footprint is contiguous again.

use std::cmp::Reverse;

use crate::board::grid::{PieceId, Pos, Size};
use crate::board::Board;
use crate::error::BoardError;

/// Repair iterations before alignment is declared divergent.
const MAX_ALIGN_ATTEMPTS: usize = 100;

impl Board {
    /// One packing pass. Returns true if any cell changed occupant.
    pub(crate) fn shift_by_priority(&mut self) -> Result<bool, BoardError> {
        let before = self.grid.clone();
        let mut fatties = Vec::new();
        for col in 0..self.grid.width() {
            for id in self.repack_column(col) {
                if !fatties.contains(&id) {
                    fatties.push(id);
                }
            }
        }
        self.sync_positions();
        self.align_fatties(&fatties)?;
        Ok(self.grid != before)
    }

    /// Packs one column from row 0 in descending priority order. Returns the
    /// 2x2 pieces encountered, which may need realignment afterwards.
    fn repack_column(&mut self, col: usize) -> Vec<PieceId> {
        let mut ids = self.grid.column_pieces(col);
        ids.sort_by_key(|id| {
            Reverse(self.pieces.get(id).map(|piece| piece.slide_priority).unwrap_or(0))
        });
        for row in 0..self.grid.height() {
            self.grid.set(row, col, None);
        }
        let mut cursor = 0;
        let mut fatties = Vec::new();
        for id in ids {
            let size = match self.pieces.get(&id) {
                Some(piece) => piece.size,
                None => continue,
            };
            for _ in 0..size.height {
                self.grid.set(cursor, col, Some(id));
                cursor += 1;
            }
            if size == Size::new(2, 2) {
                fatties.push(id);
            }
        }
        fatties
    }

    /// Re-derives every piece's anchor from the grid: the first cell of its
    /// id in row-major order.
    pub(crate) fn sync_positions(&mut self) {
        let mut seen: Vec<PieceId> = Vec::new();
        for row in 0..self.grid.height() {
            for col in 0..self.grid.width() {
                if let Some(id) = self.grid.get(row, col) {
                    if !seen.contains(&id) {
                        seen.push(id);
                        if let Some(piece) = self.pieces.get_mut(&id) {
                            piece.position = Some(Pos::new(row, col));
                        }
                    }
                }
            }
        }
    }

    /// Repairs torn 2x2 footprints until all are contiguous, or fails after
    /// a bounded number of rounds.
    fn align_fatties(&mut self, fatties: &[PieceId]) -> Result<(), BoardError> {
        for _ in 0..MAX_ALIGN_ATTEMPTS {
            let mut repaired = false;
            for &id in fatties {
                if self.pieces.contains_key(&id) {
                    repaired |= self.repair_fatty(id)?;
                }
            }
            if !repaired {
                return Ok(());
            }
        }
        Err(BoardError::AlignmentDiverged(
            fatties.last().copied().unwrap_or(PieceId(0)),
        ))
    }

    /// Realigns one 2x2 piece whose columns drifted apart during repacking.
    /// Returns true if anything moved.
    fn repair_fatty(&mut self, id: PieceId) -> Result<bool, BoardError> {
        let size = self
            .pieces
            .get(&id)
            .ok_or(BoardError::NotFound(id))?
            .size;
        // Repacking moves cells only within their column, so the piece still
        // occupies its original pair of columns. Find each column's bottom
        // cell of the footprint.
        let mut left = None;
        let mut left_bottom = 0;
        let mut right_bottom = 0;
        for col in 0..self.grid.width() {
            for row in 0..self.grid.height() {
                if self.grid.get(row, col) == Some(id) {
                    match left {
                        None => {
                            left = Some(col);
                            left_bottom = row;
                        }
                        Some(l) if col == l => {}
                        Some(_) => {
                            right_bottom = row;
                        }
                    }
                    break;
                }
            }
        }
        let left = left.ok_or(BoardError::Unplaced(id))?;
        let right = left + 1;

        if left_bottom == right_bottom {
            return Ok(false);
        }

        // Lift the low side's stack to meet the high side where headroom
        // allows, and drop the high side's block for the remainder.
        let (low_col, low_bottom, high_col, high_bottom) = if right_bottom > left_bottom {
            (left, left_bottom, right, right_bottom)
        } else {
            (right, right_bottom, left, left_bottom)
        };
        let deficit = high_bottom - low_bottom;
        let mut lift = deficit;
        while lift > 0 && !self.can_shift_up(low_col, low_bottom, lift) {
            lift -= 1;
        }
        self.do_shift_up(low_col, low_bottom, lift);
        let drop = deficit - lift;
        if drop > 0 {
            self.do_shift_down(high_col, high_bottom, high_bottom - drop, size.height);
        }
        self.sync_positions();
        Ok(true)
    }

    /// True if the cells of `col` from `from_row` upward can move up by
    /// `delta` rows, which requires the top `delta` cells to be empty.
    pub(crate) fn can_shift_up(&self, col: usize, from_row: usize, delta: usize) -> bool {
        if delta == 0 {
            return true;
        }
        let height = self.grid.height();
        if from_row + delta > height {
            return false;
        }
        (height - delta..height).all(|row| self.grid.get(row, col).is_none())
    }

    /// Moves the cells of `col` from `from_row` upward by `delta` rows,
    /// leaving the vacated cells empty. Callers check `can_shift_up` first.
    pub(crate) fn do_shift_up(&mut self, col: usize, from_row: usize, delta: usize) {
        if delta == 0 {
            return;
        }
        for row in (from_row + delta..self.grid.height()).rev() {
            let below = self.grid.get(row - delta, col);
            self.grid.set(row, col, below);
        }
        for row in from_row..from_row + delta {
            self.grid.set(row, col, None);
        }
    }

    /// Drops the `size`-cell block starting at `old_row` down to `new_row`,
    /// shifting the displaced cells in between up above it.
    pub(crate) fn do_shift_down(&mut self, col: usize, old_row: usize, new_row: usize, size: usize) {
        let moving: Vec<_> = (old_row..old_row + size)
            .map(|row| self.grid.get(row, col))
            .collect();
        let displaced: Vec<_> = (new_row..old_row)
            .map(|row| self.grid.get(row, col))
            .collect();
        for (offset, cell) in moving.into_iter().enumerate() {
            self.grid.set(new_row + offset, col, cell);
        }
        for (offset, cell) in displaced.into_iter().enumerate() {
            self.grid.set(new_row + size + offset, col, cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::piece::{Color, Piece};

    fn unit(priority: i32) -> Piece {
        let mut piece = Piece::base("unit", Size::unit(), Some(Color::Red));
        piece.slide_priority = priority;
        piece
    }

    #[test]
    fn higher_priority_packs_below() {
        let mut board = Board::new(6, 1);
        let low = board.add_piece(unit(0), 0).unwrap();
        let high = board.add_piece(unit(5), 0).unwrap();
        assert!(board.shift_by_priority().unwrap());
        assert_eq!(board.piece_at(0, 0), Some(high));
        assert_eq!(board.piece_at(1, 0), Some(low));
        assert!(board.self_consistent());
    }

    #[test]
    fn equal_priority_keeps_order() {
        let mut board = Board::new(6, 1);
        let first = board.add_piece(unit(3), 0).unwrap();
        let second = board.add_piece(unit(3), 0).unwrap();
        assert!(!board.shift_by_priority().unwrap());
        assert_eq!(board.piece_at(0, 0), Some(first));
        assert_eq!(board.piece_at(1, 0), Some(second));
    }

    #[test]
    fn floating_piece_falls() {
        let mut board = Board::new(6, 1);
        let id = board.add_piece_at(unit(0), 3, 0).unwrap();
        assert!(board.shift_by_priority().unwrap());
        assert_eq!(board.piece(id).unwrap().position, Some(Pos::new(0, 0)));
        assert_eq!(board.piece_at(3, 0), None);
    }

    #[test]
    fn settled_board_reports_no_change() {
        let mut board = Board::new(6, 2);
        board.add_piece(unit(1), 0).unwrap();
        board.add_piece(unit(0), 1).unwrap();
        assert!(!board.shift_by_priority().unwrap());
    }

    #[test]
    fn fatty_stays_contiguous_after_uneven_displacement() {
        let mut board = Board::new(6, 2);
        // One low-priority unit under the left half of the fatty only.
        let under = board.add_piece(unit(0), 0).unwrap();
        let fatty = board.add_piece(Piece::base("ogre", Size::new(2, 2), None), 0).unwrap();
        let heavy = board.add_piece(unit(9), 0).unwrap();
        assert!(board.shift_by_priority().unwrap());
        assert!(board.self_consistent());
        // The heavy unit packs to the bottom of its column; the fatty's two
        // columns end up level.
        let fpos = board.piece(fatty).unwrap().position.unwrap();
        assert_eq!(board.piece_at(fpos.row, 0), Some(fatty));
        assert_eq!(board.piece_at(fpos.row, 1), Some(fatty));
        assert_eq!(board.piece_at(fpos.row + 1, 0), Some(fatty));
        assert_eq!(board.piece_at(fpos.row + 1, 1), Some(fatty));
        assert_eq!(board.piece(heavy).unwrap().position, Some(Pos::new(0, 0)));
        assert!(board.piece(under).unwrap().position.is_some());
    }

    #[test]
    fn can_shift_up_checks_headroom() {
        let mut board = Board::new(3, 1);
        board.add_piece(unit(0), 0).unwrap();
        board.add_piece(unit(0), 0).unwrap();
        assert!(board.can_shift_up(0, 0, 1));
        assert!(!board.can_shift_up(0, 0, 2));
        board.add_piece(unit(0), 0).unwrap();
        assert!(!board.can_shift_up(0, 0, 1));
        assert!(board.can_shift_up(0, 0, 0));
    }

    #[test]
    fn do_shift_down_swaps_blocks() {
        let mut board = Board::new(6, 1);
        let bottom = board.add_piece(unit(0), 0).unwrap();
        let top = board.add_piece(unit(0), 0).unwrap();
        let block = board.add_piece(unit(0), 0).unwrap();
        // Move the single cell at row 2 down to row 0.
        board.do_shift_down(0, 2, 0, 1);
        board.sync_positions();
        assert_eq!(board.piece_at(0, 0), Some(block));
        assert_eq!(board.piece_at(1, 0), Some(bottom));
        assert_eq!(board.piece_at(2, 0), Some(top));
    }
}
