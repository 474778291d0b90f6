//! Board representation and placement primitives.
//!
//! The board owns a rectangular grid of piece identifiers and the arena of
//! pieces placed on it. All mutation goes through the public operations here
//! and in the normalization/combat modules; external components observe
//! changes only via the typed event queues.

pub mod catalog;
pub mod events;
pub mod grid;
pub mod piece;

use std::collections::{BTreeMap, HashMap};

use crate::error::BoardError;
use events::EventQueue;

pub use catalog::{Catalog, CatalogError, PieceTemplate};
pub use events::{AttackMade, AttackNow, FusionMade, PieceUpdate, PlayerStruck, WallMade};
pub use grid::{footprint, Grid, PieceId, Pos, Size};
pub use piece::{CapabilityError, ChargedProfile, Color, DamageOutcome, Piece, PieceKind, WallProfile};

/// One player's board: the grid, the unit arena, and the event queues.
#[derive(Debug)]
pub struct Board {
    pub(crate) grid: Grid,
    pub(crate) pieces: BTreeMap<PieceId, Piece>,
    next_id: u32,
    /// Last reported position per piece; the flush diffs against this so a
    /// piece is never reported twice for the same unchanged state.
    reported: HashMap<PieceId, Option<Pos>>,
    pub(crate) events: EventQueue,
}

impl Board {
    /// Creates an empty board of the given dimensions.
    pub fn new(height: usize, width: usize) -> Self {
        Board {
            grid: Grid::new(height, width),
            pieces: BTreeMap::new(),
            next_id: 0,
            reported: HashMap::new(),
            events: EventQueue::default(),
        }
    }

    pub fn height(&self) -> usize {
        self.grid.height()
    }

    pub fn width(&self) -> usize {
        self.grid.width()
    }

    /// Number of distinct pieces on the board.
    pub fn unit_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.get(&id)
    }

    /// Iterates the unit set in id order.
    pub fn pieces(&self) -> impl Iterator<Item = (PieceId, &Piece)> {
        self.pieces.iter().map(|(id, piece)| (*id, piece))
    }

    /// The occupant of a cell, or `None` if the cell is empty or out of
    /// bounds.
    pub fn piece_at(&self, row: usize, col: usize) -> Option<PieceId> {
        if !self.grid.in_bounds(row, col) {
            return None;
        }
        self.grid.get(row, col)
    }

    /// Per-column skyline: the row index one past the topmost occupied cell.
    /// Empty columns report 0.
    pub fn skyline(&self) -> Vec<usize> {
        let mut heights = vec![0; self.grid.width()];
        for (col, height) in heights.iter_mut().enumerate() {
            for row in (0..self.grid.height()).rev() {
                if self.grid.get(row, col).is_some() {
                    *height = row + 1;
                    break;
                }
            }
        }
        heights
    }

    /// Landing row for a column drop: the maximum skyline value across the
    /// columns the piece would span.
    fn landing_row(&self, piece: &Piece, col: usize) -> Result<usize, BoardError> {
        let Size { height, width } = piece.size;
        if col + width > self.grid.width() {
            return Err(BoardError::OutOfBounds {
                row: 0,
                col: col + width.saturating_sub(1),
            });
        }
        let skyline = self.skyline();
        let row = skyline[col..col + width].iter().copied().max().unwrap_or(0);
        if row + height > self.grid.height() {
            return Err(BoardError::OutOfBounds {
                row: row + height - 1,
                col,
            });
        }
        Ok(row)
    }

    /// True if dropping `piece` into `col` fits on the board.
    pub fn can_add_piece(&self, piece: &Piece, col: usize) -> bool {
        self.landing_row(piece, col).is_ok()
    }

    /// Drops a piece into a column. Does not normalize; callers invoke
    /// `normalize()` separately.
    pub fn add_piece(&mut self, piece: Piece, col: usize) -> Result<PieceId, BoardError> {
        let row = self.landing_row(&piece, col)?;
        self.place_at(piece, Pos::new(row, col))
    }

    /// Places a piece at an exact cell, used when a formation appears
    /// mid-board and by scenario construction.
    pub fn add_piece_at(&mut self, piece: Piece, row: usize, col: usize) -> Result<PieceId, BoardError> {
        let pos = Pos::new(row, col);
        if pos.row + piece.size.height > self.grid.height()
            || pos.col + piece.size.width > self.grid.width()
        {
            return Err(BoardError::OutOfBounds { row, col });
        }
        self.place_at(piece, pos)
    }

    /// Writes a piece into the arena and its footprint into the grid.
    pub(crate) fn place_at(&mut self, mut piece: Piece, pos: Pos) -> Result<PieceId, BoardError> {
        for cell in footprint(pos, piece.size) {
            if self.grid.get(cell.row, cell.col).is_some() {
                return Err(BoardError::Occupied {
                    row: cell.row,
                    col: cell.col,
                });
            }
        }
        let id = PieceId(self.next_id);
        self.next_id += 1;
        piece.position = Some(pos);
        for cell in footprint(pos, piece.size) {
            self.grid.set(cell.row, cell.col, Some(id));
        }
        self.pieces.insert(id, piece);
        Ok(id)
    }

    /// Removes a piece and clears its footprint, without normalizing.
    /// Fails loudly if the grid disagrees with the piece.
    pub(crate) fn remove_piece(&mut self, id: PieceId) -> Result<Piece, BoardError> {
        let mut piece = self.pieces.remove(&id).ok_or(BoardError::NotFound(id))?;
        if let Some(pos) = piece.position {
            for cell in footprint(pos, piece.size) {
                if !self.grid.in_bounds(cell.row, cell.col)
                    || self.grid.get(cell.row, cell.col) != Some(id)
                {
                    self.pieces.insert(id, piece);
                    return Err(BoardError::GridMismatch {
                        id,
                        row: cell.row,
                        col: cell.col,
                    });
                }
            }
            for cell in footprint(pos, piece.size) {
                self.grid.set(cell.row, cell.col, None);
            }
        }
        piece.position = None;
        Ok(piece)
    }

    /// Deletes a piece and re-settles the board.
    pub fn delete_piece(&mut self, id: PieceId) -> Result<(), BoardError> {
        self.remove_piece(id)?;
        self.normalize()
    }

    /// Changes a piece's slide priority. Takes effect on the next
    /// `normalize()` call.
    pub fn set_slide_priority(&mut self, id: PieceId, priority: i32) -> Result<(), BoardError> {
        let piece = self.pieces.get_mut(&id).ok_or(BoardError::NotFound(id))?;
        piece.slide_priority = priority;
        Ok(())
    }

    /// Re-drops a piece at a new column. Restores the original placement if
    /// the target does not fit. Does not normalize.
    pub fn move_piece(&mut self, id: PieceId, to_col: usize) -> Result<(), BoardError> {
        let piece = self.pieces.get(&id).ok_or(BoardError::NotFound(id))?;
        if !piece.moveable {
            return Err(BoardError::NotMoveable(id));
        }
        let old_pos = piece.position.ok_or(BoardError::Unplaced(id))?;
        let size = piece.size;

        for cell in footprint(old_pos, size) {
            if !self.grid.in_bounds(cell.row, cell.col)
                || self.grid.get(cell.row, cell.col) != Some(id)
            {
                return Err(BoardError::GridMismatch {
                    id,
                    row: cell.row,
                    col: cell.col,
                });
            }
        }
        for cell in footprint(old_pos, size) {
            self.grid.set(cell.row, cell.col, None);
        }

        let unplaced = Piece {
            position: None,
            ..self
                .pieces
                .get(&id)
                .ok_or(BoardError::NotFound(id))?
                .clone()
        };
        match self.landing_row(&unplaced, to_col) {
            Ok(row) => {
                let pos = Pos::new(row, to_col);
                for cell in footprint(pos, size) {
                    self.grid.set(cell.row, cell.col, Some(id));
                }
                if let Some(piece) = self.pieces.get_mut(&id) {
                    piece.position = Some(pos);
                }
                Ok(())
            }
            Err(err) => {
                for cell in footprint(old_pos, size) {
                    self.grid.set(cell.row, cell.col, Some(id));
                }
                Err(err)
            }
        }
    }

    /// Verifies the self-consistency invariant: every piece's footprint is
    /// in-bounds and points back at it, and every occupied cell belongs to
    /// the footprint of a known piece.
    pub fn check_consistency(&self) -> Result<(), BoardError> {
        for (id, piece) in &self.pieces {
            let pos = piece.position.ok_or(BoardError::Unplaced(*id))?;
            for cell in footprint(pos, piece.size) {
                if !self.grid.in_bounds(cell.row, cell.col) {
                    return Err(BoardError::OutOfBounds {
                        row: cell.row,
                        col: cell.col,
                    });
                }
                if self.grid.get(cell.row, cell.col) != Some(*id) {
                    return Err(BoardError::GridMismatch {
                        id: *id,
                        row: cell.row,
                        col: cell.col,
                    });
                }
            }
        }
        for row in 0..self.grid.height() {
            for col in 0..self.grid.width() {
                if let Some(id) = self.grid.get(row, col) {
                    let piece = self.pieces.get(&id).ok_or(BoardError::NotFound(id))?;
                    let pos = piece.position.ok_or(BoardError::Unplaced(id))?;
                    let inside = row >= pos.row
                        && row < pos.row + piece.size.height
                        && col >= pos.col
                        && col < pos.col + piece.size.width;
                    if !inside {
                        return Err(BoardError::GridMismatch { id, row, col });
                    }
                }
            }
        }
        Ok(())
    }

    /// Diagnostic form of `check_consistency`.
    pub fn self_consistent(&self) -> bool {
        self.check_consistency().is_ok()
    }

    /// Reports every piece whose placement differs from its last report:
    /// moves, deletions (`None` position), and first appearances. Pushes one
    /// batch per call when anything changed.
    pub(crate) fn flush_piece_updates(&mut self) {
        let mut batch = Vec::new();
        for (id, piece) in &self.pieces {
            if self.reported.get(id) != Some(&piece.position) {
                batch.push(PieceUpdate {
                    id: *id,
                    position: piece.position,
                });
            }
        }
        let departed: Vec<PieceId> = self
            .reported
            .keys()
            .filter(|id| !self.pieces.contains_key(id))
            .copied()
            .collect();
        for id in departed {
            batch.push(PieceUpdate { id, position: None });
            self.reported.remove(&id);
        }
        for update in &batch {
            if self.pieces.contains_key(&update.id) {
                self.reported.insert(update.id, update.position);
            }
        }
        if !batch.is_empty() {
            batch.sort_by_key(|update| update.id);
            self.events.piece_updates.push(batch);
        }
    }

    /// Drains the piece-update batches accumulated since the last drain.
    pub fn drain_piece_updates(&mut self) -> Vec<Vec<PieceUpdate>> {
        std::mem::take(&mut self.events.piece_updates)
    }

    pub fn drain_attacks_made(&mut self) -> Vec<AttackMade> {
        std::mem::take(&mut self.events.attacks_made)
    }

    pub fn drain_walls_made(&mut self) -> Vec<WallMade> {
        std::mem::take(&mut self.events.walls_made)
    }

    pub fn drain_fusions_made(&mut self) -> Vec<FusionMade> {
        std::mem::take(&mut self.events.fusions_made)
    }

    pub fn drain_attack_now(&mut self) -> Vec<AttackNow> {
        std::mem::take(&mut self.events.attack_now)
    }

    pub fn drain_player_struck(&mut self) -> Vec<PlayerStruck> {
        std::mem::take(&mut self.events.player_struck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(height: usize, width: usize) -> Piece {
        Piece::base("dummy", Size::new(height, width), Some(Color::Red))
    }

    #[test]
    fn empty_board_skyline_is_zero() {
        let board = Board::new(6, 8);
        assert_eq!(board.skyline(), vec![0; 8]);
    }

    #[test]
    fn add_piece_lands_on_skyline() {
        let mut board = Board::new(6, 8);
        let first = board.add_piece(dummy(1, 1), 3).unwrap();
        let second = board.add_piece(dummy(1, 1), 3).unwrap();
        assert_eq!(board.piece(first).unwrap().position, Some(Pos::new(0, 3)));
        assert_eq!(board.piece(second).unwrap().position, Some(Pos::new(1, 3)));
        assert_eq!(board.skyline()[3], 2);
    }

    #[test]
    fn wide_piece_lands_on_tallest_spanned_column() {
        let mut board = Board::new(6, 8);
        board.add_piece(dummy(1, 1), 1).unwrap();
        board.add_piece(dummy(1, 1), 1).unwrap();
        let fatty = board.add_piece(dummy(2, 2), 0).unwrap();
        assert_eq!(board.piece(fatty).unwrap().position, Some(Pos::new(2, 0)));
        assert_eq!(board.piece_at(2, 0), Some(fatty));
        assert_eq!(board.piece_at(3, 1), Some(fatty));
    }

    #[test]
    fn add_piece_rejects_column_overflow() {
        let mut board = Board::new(2, 3);
        board.add_piece(dummy(1, 1), 0).unwrap();
        board.add_piece(dummy(1, 1), 0).unwrap();
        let err = board.add_piece(dummy(1, 1), 0).unwrap_err();
        assert!(matches!(err, BoardError::OutOfBounds { .. }));
    }

    #[test]
    fn add_piece_rejects_width_overflow() {
        let mut board = Board::new(4, 3);
        let err = board.add_piece(dummy(1, 2), 2).unwrap_err();
        assert!(matches!(err, BoardError::OutOfBounds { .. }));
        assert!(board.can_add_piece(&dummy(1, 2), 1));
    }

    #[test]
    fn add_piece_at_rejects_occupied_cell() {
        let mut board = Board::new(4, 4);
        board.add_piece_at(dummy(1, 1), 1, 1).unwrap();
        let err = board.add_piece_at(dummy(1, 1), 1, 1).unwrap_err();
        assert_eq!(err, BoardError::Occupied { row: 1, col: 1 });
    }

    #[test]
    fn delete_piece_clears_footprint_and_unit_set() {
        let mut board = Board::new(4, 4);
        let id = board.add_piece(dummy(2, 2), 0).unwrap();
        board.delete_piece(id).unwrap();
        assert_eq!(board.unit_count(), 0);
        assert_eq!(board.piece_at(0, 0), None);
        assert_eq!(board.piece_at(1, 1), None);
    }

    #[test]
    fn delete_unknown_piece_is_not_found() {
        let mut board = Board::new(4, 4);
        let id = board.add_piece(dummy(1, 1), 0).unwrap();
        board.delete_piece(id).unwrap();
        assert_eq!(board.delete_piece(id), Err(BoardError::NotFound(id)));
    }

    #[test]
    fn move_piece_redrops_at_target_column() {
        let mut board = Board::new(4, 4);
        let id = board.add_piece(dummy(1, 1), 0).unwrap();
        board.move_piece(id, 2).unwrap();
        assert_eq!(board.piece(id).unwrap().position, Some(Pos::new(0, 2)));
        assert_eq!(board.piece_at(0, 0), None);
        assert_eq!(board.piece_at(0, 2), Some(id));
    }

    #[test]
    fn move_piece_restores_on_failure() {
        let mut board = Board::new(4, 4);
        let id = board.add_piece(dummy(1, 2), 0).unwrap();
        let err = board.move_piece(id, 3).unwrap_err();
        assert!(matches!(err, BoardError::OutOfBounds { .. }));
        assert_eq!(board.piece(id).unwrap().position, Some(Pos::new(0, 0)));
        assert_eq!(board.piece_at(0, 1), Some(id));
    }

    #[test]
    fn move_piece_rejects_unmoveable() {
        let mut board = Board::new(4, 4);
        let mut rock = dummy(1, 1);
        rock.moveable = false;
        let id = board.add_piece(rock, 0).unwrap();
        assert_eq!(board.move_piece(id, 1), Err(BoardError::NotMoveable(id)));
    }

    #[test]
    fn consistency_detects_grid_mismatch() {
        let mut board = Board::new(4, 4);
        board.add_piece(dummy(1, 1), 0).unwrap();
        assert!(board.self_consistent());
        board.grid.set(0, 0, None);
        assert!(!board.self_consistent());
    }

    #[test]
    fn flush_reports_appearance_once() {
        let mut board = Board::new(4, 4);
        let id = board.add_piece(dummy(1, 1), 0).unwrap();
        board.flush_piece_updates();
        board.flush_piece_updates();
        let batches = board.drain_piece_updates();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0],
            vec![PieceUpdate {
                id,
                position: Some(Pos::new(0, 0))
            }]
        );
    }

    #[test]
    fn flush_reports_deletion_as_null_position() {
        let mut board = Board::new(4, 4);
        let id = board.add_piece(dummy(1, 1), 0).unwrap();
        board.flush_piece_updates();
        board.drain_piece_updates();
        board.remove_piece(id).unwrap();
        board.flush_piece_updates();
        let batches = board.drain_piece_updates();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0], vec![PieceUpdate { id, position: None }]);
    }

    #[test]
    fn flush_skips_piece_added_and_removed_unseen() {
        let mut board = Board::new(4, 4);
        let id = board.add_piece(dummy(1, 1), 0).unwrap();
        board.remove_piece(id).unwrap();
        board.flush_piece_updates();
        assert!(board.drain_piece_updates().is_empty());
    }
}
