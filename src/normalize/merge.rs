//! Merging vertically adjacent compatible pieces.
//!
//! Walls stack into stronger walls up to their toughness cap; charging
//! formations of the same base size and color fuse into one formation with
//! pooled power. A merge absorbs the upper piece into the lower one's
//! footprint. At most one merge fires per column per pass; the settling loop
//! reruns the pass until nothing merges.

use crate::board::events::FusionMade;
use crate::board::grid::{footprint, PieceId, Pos};
use crate::board::Board;
use crate::error::BoardError;

impl Board {
    /// One merge pass. Returns true if any pair merged.
    pub(crate) fn merge_adjacent(&mut self) -> Result<bool, BoardError> {
        let mut merged = false;
        for col in 0..self.grid.width() {
            let ids = self.grid.column_pieces(col);
            for pair in ids.windows(2) {
                let (lower, upper) = (pair[0], pair[1]);
                if self.mergeable_pair(col, lower, upper) {
                    self.merge_pair(lower, upper)?;
                    merged = true;
                    break;
                }
            }
        }
        Ok(merged)
    }

    /// True if `upper` sits directly on `lower`, both anchored in this
    /// column with equal widths, and the pieces are compatible.
    fn mergeable_pair(&self, col: usize, lower: PieceId, upper: PieceId) -> bool {
        let (Some(lower), Some(upper)) = (self.pieces.get(&lower), self.pieces.get(&upper)) else {
            return false;
        };
        let (Some(lpos), Some(upos)) = (lower.position, upper.position) else {
            return false;
        };
        lpos.col == col
            && upos == Pos::new(lpos.row + lower.size.height, col)
            && lower.size.width == upper.size.width
            && lower.can_merge(upper)
    }

    /// Absorbs `upper` into `lower`, re-pointing the absorbed footprint.
    fn merge_pair(&mut self, lower: PieceId, upper: PieceId) -> Result<(), BoardError> {
        let absorbed = self
            .pieces
            .remove(&upper)
            .ok_or(BoardError::NotFound(upper))?;
        let upos = absorbed.position.ok_or(BoardError::Unplaced(upper))?;
        for cell in footprint(upos, absorbed.size) {
            if self.grid.get(cell.row, cell.col) != Some(upper) {
                self.pieces.insert(upper, absorbed);
                return Err(BoardError::GridMismatch {
                    id: upper,
                    row: cell.row,
                    col: cell.col,
                });
            }
        }
        for cell in footprint(upos, absorbed.size) {
            self.grid.set(cell.row, cell.col, Some(lower));
        }
        let fusion = absorbed.is_charging();
        let survivor = self
            .pieces
            .get_mut(&lower)
            .ok_or(BoardError::NotFound(lower))?;
        survivor.merge(&absorbed)?;
        if fusion {
            self.events.fusions_made.push(FusionMade {
                pieces: vec![lower],
            });
        }
        Ok(())
    }
}
