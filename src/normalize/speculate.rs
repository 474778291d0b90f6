//! Speculative placement on a ghost board.
//!
//! Turn logic sometimes wants a drop column that would not immediately set
//! off a formation. The board clones itself into ghosts, tries candidate
//! columns in random order, and asks the formation planner whether anything
//! would fire. The real board is never touched.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::board::piece::Piece;
use crate::board::Board;
use crate::error::BoardError;

impl Board {
    /// Picks a random legal column where dropping `piece` would not trigger
    /// any formation, or `None` if every legal column would.
    pub fn col_to_add<R: Rng>(
        &self,
        piece: &Piece,
        rng: &mut R,
    ) -> Result<Option<usize>, BoardError> {
        let mut cols: Vec<usize> = (0..self.width()).collect();
        cols.shuffle(rng);
        for col in cols {
            if !self.can_add_piece(piece, col) {
                continue;
            }
            let mut ghost = self.ghost_board()?;
            ghost.add_piece(piece.ghost(), col)?;
            if ghost.plan_formations().is_empty() {
                return Ok(Some(col));
            }
        }
        Ok(None)
    }

    /// A board of the same dimensions populated with ghosts of every placed
    /// piece, at the same cells.
    pub(crate) fn ghost_board(&self) -> Result<Board, BoardError> {
        let mut ghost = Board::new(self.height(), self.width());
        for (id, piece) in self.pieces() {
            let pos = piece.position.ok_or(BoardError::Unplaced(id))?;
            ghost.add_piece_at(piece.ghost(), pos.row, pos.col)?;
        }
        Ok(ghost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::grid::{Pos, Size};
    use crate::board::piece::{ChargedProfile, Color};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn soldier(color: Color) -> Piece {
        let mut piece = Piece::base("soldier", Size::unit(), Some(color));
        piece.charged = Some(ChargedProfile {
            region_height: 2,
            initial_power: 2,
            max_power: 10,
            turns: 4,
        });
        piece
    }

    #[test]
    fn avoids_column_that_would_charge() {
        let mut board = Board::new(6, 2);
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..20 {
            let col = board.col_to_add(&soldier(Color::Red), &mut rng).unwrap();
            assert_eq!(col, Some(1));
        }
    }

    #[test]
    fn returns_none_when_every_column_triggers() {
        let mut board = Board::new(6, 1);
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let col = board.col_to_add(&soldier(Color::Red), &mut rng).unwrap();
        assert_eq!(col, None);
    }

    #[test]
    fn full_columns_are_skipped() {
        let mut board = Board::new(2, 2);
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Blue), 0).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);
        let col = board.col_to_add(&soldier(Color::Red), &mut rng).unwrap();
        assert_eq!(col, Some(1));
    }

    #[test]
    fn speculation_leaves_the_board_untouched() {
        let mut board = Board::new(6, 3);
        let a = board.add_piece(soldier(Color::Red), 0).unwrap();
        let b = board.add_piece(soldier(Color::Red), 0).unwrap();
        let count = board.unit_count();
        let mut rng = SmallRng::seed_from_u64(7);
        board.col_to_add(&soldier(Color::Red), &mut rng).unwrap();
        assert_eq!(board.unit_count(), count);
        assert_eq!(board.piece(a).unwrap().position, Some(Pos::new(0, 0)));
        assert_eq!(board.piece(b).unwrap().position, Some(Pos::new(1, 0)));
        assert!(board.drain_piece_updates().is_empty());
        assert!(board.self_consistent());
    }
}
