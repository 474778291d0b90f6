//! Board normalization: the settling loop.
//!
//! After any mutation the board is driven to a fixed point by repeating three
//! passes until none of them changes anything:
//!
//! 1. slide every column's pieces down in priority order (`shift`),
//! 2. detect and execute charge and wall formations (`formations`),
//! 3. merge vertically adjacent compatible pieces (`merge`).
//!
//! Piece updates are flushed between passes so consumers see each phase's
//! movement before the notifications the phase produced.

pub(crate) mod formations;
mod merge;
mod shift;
mod speculate;

use crate::board::Board;
use crate::error::BoardError;

impl Board {
    /// Runs the settling loop to a fixed point.
    pub fn normalize(&mut self) -> Result<(), BoardError> {
        loop {
            let mut changed = false;
            changed |= self.shift_by_priority()?;
            self.flush_piece_updates();
            changed |= self.create_formations()?;
            self.flush_piece_updates();
            changed |= self.merge_adjacent()?;
            self.flush_piece_updates();
            if !changed {
                return Ok(());
            }
        }
    }
}
