//! Error taxonomy for board operations.
//!
//! Structural failures (grid/piece disagreement, alignment divergence,
//! capability misuse) are hard errors that indicate the simulation state can
//! no longer be trusted. Expected game outcomes (no legal column, a wall with
//! no room) are normal return values, never errors.

use crate::board::grid::PieceId;
use crate::board::piece::CapabilityError;

/// Errors raised by board operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BoardError {
    /// A placement would reach outside the board rectangle.
    #[error("position ({row}, {col}) is outside the board")]
    OutOfBounds { row: usize, col: usize },

    /// The piece is not in the board's unit set.
    #[error("piece {0:?} is not on this board")]
    NotFound(PieceId),

    /// A placement targets a cell that already holds a piece.
    #[error("cell ({row}, {col}) is already occupied")]
    Occupied { row: usize, col: usize },

    /// The grid and a piece disagree about who occupies a cell. This is an
    /// invariant violation from a prior bug, not a recoverable condition.
    #[error("grid cell ({row}, {col}) disagrees with piece {id:?}")]
    GridMismatch { id: PieceId, row: usize, col: usize },

    /// Fatty alignment repair exceeded its retry bound.
    #[error("alignment repair for piece {0:?} did not converge")]
    AlignmentDiverged(PieceId),

    /// The piece exists but has no board position.
    #[error("piece {0:?} has no board position")]
    Unplaced(PieceId),

    /// An attacker was delivered without a target column.
    #[error("attacker has no target column")]
    UnplacedAttacker,

    /// The piece cannot be moved by the player.
    #[error("piece {0:?} is not moveable")]
    NotMoveable(PieceId),

    /// A state-transition operation was invoked on an incapable piece.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}
