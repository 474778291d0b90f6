//! Typed notification channels owned by the board.
//!
//! Downstream consumers (rendering, scoring, turn logic) do not register
//! callbacks; the board pushes batches onto these queues at defined points in
//! `normalize()` and consumers drain them. Delivery order within a phase is:
//! piece updates first, then attack/wall/fusion notifications for that phase.

use serde::Serialize;

use crate::board::grid::{PieceId, Pos};
use crate::board::piece::Piece;

/// One piece whose placement changed: appearance (first report), move
/// (changed position), or deletion (`position` is `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PieceUpdate {
    pub id: PieceId,
    pub position: Option<Pos>,
}

/// Charged formations created in one formations pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttackMade {
    pub pieces: Vec<PieceId>,
}

/// Walls created in one formations pass. `events` counts distinct
/// wall-forming trigger regions; one event can consume several source pieces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WallMade {
    pub walls: Vec<PieceId>,
    pub events: usize,
}

/// Charging formations fused in one merge pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FusionMade {
    pub pieces: Vec<PieceId>,
}

/// Pieces that just became ready to attack, en route to the opponent. The
/// clones carry their final board position; its column is the target column.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackNow {
    pub attackers: Vec<Piece>,
}

/// Life lost by the player when an attack was not fully absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerStruck {
    pub amount: i32,
}

/// The board's outgoing notification queues.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    pub piece_updates: Vec<Vec<PieceUpdate>>,
    pub attacks_made: Vec<AttackMade>,
    pub walls_made: Vec<WallMade>,
    pub fusions_made: Vec<FusionMade>,
    pub attack_now: Vec<AttackNow>,
    pub player_struck: Vec<PlayerStruck>,
}
