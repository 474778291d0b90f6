//! Board normalization engine for a two-board battle puzzle game.
//!
//! Each player owns a rectangular board. Pieces drop into columns, slide
//! down in priority order, charge into attack formations, form walls, and
//! merge; every mutation is followed by [`board::Board::normalize`], which
//! settles the board to a fixed point. Attacks launched from one board are
//! resolved against the other via [`board::Board::damage_calculate`].
//!
//! The engine is deterministic and single-threaded. All external randomness
//! is injected through [`rand::Rng`] arguments, and all observable changes
//! are reported through the board's typed event queues.

pub mod board;
pub mod combat;
pub mod error;
mod normalize;

pub use board::{Board, Catalog};
pub use combat::{AttackRecord, AttackSummary};
pub use error::BoardError;
