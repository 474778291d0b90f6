//! Turn advancement and attack resolution.
//!
//! Each turn the attacking board advances its charging formations and ships
//! the ones whose countdown reached zero. The defending board resolves them
//! column by column: attacker and defender exchange their pre-damage
//! toughness simultaneously, defenders are consumed bottom to top, and any
//! attack that outlives the column strikes the player.

use crate::board::events::{AttackNow, PlayerStruck};
use crate::board::grid::PieceId;
use crate::board::piece::Piece;
use crate::board::Board;
use crate::error::BoardError;

/// One attacker/defender exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackRecord {
    pub defender: PieceId,
    pub damage_dealt: i32,
    pub defender_died: bool,
}

/// How one attacker fared against a defending column.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackSummary {
    /// The attacker as it arrived, position set to its launch cell.
    pub attacker: Piece,
    pub attacks: Vec<AttackRecord>,
    /// Damage that reached the player, if the attacker broke through.
    pub struck_player: Option<i32>,
}

impl Board {
    /// Advances every charging formation one turn and launches the ones that
    /// are ready. Launched attackers are removed from this board and returned
    /// with their final position intact; its column is the target column on
    /// the opposing board.
    pub fn begin_turn(&mut self) -> Result<Vec<Piece>, BoardError> {
        let charging: Vec<PieceId> = self
            .pieces()
            .filter(|(_, piece)| piece.is_charging())
            .map(|(id, _)| id)
            .collect();
        for id in &charging {
            if let Some(piece) = self.pieces.get_mut(id) {
                piece.update();
            }
        }
        let ready: Vec<PieceId> = charging
            .into_iter()
            .filter(|id| {
                self.pieces
                    .get(id)
                    .is_some_and(|piece| piece.ready_to_attack())
            })
            .collect();
        let mut attackers = Vec::new();
        for id in &ready {
            if let Some(piece) = self.pieces.get(id) {
                attackers.push(piece.clone());
            }
        }
        if !attackers.is_empty() {
            self.events.attack_now.push(AttackNow {
                attackers: attackers.clone(),
            });
        }
        for id in ready {
            self.remove_piece(id)?;
        }
        self.normalize()?;
        Ok(attackers)
    }

    /// Resolves incoming attackers against this board. Each attacker works
    /// up its target column until it dies or the column is exhausted; the
    /// leftover power of a surviving attacker strikes the player.
    pub fn damage_calculate(
        &mut self,
        attackers: Vec<Piece>,
    ) -> Result<Vec<AttackSummary>, BoardError> {
        let mut summaries = Vec::new();
        for mut attacker in attackers {
            let pos = attacker.position.ok_or(BoardError::UnplacedAttacker)?;
            if pos.col >= self.width() {
                return Err(BoardError::OutOfBounds {
                    row: pos.row,
                    col: pos.col,
                });
            }
            let mut attacks = Vec::new();
            let mut alive = true;
            for defender_id in self.grid.column_pieces(pos.col) {
                let Some(defender) = self.pieces.get_mut(&defender_id) else {
                    continue;
                };
                let strike = attacker.toughness;
                let counter = defender.toughness;
                let outcome = defender.damage(strike);
                let own = attacker.damage(counter);
                attacks.push(AttackRecord {
                    defender: defender_id,
                    damage_dealt: strike,
                    defender_died: outcome.dead,
                });
                if outcome.dead {
                    self.remove_piece(defender_id)?;
                }
                if own.dead {
                    alive = false;
                    break;
                }
            }
            let struck_player = if alive && attacker.toughness > 0 {
                let amount = attacker.toughness;
                self.events.player_struck.push(PlayerStruck { amount });
                Some(amount)
            } else {
                None
            };
            summaries.push(AttackSummary {
                attacker,
                attacks,
                struck_player,
            });
        }
        self.normalize()?;
        Ok(summaries)
    }
}
