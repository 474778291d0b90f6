//! Formation detection and execution.
//!
//! A piece with a charging region charges when every cell of the region
//! directly above it holds a compatible charger; a piece with a transforming
//! region turns to wall (together with the region's occupants) when the
//! region beside it is filled likewise. Detection is split from execution so
//! speculative placement can ask "would anything fire?" without mutating.

use std::collections::HashSet;

use crate::board::events::{AttackMade, WallMade};
use crate::board::grid::{footprint, PieceId, Pos, Size};
use crate::board::piece::{Piece, WallProfile};
use crate::board::Board;
use crate::error::BoardError;

/// Everything one formations pass would do.
#[derive(Debug, Default)]
pub(crate) struct FormationPlan {
    /// Charge triggers, in execution order.
    pub charging: Vec<PieceId>,
    /// Wall participants (triggers and region occupants) paired with the
    /// profile their wall is built from, in execution order. Occupants
    /// inherit their trigger's profile.
    pub transforming: Vec<(PieceId, WallProfile)>,
    /// Distinct wall-forming trigger regions.
    pub transform_events: usize,
}

impl FormationPlan {
    pub fn is_empty(&self) -> bool {
        self.charging.is_empty() && self.transforming.is_empty()
    }
}

impl Board {
    /// Detects every formation that would fire on the current grid.
    pub(crate) fn plan_formations(&self) -> FormationPlan {
        let mut plan = FormationPlan::default();

        // Both detection walks run column by column, bottom to top, and that
        // order is also the execution order. A lower trigger in an earlier
        // column claims shared chargers first.
        let mut ordered: Vec<(Pos, PieceId)> = self
            .pieces()
            .filter_map(|(id, piece)| piece.position.map(|pos| (pos, id)))
            .collect();
        ordered.sort_by_key(|(pos, _)| (pos.col, pos.row));
        let mut claimed: HashSet<PieceId> = HashSet::new();
        for &(pos, id) in &ordered {
            let Some(piece) = self.pieces.get(&id) else {
                continue;
            };
            let region = piece.charging_region();
            if region.is_zero() || claimed.contains(&id) {
                continue;
            }
            let origin = Pos::new(pos.row + piece.size.height, pos.col);
            let Some(occupants) = self.region_occupants(origin, region) else {
                continue;
            };
            if occupants.iter().all(|oid| {
                self.pieces
                    .get(oid)
                    .is_some_and(|other| piece.can_charge(other))
            }) {
                plan.charging.push(id);
                if !piece.multi_chargeable {
                    // Absorbed chargers cannot trigger their own formation.
                    claimed.extend(occupants);
                }
            }
        }
        plan.charging.retain(|id| !claimed.contains(id));

        let mut participants: Vec<(PieceId, WallProfile)> = Vec::new();
        for &(pos, id) in &ordered {
            let Some(piece) = self.pieces.get(&id) else {
                continue;
            };
            let region = piece.transforming_region();
            if region.is_zero() {
                continue;
            }
            let Some(profile) = piece.wall_profile() else {
                continue;
            };
            let origin = Pos::new(pos.row, pos.col + piece.size.width);
            let Some(occupants) = self.region_occupants(origin, region) else {
                continue;
            };
            if occupants.iter().all(|oid| {
                self.pieces
                    .get(oid)
                    .is_some_and(|other| piece.can_transform(other))
            }) {
                plan.transform_events += 1;
                // Region occupants need not carry a wall profile of their
                // own; they turn to wall with their trigger's.
                participants.push((id, profile));
                participants.extend(occupants.into_iter().map(|oid| (oid, profile)));
            }
        }
        let mut seen = HashSet::new();
        participants.retain(|(id, _)| seen.insert(*id));
        participants.sort_by_key(|(id, _)| {
            self.pieces
                .get(id)
                .and_then(|p| p.position)
                .map(|p| (p.col, p.row))
        });
        plan.transforming = participants;

        plan
    }

    /// The distinct occupants of a region, or `None` if the region runs off
    /// the board or contains an empty cell.
    fn region_occupants(&self, origin: Pos, region: Size) -> Option<Vec<PieceId>> {
        if origin.row + region.height > self.grid.height()
            || origin.col + region.width > self.grid.width()
        {
            return None;
        }
        let mut ids = Vec::new();
        for cell in footprint(origin, region) {
            let id = self.grid.get(cell.row, cell.col)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Some(ids)
    }

    /// One formations pass: plan, then execute. Returns true if anything
    /// fired.
    pub(crate) fn create_formations(&mut self) -> Result<bool, BoardError> {
        let plan = self.plan_formations();
        if plan.is_empty() {
            return Ok(false);
        }
        self.apply_formations(plan)?;
        Ok(true)
    }

    fn apply_formations(&mut self, plan: FormationPlan) -> Result<(), BoardError> {
        let charging_set: HashSet<PieceId> = plan.charging.iter().copied().collect();
        let transforming_set: HashSet<PieceId> =
            plan.transforming.iter().map(|(id, _)| *id).collect();
        // Chargers that were also due to transform leave a wall behind; the
        // wall slots in above the charged formation once it exists.
        let mut placeholders: Vec<(PieceId, Piece, Pos)> = Vec::new();
        let mut charged_ids = Vec::new();

        for id in plan.charging {
            let Some(trigger) = self.pieces.get(&id).cloned() else {
                continue;
            };
            let Some(pos) = trigger.position else {
                continue;
            };
            // An earlier formation in this pass may have consumed part of the
            // region; re-verify before firing.
            let origin = Pos::new(pos.row + trigger.size.height, pos.col);
            let still_full = match self.region_occupants(origin, trigger.charging_region()) {
                Some(occupants) => occupants.iter().all(|oid| {
                    self.pieces
                        .get(oid)
                        .is_some_and(|other| trigger.can_charge(other))
                }),
                None => false,
            };
            if !still_full {
                continue;
            }
            let charged = trigger.charge()?;
            if !trigger.multi_chargeable {
                let occupants = self
                    .region_occupants(origin, trigger.charging_region())
                    .unwrap_or_default();
                for oid in occupants {
                    if charging_set.contains(&oid) {
                        continue;
                    }
                    let ocol = self
                        .pieces
                        .get(&oid)
                        .and_then(|p| p.position)
                        .map(|p| p.col);
                    let removed = self.remove_piece(oid)?;
                    if transforming_set.contains(&oid) {
                        let slot = Pos::new(
                            pos.row + charged.size.height,
                            ocol.unwrap_or(pos.col),
                        );
                        placeholders.push((oid, removed, slot));
                    }
                }
            }
            self.remove_piece(id)?;
            let new_id = self.place_at(charged, pos)?;
            charged_ids.push(new_id);
        }

        let mut walls = Vec::new();
        for (id, profile) in plan.transforming {
            if let Some(piece) = self.pieces.get(&id) {
                let pos = match piece.position {
                    Some(pos) => pos,
                    None => continue,
                };
                let wall = piece.transform_as(profile)?;
                self.remove_piece(id)?;
                walls.push(self.place_at(wall, pos)?);
            } else if let Some(index) = placeholders.iter().position(|(pid, _, _)| *pid == id) {
                let (_, piece, slot) = placeholders.remove(index);
                let wall = piece.transform_as(profile)?;
                if let Some(wid) = self.insert_with_shift(wall, slot)? {
                    walls.push(wid);
                }
            }
        }

        if !charged_ids.is_empty() {
            self.events.attacks_made.push(AttackMade {
                pieces: charged_ids,
            });
        }
        if !walls.is_empty() {
            self.events.walls_made.push(WallMade {
                walls,
                events: plan.transform_events,
            });
        }
        Ok(())
    }

    /// Places a wall at `slot`, shifting the column's stack up to make room
    /// if necessary. Walls that cannot fit are dropped without error.
    fn insert_with_shift(&mut self, wall: Piece, slot: Pos) -> Result<Option<PieceId>, BoardError> {
        if !self.grid.in_bounds(slot.row, slot.col) {
            return Ok(None);
        }
        if self.grid.get(slot.row, slot.col).is_none() {
            return Ok(Some(self.place_at(wall, slot)?));
        }
        let lift = wall.size.height;
        if !self.can_shift_up(slot.col, slot.row, lift) {
            return Ok(None);
        }
        // A 2x2 piece straddling the shifted range would be torn apart.
        for row in slot.row..self.grid.height() {
            if let Some(id) = self.grid.get(row, slot.col) {
                if self.pieces.get(&id).is_some_and(|p| p.size.width > 1) {
                    return Ok(None);
                }
            }
        }
        self.do_shift_up(slot.col, slot.row, lift);
        self.sync_positions();
        Ok(Some(self.place_at(wall, slot)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::piece::{ChargedProfile, Color, WallProfile};

    fn soldier(color: Color) -> Piece {
        let mut piece = Piece::base("soldier", Size::unit(), Some(color));
        piece.charged = Some(ChargedProfile {
            region_height: 2,
            initial_power: 2,
            max_power: 10,
            turns: 4,
        });
        piece.wall = Some(WallProfile {
            region_width: 2,
            toughness: 7,
            max_toughness: 14,
        });
        piece
    }

    fn plain(color: Color) -> Piece {
        Piece::base("peasant", Size::unit(), Some(color))
    }

    #[test]
    fn stack_of_three_charges() {
        let mut board = Board::new(6, 3);
        board.add_piece(soldier(Color::Red), 1).unwrap();
        board.add_piece(soldier(Color::Red), 1).unwrap();
        board.add_piece(soldier(Color::Red), 1).unwrap();
        assert!(board.create_formations().unwrap());
        assert_eq!(board.unit_count(), 1);
        let (id, piece) = board.pieces().next().unwrap();
        assert!(piece.is_charging());
        assert_eq!(piece.size, Size::new(3, 1));
        assert_eq!(piece.position, Some(Pos::new(0, 1)));
        let attacks = board.drain_attacks_made();
        assert_eq!(attacks, vec![AttackMade { pieces: vec![id] }]);
    }

    #[test]
    fn mixed_colors_do_not_charge() {
        let mut board = Board::new(6, 1);
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Blue), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        assert!(!board.create_formations().unwrap());
        assert_eq!(board.unit_count(), 3);
    }

    #[test]
    fn partial_region_does_not_charge() {
        let mut board = Board::new(6, 1);
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        assert!(!board.create_formations().unwrap());
    }

    #[test]
    fn region_off_the_top_never_fires() {
        let mut board = Board::new(2, 1);
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        assert!(board.plan_formations().is_empty());
    }

    #[test]
    fn lower_trigger_claims_shared_chargers() {
        // Four chargeable units in a column: the bottom one fires, absorbing
        // the two above; the claimed third cannot fire on the leftover.
        let mut board = Board::new(6, 1);
        let bottom = board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        let plan = board.plan_formations();
        assert_eq!(plan.charging, vec![bottom]);
        assert!(board.create_formations().unwrap());
        assert_eq!(board.unit_count(), 2);
    }

    #[test]
    fn row_of_three_forms_walls() {
        let mut board = Board::new(4, 4);
        board.add_piece(soldier(Color::Blue), 0).unwrap();
        board.add_piece(plain(Color::Blue), 1).unwrap();
        board.add_piece(plain(Color::Blue), 2).unwrap();
        assert!(board.create_formations().unwrap());
        assert_eq!(board.unit_count(), 3);
        for col in 0..3 {
            let id = board.piece_at(0, col).unwrap();
            assert!(board.piece(id).unwrap().is_wall());
        }
        let walls = board.drain_walls_made();
        assert_eq!(walls.len(), 1);
        assert_eq!(walls[0].walls.len(), 3);
        assert_eq!(walls[0].events, 1);
    }

    #[test]
    fn plain_occupants_form_walls_through_normalize() {
        // The region occupants carry no wall profile of their own; they
        // still turn to wall with the trigger's toughness.
        let mut board = Board::new(4, 4);
        board.add_piece(soldier(Color::Blue), 0).unwrap();
        board.add_piece(plain(Color::Blue), 1).unwrap();
        board.add_piece(plain(Color::Blue), 2).unwrap();
        board.normalize().unwrap();
        assert_eq!(board.unit_count(), 3);
        for col in 0..3 {
            let id = board.piece_at(0, col).unwrap();
            let piece = board.piece(id).unwrap();
            assert!(piece.is_wall());
            assert_eq!(piece.toughness, 7);
        }
    }

    #[test]
    fn plain_units_alone_do_not_form_walls() {
        let mut board = Board::new(4, 4);
        board.add_piece(plain(Color::Blue), 0).unwrap();
        board.add_piece(plain(Color::Blue), 1).unwrap();
        board.add_piece(plain(Color::Blue), 2).unwrap();
        assert!(!board.create_formations().unwrap());
    }

    #[test]
    fn charger_due_to_transform_leaves_wall_above() {
        // Column 0 charges vertically; its middle charger is also part of a
        // horizontal wall row. The wall appears above the charged formation.
        let mut board = Board::new(6, 3);
        board.add_piece(soldier(Color::Red), 0).unwrap();
        let shared = board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece(soldier(Color::Red), 0).unwrap();
        board.add_piece_at(plain(Color::Red), 1, 1).unwrap();
        board.add_piece_at(plain(Color::Red), 1, 2).unwrap();

        let plan = board.plan_formations();
        assert!(plan.transforming.iter().any(|(id, _)| *id == shared));
        assert!(board.create_formations().unwrap());

        // Charged 3x1 formation at the bottom of column 0, wall on top.
        let charged = board.piece_at(0, 0).unwrap();
        assert!(board.piece(charged).unwrap().is_charging());
        let wall = board.piece_at(3, 0).unwrap();
        assert!(board.piece(wall).unwrap().is_wall());
    }

    #[test]
    fn earlier_column_trigger_fires_first() {
        // The trigger in column 0 sits higher than the one in column 1, but
        // execution still runs column by column, bottom to top.
        let mut board = Board::new(6, 2);
        board.add_piece_at(plain(Color::Blue), 0, 0).unwrap();
        board.add_piece_at(soldier(Color::Red), 1, 0).unwrap();
        board.add_piece_at(soldier(Color::Red), 2, 0).unwrap();
        board.add_piece_at(soldier(Color::Red), 3, 0).unwrap();
        board.add_piece_at(soldier(Color::Red), 0, 1).unwrap();
        board.add_piece_at(soldier(Color::Red), 1, 1).unwrap();
        board.add_piece_at(soldier(Color::Red), 2, 1).unwrap();

        assert!(board.create_formations().unwrap());
        let left = board.piece_at(1, 0).unwrap();
        let right = board.piece_at(0, 1).unwrap();
        assert!(board.piece(left).unwrap().is_charging());
        assert!(board.piece(right).unwrap().is_charging());
        let attacks = board.drain_attacks_made();
        assert_eq!(attacks, vec![AttackMade { pieces: vec![left, right] }]);
    }

    #[test]
    fn wide_trigger_claims_overlapping_trigger() {
        // A two-column trigger's region covers a would-be trigger in the
        // next column; the earlier trigger absorbs it.
        let mut board = Board::new(6, 3);
        let mut ram = Piece::base("ram", Size::new(1, 2), Some(Color::Red));
        ram.charged = Some(ChargedProfile {
            region_height: 2,
            initial_power: 3,
            max_power: 9,
            turns: 3,
        });
        let wide = board.add_piece_at(ram, 0, 0).unwrap();
        board.add_piece_at(plain(Color::Red), 1, 0).unwrap();
        board.add_piece_at(plain(Color::Red), 2, 0).unwrap();
        let inner = board.add_piece_at(soldier(Color::Red), 1, 1).unwrap();
        board.add_piece_at(plain(Color::Red), 2, 1).unwrap();
        let spare = board.add_piece_at(plain(Color::Red), 3, 1).unwrap();

        let plan = board.plan_formations();
        assert_eq!(plan.charging, vec![wide]);
        assert!(board.create_formations().unwrap());
        assert_eq!(board.unit_count(), 2);
        let charged = board.piece_at(0, 0).unwrap();
        assert!(board.piece(charged).unwrap().is_charging());
        assert_eq!(board.piece(charged).unwrap().size, Size::new(3, 2));
        assert!(board.piece(inner).is_none());
        assert!(board.piece(spare).is_some());
    }

    #[test]
    fn multi_chargeable_trigger_keeps_chargers() {
        let mut board = Board::new(6, 1);
        let mut drummer = soldier(Color::Red);
        drummer.multi_chargeable = true;
        let trigger = board.add_piece(drummer, 0).unwrap();
        let a = board.add_piece(soldier(Color::Red), 0).unwrap();
        let b = board.add_piece(soldier(Color::Red), 0).unwrap();
        assert!(board.create_formations().unwrap());
        // The trigger charged in place; both chargers survive.
        assert!(board.piece(a).is_some());
        assert!(board.piece(b).is_some());
        assert!(board.piece(trigger).is_none());
        let charged = board.piece_at(0, 0).unwrap();
        assert!(board.piece(charged).unwrap().is_charging());
        assert_eq!(board.piece(charged).unwrap().size, Size::unit());
    }
}
