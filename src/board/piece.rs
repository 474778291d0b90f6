//! The piece capability contract.
//!
//! A piece is anything that occupies board cells: a base unit, a charging
//! attack formation, a defensive wall, or a ghost stand-in used for
//! speculative placement. Shapes are fixed for the lifetime of a piece; a
//! state transition (`charge`, `transform`) produces a new piece rather than
//! resizing in place. The one sanctioned exception is `merge`, which absorbs
//! a vertically adjacent piece into a union footprint.

use crate::board::grid::{Pos, Size};

/// Unit color, used to match chargers and wall formations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Blue,
    Green,
    Yellow,
}

/// Invoking a state transition on a piece incapable of it. Distinct from
/// "capable but blocked by region rules", which is not an error at all.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("this piece cannot charge")]
    NotChargeable,

    #[error("this piece cannot transform")]
    NotTransformable,

    #[error("these pieces cannot merge")]
    NotMergeable,
}

/// How a base piece charges into an attack formation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargedProfile {
    /// Depth of the region above the piece that must be filled.
    pub region_height: usize,
    pub initial_power: i32,
    pub max_power: i32,
    /// Turns from charging to attacking.
    pub turns: u32,
}

/// How a base piece transforms into a wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallProfile {
    /// Width of the region beside the piece that must be filled.
    pub region_width: usize,
    pub toughness: i32,
    pub max_toughness: i32,
}

/// The closed set of piece variants.
#[derive(Debug, Clone, PartialEq)]
pub enum PieceKind {
    /// An ordinary unit, dropped by the player.
    Base,
    /// An attack formation counting down to its attack turn.
    Charging {
        /// Footprint of the constituents that charged into this piece.
        base_size: Size,
        initial_power: i32,
        max_power: i32,
        max_turns: u32,
        turns_left: u32,
    },
    /// A defensive wall. Mergeable with adjacent walls up to a toughness cap.
    Wall { max_toughness: i32 },
    /// A stand-in that forwards all capability queries to the wrapped piece
    /// but owns an independent position. Lives only on speculative boards.
    Ghost(Box<Piece>),
}

/// Result of one `damage` application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// Toughness left after the hit.
    pub remaining: i32,
    /// True if the piece died and should be removed from the board.
    pub dead: bool,
}

/// One game object occupying a rectangular footprint of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub name: String,
    /// (height, width) in cells, fixed for the piece's lifetime.
    pub size: Size,
    /// Anchor cell (lowest row, leftmost column), or `None` off-board.
    pub position: Option<Pos>,
    pub toughness: i32,
    /// Higher priority pieces pack closer to row 0.
    pub slide_priority: i32,
    pub moveable: bool,
    /// Whether this piece's chargers may charge something else in the same
    /// pass. Requires the charged form to keep the piece's own size.
    pub multi_chargeable: bool,
    pub color: Option<Color>,
    /// Template data enabling the charge transition, if any.
    pub charged: Option<ChargedProfile>,
    /// Template data enabling the wall transition, if any.
    pub wall: Option<WallProfile>,
    pub kind: PieceKind,
}

impl Piece {
    /// Creates a plain base piece with default attributes.
    pub fn base(name: impl Into<String>, size: Size, color: Option<Color>) -> Piece {
        Piece {
            name: name.into(),
            size,
            position: None,
            toughness: 0,
            slide_priority: 0,
            moveable: true,
            multi_chargeable: false,
            color,
            charged: None,
            wall: None,
            kind: PieceKind::Base,
        }
    }

    /// Wraps this piece in a ghost carrying an independent copy of its
    /// position, for speculative simulation.
    pub fn ghost(&self) -> Piece {
        Piece {
            name: self.name.clone(),
            size: self.size,
            position: self.position,
            toughness: self.toughness,
            slide_priority: self.slide_priority,
            moveable: self.moveable,
            multi_chargeable: self.multi_chargeable,
            color: self.color,
            charged: None,
            wall: None,
            kind: PieceKind::Ghost(Box::new(self.clone())),
        }
    }

    /// Sees through ghost wrappers to the underlying piece.
    fn concrete(&self) -> &Piece {
        match &self.kind {
            PieceKind::Ghost(inner) => inner.concrete(),
            _ => self,
        }
    }

    pub fn is_charging(&self) -> bool {
        matches!(self.concrete().kind, PieceKind::Charging { .. })
    }

    pub fn is_wall(&self) -> bool {
        matches!(self.concrete().kind, PieceKind::Wall { .. })
    }

    /// The region above this piece that, when filled with compatible pieces,
    /// triggers charging. `(0, 0)` means the piece cannot charge.
    pub fn charging_region(&self) -> Size {
        let piece = self.concrete();
        match (&piece.kind, &piece.charged) {
            (PieceKind::Base, Some(profile)) => Size::new(profile.region_height, piece.size.width),
            _ => Size::ZERO,
        }
    }

    /// True if `other` can serve as a charger for this piece.
    pub fn can_charge(&self, other: &Piece) -> bool {
        let piece = self.concrete();
        let other = other.concrete();
        piece.charged.is_some()
            && matches!(piece.kind, PieceKind::Base)
            && matches!(other.kind, PieceKind::Base)
            && other.size == Size::unit()
            && piece.color.is_some()
            && piece.color == other.color
    }

    /// Produces the charged formation replacing this piece.
    ///
    /// Non-multi-chargeable pieces absorb their charging region into the new
    /// footprint; multi-chargeable pieces keep their own size so the chargers
    /// survive in place.
    pub fn charge(&self) -> Result<Piece, CapabilityError> {
        if let PieceKind::Ghost(inner) = &self.kind {
            return inner.charge();
        }
        if !matches!(self.kind, PieceKind::Base) {
            return Err(CapabilityError::NotChargeable);
        }
        let profile = self.charged.ok_or(CapabilityError::NotChargeable)?;
        let size = if self.multi_chargeable {
            self.size
        } else {
            Size::new(self.size.height + profile.region_height, self.size.width)
        };
        Ok(Piece {
            name: self.name.clone(),
            size,
            position: self.position,
            toughness: profile.initial_power,
            slide_priority: self.slide_priority,
            moveable: self.moveable,
            multi_chargeable: false,
            color: self.color,
            charged: None,
            wall: None,
            kind: PieceKind::Charging {
                base_size: self.size,
                initial_power: profile.initial_power,
                max_power: profile.max_power,
                max_turns: profile.turns,
                turns_left: profile.turns,
            },
        })
    }

    /// The region beside this piece that, when filled with compatible pieces,
    /// triggers a wall transformation. `(0, 0)` means untransformable.
    pub fn transforming_region(&self) -> Size {
        let piece = self.concrete();
        match (&piece.kind, &piece.wall) {
            (PieceKind::Base, Some(profile)) => Size::new(piece.size.height, profile.region_width),
            _ => Size::ZERO,
        }
    }

    /// True if `other` can participate in this piece's wall formation.
    pub fn can_transform(&self, other: &Piece) -> bool {
        let piece = self.concrete();
        let other = other.concrete();
        piece.wall.is_some()
            && matches!(piece.kind, PieceKind::Base)
            && matches!(other.kind, PieceKind::Base)
            && other.size == Size::unit()
            && piece.color.is_some()
            && piece.color == other.color
    }

    /// This piece's own wall template data, if it carries any.
    pub fn wall_profile(&self) -> Option<WallProfile> {
        self.concrete().wall
    }

    /// Produces the wall replacing this piece, using its own wall profile.
    pub fn transform(&self) -> Result<Piece, CapabilityError> {
        let profile = self.wall_profile().ok_or(CapabilityError::NotTransformable)?;
        self.transform_as(profile)
    }

    /// Produces the wall replacing this piece from `profile`. Region
    /// occupants turn to wall alongside their trigger and inherit its
    /// profile even when they carry none of their own.
    pub fn transform_as(&self, profile: WallProfile) -> Result<Piece, CapabilityError> {
        if let PieceKind::Ghost(inner) = &self.kind {
            return inner.transform_as(profile);
        }
        if !matches!(self.kind, PieceKind::Base) {
            return Err(CapabilityError::NotTransformable);
        }
        Ok(Piece {
            name: "Wall".to_string(),
            size: Size::unit(),
            position: self.position,
            toughness: profile.toughness,
            // Walls always slide to the front of the board.
            slide_priority: 1000,
            moveable: true,
            multi_chargeable: false,
            color: None,
            charged: None,
            wall: None,
            kind: PieceKind::Wall {
                max_toughness: profile.max_toughness,
            },
        })
    }

    /// True if `other` can be absorbed into this piece: wall+wall within the
    /// toughness cap, or two charging formations of equal base size and color.
    pub fn can_merge(&self, other: &Piece) -> bool {
        let piece = self.concrete();
        let other = other.concrete();
        match (&piece.kind, &other.kind) {
            (PieceKind::Wall { max_toughness }, PieceKind::Wall { .. }) => {
                piece.toughness + other.toughness <= *max_toughness
            }
            (
                PieceKind::Charging { base_size: a, .. },
                PieceKind::Charging { base_size: b, .. },
            ) => a == b && piece.color == other.color,
            _ => false,
        }
    }

    /// Absorbs `other` into this piece, growing the footprint by the
    /// absorbed height (union of vertically stacked footprints).
    pub fn merge(&mut self, other: &Piece) -> Result<(), CapabilityError> {
        if let PieceKind::Ghost(inner) = &mut self.kind {
            return inner.merge(other);
        }
        if !self.can_merge(other) {
            return Err(CapabilityError::NotMergeable);
        }
        let other = other.concrete();
        match &mut self.kind {
            PieceKind::Wall { .. } => {
                self.toughness += other.toughness;
            }
            PieceKind::Charging {
                max_power,
                turns_left,
                ..
            } => {
                let at_my_turn = other.charge_at_turn(*turns_left);
                if let PieceKind::Charging {
                    max_power: other_max,
                    ..
                } = other.kind
                {
                    *max_power += other_max;
                }
                // Credit the absorbed unit as though it had been charging
                // for as long as this one.
                self.toughness += at_my_turn;
            }
            _ => return Err(CapabilityError::NotMergeable),
        }
        self.size.height += other.size.height;
        Ok(())
    }

    /// The scheduled power of a charging piece with `n` turns to go,
    /// ignoring damage and bonuses.
    fn default_charge_at_turn(&self, n: u32) -> i32 {
        match self.concrete().kind {
            PieceKind::Charging {
                initial_power,
                max_power,
                max_turns,
                ..
            } => {
                if max_turns == 0 {
                    return max_power;
                }
                let elapsed = max_turns.saturating_sub(n) as i64;
                let span = (max_power - initial_power) as i64;
                initial_power + (span * elapsed / max_turns as i64) as i32
            }
            _ => 0,
        }
    }

    /// The actual power of a charging piece with `n` turns to go, carrying
    /// forward any damage or bonus it has accumulated.
    pub fn charge_at_turn(&self, n: u32) -> i32 {
        let piece = self.concrete();
        match piece.kind {
            PieceKind::Charging { turns_left, .. } => {
                let drift = piece.default_charge_at_turn(turns_left) - piece.toughness;
                piece.default_charge_at_turn(n) - drift
            }
            _ => piece.toughness,
        }
    }

    /// Damages this piece. A base unit dies to any hit, even a zero-strength
    /// one; walls and charging formations die when the hit meets or exceeds
    /// their toughness.
    pub fn damage(&mut self, amount: i32) -> DamageOutcome {
        if let PieceKind::Ghost(inner) = &mut self.kind {
            return inner.damage(amount);
        }
        let before = self.toughness;
        self.toughness = (before - amount).max(0);
        let dead = match self.kind {
            PieceKind::Base => true,
            _ => amount >= before,
        };
        DamageOutcome {
            remaining: self.toughness,
            dead,
        }
    }

    /// Per-turn advance for charging pieces; no-op for everything else.
    pub fn update(&mut self) {
        if let PieceKind::Ghost(inner) = &mut self.kind {
            inner.update();
            return;
        }
        if let PieceKind::Charging { turns_left, .. } = self.kind {
            let next = turns_left.saturating_sub(1);
            self.toughness = self.charge_at_turn(next);
            if let PieceKind::Charging { turns_left, .. } = &mut self.kind {
                *turns_left = next;
            }
        }
    }

    /// True once a charging piece has counted down and will attack this turn.
    pub fn ready_to_attack(&self) -> bool {
        matches!(
            self.concrete().kind,
            PieceKind::Charging { turns_left: 0, .. }
        )
    }
}
