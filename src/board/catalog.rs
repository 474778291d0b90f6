//! Piece description records and the factory boundary.
//!
//! Pieces are constructed from external template records (name, dimensions,
//! toughness, slide priority, optional charge and wall profiles). The catalog
//! deserializes a JSON array of templates and builds base pieces from them;
//! the core only requires the resulting pieces to satisfy the capability
//! contract in `piece.rs`.

use std::collections::HashMap;

use serde::Deserialize;

use crate::board::grid::Size;
use crate::board::piece::{ChargedProfile, Color, Piece, PieceKind, WallProfile};

/// Errors raised while loading or using a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to parse piece templates: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no piece template named \"{0}\"")]
    Unknown(String),
}

fn default_dimension() -> usize {
    1
}

fn default_region_height() -> usize {
    2
}

fn default_region_width() -> usize {
    2
}

/// Charge section of a template.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargedTemplate {
    #[serde(default = "default_region_height")]
    pub region_height: usize,
    pub initial_power: i32,
    pub max_power: i32,
    pub turns: u32,
}

/// Wall section of a template.
#[derive(Debug, Clone, Deserialize)]
pub struct WallTemplate {
    #[serde(default = "default_region_width")]
    pub region_width: usize,
    pub toughness: i32,
    pub max_toughness: i32,
}

/// One piece description record.
#[derive(Debug, Clone, Deserialize)]
pub struct PieceTemplate {
    pub name: String,
    #[serde(default = "default_dimension")]
    pub height: usize,
    #[serde(default = "default_dimension")]
    pub width: usize,
    #[serde(default)]
    pub toughness: i32,
    #[serde(default)]
    pub moveable: bool,
    #[serde(default)]
    pub slide_priority: i32,
    #[serde(default)]
    pub multi_chargeable: bool,
    #[serde(default)]
    pub charged: Option<ChargedTemplate>,
    #[serde(default)]
    pub wall: Option<WallTemplate>,
}

/// A set of piece templates indexed by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    templates: HashMap<String, PieceTemplate>,
}

impl Catalog {
    /// Loads a catalog from a JSON array of piece templates.
    pub fn from_json(text: &str) -> Result<Catalog, CatalogError> {
        let records: Vec<PieceTemplate> = serde_json::from_str(text)?;
        let mut templates = HashMap::new();
        for record in records {
            templates.insert(record.name.clone(), record);
        }
        Ok(Catalog { templates })
    }

    pub fn template(&self, name: &str) -> Option<&PieceTemplate> {
        self.templates.get(name)
    }

    /// Builds a base piece from the named template.
    pub fn create(&self, name: &str, color: Color) -> Result<Piece, CatalogError> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| CatalogError::Unknown(name.to_string()))?;
        Ok(Piece {
            name: template.name.clone(),
            size: Size::new(template.height, template.width),
            position: None,
            toughness: template.toughness,
            slide_priority: template.slide_priority,
            moveable: template.moveable,
            multi_chargeable: template.multi_chargeable,
            color: Some(color),
            charged: template.charged.as_ref().map(|c| ChargedProfile {
                region_height: c.region_height,
                initial_power: c.initial_power,
                max_power: c.max_power,
                turns: c.turns,
            }),
            wall: template.wall.as_ref().map(|w| WallProfile {
                region_width: w.region_width,
                toughness: w.toughness,
                max_toughness: w.max_toughness,
            }),
            kind: PieceKind::Base,
        })
    }
}
