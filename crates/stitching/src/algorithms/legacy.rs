//! Parsing of the per-tile Zeiss metadata used by the legacy import mode.

use std::str::FromStr;

use image::Primitive;

use crate::{
    error::{Result, StitchError},
    types::{StageMetadata, TileSet},
};

/// Numeric layout recovered from tile metadata, indexed by tile.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyLayout {
    pub x_tiles: Vec<usize>,
    pub y_tiles: Vec<usize>,
    /// Stage X positions converted to pixels
    pub x_positions: Vec<f64>,
    /// Stage Y positions converted to pixels
    pub y_positions: Vec<f64>,
}

impl LegacyLayout {
    /// Parse every tile's metadata. Any missing or malformed value aborts
    /// the whole parse.
    pub fn from_tiles<T: Primitive>(tiles: &TileSet<T>) -> Result<Self> {
        let metadata = require_metadata(tiles)?;
        Self::parse(&metadata)
    }

    pub fn parse(metadata: &[&StageMetadata]) -> Result<Self> {
        let mut layout = Self {
            x_tiles: Vec::with_capacity(metadata.len()),
            y_tiles: Vec::with_capacity(metadata.len()),
            x_positions: Vec::with_capacity(metadata.len()),
            y_positions: Vec::with_capacity(metadata.len()),
        };

        for (index, entry) in metadata.iter().enumerate() {
            layout.x_tiles.push(parse_field("x_tile_index", &entry.x_tile_index, index)?);
            layout.y_tiles.push(parse_field("y_tile_index", &entry.y_tile_index, index)?);

            let x_scale = parse_scale("x_scale_factor", &entry.x_scale_factor, index)?;
            let y_scale = parse_scale("y_scale_factor", &entry.y_scale_factor, index)?;
            let x_stage: f64 = parse_field("x_stage_position", &entry.x_stage_position, index)?;
            let y_stage: f64 = parse_field("y_stage_position", &entry.y_stage_position, index)?;

            layout.x_positions.push(x_stage / x_scale);
            layout.y_positions.push(y_stage / y_scale);
        }

        Ok(layout)
    }
}

/// Metadata of every tile, or the first tile that lacks it
pub fn require_metadata<T: Primitive>(tiles: &TileSet<T>) -> Result<Vec<&StageMetadata>> {
    tiles
        .iter()
        .enumerate()
        .map(|(tile, entry)| {
            entry.metadata.as_ref().ok_or_else(|| StitchError::MissingMetadata {
                tile,
                name: entry.name.clone(),
            })
        })
        .collect()
}

fn parse_field<V: FromStr>(array: &str, value: &str, index: usize) -> Result<V> {
    value.trim().parse().map_err(|_| StitchError::MetadataParse {
        array: array.to_string(),
        value: value.to_string(),
        index,
    })
}

fn parse_scale(array: &str, value: &str, index: usize) -> Result<f64> {
    let scale: f64 = parse_field(array, value, index)?;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(StitchError::MetadataParse {
            array: array.to_string(),
            value: value.to_string(),
            index,
        });
    }
    Ok(scale)
}
