//! Conversion of the order tiles were supplied in into comb order: the
//! row-major walk over the tile grid that origin estimation follows.
//!
//! Every resolver returns `order` with `order[comb_position] = tile_index`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::error::{Result, StitchError};

/// How the tiles of a grid were collected
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "snake_case", try_from = "ImportModeRepr")]
#[strum(serialize_all = "snake_case")]
pub enum ImportMode {
    /// Row by row, each row left to right
    #[default]
    RowComb,
    /// Column by column, each column top to bottom
    ColumnComb,
    /// Row by row, alternating direction
    RowSnake,
    /// Column by column, alternating direction
    ColumnSnake,
    /// Grid cells and stage positions come from per-tile Zeiss metadata
    ZeissLegacy,
}

impl ImportMode {
    /// Numeric code used by older pipeline files
    pub fn code(self) -> u32 {
        match self {
            Self::RowComb => 0,
            Self::ColumnComb => 1,
            Self::RowSnake => 2,
            Self::ColumnSnake => 3,
            Self::ZeissLegacy => 5,
        }
    }

    /// Inverse of [`ImportMode::code`]. Unknown codes fall back to row comb.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::ColumnComb,
            2 => Self::RowSnake,
            3 => Self::ColumnSnake,
            5 => Self::ZeissLegacy,
            _ => Self::RowComb,
        }
    }

    pub fn is_legacy(self) -> bool {
        self == Self::ZeissLegacy
    }
}

/// Accepts either the snake_case name or the numeric code
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportModeRepr {
    Code(u32),
    Name(String),
}

impl TryFrom<ImportModeRepr> for ImportMode {
    type Error = String;

    fn try_from(repr: ImportModeRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ImportModeRepr::Code(code) => Ok(Self::from_code(code)),
            ImportModeRepr::Name(name) => name
                .parse()
                .map_err(|_| format!("unknown import mode '{}'", name)),
        }
    }
}

/// Comb order for the grid-declared layouts.
///
/// The column modes reproduce the historical index arithmetic exactly. For
/// column snake that arithmetic does not produce a permutation on most grids;
/// callers run [`validate_order`] before using the result.
pub fn resolve_comb(mode: ImportMode, x_dim: usize, y_dim: usize) -> Vec<usize> {
    let count = x_dim * y_dim;
    let mut order: Vec<usize> = (0..count).collect();

    match mode {
        ImportMode::ColumnComb => {
            let mut counter = 0;
            for x in 0..x_dim {
                for y in 0..y_dim {
                    order[x + y * x_dim] = counter;
                    counter += 1;
                }
            }
        }
        ImportMode::RowSnake => {
            for y in 0..y_dim {
                for x in 0..x_dim {
                    order[x + y * x_dim] = if y % 2 == 0 {
                        x + y * x_dim
                    } else {
                        (y + 1) * x_dim - x - 1
                    };
                }
            }
        }
        ImportMode::ColumnSnake => {
            for x in 0..x_dim {
                for y in 0..y_dim {
                    order[x + y * x_dim] = if y % 2 == 0 {
                        x + y * x_dim
                    } else {
                        let line_start = y_dim * (x_dim - 1) + y;
                        line_start - x * y_dim
                    };
                }
            }
        }
        ImportMode::RowComb | ImportMode::ZeissLegacy => {}
    }

    order
}

/// Comb order for tiles that declare their own grid cell.
///
/// `x_tiles[i]` and `y_tiles[i]` are the column and row of tile `i`. A cell
/// outside the grid, two tiles in one cell, or an empty cell is an error.
pub fn resolve_from_grid(
    x_tiles: &[usize],
    y_tiles: &[usize],
    x_dim: usize,
    y_dim: usize,
) -> Result<Vec<usize>> {
    if x_tiles.len() != y_tiles.len() {
        return Err(StitchError::InvalidTileOrder(format!(
            "{} column indices but {} row indices",
            x_tiles.len(),
            y_tiles.len()
        )));
    }

    let mut cells: Vec<Option<usize>> = vec![None; x_dim * y_dim];

    for (tile, (&x, &y)) in x_tiles.iter().zip(y_tiles).enumerate() {
        if x >= x_dim || y >= y_dim {
            return Err(StitchError::GridCellNotFound { tile, x, y });
        }

        let cell = &mut cells[y * x_dim + x];
        if let Some(previous) = cell {
            return Err(StitchError::InvalidTileOrder(format!(
                "tiles {} and {} both declare grid cell ({}, {})",
                previous, tile, x, y
            )));
        }
        *cell = Some(tile);
    }

    cells
        .into_iter()
        .enumerate()
        .map(|(position, cell)| {
            cell.ok_or_else(|| {
                StitchError::InvalidTileOrder(format!(
                    "no tile declares grid cell ({}, {})",
                    position % x_dim,
                    position / x_dim
                ))
            })
        })
        .collect()
}

/// Check that `order` visits each of `tile_count` tiles exactly once
pub fn validate_order(order: &[usize], tile_count: usize) -> Result<()> {
    if order.len() != tile_count {
        return Err(StitchError::InvalidTileOrder(format!(
            "order has {} entries for {} tiles",
            order.len(),
            tile_count
        )));
    }

    let mut seen = vec![false; tile_count];
    for (position, &tile) in order.iter().enumerate() {
        if tile >= tile_count || seen[tile] {
            return Err(StitchError::InvalidTileOrder(format!(
                "comb position {} maps to tile {} which is out of range or already visited",
                position, tile
            )));
        }
        seen[tile] = true;
    }

    Ok(())
}

/// Re-express values computed in comb order in supply order
pub fn to_original_order<V: Copy>(comb: &[V], order: &[usize]) -> Vec<V> {
    let mut original = comb.to_vec();
    for (position, &tile) in order.iter().enumerate() {
        original[tile] = comb[position];
    }
    original
}

/// Re-express values held in supply order in comb order
pub fn to_comb_order<V: Copy>(original: &[V], order: &[usize]) -> Vec<V> {
    order.iter().map(|&tile| original[tile]).collect()
}
