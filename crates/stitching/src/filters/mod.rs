//! Drivers that take a tile set through validation and execution, the way a
//! pipeline host runs its filters: `preflight` checks the configuration
//! without correlating anything, `execute` runs the full computation.

pub mod command;
pub mod determine_coordinates;
pub mod stitch_images;

pub use command::{CommandOutput, StitchCommand};
pub use determine_coordinates::DetermineStitchingCoordinates;
pub use stitch_images::{StitchImages, StitchOutput};

use image::Primitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    algorithms::{
        estimation::check_grid, resolve_comb, resolve_from_grid, validate_order, DeclaredOffsetOverlap,
        GlobalOriginEstimator, ImportMode, InteriorBlend, LegacyLayout, NormalizedCrossCorrelator,
        PercentageOverlap,
    },
    error::{Result, StitchError},
    types::{StitchedCoordinates, TileSet},
};

fn default_overlap_percent() -> f64 {
    10.0
}

/// Shape of the tile grid and the nominal overlap between neighbours
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GridParameters {
    /// Number of tile columns
    pub x_tile_dim: usize,
    /// Number of tile rows
    pub y_tile_dim: usize,
    /// Share of a tile, in percent, that overlaps its neighbour
    #[serde(default = "default_overlap_percent")]
    #[schemars(range(min = 0.0, max = 100.0))]
    pub overlap_percent: f64,
}

impl GridParameters {
    pub fn new(x_tile_dim: usize, y_tile_dim: usize, overlap_percent: f64) -> Self {
        Self {
            x_tile_dim,
            y_tile_dim,
            overlap_percent,
        }
    }
}

/// Configuration checks shared by both drivers
pub(crate) fn preflight_estimation<T: Primitive>(
    tiles: &TileSet<T>,
    grid: &GridParameters,
    mode: ImportMode,
) -> Result<()> {
    check_grid(tiles.len(), grid.x_tile_dim, grid.y_tile_dim)?;
    let tile_size = tiles.tile_size()?;

    if mode.is_legacy() {
        let layout = LegacyLayout::from_tiles(tiles)?;
        resolve_from_grid(&layout.x_tiles, &layout.y_tiles, grid.x_tile_dim, grid.y_tile_dim)?;
    } else {
        PercentageOverlap::new(grid.overlap_percent)?.validate(tile_size)?;
        let order = resolve_comb(mode, grid.x_tile_dim, grid.y_tile_dim);
        validate_order(&order, tiles.len()).map_err(|error| {
            StitchError::InvalidTileOrder(format!(
                "import mode '{}' does not produce a valid order for a {}x{} grid ({})",
                mode, grid.x_tile_dim, grid.y_tile_dim, error
            ))
        })?;
    }

    Ok(())
}

/// Estimate the global origin of every tile
pub(crate) fn run_estimation<T>(
    tiles: &TileSet<T>,
    grid: &GridParameters,
    mode: ImportMode,
    blend: InteriorBlend,
) -> Result<StitchedCoordinates>
where
    T: Primitive + Send + Sync,
{
    preflight_estimation(tiles, grid, mode)?;
    info!(mode = %mode, blend = %blend, tiles = tiles.len(), "Determining stitching coordinates");

    let (x_dim, y_dim) = (grid.x_tile_dim, grid.y_tile_dim);
    let origins = if mode.is_legacy() {
        let layout = LegacyLayout::from_tiles(tiles)?;
        let order = resolve_from_grid(&layout.x_tiles, &layout.y_tiles, x_dim, y_dim)?;
        let policy = DeclaredOffsetOverlap::new(layout.x_positions, layout.y_positions);
        GlobalOriginEstimator::new(policy, NormalizedCrossCorrelator)
            .with_blend(blend)
            .estimate(tiles, &order, x_dim, y_dim)?
    } else {
        let order = resolve_comb(mode, x_dim, y_dim);
        let policy = PercentageOverlap::new(grid.overlap_percent)?;
        GlobalOriginEstimator::new(policy, NormalizedCrossCorrelator)
            .with_blend(blend)
            .estimate(tiles, &order, x_dim, y_dim)?
    };

    StitchedCoordinates::new(tiles.names(), origins)
}
