use image::Primitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{preflight_estimation, run_estimation, GridParameters};
use crate::{
    algorithms::{compose_montage, ImportMode, InteriorBlend},
    error::{Result, StitchError},
    types::{GlobalOrigin, Montage, StitchedCoordinates, TileSet},
};

/// Estimates tile origins and pastes the tiles into one montage.
///
/// Without legacy metadata the tiles are taken as supplied in row-comb
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StitchImages {
    #[serde(flatten)]
    pub grid: GridParameters,
    #[serde(default)]
    pub use_legacy_metadata: bool,
    #[serde(default)]
    pub interior_blend: InteriorBlend,
}

#[derive(Debug, Clone)]
pub struct StitchOutput<T: Primitive> {
    pub coordinates: StitchedCoordinates,
    pub montage: Montage<T>,
}

impl StitchImages {
    pub fn new(grid: GridParameters, use_legacy_metadata: bool) -> Self {
        Self {
            grid,
            use_legacy_metadata,
            interior_blend: InteriorBlend::default(),
        }
    }

    pub fn with_blend(mut self, interior_blend: InteriorBlend) -> Self {
        self.interior_blend = interior_blend;
        self
    }

    pub fn import_mode(&self) -> ImportMode {
        if self.use_legacy_metadata {
            ImportMode::ZeissLegacy
        } else {
            ImportMode::RowComb
        }
    }

    pub fn preflight<T: Primitive>(&self, tiles: &TileSet<T>) -> Result<()> {
        preflight_estimation(tiles, &self.grid, self.import_mode())
    }

    pub fn execute<T>(&self, tiles: &TileSet<T>) -> Result<StitchOutput<T>>
    where
        T: Primitive + Send + Sync,
    {
        let coordinates = run_estimation(tiles, &self.grid, self.import_mode(), self.interior_blend)?;
        let montage = compose_montage(tiles, &coordinates.origins)?;

        info!(
            width = montage.width(),
            height = montage.height(),
            "Stitched {} tiles",
            tiles.len()
        );

        Ok(StitchOutput { coordinates, montage })
    }

    /// Composite from coordinates computed earlier, matched to tiles by name
    pub fn compose<T: Primitive>(
        tiles: &TileSet<T>,
        coordinates: &StitchedCoordinates,
    ) -> Result<Montage<T>> {
        if coordinates.len() != tiles.len() {
            return Err(StitchError::CoordinateCountMismatch {
                expected: tiles.len(),
                actual: coordinates.len(),
            });
        }

        let origins = tiles
            .iter()
            .map(|tile| {
                coordinates.origin_of(&tile.name).ok_or_else(|| {
                    StitchError::InvalidTileOrder(format!("no coordinates recorded for tile '{}'", tile.name))
                })
            })
            .collect::<Result<Vec<GlobalOrigin>>>()?;

        compose_montage(tiles, &origins)
    }
}
