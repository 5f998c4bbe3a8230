use image::Primitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use super::{DetermineStitchingCoordinates, GridParameters, StitchImages};
use crate::{
    algorithms::{ImportMode, InteriorBlend},
    error::Result,
    types::{Montage, StitchedCoordinates, TileSet},
};

/// A stitching operation and its parameters, as it appears in a job file
#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params")]
#[strum(serialize_all = "snake_case")]
pub enum StitchCommand {
    /// Estimate the global origin of every tile
    #[serde(rename = "determine_coordinates")]
    DetermineCoordinates {
        #[serde(default)]
        import_mode: ImportMode,
        #[serde(default)]
        interior_blend: InteriorBlend,
    },

    /// Estimate origins and composite a montage
    #[serde(rename = "stitch_images")]
    StitchImages {
        #[serde(default)]
        use_legacy_metadata: bool,
        #[serde(default)]
        interior_blend: InteriorBlend,
    },
}

/// What a command produced
#[derive(Debug, Clone)]
pub struct CommandOutput<T: Primitive> {
    pub coordinates: StitchedCoordinates,
    pub montage: Option<Montage<T>>,
}

impl StitchCommand {
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(StitchCommand)
    }

    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::DetermineCoordinates { .. } => {
                "Estimate the global origin of every tile by correlating overlapping neighbours"
            }
            Self::StitchImages { .. } => "Estimate tile origins and paste all tiles into a single montage",
        }
    }

    pub fn produces_montage(&self) -> bool {
        matches!(self, Self::StitchImages { .. })
    }

    pub fn preflight<T: Primitive>(&self, grid: GridParameters, tiles: &TileSet<T>) -> Result<()> {
        match *self {
            Self::DetermineCoordinates {
                import_mode,
                interior_blend,
            } => DetermineStitchingCoordinates::new(grid, import_mode)
                .with_blend(interior_blend)
                .preflight(tiles),
            Self::StitchImages {
                use_legacy_metadata,
                interior_blend,
            } => StitchImages::new(grid, use_legacy_metadata)
                .with_blend(interior_blend)
                .preflight(tiles),
        }
    }

    pub fn run<T>(&self, grid: GridParameters, tiles: &TileSet<T>) -> Result<CommandOutput<T>>
    where
        T: Primitive + Send + Sync,
    {
        match *self {
            Self::DetermineCoordinates {
                import_mode,
                interior_blend,
            } => {
                let coordinates = DetermineStitchingCoordinates::new(grid, import_mode)
                    .with_blend(interior_blend)
                    .execute(tiles)?;
                Ok(CommandOutput {
                    coordinates,
                    montage: None,
                })
            }
            Self::StitchImages {
                use_legacy_metadata,
                interior_blend,
            } => {
                let output = StitchImages::new(grid, use_legacy_metadata)
                    .with_blend(interior_blend)
                    .execute(tiles)?;
                Ok(CommandOutput {
                    coordinates: output.coordinates,
                    montage: Some(output.montage),
                })
            }
        }
    }
}
