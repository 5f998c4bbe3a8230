use image::Primitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{preflight_estimation, run_estimation, GridParameters};
use crate::{
    algorithms::{ImportMode, InteriorBlend},
    error::Result,
    types::{StitchedCoordinates, TileSet},
};

/// Estimates the global origin of every tile in a grid.
///
/// The import mode says how the tiles were collected. In the Zeiss legacy
/// mode the grid cells and nominal overlaps come from each tile's stage
/// metadata and `overlap_percent` is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetermineStitchingCoordinates {
    #[serde(flatten)]
    pub grid: GridParameters,
    #[serde(default)]
    pub import_mode: ImportMode,
    #[serde(default)]
    pub interior_blend: InteriorBlend,
}

impl DetermineStitchingCoordinates {
    pub fn new(grid: GridParameters, import_mode: ImportMode) -> Self {
        Self {
            grid,
            import_mode,
            interior_blend: InteriorBlend::default(),
        }
    }

    pub fn with_blend(mut self, interior_blend: InteriorBlend) -> Self {
        self.interior_blend = interior_blend;
        self
    }

    /// Validate the configuration against the tiles without correlating
    pub fn preflight<T: Primitive>(&self, tiles: &TileSet<T>) -> Result<()> {
        preflight_estimation(tiles, &self.grid, self.import_mode)
    }

    pub fn execute<T>(&self, tiles: &TileSet<T>) -> Result<StitchedCoordinates>
    where
        T: Primitive + Send + Sync,
    {
        run_estimation(tiles, &self.grid, self.import_mode, self.interior_blend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use crate::{
        error::StitchError,
        test_utils::{cut, textured_scene, tiles_at},
        types::{GlobalOrigin, StageMetadata, Tile, TileImage},
    };

    fn grid_positions() -> Vec<(u32, u32)> {
        vec![(0, 0), (8, 0), (0, 8), (8, 8)]
    }

    #[test]
    fn test_row_comb_two_by_two() {
        let scene = textured_scene(18, 18, 5);
        let tiles = tiles_at(&scene, &grid_positions(), (10, 10));
        let filter = DetermineStitchingCoordinates::new(GridParameters::new(2, 2, 20.0), ImportMode::RowComb);

        filter.preflight(&tiles).expect("Configuration is valid");
        let coordinates = filter.execute(&tiles).expect("Should stitch");

        assert_eq!(coordinates.names, tiles.names());
        assert_eq!(
            coordinates.origins,
            vec![
                GlobalOrigin::new(0.0, 0.0),
                GlobalOrigin::new(8.0, 0.0),
                GlobalOrigin::new(0.0, 8.0),
                GlobalOrigin::new(8.0, 8.0),
            ]
        );
    }

    #[test]
    fn test_striped_solid_tiles_keep_nominal_overlap() {
        // Solid tiles, bright two pixels wide along the right and bottom edges
        let striped = TileImage::<u8>::from_fn(10, 10, |x, y| {
            if x >= 8 || y >= 8 { Luma([250]) } else { Luma([40]) }
        });
        let tiles: TileSet<u8> = (0..4)
            .map(|i| Tile::new(format!("tile_{i}"), striped.clone()))
            .collect();
        let filter = DetermineStitchingCoordinates::new(GridParameters::new(2, 2, 20.0), ImportMode::RowComb);

        let coordinates = filter.execute(&tiles).expect("Should stitch");
        assert_eq!(
            coordinates.origins,
            vec![
                GlobalOrigin::new(0.0, 0.0),
                GlobalOrigin::new(8.0, 0.0),
                GlobalOrigin::new(0.0, 8.0),
                GlobalOrigin::new(8.0, 8.0),
            ]
        );
    }

    #[test]
    fn test_row_snake_reports_supply_order() {
        let scene = textured_scene(26, 18, 9);
        // Supplied as a snake: top row left to right, bottom row right to left
        let positions = vec![(0, 0), (8, 0), (16, 0), (16, 8), (8, 8), (0, 8)];
        let tiles = tiles_at(&scene, &positions, (10, 10));
        let filter = DetermineStitchingCoordinates::new(GridParameters::new(3, 2, 20.0), ImportMode::RowSnake);

        let coordinates = filter.execute(&tiles).expect("Should stitch");
        let expected: Vec<GlobalOrigin> = positions
            .iter()
            .map(|&(x, y)| GlobalOrigin::new(x as f64, y as f64))
            .collect();
        assert_eq!(coordinates.origins, expected);
    }

    #[test]
    fn test_preflight_rejects_bad_configuration() {
        let scene = textured_scene(18, 18, 5);
        let tiles = tiles_at(&scene, &grid_positions(), (10, 10));

        let mismatch = DetermineStitchingCoordinates::new(GridParameters::new(3, 2, 20.0), ImportMode::RowComb);
        assert!(matches!(
            mismatch.preflight(&tiles),
            Err(StitchError::TileCountMismatch { expected: 6, actual: 4 })
        ));

        let tiny_overlap = DetermineStitchingCoordinates::new(GridParameters::new(2, 2, 5.0), ImportMode::RowComb);
        assert!(matches!(
            tiny_overlap.preflight(&tiles),
            Err(StitchError::InvalidOverlap(_))
        ));

        let no_metadata =
            DetermineStitchingCoordinates::new(GridParameters::new(2, 2, 20.0), ImportMode::ZeissLegacy);
        assert!(matches!(
            no_metadata.preflight(&tiles),
            Err(StitchError::MissingMetadata { tile: 0, .. })
        ));
    }

    #[test]
    fn test_column_snake_on_non_permuting_grid_is_rejected() {
        let tiles: TileSet<u8> = (0..6)
            .map(|i| Tile::new(format!("t{i}"), TileImage::new(10, 10)))
            .collect();
        let filter = DetermineStitchingCoordinates::new(GridParameters::new(3, 2, 20.0), ImportMode::ColumnSnake);

        assert!(matches!(filter.preflight(&tiles), Err(StitchError::InvalidTileOrder(_))));
        assert!(matches!(filter.execute(&tiles), Err(StitchError::InvalidTileOrder(_))));
    }

    #[test]
    fn test_legacy_metadata_drives_layout() {
        let scene = textured_scene(18, 18, 13);
        let positions = grid_positions();
        // Supplied column by column, the metadata says where each tile sits
        let supply = [0usize, 2, 1, 3];
        let tiles: TileSet<u8> = supply
            .iter()
            .map(|&cell| {
                let (x, y) = positions[cell];
                let metadata = StageMetadata {
                    x_tile_index: (cell % 2).to_string(),
                    y_tile_index: (cell / 2).to_string(),
                    x_stage_position: (x as f64 * 0.5).to_string(),
                    y_stage_position: (y as f64 * 0.5).to_string(),
                    x_scale_factor: "0.5".to_string(),
                    y_scale_factor: "0.5".to_string(),
                };
                Tile::new(format!("cell_{cell}"), cut(&scene, x, y, 10, 10))
                    .with_metadata(metadata)
            })
            .collect();

        // The declared percent is ignored in legacy mode
        let filter = DetermineStitchingCoordinates::new(GridParameters::new(2, 2, 1.0), ImportMode::ZeissLegacy);
        let coordinates = filter.execute(&tiles).expect("Should stitch");

        assert_eq!(coordinates.origin_of("cell_0"), Some(GlobalOrigin::new(0.0, 0.0)));
        assert_eq!(coordinates.origin_of("cell_1"), Some(GlobalOrigin::new(8.0, 0.0)));
        assert_eq!(coordinates.origin_of("cell_2"), Some(GlobalOrigin::new(0.0, 8.0)));
        assert_eq!(coordinates.origin_of("cell_3"), Some(GlobalOrigin::new(8.0, 8.0)));
    }

    #[test]
    fn test_filter_deserializes_with_flattened_grid() {
        let json = r#"{"x_tile_dim": 3, "y_tile_dim": 2, "overlap_percent": 15.0, "import_mode": 2}"#;
        let filter: DetermineStitchingCoordinates = serde_json::from_str(json).expect("Should parse");

        assert_eq!(filter.grid, GridParameters::new(3, 2, 15.0));
        assert_eq!(filter.import_mode, ImportMode::RowSnake);
        assert_eq!(filter.interior_blend, InteriorBlend::Mean);
    }
}
