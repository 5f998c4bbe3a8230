use thiserror::Error;

#[derive(Error, Debug)]
pub enum StitchError {
    #[error("Tile grid must be at least 1x1, got {x_tile_dim}x{y_tile_dim}")]
    InvalidGrid { x_tile_dim: usize, y_tile_dim: usize },

    #[error("No tiles supplied")]
    EmptyTileSet,

    #[error("Expected {expected} tiles for the tile grid, found {actual}")]
    TileCountMismatch { expected: usize, actual: usize },

    #[error("Tile {index} is {actual:?} pixels, expected {expected:?}")]
    TileSizeMismatch {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Invalid overlap configuration: {0}")]
    InvalidOverlap(String),

    #[error("Invalid correlation window: {0}")]
    InvalidWindow(String),

    #[error("Invalid tile order: {0}")]
    InvalidTileOrder(String),

    #[error("Tile {tile} declares grid cell ({x}, {y}) which is outside the tile grid")]
    GridCellNotFound { tile: usize, x: usize, y: usize },

    #[error("Tile {tile} ('{name}') has no stage metadata")]
    MissingMetadata { tile: usize, name: String },

    #[error("Could not parse '{value}' in array '{array}' at index {index}")]
    MetadataParse {
        array: String,
        value: String,
        index: usize,
    },

    #[error("Expected {expected} coordinates, found {actual}")]
    CoordinateCountMismatch { expected: usize, actual: usize },

    #[error("Tile {tile} has origin ({x}, {y}) which cannot be placed on a montage")]
    InvalidOrigin { tile: usize, x: f64, y: f64 },

    #[error("Unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StitchError {
    /// Numeric status code reported alongside the message. Every variant has
    /// its own negative code.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidGrid { .. } => -11000,
            Self::EmptyTileSet => -11001,
            Self::TileCountMismatch { .. } => -11002,
            Self::TileSizeMismatch { .. } => -11003,
            Self::InvalidOverlap(_) => -11004,
            Self::InvalidWindow(_) => -11005,
            Self::InvalidTileOrder(_) => -11006,
            Self::GridCellNotFound { .. } => -11007,
            Self::MissingMetadata { .. } => -11008,
            Self::MetadataParse { .. } => -11009,
            Self::CoordinateCountMismatch { .. } => -11010,
            Self::UnsupportedPixelType(_) => -11011,
            Self::Image(_) => -11012,
            Self::Serialization(_) => -11013,
            Self::Io(_) => -11014,
            Self::InvalidOrigin { .. } => -11015,
        }
    }
}

pub type Result<T> = std::result::Result<T, StitchError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_negative_and_unique() {
        let errors = vec![
            StitchError::InvalidGrid { x_tile_dim: 0, y_tile_dim: 1 },
            StitchError::EmptyTileSet,
            StitchError::TileCountMismatch { expected: 4, actual: 3 },
            StitchError::TileSizeMismatch { index: 1, expected: (10, 10), actual: (9, 10) },
            StitchError::InvalidOverlap("zero".to_string()),
            StitchError::InvalidWindow("empty".to_string()),
            StitchError::InvalidTileOrder("dup".to_string()),
            StitchError::GridCellNotFound { tile: 0, x: 5, y: 5 },
            StitchError::MissingMetadata { tile: 0, name: "a".to_string() },
            StitchError::MetadataParse { array: "x".to_string(), value: "?".to_string(), index: 0 },
            StitchError::CoordinateCountMismatch { expected: 2, actual: 1 },
            StitchError::UnsupportedPixelType("rgb".to_string()),
            StitchError::InvalidOrigin { tile: 0, x: f64::NAN, y: 0.0 },
            StitchError::Io(std::io::Error::other("io")),
        ];

        let codes: HashSet<i32> = errors.iter().map(StitchError::code).collect();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|&code| code < 0));
    }

    #[test]
    fn test_metadata_parse_message_names_offender() {
        let error = StitchError::MetadataParse {
            array: "x_stage_position".to_string(),
            value: "12,5".to_string(),
            index: 3,
        };
        let message = error.to_string();
        assert!(message.contains("x_stage_position"));
        assert!(message.contains("12,5"));
        assert!(message.contains('3'));
    }
}
