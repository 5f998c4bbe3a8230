use image::{GrayImage, ImageBuffer, Luma, Primitive};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StitchError};

/// Single-channel raster holding one tile's pixels.
pub type TileImage<T> = ImageBuffer<Luma<T>, Vec<T>>;

/// Raw per-tile microscope metadata, kept as the strings the acquisition
/// software wrote. Only the legacy import path reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageMetadata {
    /// Column of the tile in the acquisition grid
    pub x_tile_index: String,
    /// Row of the tile in the acquisition grid
    pub y_tile_index: String,
    /// Stage X position in physical units
    pub x_stage_position: String,
    /// Stage Y position in physical units
    pub y_stage_position: String,
    /// Physical units per pixel along X
    pub x_scale_factor: String,
    /// Physical units per pixel along Y
    pub y_scale_factor: String,
}

/// One source raster of a montage.
#[derive(Debug, Clone)]
pub struct Tile<T: Primitive> {
    pub name: String,
    pub image: TileImage<T>,
    pub metadata: Option<StageMetadata>,
}

impl<T: Primitive> Tile<T> {
    pub fn new(name: impl Into<String>, image: TileImage<T>) -> Self {
        Self {
            name: name.into(),
            image,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: StageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 8-bit copy of the tile used for correlation.
    ///
    /// Integer pixel types are mapped linearly from their full range, float
    /// types from `[0, 1]`, onto `[0, 255]`.
    pub fn to_gray8(&self) -> GrayImage {
        let min = T::DEFAULT_MIN_VALUE.to_f64().unwrap_or(0.0);
        let max = T::DEFAULT_MAX_VALUE.to_f64().unwrap_or(1.0);
        let range = (max - min).max(f64::MIN_POSITIVE);

        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            let value = self.image.get_pixel(x, y)[0].to_f64().unwrap_or(min);
            let scaled = (value - min) / range * 255.0;
            Luma([scaled.round().clamp(0.0, 255.0) as u8])
        })
    }
}

/// Owns every tile of a run. Tiles are addressed by their index, which is
/// the order the caller supplied them in.
#[derive(Debug, Clone)]
pub struct TileSet<T: Primitive> {
    tiles: Vec<Tile<T>>,
}

impl<T: Primitive> TileSet<T> {
    pub fn new(tiles: Vec<Tile<T>>) -> Self {
        Self { tiles }
    }

    pub fn push(&mut self, tile: Tile<T>) {
        self.tiles.push(tile);
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tile<T>> {
        self.tiles.get(index)
    }

    pub fn tiles(&self) -> &[Tile<T>] {
        &self.tiles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tile<T>> {
        self.tiles.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.tiles.iter().map(|tile| tile.name.clone()).collect()
    }

    /// Common `(width, height)` of all tiles. Fails when the set is empty or
    /// the tiles disagree.
    pub fn tile_size(&self) -> Result<(u32, u32)> {
        let first = self.tiles.first().ok_or(StitchError::EmptyTileSet)?;
        let expected = first.image.dimensions();

        for (index, tile) in self.tiles.iter().enumerate().skip(1) {
            let actual = tile.image.dimensions();
            if actual != expected {
                return Err(StitchError::TileSizeMismatch {
                    index,
                    expected,
                    actual,
                });
            }
        }

        Ok(expected)
    }
}

impl<T: Primitive> FromIterator<Tile<T>> for TileSet<T> {
    fn from_iter<I: IntoIterator<Item = Tile<T>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Position of a tile in the shared montage coordinate frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct GlobalOrigin {
    pub x: f64,
    pub y: f64,
}

impl GlobalOrigin {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translate(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Component-wise mean of two estimates
    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

/// Rectangular region of a tile handed to the correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CorrelationWindow {
    pub origin_x: u32,
    pub origin_y: u32,
    pub size_x: u32,
    pub size_y: u32,
}

impl CorrelationWindow {
    pub fn new(origin_x: u32, origin_y: u32, size_x: u32, size_y: u32) -> Self {
        Self {
            origin_x,
            origin_y,
            size_x,
            size_y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size_x == 0 || self.size_y == 0
    }

    /// Copy the window out of `image`. The copy's origin is (0, 0).
    pub fn extract(&self, image: &GrayImage) -> Result<GrayImage> {
        let (width, height) = image.dimensions();
        let fits = self.origin_x.checked_add(self.size_x).is_some_and(|end| end <= width)
            && self.origin_y.checked_add(self.size_y).is_some_and(|end| end <= height);

        if self.is_empty() || !fits {
            return Err(StitchError::InvalidWindow(format!(
                "{:?} does not fit inside a {}x{} tile",
                self, width, height
            )));
        }

        Ok(image::imageops::crop_imm(
            image,
            self.origin_x,
            self.origin_y,
            self.size_x,
            self.size_y,
        )
        .to_image())
    }
}

/// Best alignment found between two windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub dx: i64,
    pub dy: i64,
    /// Normalized correlation at the peak, in `[-1, 1]`
    pub peak: f64,
}

/// Global origin of every tile, in the order the tiles were supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StitchedCoordinates {
    pub names: Vec<String>,
    pub origins: Vec<GlobalOrigin>,
}

impl StitchedCoordinates {
    pub fn new(names: Vec<String>, origins: Vec<GlobalOrigin>) -> Result<Self> {
        if names.len() != origins.len() {
            return Err(StitchError::CoordinateCountMismatch {
                expected: names.len(),
                actual: origins.len(),
            });
        }
        Ok(Self { names, origins })
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Origin of the tile with the given name
    pub fn origin_of(&self, name: &str) -> Option<GlobalOrigin> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| self.origins[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, GlobalOrigin)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.origins.iter().copied())
    }
}

/// Composited raster of all tiles.
#[derive(Debug, Clone)]
pub struct Montage<T: Primitive> {
    pub image: TileImage<T>,
    /// Global coordinate of the montage's top-left pixel
    pub origin: GlobalOrigin,
}

impl<T: Primitive> Montage<T> {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
