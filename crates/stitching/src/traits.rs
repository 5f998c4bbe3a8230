use image::GrayImage;
use crate::{
    error::Result,
    types::{Correlation, CorrelationWindow},
};

/// Trait for algorithms that align two equally sized windows
pub trait Correlator: Send + Sync {
    /// Find the displacement `(dx, dy)` such that `fixed(x, y)` best matches
    /// `moving(x - dx, y - dy)`, together with the peak strength
    fn correlate(&self, fixed: &GrayImage, moving: &GrayImage) -> Result<Correlation>;
}

/// Windows cut from two adjacent tiles, plus the nominal step between the
/// tiles along the axis of adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairWindows {
    /// Window in the already placed neighbour
    pub fixed: CorrelationWindow,
    /// Window in the tile being placed
    pub moving: CorrelationWindow,
    /// Tile dimension minus window dimension along the adjacency axis
    pub step: u32,
}

/// Trait deciding how much of two neighbouring tiles overlaps
pub trait OverlapWindowPolicy: Send + Sync {
    /// Windows for `current` placed to the right of `left`.
    /// Both arguments are tile indices in supply order.
    fn horizontal(&self, left: usize, current: usize, tile_size: (u32, u32)) -> Result<PairWindows>;

    /// Windows for `current` placed below `top`
    fn vertical(&self, top: usize, current: usize, tile_size: (u32, u32)) -> Result<PairWindows>;
}
