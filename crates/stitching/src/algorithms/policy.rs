use crate::{
    error::{Result, StitchError},
    traits::{OverlapWindowPolicy, PairWindows},
    types::CorrelationWindow,
};

/// Windows cover a fixed percentage of the tile along the adjacency axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentageOverlap {
    pub percent: f64,
}

impl PercentageOverlap {
    pub fn new(percent: f64) -> Result<Self> {
        if !percent.is_finite() || percent <= 0.0 || percent > 100.0 {
            return Err(StitchError::InvalidOverlap(format!(
                "overlap percent must lie in (0, 100], got {}",
                percent
            )));
        }
        Ok(Self { percent })
    }

    /// Window length along an axis of `dimension` pixels
    pub fn window_len(&self, dimension: u32) -> Result<u32> {
        let len = (dimension as f64 * self.percent / 100.0).floor() as u32;
        if len == 0 {
            return Err(StitchError::InvalidOverlap(format!(
                "{}% of a {} pixel tile leaves an empty correlation window",
                self.percent, dimension
            )));
        }
        Ok(len.min(dimension))
    }

    /// Fail early when the tile size cannot produce a window on either axis
    pub fn validate(&self, tile_size: (u32, u32)) -> Result<()> {
        self.window_len(tile_size.0)?;
        self.window_len(tile_size.1)?;
        Ok(())
    }
}

impl OverlapWindowPolicy for PercentageOverlap {
    fn horizontal(&self, _left: usize, _current: usize, (width, height): (u32, u32)) -> Result<PairWindows> {
        let len = self.window_len(width)?;
        Ok(horizontal_windows(width, height, len))
    }

    fn vertical(&self, _top: usize, _current: usize, (width, height): (u32, u32)) -> Result<PairWindows> {
        let len = self.window_len(height)?;
        Ok(vertical_windows(width, height, len))
    }
}

/// Windows sized from the stage positions the tiles declare, in pixels.
/// Window length is the tile dimension minus the declared step between the
/// two tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredOffsetOverlap {
    pub x_positions: Vec<f64>,
    pub y_positions: Vec<f64>,
}

impl DeclaredOffsetOverlap {
    pub fn new(x_positions: Vec<f64>, y_positions: Vec<f64>) -> Self {
        Self {
            x_positions,
            y_positions,
        }
    }

    fn window_len(positions: &[f64], from: usize, to: usize, dimension: u32, axis: &str) -> Result<u32> {
        let (Some(start), Some(end)) = (positions.get(from), positions.get(to)) else {
            return Err(StitchError::InvalidOverlap(format!(
                "no declared {} position for tiles {} and {}",
                axis, from, to
            )));
        };

        let offset = end - start;
        let len = (dimension as f64 - offset).trunc();
        if !len.is_finite() || len < 1.0 || len > dimension as f64 {
            return Err(StitchError::InvalidOverlap(format!(
                "tiles {} and {} are declared {:.2} pixels apart along {}, which leaves no overlap in a {} pixel tile",
                from, to, offset, axis, dimension
            )));
        }
        Ok(len as u32)
    }
}

impl OverlapWindowPolicy for DeclaredOffsetOverlap {
    fn horizontal(&self, left: usize, current: usize, (width, height): (u32, u32)) -> Result<PairWindows> {
        let len = Self::window_len(&self.x_positions, left, current, width, "x")?;
        Ok(horizontal_windows(width, height, len))
    }

    fn vertical(&self, top: usize, current: usize, (width, height): (u32, u32)) -> Result<PairWindows> {
        let len = Self::window_len(&self.y_positions, top, current, height, "y")?;
        Ok(vertical_windows(width, height, len))
    }
}

/// Right edge of the left tile against the left edge of the current tile
fn horizontal_windows(width: u32, height: u32, len: u32) -> PairWindows {
    PairWindows {
        fixed: CorrelationWindow::new(width - len, 0, len, height),
        moving: CorrelationWindow::new(0, 0, len, height),
        step: width - len,
    }
}

/// Bottom edge of the top tile against the top edge of the current tile
fn vertical_windows(width: u32, height: u32, len: u32) -> PairWindows {
    PairWindows {
        fixed: CorrelationWindow::new(0, height - len, width, len),
        moving: CorrelationWindow::new(0, 0, width, len),
        step: height - len,
    }
}
