//! # Tile Stitching Library
//!
//! Places the tiles of a regularly overlapping microscopy grid into one
//! global coordinate frame and composites them into a single montage.
//!
//! ## Core Features
//!
//! - **Import Modes**: Row/column comb and snake acquisition orders, plus
//!   grid cells read from per-tile Zeiss stage metadata
//! - **FFT Cross-Correlation**: Normalized cross-correlation of the overlap
//!   strips between neighbouring tiles
//! - **Origin Estimation**: Tiles are correlated in parallel and placed
//!   relative to the first tile of the grid
//! - **Montage Composition**: Tiles of any integer pixel type pasted at
//!   their rounded origins
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stitching::{GridParameters, StitchImages, Tile, TileSet};
//!
//! let tiles: TileSet<u16> = ["r0c0.tif", "r0c1.tif", "r1c0.tif", "r1c1.tif"]
//!     .into_iter()
//!     .map(|path| Ok(Tile::new(path, image::open(path)?.into_luma16())))
//!     .collect::<Result<_, image::ImageError>>()?;
//!
//! let output = StitchImages::new(GridParameters::new(2, 2, 10.0), false).execute(&tiles)?;
//! output.montage.save("montage.tif")?;
//! output.coordinates.save_json("coordinates.json")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod filters;
pub mod io;

#[cfg(test)]
mod test_utils;

pub use error::{Result, StitchError};
pub use types::*;
pub use traits::*;
pub use algorithms::*;
pub use filters::*;
