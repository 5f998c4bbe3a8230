use std::path::Path;

use image::{EncodableLayout, Luma, Pixel, PixelWithColorType, Primitive};
use tracing::info;

use crate::{error::Result, types::Montage};

impl<T> Montage<T>
where
    T: Primitive,
    Luma<T>: PixelWithColorType + Pixel<Subpixel = T>,
    [T]: EncodableLayout,
{
    /// Write the montage raster; the format follows the file extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.image.save(path)?;
        info!(path = %path.display(), width = self.width(), height = self.height(), "Saved montage");
        Ok(())
    }
}
