use image::{GrayImage, Luma};

use crate::types::{Tile, TileImage, TileSet};

/// Deterministic texture without repeating structure
pub fn textured_scene(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let mut h = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263) ^ seed;
        h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
        Luma([(h >> 24) as u8])
    })
}

pub fn cut(scene: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> TileImage<u8> {
    image::imageops::crop_imm(scene, x, y, width, height).to_image()
}

/// Tiles cut from `scene` at `positions`, supplied in the given order
pub fn tiles_at(scene: &GrayImage, positions: &[(u32, u32)], size: (u32, u32)) -> TileSet<u8> {
    positions
        .iter()
        .enumerate()
        .map(|(index, &(x, y))| Tile::new(format!("tile_{}", index), cut(scene, x, y, size.0, size.1)))
        .collect()
}
