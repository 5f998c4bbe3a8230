use image::{imageops, Primitive};
use tracing::info;

use crate::{
    error::{Result, StitchError},
    types::{GlobalOrigin, Montage, TileImage, TileSet},
};

/// Paste every tile into one raster at its global origin.
///
/// The montage spans the bounding box of all placed tiles and starts out
/// zero filled. Origins are rounded to whole pixels. Tiles are pasted in
/// supply order, so where tiles overlap the later tile wins; there is no
/// blending.
pub fn compose_montage<T: Primitive>(tiles: &TileSet<T>, origins: &[GlobalOrigin]) -> Result<Montage<T>> {
    if tiles.is_empty() {
        return Err(StitchError::EmptyTileSet);
    }
    if origins.len() != tiles.len() {
        return Err(StitchError::CoordinateCountMismatch {
            expected: tiles.len(),
            actual: origins.len(),
        });
    }

    let placed = origins
        .iter()
        .enumerate()
        .map(|(tile, origin)| to_pixel(tile, *origin))
        .collect::<Result<Vec<(i64, i64)>>>()?;

    let min_x = placed.iter().map(|&(x, _)| x).min().unwrap_or(0);
    let min_y = placed.iter().map(|&(_, y)| y).min().unwrap_or(0);
    let mut max_x = i64::MIN;
    let mut max_y = i64::MIN;
    for (index, (tile, &(x, y))) in tiles.iter().zip(&placed).enumerate() {
        let out_of_range = || StitchError::InvalidOrigin {
            tile: index,
            x: origins[index].x,
            y: origins[index].y,
        };
        max_x = max_x.max(x.checked_add(tile.width() as i64).ok_or_else(out_of_range)?);
        max_y = max_y.max(y.checked_add(tile.height() as i64).ok_or_else(out_of_range)?);
    }

    let width = u32::try_from(max_x - min_x).map_err(|_| {
        StitchError::InvalidWindow(format!("montage width {} is out of range", max_x - min_x))
    })?;
    let height = u32::try_from(max_y - min_y).map_err(|_| {
        StitchError::InvalidWindow(format!("montage height {} is out of range", max_y - min_y))
    })?;

    info!(width, height, tiles = tiles.len(), "Compositing montage");

    let mut image = TileImage::<T>::new(width, height);
    for (tile, &(x, y)) in tiles.iter().zip(&placed) {
        imageops::replace(&mut image, &tile.image, x - min_x, y - min_y);
    }

    Ok(Montage {
        image,
        origin: GlobalOrigin::new(min_x as f64, min_y as f64),
    })
}

/// Largest distance from the anchor, in pixels, a tile may be placed at
const MAX_ORIGIN: f64 = i32::MAX as f64;

/// Round an origin to whole pixels, rejecting values no raster could hold
fn to_pixel(tile: usize, origin: GlobalOrigin) -> Result<(i64, i64)> {
    let (x, y) = (origin.x.round(), origin.y.round());
    if !x.is_finite() || !y.is_finite() || x.abs() > MAX_ORIGIN || y.abs() > MAX_ORIGIN {
        return Err(StitchError::InvalidOrigin {
            tile,
            x: origin.x,
            y: origin.y,
        });
    }
    Ok((x as i64, y as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tile;
    use image::Luma;

    fn solid(name: &str, value: u16, width: u32, height: u32) -> Tile<u16> {
        Tile::new(name, TileImage::from_pixel(width, height, Luma([value])))
    }

    #[test]
    fn test_montage_spans_bounding_box() {
        let tiles = TileSet::new(vec![
            solid("a", 1, 10, 10),
            solid("b", 2, 10, 10),
            solid("c", 3, 10, 10),
        ]);
        let origins = [
            GlobalOrigin::new(0.0, 0.0),
            GlobalOrigin::new(8.0, -3.0),
            GlobalOrigin::new(-2.0, 9.0),
        ];

        let montage = compose_montage(&tiles, &origins).expect("Should composite");

        // W + maxX - minX, H + maxY - minY
        assert_eq!(montage.dimensions(), (10 + 8 + 2, 10 + 9 + 3));
        assert_eq!(montage.origin, GlobalOrigin::new(-2.0, -3.0));
        assert_eq!(montage.image.get_pixel(2, 3)[0], 1);
        assert_eq!(montage.image.get_pixel(0, 21)[0], 3);
        assert_eq!(montage.image.get_pixel(19, 0)[0], 2);
        // Uncovered corner stays zero
        assert_eq!(montage.image.get_pixel(19, 21)[0], 0);
    }

    #[test]
    fn test_later_tiles_win_overlaps() {
        let tiles = TileSet::new(vec![solid("a", 100, 4, 4), solid("b", 200, 4, 4)]);
        let origins = [GlobalOrigin::new(0.0, 0.0), GlobalOrigin::new(2.0, 0.0)];

        let montage = compose_montage(&tiles, &origins).expect("Should composite");
        assert_eq!(montage.dimensions(), (6, 4));
        assert_eq!(montage.image.get_pixel(1, 0)[0], 100);
        assert_eq!(montage.image.get_pixel(2, 0)[0], 200);
        assert_eq!(montage.image.get_pixel(3, 3)[0], 200);

        let reversed = compose_montage(
            &TileSet::new(vec![solid("b", 200, 4, 4), solid("a", 100, 4, 4)]),
            &[GlobalOrigin::new(2.0, 0.0), GlobalOrigin::new(0.0, 0.0)],
        )
        .expect("Should composite");
        assert_eq!(reversed.image.get_pixel(2, 0)[0], 100);
    }

    #[test]
    fn test_fractional_origins_round() {
        let tiles = TileSet::new(vec![solid("a", 1, 4, 4), solid("b", 2, 4, 4)]);
        let origins = [GlobalOrigin::new(0.0, 0.0), GlobalOrigin::new(3.5, 0.4)];

        let montage = compose_montage(&tiles, &origins).expect("Should composite");
        assert_eq!(montage.dimensions(), (8, 4));
        assert_eq!(montage.image.get_pixel(4, 0)[0], 2);
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let tiles = TileSet::new(vec![solid("a", 1, 4, 4)]);
        assert!(matches!(
            compose_montage(&tiles, &[]),
            Err(StitchError::CoordinateCountMismatch { expected: 1, actual: 0 })
        ));
        assert!(matches!(
            compose_montage(&TileSet::<u16>::new(vec![]), &[]),
            Err(StitchError::EmptyTileSet)
        ));
    }

    #[test]
    fn test_rejects_unplaceable_origins() {
        let tiles = TileSet::new(vec![solid("a", 1, 4, 4), solid("b", 2, 4, 4)]);

        for bad in [
            GlobalOrigin::new(1e300, 0.0),
            GlobalOrigin::new(0.0, -1e19),
            GlobalOrigin::new(f64::NAN, 0.0),
            GlobalOrigin::new(0.0, f64::INFINITY),
        ] {
            match compose_montage(&tiles, &[GlobalOrigin::ZERO, bad]) {
                Err(StitchError::InvalidOrigin { tile, .. }) => assert_eq!(tile, 1),
                other => panic!("Expected invalid origin, got {:?}", other.map(|m| m.dimensions())),
            }
        }
    }
}
