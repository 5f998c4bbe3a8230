//! Global origin estimation over a tile grid.
//!
//! Tiles are visited in comb order. The first tile is the anchor at (0, 0).
//! A tile in the top row is placed from its left neighbour, a tile in the
//! left column from its top neighbour, and any other tile from both, with
//! the two estimates blended.
//!
//! The pairwise offsets do not depend on where the neighbours end up, so
//! every pair is correlated in parallel first and positions are accumulated
//! in a second, sequential pass.

use image::{GrayImage, Primitive};
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, VariantNames};
use tracing::{debug, info};

use crate::{
    algorithms::order::{to_original_order, validate_order},
    error::{Result, StitchError},
    traits::{Correlator, OverlapWindowPolicy, PairWindows},
    types::{Correlation, GlobalOrigin, Tile, TileSet},
};

/// How the top- and left-based estimates of an interior tile are combined
#[derive(
    Debug, Clone, Copy, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames,
    PartialEq, Eq
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InteriorBlend {
    /// Plain component-wise average
    #[default]
    Mean,
    /// Average weighted by each estimate's non-negative peak correlation
    PeakWeighted,
}

impl InteriorBlend {
    pub fn combine(self, top: (GlobalOrigin, f64), left: (GlobalOrigin, f64)) -> GlobalOrigin {
        match self {
            Self::Mean => top.0.midpoint(left.0),
            Self::PeakWeighted => {
                let top_weight = top.1.max(0.0);
                let left_weight = left.1.max(0.0);
                let total = top_weight + left_weight;
                if total <= 0.0 {
                    return top.0.midpoint(left.0);
                }
                GlobalOrigin::new(
                    (top.0.x * top_weight + left.0.x * left_weight) / total,
                    (top.0.y * top_weight + left.0.y * left_weight) / total,
                )
            }
        }
    }
}

/// Which already placed neighbour a pair correlates against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    Left,
    Top,
}

/// Relative offset between a tile and one neighbour
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairOffset {
    /// Comb position of the tile being placed
    pub position: usize,
    pub neighbor: Neighbor,
    /// Nominal step along the adjacency axis
    pub step: u32,
    pub correlation: Correlation,
}

impl PairOffset {
    /// Where this pair puts the tile, given its neighbour's origin
    pub fn place(&self, neighbor_origin: GlobalOrigin) -> GlobalOrigin {
        let Correlation { dx, dy, .. } = self.correlation;
        match self.neighbor {
            Neighbor::Left => neighbor_origin.translate((self.step as i64 + dx) as f64, dy as f64),
            Neighbor::Top => neighbor_origin.translate(dx as f64, (self.step as i64 + dy) as f64),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PairJob {
    position: usize,
    neighbor: Neighbor,
    fixed_tile: usize,
    moving_tile: usize,
    windows: PairWindows,
}

/// Places every tile of a grid relative to the comb-order anchor
#[derive(Debug, Clone)]
pub struct GlobalOriginEstimator<P, C> {
    pub policy: P,
    pub correlator: C,
    pub blend: InteriorBlend,
}

impl<P, C> GlobalOriginEstimator<P, C>
where
    P: OverlapWindowPolicy,
    C: Correlator,
{
    pub fn new(policy: P, correlator: C) -> Self {
        Self {
            policy,
            correlator,
            blend: InteriorBlend::default(),
        }
    }

    pub fn with_blend(mut self, blend: InteriorBlend) -> Self {
        self.blend = blend;
        self
    }

    /// Origins indexed by tile, in the order the tiles were supplied
    pub fn estimate<T>(
        &self,
        tiles: &TileSet<T>,
        order: &[usize],
        x_dim: usize,
        y_dim: usize,
    ) -> Result<Vec<GlobalOrigin>>
    where
        T: Primitive + Send + Sync,
    {
        let comb = self.estimate_comb(tiles, order, x_dim, y_dim)?;
        Ok(to_original_order(&comb, order))
    }

    /// Origins indexed by comb position
    pub fn estimate_comb<T>(
        &self,
        tiles: &TileSet<T>,
        order: &[usize],
        x_dim: usize,
        y_dim: usize,
    ) -> Result<Vec<GlobalOrigin>>
    where
        T: Primitive + Send + Sync,
    {
        let offsets = self.pair_offsets(tiles, order, x_dim, y_dim)?;
        accumulate(&offsets, order.len(), x_dim, self.blend)
    }

    /// Correlate every adjacent pair of the grid
    pub fn pair_offsets<T>(
        &self,
        tiles: &TileSet<T>,
        order: &[usize],
        x_dim: usize,
        y_dim: usize,
    ) -> Result<Vec<PairOffset>>
    where
        T: Primitive + Send + Sync,
    {
        check_grid(tiles.len(), x_dim, y_dim)?;
        validate_order(order, tiles.len())?;
        let tile_size = tiles.tile_size()?;

        let jobs = self.plan_pairs(order, x_dim, tile_size)?;
        info!(
            tiles = tiles.len(),
            pairs = jobs.len(),
            x_dim,
            y_dim,
            "Estimating global origins"
        );

        let gray: Vec<GrayImage> = tiles.tiles().par_iter().map(Tile::to_gray8).collect();

        jobs.par_iter()
            .map(|job| -> Result<PairOffset> {
                let fixed = job.windows.fixed.extract(&gray[job.fixed_tile])?;
                let moving = job.windows.moving.extract(&gray[job.moving_tile])?;
                let correlation = self.correlator.correlate(&fixed, &moving)?;

                debug!(
                    position = job.position,
                    neighbor = ?job.neighbor,
                    fixed_tile = job.fixed_tile,
                    moving_tile = job.moving_tile,
                    dx = correlation.dx,
                    dy = correlation.dy,
                    peak = correlation.peak,
                    "Correlated tile pair"
                );

                Ok(PairOffset {
                    position: job.position,
                    neighbor: job.neighbor,
                    step: job.windows.step,
                    correlation,
                })
            })
            .collect()
    }

    fn plan_pairs(&self, order: &[usize], x_dim: usize, tile_size: (u32, u32)) -> Result<Vec<PairJob>> {
        let mut jobs = Vec::with_capacity(2 * order.len());

        for position in 1..order.len() {
            let current = order[position];

            if position % x_dim != 0 {
                let left = order[position - 1];
                jobs.push(PairJob {
                    position,
                    neighbor: Neighbor::Left,
                    fixed_tile: left,
                    moving_tile: current,
                    windows: self.policy.horizontal(left, current, tile_size)?,
                });
            }

            if position >= x_dim {
                let top = order[position - x_dim];
                jobs.push(PairJob {
                    position,
                    neighbor: Neighbor::Top,
                    fixed_tile: top,
                    moving_tile: current,
                    windows: self.policy.vertical(top, current, tile_size)?,
                });
            }
        }

        Ok(jobs)
    }
}

/// Walk comb positions in order and place each tile from its neighbours.
///
/// Every offset must name a comb position in `1..count` that actually has
/// the neighbour it refers to.
pub fn accumulate(
    offsets: &[PairOffset],
    count: usize,
    x_dim: usize,
    blend: InteriorBlend,
) -> Result<Vec<GlobalOrigin>> {
    if x_dim == 0 {
        return Err(StitchError::InvalidGrid {
            x_tile_dim: x_dim,
            y_tile_dim: 0,
        });
    }

    let mut from_left: Vec<Option<&PairOffset>> = vec![None; count];
    let mut from_top: Vec<Option<&PairOffset>> = vec![None; count];
    for offset in offsets {
        let position = offset.position;
        let has_neighbor = match offset.neighbor {
            Neighbor::Left => position % x_dim != 0,
            Neighbor::Top => position >= x_dim,
        };
        if position == 0 || position >= count || !has_neighbor {
            return Err(StitchError::InvalidTileOrder(format!(
                "comb position {} has no {:?} neighbour in a grid of {} tiles, {} wide",
                position, offset.neighbor, count, x_dim
            )));
        }

        match offset.neighbor {
            Neighbor::Left => from_left[offset.position] = Some(offset),
            Neighbor::Top => from_top[offset.position] = Some(offset),
        }
    }

    let mut origins = vec![GlobalOrigin::ZERO; count];

    for position in 1..count {
        let left = from_left[position]
            .map(|offset| (offset.place(origins[position - 1]), offset.correlation.peak));
        let top = from_top[position]
            .map(|offset| (offset.place(origins[position - x_dim]), offset.correlation.peak));

        origins[position] = match (top, left) {
            (Some(top), Some(left)) => blend.combine(top, left),
            (Some((origin, _)), None) | (None, Some((origin, _))) => origin,
            (None, None) => {
                return Err(StitchError::InvalidTileOrder(format!(
                    "comb position {} has no placed neighbour",
                    position
                )))
            }
        };
    }

    Ok(origins)
}

pub(crate) fn check_grid(tile_count: usize, x_dim: usize, y_dim: usize) -> Result<()> {
    if x_dim == 0 || y_dim == 0 {
        return Err(StitchError::InvalidGrid {
            x_tile_dim: x_dim,
            y_tile_dim: y_dim,
        });
    }
    if tile_count == 0 {
        return Err(StitchError::EmptyTileSet);
    }
    if tile_count != x_dim * y_dim {
        return Err(StitchError::TileCountMismatch {
            expected: x_dim * y_dim,
            actual: tile_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithms::{
            correlation::NormalizedCrossCorrelator,
            order::{resolve_comb, to_comb_order, ImportMode},
            policy::PercentageOverlap,
        },
        test_utils::{textured_scene, tiles_at},
    };

    fn estimator(percent: f64) -> GlobalOriginEstimator<PercentageOverlap, NormalizedCrossCorrelator> {
        GlobalOriginEstimator::new(
            PercentageOverlap::new(percent).expect("Valid percent"),
            NormalizedCrossCorrelator,
        )
    }

    /// Scene positions of a jittered 3x3 grid of 20x20 tiles with 25% overlap
    fn jittered_grid() -> Vec<(u32, u32)> {
        let jitter = [(0, 0), (1, 2), (2, 1), (2, 2), (0, 1), (1, 0), (1, 2), (2, 0), (0, 2)];
        (0..9)
            .map(|i| {
                let (col, row) = (i % 3, i / 3);
                (2 + 15 * col + jitter[i as usize].0, 2 + 15 * row + jitter[i as usize].1)
            })
            .collect()
    }

    fn expected_from(positions: &[(u32, u32)], anchor: usize) -> Vec<GlobalOrigin> {
        let (ax, ay) = positions[anchor];
        positions
            .iter()
            .map(|&(x, y)| GlobalOrigin::new(x as f64 - ax as f64, y as f64 - ay as f64))
            .collect()
    }

    #[test]
    fn test_two_by_two_grid() {
        let scene = textured_scene(18, 18, 5);
        let positions = [(0, 0), (8, 0), (0, 8), (8, 8)];
        let tiles = tiles_at(&scene, &positions, (10, 10));
        let order = resolve_comb(ImportMode::RowComb, 2, 2);

        let origins = estimator(20.0)
            .estimate(&tiles, &order, 2, 2)
            .expect("Should estimate");

        assert_eq!(
            origins,
            vec![
                GlobalOrigin::new(0.0, 0.0),
                GlobalOrigin::new(8.0, 0.0),
                GlobalOrigin::new(0.0, 8.0),
                GlobalOrigin::new(8.0, 8.0),
            ]
        );
    }

    #[test]
    fn test_recovers_jittered_positions() {
        let scene = textured_scene(64, 64, 17);
        let positions = jittered_grid();
        let tiles = tiles_at(&scene, &positions, (20, 20));
        let order = resolve_comb(ImportMode::RowComb, 3, 3);

        let origins = estimator(25.0)
            .estimate(&tiles, &order, 3, 3)
            .expect("Should estimate");

        assert_eq!(origins, expected_from(&positions, 0));
    }

    #[test]
    fn test_snake_supply_order_is_restored() {
        let scene = textured_scene(64, 64, 23);
        let grid = jittered_grid();
        let order = resolve_comb(ImportMode::RowSnake, 3, 3);

        // Supply tile `order[p]` from grid cell `p`
        let mut supplied = vec![(0, 0); 9];
        for (position, &tile) in order.iter().enumerate() {
            supplied[tile] = grid[position];
        }
        let tiles = tiles_at(&scene, &supplied, (20, 20));

        let estimator = estimator(25.0);
        let origins = estimator.estimate(&tiles, &order, 3, 3).expect("Should estimate");
        let comb = estimator.estimate_comb(&tiles, &order, 3, 3).expect("Should estimate");

        assert_eq!(origins[order[0]], GlobalOrigin::ZERO);
        assert_eq!(origins, expected_from(&supplied, order[0]));
        assert_eq!(to_comb_order(&origins, &order), comb);
    }

    #[test]
    fn test_anchor_stays_at_origin() {
        let scene = textured_scene(40, 40, 9);
        let tiles = tiles_at(&scene, &[(5, 5), (14, 6), (4, 15), (13, 14)], (12, 12));

        for mode in [ImportMode::RowComb, ImportMode::ColumnComb, ImportMode::RowSnake] {
            let order = resolve_comb(mode, 2, 2);
            let origins = estimator(30.0)
                .estimate(&tiles, &order, 2, 2)
                .expect("Should estimate");
            assert_eq!(origins[order[0]], GlobalOrigin::ZERO, "mode {}", mode);
        }
    }

    #[test]
    fn test_single_row_and_column() {
        let scene = textured_scene(60, 60, 31);
        let row = tiles_at(&scene, &[(0, 1), (15, 0), (31, 2)], (20, 20));
        let origins = estimator(25.0)
            .estimate(&row, &[0, 1, 2], 3, 1)
            .expect("Should estimate");
        assert_eq!(origins[2], GlobalOrigin::new(31.0, 1.0));

        let column = tiles_at(&scene, &[(1, 0), (0, 16), (2, 30)], (20, 20));
        let origins = estimator(25.0)
            .estimate(&column, &[0, 1, 2], 1, 3)
            .expect("Should estimate");
        assert_eq!(origins[2], GlobalOrigin::new(1.0, 30.0));
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        let scene = textured_scene(30, 30, 1);
        let tiles = tiles_at(&scene, &[(0, 0), (8, 0), (0, 8), (8, 8)], (10, 10));
        let order = [0, 1, 2, 3];

        assert!(matches!(
            estimator(20.0).estimate(&tiles, &order, 3, 1),
            Err(StitchError::TileCountMismatch { expected: 3, actual: 4 })
        ));
        assert!(matches!(
            estimator(20.0).estimate(&tiles, &order, 0, 4),
            Err(StitchError::InvalidGrid { .. })
        ));
        assert!(matches!(
            estimator(5.0).estimate(&tiles, &order, 2, 2),
            Err(StitchError::InvalidOverlap(_))
        ));

        let column_snake = resolve_comb(ImportMode::ColumnSnake, 2, 2);
        assert!(matches!(
            estimator(20.0).estimate(&tiles, &column_snake, 2, 2),
            Err(StitchError::InvalidTileOrder(_))
        ));
    }

    #[test]
    fn test_blend_modes() {
        let top = (GlobalOrigin::new(10.0, 20.0), 0.9);
        let left = (GlobalOrigin::new(12.0, 24.0), 0.3);

        assert_eq!(InteriorBlend::Mean.combine(top, left), GlobalOrigin::new(11.0, 22.0));

        let weighted = InteriorBlend::PeakWeighted.combine(top, left);
        assert!((weighted.x - 10.5).abs() < 1e-12);
        assert!((weighted.y - 21.0).abs() < 1e-12);

        let flat = InteriorBlend::PeakWeighted.combine((top.0, -0.2), (left.0, 0.0));
        assert_eq!(flat, GlobalOrigin::new(11.0, 22.0));
    }

    #[test]
    fn test_accumulate_averages_disagreeing_estimates() {
        let offset = |position, neighbor, dx, dy| PairOffset {
            position,
            neighbor,
            step: 8,
            correlation: Correlation { dx, dy, peak: 1.0 },
        };
        let offsets = [
            offset(1, Neighbor::Left, 0, 0),
            offset(2, Neighbor::Top, 0, 0),
            offset(3, Neighbor::Left, 1, 0),
            offset(3, Neighbor::Top, 0, 0),
        ];

        let origins = accumulate(&offsets, 4, 2, InteriorBlend::Mean).expect("Should accumulate");
        assert_eq!(origins[3], GlobalOrigin::new(8.5, 8.0));
    }

    #[test]
    fn test_accumulate_rejects_offsets_outside_the_grid() {
        let offset = |position, neighbor| PairOffset {
            position,
            neighbor,
            step: 8,
            correlation: Correlation { dx: 0, dy: 0, peak: 1.0 },
        };

        for bad in [
            offset(4, Neighbor::Left),
            offset(0, Neighbor::Left),
            offset(2, Neighbor::Left),
            offset(1, Neighbor::Top),
        ] {
            assert!(matches!(
                accumulate(&[bad], 4, 2, InteriorBlend::Mean),
                Err(StitchError::InvalidTileOrder(_))
            ));
        }

        assert!(matches!(
            accumulate(&[offset(1, Neighbor::Left)], 2, 0, InteriorBlend::Mean),
            Err(StitchError::InvalidGrid { x_tile_dim: 0, .. })
        ));
    }
}
