//! Normalized cross-correlation of two equally sized windows.
//!
//! The cross term `sum(f * m)` for every displacement comes from one pair of
//! 2D FFTs. The per-displacement means and variances come from summed-area
//! tables, so each cell of the surface costs O(1) after the transforms.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use rustfft::{num_complex::Complex, num_traits::Zero, FftDirection, FftNum, FftPlanner};
use tracing::warn;
use transpose::transpose;

use crate::{
    error::{Result, StitchError},
    traits::Correlator,
    types::Correlation,
};

/// Minimum share of the smaller window that must overlap for a
/// displacement to be scored.
pub const REQUIRED_OVERLAP_FRACTION: f64 = 0.5;

type SumTable = ImageBuffer<Luma<u64>, Vec<u64>>;

/// FFT-based normalized cross-correlation
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedCrossCorrelator;

impl Correlator for NormalizedCrossCorrelator {
    fn correlate(&self, fixed: &GrayImage, moving: &GrayImage) -> Result<Correlation> {
        let surface = correlation_surface(fixed, moving)?;
        let (fw, fh) = (fixed.width() as usize, fixed.height() as usize);

        let (ix, iy, peak) = match surface.argmax() {
            Some(best) if best.2 > 0.0 => best,
            _ => {
                // Nominal overlap, which always meets the overlap requirement
                let peak = surface.get(fw, fh).unwrap_or(0.0);
                warn!(
                    peak,
                    "Correlation surface has no positive peak; keeping the nominal overlap"
                );
                (fw, fh, peak)
            }
        };

        Ok(Correlation {
            dx: ix as i64 - fw as i64,
            dy: iy as i64 - fh as i64,
            peak,
        })
    }
}

/// Correlation value for every displacement.
///
/// Cell `(ix, iy)` holds the score of displacement
/// `(ix - fixed_width, iy - fixed_height)`, or `None` when the overlap at
/// that displacement is too small to be scored.
#[derive(Debug, Clone)]
pub struct CorrelationSurface {
    pub width: usize,
    pub height: usize,
    pub values: Vec<Option<f64>>,
}

impl CorrelationSurface {
    pub fn get(&self, ix: usize, iy: usize) -> Option<f64> {
        if ix >= self.width || iy >= self.height {
            return None;
        }
        self.values[iy * self.width + ix]
    }

    /// First maximum over scored cells in row-major order
    pub fn argmax(&self) -> Option<(usize, usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (index, value) in self.values.iter().enumerate() {
            if let Some(value) = *value {
                if best.is_none_or(|(_, current)| value > current) {
                    best = Some((index, value));
                }
            }
        }
        best.map(|(index, value)| (index % self.width, index / self.width, value))
    }
}

/// Score every displacement of `moving` against `fixed`.
///
/// Displacements whose overlap is smaller than
/// [`REQUIRED_OVERLAP_FRACTION`] of a window are left unscored. Where either
/// side is flat over the overlap the score is 0.
pub fn correlation_surface(fixed: &GrayImage, moving: &GrayImage) -> Result<CorrelationSurface> {
    let (fw, fh) = fixed.dimensions();
    let (mw, mh) = moving.dimensions();

    if fw == 0 || fh == 0 {
        return Err(StitchError::InvalidWindow("fixed window is empty".to_string()));
    }
    if (fw, fh) != (mw, mh) {
        return Err(StitchError::InvalidWindow(format!(
            "window sizes differ: fixed {}x{}, moving {}x{}",
            fw, fh, mw, mh
        )));
    }

    let width = (fw + mw) as usize;
    let height = (fh + mh) as usize;
    let cross = cross_correlate(fixed, moving, width, height);

    let fixed_sum: SumTable = integral_image::<_, u64>(fixed);
    let fixed_sq: SumTable = integral_squared_image::<_, u64>(fixed);
    let moving_sum: SumTable = integral_image::<_, u64>(moving);
    let moving_sq: SumTable = integral_squared_image::<_, u64>(moving);

    let min_pixels = (fw as u64 * fh as u64).min(mw as u64 * mh as u64);
    let required = (min_pixels as f64 * REQUIRED_OVERLAP_FRACTION).ceil() as i64;

    let mut values = vec![None; width * height];

    for iy in 0..height {
        let dy = iy as i64 - fh as i64;
        let Some((fy0, fy1)) = overlap_span(dy, fh, mh) else {
            continue;
        };

        for ix in 0..width {
            let dx = ix as i64 - fw as i64;
            let Some((fx0, fx1)) = overlap_span(dx, fw, mw) else {
                continue;
            };

            let n = (fx1 - fx0) * (fy1 - fy0);
            if n < required {
                continue;
            }

            let (mx0, mx1, my0, my1) = (fx0 - dx, fx1 - dx, fy0 - dy, fy1 - dy);
            let sf = rect_sum(&fixed_sum, fx0, fy0, fx1, fy1);
            let sff = rect_sum(&fixed_sq, fx0, fy0, fx1, fy1);
            let sm = rect_sum(&moving_sum, mx0, my0, mx1, my1);
            let smm = rect_sum(&moving_sq, mx0, my0, mx1, my1);

            let wrapped_x = dx.rem_euclid(width as i64) as usize;
            let wrapped_y = dy.rem_euclid(height as i64) as usize;
            let sfm = cross[wrapped_y * width + wrapped_x].round() as i128;

            let n = n as i128;
            let fixed_var = n * sff - sf * sf;
            let moving_var = n * smm - sm * sm;
            if fixed_var <= 0 || moving_var <= 0 {
                values[iy * width + ix] = Some(0.0);
                continue;
            }

            let numerator = (n * sfm - sf * sm) as f64;
            let denominator = (fixed_var as f64).sqrt() * (moving_var as f64).sqrt();
            values[iy * width + ix] = Some((numerator / denominator).clamp(-1.0, 1.0));
        }
    }

    Ok(CorrelationSurface {
        width,
        height,
        values,
    })
}

/// Range `[start, end)` of fixed-window coordinates that overlap the moving
/// window when it is displaced by `shift`.
fn overlap_span(shift: i64, fixed_len: u32, moving_len: u32) -> Option<(i64, i64)> {
    let start = shift.max(0);
    let end = (fixed_len as i64).min(moving_len as i64 + shift);
    (end > start).then_some((start, end))
}

/// Sum over `[x0, x1) x [y0, y1)` from a summed-area table with a leading
/// zero row and column
fn rect_sum(table: &SumTable, x0: i64, y0: i64, x1: i64, y1: i64) -> i128 {
    let at = |x: i64, y: i64| table.get_pixel(x as u32, y as u32)[0] as i128;
    at(x1, y1) - at(x0, y1) - at(x1, y0) + at(x0, y0)
}

/// Circular cross-correlation `c[d] = sum_x f(x) * m(x - d)` on a
/// `width x height` grid, both inputs zero padded from the origin.
fn cross_correlate(fixed: &GrayImage, moving: &GrayImage, width: usize, height: usize) -> Vec<f64> {
    let mut fixed_fft = to_complex_with_padding(fixed, width, height);
    let mut moving_fft = to_complex_with_padding(moving, width, height);

    fft_2d(width, height, &mut fixed_fft, FftDirection::Forward);
    fft_2d(width, height, &mut moving_fft, FftDirection::Forward);

    let mut product: Vec<Complex<f64>> = fixed_fft
        .iter()
        .zip(moving_fft.iter())
        .map(|(f, m)| f * m.conj())
        .collect();

    // Forward transforms leave the data transposed
    fft_2d(height, width, &mut product, FftDirection::Inverse);

    let scale = (width * height) as f64;
    product.iter().map(|value| value.re / scale).collect()
}

fn to_complex_with_padding(image: &GrayImage, width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut data = vec![Complex::zero(); width * height];
    for (x, y, pixel) in image.enumerate_pixels() {
        data[x as usize + y as usize * width] = Complex::new(pixel[0] as f64, 0.0);
    }
    data
}

/// Row FFTs, a transpose, then column FFTs. The result is left transposed
/// (`height` values per row).
fn fft_2d<T: FftNum>(
    width: usize,
    height: usize,
    buffer: &mut [Complex<T>],
    direction: FftDirection,
) {
    let mut planner = FftPlanner::new();
    let fft_width = planner.plan_fft(width, direction);
    let mut scratch = vec![Complex::zero(); fft_width.get_outofplace_scratch_len()];
    let mut rows = vec![Complex::zero(); buffer.len()];

    buffer
        .chunks_exact_mut(width)
        .zip(rows.chunks_exact_mut(width))
        .for_each(|(input, output)| {
            fft_width.process_outofplace_with_scratch(input, output, &mut scratch);
        });

    transpose(&rows, buffer, width, height);

    let fft_height = planner.plan_fft(height, direction);
    scratch.resize(fft_height.get_inplace_scratch_len(), Complex::zero());

    buffer.chunks_exact_mut(height).for_each(|column| {
        fft_height.process_with_scratch(column, &mut scratch);
    });
}
