//! Output-grid search over the trimmed content region: pick the cell size
//! minimizing reconstruction error plus a cell-count complexity penalty.

use tracing::debug;

use refine_types::{Axis, Bitmap, Grid, RefineError};

use crate::downsample::downsample;

/// Weight of the `out_w * out_h` complexity term; prevents the trivial
/// one-cell-per-pixel optimum.
const COMPLEXITY_WEIGHT: f64 = 0.0025;
/// Output dimensions never exceed this during the search.
const MAX_OUT_DIM: u32 = 256;

/// Search strategy; both honor the same contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoGridStrategy {
    /// Full stride-1 scan with per-pixel error evaluation.
    Legacy,
    /// Coarse pass with strided scanning, then stride-1 refinement around
    /// the coarse optimum.
    Fast,
}

/// Winning grid of the trimmed-region search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoGrid {
    pub cell_w: f64,
    pub cell_h: f64,
    pub out_w: u32,
    pub out_h: u32,
    pub score: f64,
}

/// Choose an output grid for a content-cropped bitmap.
///
/// `cropped` and `mask` are both already trimmed to the opaque bounding
/// box; only mask pixels with alpha >= `alpha_threshold` contribute to the
/// reconstruction error.
pub fn auto_grid_from_trimmed(
    cropped: &Bitmap,
    mask: &Bitmap,
    sample_window: u32,
    alpha_threshold: u8,
    strategy: AutoGridStrategy,
) -> Result<AutoGrid, RefineError> {
    if cropped.width() != mask.width() || cropped.height() != mask.height() {
        return Err(RefineError::InternalInvariant {
            message: format!(
                "auto-grid dimensions mismatch: bitmap {}x{}, mask {}x{}",
                cropped.width(),
                cropped.height(),
                mask.width(),
                mask.height()
            ),
        });
    }

    let h = cropped.height();
    let lo = (h / 32).max(2);
    let hi = (h / 4).min(128).max(lo);

    let best = match strategy {
        AutoGridStrategy::Legacy => {
            scan(cropped, mask, sample_window, alpha_threshold, lo, hi, 1, 1)
        }
        AutoGridStrategy::Fast => {
            let span = hi - lo;
            let coarse_stride = if span > 48 {
                3
            } else if span > 16 {
                2
            } else {
                1
            };
            let max_dim = cropped.width().max(h);
            let pixel_stride = (max_dim / 512).clamp(1, 4);

            let coarse = scan(
                cropped,
                mask,
                sample_window,
                alpha_threshold,
                lo,
                hi,
                coarse_stride,
                pixel_stride,
            );
            match coarse {
                Some(c) => {
                    let fine_lo = c.out_h.saturating_sub(2 * coarse_stride).max(lo);
                    let fine_hi = (c.out_h + 2 * coarse_stride).min(hi);
                    scan(
                        cropped,
                        mask,
                        sample_window,
                        alpha_threshold,
                        fine_lo,
                        fine_hi,
                        1,
                        1,
                    )
                }
                None => None,
            }
        }
    };

    let best = best.ok_or(RefineError::GridDetectionFailed { axis: Axis::Y })?;
    debug!(
        cell_w = best.cell_w,
        cell_h = best.cell_h,
        out_w = best.out_w,
        out_h = best.out_h,
        score = best.score,
        "auto grid selected"
    );
    Ok(best)
}

#[allow(clippy::too_many_arguments)]
fn scan(
    cropped: &Bitmap,
    mask: &Bitmap,
    sample_window: u32,
    alpha_threshold: u8,
    lo: u32,
    hi: u32,
    out_h_stride: u32,
    pixel_stride: u32,
) -> Option<AutoGrid> {
    let mut best: Option<AutoGrid> = None;
    let mut out_h = lo;
    while out_h <= hi {
        if let Some(candidate) = evaluate(
            cropped,
            mask,
            sample_window,
            alpha_threshold,
            out_h,
            pixel_stride,
        ) {
            let better = match &best {
                Some(b) => candidate.score < b.score,
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
        out_h += out_h_stride;
    }
    best
}

/// Downsample with the grid implied by `out_h` and measure mean L1
/// reconstruction error over the opaque mask pixels.
fn evaluate(
    cropped: &Bitmap,
    mask: &Bitmap,
    sample_window: u32,
    alpha_threshold: u8,
    out_h: u32,
    pixel_stride: u32,
) -> Option<AutoGrid> {
    let w = cropped.width();
    let h = cropped.height();
    let out_w = (((out_h as f64 * w as f64 / h as f64).round() as u32).max(2)).min(MAX_OUT_DIM);
    let cell_w = w as f64 / out_w as f64;
    let cell_h = h as f64 / out_h as f64;
    if cell_w <= 1.0 || cell_h <= 1.0 {
        return None;
    }

    let grid = Grid {
        cell_w,
        cell_h,
        offset_x: 0.0,
        offset_y: 0.0,
        crop_x: 0,
        crop_y: 0,
        crop_w: w,
        crop_h: h,
        out_w,
        out_h,
        score: 0.0,
    };
    let down = downsample(cropped, &grid, sample_window);

    let mut total = 0u64;
    let mut count = 0u64;
    let mut y = 0u32;
    while y < h {
        let j = ((y as f64 / cell_h) as u32).min(out_h - 1);
        let mut x = 0u32;
        while x < w {
            if mask.alpha_at(x, y) >= alpha_threshold {
                let i = ((x as f64 / cell_w) as u32).min(out_w - 1);
                let src = cropped.get(x as i64, y as i64);
                let rec = down.get(i as i64, j as i64);
                total += (src[0] as i64 - rec[0] as i64).unsigned_abs()
                    + (src[1] as i64 - rec[1] as i64).unsigned_abs()
                    + (src[2] as i64 - rec[2] as i64).unsigned_abs();
                count += 1;
            }
            x += pixel_stride;
        }
        y += pixel_stride;
    }
    if count == 0 {
        return None;
    }

    let score = total as f64 / count as f64 + COMPLEXITY_WEIGHT * out_w as f64 * out_h as f64;
    Some(AutoGrid {
        cell_w,
        cell_h,
        out_w,
        out_h,
        score,
    })
}
