//! Run-length grid detector: estimate the latent cell size and offset of a
//! pixel-art image from periodic color boundaries along informative strips.

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use refine_types::oklab::pack_rgb;
use refine_types::{stats, Axis, Bitmap, Grid, RefineError};

/// Rows/columns inspected per axis.
const DETECTION_STRIPS: usize = 12;
/// Weight of the 90th-percentile deviation in the candidate score.
const P90_WEIGHT: f64 = 0.35;
/// Score margin within which a larger cell size wins the tie-break.
const TIE_MARGIN: f64 = 0.35;
/// Penalty per derived cell outside the expected count range.
const CELL_RANGE_PENALTY: f64 = 0.05;
/// Weight of the log-occurrence bonus for frequently observed run lengths.
const OCCURRENCE_WEIGHT: f64 = 0.25;
/// Lower end of the expected cell-count range (capped by the max).
const EXPECTED_MIN_CELLS: u32 = 8;
/// Above this many derived cells the search retries with a tighter bound.
const OVERSPLIT_CELLS: u32 = 96;
const OVERSPLIT_RETRY_MAX_CELLS: u32 = 64;

/// Detector inputs; thresholds come pre-clamped from the options record.
#[derive(Debug, Clone, Copy)]
pub struct DetectParams {
    pub quant_step: u8,
    pub alpha_threshold: u8,
    pub max_cells_x: u32,
    pub max_cells_y: u32,
}

#[derive(Debug, Clone, Copy)]
struct Run {
    start: u32,
    len: u32,
    key: u32,
}

#[derive(Debug, Clone, Copy)]
struct AxisEstimate {
    cell: f64,
    offset: f64,
    score: f64,
}

/// Estimate the pixel grid of `bitmap`.
///
/// Fails with [`RefineError::GridDetectionFailed`] when an axis yields no
/// candidate (uniform images, empty strips).
pub fn detect_grid(bitmap: &Bitmap, params: &DetectParams) -> Result<Grid, RefineError> {
    let posterized = bitmap.posterize(params.quant_step);
    let background = background_keys(&posterized);

    let est_x = estimate_axis(
        &posterized,
        Axis::X,
        &background,
        params.alpha_threshold,
        params.max_cells_x,
        true,
    )
    .ok_or(RefineError::GridDetectionFailed { axis: Axis::X })?;
    let est_y = estimate_axis(
        &posterized,
        Axis::Y,
        &background,
        params.alpha_threshold,
        params.max_cells_y,
        true,
    )
    .ok_or(RefineError::GridDetectionFailed { axis: Axis::Y })?;

    assemble_grid(bitmap.width(), bitmap.height(), est_x, est_y)
}

fn assemble_grid(
    width: u32,
    height: u32,
    est_x: AxisEstimate,
    est_y: AxisEstimate,
) -> Result<Grid, RefineError> {
    let cell_w = est_x.cell.round().max(1.0);
    let cell_h = est_y.cell.round().max(1.0);
    let offset_x = est_x.offset.rem_euclid(cell_w);
    let offset_y = est_y.offset.rem_euclid(cell_h);

    let out_w = ((width as f64 - offset_x) / cell_w).floor() as u32;
    let out_h = ((height as f64 - offset_y) / cell_h).floor() as u32;
    if out_w == 0 {
        return Err(RefineError::GridDetectionFailed { axis: Axis::X });
    }
    if out_h == 0 {
        return Err(RefineError::GridDetectionFailed { axis: Axis::Y });
    }

    let grid = Grid {
        cell_w,
        cell_h,
        offset_x,
        offset_y,
        crop_x: offset_x as u32,
        crop_y: offset_y as u32,
        crop_w: (out_w as f64 * cell_w) as u32,
        crop_h: (out_h as f64 * cell_h) as u32,
        out_w,
        out_h,
        score: (est_x.score + est_y.score) / 2.0,
    };
    debug!(
        cell_w = grid.cell_w,
        cell_h = grid.cell_h,
        offset_x = grid.offset_x,
        offset_y = grid.offset_y,
        out_w = grid.out_w,
        out_h = grid.out_h,
        score = grid.score,
        "grid detected"
    );
    Ok(grid)
}

/// Dominant posterized colors covering 70% of the image (or at most 8).
///
/// The set only steers strip selection; run extraction still reads the
/// posterized pixels directly.
fn background_keys(posterized: &Bitmap) -> HashSet<u32> {
    let mut histogram: HashMap<u32, u64> = HashMap::new();
    for px in posterized.data().chunks_exact(4) {
        *histogram.entry(pack_rgb(px[0], px[1], px[2])).or_insert(0) += 1;
    }

    let total: u64 = posterized.width() as u64 * posterized.height() as u64;
    let mut ranked: Vec<(u32, u64)> = histogram.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut keys = HashSet::new();
    let mut covered = 0u64;
    for (key, count) in ranked {
        keys.insert(key);
        covered += count;
        if covered * 10 >= total * 7 || keys.len() >= 8 {
            break;
        }
    }
    keys
}

fn estimate_axis(
    posterized: &Bitmap,
    axis: Axis,
    background: &HashSet<u32>,
    alpha_threshold: u8,
    max_cells: u32,
    allow_retry: bool,
) -> Option<AxisEstimate> {
    // Along axis X runs go across the width of selected rows; along Y they
    // go down selected columns.
    let (run_len, positions) = match axis {
        Axis::X => (posterized.width(), posterized.height()),
        Axis::Y => (posterized.height(), posterized.width()),
    };

    let strips = select_strips(posterized, axis, background, alpha_threshold, positions);
    if strips.is_empty() {
        return None;
    }

    let mut boundaries: Vec<u32> = Vec::new();
    let mut occurrences: HashMap<u32, u32> = HashMap::new();
    for &pos in &strips {
        for run in extract_runs(posterized, axis, pos, alpha_threshold) {
            boundaries.push(run.start);
            if run.len >= 2 {
                *occurrences.entry(run.len).or_insert(0) += 1;
            }
        }
        // Segment-end boundaries: close each maximal opaque stretch.
        for end in segment_ends(posterized, axis, pos, alpha_threshold) {
            boundaries.push(end);
        }
    }
    if boundaries.is_empty() {
        return None;
    }

    let candidates = candidate_sizes(&occurrences, run_len, max_cells);
    if candidates.is_empty() {
        return None;
    }

    let expected_min = EXPECTED_MIN_CELLS.min(max_cells);
    let mut scored: Vec<(u32, f64, f64)> = Vec::new();
    for &size in &candidates {
        let (offset, score) = score_candidate(
            size,
            &boundaries,
            run_len,
            expected_min,
            max_cells,
            occurrences.get(&size).copied().unwrap_or(0),
        );
        trace!(axis = %axis, size, offset, score, "candidate scored");
        scored.push((size, offset, score));
    }

    let min_score = scored
        .iter()
        .map(|(_, _, s)| *s)
        .fold(f64::INFINITY, f64::min);
    // Within the margin of the best score, prefer the larger cell size.
    let (size, offset, score) = scored
        .iter()
        .filter(|(_, _, s)| *s <= min_score + TIE_MARGIN)
        .max_by_key(|(size, _, _)| *size)
        .copied()?;

    let derived_cells = (run_len as f64 / size as f64).round() as u32;
    if allow_retry && derived_cells > OVERSPLIT_CELLS && max_cells > OVERSPLIT_RETRY_MAX_CELLS {
        debug!(axis = %axis, derived_cells, "over-split, retrying with tighter bound");
        if let Some(retried) = estimate_axis(
            posterized,
            axis,
            background,
            alpha_threshold,
            OVERSPLIT_RETRY_MAX_CELLS,
            false,
        ) {
            return Some(retried);
        }
    }

    Some(AxisEstimate {
        cell: size as f64,
        offset,
        score,
    })
}

/// Up to [`DETECTION_STRIPS`] positions with the most non-background opaque
/// pixels, separated by at least `positions / (6 * strips)`.
fn select_strips(
    posterized: &Bitmap,
    axis: Axis,
    background: &HashSet<u32>,
    alpha_threshold: u8,
    positions: u32,
) -> Vec<u32> {
    let mut counts: Vec<(u32, u32)> = (0..positions)
        .map(|pos| {
            let count = posterized
                .extract_strip(axis_strip(axis), pos as f64)
                .iter()
                .filter(|px| px[3] >= alpha_threshold && !background.contains(&pack_rgb(px[0], px[1], px[2])))
                .count() as u32;
            (pos, count)
        })
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let min_separation = positions as f64 / (6.0 * DETECTION_STRIPS as f64);
    let mut selected: Vec<u32> = Vec::new();
    for (pos, count) in counts {
        if count == 0 || selected.len() >= DETECTION_STRIPS {
            break;
        }
        let clear = selected
            .iter()
            .all(|&p| (p as f64 - pos as f64).abs() >= min_separation);
        if clear {
            selected.push(pos);
        }
    }
    selected
}

/// Strip extraction axis for a detection axis: cell widths come from rows,
/// cell heights from columns.
fn axis_strip(axis: Axis) -> Axis {
    match axis {
        Axis::X => Axis::Y,
        Axis::Y => Axis::X,
    }
}

/// Runs of equal posterized color within the opaque segments of one strip,
/// with single-pixel noise between identical neighbors absorbed.
fn extract_runs(posterized: &Bitmap, axis: Axis, pos: u32, alpha_threshold: u8) -> Vec<Run> {
    let pixels = posterized.extract_strip(axis_strip(axis), pos as f64);

    let mut raw: Vec<Run> = Vec::new();
    for (i, px) in pixels.iter().enumerate() {
        if px[3] < alpha_threshold {
            continue;
        }
        let key = pack_rgb(px[0], px[1], px[2]);
        match raw.last_mut() {
            Some(last) if last.key == key && last.start + last.len == i as u32 => {
                last.len += 1;
            }
            _ => raw.push(Run {
                start: i as u32,
                len: 1,
                key,
            }),
        }
    }

    // Absorb single-pixel runs flanked by identical colors; the flanking
    // runs collapse into one.
    let mut smoothed: Vec<Run> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let mut run = raw[i];
        while i + 2 < raw.len()
            && raw[i + 1].len == 1
            && raw[i + 1].start == run.start + run.len
            && raw[i + 2].key == run.key
            && raw[i + 2].start == raw[i + 1].start + 1
        {
            run.len += 1 + raw[i + 2].len;
            i += 2;
        }
        smoothed.push(run);
        i += 1;
    }
    smoothed
}

/// End positions of each maximal opaque segment in a strip.
fn segment_ends(posterized: &Bitmap, axis: Axis, pos: u32, alpha_threshold: u8) -> Vec<u32> {
    let pixels = posterized.extract_strip(axis_strip(axis), pos as f64);
    let mut ends = Vec::new();
    let mut in_segment = false;
    for (i, px) in pixels.iter().enumerate() {
        let opaque = px[3] >= alpha_threshold;
        if in_segment && !opaque {
            ends.push(i as u32);
            in_segment = false;
        } else if !in_segment && opaque {
            in_segment = true;
        }
    }
    if in_segment {
        ends.push(pixels.len() as u32);
    }
    ends
}

/// Union of observed run lengths (>= 2) and sizes implied by the expected
/// cell-count range, each widened by one pixel in both directions.
fn candidate_sizes(occurrences: &HashMap<u32, u32>, run_len: u32, max_cells: u32) -> Vec<u32> {
    let mut sizes: HashSet<u32> = HashSet::new();
    let mut push = |s: i64| {
        if s >= 2 && s <= run_len as i64 {
            sizes.insert(s as u32);
        }
    };

    for &len in occurrences.keys() {
        for d in -1i64..=1 {
            push(len as i64 + d);
        }
    }
    for cells in EXPECTED_MIN_CELLS..=max_cells {
        let implied = (run_len as f64 / cells as f64).round() as i64;
        for d in -1i64..=1 {
            push(implied + d);
        }
    }

    let mut out: Vec<u32> = sizes.into_iter().collect();
    out.sort_unstable();
    out
}

/// Best integer offset for a candidate size, and the final score with that
/// offset fixed.
fn score_candidate(
    size: u32,
    boundaries: &[u32],
    run_len: u32,
    expected_min: u32,
    expected_max: u32,
    occurrence_count: u32,
) -> (f64, f64) {
    let s = size as i64;
    let mut best_offset = 0i64;
    let mut best_median = f64::INFINITY;
    let mut best_devs: Vec<f64> = Vec::new();

    for offset in 0..s {
        let mut devs: Vec<f64> = boundaries
            .iter()
            .map(|&b| {
                let m = (b as i64 - offset).rem_euclid(s);
                m.min(s - m) as f64
            })
            .collect();
        let median = stats::median(&mut devs);
        if median < best_median {
            best_median = median;
            best_offset = offset;
            best_devs = devs;
        }
    }

    let p90 = stats::percentile(&mut best_devs, 90.0);
    let derived_cells = (run_len as f64 / size as f64).round();
    let penalty = if derived_cells < expected_min as f64 {
        (expected_min as f64 - derived_cells) * CELL_RANGE_PENALTY
    } else if derived_cells > expected_max as f64 {
        (derived_cells - expected_max as f64) * CELL_RANGE_PENALTY
    } else {
        0.0
    };
    let bonus = -OCCURRENCE_WEIGHT * (1.0 + occurrence_count as f64).ln();

    (
        best_offset as f64,
        best_median + P90_WEIGHT * p90 + penalty + bonus,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_cells: u32) -> DetectParams {
        DetectParams {
            quant_step: 64,
            alpha_threshold: 16,
            max_cells_x: max_cells,
            max_cells_y: max_cells,
        }
    }

    fn opaque(r: u8, g: u8, b: u8) -> [u8; 4] {
        [r, g, b, 255]
    }

    /// 16x16, one 8x8 black tile in the top-left quadrant on white.
    fn quadrant_16() -> Bitmap {
        let mut bmp = Bitmap::blank(16, 16);
        for y in 0..16i64 {
            for x in 0..16i64 {
                let black = (x / 8) % 2 == 0 && (y / 8) % 2 == 0;
                let v = if black { 0 } else { 255 };
                bmp.set(x, y, opaque(v, v, v));
            }
        }
        bmp
    }

    /// 24x24, 4px tiles offset by (2,2); black where both tile indices are
    /// even.
    fn offset_24() -> Bitmap {
        let mut bmp = Bitmap::blank(24, 24);
        for y in 0..24i64 {
            for x in 0..24i64 {
                let tx = (x - 2).div_euclid(4);
                let ty = (y - 2).div_euclid(4);
                let black = tx.rem_euclid(2) == 0 && ty.rem_euclid(2) == 0;
                let v = if black { 0 } else { 255 };
                bmp.set(x, y, opaque(v, v, v));
            }
        }
        bmp
    }

    #[test]
    fn test_detects_eight_pixel_tiles() {
        let grid = detect_grid(&quadrant_16(), &params(2)).unwrap();
        assert_eq!(grid.cell_w, 8.0);
        assert_eq!(grid.cell_h, 8.0);
        assert_eq!(grid.offset_x, 0.0);
        assert_eq!(grid.offset_y, 0.0);
        assert_eq!(grid.out_w, 2);
        assert_eq!(grid.out_h, 2);
        assert_eq!(grid.crop_w, 16);
    }

    #[test]
    fn test_detects_offset_tiles() {
        let grid = detect_grid(&offset_24(), &params(6)).unwrap();
        assert_eq!(grid.cell_w, 4.0);
        assert_eq!(grid.cell_h, 4.0);
        assert_eq!(grid.offset_x, 2.0);
        assert_eq!(grid.offset_y, 2.0);
        assert_eq!(grid.crop_x, 2);
        assert_eq!(grid.out_w, 5);
    }

    #[test]
    fn test_uniform_image_fails() {
        let mut bmp = Bitmap::blank(16, 16);
        for y in 0..16i64 {
            for x in 0..16i64 {
                bmp.set(x, y, opaque(80, 80, 80));
            }
        }
        let err = detect_grid(&bmp, &params(128)).unwrap_err();
        assert_eq!(err.code(), "E_GRID_DETECT");
    }

    #[test]
    fn test_quant_step_one_still_terminates() {
        let grid = detect_grid(&quadrant_16(), &{
            let mut p = params(2);
            p.quant_step = 1;
            p
        });
        assert!(grid.is_ok());
    }

    #[test]
    fn test_run_smoothing_absorbs_noise() {
        // 12 px row: 5 black, 1 white (noise), 6 black -> one run of 12.
        let mut bmp = Bitmap::blank(12, 1);
        for x in 0..12i64 {
            let v = if x == 5 { 255 } else { 0 };
            bmp.set(x, 0, opaque(v, v, v));
        }
        let runs = extract_runs(&bmp.posterize(64), Axis::X, 0, 16);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start, 0);
        assert_eq!(runs[0].len, 12);
    }

    #[test]
    fn test_segment_ends_close_opaque_stretches() {
        let mut bmp = Bitmap::blank(8, 1);
        for x in [0i64, 1, 2, 5, 6] {
            bmp.set(x, 0, opaque(0, 0, 0));
        }
        let ends = segment_ends(&bmp, Axis::X, 0, 16);
        assert_eq!(ends, vec![3, 7]);
    }
}
