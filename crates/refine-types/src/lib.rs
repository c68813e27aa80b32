//! Shared data model for the sprite refinement pipeline: bitmaps, grid
//! metadata, options, retro palettes and the error taxonomy.

use serde::{Deserialize, Serialize};

pub mod bitmap;
pub mod error;
pub mod oklab;
pub mod options;
pub mod palettes;
pub mod stats;

pub use bitmap::{Axis, Bitmap};
pub use error::RefineError;
pub use options::{
    BgExtractionMethod, DitherMode, OutlineStyle, ReduceColorMode, RefineOptions,
};

/// Detected (or derived) logical pixel grid over the source image.
///
/// Invariants: `crop_w == out_w * cell_w` and `crop_h == out_h * cell_h`
/// (up to rounding when the cell is fractional), offsets lie in `[0, cell)`,
/// and the crop rectangle lies inside the source bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub cell_w: f64,
    pub cell_h: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_w: u32,
    pub crop_h: u32,
    pub out_w: u32,
    pub out_h: u32,
    /// Detector score; lower is a cleaner periodic fit. 0 when the grid was
    /// forced or disabled.
    pub score: f64,
}

impl Grid {
    /// 1:1 grid over a crop rectangle (grid detection disabled).
    pub fn identity(crop_x: u32, crop_y: u32, w: u32, h: u32) -> Self {
        Self {
            cell_w: 1.0,
            cell_h: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            crop_x,
            crop_y,
            crop_w: w,
            crop_h: h,
            out_w: w,
            out_h: h,
            score: 0.0,
        }
    }
}

/// Quality and timing metrics stamped on the pipeline result.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total_ms: u64,
    pub mask_ms: u64,
    pub grid_ms: u64,
    pub downsample_ms: u64,
    pub quantize_ms: u64,
    /// Unique opaque colors before and after quantization.
    pub unique_colors_in: u32,
    pub unique_colors_out: u32,
    /// Oklab delta-E between pre- and post-quantize bitmaps over opaque
    /// pixels; 0 when quantization did not run.
    pub mean_delta_e: f32,
    pub p95_delta_e: f32,
}

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefineResult {
    /// Refined bitmap. When an outline is requested it carries a one-pixel
    /// border outside the grid region.
    pub bitmap: Bitmap,
    pub grid: Grid,
    /// Extracted palette: K-means centroids, the fixed palette in use, or
    /// empty when no quantization ran.
    pub palette: Vec<[u8; 3]>,
    /// Original input resized to the result dimensions, for comparison.
    pub compare_before_original: Bitmap,
    /// Background-sanitized input resized to the result dimensions.
    pub compare_before_sanitized: Bitmap,
    pub stats: PipelineStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_grid_invariants() {
        let g = Grid::identity(2, 3, 10, 8);
        assert_eq!(g.cell_w, 1.0);
        assert_eq!(g.out_w, 10);
        assert_eq!(g.crop_w, 10);
        assert_eq!(g.crop_x, 2);
        assert_eq!(g.score, 0.0);
    }

    #[test]
    fn test_grid_serde_round_trip() {
        let g = Grid {
            cell_w: 8.0,
            cell_h: 8.0,
            offset_x: 2.0,
            offset_y: 2.0,
            crop_x: 2,
            crop_y: 2,
            crop_w: 16,
            crop_h: 16,
            out_w: 2,
            out_h: 2,
            score: 0.5,
        };
        let json = serde_json::to_string(&g).unwrap();
        let back: Grid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
    }
}
