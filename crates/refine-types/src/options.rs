use serde::{Deserialize, Serialize};

/// Quantizer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceColorMode {
    #[default]
    None,
    Auto,
    Mono,
    Fixed,
    GbLegacy,
    GbPocket,
    GbLight,
    Pico8,
    Nes,
    Pc98,
    Msx,
    C64,
    Arne16,
    SfcSprite,
    SfcBg,
}

impl ReduceColorMode {
    pub fn name(&self) -> &'static str {
        match self {
            ReduceColorMode::None => "none",
            ReduceColorMode::Auto => "auto",
            ReduceColorMode::Mono => "mono",
            ReduceColorMode::Fixed => "fixed",
            ReduceColorMode::GbLegacy => "gb_legacy",
            ReduceColorMode::GbPocket => "gb_pocket",
            ReduceColorMode::GbLight => "gb_light",
            ReduceColorMode::Pico8 => "pico8",
            ReduceColorMode::Nes => "nes",
            ReduceColorMode::Pc98 => "pc98",
            ReduceColorMode::Msx => "msx",
            ReduceColorMode::C64 => "c64",
            ReduceColorMode::Arne16 => "arne16",
            ReduceColorMode::SfcSprite => "sfc_sprite",
            ReduceColorMode::SfcBg => "sfc_bg",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitherMode {
    #[default]
    None,
    FloydSteinberg,
}

/// Where the background color is sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BgExtractionMethod {
    None,
    #[default]
    TopLeft,
    BottomLeft,
    TopRight,
    BottomRight,
    Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineStyle {
    #[default]
    None,
    Sharp,
    Rounded,
}

/// Pipeline configuration. Every numeric field has a declared clamp range;
/// [`RefineOptions::normalized`] applies the clamps before a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineOptions {
    /// Posterize step used by grid detection, 1..=128.
    pub detection_quant_step: u8,
    /// Side of the median sampling window in the downsampler, 1..=9.
    pub sample_window: u32,
    /// Per-channel tolerance for flood-fill and bg-color match, 0..=255.
    pub background_tolerance: u8,
    /// Alpha at or above this is "opaque" for bbox and components, 1..=255.
    pub trim_alpha_threshold: u8,
    /// Enable the floating-component filter.
    pub ignore_floating: bool,
    /// Components at or below this size are erased, 0..=1_000_000.
    pub floating_max_pixels: u32,
    /// Forced output width, 1..=1024; together with the height this
    /// disables automatic grid detection.
    pub force_pixels_w: Option<u32>,
    /// Forced output height, 1..=1024.
    pub force_pixels_h: Option<u32>,
    /// K target for K-means, 2..=256.
    pub color_count: u32,
    /// Diffused-error scale in percent, 0..=100.
    pub dither_strength: u32,
    /// Run flood-fill before detection.
    pub pre_remove_background: bool,
    /// Run flood-fill after downsampling.
    pub post_remove_background: bool,
    /// Also match the background color globally, not only via flood-fill
    /// connectivity.
    pub remove_inner_background: bool,
    /// Apply the opaque-bbox crop.
    pub trim_to_content: bool,
    /// Infer the grid from the trimmed content region.
    pub auto_grid_from_trimmed: bool,
    /// Coarse-to-fine strategy for the trimmed-grid search.
    pub fast_auto_grid_from_trimmed: bool,
    /// False disables the run-length detector and downsampling entirely.
    pub enable_grid_detection: bool,
    /// Upper bound on detected cells along x, 2..=256.
    pub auto_max_cells_w: u32,
    /// Upper bound on detected cells along y, 2..=256.
    pub auto_max_cells_h: u32,
    pub reduce_color_mode: ReduceColorMode,
    pub dither_mode: DitherMode,
    pub bg_extraction_method: BgExtractionMethod,
    /// Background color when the extraction method is `rgb`.
    pub bg_rgb: Option<[u8; 3]>,
    /// Palette for `reduce_color_mode = fixed`.
    pub fixed_palette: Option<Vec<[u8; 3]>>,
    pub outline_style: OutlineStyle,
    pub outline_color: [u8; 3],
    /// Seed for K-means initialization; `None` uses process entropy.
    pub rng_seed: Option<u64>,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            detection_quant_step: 64,
            sample_window: 3,
            background_tolerance: 64,
            trim_alpha_threshold: 16,
            ignore_floating: false,
            floating_max_pixels: 0,
            force_pixels_w: None,
            force_pixels_h: None,
            color_count: 32,
            dither_strength: 0,
            pre_remove_background: true,
            post_remove_background: true,
            remove_inner_background: false,
            trim_to_content: true,
            auto_grid_from_trimmed: true,
            fast_auto_grid_from_trimmed: true,
            enable_grid_detection: true,
            auto_max_cells_w: 128,
            auto_max_cells_h: 128,
            reduce_color_mode: ReduceColorMode::None,
            dither_mode: DitherMode::None,
            bg_extraction_method: BgExtractionMethod::TopLeft,
            bg_rgb: None,
            fixed_palette: None,
            outline_style: OutlineStyle::None,
            outline_color: [255, 255, 255],
            rng_seed: None,
        }
    }
}

impl RefineOptions {
    /// Copy with every numeric field clamped into its declared range.
    pub fn normalized(&self) -> Self {
        let mut out = self.clone();
        out.detection_quant_step = out.detection_quant_step.clamp(1, 128);
        out.sample_window = out.sample_window.clamp(1, 9);
        out.trim_alpha_threshold = out.trim_alpha_threshold.max(1);
        out.floating_max_pixels = out.floating_max_pixels.min(1_000_000);
        out.force_pixels_w = out.force_pixels_w.map(|v| v.clamp(1, 1024));
        out.force_pixels_h = out.force_pixels_h.map(|v| v.clamp(1, 1024));
        out.color_count = out.color_count.clamp(2, 256);
        out.dither_strength = out.dither_strength.min(100);
        out.auto_max_cells_w = out.auto_max_cells_w.clamp(2, 256);
        out.auto_max_cells_h = out.auto_max_cells_h.clamp(2, 256);
        out
    }
}
