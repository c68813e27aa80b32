//! Color reduction in Oklab space: weighted K-means, fixed-palette
//! snapping, and Floyd-Steinberg dithering.

pub mod dither;
pub mod kmeans;
pub mod snap;

pub use dither::dither_floyd_steinberg;
pub use kmeans::{quantize_kmeans, unique_opaque_colors, KmeansParams, Quantized};
pub use snap::{snap_to_palette, PaletteSnapper};
