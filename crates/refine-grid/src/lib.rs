//! Grid detection and median downsampling: recover the latent pixel grid of
//! an upscaled sprite and collapse each cell to one logical pixel.

pub mod auto_grid;
pub mod detect;
pub mod downsample;

pub use auto_grid::{auto_grid_from_trimmed, AutoGrid, AutoGridStrategy};
pub use detect::{detect_grid, DetectParams};
pub use downsample::downsample;
