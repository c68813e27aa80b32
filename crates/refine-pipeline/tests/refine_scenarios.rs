//! End-to-end pipeline scenarios over synthetic sprites.

use std::collections::HashMap;

use refine_pipeline::{process, process_with_observer, PipelineObserver};
use refine_types::{
    BgExtractionMethod, Bitmap, DitherMode, OutlineStyle, ReduceColorMode, RefineOptions,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Structural grid invariants that must hold for every valid result with
/// integral cells.
fn assert_grid_invariants(grid: &refine_types::Grid) {
    assert!(grid.cell_w >= 1.0);
    assert!(grid.cell_h >= 1.0);
    assert!(grid.offset_x >= 0.0 && grid.offset_x < grid.cell_w);
    assert!(grid.offset_y >= 0.0 && grid.offset_y < grid.cell_h);
    if grid.cell_w.fract() == 0.0 {
        assert_eq!(grid.crop_w as f64, grid.out_w as f64 * grid.cell_w);
    }
    if grid.cell_h.fract() == 0.0 {
        assert_eq!(grid.crop_h as f64, grid.out_h as f64 * grid.cell_h);
    }
}

#[test]
fn test_stripes_detect_eight_pixel_cells() {
    init_tracing();
    let bmp = quadrant_tiles(16, 8);
    let options = RefineOptions {
        auto_max_cells_w: 2,
        auto_max_cells_h: 2,
        auto_grid_from_trimmed: false,
        pre_remove_background: false,
        post_remove_background: false,
        ..RefineOptions::default()
    };

    let result = process(&bmp, &options).unwrap();
    assert_eq!(result.grid.cell_w, 8.0);
    assert_eq!(result.grid.cell_h, 8.0);
    assert_eq!(result.grid.offset_x, 0.0);
    assert_eq!(result.grid.offset_y, 0.0);
    // One logical pixel per tile.
    assert_eq!(result.grid.out_w, 2);
    assert_eq!(result.grid.out_h, 2);
    assert_grid_invariants(&result.grid);
}

#[test]
fn test_offset_stripes_recover_phase() {
    let bmp = offset_tiles(24, 4, 2);
    let options = RefineOptions {
        auto_max_cells_w: 6,
        auto_max_cells_h: 6,
        auto_grid_from_trimmed: false,
        pre_remove_background: false,
        post_remove_background: false,
        ..RefineOptions::default()
    };

    let result = process(&bmp, &options).unwrap();
    assert_eq!(result.grid.cell_w, 4.0);
    assert_eq!(result.grid.cell_h, 4.0);
    assert_eq!(result.grid.offset_x, 2.0);
    assert_eq!(result.grid.offset_y, 2.0);
    assert_grid_invariants(&result.grid);
}

#[test]
fn test_floating_noise_suppression() {
    let bmp = block_and_speck();

    let with_filter = RefineOptions {
        force_pixels_w: Some(8),
        force_pixels_h: Some(8),
        ignore_floating: true,
        floating_max_pixels: 4,
        ..RefineOptions::default()
    };
    let result = process(&bmp, &with_filter).unwrap();
    assert_eq!(result.grid.crop_w, 4, "speck should not widen the bbox");
    assert_eq!(result.grid.crop_h, 4);
    assert_eq!(result.grid.crop_x, 1);
    assert_eq!(result.bitmap.width(), 8);
    assert_eq!(result.bitmap.height(), 8);

    let without_filter = RefineOptions {
        ignore_floating: false,
        ..with_filter
    };
    let result = process(&bmp, &without_filter).unwrap();
    assert_eq!(result.grid.crop_w, 8, "speck extends the bbox");
    assert_eq!(result.grid.crop_h, 8);
}

#[test]
fn test_donut_hole_is_cleared() {
    init_tracing();
    let bmp = donut_ring();
    let options = RefineOptions {
        pre_remove_background: true,
        post_remove_background: true,
        remove_inner_background: true,
        background_tolerance: 96,
        ..RefineOptions::default()
    };

    let result = process(&bmp, &options).unwrap();
    assert_eq!(result.bitmap.width(), 3);
    assert_eq!(result.bitmap.height(), 3);
    // The enclosed background cell must come out transparent.
    assert_eq!(result.bitmap.get(1, 1)[3], 0);
    // The ring itself survives.
    assert_ne!(result.bitmap.get(0, 0)[3], 0);
    assert_ne!(result.bitmap.get(2, 2)[3], 0);
}

#[test]
fn test_mono_floyd_steinberg_preserves_brightness() {
    init_tracing();
    let bmp = gray_gradient(64, 64);
    let options = RefineOptions {
        enable_grid_detection: false,
        trim_to_content: false,
        bg_extraction_method: BgExtractionMethod::None,
        reduce_color_mode: ReduceColorMode::Mono,
        dither_mode: DitherMode::FloydSteinberg,
        dither_strength: 100,
        ..RefineOptions::default()
    };

    let result = process(&bmp, &options).unwrap();

    let mut white = 0u64;
    let mut black = 0u64;
    for px in result.bitmap.data().chunks_exact(4) {
        assert!(px[0] == 0 || px[0] == 255, "non-mono channel {}", px[0]);
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
        if px[0] == 255 {
            white += 1;
        } else {
            black += 1;
        }
    }

    // Integrated gray of the gradient, in pixels.
    let mut expected_white = 0.0f64;
    for x in 0..64u64 {
        expected_white += 64.0 * (x as f64 * 4.0 + 2.0) / 255.0;
    }
    let expected_black = 4096.0 - expected_white;
    assert!(
        (white as f64 - expected_white).abs() <= expected_white * 0.05,
        "white {} vs expected {:.0}",
        white,
        expected_white
    );
    assert!(
        (black as f64 - expected_black).abs() <= expected_black * 0.05,
        "black {} vs expected {:.0}",
        black,
        expected_black
    );
}

#[test]
fn test_grid_disabled_trims_to_content() {
    let bmp = block_on_white(10, 2, 4);
    let options = RefineOptions {
        enable_grid_detection: false,
        trim_to_content: true,
        pre_remove_background: true,
        background_tolerance: 0,
        ..RefineOptions::default()
    };

    let result = process(&bmp, &options).unwrap();
    assert_eq!(result.bitmap.width(), 4);
    assert_eq!(result.bitmap.height(), 4);
    assert_eq!(result.grid.crop_x, 2);
    assert_eq!(result.grid.crop_y, 2);
    assert_eq!(result.grid.cell_w, 1.0);
    assert_eq!(result.grid.cell_h, 1.0);
    for px in result.bitmap.data().chunks_exact(4) {
        assert_eq!(px[3], 255);
    }
}

#[test]
fn test_uniform_image_fails_grid_detection() {
    let mut bmp = Bitmap::blank(16, 16);
    for y in 0..16i64 {
        for x in 0..16i64 {
            bmp.set(x, y, [90, 90, 90, 255]);
        }
    }
    let options = RefineOptions {
        auto_grid_from_trimmed: false,
        pre_remove_background: false,
        ..RefineOptions::default()
    };
    let err = process(&bmp, &options).unwrap_err();
    assert_eq!(err.code(), "E_GRID_DETECT");
}

#[test]
fn test_empty_image_with_forced_size_reports_no_content() {
    let bmp = Bitmap::blank(8, 8);
    let options = RefineOptions {
        force_pixels_w: Some(4),
        force_pixels_h: Some(4),
        ..RefineOptions::default()
    };
    let err = process(&bmp, &options).unwrap_err();
    assert_eq!(err.code(), "E_NO_CONTENT");
}

#[test]
fn test_quant_step_one_terminates() {
    let bmp = quadrant_tiles(16, 8);
    let options = RefineOptions {
        detection_quant_step: 1,
        auto_max_cells_w: 2,
        auto_max_cells_h: 2,
        auto_grid_from_trimmed: false,
        pre_remove_background: false,
        post_remove_background: false,
        ..RefineOptions::default()
    };
    let result = process(&bmp, &options).unwrap();
    assert_eq!(result.grid.cell_w, 8.0);
}

#[test]
fn test_auto_grid_from_trimmed_matches_tiles() {
    // Ring sprite on white: the trimmed-region search should land on the
    // 8px tile grid.
    let bmp = donut_ring();
    let options = RefineOptions::default();
    let result = process(&bmp, &options).unwrap();
    assert_eq!(result.grid.cell_w, 8.0);
    assert_eq!(result.grid.cell_h, 8.0);
    assert_eq!(result.bitmap.width(), 3);
    assert_eq!(result.grid.offset_x, 4.0);
}

#[test]
fn test_retro_palette_mode_is_bit_exact() {
    let bmp = gray_gradient(32, 32);
    let options = RefineOptions {
        enable_grid_detection: false,
        trim_to_content: false,
        bg_extraction_method: BgExtractionMethod::None,
        reduce_color_mode: ReduceColorMode::GbLegacy,
        ..RefineOptions::default()
    };
    let result = process(&bmp, &options).unwrap();
    assert_eq!(result.palette, refine_types::palettes::GB_LEGACY.to_vec());
    for px in result.bitmap.data().chunks_exact(4) {
        let rgb = [px[0], px[1], px[2]];
        assert!(
            refine_types::palettes::GB_LEGACY.contains(&rgb),
            "off-palette pixel {:?}",
            rgb
        );
    }
}

#[test]
fn test_sfc_sprite_mode_caps_colors() {
    let mut bmp = Bitmap::blank(32, 32);
    for y in 0..32i64 {
        for x in 0..32i64 {
            bmp.set(x, y, [(x * 8) as u8, (y * 8) as u8, ((x * y) % 256) as u8, 255]);
        }
    }
    let options = RefineOptions {
        enable_grid_detection: false,
        trim_to_content: false,
        bg_extraction_method: BgExtractionMethod::None,
        reduce_color_mode: ReduceColorMode::SfcSprite,
        rng_seed: Some(5),
        ..RefineOptions::default()
    };
    let result = process(&bmp, &options).unwrap();
    assert!(result.palette.len() <= 16);
    assert!(result.stats.unique_colors_out <= 16);
}

#[test]
fn test_compare_views_match_result_dimensions() {
    let bmp = donut_ring();
    let result = process(&bmp, &RefineOptions::default()).unwrap();
    assert_eq!(result.compare_before_original.width(), result.bitmap.width());
    assert_eq!(
        result.compare_before_original.height(),
        result.bitmap.height()
    );
    assert_eq!(
        result.compare_before_sanitized.width(),
        result.bitmap.width()
    );
}

#[test]
fn test_fixed_mode_without_palette_falls_back_to_auto() {
    let bmp = offset_tiles(24, 4, 2);
    let options = RefineOptions {
        reduce_color_mode: ReduceColorMode::Fixed,
        fixed_palette: None,
        color_count: 4,
        rng_seed: Some(11),
        ..RefineOptions::default()
    };
    let result = process(&bmp, &options).unwrap();
    assert!(!result.palette.is_empty());
    assert!(result.palette.len() <= 4);
}

#[test]
fn test_quantize_stats_are_stamped() {
    let bmp = gray_gradient(32, 32);
    let options = RefineOptions {
        enable_grid_detection: false,
        trim_to_content: false,
        bg_extraction_method: BgExtractionMethod::None,
        reduce_color_mode: ReduceColorMode::Auto,
        color_count: 4,
        rng_seed: Some(3),
        ..RefineOptions::default()
    };
    let result = process(&bmp, &options).unwrap();
    assert!(result.stats.unique_colors_in > result.stats.unique_colors_out);
    assert!(result.stats.unique_colors_out <= 4);
    assert!(result.stats.mean_delta_e > 0.0);
    assert!(result.stats.p95_delta_e >= result.stats.mean_delta_e);
}

#[test]
fn test_outline_expands_result() {
    let bmp = block_on_white(10, 2, 4);
    let options = RefineOptions {
        enable_grid_detection: false,
        trim_to_content: true,
        pre_remove_background: true,
        background_tolerance: 0,
        outline_style: OutlineStyle::Sharp,
        outline_color: [255, 0, 0],
        ..RefineOptions::default()
    };
    let result = process(&bmp, &options).unwrap();
    assert_eq!(result.bitmap.width(), 6);
    assert_eq!(result.bitmap.height(), 6);
    assert_eq!(result.bitmap.get(1, 0), [255, 0, 0, 255]);
    // Corner of the expanded border stays transparent with a sharp outline.
    assert_eq!(result.bitmap.get(0, 0)[3], 0);
}

#[test]
fn test_observer_sees_input_first_and_result_last() {
    struct Recorder {
        stages: Vec<String>,
    }
    impl PipelineObserver for Recorder {
        fn tap(&mut self, stage: &str, _bitmap: &Bitmap, _meta: &HashMap<String, String>) {
            self.stages.push(stage.to_string());
        }
    }

    let bmp = donut_ring();
    let mut recorder = Recorder { stages: Vec::new() };
    process_with_observer(&bmp, &RefineOptions::default(), Some(&mut recorder)).unwrap();

    assert_eq!(recorder.stages.first().map(String::as_str), Some("00-input"));
    assert_eq!(recorder.stages.last().map(String::as_str), Some("99-result"));
    assert!(recorder.stages.iter().any(|s| s == "05-downsampled"));
    assert!(recorder.stages.iter().any(|s| s == "04-grid-crop"));
}

// Helper constructors

/// Tiles of `cell` pixels; black where both tile indices are even.
fn quadrant_tiles(size: u32, cell: i64) -> Bitmap {
    let mut bmp = Bitmap::blank(size, size);
    for y in 0..size as i64 {
        for x in 0..size as i64 {
            let black = (x / cell) % 2 == 0 && (y / cell) % 2 == 0;
            let v = if black { 0 } else { 255 };
            bmp.set(x, y, [v, v, v, 255]);
        }
    }
    bmp
}

/// Like [`quadrant_tiles`] but with the grid origin shifted by `offset`.
fn offset_tiles(size: u32, cell: i64, offset: i64) -> Bitmap {
    let mut bmp = Bitmap::blank(size, size);
    for y in 0..size as i64 {
        for x in 0..size as i64 {
            let tx = (x - offset).div_euclid(cell);
            let ty = (y - offset).div_euclid(cell);
            let black = tx.rem_euclid(2) == 0 && ty.rem_euclid(2) == 0;
            let v = if black { 0 } else { 255 };
            bmp.set(x, y, [v, v, v, 255]);
        }
    }
    bmp
}

/// 10x10 white field, 4x4 black block at (1,1), lone black pixel at (8,8).
fn block_and_speck() -> Bitmap {
    let mut bmp = Bitmap::blank(10, 10);
    for y in 0..10i64 {
        for x in 0..10i64 {
            bmp.set(x, y, [255, 255, 255, 255]);
        }
    }
    for y in 1..5i64 {
        for x in 1..5i64 {
            bmp.set(x, y, [0, 0, 0, 255]);
        }
    }
    bmp.set(8, 8, [0, 0, 0, 255]);
    bmp
}

/// 32x32 white field with a ring of 8px color cells around a white hole.
fn donut_ring() -> Bitmap {
    let mut bmp = Bitmap::blank(32, 32);
    for y in 0..32i64 {
        for x in 0..32i64 {
            bmp.set(x, y, [255, 255, 255, 255]);
        }
    }
    for cy in 0..3i64 {
        for cx in 0..3i64 {
            if cx == 1 && cy == 1 {
                continue;
            }
            let color = if (cx + cy) % 2 == 0 {
                [40, 60, 200]
            } else {
                [30, 160, 70]
            };
            for y in 0..8i64 {
                for x in 0..8i64 {
                    bmp.set(4 + cx * 8 + x, 4 + cy * 8 + y, [color[0], color[1], color[2], 255]);
                }
            }
        }
    }
    bmp
}

/// Horizontal gray gradient, fully opaque.
fn gray_gradient(w: u32, h: u32) -> Bitmap {
    let mut bmp = Bitmap::blank(w, h);
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let v = (x * 4 + 2).min(255) as u8;
            bmp.set(x, y, [v, v, v, 255]);
        }
    }
    bmp
}

/// White field with a black block of `size` pixels at `(origin, origin)`.
fn block_on_white(field: u32, origin: i64, size: i64) -> Bitmap {
    let mut bmp = Bitmap::blank(field, field);
    for y in 0..field as i64 {
        for x in 0..field as i64 {
            bmp.set(x, y, [255, 255, 255, 255]);
        }
    }
    for y in origin..origin + size {
        for x in origin..origin + size {
            bmp.set(x, y, [0, 0, 0, 255]);
        }
    }
    bmp
}
