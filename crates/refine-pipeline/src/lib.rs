//! Pipeline orchestrator: background masking, grid recovery, median
//! downsampling, color reduction and the optional outline, sequenced
//! according to the options record.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{info, instrument, warn};

use refine_grid::{
    auto_grid_from_trimmed, detect_grid, downsample, AutoGridStrategy, DetectParams,
};
use refine_mask::{
    crop, find_opaque_bounds, flood_fill_with_target, remove_floating, Bitset,
};
use refine_quant::{
    dither_floyd_steinberg, quantize_kmeans, snap_to_palette, unique_opaque_colors, KmeansParams,
    PaletteSnapper,
};
use refine_types::{
    oklab, palettes, stats::percentile, BgExtractionMethod, Bitmap, DitherMode, Grid,
    OutlineStyle, PipelineStats, ReduceColorMode, RefineError, RefineOptions, RefineResult,
};

mod compare;
mod observer;
mod outline;

pub use observer::PipelineObserver;
pub use outline::apply_outline;

use compare::resize_nearest;
use observer::{emit, empty_meta};

/// Channels below 8-bit precision are dropped in the SFC modes.
const SFC_ROUND_STEP: u8 = 8;
const SFC_SPRITE_COLORS: u32 = 16;
const SFC_BG_COLORS: u32 = 256;

/// Refine a bitmap according to the options record.
pub fn process(input: &Bitmap, options: &RefineOptions) -> Result<RefineResult, RefineError> {
    process_with_observer(input, options, None)
}

/// [`process`] with a debug observer receiving intermediate bitmaps at the
/// fixed stage names.
#[instrument(level = "info", skip_all, fields(width = input.width(), height = input.height()))]
pub fn process_with_observer(
    input: &Bitmap,
    options: &RefineOptions,
    mut observer: Option<&mut dyn PipelineObserver>,
) -> Result<RefineResult, RefineError> {
    let started = Instant::now();
    let opts = options.normalized();
    let mut stats = PipelineStats::default();

    emit(&mut observer, "00-input", input, &empty_meta());

    // Background masking: the sanitized copy always carries the mask; the
    // working bitmap only when pre-removal is requested.
    let mask_started = Instant::now();
    let bg = background_color(input, &opts);
    let mut sanitized = input.clone();
    mask_background(&mut sanitized, &opts, bg);
    let mut working = if opts.pre_remove_background {
        sanitized.clone()
    } else {
        input.clone()
    };
    emit(&mut observer, "01-working", &working, &empty_meta());

    if opts.ignore_floating && opts.floating_max_pixels > 0 {
        remove_floating(
            &mut working,
            &mut sanitized,
            opts.trim_alpha_threshold,
            opts.floating_max_pixels,
        )?;
        emit(
            &mut observer,
            "01b-working-ignore-floating",
            &working,
            &empty_meta(),
        );
    }
    stats.mask_ms = elapsed_ms(mask_started);

    // Route: forced output size, grid disabled, or automatic detection.
    let forced = opts.force_pixels_w.zip(opts.force_pixels_h);
    let (mut refined, mut grid, trim_downsampled) = if let Some((fw, fh)) = forced {
        forced_path(&working, &sanitized, &opts, fw, fh, &mut observer, &mut stats)?
    } else if !opts.enable_grid_detection {
        disabled_path(&working, &sanitized, &opts, &mut observer)?
    } else {
        auto_path(&working, &sanitized, &opts, &mut observer, &mut stats)?
    };

    if opts.post_remove_background {
        mask_background(&mut refined, &opts, bg);
        emit(
            &mut observer,
            "06-post-downsample-masked",
            &refined,
            &empty_meta(),
        );
    }

    // The auto paths trim the downsampled result; the other paths cropped
    // before sampling.
    if trim_downsampled && opts.trim_to_content {
        if let Some((tx, ty, tw, th)) = find_opaque_bounds(&refined, opts.trim_alpha_threshold) {
            if (tx, ty, tw, th) != (0, 0, refined.width(), refined.height()) {
                refined = crop(&refined, tx, ty, tw, th)?;
                translate_grid(&mut grid, tx, ty, tw, th, input.width(), input.height());
            }
            emit(&mut observer, "07-trimmed", &refined, &empty_meta());
        }
    }

    // Color reduction and dithering.
    let quant_started = Instant::now();
    let pre_quantize = (opts.reduce_color_mode != ReduceColorMode::None).then(|| refined.clone());
    let (refined, palette) = reduce_colors(refined, &opts)?;
    if let Some(pre) = pre_quantize {
        fill_quantize_stats(&pre, &refined, &mut stats);
    }
    stats.quantize_ms = elapsed_ms(quant_started);

    let refined = if opts.outline_style != OutlineStyle::None {
        apply_outline(&refined, opts.outline_style, opts.outline_color)
    } else {
        refined
    };

    let compare_before_original = resize_nearest(input, refined.width(), refined.height());
    let compare_before_sanitized = resize_nearest(&sanitized, refined.width(), refined.height());

    stats.total_ms = elapsed_ms(started);
    let mut meta = HashMap::new();
    meta.insert("cell_w".to_string(), grid.cell_w.to_string());
    meta.insert("cell_h".to_string(), grid.cell_h.to_string());
    meta.insert("out_w".to_string(), grid.out_w.to_string());
    meta.insert("out_h".to_string(), grid.out_h.to_string());
    emit(&mut observer, "99-result", &refined, &meta);

    info!(
        out_w = grid.out_w,
        out_h = grid.out_h,
        cell_w = grid.cell_w,
        cell_h = grid.cell_h,
        palette_len = palette.len(),
        total_ms = stats.total_ms,
        "pipeline finished"
    );

    Ok(RefineResult {
        bitmap: refined,
        grid,
        palette,
        compare_before_original,
        compare_before_sanitized,
        stats,
    })
}

/// Background RGB according to the extraction method; `None` disables
/// masking entirely.
fn background_color(input: &Bitmap, opts: &RefineOptions) -> Option<[u8; 3]> {
    let w = input.width() as i64;
    let h = input.height() as i64;
    let corner = |x: i64, y: i64| {
        let px = input.get(x, y);
        Some([px[0], px[1], px[2]])
    };
    match opts.bg_extraction_method {
        BgExtractionMethod::None => None,
        BgExtractionMethod::TopLeft => corner(0, 0),
        BgExtractionMethod::BottomLeft => corner(0, h - 1),
        BgExtractionMethod::TopRight => corner(w - 1, 0),
        BgExtractionMethod::BottomRight => corner(w - 1, h - 1),
        BgExtractionMethod::Rgb => {
            if opts.bg_rgb.is_none() {
                warn!("bg extraction method 'rgb' without bg_rgb, masking disabled");
            }
            opts.bg_rgb
        }
    }
}

/// Flood away the background and, when requested, every pixel matching the
/// background color regardless of connectivity.
fn mask_background(bitmap: &mut Bitmap, opts: &RefineOptions, bg: Option<[u8; 3]>) {
    let Some(bg) = bg else {
        return;
    };
    let w = bitmap.width();
    let h = bitmap.height();
    let tol = opts.background_tolerance;
    let mut visited = Bitset::new(w as usize * h as usize);

    match opts.bg_extraction_method {
        BgExtractionMethod::None => return,
        BgExtractionMethod::Rgb => {
            // Every border pixel seeds the fill; the shared visited set
            // keeps the batch linear.
            for x in 0..w {
                flood_fill_with_target(bitmap, x, 0, bg, tol, &mut visited);
                flood_fill_with_target(bitmap, x, h - 1, bg, tol, &mut visited);
            }
            for y in 0..h {
                flood_fill_with_target(bitmap, 0, y, bg, tol, &mut visited);
                flood_fill_with_target(bitmap, w - 1, y, bg, tol, &mut visited);
            }
        }
        BgExtractionMethod::TopLeft => flood_fill_with_target(bitmap, 0, 0, bg, tol, &mut visited),
        BgExtractionMethod::BottomLeft => {
            flood_fill_with_target(bitmap, 0, h - 1, bg, tol, &mut visited)
        }
        BgExtractionMethod::TopRight => {
            flood_fill_with_target(bitmap, w - 1, 0, bg, tol, &mut visited)
        }
        BgExtractionMethod::BottomRight => {
            flood_fill_with_target(bitmap, w - 1, h - 1, bg, tol, &mut visited)
        }
    }

    if opts.remove_inner_background {
        let tol = tol as i32;
        for px in bitmap.data_mut().chunks_exact_mut(4) {
            if px[3] == 0 {
                continue;
            }
            let matches = (px[0] as i32 - bg[0] as i32).abs() <= tol
                && (px[1] as i32 - bg[1] as i32).abs() <= tol
                && (px[2] as i32 - bg[2] as i32).abs() <= tol;
            if matches {
                px[3] = 0;
            }
        }
    }
}

/// Forced output dimensions: crop to content, derive the cell size from the
/// crop, and downsample straight to the requested grid.
fn forced_path(
    working: &Bitmap,
    sanitized: &Bitmap,
    opts: &RefineOptions,
    force_w: u32,
    force_h: u32,
    observer: &mut Option<&mut dyn PipelineObserver>,
    stats: &mut PipelineStats,
) -> Result<(Bitmap, Grid, bool), RefineError> {
    emit(observer, "02-pre-downsample-masked", sanitized, &empty_meta());

    let threshold = opts.trim_alpha_threshold;
    let (bx, by, bw, bh) = find_opaque_bounds(sanitized, threshold)
        .ok_or(RefineError::ContentNotFound { threshold })?;
    let cropped = crop(working, bx, by, bw, bh)?;
    emit(observer, "03-pre-downsample-bg-trimmed", &cropped, &empty_meta());

    let cell_w = bw as f64 / force_w as f64;
    let cell_h = bh as f64 / force_h as f64;
    // Sub-pixel cells mean enlargement; the median window collapses to the
    // center sample.
    let window = if cell_w < 1.0 || cell_h < 1.0 {
        1
    } else {
        opts.sample_window
    };

    let sample_grid = Grid {
        cell_w,
        cell_h,
        offset_x: 0.0,
        offset_y: 0.0,
        crop_x: 0,
        crop_y: 0,
        crop_w: bw,
        crop_h: bh,
        out_w: force_w,
        out_h: force_h,
        score: 0.0,
    };
    let t = Instant::now();
    let down = downsample(&cropped, &sample_grid, window);
    stats.downsample_ms += elapsed_ms(t);
    emit(observer, "05-downsampled", &down, &empty_meta());

    let grid = Grid {
        crop_x: bx,
        crop_y: by,
        ..sample_grid
    };
    Ok((down, grid, false))
}

/// Grid detection disabled: mask, optionally crop to content, report a
/// 1:1 grid.
fn disabled_path(
    working: &Bitmap,
    sanitized: &Bitmap,
    opts: &RefineOptions,
    observer: &mut Option<&mut dyn PipelineObserver>,
) -> Result<(Bitmap, Grid, bool), RefineError> {
    emit(observer, "02-pre-downsample-masked", sanitized, &empty_meta());

    if opts.trim_to_content {
        if let Some((bx, by, bw, bh)) = find_opaque_bounds(sanitized, opts.trim_alpha_threshold) {
            let cropped = crop(working, bx, by, bw, bh)?;
            emit(observer, "03-pre-downsample-bg-trimmed", &cropped, &empty_meta());
            return Ok((cropped, Grid::identity(bx, by, bw, bh), false));
        }
    }
    Ok((
        working.clone(),
        Grid::identity(0, 0, working.width(), working.height()),
        false,
    ))
}

/// Automatic grid recovery: trimmed-region search or run-length detection,
/// applied to the full working bitmap.
fn auto_path(
    working: &Bitmap,
    sanitized: &Bitmap,
    opts: &RefineOptions,
    observer: &mut Option<&mut dyn PipelineObserver>,
    stats: &mut PipelineStats,
) -> Result<(Bitmap, Grid, bool), RefineError> {
    emit(observer, "02-pre-downsample-masked", sanitized, &empty_meta());
    let threshold = opts.trim_alpha_threshold;

    let grid = if opts.auto_grid_from_trimmed {
        let (bx, by, bw, bh) = find_opaque_bounds(sanitized, threshold)
            .ok_or(RefineError::ContentNotFound { threshold })?;
        let cropped_working = crop(working, bx, by, bw, bh)?;
        let cropped_mask = crop(sanitized, bx, by, bw, bh)?;
        emit(
            observer,
            "03-pre-downsample-bg-trimmed",
            &cropped_working,
            &empty_meta(),
        );

        let strategy = if opts.fast_auto_grid_from_trimmed {
            AutoGridStrategy::Fast
        } else {
            AutoGridStrategy::Legacy
        };
        let t = Instant::now();
        let auto = auto_grid_from_trimmed(
            &cropped_working,
            &cropped_mask,
            opts.sample_window,
            threshold,
            strategy,
        )?;
        stats.grid_ms += elapsed_ms(t);

        // Apply the found cell size to the full bitmap, aligned with the
        // content box, so trimming stays a crop of the result.
        full_image_grid(working.width(), working.height(), bx, by, auto.cell_w, auto.cell_h, auto.score)
    } else {
        let t = Instant::now();
        let params = DetectParams {
            quant_step: opts.detection_quant_step,
            alpha_threshold: threshold,
            max_cells_x: opts.auto_max_cells_w,
            max_cells_y: opts.auto_max_cells_h,
        };
        let grid = detect_grid(working, &params)?;
        stats.grid_ms += elapsed_ms(t);
        grid
    };

    if observer.is_some() {
        let view = crop(working, grid.crop_x, grid.crop_y, grid.crop_w, grid.crop_h)?;
        emit(observer, "04-grid-crop", &view, &empty_meta());
    }

    let t = Instant::now();
    let down = downsample(working, &grid, opts.sample_window);
    stats.downsample_ms += elapsed_ms(t);
    emit(observer, "05-downsampled", &down, &empty_meta());

    Ok((down, grid, true))
}

/// Grid covering the whole image with the given cell size, offset so cell
/// boundaries align with the content box origin.
fn full_image_grid(
    width: u32,
    height: u32,
    content_x: u32,
    content_y: u32,
    cell_w: f64,
    cell_h: f64,
    score: f64,
) -> Grid {
    let offset_x = (content_x as f64).rem_euclid(cell_w);
    let offset_y = (content_y as f64).rem_euclid(cell_h);
    let out_w = (((width as f64 - offset_x) / cell_w).floor() as u32).max(1);
    let out_h = (((height as f64 - offset_y) / cell_h).floor() as u32).max(1);
    let crop_x = offset_x.floor() as u32;
    let crop_y = offset_y.floor() as u32;
    let crop_w = ((out_w as f64 * cell_w).round() as u32).min(width - crop_x);
    let crop_h = ((out_h as f64 * cell_h).round() as u32).min(height - crop_y);
    Grid {
        cell_w,
        cell_h,
        offset_x,
        offset_y,
        crop_x,
        crop_y,
        crop_w,
        crop_h,
        out_w,
        out_h,
        score,
    }
}

/// Re-anchor the grid after the downsampled result lost `tx`/`ty` leading
/// cells to the content trim.
fn translate_grid(grid: &mut Grid, tx: u32, ty: u32, tw: u32, th: u32, src_w: u32, src_h: u32) {
    grid.crop_x = (grid.offset_x + tx as f64 * grid.cell_w).round() as u32;
    grid.crop_y = (grid.offset_y + ty as f64 * grid.cell_h).round() as u32;
    grid.out_w = tw;
    grid.out_h = th;
    grid.crop_w = ((tw as f64 * grid.cell_w).round() as u32).min(src_w.saturating_sub(grid.crop_x));
    grid.crop_h = ((th as f64 * grid.cell_h).round() as u32).min(src_h.saturating_sub(grid.crop_y));
}

/// Apply the configured quantizer; unknown or unusable palette selections
/// fall back to auto K-means with `color_count`.
fn reduce_colors(
    refined: Bitmap,
    opts: &RefineOptions,
) -> Result<(Bitmap, Vec<[u8; 3]>), RefineError> {
    let dither = opts.dither_mode == DitherMode::FloydSteinberg && opts.dither_strength > 0;
    let strength = opts.dither_strength as f32 / 100.0;

    match opts.reduce_color_mode {
        ReduceColorMode::None => Ok((refined, Vec::new())),
        ReduceColorMode::Auto => Ok(kmeans_reduce(
            refined,
            opts.color_count,
            opts.rng_seed,
            dither,
            strength,
            false,
        )),
        ReduceColorMode::SfcSprite => Ok(kmeans_reduce(
            refined,
            SFC_SPRITE_COLORS,
            opts.rng_seed,
            dither,
            strength,
            true,
        )),
        ReduceColorMode::SfcBg => Ok(kmeans_reduce(
            refined,
            SFC_BG_COLORS,
            opts.rng_seed,
            dither,
            strength,
            true,
        )),
        ReduceColorMode::Fixed => match opts.fixed_palette.as_deref() {
            Some(palette) if !palette.is_empty() => {
                Ok(fixed_reduce(refined, palette, dither, strength))
            }
            _ => {
                let fallback = RefineError::UnknownPalette {
                    name: opts.reduce_color_mode.name().to_string(),
                };
                warn!(code = fallback.code(), %fallback, "falling back to auto quantization");
                Ok(kmeans_reduce(
                    refined,
                    opts.color_count,
                    opts.rng_seed,
                    dither,
                    strength,
                    false,
                ))
            }
        },
        mode => match palettes::lookup(mode) {
            Some(palette) => Ok(fixed_reduce(refined, palette, dither, strength)),
            None => {
                let fallback = RefineError::UnknownPalette {
                    name: mode.name().to_string(),
                };
                warn!(code = fallback.code(), %fallback, "falling back to auto quantization");
                Ok(kmeans_reduce(
                    refined,
                    opts.color_count,
                    opts.rng_seed,
                    dither,
                    strength,
                    false,
                ))
            }
        },
    }
}

fn kmeans_reduce(
    bitmap: Bitmap,
    max_colors: u32,
    seed: Option<u64>,
    dither: bool,
    strength: f32,
    sfc_pre_round: bool,
) -> (Bitmap, Vec<[u8; 3]>) {
    let source = if sfc_pre_round {
        bitmap.posterize(SFC_ROUND_STEP)
    } else {
        bitmap
    };
    let params = KmeansParams {
        seed,
        ..KmeansParams::new(max_colors as usize)
    };
    let quantized = quantize_kmeans(&source, &params);

    if dither {
        // Diffuse from the pre-quantize pixels against the derived palette.
        let mut snapper = PaletteSnapper::new(&quantized.palette, false);
        let mut out = source;
        dither_floyd_steinberg(&mut out, &mut snapper, strength);
        (out, quantized.palette)
    } else {
        (quantized.bitmap, quantized.palette)
    }
}

fn fixed_reduce(
    bitmap: Bitmap,
    palette: &[[u8; 3]],
    dither: bool,
    strength: f32,
) -> (Bitmap, Vec<[u8; 3]>) {
    let mut snapper = PaletteSnapper::new(palette, true);
    if dither {
        let mut out = bitmap;
        dither_floyd_steinberg(&mut out, &mut snapper, strength);
        (out, palette.to_vec())
    } else {
        (snap_to_palette(&bitmap, &mut snapper), palette.to_vec())
    }
}

/// Oklab delta-E between the pre- and post-quantize bitmaps over the
/// non-transparent pixels.
fn fill_quantize_stats(pre: &Bitmap, post: &Bitmap, stats: &mut PipelineStats) {
    stats.unique_colors_in = unique_opaque_colors(pre);
    stats.unique_colors_out = unique_opaque_colors(post);

    let mut deltas: Vec<f64> = Vec::new();
    for (a, b) in pre
        .data()
        .chunks_exact(4)
        .zip(post.data().chunks_exact(4))
    {
        if a[3] == 0 || b[3] == 0 {
            continue;
        }
        let la = oklab::srgb_to_oklab(a[0], a[1], a[2]);
        let lb = oklab::srgb_to_oklab(b[0], b[1], b[2]);
        deltas.push((oklab::distance_sq(la, lb) as f64).sqrt());
    }
    if deltas.is_empty() {
        return;
    }
    stats.mean_delta_e = (deltas.iter().sum::<f64>() / deltas.len() as f64) as f32;
    stats.p95_delta_e = percentile(&mut deltas, 95.0) as f32;
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
