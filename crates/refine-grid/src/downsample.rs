use refine_types::{stats, Bitmap, Grid};

/// Samples with at least this much alpha feed the primary channel medians.
const SAMPLE_ALPHA: u8 = 16;

/// Collapse every grid cell to one output pixel by channel-wise median
/// sampling around the cell center.
///
/// The window is `sample_window` pixels on a side (clamped to 1..=9) and is
/// clipped at the image edges. Medians are taken over the alpha >=
/// [`SAMPLE_ALPHA`] samples; when none qualify, over all sampled pixels.
pub fn downsample(src: &Bitmap, grid: &Grid, sample_window: u32) -> Bitmap {
    let window = sample_window.clamp(1, 9) as i64;
    let mut out = Bitmap::blank(grid.out_w.max(1), grid.out_h.max(1));

    for j in 0..grid.out_h {
        let cy = cell_center(grid.crop_y, grid.cell_h, j);
        for i in 0..grid.out_w {
            let cx = cell_center(grid.crop_x, grid.cell_w, i);
            out.set(i as i64, j as i64, sample_median(src, cx, cy, window));
        }
    }
    out
}

/// Source-space center of output cell `index` along one axis.
///
/// Integer cells use integer arithmetic; fractional cells round half-up.
fn cell_center(crop: u32, cell: f64, index: u32) -> i64 {
    if cell.fract() == 0.0 && cell >= 1.0 {
        let c = cell as i64;
        crop as i64 + index as i64 * c + c / 2
    } else {
        (crop as f64 + (index as f64 + 0.5) * cell).round() as i64
    }
}

fn sample_median(src: &Bitmap, cx: i64, cy: i64, window: i64) -> [u8; 4] {
    // Fractional cells can round the center onto the crop edge.
    let cx = cx.clamp(0, src.width() as i64 - 1);
    let cy = cy.clamp(0, src.height() as i64 - 1);
    let start_x = (cx - (window - 1) / 2).max(0);
    let start_y = (cy - (window - 1) / 2).max(0);
    let end_x = (start_x + window).min(src.width() as i64);
    let end_y = (start_y + window).min(src.height() as i64);

    let mut opaque = Channels::default();
    let mut all = Channels::default();
    for y in start_y..end_y {
        for x in start_x..end_x {
            let px = src.get(x, y);
            all.push(px);
            if px[3] >= SAMPLE_ALPHA {
                opaque.push(px);
            }
        }
    }

    let chosen = if opaque.a.is_empty() { &mut all } else { &mut opaque };
    chosen.median()
}

#[derive(Default)]
struct Channels {
    r: Vec<f64>,
    g: Vec<f64>,
    b: Vec<f64>,
    a: Vec<f64>,
}

impl Channels {
    fn push(&mut self, px: [u8; 4]) {
        self.r.push(px[0] as f64);
        self.g.push(px[1] as f64);
        self.b.push(px[2] as f64);
        self.a.push(px[3] as f64);
    }

    fn median(&mut self) -> [u8; 4] {
        [
            stats::median(&mut self.r).round() as u8,
            stats::median(&mut self.g).round() as u8,
            stats::median(&mut self.b).round() as u8,
            stats::median(&mut self.a).round() as u8,
        ]
    }
}
