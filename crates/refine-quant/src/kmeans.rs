//! Count-weighted K-means over the unique opaque colors, clustered in
//! Oklab space.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use refine_types::oklab::{self, pack_rgb, unpack_rgb, Oklab};
use refine_types::Bitmap;

#[derive(Debug, Clone, Copy)]
pub struct KmeansParams {
    pub max_colors: usize,
    pub max_iterations: usize,
    /// Convergence bound on centroid movement, in Oklab units.
    pub tolerance: f32,
    /// Fixed seed for deterministic clustering; `None` uses entropy.
    pub seed: Option<u64>,
}

impl KmeansParams {
    pub fn new(max_colors: usize) -> Self {
        Self {
            max_colors,
            max_iterations: 20,
            tolerance: 0.001,
            seed: None,
        }
    }
}

/// Quantized bitmap plus the palette that produced it.
#[derive(Debug, Clone)]
pub struct Quantized {
    pub bitmap: Bitmap,
    pub palette: Vec<[u8; 3]>,
}

struct HistEntry {
    lab: Oklab,
    count: u32,
}

/// Histogram of the non-transparent pixels keyed by packed RGB.
fn build_histogram(src: &Bitmap) -> HashMap<u32, HistEntry> {
    let mut histogram: HashMap<u32, HistEntry> = HashMap::new();
    for px in src.data().chunks_exact(4) {
        if px[3] == 0 {
            continue;
        }
        histogram
            .entry(pack_rgb(px[0], px[1], px[2]))
            .and_modify(|e| e.count += 1)
            .or_insert_with(|| HistEntry {
                lab: oklab::srgb_to_oklab(px[0], px[1], px[2]),
                count: 1,
            });
    }
    histogram
}

/// Number of unique non-transparent colors.
pub fn unique_opaque_colors(src: &Bitmap) -> u32 {
    build_histogram(src).len() as u32
}

/// Reduce the bitmap to at most `max_colors` colors.
///
/// Transparent pixels pass through unchanged; opaque pixels take the RGB
/// of their cluster centroid and keep their alpha. When the input already
/// has no more unique opaque colors than `max_colors`, it is returned
/// bitwise unchanged.
pub fn quantize_kmeans(src: &Bitmap, params: &KmeansParams) -> Quantized {
    let histogram = build_histogram(src);
    let unique = histogram.len();

    // Stable ordering: by frequency, then by packed value.
    let mut entries: Vec<(u32, Oklab, u32)> = histogram
        .into_iter()
        .map(|(key, e)| (key, e.lab, e.count))
        .collect();
    entries.sort_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(&b.0)));

    if unique <= params.max_colors {
        let palette = entries.iter().map(|(key, _, _)| unpack_rgb(*key)).collect();
        return Quantized {
            bitmap: src.clone(),
            palette,
        };
    }

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let k = params.max_colors.min(unique);

    // Draw k distinct colors as the initial centroids.
    let mut centroids: Vec<Oklab> = entries
        .choose_multiple(&mut rng, k)
        .map(|(_, lab, _)| *lab)
        .collect();

    let tolerance_sq = params.tolerance * params.tolerance;
    for iteration in 0..params.max_iterations {
        let assignments = assign(&entries, &centroids);

        // Count-weighted mean per cluster; empty clusters reseed randomly.
        let mut sums = vec![[0.0f64; 3]; k];
        let mut weights = vec![0u64; k];
        for ((_, lab, count), &cluster) in entries.iter().zip(&assignments) {
            for c in 0..3 {
                sums[cluster][c] += lab[c] as f64 * *count as f64;
            }
            weights[cluster] += *count as u64;
        }

        let mut max_movement_sq = 0.0f32;
        for i in 0..k {
            if weights[i] == 0 {
                centroids[i] = entries[rng.gen_range(0..entries.len())].1;
                continue;
            }
            let updated = [
                (sums[i][0] / weights[i] as f64) as f32,
                (sums[i][1] / weights[i] as f64) as f32,
                (sums[i][2] / weights[i] as f64) as f32,
            ];
            max_movement_sq = max_movement_sq.max(oklab::distance_sq(centroids[i], updated));
            centroids[i] = updated;
        }

        debug!(iteration, max_movement_sq, "k-means iteration");
        if max_movement_sq < tolerance_sq {
            break;
        }
    }

    // Final assignment against the converged centroids.
    let assignments = assign(&entries, &centroids);
    let mut class_of: HashMap<u32, usize> = HashMap::with_capacity(entries.len());
    for ((key, _, _), &cluster) in entries.iter().zip(&assignments) {
        class_of.insert(*key, cluster);
    }

    let palette: Vec<[u8; 3]> = centroids.iter().map(|&lab| oklab::oklab_to_srgb(lab)).collect();

    let mut out = src.clone();
    for px in out.data_mut().chunks_exact_mut(4) {
        if px[3] == 0 {
            continue;
        }
        if let Some(&cluster) = class_of.get(&pack_rgb(px[0], px[1], px[2])) {
            px[0..3].copy_from_slice(&palette[cluster]);
        }
    }

    Quantized {
        bitmap: out,
        palette,
    }
}

fn assign(entries: &[(u32, Oklab, u32)], centroids: &[Oklab]) -> Vec<usize> {
    entries
        .iter()
        .map(|(_, lab, _)| {
            centroids
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    oklab::distance_sq(*lab, **a).total_cmp(&oklab::distance_sq(*lab, **b))
                })
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
        .collect()
}
