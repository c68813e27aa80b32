use std::collections::VecDeque;

use refine_types::Bitmap;

use crate::bitset::Bitset;

/// 4-connected tolerance fill that makes matching pixels transparent.
///
/// The target color is sampled from the seed pixel; see
/// [`flood_fill_with_target`] for the explicit-color variant. Runs in
/// O(width * height).
pub fn flood_fill(bitmap: &mut Bitmap, seed_x: u32, seed_y: u32, tolerance: u8, visited: &mut Bitset) {
    let seed = bitmap.get(seed_x as i64, seed_y as i64);
    flood_fill_with_target(
        bitmap,
        seed_x,
        seed_y,
        [seed[0], seed[1], seed[2]],
        tolerance,
        visited,
    );
}

/// Flood from `(seed_x, seed_y)` against an explicit target RGB.
///
/// A pixel is accepted iff it is unvisited, its alpha is non-zero, and each
/// channel is within `tolerance` of the target; accepted pixels get alpha 0
/// with RGB preserved. The visited set records every tested pixel, so a
/// shared set batches multiple seeds against the same target.
pub fn flood_fill_with_target(
    bitmap: &mut Bitmap,
    seed_x: u32,
    seed_y: u32,
    target_rgb: [u8; 3],
    tolerance: u8,
    visited: &mut Bitset,
) {
    let w = bitmap.width();
    let h = bitmap.height();
    if seed_x >= w || seed_y >= h {
        return;
    }

    let tol = tolerance as i32;
    let mut frontier = VecDeque::new();
    frontier.push_back((seed_x, seed_y));

    while let Some((x, y)) = frontier.pop_front() {
        let idx = y as usize * w as usize + x as usize;
        if visited.get(idx) {
            continue;
        }
        visited.set(idx);

        let off = bitmap.offset(x, y);
        let data = bitmap.data_mut();
        if data[off + 3] == 0 {
            continue;
        }
        let matches = (data[off] as i32 - target_rgb[0] as i32).abs() <= tol
            && (data[off + 1] as i32 - target_rgb[1] as i32).abs() <= tol
            && (data[off + 2] as i32 - target_rgb[2] as i32).abs() <= tol;
        if !matches {
            continue;
        }
        data[off + 3] = 0;

        if x > 0 {
            frontier.push_back((x - 1, y));
        }
        if x + 1 < w {
            frontier.push_back((x + 1, y));
        }
        if y > 0 {
            frontier.push_back((x, y - 1));
        }
        if y + 1 < h {
            frontier.push_back((x, y + 1));
        }
    }
}
