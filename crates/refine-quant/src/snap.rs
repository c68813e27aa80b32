//! Nearest-palette-entry snapping in Oklab space with dark-region biases,
//! memoized per packed RGB.

use std::collections::HashMap;

use refine_types::oklab::{self, pack_rgb, Oklab};
use refine_types::Bitmap;

/// Lightness below which exact black pulls very dark pixels toward it.
const BLACK_PULL_L: f32 = 0.2;
const BLACK_PULL_GAIN: f32 = 1.5;
/// Lightness below which RGB distance disambiguates near-black entries.
const RGB_BIAS_L: f32 = 0.1;

/// Palette matcher with precomputed Oklab coordinates and a per-color memo
/// table.
pub struct PaletteSnapper {
    palette_rgb: Vec<[u8; 3]>,
    palette_lab: Vec<Oklab>,
    /// Exact palette colors map to themselves, bypassing the biases.
    exact: HashMap<u32, usize>,
    memo: HashMap<u32, usize>,
    dark_bias: bool,
}

impl PaletteSnapper {
    /// `dark_bias` enables the black-pull and dark-RGB scoring adjustments
    /// used for fixed retro palettes; K-means palettes snap by plain
    /// distance.
    pub fn new(palette: &[[u8; 3]], dark_bias: bool) -> Self {
        let palette_rgb: Vec<[u8; 3]> = palette.to_vec();
        let palette_lab = palette_rgb
            .iter()
            .map(|c| oklab::srgb_to_oklab(c[0], c[1], c[2]))
            .collect();
        let mut exact = HashMap::with_capacity(palette_rgb.len());
        for (i, c) in palette_rgb.iter().enumerate() {
            exact.entry(pack_rgb(c[0], c[1], c[2])).or_insert(i);
        }
        Self {
            palette_rgb,
            palette_lab,
            exact,
            memo: HashMap::new(),
            dark_bias,
        }
    }

    pub fn palette(&self) -> &[[u8; 3]] {
        &self.palette_rgb
    }

    pub fn entry(&self, index: usize) -> [u8; 3] {
        self.palette_rgb[index]
    }

    /// Index of the nearest palette entry for an RGB color.
    pub fn nearest(&mut self, r: u8, g: u8, b: u8) -> usize {
        let key = pack_rgb(r, g, b);
        if let Some(&i) = self.exact.get(&key) {
            return i;
        }
        if let Some(&i) = self.memo.get(&key) {
            return i;
        }

        let lab = oklab::srgb_to_oklab(r, g, b);
        let mut best = 0usize;
        let mut best_score = f32::INFINITY;
        for i in 0..self.palette_rgb.len() {
            let score = self.score(i, lab, [r, g, b]);
            if score < best_score {
                best_score = score;
                best = i;
            }
        }
        self.memo.insert(key, best);
        best
    }

    fn score(&self, index: usize, lab: Oklab, rgb: [u8; 3]) -> f32 {
        let mut score = oklab::distance_sq(lab, self.palette_lab[index]);
        if !self.dark_bias {
            return score;
        }

        let l = lab[0];
        let entry = self.palette_rgb[index];
        if entry == [0, 0, 0] && l < BLACK_PULL_L {
            let pull = (BLACK_PULL_L - l) * BLACK_PULL_GAIN;
            score -= pull * pull;
        }
        if l < RGB_BIAS_L {
            let dr = (rgb[0] as f32 - entry[0] as f32) / 255.0;
            let dg = (rgb[1] as f32 - entry[1] as f32) / 255.0;
            let db = (rgb[2] as f32 - entry[2] as f32) / 255.0;
            let rgb_dist_sq = (dr * dr + dg * dg + db * db) / 3.0;
            score += rgb_dist_sq * (0.5 - l);
        }
        score
    }
}

/// Map every non-transparent pixel to its nearest palette entry.
pub fn snap_to_palette(src: &Bitmap, snapper: &mut PaletteSnapper) -> Bitmap {
    let mut out = src.clone();
    for px in out.data_mut().chunks_exact_mut(4) {
        if px[3] == 0 {
            continue;
        }
        let idx = snapper.nearest(px[0], px[1], px[2]);
        let entry = snapper.entry(idx);
        px[0..3].copy_from_slice(&entry);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use refine_types::palettes;

    #[test]
    fn test_exact_palette_colors_map_to_themselves() {
        let mut snapper = PaletteSnapper::new(&palettes::PICO8, true);
        for (i, c) in palettes::PICO8.iter().enumerate() {
            assert_eq!(snapper.nearest(c[0], c[1], c[2]), i, "entry {:?}", c);
        }
    }

    #[test]
    fn test_black_pull_bias() {
        // Very dark gray: without the bias the near-black blue of PICO-8
        // competes; with it the pixel lands on exact black.
        let mut biased = PaletteSnapper::new(&palettes::PICO8, true);
        let idx = biased.nearest(8, 8, 12);
        assert_eq!(biased.entry(idx), [0, 0, 0]);
    }

    #[test]
    fn test_plain_distance_without_bias() {
        let palette = [[0, 0, 0], [255, 255, 255]];
        let mut snapper = PaletteSnapper::new(&palette, false);
        let dark = snapper.nearest(30, 30, 30);
        assert_eq!(snapper.entry(dark), [0, 0, 0]);
        let light = snapper.nearest(220, 220, 220);
        assert_eq!(snapper.entry(light), [255, 255, 255]);
    }

    #[test]
    fn test_snap_preserves_transparency_and_alpha() {
        let mut bmp = Bitmap::blank(2, 1);
        bmp.set(0, 0, [200, 200, 200, 0]);
        bmp.set(1, 0, [200, 200, 200, 77]);
        let mut snapper = PaletteSnapper::new(&palettes::MONO, true);
        let out = snap_to_palette(&bmp, &mut snapper);
        assert_eq!(out.get(0, 0), [200, 200, 200, 0]);
        assert_eq!(out.get(1, 0), [255, 255, 255, 77]);
    }
}
