//! Floyd-Steinberg error diffusion over a snapping palette.

use refine_types::Bitmap;

use crate::snap::PaletteSnapper;

/// Diffusion kernel: right, down-left, down, down-right.
const KERNEL: [(i64, i64, f32); 4] = [
    (1, 0, 7.0 / 16.0),
    (-1, 1, 3.0 / 16.0),
    (0, 1, 5.0 / 16.0),
    (1, 1, 1.0 / 16.0),
];

/// Dither in place: snap each non-transparent pixel to the palette and
/// diffuse the strength-scaled error into the working buffer itself.
///
/// Transparent pixels are skipped and never receive error; neighbor writes
/// clamp to [0, 255].
pub fn dither_floyd_steinberg(bitmap: &mut Bitmap, snapper: &mut PaletteSnapper, strength: f32) {
    let strength = strength.clamp(0.0, 1.0);
    let w = bitmap.width() as i64;
    let h = bitmap.height() as i64;

    for y in 0..h {
        for x in 0..w {
            let off = bitmap.offset(x as u32, y as u32);
            if bitmap.data()[off + 3] == 0 {
                continue;
            }
            let r = bitmap.data()[off];
            let g = bitmap.data()[off + 1];
            let b = bitmap.data()[off + 2];

            let idx = snapper.nearest(r, g, b);
            let entry = snapper.entry(idx);
            bitmap.data_mut()[off..off + 3].copy_from_slice(&entry);

            let err = [
                (r as f32 - entry[0] as f32) * strength,
                (g as f32 - entry[1] as f32) * strength,
                (b as f32 - entry[2] as f32) * strength,
            ];
            if err == [0.0, 0.0, 0.0] {
                continue;
            }

            for (dx, dy, weight) in KERNEL {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let noff = bitmap.offset(nx as u32, ny as u32);
                if bitmap.data()[noff + 3] == 0 {
                    continue;
                }
                let data = bitmap.data_mut();
                for c in 0..3 {
                    let accumulated = data[noff + c] as f32 + err[c] * weight;
                    data[noff + c] = accumulated.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}
