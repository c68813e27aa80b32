use refine_types::{Bitmap, OutlineStyle};

/// Add a one-pixel outline around the opaque content.
///
/// The bitmap grows by one pixel on each side; every transparent pixel
/// with an opaque 4-neighbor (`sharp`) or 8-neighbor (`rounded`) becomes
/// the outline color at full alpha.
pub fn apply_outline(src: &Bitmap, style: OutlineStyle, color: [u8; 3]) -> Bitmap {
    if style == OutlineStyle::None {
        return src.clone();
    }

    let mut expanded = Bitmap::blank(src.width() + 2, src.height() + 2);
    for y in 0..src.height() {
        for x in 0..src.width() {
            expanded.set(x as i64 + 1, y as i64 + 1, src.get(x as i64, y as i64));
        }
    }

    let neighbors: &[(i64, i64)] = match style {
        OutlineStyle::Sharp => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
        _ => &[
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ],
    };

    let mut rim: Vec<(u32, u32)> = Vec::new();
    for y in 0..expanded.height() {
        for x in 0..expanded.width() {
            if expanded.alpha_at(x, y) != 0 {
                continue;
            }
            let touches = neighbors.iter().any(|&(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                nx >= 0
                    && ny >= 0
                    && nx < expanded.width() as i64
                    && ny < expanded.height() as i64
                    && expanded.alpha_at(nx as u32, ny as u32) != 0
            });
            if touches {
                rim.push((x, y));
            }
        }
    }
    for (x, y) in rim {
        expanded.set(x as i64, y as i64, [color[0], color[1], color[2], 255]);
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot() -> Bitmap {
        let mut bmp = Bitmap::blank(3, 3);
        bmp.set(1, 1, [10, 20, 30, 255]);
        bmp
    }

    #[test]
    fn test_none_is_clone() {
        let bmp = dot();
        assert_eq!(apply_outline(&bmp, OutlineStyle::None, [255, 0, 0]), bmp);
    }

    #[test]
    fn test_sharp_outlines_four_neighbors() {
        let out = apply_outline(&dot(), OutlineStyle::Sharp, [255, 0, 0]);
        assert_eq!(out.width(), 5);
        assert_eq!(out.height(), 5);
        // The dot moved to (2,2); its 4-neighbors are outlined.
        assert_eq!(out.get(2, 2), [10, 20, 30, 255]);
        assert_eq!(out.get(1, 2), [255, 0, 0, 255]);
        assert_eq!(out.get(2, 1), [255, 0, 0, 255]);
        // Diagonal stays transparent in sharp mode.
        assert_eq!(out.get(1, 1)[3], 0);
    }

    #[test]
    fn test_rounded_outlines_diagonals() {
        let out = apply_outline(&dot(), OutlineStyle::Rounded, [0, 255, 0]);
        assert_eq!(out.get(1, 1), [0, 255, 0, 255]);
        assert_eq!(out.get(3, 3), [0, 255, 0, 255]);
        assert_eq!(out.get(0, 0)[3], 0);
    }
}
