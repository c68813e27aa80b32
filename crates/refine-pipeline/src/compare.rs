use refine_types::Bitmap;

/// Nearest-neighbor resize used for the before/after comparison views.
pub(crate) fn resize_nearest(src: &Bitmap, width: u32, height: u32) -> Bitmap {
    let mut out = Bitmap::blank(width.max(1), height.max(1));
    let sx = src.width() as f64 / out.width() as f64;
    let sy = src.height() as f64 / out.height() as f64;
    for y in 0..out.height() {
        let src_y = ((y as f64 + 0.5) * sy) as i64;
        for x in 0..out.width() {
            let src_x = ((x as f64 + 0.5) * sx) as i64;
            out.set(x as i64, y as i64, src.get(src_x, src_y));
        }
    }
    out
}
