use refine_types::{Bitmap, RefineError};

/// Tight inclusive rectangle of pixels with alpha >= `threshold`, as
/// `(x, y, w, h)`. `None` when no pixel qualifies.
pub fn find_opaque_bounds(bitmap: &Bitmap, threshold: u8) -> Option<(u32, u32, u32, u32)> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut found = false;

    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            if bitmap.alpha_at(x, y) < threshold {
                continue;
            }
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if found {
        Some((min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    } else {
        None
    }
}

/// Copy the rectangle into a fresh bitmap. The rectangle must lie inside
/// the source bounds.
pub fn crop(bitmap: &Bitmap, x: u32, y: u32, w: u32, h: u32) -> Result<Bitmap, RefineError> {
    let x_end = x as u64 + w as u64;
    let y_end = y as u64 + h as u64;
    if w == 0 || h == 0 || x_end > bitmap.width() as u64 || y_end > bitmap.height() as u64 {
        return Err(RefineError::InvalidInput {
            message: format!(
                "crop {}x{}+{}+{} outside {}x{} source",
                w,
                h,
                x,
                y,
                bitmap.width(),
                bitmap.height()
            ),
        });
    }

    let mut out = Bitmap::blank(w, h);
    for row in 0..h {
        let src_start = bitmap.offset(x, y + row);
        let src_end = src_start + w as usize * 4;
        let dst_start = out.offset(0, row);
        let dst_end = dst_start + w as usize * 4;
        out.data_mut()[dst_start..dst_end].copy_from_slice(&bitmap.data()[src_start..src_end]);
    }
    Ok(out)
}
