use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RefineError;

/// Scan axis for strip extraction and detector reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned RGBA8 bitmap, row-major, `data.len() == 4 * width * height`.
///
/// Pixels with alpha 0 are transparent; their RGB is preserved but carries
/// no meaning for the pipeline output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// Validate dimensions against the buffer and take ownership of it.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RefineError> {
        if width == 0 || height == 0 {
            return Err(RefineError::InvalidInput {
                message: format!("non-positive dimensions {}x{}", width, height),
            });
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(RefineError::InvalidInput {
                message: format!(
                    "buffer length {} does not match {}x{} RGBA ({} bytes)",
                    data.len(),
                    width,
                    height,
                    expected
                ),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Fully transparent black bitmap of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Byte offset of pixel (x, y); callers must pass in-range coordinates.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Read a pixel, clamping the coordinates into bounds.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> [u8; 4] {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        let i = self.offset(cx, cy);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Write a pixel; out-of-range coordinates are silently dropped.
    #[inline]
    pub fn set(&mut self, x: i64, y: i64, px: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = self.offset(x as u32, y as u32);
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Alpha of pixel (x, y) without clamping; callers stay in range.
    #[inline]
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        self.data[self.offset(x, y) + 3]
    }

    /// Floor every channel to the nearest multiple of `step` below it.
    ///
    /// Alpha is preserved. `step == 0` returns a clone.
    pub fn posterize(&self, step: u8) -> Bitmap {
        let mut out = self.clone();
        if step == 0 {
            return out;
        }
        for px in out.data.chunks_exact_mut(4) {
            px[0] -= px[0] % step;
            px[1] -= px[1] % step;
            px[2] -= px[2] % step;
        }
        out
    }

    /// Replicate every pixel into an n x n block. `factor <= 1` clones.
    pub fn upscale_nearest(&self, factor: u32) -> Bitmap {
        if factor <= 1 {
            return self.clone();
        }
        let mut out = Bitmap::blank(self.width * factor, self.height * factor);
        for y in 0..self.height {
            for x in 0..self.width {
                let i = self.offset(x, y);
                let px = [
                    self.data[i],
                    self.data[i + 1],
                    self.data[i + 2],
                    self.data[i + 3],
                ];
                for dy in 0..factor {
                    for dx in 0..factor {
                        out.set((x * factor + dx) as i64, (y * factor + dy) as i64, px);
                    }
                }
            }
        }
        out
    }

    /// Pixel sequence along row y=pos (axis Y) or column x=pos (axis X).
    ///
    /// `pos` is rounded and clamped into range.
    pub fn extract_strip(&self, axis: Axis, pos: f64) -> Vec<[u8; 4]> {
        match axis {
            Axis::Y => {
                let y = (pos.round() as i64).clamp(0, self.height as i64 - 1);
                (0..self.width as i64).map(|x| self.get(x, y)).collect()
            }
            Axis::X => {
                let x = (pos.round() as i64).clamp(0, self.width as i64 - 1);
                (0..self.height as i64).map(|y| self.get(x, y)).collect()
            }
        }
    }
}
