//! Captured frame container.
//!
//! A `Frame` is one snapshot of the live feed, normalized to packed RGB24
//! (row major, three bytes per pixel). Frames are immutable once built and are
//! discarded after the tick that captured them.
//!
//! Tongue images are personal health data: the pixel buffer is private, the
//! type is not `Clone`, and the bytes are zeroized when the frame is dropped.

use anyhow::{anyhow, Result};
use zeroize::Zeroize;

use crate::ingest::normalize::{normalize_to_rgb, PixelFormat};

/// Bytes per pixel in the packed RGB layout.
pub const RGB_CHANNELS: usize = 3;

// ----------------------------------------------------------------------------
// Frame: immutable RGB snapshot
// ----------------------------------------------------------------------------

/// Immutable RGB snapshot for a single sampling tick.
///
/// Explicitly NOT implementing Clone or AsRef<[u8]>: a frame lives for one
/// tick and is wiped on drop.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Build a frame from packed RGB24 bytes.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = packed_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a frame from any supported device pixel format.
    pub fn from_pixels(pixels: &[u8], width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let rgb = normalize_to_rgb(pixels, width, height, format)?;
        Self::from_rgb(rgb, width, height)
    }

    /// A frame where every pixel has the same color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut data = Vec::with_capacity(pixel_count * RGB_CHANNELS);
        for _ in 0..pixel_count {
            data.extend_from_slice(&rgb);
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// RGB triple at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }

    /// Packed RGB bytes of row `y` between columns `x` and `x + len`.
    ///
    /// Panics if the span leaves the frame; callers clamp first.
    pub(crate) fn row_span(&self, y: u32, x: u32, len: u32) -> &[u8] {
        let stride = self.width as usize * RGB_CHANNELS;
        let start = y as usize * stride + x as usize * RGB_CHANNELS;
        &self.data[start..start + len as usize * RGB_CHANNELS]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

fn packed_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
