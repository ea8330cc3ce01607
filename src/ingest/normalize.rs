use anyhow::{anyhow, Result};
use std::borrow::Cow;

/// Pixel layouts a capture device may hand us.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
    /// Canvas-style RGBA; alpha is dropped.
    Rgba32,
    /// OpenCV-style BGR.
    Bgr24,
    /// Packed 4:2:2, the default on most USB webcams.
    Yuyv,
    Nv12,
}

impl PixelFormat {
    /// `(rows, packed row bytes)` of each plane; packed formats leave the
    /// second plane empty. NV12 chroma is subsampled with rounding up.
    fn planes(self, width: usize, height: usize) -> Option<[(usize, usize); 2]> {
        let chroma_width = (width + 1) / 2;
        let chroma_height = (height + 1) / 2;
        Some(match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => [(height, width.checked_mul(3)?), (0, 0)],
            PixelFormat::Rgba32 => [(height, width.checked_mul(4)?), (0, 0)],
            PixelFormat::Yuyv => [(height, width.checked_mul(2)?), (0, 0)],
            PixelFormat::Nv12 => [(height, width), (chroma_height, chroma_width.checked_mul(2)?)],
        })
    }

    fn expected_len(self, width: u32, height: u32) -> Result<usize> {
        self.planes(width as usize, height as usize)
            .and_then(|planes| {
                planes.iter().try_fold(0usize, |acc, &(rows, bytes)| {
                    rows.checked_mul(bytes).and_then(|n| acc.checked_add(n))
                })
            })
            .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", self))
    }
}

/// Drop per-row padding from a buffer whose rows are `stride` bytes apart.
///
/// Returns the input untouched when rows are already packed.
pub fn strip_row_padding(
    pixels: &[u8],
    stride: usize,
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Cow<'_, [u8]>> {
    let planes = format
        .planes(width as usize, height as usize)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    if stride <= planes[0].1 {
        return Ok(Cow::Borrowed(pixels));
    }

    let mut packed = Vec::with_capacity(format.expected_len(width, height)?);
    let mut offset = 0usize;
    for &(rows, bytes) in &planes {
        for _ in 0..rows {
            let row = offset
                .checked_add(bytes)
                .and_then(|end| pixels.get(offset..end))
                .ok_or_else(|| {
                    anyhow!(
                        "{:?} buffer too short for {}x{} at stride {}: {} bytes",
                        format,
                        width,
                        height,
                        stride,
                        pixels.len()
                    )
                })?;
            packed.extend_from_slice(row);
            offset += stride;
        }
    }
    Ok(Cow::Owned(packed))
}

/// Convert a device buffer into packed RGB24.
pub fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    if format == PixelFormat::Yuyv && width % 2 != 0 {
        return Err(anyhow!("YUYV frame width must be even, got {}", width));
    }
    let expected = format.expected_len(width, height)?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{:?} frame length mismatch: expected {}, got {}",
            format,
            expected,
            pixels.len()
        ));
    }

    match format {
        PixelFormat::Rgb24 => Ok(pixels.to_vec()),
        PixelFormat::Rgba32 => Ok(pixels
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()),
        PixelFormat::Bgr24 => Ok(pixels
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect()),
        PixelFormat::Yuyv => Ok(yuyv_to_rgb(pixels)),
        PixelFormat::Nv12 => Ok(nv12_to_rgb(pixels, width, height)),
    }
}

fn yuyv_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 2 * 3);
    for macro_px in pixels.chunks_exact(4) {
        let (y0, u, y1, v) = (macro_px[0], macro_px[1], macro_px[2], macro_px[3]);
        rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
        rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
    }
    rgb
}

fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w * h;
    let uv_stride = (w + 1) / 2 * 2;

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let uv_index = y_plane + (j / 2) * uv_stride + (i / 2) * 2;
            let px = yuv_to_rgb(pixels[j * w + i], pixels[uv_index], pixels[uv_index + 1]);
            let offset = (j * w + i) * 3;
            rgb[offset..offset + 3].copy_from_slice(&px);
        }
    }
    rgb
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;

    [clamp_to_u8(r), clamp_to_u8(g), clamp_to_u8(b)]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
