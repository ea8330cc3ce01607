//! Still-image capture source.
//!
//! Scans a photo from local disk instead of a live feed. The image is decoded
//! once on acquisition and every tick yields the same frame, which makes the
//! scanner usable on snapshots taken with a phone.
//!
//! The still source MUST NOT:
//! - Fetch remote URLs
//! - Write decoded frames back to disk

use anyhow::Result;
use std::path::PathBuf;

use super::{CaptureConstraints, CaptureProvider, FrameSource};
use crate::error::ScanError;
use crate::frame::Frame;

/// Provider for a local image file.
#[derive(Clone, Debug)]
pub struct StillImageProvider {
    path: PathBuf,
}

impl StillImageProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CaptureProvider for StillImageProvider {
    fn acquire(&self, _constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, ScanError> {
        let decoded = image::open(&self.path).map_err(|err| {
            ScanError::DeviceUnavailable(format!("{}: {}", self.path.display(), err))
        })?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        log::info!(
            "StillImageSource: loaded {} ({}x{})",
            self.path.display(),
            width,
            height
        );
        Ok(Box::new(StillImageSource {
            path: self.path.clone(),
            pixels: Some(rgb.into_raw()),
            width,
            height,
        }))
    }
}

struct StillImageSource {
    path: PathBuf,
    pixels: Option<Vec<u8>>,
    width: u32,
    height: u32,
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let pixels = self
            .pixels
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("{} already released", self.path.display()))?;
        Ok(Some(Frame::from_rgb(pixels.clone(), self.width, self.height)?))
    }

    fn release(&mut self) {
        if let Some(mut pixels) = self.pixels.take() {
            zeroize::Zeroize::zeroize(&mut pixels);
        }
    }

    fn describe(&self) -> String {
        format!("{} ({}x{}, still)", self.path.display(), self.width, self.height)
    }
}
