//! Frame ingestion sources.
//!
//! This module provides the capture side of the scanner:
//! - `CaptureProvider`: acquires a device for a set of constraints
//! - `FrameSource`: the acquired device, yielding one `Frame` per tick
//! - Synthetic `stub://` source (testing, demos)
//! - USB/V4L2 webcams (feature: ingest-v4l2)
//! - Still photos on disk (feature: ingest-image)
//!
//! All sources produce RGB `Frame` instances. A source that is connected but
//! not yet streaming returns `Ok(None)` and the tick is skipped.
//!
//! The ingestion layer MUST NOT:
//! - Store frames to disk
//! - Log frame content

use anyhow::{anyhow, Result};

use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::frame::Frame;

pub mod normalize;
#[cfg(feature = "ingest-image")]
pub mod still;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

#[cfg(feature = "ingest-image")]
pub use still::StillImageProvider;
pub use synthetic::{SyntheticConfig, SyntheticProvider};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Provider;

/// What the scanner asks of a capture device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub video: bool,
    pub audio: bool,
    /// Preferred frame width. Devices may deliver something else.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    pub target_fps: u32,
}

impl CaptureConstraints {
    /// Video only, no audio.
    pub fn video_only(width: u32, height: u32, target_fps: u32) -> Self {
        Self {
            video: true,
            audio: false,
            width,
            height,
            target_fps,
        }
    }
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self::video_only(640, 480, 10)
    }
}

/// An acquired capture device.
///
/// Owned exclusively by one scan session.
pub trait FrameSource: Send {
    /// Grab the current frame. `Ok(None)` means the device is not producing frames yet.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying hardware. Must be idempotent.
    fn release(&mut self);

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Hands out capture devices.
pub trait CaptureProvider: Send + Sync {
    fn acquire(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, ScanError>;
}

/// Pick a provider for the configured device string.
///
/// - `stub://...` selects the synthetic source
/// - a path ending in an image extension selects the still-image source
/// - anything else is treated as a V4L2 device node
pub fn provider_for(config: &ScannerConfig) -> Result<Box<dyn CaptureProvider>> {
    let device = config.device.trim();
    if device.is_empty() {
        return Err(anyhow!("capture device must not be empty"));
    }
    if device.starts_with("stub://") {
        return Ok(Box::new(SyntheticProvider::new(SyntheticConfig {
            label: device.to_string(),
            width: config.width,
            height: config.height,
            ..SyntheticConfig::default()
        })));
    }
    if is_image_path(device) {
        #[cfg(feature = "ingest-image")]
        {
            return Ok(Box::new(StillImageProvider::new(device)));
        }
        #[cfg(not(feature = "ingest-image"))]
        {
            return Err(anyhow!(
                "still image scanning requires the ingest-image feature"
            ));
        }
    }
    if device.contains("://") {
        return Err(anyhow!(
            "unsupported capture device '{}' (only local devices are supported)",
            device
        ));
    }
    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Provider::new(device)))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow!("webcam capture requires the ingest-v4l2 feature"))
    }
}

fn is_image_path(device: &str) -> bool {
    let lower = device.to_ascii_lowercase();
    [".png", ".jpg", ".jpeg"]
        .iter()
        .any(|ext| lower.ends_with(ext))
}
