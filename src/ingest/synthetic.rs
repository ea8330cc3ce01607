//! Synthetic `stub://` capture source.
//!
//! Produces solid-color frames from a scripted palette so the scanner can be
//! exercised without a camera. The default palette walks through one color
//! per diagnosis.
//!
//! The provider can also be built unavailable to simulate a denied camera
//! permission, and it counts acquisitions and releases so callers can check
//! that a session gave its device back.

use anyhow::Result;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::{CaptureConstraints, CaptureProvider, FrameSource};
use crate::error::ScanError;
use crate::frame::Frame;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Device label (e.g., "stub://tongue").
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Colors cycled through, one per `frames_per_color` frames.
    pub palette: Vec<[u8; 3]>,
    pub frames_per_color: u64,
    /// Number of initial ticks for which the source yields no frame.
    pub warmup_frames: u64,
    /// Maximum per-channel jitter added to every pixel.
    pub noise: u8,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            label: "stub://tongue".to_string(),
            width: 640,
            height: 480,
            palette: vec![
                [200, 50, 50],
                [220, 220, 220],
                [150, 100, 100],
                [100, 150, 200],
            ],
            frames_per_color: 10,
            warmup_frames: 0,
            noise: 0,
        }
    }
}

/// Statistics shared between a provider and the sources it hands out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyntheticStats {
    pub acquisitions: u64,
    pub releases: u64,
    pub frames_captured: u64,
}

#[derive(Debug, Default)]
struct Counters {
    acquisitions: AtomicU64,
    releases: AtomicU64,
    frames_captured: AtomicU64,
}

/// Provider for `stub://` devices.
#[derive(Clone, Debug)]
pub struct SyntheticProvider {
    config: SyntheticConfig,
    available: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl SyntheticProvider {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            available: Arc::new(AtomicBool::new(true)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Provider whose single color never changes.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(SyntheticConfig {
            width,
            height,
            palette: vec![rgb],
            ..SyntheticConfig::default()
        })
    }

    /// Provider that refuses every acquisition, like a denied permission prompt.
    pub fn unavailable() -> Self {
        let provider = Self::new(SyntheticConfig::default());
        provider.set_available(false);
        provider
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn stats(&self) -> SyntheticStats {
        SyntheticStats {
            acquisitions: self.counters.acquisitions.load(Ordering::SeqCst),
            releases: self.counters.releases.load(Ordering::SeqCst),
            frames_captured: self.counters.frames_captured.load(Ordering::SeqCst),
        }
    }
}

impl CaptureProvider for SyntheticProvider {
    fn acquire(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, ScanError> {
        if !constraints.video {
            return Err(ScanError::DeviceUnavailable(
                "synthetic source only provides video".to_string(),
            ));
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(ScanError::DeviceUnavailable(format!(
                "{}: permission denied",
                self.config.label
            )));
        }
        self.counters.acquisitions.fetch_add(1, Ordering::SeqCst);
        log::info!("SyntheticSource: connected to {}", self.config.label);
        Ok(Box::new(SyntheticSource {
            config: self.config.clone(),
            counters: self.counters.clone(),
            tick: 0,
            released: false,
        }))
    }
}

// ----------------------------------------------------------------------------
// Acquired source
// ----------------------------------------------------------------------------

struct SyntheticSource {
    config: SyntheticConfig,
    counters: Arc<Counters>,
    tick: u64,
    released: bool,
}

impl SyntheticSource {
    fn current_color(&self, frame_index: u64) -> [u8; 3] {
        if self.config.palette.is_empty() {
            return [0, 0, 0];
        }
        let per_color = self.config.frames_per_color.max(1);
        let index = (frame_index / per_color) as usize % self.config.palette.len();
        self.config.palette[index]
    }

    fn generate_pixels(&self, rgb: [u8; 3]) -> Vec<u8> {
        let pixel_count = self.config.width as usize * self.config.height as usize;
        let mut pixels = Vec::with_capacity(pixel_count * 3);
        if self.config.noise == 0 {
            for _ in 0..pixel_count {
                pixels.extend_from_slice(&rgb);
            }
            return pixels;
        }
        let mut rng = rand::thread_rng();
        let noise = self.config.noise as i16;
        for _ in 0..pixel_count {
            for channel in rgb {
                let jitter = rng.gen_range(-noise..=noise);
                pixels.push((channel as i16 + jitter).clamp(0, 255) as u8);
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        anyhow::ensure!(!self.released, "{} already released", self.config.label);
        self.tick += 1;
        if self.tick <= self.config.warmup_frames {
            return Ok(None);
        }
        let frame_index = self.tick - self.config.warmup_frames - 1;
        let pixels = self.generate_pixels(self.current_color(frame_index));
        let frame = Frame::from_rgb(pixels, self.config.width, self.config.height)?;
        self.counters.frames_captured.fetch_add(1, Ordering::SeqCst);
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        log::info!("SyntheticSource: released {}", self.config.label);
    }

    fn describe(&self) -> String {
        format!(
            "{} ({}x{}, synthetic)",
            self.config.label, self.config.width, self.config.height
        )
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.release();
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_source_produces_frames() -> Result<()> {
        let provider = SyntheticProvider::solid(320, 240, [150, 100, 100]);
        let mut source = provider.acquire(&CaptureConstraints::default())?;

        let frame = source.next_frame()?.expect("frame");
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.pixel(10, 10), Some([150, 100, 100]));
        assert_eq!(provider.stats().frames_captured, 1);

        Ok(())
    }

    #[test]
    fn warmup_frames_yield_nothing() -> Result<()> {
        let provider = SyntheticProvider::new(SyntheticConfig {
            width: 8,
            height: 8,
            warmup_frames: 2,
            ..SyntheticConfig::default()
        });
        let mut source = provider.acquire(&CaptureConstraints::default())?;
        assert!(source.next_frame()?.is_none());
        assert!(source.next_frame()?.is_none());
        assert!(source.next_frame()?.is_some());
        Ok(())
    }

    #[test]
    fn palette_cycles_per_color_block() -> Result<()> {
        let provider = SyntheticProvider::new(SyntheticConfig {
            width: 2,
            height: 2,
            palette: vec![[1, 1, 1], [2, 2, 2]],
            frames_per_color: 2,
            ..SyntheticConfig::default()
        });
        let mut source = provider.acquire(&CaptureConstraints::default())?;
        let mut seen = Vec::new();
        for _ in 0..5 {
            let frame = source.next_frame()?.expect("frame");
            seen.push(frame.pixel(0, 0).expect("pixel")[0]);
        }
        assert_eq!(seen, vec![1, 1, 2, 2, 1]);
        Ok(())
    }

    #[test]
    fn noise_stays_within_bounds() -> Result<()> {
        let provider = SyntheticProvider::new(SyntheticConfig {
            width: 16,
            height: 16,
            palette: vec![[250, 5, 128]],
            noise: 10,
            ..SyntheticConfig::default()
        });
        let mut source = provider.acquire(&CaptureConstraints::default())?;
        let frame = source.next_frame()?.expect("frame");
        for y in 0..16 {
            for x in 0..16 {
                let [r, g, b] = frame.pixel(x, y).expect("pixel");
                assert!(r >= 240);
                assert!(g <= 15);
                assert!((118..=138).contains(&b));
            }
        }
        Ok(())
    }

    #[test]
    fn unavailable_provider_reports_device_unavailable() {
        let provider = SyntheticProvider::unavailable();
        let err = provider
            .acquire(&CaptureConstraints::default())
            .err()
            .expect("acquire must fail");
        assert!(matches!(err, ScanError::DeviceUnavailable(_)));
        assert_eq!(provider.stats().acquisitions, 0);
    }

    #[test]
    fn release_is_idempotent_and_counted_once() -> Result<()> {
        let provider = SyntheticProvider::solid(4, 4, [0, 0, 0]);
        let mut source = provider.acquire(&CaptureConstraints::default())?;
        source.release();
        source.release();
        assert!(source.next_frame().is_err());
        drop(source);
        assert_eq!(provider.stats().releases, 1);
        Ok(())
    }
}
