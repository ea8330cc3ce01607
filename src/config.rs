use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::analyze::DEFAULT_REGION_SIDE;
use crate::ingest::CaptureConstraints;

const DEFAULT_DEVICE: &str = "stub://tongue";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_PERIOD_MS: u64 = 100;

#[derive(Debug, Deserialize, Default)]
struct ScannerConfigFile {
    capture: Option<CaptureConfigFile>,
    sampling: Option<SamplingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SamplingConfigFile {
    region_side: Option<u32>,
    period_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// `stub://...`, a V4L2 device node, or an image path.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Nominal side of the center sampling square.
    pub region_side: u32,
    /// Interval between ticks.
    pub period: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            target_fps: DEFAULT_TARGET_FPS,
            region_side: DEFAULT_REGION_SIDE,
            period: Duration::from_millis(DEFAULT_PERIOD_MS),
        }
    }
}

impl ScannerConfig {
    /// Defaults, then the file named by `TONGUE_SCANNER_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("TONGUE_SCANNER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Capture constraints derived from this configuration (video only).
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints::video_only(self.width, self.height, self.target_fps)
    }

    fn from_file(file: ScannerConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let sampling = file.sampling.unwrap_or_default();
        Self {
            device: capture.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            width: capture.width.unwrap_or(DEFAULT_WIDTH),
            height: capture.height.unwrap_or(DEFAULT_HEIGHT),
            target_fps: capture.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            region_side: sampling.region_side.unwrap_or(DEFAULT_REGION_SIDE),
            period: Duration::from_millis(sampling.period_ms.unwrap_or(DEFAULT_PERIOD_MS)),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("TONGUE_SCANNER_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device.trim().to_string();
            }
        }
        if let Ok(side) = std::env::var("TONGUE_SCANNER_REGION") {
            self.region_side = side
                .trim()
                .parse()
                .map_err(|_| anyhow!("TONGUE_SCANNER_REGION must be an integer number of pixels"))?;
        }
        if let Ok(period) = std::env::var("TONGUE_SCANNER_PERIOD_MS") {
            let millis: u64 = period.trim().parse().map_err(|_| {
                anyhow!("TONGUE_SCANNER_PERIOD_MS must be an integer number of milliseconds")
            })?;
            self.period = Duration::from_millis(millis);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(anyhow!("capture device must not be empty"));
        }
        if self.region_side == 0 {
            return Err(anyhow!("region side must be greater than zero"));
        }
        if self.period.is_zero() {
            return Err(anyhow!("sampling period must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScannerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behavior() {
        let cfg = ScannerConfig::default();
        assert_eq!(cfg.region_side, 200);
        assert_eq!(cfg.period, Duration::from_millis(100));
        assert!(cfg.validate().is_ok());
        let constraints = cfg.constraints();
        assert!(constraints.video && !constraints.audio);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file: ScannerConfigFile =
            serde_json::from_str(r#"{ "sampling": { "region_side": 120 } }"#).unwrap();
        let cfg = ScannerConfig::from_file(file);
        assert_eq!(cfg.region_side, 120);
        assert_eq!(cfg.device, DEFAULT_DEVICE);
        assert_eq!(cfg.period, Duration::from_millis(DEFAULT_PERIOD_MS));
    }

    #[test]
    fn validate_rejects_zero_values() {
        let cfg = ScannerConfig {
            region_side: 0,
            ..ScannerConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = ScannerConfig {
            period: Duration::ZERO,
            ..ScannerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
