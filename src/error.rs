use thiserror::Error;

/// Errors the scanner reports to its caller.
///
/// Everything that is not one of these flows through `anyhow::Result`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Permission denied, no camera present, or the device could not be opened.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    /// No pixels left to sample after clamping the region to the frame.
    #[error("sample region out of bounds for {width}x{height} frame")]
    RegionOutOfBounds { width: u32, height: u32 },
    #[error("scheduler failed: {0}")]
    Scheduler(String),
}

impl ScanError {
    /// Message shown to the person holding the camera.
    pub fn user_message(&self) -> &'static str {
        match self {
            ScanError::DeviceUnavailable(_) => "Could not access webcam. Please check permissions.",
            ScanError::RegionOutOfBounds { .. } => "Frame too small to sample. Move closer.",
            ScanError::Scheduler(_) => "Scanner could not start. Please try again.",
        }
    }
}
