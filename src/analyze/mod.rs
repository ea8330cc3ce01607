//! Color classification of a frame's center region.
//!
//! One tick runs: region extraction -> channel averaging -> ordered
//! thresholding. The pipeline is pure; it never touches the capture device.

mod classifier;
mod diagnosis;
mod reading;
mod region;
pub mod rules;

pub use classifier::{Classifier, ThresholdClassifier};
pub use diagnosis::Diagnosis;
pub use reading::ColorReading;
pub use region::{SampleRegion, DEFAULT_REGION_SIDE};

use serde::Serialize;

use crate::error::ScanError;
use crate::frame::Frame;

/// Result of classifying one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub region: SampleRegion,
    pub reading: ColorReading,
    pub diagnosis: Diagnosis,
}

/// Classify the center region of `frame` using a nominal side of `side` pixels.
///
/// Regions larger than the frame are clamped to it. Returns `None` only when
/// no pixel can be sampled.
pub fn classify(frame: &Frame, side: u32) -> Option<Analysis> {
    try_classify(frame, side).ok()
}

/// Like [`classify`], but reports why a frame could not be sampled.
pub fn try_classify(frame: &Frame, side: u32) -> Result<Analysis, ScanError> {
    let out_of_bounds = || ScanError::RegionOutOfBounds {
        width: frame.width,
        height: frame.height,
    };
    let region = SampleRegion::centered(frame.width, frame.height, side).ok_or_else(out_of_bounds)?;
    let reading = ColorReading::average(frame, &region).ok_or_else(out_of_bounds)?;
    Ok(Analysis {
        region,
        reading,
        diagnosis: rules::diagnose(&reading),
    })
}
