use super::region::DEFAULT_REGION_SIDE;
use super::{classify, Analysis};
use crate::frame::Frame;

/// Classifier trait.
///
/// Implementations receive each tick's frame and return at most one analysis.
/// They MUST NOT retain the frame or its pixels beyond the call.
pub trait Classifier: Send {
    /// Classifier identifier.
    fn name(&self) -> &'static str;

    /// Analyze a frame. `None` means nothing could be sampled this tick.
    fn analyze(&mut self, frame: &Frame) -> Option<Analysis>;
}

/// Center-region average with the ordered threshold rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdClassifier {
    side: u32,
}

impl ThresholdClassifier {
    pub fn new(side: u32) -> Self {
        Self { side }
    }

    pub fn side(&self) -> u32 {
        self.side
    }
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_REGION_SIDE)
    }
}

impl Classifier for ThresholdClassifier {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn analyze(&mut self, frame: &Frame) -> Option<Analysis> {
        classify(frame, self.side)
    }
}
