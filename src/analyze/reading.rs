use serde::Serialize;

use super::region::SampleRegion;
use crate::frame::{Frame, RGB_CHANNELS};

/// Mean channel intensities over a sample region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ColorReading {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ColorReading {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Average every pixel of `region` in `frame`.
    ///
    /// Each channel sum is divided by the pixel count with floor division.
    /// Returns `None` if the region is empty or does not fit inside the frame.
    pub fn average(frame: &Frame, region: &SampleRegion) -> Option<Self> {
        let count = region.pixel_count();
        if count == 0
            || region.x.checked_add(region.width)? > frame.width
            || region.y.checked_add(region.height)? > frame.height
        {
            return None;
        }

        let mut sums = [0u64; RGB_CHANNELS];
        for y in region.y..region.y + region.height {
            for px in frame.row_span(y, region.x, region.width).chunks_exact(RGB_CHANNELS) {
                sums[0] += px[0] as u64;
                sums[1] += px[1] as u64;
                sums[2] += px[2] as u64;
            }
        }

        // Mean of u8 samples is itself <= 255.
        Some(Self {
            red: (sums[0] / count) as u8,
            green: (sums[1] / count) as u8,
            blue: (sums[2] / count) as u8,
        })
    }
}

impl std::fmt::Display for ColorReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R:{} G:{} B:{}", self.red, self.green, self.blue)
    }
}
