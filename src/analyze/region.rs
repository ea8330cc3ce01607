use serde::Serialize;

/// Default side of the sampling square, in pixels.
pub const DEFAULT_REGION_SIDE: u32 = 200;

/// Square window at the frame center used for color averaging.
///
/// When the frame is narrower or shorter than the nominal side, the region is
/// clamped to the frame in that dimension, so it may come out rectangular.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SampleRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SampleRegion {
    /// Region of nominal side `side` centered in a `frame_width` x `frame_height` frame.
    ///
    /// Returns `None` only when nothing can be sampled: a zero-area frame or a
    /// zero side.
    pub fn centered(frame_width: u32, frame_height: u32, side: u32) -> Option<Self> {
        let width = side.min(frame_width);
        let height = side.min(frame_height);
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x: (frame_width - width) / 2,
            y: (frame_height - height) / 2,
            width,
            height,
        })
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True when the frame was smaller than `side` in some dimension.
    pub fn is_clamped(&self, side: u32) -> bool {
        self.width < side || self.height < side
    }
}
