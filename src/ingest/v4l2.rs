//! V4L2 webcam source.
//!
//! This module provides `V4l2Provider` for scanning from local V4L2 devices
//! (e.g., /dev/video0).
//!
//! The V4L2 source is responsible for:
//! - Opening the device node and negotiating a format
//! - Capturing frames in-memory
//! - Normalizing RGB3/YUYV buffers into RGB `Frame`s
//! - Closing the device when the session releases it
//!
//! The V4L2 source MUST NOT:
//! - Store captured frames to disk
//! - Retain frames beyond the tick that captured them

use std::borrow::Cow;

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use zeroize::Zeroize;

use super::normalize::{strip_row_padding, PixelFormat};
use super::{CaptureConstraints, CaptureProvider, FrameSource};
use crate::error::ScanError;
use crate::frame::Frame;

/// Provider for a V4L2 device node.
#[derive(Clone, Debug)]
pub struct V4l2Provider {
    device: String,
}

impl V4l2Provider {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl CaptureProvider for V4l2Provider {
    fn acquire(&self, constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, ScanError> {
        let mut source = V4l2Source {
            device: self.device.clone(),
            state: None,
            frame_count: 0,
            active_width: constraints.width,
            active_height: constraints.height,
            stride: 0,
            format: PixelFormat::Rgb24,
        };
        source
            .connect(constraints)
            .map_err(|err| ScanError::DeviceUnavailable(format!("{}: {:#}", self.device, err)))?;
        Ok(Box::new(source))
    }
}

// ----------------------------------------------------------------------------
// Acquired device
// ----------------------------------------------------------------------------

struct V4l2Source {
    device: String,
    state: Option<V4l2State>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    /// Bytes per row as reported by the driver; may include padding.
    stride: u32,
    format: PixelFormat,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    fn connect(&mut self, constraints: &CaptureConstraints) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.device)
            .with_context(|| format!("open v4l2 device {}", self.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = constraints.width;
        format.height = constraints.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set RGB3 on {}: {}",
                    self.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.format = pixel_format_for(&format.fourcc)?;

        if constraints.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(constraints.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", self.device, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.stride = format.stride;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?}, stride {})",
            self.device,
            self.active_width,
            self.active_height,
            self.format,
            self.stride
        );
        Ok(())
    }
}

impl FrameSource for V4l2Source {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device released")?;
        let (buf, meta) = state
            .with_mut(|fields| fields.stream.next())
            .context("capture v4l2 frame")?;
        if meta.bytesused == 0 {
            // Device is up but has not delivered a frame yet.
            return Ok(None);
        }
        let used = (meta.bytesused as usize).min(buf.len());

        self.frame_count += 1;
        let mut packed = strip_row_padding(
            &buf[..used],
            self.stride as usize,
            self.active_width,
            self.active_height,
            self.format,
        )?;
        let frame = Frame::from_pixels(
            &packed,
            self.active_width,
            self.active_height,
            self.format,
        );
        if let Cow::Owned(copy) = &mut packed {
            copy.zeroize();
        }
        Ok(Some(frame?))
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: released {} after {} frames",
                self.device,
                self.frame_count
            );
        }
    }

    fn describe(&self) -> String {
        format!(
            "{} ({}x{}, {:?})",
            self.device, self.active_width, self.active_height, self.format
        )
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        self.release();
    }
}

fn pixel_format_for(fourcc: &v4l::FourCC) -> Result<PixelFormat> {
    match &fourcc.repr {
        b"RGB3" => Ok(PixelFormat::Rgb24),
        b"BGR3" => Ok(PixelFormat::Bgr24),
        b"YUYV" => Ok(PixelFormat::Yuyv),
        b"NV12" => Ok(PixelFormat::Nv12),
        other => Err(anyhow!(
            "unsupported v4l2 pixel format {}",
            String::from_utf8_lossy(other)
        )),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
