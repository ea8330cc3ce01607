//! Live tongue-color scanner.
//!
//! This crate samples a live video feed on a fixed period, averages the color
//! of a square region at the center of each frame and maps the reading to a
//! coarse Ayurvedic diagnosis.
//!
//! # Architecture
//!
//! The scanner is split along the seams a host application needs to replace:
//!
//! 1. **Capture**: a `CaptureProvider` hands out an exclusively owned
//!    `FrameSource` (webcam, still photo, or synthetic `stub://` device).
//! 2. **Scheduling**: a `Scheduler` drives the tick; ticks never overlap.
//! 3. **Classification**: a pure pipeline (region -> mean RGB -> ordered
//!    threshold rules) that never touches the device.
//! 4. **Rendering**: a `RenderSink` displays each reading and diagnosis.
//!
//! The `Sampler` ties them together with explicit `start`/`stop`.
//!
//! # Module Structure
//!
//! - `frame`: immutable RGB frames, wiped on drop
//! - `ingest`: capture providers and pixel-format normalization
//! - `analyze`: sample region, color reading, diagnosis rules
//! - `schedule`: periodic tick scheduling
//! - `sink`: rendering sinks
//! - `sampler`: scan session lifecycle
//! - `config`: file + environment configuration

pub mod analyze;
pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod sampler;
pub mod schedule;
pub mod sink;

pub use analyze::{
    classify, try_classify, Analysis, Classifier, ColorReading, Diagnosis, SampleRegion,
    ThresholdClassifier, DEFAULT_REGION_SIDE,
};
pub use config::ScannerConfig;
pub use error::ScanError;
pub use frame::Frame;
pub use ingest::normalize::PixelFormat;
pub use ingest::{provider_for, CaptureConstraints, CaptureProvider, FrameSource};
pub use ingest::{SyntheticConfig, SyntheticProvider};
#[cfg(feature = "ingest-image")]
pub use ingest::StillImageProvider;
#[cfg(feature = "ingest-v4l2")]
pub use ingest::V4l2Provider;
pub use sampler::{Sampler, ScanState, SessionStats};
pub use schedule::{ManualScheduler, ScheduledTask, Scheduler, ThreadScheduler};
pub use sink::{ChannelSink, JsonLinesSink, LogSink, RenderSink, SinkEvent};
