//! Rendering sinks.
//!
//! A sink receives every tick's analysis and is responsible for display. The
//! sampler knows nothing about layout; it only calls `render` and, once per
//! failed start, `report_error`.

use serde::Serialize;
use std::io::Write;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use crate::analyze::Analysis;

pub trait RenderSink: Send + Sync {
    /// Display one tick's reading and diagnosis. Overwrites the previous one.
    fn render(&self, analysis: &Analysis);

    /// Surface a user-facing error (e.g. camera permission denied).
    fn report_error(&self, message: &str) {
        log::error!("{}", message);
    }
}

/// Logs one line per tick at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl RenderSink for LogSink {
    fn render(&self, analysis: &Analysis) {
        log::info!(
            "{} diagnosis={} ({})",
            analysis.reading,
            analysis.diagnosis.label(),
            analysis.diagnosis.message()
        );
    }
}

#[derive(Serialize)]
struct RenderedLine<'a> {
    r: u8,
    g: u8,
    b: u8,
    label: &'a str,
    category: &'a str,
    message: &'a str,
}

/// Writes one JSON object per tick to `W`.
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> RenderSink for JsonLinesSink<W> {
    fn render(&self, analysis: &Analysis) {
        let line = RenderedLine {
            r: analysis.reading.red,
            g: analysis.reading.green,
            b: analysis.reading.blue,
            label: analysis.diagnosis.label(),
            category: analysis.diagnosis.category(),
            message: analysis.diagnosis.message(),
        };
        let Ok(mut out) = self.out.lock() else {
            log::warn!("json sink lock poisoned; dropping reading");
            return;
        };
        let written = serde_json::to_writer(&mut *out, &line)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(out))
            .and_then(|_| out.flush());
        if let Err(err) = written {
            log::warn!("json sink write failed: {}", err);
        }
    }

    fn report_error(&self, message: &str) {
        log::error!("{}", message);
        let Ok(mut out) = self.out.lock() else {
            log::warn!("json sink lock poisoned; dropping error");
            return;
        };
        let line = serde_json::json!({ "error": message });
        let written = writeln!(out, "{}", line).and_then(|_| out.flush());
        if let Err(err) = written {
            log::warn!("json sink write failed: {}", err);
        }
    }
}

/// Forwards analyses (and errors) over a channel.
pub struct ChannelSink {
    tx: Mutex<Sender<SinkEvent>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Rendered(Analysis),
    Error(String),
}

impl ChannelSink {
    pub fn new(tx: Sender<SinkEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }

    fn send(&self, event: SinkEvent) {
        if let Ok(tx) = self.tx.lock() {
            // Receiver gone means nobody is watching anymore.
            let _ = tx.send(event);
        }
    }
}

impl RenderSink for ChannelSink {
    fn render(&self, analysis: &Analysis) {
        self.send(SinkEvent::Rendered(*analysis));
    }

    fn report_error(&self, message: &str) {
        self.send(SinkEvent::Error(message.to_string()));
    }
}
