//! Live color-classification sampler.
//!
//! A `Sampler` owns at most one scan session. A session holds the acquired
//! capture device and the scheduled tick; each tick grabs the current frame,
//! classifies its center region and hands the result to the render sink.
//!
//! State machine:
//! - `Idle --start()--> Scanning`
//! - `Scanning --start()--> Scanning` (previous session stopped first)
//! - `Scanning --stop()--> Idle`
//! - `Idle --stop()--> Idle` (no-op)
//!
//! `stop` may be called from any thread. Once it returns the device has been
//! released and no further tick fires.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::analyze::{Classifier, ThresholdClassifier};
use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::ingest::{CaptureProvider, FrameSource};
use crate::schedule::{ScheduledTask, Scheduler, Tick};
use crate::sink::RenderSink;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
}

/// Per-session tick counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub session_id: u64,
    pub ticks: u64,
    pub diagnoses: u64,
    /// Ticks with no frame yet or nothing to sample.
    pub skipped: u64,
    /// Ticks that failed transiently or panicked.
    pub errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    diagnoses: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self, session_id: u64) -> SessionStats {
        SessionStats {
            session_id,
            ticks: self.ticks.load(Ordering::SeqCst),
            diagnoses: self.diagnoses.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            errors: self.errors.load(Ordering::SeqCst),
        }
    }
}

type SharedDevice = Arc<Mutex<Box<dyn FrameSource>>>;

struct ActiveSession {
    id: u64,
    device: SharedDevice,
    task: Box<dyn ScheduledTask>,
    counters: Arc<Counters>,
}

impl ActiveSession {
    /// Cancel the loop, then release the device.
    fn shutdown(mut self) -> SessionStats {
        self.task.cancel();
        {
            let mut device = lock_ignoring_poison(&self.device);
            log::info!("scan session {} releasing {}", self.id, device.describe());
            device.release();
        }
        self.counters.snapshot(self.id)
    }
}

/// Owns the scan session lifecycle.
pub struct Sampler {
    provider: Box<dyn CaptureProvider>,
    scheduler: Box<dyn Scheduler>,
    sink: Arc<dyn RenderSink>,
    config: ScannerConfig,
    lifecycle: Mutex<()>,
    session: Mutex<Option<ActiveSession>>,
    last_stats: Mutex<SessionStats>,
    next_session_id: AtomicU64,
}

impl Sampler {
    pub fn new(
        provider: Box<dyn CaptureProvider>,
        scheduler: Box<dyn Scheduler>,
        sink: Arc<dyn RenderSink>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            provider,
            scheduler,
            sink,
            config,
            lifecycle: Mutex::new(()),
            session: Mutex::new(None),
            last_stats: Mutex::new(SessionStats::default()),
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Acquire the device and begin the periodic sampling loop.
    ///
    /// Stops any running session first. On `DeviceUnavailable` the failure is
    /// reported to the sink once and the sampler stays idle.
    pub fn start(&self) -> Result<(), ScanError> {
        self.start_with(Box::new(ThresholdClassifier::new(self.config.region_side)))
    }

    /// Like [`Sampler::start`] with a custom classifier.
    pub fn start_with(&self, classifier: Box<dyn Classifier>) -> Result<(), ScanError> {
        let _lifecycle = lock_ignoring_poison(&self.lifecycle);
        self.stop();

        let constraints = self.config.constraints();
        let device = match self.provider.acquire(&constraints) {
            Ok(device) => device,
            Err(err) => {
                log::warn!("scan start failed: {}", err);
                self.sink.report_error(err.user_message());
                return Err(err);
            }
        };
        let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "scan session {} started on {} (classifier={}, region={}px, period={}ms)",
            id,
            device.describe(),
            classifier.name(),
            self.config.region_side,
            self.config.period.as_millis()
        );

        let device: SharedDevice = Arc::new(Mutex::new(device));
        let counters = Arc::new(Counters::default());
        let tick = make_tick(device.clone(), classifier, self.sink.clone(), counters.clone());

        let task = match self.scheduler.schedule(self.config.period, tick) {
            Ok(task) => task,
            Err(err) => {
                lock_ignoring_poison(&device).release();
                let err = ScanError::Scheduler(format!("{:#}", err));
                log::error!("scan session {} could not schedule ticks: {}", id, err);
                self.sink.report_error(err.user_message());
                return Err(err);
            }
        };

        *lock_ignoring_poison(&self.last_stats) = counters.snapshot(id);
        *lock_ignoring_poison(&self.session) = Some(ActiveSession {
            id,
            device,
            task,
            counters,
        });
        Ok(())
    }

    /// Cancel the loop and release the device. No-op when idle.
    pub fn stop(&self) {
        let session = lock_ignoring_poison(&self.session).take();
        if let Some(session) = session {
            let stats = session.shutdown();
            log::info!(
                "scan session {} stopped: ticks={} diagnoses={} skipped={} errors={}",
                stats.session_id,
                stats.ticks,
                stats.diagnoses,
                stats.skipped,
                stats.errors
            );
            *lock_ignoring_poison(&self.last_stats) = stats;
        }
    }

    pub fn state(&self) -> ScanState {
        if lock_ignoring_poison(&self.session).is_some() {
            ScanState::Scanning
        } else {
            ScanState::Idle
        }
    }

    /// Counters of the running session, or of the last one if idle.
    pub fn stats(&self) -> SessionStats {
        if let Some(session) = lock_ignoring_poison(&self.session).as_ref() {
            return session.counters.snapshot(session.id);
        }
        *lock_ignoring_poison(&self.last_stats)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn make_tick(
    device: SharedDevice,
    mut classifier: Box<dyn Classifier>,
    sink: Arc<dyn RenderSink>,
    counters: Arc<Counters>,
) -> Tick {
    Box::new(move || {
        counters.ticks.fetch_add(1, Ordering::SeqCst);
        // A panicking source, classifier or sink costs one tick, not the loop.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            run_tick(&device, classifier.as_mut(), sink.as_ref(), &counters)
        }));
        if let Err(payload) = outcome {
            log::warn!("tick panicked: {}", panic_message(payload.as_ref()));
            counters.errors.fetch_add(1, Ordering::SeqCst);
        }
    })
}

fn run_tick(
    device: &SharedDevice,
    classifier: &mut dyn Classifier,
    sink: &dyn RenderSink,
    counters: &Counters,
) {
    // Device lock is held only for the grab.
    let grabbed = lock_ignoring_poison(device).next_frame();
    let frame = match grabbed {
        Ok(Some(frame)) => frame,
        Ok(None) => {
            counters.skipped.fetch_add(1, Ordering::SeqCst);
            return;
        }
        Err(err) => {
            log::debug!("tick skipped: {:#}", err);
            counters.errors.fetch_add(1, Ordering::SeqCst);
            return;
        }
    };
    match classifier.analyze(&frame) {
        Some(analysis) => {
            counters.diagnoses.fetch_add(1, Ordering::SeqCst);
            sink.render(&analysis);
        }
        None => {
            log::debug!(
                "tick skipped: nothing to sample in {}x{} frame",
                frame.width,
                frame.height
            );
            counters.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
