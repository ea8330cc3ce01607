//! Start/stop lifecycle of the sampler against synthetic devices.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use tongue_scanner::{
    CaptureConstraints, CaptureProvider, ChannelSink, Diagnosis, Frame, FrameSource,
    ManualScheduler, RenderSink, Sampler, ScanError, ScanState, ScannerConfig, SinkEvent,
    SyntheticConfig, SyntheticProvider, ThreadScheduler,
};

fn fast_config() -> ScannerConfig {
    ScannerConfig {
        width: 320,
        height: 240,
        period: Duration::from_millis(5),
        ..ScannerConfig::default()
    }
}

fn channel_sink() -> (Arc<dyn RenderSink>, mpsc::Receiver<SinkEvent>) {
    let (tx, rx) = mpsc::channel();
    (Arc::new(ChannelSink::new(tx)), rx)
}

#[test]
fn start_then_stop_releases_device_and_goes_idle() {
    let provider = SyntheticProvider::solid(320, 240, [150, 100, 100]);
    let (sink, _rx) = channel_sink();
    let sampler = Sampler::new(
        Box::new(provider.clone()),
        Box::new(ThreadScheduler::new()),
        sink,
        fast_config(),
    );

    sampler.start().expect("start");
    sampler.stop();

    assert_eq!(sampler.state(), ScanState::Idle);
    let stats = provider.stats();
    assert_eq!(stats.acquisitions, 1);
    assert_eq!(stats.releases, 1);
}

#[test]
fn no_renders_after_stop_returns() {
    let provider = SyntheticProvider::solid(320, 240, [200, 50, 50]);
    let (sink, rx) = channel_sink();
    let sampler = Sampler::new(
        Box::new(provider.clone()),
        Box::new(ThreadScheduler::new()),
        sink,
        fast_config(),
    );

    sampler.start().expect("start");
    let first = rx.recv_timeout(Duration::from_secs(5)).expect("first render");
    match first {
        SinkEvent::Rendered(analysis) => assert_eq!(analysis.diagnosis, Diagnosis::HighPitta),
        other => panic!("unexpected event {:?}", other),
    }

    sampler.stop();
    // Drain whatever was rendered before stop returned.
    while rx.try_recv().is_ok() {}
    let frames_at_stop = provider.stats().frames_captured;

    std::thread::sleep(Duration::from_millis(50));
    assert!(rx.try_recv().is_err());
    assert_eq!(provider.stats().frames_captured, frames_at_stop);
    assert_eq!(provider.stats().releases, 1);
}

#[test]
fn stop_when_idle_is_a_noop() {
    let provider = SyntheticProvider::solid(8, 8, [0, 0, 0]);
    let (sink, _rx) = channel_sink();
    let sampler = Sampler::new(
        Box::new(provider.clone()),
        Box::new(ManualScheduler::new()),
        sink,
        ScannerConfig::default(),
    );

    sampler.stop();
    sampler.stop();
    assert_eq!(sampler.state(), ScanState::Idle);
    assert_eq!(provider.stats().releases, 0);
}

#[test]
fn device_unavailable_is_reported_once_without_retry() {
    let provider = SyntheticProvider::unavailable();
    let scheduler = ManualScheduler::new();
    let (sink, rx) = channel_sink();
    let sampler = Sampler::new(
        Box::new(provider.clone()),
        Box::new(scheduler.clone()),
        sink,
        ScannerConfig::default(),
    );

    let err = sampler.start().expect_err("start must fail");
    assert!(matches!(err, ScanError::DeviceUnavailable(_)));
    assert_eq!(sampler.state(), ScanState::Idle);
    assert_eq!(scheduler.live_tasks(), 0);

    match rx.try_recv().expect("error reported") {
        SinkEvent::Error(message) => assert!(message.contains("webcam")),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(rx.try_recv().is_err());

    // The user re-invokes start once permission is granted.
    provider.set_available(true);
    sampler.start().expect("second start");
    assert_eq!(sampler.state(), ScanState::Scanning);
}

#[test]
fn ticks_without_frames_are_skipped_and_loop_continues() {
    let provider = SyntheticProvider::new(SyntheticConfig {
        width: 64,
        height: 64,
        palette: vec![[220, 220, 220]],
        warmup_frames: 2,
        ..SyntheticConfig::default()
    });
    let scheduler = ManualScheduler::new();
    let (sink, rx) = channel_sink();
    let sampler = Sampler::new(
        Box::new(provider),
        Box::new(scheduler.clone()),
        sink,
        ScannerConfig::default(),
    );

    sampler.start().expect("start");
    scheduler.fire();
    scheduler.fire();
    assert!(rx.try_recv().is_err());
    scheduler.fire();

    match rx.try_recv().expect("render after warm-up") {
        SinkEvent::Rendered(analysis) => assert_eq!(analysis.diagnosis, Diagnosis::KaphaAma),
        other => panic!("unexpected event {:?}", other),
    }
    let stats = sampler.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.diagnoses, 1);
}

#[test]
fn each_tick_overwrites_with_current_color() {
    let provider = SyntheticProvider::new(SyntheticConfig {
        width: 250,
        height: 250,
        frames_per_color: 1,
        ..SyntheticConfig::default()
    });
    let scheduler = ManualScheduler::new();
    let (sink, rx) = channel_sink();
    let sampler = Sampler::new(
        Box::new(provider),
        Box::new(scheduler.clone()),
        sink,
        ScannerConfig::default(),
    );

    sampler.start().expect("start");
    let mut seen = Vec::new();
    for _ in 0..4 {
        scheduler.fire();
        if let Ok(SinkEvent::Rendered(analysis)) = rx.try_recv() {
            seen.push(analysis.diagnosis);
        }
    }
    assert_eq!(
        seen,
        vec![
            Diagnosis::HighPitta,
            Diagnosis::KaphaAma,
            Diagnosis::Healthy,
            Diagnosis::Indeterminate
        ]
    );
}

/// Sink that stops its own sampler from inside a tick.
struct StopOnFirstRender {
    sampler: std::sync::OnceLock<std::sync::Weak<Sampler>>,
    tx: std::sync::Mutex<mpsc::Sender<()>>,
}

impl RenderSink for StopOnFirstRender {
    fn render(&self, _analysis: &tongue_scanner::Analysis) {
        if let Some(sampler) = self.sampler.get().and_then(|weak| weak.upgrade()) {
            sampler.stop();
        }
        let _ = self.tx.lock().unwrap().send(());
    }
}

#[test]
fn stop_from_inside_a_tick_ends_the_session() {
    let provider = SyntheticProvider::solid(32, 32, [150, 100, 100]);
    let (tx, rx) = mpsc::channel();
    let sink = Arc::new(StopOnFirstRender {
        sampler: std::sync::OnceLock::new(),
        tx: std::sync::Mutex::new(tx),
    });
    let sampler = Arc::new(Sampler::new(
        Box::new(provider.clone()),
        Box::new(ThreadScheduler::new()),
        sink.clone(),
        fast_config(),
    ));
    let _ = sink.sampler.set(Arc::downgrade(&sampler));

    sampler.start().expect("start");
    rx.recv_timeout(Duration::from_secs(5)).expect("first render");

    let deadline = Instant::now() + Duration::from_secs(5);
    while sampler.state() != ScanState::Idle && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(sampler.state(), ScanState::Idle);
    assert_eq!(provider.stats().releases, 1);

    std::thread::sleep(Duration::from_millis(30));
    assert!(rx.try_recv().is_err());
}

#[test]
fn stop_from_another_thread() {
    let provider = SyntheticProvider::solid(64, 64, [150, 100, 100]);
    let (sink, rx) = channel_sink();
    let sampler = Arc::new(Sampler::new(
        Box::new(provider.clone()),
        Box::new(ThreadScheduler::new()),
        sink,
        fast_config(),
    ));

    sampler.start().expect("start");
    rx.recv_timeout(Duration::from_secs(5)).expect("render");

    let remote = sampler.clone();
    std::thread::spawn(move || remote.stop())
        .join()
        .expect("stop thread");

    assert_eq!(sampler.state(), ScanState::Idle);
    assert_eq!(provider.stats().releases, 1);
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Color([u8; 3]),
    Fail,
    Panic,
}

/// Device that plays a fixed script of frames, errors and panics, then keeps
/// returning healthy frames.
struct ScriptedProvider {
    script: Vec<Step>,
}

struct ScriptedSource {
    script: Vec<Step>,
    calls: usize,
}

impl CaptureProvider for ScriptedProvider {
    fn acquire(&self, _constraints: &CaptureConstraints) -> Result<Box<dyn FrameSource>, ScanError> {
        Ok(Box::new(ScriptedSource {
            script: self.script.clone(),
            calls: 0,
        }))
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let step = self
            .script
            .get(self.calls)
            .copied()
            .unwrap_or(Step::Color([150, 100, 100]));
        self.calls += 1;
        match step {
            Step::Color(rgb) => Ok(Some(Frame::filled(16, 16, rgb))),
            Step::Fail => Err(anyhow!("transient grab failure")),
            Step::Panic => panic!("driver blew up"),
        }
    }

    fn release(&mut self) {}

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

fn scripted_sampler(
    script: Vec<Step>,
    scheduler: Box<dyn tongue_scanner::Scheduler>,
    config: ScannerConfig,
) -> (Sampler, mpsc::Receiver<SinkEvent>) {
    let (sink, rx) = channel_sink();
    let sampler = Sampler::new(Box::new(ScriptedProvider { script }), scheduler, sink, config);
    (sampler, rx)
}

#[test]
fn transient_grab_errors_are_counted_and_loop_continues() {
    let scheduler = ManualScheduler::new();
    let (sampler, rx) = scripted_sampler(
        vec![
            Step::Color([200, 50, 50]),
            Step::Fail,
            Step::Fail,
            Step::Color([220, 220, 220]),
        ],
        Box::new(scheduler.clone()),
        ScannerConfig::default(),
    );

    sampler.start().expect("start");
    for _ in 0..4 {
        scheduler.fire();
    }

    let rendered: Vec<Diagnosis> = rx
        .try_iter()
        .filter_map(|event| match event {
            SinkEvent::Rendered(analysis) => Some(analysis.diagnosis),
            SinkEvent::Error(_) => None,
        })
        .collect();
    assert_eq!(rendered, vec![Diagnosis::HighPitta, Diagnosis::KaphaAma]);

    let stats = sampler.stats();
    assert_eq!(stats.ticks, 4);
    assert_eq!(stats.errors, 2);
    assert_eq!(stats.diagnoses, 2);
    assert_eq!(stats.skipped, 0);
    assert_eq!(sampler.state(), ScanState::Scanning);
}

#[test]
fn panicking_tick_is_counted_and_loop_continues() {
    let scheduler = ManualScheduler::new();
    let (sampler, rx) = scripted_sampler(
        vec![Step::Color([200, 50, 50]), Step::Panic, Step::Color([150, 100, 100])],
        Box::new(scheduler.clone()),
        ScannerConfig::default(),
    );

    sampler.start().expect("start");
    for _ in 0..3 {
        assert_eq!(scheduler.fire(), 1);
    }

    let stats = sampler.stats();
    assert_eq!(stats.ticks, 3);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.diagnoses, 2);
    assert_eq!(rx.try_iter().count(), 2);

    // The device lock survives the panic; stop still releases cleanly.
    sampler.stop();
    assert_eq!(sampler.state(), ScanState::Idle);
}

#[test]
fn worker_thread_survives_a_panicking_tick() {
    let (sampler, rx) = scripted_sampler(
        vec![Step::Color([200, 50, 50]), Step::Panic],
        Box::new(ThreadScheduler::new()),
        fast_config(),
    );

    sampler.start().expect("start");
    // One render before the panic, then renders must keep coming after it.
    for _ in 0..3 {
        rx.recv_timeout(Duration::from_secs(5))
            .expect("render after panicking tick");
    }
    sampler.stop();

    let stats = sampler.stats();
    assert_eq!(stats.errors, 1);
    assert!(stats.diagnoses >= 3);
}
