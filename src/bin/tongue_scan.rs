//! tongue_scan - live tongue-color scanner for the terminal
//!
//! Opens the configured capture device, samples the center of every frame
//! each period and prints the reading and diagnosis until the deadline passes
//! or Ctrl-C is pressed.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tongue_scanner::{
    provider_for, Analysis, JsonLinesSink, RenderSink, Sampler, ScannerConfig, ThreadScheduler,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Plain,
    Json,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Capture device: stub://..., /dev/videoN, or an image file.
    /// Overrides TONGUE_SCANNER_DEVICE.
    #[arg(long)]
    device: Option<String>,
    /// Side of the center sampling square in pixels.
    #[arg(long)]
    region: Option<u32>,
    /// Milliseconds between samples.
    #[arg(long)]
    period_ms: Option<u64>,
    /// Stop after this many seconds (0 = run until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Output format for readings on stdout.
    #[arg(long, value_enum, default_value = "plain")]
    format: OutputFormat,
}

/// Prints one readout line per tick, like the scanner overlay.
struct PlainSink;

impl RenderSink for PlainSink {
    fn render(&self, analysis: &Analysis) {
        println!(
            "{}  Diagnosis: {} [{}]",
            analysis.reading,
            analysis.diagnosis.message(),
            analysis.diagnosis.category()
        );
    }

    fn report_error(&self, message: &str) {
        eprintln!("{}", message);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = ScannerConfig::load()?;
    if let Some(device) = args.device {
        cfg.device = device;
    }
    if let Some(region) = args.region {
        cfg.region_side = region;
    }
    if let Some(period_ms) = args.period_ms {
        cfg.period = Duration::from_millis(period_ms);
    }
    cfg.validate()?;

    let provider = provider_for(&cfg)?;
    let sink: Arc<dyn RenderSink> = match args.format {
        OutputFormat::Plain => Arc::new(PlainSink),
        OutputFormat::Json => Arc::new(JsonLinesSink::new(std::io::stdout())),
    };
    let sampler = Arc::new(Sampler::new(
        provider,
        Box::new(ThreadScheduler::new()),
        sink,
        cfg.clone(),
    ));

    let (done_tx, done_rx) = mpsc::channel::<()>();
    {
        let sampler = sampler.clone();
        ctrlc::set_handler(move || {
            sampler.stop();
            let _ = done_tx.send(());
        })
        .map_err(|e| anyhow!("failed to install Ctrl-C handler: {}", e))?;
    }

    sampler.start()?;
    log::info!(
        "scanning {} (region {}px every {}ms); place tongue in the center of the frame",
        cfg.device,
        cfg.region_side,
        cfg.period.as_millis()
    );

    if args.seconds == 0 {
        let _ = done_rx.recv();
    } else {
        let _ = done_rx.recv_timeout(Duration::from_secs(args.seconds));
    }
    sampler.stop();

    let stats = sampler.stats();
    log::info!(
        "scanner closed: ticks={} diagnoses={} skipped={} errors={}",
        stats.ticks,
        stats.diagnoses,
        stats.skipped,
        stats.errors
    );
    Ok(())
}
