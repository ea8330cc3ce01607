//! Periodic tick scheduling.
//!
//! The sampler never owns a timer directly. It hands a tick closure to a
//! `Scheduler` and keeps the returned `ScheduledTask` to cancel it.
//!
//! Guarantees every implementation must uphold:
//! - Ticks of one task never overlap.
//! - After `cancel` returns, no tick of that task is running or will run.
//!   The one exception is `cancel` called from inside the task's own tick:
//!   the running tick completes and no further tick fires.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

pub type Tick = Box<dyn FnMut() + Send>;

pub trait Scheduler: Send + Sync {
    /// Run `tick` every `period` until the returned task is cancelled.
    fn schedule(&self, period: Duration, tick: Tick) -> Result<Box<dyn ScheduledTask>>;
}

pub trait ScheduledTask: Send {
    /// Stop the task. Idempotent.
    fn cancel(&mut self);
}

// ----------------------------------------------------------------------------
// ThreadScheduler: one worker thread per task
// ----------------------------------------------------------------------------

/// Runs each task on its own worker thread.
///
/// The worker waits on a stop channel with a timeout equal to the time left
/// until the next deadline, so cancellation wakes it immediately. A tick that
/// overruns its period makes the missed deadlines be skipped, not queued.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, period: Duration, mut tick: Tick) -> Result<Box<dyn ScheduledTask>> {
        if period.is_zero() {
            return Err(anyhow!("tick period must be greater than zero"));
        }
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join = std::thread::Builder::new()
            .name("scan-ticker".to_string())
            .spawn(move || {
                let mut next = Instant::now() + period;
                loop {
                    let wait = next.saturating_duration_since(Instant::now());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    tick();
                    next += period;
                    let now = Instant::now();
                    if next <= now {
                        let behind = now - next;
                        let skipped = behind.as_nanos() / period.as_nanos() + 1;
                        log::debug!("tick overran period; skipping {} deadline(s)", skipped);
                        next += period * skipped as u32;
                    }
                }
            })
            .map_err(|e| anyhow!("failed to spawn ticker thread: {}", e))?;
        let worker = join.thread().id();
        Ok(Box::new(ThreadTask {
            stop_tx: Some(stop_tx),
            join: Some(join),
            worker,
        }))
    }
}

struct ThreadTask {
    stop_tx: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
    worker: ThreadId,
}

impl ScheduledTask for ThreadTask {
    fn cancel(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let Some(join) = self.join.take() else {
            return;
        };
        if std::thread::current().id() == self.worker {
            // Cancelled from inside a tick; the loop exits once the tick returns.
            return;
        }
        if join.join().is_err() {
            log::error!("ticker thread panicked");
        }
    }
}

impl Drop for ThreadTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ----------------------------------------------------------------------------
// ManualScheduler: ticks fired by the caller
// ----------------------------------------------------------------------------

#[derive(Default)]
struct ManualSlot {
    period: Duration,
    cancelled: AtomicBool,
    tick: Mutex<Option<Tick>>,
    running_on: Mutex<Option<ThreadId>>,
}

impl ManualSlot {
    fn is_live(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler whose ticks only run when `fire` is called.
///
/// Deterministic stand-in for a timer in tests and single-threaded hosts.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    slots: Arc<Mutex<Vec<Arc<ManualSlot>>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one tick of every live task. Returns how many ticks ran.
    pub fn fire(&self) -> usize {
        let slots: Vec<Arc<ManualSlot>> = match self.slots.lock() {
            Ok(slots) => slots.iter().filter(|slot| slot.is_live()).cloned().collect(),
            Err(_) => return 0,
        };
        let mut fired = 0;
        for slot in slots {
            let Ok(mut tick) = slot.tick.lock() else {
                continue;
            };
            if !slot.is_live() {
                tick.take();
                continue;
            }
            let Some(run) = tick.as_mut() else {
                continue;
            };
            set_running(&slot, Some(std::thread::current().id()));
            run();
            set_running(&slot, None);
            fired += 1;
            if !slot.is_live() {
                tick.take();
            }
        }
        fired
    }

    /// Number of tasks that have not been cancelled.
    pub fn live_tasks(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.iter().filter(|slot| slot.is_live()).count())
            .unwrap_or(0)
    }

    /// Period requested by the most recently scheduled task.
    pub fn last_period(&self) -> Option<Duration> {
        self.slots
            .lock()
            .ok()
            .and_then(|slots| slots.last().map(|slot| slot.period))
    }
}

fn set_running(slot: &ManualSlot, thread: Option<ThreadId>) {
    if let Ok(mut running_on) = slot.running_on.lock() {
        *running_on = thread;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, period: Duration, tick: Tick) -> Result<Box<dyn ScheduledTask>> {
        if period.is_zero() {
            return Err(anyhow!("tick period must be greater than zero"));
        }
        let slot = Arc::new(ManualSlot {
            period,
            tick: Mutex::new(Some(tick)),
            ..ManualSlot::default()
        });
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| anyhow!("manual scheduler lock poisoned"))?;
        slots.retain(|existing| existing.is_live());
        slots.push(slot.clone());
        Ok(Box::new(ManualTask { slot }))
    }
}

struct ManualTask {
    slot: Arc<ManualSlot>,
}

impl ScheduledTask for ManualTask {
    fn cancel(&mut self) {
        self.slot.cancelled.store(true, Ordering::SeqCst);
        let in_own_tick = self
            .slot
            .running_on
            .lock()
            .map(|running_on| *running_on == Some(std::thread::current().id()))
            .unwrap_or(false);
        if in_own_tick {
            // `fire` drops the closure once the running tick returns.
            return;
        }
        // Waits for a tick running on another thread to finish.
        match self.slot.tick.lock() {
            Ok(mut tick) => {
                tick.take();
            }
            Err(poisoned) => {
                poisoned.into_inner().take();
            }
        }
    }
}

impl Drop for ManualTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
