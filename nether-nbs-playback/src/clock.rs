//! Tick sources: what decides when the scheduler advances
//!
//! The scheduler only starts and stops a source; whoever owns the source
//! turns its output into [`Scheduler::advance`](crate::Scheduler::advance)
//! calls. [`ManualTicks`] produces nothing on its own, so tests call
//! `advance` directly. [`ThreadClock`] sends [`ClockTick`] messages from a
//! timer thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::PlaybackError;

/// A start/stop capability the scheduler drives
pub trait TickSource {
    /// Begin producing ticks every `period`
    ///
    /// Calling this on an active source must leave it untouched.
    fn start(&mut self, period: Duration) -> Result<(), PlaybackError>;

    /// Stop producing ticks
    ///
    /// Synchronous: no tick produced after this returns belongs to the
    /// previous run.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

// =============================================================================
// ManualTicks
// =============================================================================

/// Source with no timer, for driving a scheduler by hand
///
/// Records how often it was started and stopped.
#[derive(Debug, Default)]
pub struct ManualTicks {
    active: bool,
    period: Option<Duration>,
    starts: usize,
    stops: usize,
}

impl ManualTicks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Period requested by the most recent start
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn stops(&self) -> usize {
        self.stops
    }
}

impl TickSource for ManualTicks {
    fn start(&mut self, period: Duration) -> Result<(), PlaybackError> {
        if !self.active {
            self.active = true;
            self.period = Some(period);
            self.starts += 1;
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.stops += 1;
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

// =============================================================================
// ThreadClock
// =============================================================================

/// Message sent by [`ThreadClock`] once per period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    /// Run this tick belongs to; compare with [`ThreadClock::generation`]
    pub generation: u64,
}

/// Real-time clock backed by a timer thread
///
/// Each `start` spawns a thread that sends [`ClockTick`]s tagged with the
/// current generation. `stop` bumps the generation and joins the thread, so
/// any tick still queued in the receiver is recognisably stale.
pub struct ThreadClock {
    tx: Sender<ClockTick>,
    generation: u64,
    worker: Option<ClockWorker>,
}

struct ClockWorker {
    /// Dropping this wakes the thread and ends it
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

impl ThreadClock {
    /// Create a stopped clock and the receiver its ticks arrive on
    pub fn new() -> (Self, Receiver<ClockTick>) {
        let (tx, rx) = mpsc::channel();
        let clock = Self {
            tx,
            generation: 0,
            worker: None,
        };
        (clock, rx)
    }

    /// Generation of the current (or next) run
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a received tick belongs to the current run
    pub fn is_current(&self, tick: ClockTick) -> bool {
        self.worker.is_some() && tick.generation == self.generation
    }
}

impl TickSource for ThreadClock {
    fn start(&mut self, period: Duration) -> Result<(), PlaybackError> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let tx = self.tx.clone();
        let generation = self.generation;

        let handle = thread::Builder::new()
            .name("nbs-clock".into())
            .spawn(move || run_clock(period, generation, &stop_rx, &tx))?;

        debug!(generation, ?period, "Playback clock started");
        self.worker = Some(ClockWorker { stop_tx, handle });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.generation += 1;

        // Drop the sender first so the thread's wait returns Disconnected
        drop(worker.stop_tx);
        if worker.handle.join().is_err() {
            warn!("Playback clock thread panicked");
        }
        debug!(generation = self.generation, "Playback clock stopped");
    }

    fn is_active(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Timer loop: deadlines advance by whole periods so ticks do not drift
fn run_clock(period: Duration, generation: u64, stop_rx: &Receiver<()>, tx: &Sender<ClockTick>) {
    let mut deadline = Instant::now() + period;
    loop {
        let wait = deadline.saturating_duration_since(Instant::now());
        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {
                if tx.send(ClockTick { generation }).is_err() {
                    trace!("Clock receiver dropped; exiting");
                    break;
                }
                deadline += period;
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
