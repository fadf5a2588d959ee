//! Periodic channel switch timer
//!
//! Runs a callback on its own thread once per period, the first time one
//! full period after [`SwitchScheduler::start`]. Stopping sends a signal and
//! joins the thread, so no callback is in flight once `stop` returns.

use crate::config::TimerMode;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timer callback
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

enum Signal {
    Stop,
    Advance(Duration, Sender<()>),
}

struct Worker {
    control: Sender<Signal>,
    handle: JoinHandle<()>,
}

/// Drives a [`TimerMode::Manual`] scheduler.
///
/// Cloneable; stops working once the scheduler it came from is stopped.
#[derive(Clone)]
pub struct ManualClock {
    control: Sender<Signal>,
}

impl ManualClock {
    /// Move time forward by `by`, firing every tick that falls due.
    ///
    /// Blocks until those ticks have run. Returns false if the scheduler is
    /// no longer running.
    pub fn advance(&self, by: Duration) -> bool {
        let (ack, done) = mpsc::channel();
        if self.control.send(Signal::Advance(by, ack)).is_err() {
            return false;
        }
        done.recv().is_ok()
    }
}

/// Fires a callback every `period` on a dedicated thread
pub struct SwitchScheduler {
    period: Duration,
    mode: TimerMode,
    on_tick: TickFn,
    worker: Option<Worker>,
}

impl SwitchScheduler {
    /// Create a stopped scheduler
    pub fn new(period: Duration, mode: TimerMode, on_tick: TickFn) -> Self {
        Self {
            period,
            mode,
            on_tick,
            worker: None,
        }
    }

    /// Start firing. Does nothing if already running.
    pub fn start(&mut self) -> std::io::Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (control, signals) = mpsc::channel();
        let period = self.period;
        let mode = self.mode;
        let on_tick = Arc::clone(&self.on_tick);

        let handle = thread::Builder::new()
            .name("channel-switch".into())
            .spawn(move || match mode {
                TimerMode::Realtime => run_realtime(period, &signals, &on_tick),
                TimerMode::Manual => run_manual(period, &signals, &on_tick),
            })?;

        self.worker = Some(Worker { control, handle });
        Ok(())
    }

    /// Stop firing and wait for the timer thread to exit. Idempotent.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.control.send(Signal::Stop);
            if worker.handle.join().is_err() {
                tracing::error!("Channel switch thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Clock handle for a running manual-mode scheduler
    pub fn manual_clock(&self) -> Option<ManualClock> {
        match (&self.worker, self.mode) {
            (Some(worker), TimerMode::Manual) => Some(ManualClock {
                control: worker.control.clone(),
            }),
            _ => None,
        }
    }
}

impl Drop for SwitchScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_realtime(period: Duration, signals: &Receiver<Signal>, on_tick: &TickFn) {
    // None: the next tick lies beyond what Instant can represent
    let mut deadline = Instant::now().checked_add(period);
    loop {
        let signal = match deadline {
            Some(at) => signals.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => signals.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match signal {
            Err(RecvTimeoutError::Timeout) => {
                on_tick();
                let now = Instant::now();
                deadline = match deadline.and_then(|at| at.checked_add(period)) {
                    // Skip missed ticks after a stall instead of bursting
                    Some(next) if next < now => now.checked_add(period),
                    next => next,
                };
            }
            Ok(Signal::Advance(_, ack)) => {
                let _ = ack.send(());
            }
            Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn run_manual(period: Duration, signals: &Receiver<Signal>, on_tick: &TickFn) {
    let mut elapsed = Duration::ZERO;
    while let Ok(signal) = signals.recv() {
        match signal {
            Signal::Advance(by, ack) => {
                elapsed += by;
                while elapsed >= period {
                    elapsed -= period;
                    on_tick();
                }
                let _ = ack.send(());
            }
            Signal::Stop => break,
        }
    }
}
