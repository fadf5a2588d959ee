//! Router configuration

use crate::error::RouterError;
use std::time::Duration;

/// Smallest switch interval accepted from the command line
pub const MIN_INTERVAL_SECS: u64 = 1;

/// Largest switch interval accepted from the command line (one hour)
pub const MAX_INTERVAL_SECS: u64 = 3600;

/// Default render latency. Small enough that a channel flip is heard
/// promptly, large enough to ride out scheduling jitter.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(200);

const MIN_LATENCY: Duration = Duration::from_millis(20);
const MAX_LATENCY: Duration = Duration::from_secs(2);

/// How the channel switch timer measures time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerMode {
    /// Ticks follow the wall clock
    #[default]
    Realtime,
    /// Ticks only happen when a [`ManualClock`](crate::ManualClock) is advanced
    Manual,
}

/// Settings fixed at [`Router`](crate::Router) construction
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Period between channel flips
    pub switch_interval: Duration,

    /// Amount of audio buffered between capture and render
    pub latency: Duration,

    /// Clock driving the switch timer
    pub timer: TimerMode,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            switch_interval: Duration::from_secs(10),
            latency: DEFAULT_LATENCY,
            timer: TimerMode::Realtime,
        }
    }
}

impl RouterConfig {
    /// Create a configuration flipping channels every `interval_secs` seconds
    pub fn from_secs(interval_secs: u64) -> Self {
        Self {
            switch_interval: Duration::from_secs(interval_secs),
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_timer(mut self, timer: TimerMode) -> Self {
        self.timer = timer;
        self
    }

    /// Check the values the router relies on
    pub fn validate(&self) -> Result<(), RouterError> {
        if self.switch_interval.is_zero() {
            return Err(RouterError::InvalidInterval(self.switch_interval));
        }
        if !(MIN_LATENCY..=MAX_LATENCY).contains(&self.latency) {
            return Err(RouterError::InvalidLatency(self.latency));
        }
        Ok(())
    }

    /// Ring buffer capacity, in samples, holding `latency` worth of audio
    pub fn buffer_samples(&self, sample_rate: u32, channels: u16) -> usize {
        let frames = (self.latency.as_secs_f64() * sample_rate as f64).ceil() as usize;
        frames.max(1) * channels.max(1) as usize
    }
}
