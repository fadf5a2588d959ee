//! Channel switch notifications

use crate::channel::StereoChannel;
use chrono::{DateTime, Local};
use std::sync::Arc;

/// Emitted by the switch timer every time the audible channel flips
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchEvent {
    pub at: DateTime<Local>,
    pub channel: StereoChannel,
}

impl SwitchEvent {
    pub fn now(channel: StereoChannel) -> Self {
        Self {
            at: Local::now(),
            channel,
        }
    }
}

/// Callback receiving [`SwitchEvent`]s on the timer thread.
///
/// Must return quickly; it runs between two timer ticks.
pub type SwitchListener = Arc<dyn Fn(&SwitchEvent) + Send + Sync>;

/// Create a [`SwitchListener`] from a closure
pub fn switch_listener<F>(f: F) -> SwitchListener
where
    F: Fn(&SwitchEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Listener used when none is supplied: one `info` line per flip
pub fn log_switch() -> SwitchListener {
    switch_listener(|event| {
        tracing::info!(
            at = %event.at.format("%H:%M:%S"),
            channel = %event.channel,
            "switched active channel"
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_listener_receives_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = switch_listener(move |e| sink.lock().unwrap().push(e.channel));

        listener(&SwitchEvent::now(StereoChannel::Right));
        log_switch()(&SwitchEvent::now(StereoChannel::Left));

        assert_eq!(*seen.lock().unwrap(), vec![StereoChannel::Right]);
    }
}
