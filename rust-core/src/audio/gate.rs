//! Stereo channel gate
//!
//! Passes one channel of an interleaved stereo stream through untouched and
//! forces the other one to silence. The audible channel can be changed from
//! any thread through a [`ChannelSwitch`] while the render thread keeps
//! pulling.

use super::source::{SampleSource, StreamFormat};
use crate::channel::StereoChannel;
use crate::error::AudioError;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to the gate's active channel.
///
/// Cloning is cheap; every clone controls the same gate.
#[derive(Clone, Debug)]
pub struct ChannelSwitch {
    active: Arc<Mutex<StereoChannel>>,
}

impl ChannelSwitch {
    fn new(initial: StereoChannel) -> Self {
        Self {
            active: Arc::new(Mutex::new(initial)),
        }
    }

    // The guarded value is a Copy enum, so a poisoned lock still holds a
    // whole value.
    fn lock(&self) -> MutexGuard<'_, StereoChannel> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `channel` the audible one
    pub fn switch_channel(&self, channel: StereoChannel) {
        *self.lock() = channel;
    }

    /// Flip to the other channel and return the new active channel
    pub fn toggle(&self) -> StereoChannel {
        let mut active = self.lock();
        *active = active.toggled();
        *active
    }

    /// Currently audible channel
    pub fn current(&self) -> StereoChannel {
        *self.lock()
    }
}

/// Silences every sample of the inactive channel
pub struct ChannelGate<S> {
    upstream: S,
    switch: ChannelSwitch,
}

impl<S: SampleSource> ChannelGate<S> {
    /// Wrap a stereo `upstream`, starting with `initial` audible
    pub fn new(upstream: S, initial: StereoChannel) -> Result<Self, AudioError> {
        let channels = upstream.format().channels;
        if channels != 2 {
            return Err(AudioError::UnsupportedChannels {
                expected: 2,
                found: channels,
            });
        }

        Ok(Self {
            upstream,
            switch: ChannelSwitch::new(initial),
        })
    }

    /// Handle for changing the active channel from another thread
    pub fn switch(&self) -> ChannelSwitch {
        self.switch.clone()
    }

    /// See [`ChannelSwitch::switch_channel`]
    pub fn switch_channel(&self, channel: StereoChannel) {
        self.switch.switch_channel(channel);
    }

    pub fn active_channel(&self) -> StereoChannel {
        self.switch.current()
    }
}

/// Zero the `muted` side of every complete frame in `samples`.
///
/// A trailing unpaired sample is left as is.
#[inline]
pub fn mute_channel(samples: &mut [f32], active: StereoChannel) {
    let muted = active.muted_offset();
    for frame in samples.chunks_exact_mut(2) {
        frame[muted] = 0.0;
    }
}

impl<S: SampleSource> SampleSource for ChannelGate<S> {
    fn format(&self) -> StreamFormat {
        self.upstream.format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        // Pull outside the lock so a slow upstream never holds up a switch
        let read = self.upstream.read(buffer).min(buffer.len());

        // One lock acquisition per buffer: the whole buffer sees one channel
        let active = self.switch.lock();
        mute_channel(&mut buffer[..read], *active);
        read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockSource;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn ramp(n: usize) -> Vec<f32> {
        (1..=n).map(|i| i as f32).collect()
    }

    #[test]
    fn test_ten_samples_left() {
        let mut gate = ChannelGate::new(MockSource::new(ramp(10)), StereoChannel::Left).unwrap();
        let mut buffer = [0.0; 10];

        assert_eq!(gate.read(&mut buffer), 10);
        assert_eq!(buffer, [1.0, 0.0, 3.0, 0.0, 5.0, 0.0, 7.0, 0.0, 9.0, 0.0]);
    }

    #[test]
    fn test_ten_samples_right() {
        let mut gate = ChannelGate::new(MockSource::new(ramp(10)), StereoChannel::Right).unwrap();
        let mut buffer = [0.0; 10];

        assert_eq!(gate.read(&mut buffer), 10);
        assert_eq!(buffer, [0.0, 2.0, 0.0, 4.0, 0.0, 6.0, 0.0, 8.0, 0.0, 10.0]);
    }

    #[test]
    fn test_odd_length_leaves_last_sample() {
        for channel in [StereoChannel::Left, StereoChannel::Right] {
            let mut gate = ChannelGate::new(MockSource::new(ramp(7)), channel).unwrap();
            let mut buffer = [0.0; 7];

            assert_eq!(gate.read(&mut buffer), 7);
            assert_eq!(buffer[6], 7.0);
        }
    }

    #[test]
    fn test_short_read_touches_only_read_samples() {
        let mut gate = ChannelGate::new(MockSource::new(ramp(4)), StereoChannel::Left).unwrap();
        let mut buffer = [-1.0; 8];

        assert_eq!(gate.read(&mut buffer), 4);
        assert_eq!(buffer, [1.0, 0.0, 3.0, 0.0, -1.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_kept_samples_are_bit_identical() {
        let input = vec![0.123_456_79, -0.5, f32::MIN_POSITIVE, 1.0e-30];
        let mut gate = ChannelGate::new(MockSource::new(input.clone()), StereoChannel::Left).unwrap();
        let mut buffer = [0.0; 4];
        gate.read(&mut buffer);

        assert_eq!(buffer[0].to_bits(), input[0].to_bits());
        assert_eq!(buffer[2].to_bits(), input[2].to_bits());
    }

    #[test]
    fn test_switch_round_trip() {
        let mut gate = ChannelGate::new(MockSource::looping(ramp(4)), StereoChannel::Left).unwrap();
        let mut before = [0.0; 4];
        gate.read(&mut before);

        gate.switch_channel(StereoChannel::Right);
        let mut during = [0.0; 4];
        gate.read(&mut during);
        assert_eq!(during, [0.0, 2.0, 0.0, 4.0]);

        gate.switch_channel(StereoChannel::Left);
        let mut after = [0.0; 4];
        gate.read(&mut after);
        assert_eq!(after, before);
    }

    #[test]
    fn test_switch_handle_toggle() {
        let gate = ChannelGate::new(MockSource::new(vec![]), StereoChannel::Left).unwrap();
        let switch = gate.switch();

        assert_eq!(switch.toggle(), StereoChannel::Right);
        assert_eq!(gate.active_channel(), StereoChannel::Right);
        assert_eq!(switch.toggle(), StereoChannel::Left);
    }

    #[test]
    fn test_rejects_mono_upstream() {
        let source = MockSource::new(vec![]).with_channels(1);
        assert!(matches!(
            ChannelGate::new(source, StereoChannel::Left),
            Err(AudioError::UnsupportedChannels { found: 1, .. })
        ));
    }

    #[test]
    fn test_concurrent_switch_never_tears_a_buffer() {
        let mut gate = ChannelGate::new(MockSource::looping(vec![1.0; 512]), StereoChannel::Left).unwrap();
        let switch = gate.switch();
        let done = Arc::new(AtomicBool::new(false));

        let flipper = {
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    switch.toggle();
                }
            })
        };

        let mut buffer = vec![0.0; 512];
        for _ in 0..2000 {
            let n = gate.read(&mut buffer);
            let left_silent = buffer[..n].iter().step_by(2).all(|&s| s == 0.0);
            let right_silent = buffer[..n].iter().skip(1).step_by(2).all(|&s| s == 0.0);
            // Exactly one side silent, over the whole buffer
            assert!(left_silent ^ right_silent);
        }

        done.store(true, Ordering::Relaxed);
        flipper.join().unwrap();
    }
}
