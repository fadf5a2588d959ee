//! In-memory sources and devices for running the pipeline without hardware

use super::buffer::AudioProducer;
use super::device::{AudioDevice, StreamControl};
use super::source::{SampleSource, StreamFormat};
use crate::error::AudioError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Sample source replaying a fixed list of samples
pub struct MockSource {
    samples: Vec<f32>,
    position: usize,
    looping: bool,
    format: StreamFormat,
}

impl MockSource {
    /// Play `samples` once, then report nothing available
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
            looping: false,
            format: StreamFormat::stereo_f32(48000),
        }
    }

    /// Repeat `samples` forever
    pub fn looping(samples: Vec<f32>) -> Self {
        Self {
            looping: true,
            ..Self::new(samples)
        }
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.format.channels = channels;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.format.sample_rate = sample_rate;
        self
    }

    /// Samples not yet handed out (always zero for looping sources)
    pub fn remaining(&self) -> usize {
        if self.looping {
            0
        } else {
            self.samples.len() - self.position
        }
    }
}

impl SampleSource for MockSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        if self.samples.is_empty() {
            return 0;
        }

        let mut written = 0;
        while written < buffer.len() {
            if self.position == self.samples.len() {
                if !self.looping {
                    break;
                }
                self.position = 0;
            }
            let n = (buffer.len() - written).min(self.samples.len() - self.position);
            buffer[written..written + n]
                .copy_from_slice(&self.samples[self.position..self.position + n]);
            written += n;
            self.position += n;
        }
        written
    }
}

/// Shared record of stream operations, in call order.
///
/// Entries look like `"<device>:capture:play"`, `"<device>:render:pause"`,
/// `"<device>:render:release"`.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.0.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }
}

#[derive(Default)]
struct MockDeviceState {
    producer: Mutex<Option<AudioProducer>>,
    render: Mutex<Option<Box<dyn SampleSource>>>,
    capturing: AtomicBool,
    rendering: AtomicBool,
}

/// Device whose loopback input and render output live in memory.
///
/// Tests feed "what the device is playing" with [`push`](Self::push) and
/// play the render callback's part with [`pull`](Self::pull).
#[derive(Clone)]
pub struct MockDevice {
    name: String,
    format: StreamFormat,
    mix_format_available: bool,
    fail_open: bool,
    fail_play: bool,
    fail_pause: bool,
    journal: Journal,
    state: Arc<MockDeviceState>,
}

impl MockDevice {
    pub fn new(name: &str, format: StreamFormat) -> Self {
        Self {
            name: name.to_string(),
            format,
            mix_format_available: true,
            fail_open: false,
            fail_play: false,
            fail_pause: false,
            journal: Journal::new(),
            state: Arc::new(MockDeviceState::default()),
        }
    }

    /// Make [`AudioDevice::mix_format`] fail
    pub fn without_mix_format(mut self) -> Self {
        self.mix_format_available = false;
        self
    }

    /// Make opening any stream fail
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Make `play` fail on every stream of this device
    pub fn failing_play(mut self) -> Self {
        self.fail_play = true;
        self
    }

    /// Make `pause` fail on every stream of this device
    pub fn failing_pause(mut self) -> Self {
        self.fail_pause = true;
        self
    }

    /// Record stream operations into `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Feed samples into an open loopback capture.
    ///
    /// Returns how many were accepted; zero when no capture is open or it is
    /// paused.
    pub fn push(&self, samples: &[f32]) -> usize {
        if !self.is_capturing() {
            return 0;
        }
        let mut producer = lock(&self.state.producer);
        producer.as_mut().map_or(0, |p| p.write(samples))
    }

    /// Pull from an open render stream as the device callback would.
    ///
    /// Returns how many samples the pipeline supplied; zero when no render
    /// stream is open.
    pub fn pull(&self, buffer: &mut [f32]) -> usize {
        let mut render = lock(&self.state.render);
        render.as_mut().map_or(0, |source| source.read(buffer))
    }

    pub fn is_capturing(&self) -> bool {
        self.state.capturing.load(Ordering::SeqCst)
    }

    pub fn is_rendering(&self) -> bool {
        self.state.rendering.load(Ordering::SeqCst)
    }

    /// Whether a render stream is open (its pull chain is alive)
    pub fn has_render_stream(&self) -> bool {
        lock(&self.state.render).is_some()
    }

    fn open_stream(&self, kind: StreamKind) -> Box<dyn StreamControl> {
        Box::new(MockStream {
            device: self.name.clone(),
            kind,
            fail_play: self.fail_play,
            fail_pause: self.fail_pause,
            journal: self.journal.clone(),
            state: Arc::clone(&self.state),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

impl AudioDevice for MockDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn mix_format(&self) -> Result<StreamFormat, AudioError> {
        if self.mix_format_available {
            Ok(self.format)
        } else {
            Err(AudioError::DefaultConfig(format!(
                "{} has no shared-mode mix format",
                self.name
            )))
        }
    }

    fn open_loopback(
        &self,
        _format: StreamFormat,
        producer: AudioProducer,
    ) -> Result<Box<dyn StreamControl>, AudioError> {
        if self.fail_open {
            return Err(AudioError::BuildStream(format!("{} refused loopback", self.name)));
        }
        *lock(&self.state.producer) = Some(producer);
        Ok(self.open_stream(StreamKind::Capture))
    }

    fn open_render(
        &self,
        _format: StreamFormat,
        source: Box<dyn SampleSource>,
    ) -> Result<Box<dyn StreamControl>, AudioError> {
        if self.fail_open {
            return Err(AudioError::BuildStream(format!("{} refused render", self.name)));
        }
        *lock(&self.state.render) = Some(source);
        Ok(self.open_stream(StreamKind::Render))
    }
}

#[derive(Clone, Copy)]
enum StreamKind {
    Capture,
    Render,
}

struct MockStream {
    device: String,
    kind: StreamKind,
    fail_play: bool,
    fail_pause: bool,
    journal: Journal,
    state: Arc<MockDeviceState>,
}

impl MockStream {
    fn flag(&self) -> &AtomicBool {
        match self.kind {
            StreamKind::Capture => &self.state.capturing,
            StreamKind::Render => &self.state.rendering,
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            StreamKind::Capture => "capture",
            StreamKind::Render => "render",
        }
    }
}

impl StreamControl for MockStream {
    fn play(&self) -> Result<(), AudioError> {
        if self.fail_play {
            return Err(AudioError::PlayStream(format!("{} refused to play", self.device)));
        }
        self.flag().store(true, Ordering::SeqCst);
        self.journal.record(format!("{}:{}:play", self.device, self.label()));
        Ok(())
    }

    fn pause(&self) -> Result<(), AudioError> {
        if self.fail_pause {
            return Err(AudioError::PlayStream(format!("{} refused to pause", self.device)));
        }
        self.flag().store(false, Ordering::SeqCst);
        self.journal.record(format!("{}:{}:pause", self.device, self.label()));
        Ok(())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.flag().store(false, Ordering::SeqCst);
        match self.kind {
            StreamKind::Capture => drop(lock(&self.state.producer).take()),
            StreamKind::Render => drop(lock(&self.state.render).take()),
        }
        self.journal.record(format!("{}:{}:release", self.device, self.label()));
    }
}
