//! Loopback capture of a source output device
//!
//! Split in two halves: [`CaptureSource`] controls the device stream and
//! stays with the router, [`CaptureReader`] is the pull end that the
//! channel gate owns.

use super::buffer::{AudioConsumer, AudioRingBuffer, DiscardHandle};
use super::device::{AudioDevice, StreamControl};
use super::source::{SampleSource, StreamFormat};
use crate::error::AudioError;

/// Control half of a loopback capture
pub struct CaptureSource {
    stream: Option<Box<dyn StreamControl>>,
    format: StreamFormat,
    capturing: bool,
    buffered: DiscardHandle,
}

impl CaptureSource {
    /// Open a loopback capture of `device` in its mix format.
    ///
    /// `buffer_samples` bounds how much captured audio may wait for the
    /// render side; older audio is never overwritten, newer frames are
    /// dropped while the buffer is full.
    pub fn open(
        device: &dyn AudioDevice,
        format: StreamFormat,
        buffer_samples: usize,
    ) -> Result<(Self, CaptureReader), AudioError> {
        let ring = AudioRingBuffer::new(buffer_samples, format.channels);
        let buffered = ring.discard_handle();
        let (producer, consumer) = ring.split();
        let stream = device.open_loopback(format, producer)?;

        tracing::debug!("Opened loopback capture on '{}' ({})", device.name(), format);

        Ok((
            Self {
                stream: Some(stream),
                format,
                capturing: false,
                buffered,
            },
            CaptureReader {
                consumer,
                format: StreamFormat::new(format.sample_rate, format.channels, cpal::SampleFormat::F32),
            },
        ))
    }

    /// Begin capturing
    pub fn start(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = &self.stream {
            if !self.capturing {
                stream.play()?;
                self.capturing = true;
            }
        }
        Ok(())
    }

    /// Stop capturing; a no-op if not capturing or already released.
    ///
    /// Audio still waiting in the buffer is dropped, so a later `start`
    /// does not replay it.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = &self.stream {
            if self.capturing {
                stream.pause()?;
                self.capturing = false;
                self.buffered.discard_written();
            }
        }
        Ok(())
    }

    /// Close the device stream. Safe to call more than once.
    pub fn release(&mut self) {
        self.capturing = false;
        self.stream = None;
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    /// The device's native format
    pub fn format(&self) -> StreamFormat {
        self.format
    }
}

/// Pull half of a loopback capture, yielding whole `f32` frames
pub struct CaptureReader {
    consumer: AudioConsumer,
    format: StreamFormat,
}

impl SampleSource for CaptureReader {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        self.consumer.read(buffer)
    }
}
