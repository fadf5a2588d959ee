//! Render sink on the target output device
//!
//! The device callback owns the whole pull chain and drives it on its own
//! thread; this type only controls the stream.

use super::device::{AudioDevice, StreamControl};
use super::source::{SampleSource, StreamFormat};
use crate::error::AudioError;

/// Control half of a render stream
pub struct RenderSink {
    stream: Option<Box<dyn StreamControl>>,
    format: StreamFormat,
    playing: bool,
}

impl RenderSink {
    /// Open a render stream on `device` in `format`, pulling from `source`
    pub fn init(
        device: &dyn AudioDevice,
        format: StreamFormat,
        source: Box<dyn SampleSource>,
    ) -> Result<Self, AudioError> {
        let stream = device.open_render(format, source)?;

        tracing::debug!("Opened render stream on '{}' ({})", device.name(), format);

        Ok(Self {
            stream: Some(stream),
            format,
            playing: false,
        })
    }

    /// Start pulling and playing audio
    pub fn play(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = &self.stream {
            if !self.playing {
                stream.play()?;
                self.playing = true;
            }
        }
        Ok(())
    }

    /// Stop playback; a no-op if not playing or already released
    pub fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(stream) = &self.stream {
            if self.playing {
                stream.pause()?;
                self.playing = false;
            }
        }
        Ok(())
    }

    /// Close the stream, dropping the pull chain it owns. Safe to call more
    /// than once.
    pub fn release(&mut self) {
        self.playing = false;
        self.stream = None;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }
}
