//! Output devices and their streams
//!
//! The router only sees [`AudioDevice`]; [`CpalDevice`] is the real
//! implementation backed by the default cpal host. Loopback capture is
//! opened by building an input stream on an output device, which cpal maps
//! to WASAPI loopback.

use super::buffer::AudioProducer;
use super::source::{SampleSource, StreamFormat};
use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};

/// Running device stream that can be paused and resumed.
///
/// Dropping the value closes the stream and releases whatever its callback
/// owns.
pub trait StreamControl {
    fn play(&self) -> Result<(), AudioError>;
    fn pause(&self) -> Result<(), AudioError>;
}

impl StreamControl for Stream {
    fn play(&self) -> Result<(), AudioError> {
        StreamTrait::play(self).map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    fn pause(&self) -> Result<(), AudioError> {
        StreamTrait::pause(self).map_err(|e| AudioError::PlayStream(e.to_string()))
    }
}

/// An output endpoint usable as loopback source or render target
pub trait AudioDevice {
    fn name(&self) -> String;

    /// The device's shared-mode mix format
    fn mix_format(&self) -> Result<StreamFormat, AudioError>;

    /// Open a loopback capture of what the device is playing.
    ///
    /// The stream's callback writes whole interleaved `f32` frames into
    /// `producer`. The stream is created paused.
    fn open_loopback(
        &self,
        format: StreamFormat,
        producer: AudioProducer,
    ) -> Result<Box<dyn StreamControl>, AudioError>;

    /// Open a render stream in `format` that pulls from `source`.
    ///
    /// The stream is created paused.
    fn open_render(
        &self,
        format: StreamFormat,
        source: Box<dyn SampleSource>,
    ) -> Result<Box<dyn StreamControl>, AudioError>;
}

/// Audio output device information
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

/// A cpal output device
#[derive(Clone)]
pub struct CpalDevice {
    device: Device,
    name: String,
}

impl CpalDevice {
    pub fn new(device: Device) -> Result<Self, AudioError> {
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;
        Ok(Self { device, name })
    }

    /// The host's default output device
    pub fn default_output() -> Result<Self, AudioError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;
        Self::new(device)
    }

    pub fn info(&self) -> Result<AudioDeviceInfo, AudioError> {
        let format = self.mix_format()?;
        Ok(AudioDeviceInfo {
            name: self.name.clone(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            sample_format: format.sample_format,
        })
    }

    fn stream_config(format: StreamFormat) -> StreamConfig {
        StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }
}

impl AudioDevice for CpalDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn mix_format(&self) -> Result<StreamFormat, AudioError> {
        let config = self
            .device
            .default_output_config()
            .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;

        Ok(StreamFormat::new(
            config.sample_rate().0,
            config.channels(),
            config.sample_format(),
        ))
    }

    fn open_loopback(
        &self,
        format: StreamFormat,
        producer: AudioProducer,
    ) -> Result<Box<dyn StreamControl>, AudioError> {
        let config = Self::stream_config(format);
        let stream = match format.sample_format {
            SampleFormat::F32 => build_capture_stream::<f32>(&self.device, &config, producer),
            SampleFormat::I16 => build_capture_stream::<i16>(&self.device, &config, producer),
            SampleFormat::U16 => build_capture_stream::<u16>(&self.device, &config, producer),
            SampleFormat::I32 => build_capture_stream::<i32>(&self.device, &config, producer),
            other => Err(AudioError::UnsupportedSampleFormat(format!("{other:?}"))),
        }?;

        pause_new_stream(&stream, "loopback capture");
        Ok(Box::new(stream))
    }

    fn open_render(
        &self,
        format: StreamFormat,
        source: Box<dyn SampleSource>,
    ) -> Result<Box<dyn StreamControl>, AudioError> {
        let config = Self::stream_config(format);
        let stream = match format.sample_format {
            SampleFormat::F32 => build_render_stream::<f32>(&self.device, &config, source),
            SampleFormat::I16 => build_render_stream::<i16>(&self.device, &config, source),
            SampleFormat::U16 => build_render_stream::<u16>(&self.device, &config, source),
            SampleFormat::I32 => build_render_stream::<i32>(&self.device, &config, source),
            other => Err(AudioError::UnsupportedSampleFormat(format!("{other:?}"))),
        }?;

        pause_new_stream(&stream, "render");
        Ok(Box::new(stream))
    }
}

/// cpal streams may start running as soon as they are built. Returns false
/// when the stream could not be paused and is already running.
fn pause_new_stream(stream: &dyn StreamControl, what: &str) -> bool {
    match stream.pause() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to pause new {} stream, it runs before start: {}", what, e);
            false
        }
    }
}

fn build_capture_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut producer: AudioProducer,
) -> Result<Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|&s| f32::from_sample(s)));
                producer.write(&scratch);
            },
            move |err| {
                tracing::error!("Loopback capture error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}

fn build_render_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut source: Box<dyn SampleSource>,
) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let read = source.read(&mut scratch[..data.len()]);

                for (out, &sample) in data.iter_mut().zip(&scratch[..read]) {
                    *out = T::from_sample(sample);
                }

                // Silence whatever the pipeline could not supply
                for out in data[read..].iter_mut() {
                    *out = T::EQUILIBRIUM;
                }
            },
            move |err| {
                tracing::error!("Render stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))
}

/// List output devices of the default host, in host order
pub fn list_output_devices() -> Result<Vec<CpalDevice>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

    Ok(devices.filter_map(|d| CpalDevice::new(d).ok()).collect())
}

/// Pick the output device at `index` as listed by [`list_output_devices`]
pub fn output_device(index: usize) -> Result<CpalDevice, AudioError> {
    let mut devices = list_output_devices()?;
    let available = devices.len();
    if index >= available {
        return Err(AudioError::DeviceNotFound { index, available });
    }
    Ok(devices.swap_remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // Just ensure it doesn't crash
        let _ = list_output_devices();
    }

    #[test]
    fn test_out_of_range_index() {
        if let Ok(devices) = list_output_devices() {
            let err = output_device(devices.len()).err();
            assert!(matches!(err, Some(AudioError::DeviceNotFound { .. })));
        }
    }

    struct StuckStream;

    impl StreamControl for StuckStream {
        fn play(&self) -> Result<(), AudioError> {
            Ok(())
        }

        fn pause(&self) -> Result<(), AudioError> {
            Err(AudioError::PlayStream("device busy".into()))
        }
    }

    #[test]
    fn test_new_stream_pause_failure_reported() {
        assert!(!pause_new_stream(&StuckStream, "render"));
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_default_output_mix_format() {
        let device = CpalDevice::default_output().unwrap();
        let format = device.mix_format().unwrap();
        assert!(format.sample_rate > 0);
        assert!(format.channels > 0);
    }
}
