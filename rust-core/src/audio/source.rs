//! Pull-based sample sources
//!
//! Every pipeline stage exposes the same single capability: fill a caller
//! owned buffer with up to `buffer.len()` interleaved samples.

use cpal::SampleFormat;

/// Shape of an interleaved sample stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Native sample type of the device; pipeline buffers are always `f32`
    pub sample_format: SampleFormat,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// 32-bit float stereo, the layout every stage works in
    pub fn stereo_f32(sample_rate: u32) -> Self {
        Self::new(sample_rate, 2, SampleFormat::F32)
    }

    pub fn bits_per_sample(&self) -> usize {
        self.sample_format.sample_size() * 8
    }

    pub fn is_stereo(&self) -> bool {
        self.channels == 2
    }
}

impl std::fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit {:?}",
            self.sample_rate,
            self.channels,
            self.bits_per_sample(),
            self.sample_format
        )
    }
}

/// A stage that can be pulled for samples
pub trait SampleSource: Send {
    /// Format of the samples produced by [`read`](Self::read)
    fn format(&self) -> StreamFormat;

    /// Fill `buffer` with up to `buffer.len()` samples.
    ///
    /// Returns the number of samples written; only `buffer[..n]` is touched.
    /// Zero means nothing is available right now, not end of stream.
    fn read(&mut self, buffer: &mut [f32]) -> usize;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn format(&self) -> StreamFormat {
        (**self).format()
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        (**self).read(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_display() {
        let format = StreamFormat::new(44100, 2, SampleFormat::I16);
        assert_eq!(format.bits_per_sample(), 16);
        assert_eq!(format.to_string(), "44100 Hz, 2 ch, 16-bit I16");
    }

    #[test]
    fn test_stereo_f32() {
        let format = StreamFormat::stereo_f32(48000);
        assert!(format.is_stereo());
        assert_eq!(format.bits_per_sample(), 32);
    }
}
