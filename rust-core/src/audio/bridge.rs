//! Sample rate bridge between the capture format and the render format
//!
//! Pull-through: every `read` pulls just enough upstream audio to satisfy the
//! request. Equal rates pass straight through; otherwise audio goes through
//! an FFT resampler in fixed input chunks, and the output is queued so that
//! any pull size works.

use super::source::{SampleSource, StreamFormat};
use crate::error::AudioError;
use rubato::{FftFixedIn, Resampler};
use std::collections::VecDeque;

/// Frames per resampler input chunk (10 ms at 48 kHz)
pub const CHUNK_FRAMES: usize = 480;

const SUB_CHUNKS: usize = 2;

struct ResampleState {
    resampler: FftFixedIn<f32>,
    /// Interleaved input waiting for a full chunk
    staged: Vec<f32>,
    staged_len: usize,
    /// Deinterleaved scratch planes handed to the resampler
    planes: Vec<Vec<f32>>,
    /// Interleaved output not yet handed to the caller
    pending: VecDeque<f32>,
}

/// Converts an upstream stream to a target sample rate
pub struct FormatBridge<S> {
    upstream: S,
    target: StreamFormat,
    channels: usize,
    state: Option<ResampleState>,
}

impl<S: SampleSource> FormatBridge<S> {
    /// Bridge `upstream` to `target`.
    ///
    /// Channel counts must match; only the rate is converted here. Sample
    /// type conversion happens at the render device.
    pub fn new(upstream: S, target: StreamFormat) -> Result<Self, AudioError> {
        let source = upstream.format();
        if source.channels != target.channels {
            return Err(AudioError::UnsupportedChannels {
                expected: source.channels,
                found: target.channels,
            });
        }
        let channels = source.channels as usize;

        let state = if source.sample_rate == target.sample_rate {
            None
        } else {
            let resampler = FftFixedIn::<f32>::new(
                source.sample_rate as usize,
                target.sample_rate as usize,
                CHUNK_FRAMES,
                SUB_CHUNKS,
                channels,
            )
            .map_err(|e| AudioError::Resampler(e.to_string()))?;

            tracing::debug!(
                "Resampling {} Hz -> {} Hz ({} frame chunks)",
                source.sample_rate,
                target.sample_rate,
                CHUNK_FRAMES
            );

            Some(ResampleState {
                staged: vec![0.0; CHUNK_FRAMES * channels],
                staged_len: 0,
                planes: vec![vec![0.0; CHUNK_FRAMES]; channels],
                pending: VecDeque::with_capacity(resampler.output_frames_max() * channels * 2),
                resampler,
            })
        };

        Ok(Self {
            upstream,
            target,
            channels,
            state,
        })
    }

    /// Whether samples go through the resampler
    pub fn is_resampling(&self) -> bool {
        self.state.is_some()
    }

    /// Samples converted but not yet pulled
    pub fn pending(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.pending.len())
    }
}

impl ResampleState {
    /// Pull upstream until one input chunk is complete, then resample it.
    ///
    /// Returns false when upstream ran dry first; the partial chunk is kept
    /// for the next call.
    fn fill<S: SampleSource>(&mut self, upstream: &mut S, channels: usize) -> bool {
        let needed = self.resampler.input_frames_next() * channels;
        if self.staged.len() < needed {
            self.staged.resize(needed, 0.0);
        }

        while self.staged_len < needed {
            let got = upstream.read(&mut self.staged[self.staged_len..needed]);
            if got == 0 {
                return false;
            }
            self.staged_len += got;
        }

        let frames = needed / channels;
        for (ch, plane) in self.planes.iter_mut().enumerate() {
            plane.resize(frames, 0.0);
            for (frame, sample) in plane.iter_mut().enumerate() {
                *sample = self.staged[frame * channels + ch];
            }
        }
        self.staged_len = 0;

        match self.resampler.process(&self.planes, None) {
            Ok(output) => {
                let produced = output.first().map_or(0, Vec::len);
                for frame in 0..produced {
                    for plane in &output {
                        self.pending.push_back(plane[frame]);
                    }
                }
                true
            }
            Err(e) => {
                tracing::warn!("Dropping {} frames, resampler failed: {}", frames, e);
                true
            }
        }
    }
}

impl<S: SampleSource> SampleSource for FormatBridge<S> {
    fn format(&self) -> StreamFormat {
        StreamFormat::new(
            self.target.sample_rate,
            self.target.channels,
            cpal::SampleFormat::F32,
        )
    }

    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let Some(state) = self.state.as_mut() else {
            return self.upstream.read(buffer);
        };

        // Only hand out whole frames so the render side stays aligned
        let wanted = buffer.len() - buffer.len() % self.channels;
        while state.pending.len() < wanted {
            if !state.fill(&mut self.upstream, self.channels) {
                break;
            }
        }

        let available = state.pending.len() - state.pending.len() % self.channels;
        let n = wanted.min(available);
        for (out, sample) in buffer[..n].iter_mut().zip(state.pending.drain(..n)) {
            *out = sample;
        }
        n
    }
}
