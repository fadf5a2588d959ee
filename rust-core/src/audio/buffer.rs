//! Lock-free ring buffer between the capture callback and the render pull
//!
//! Reads and writes only ever move whole frames, so the consumer side always
//! starts on a left sample.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sample totals shared by both ends
#[derive(Default)]
struct Cursors {
    written: AtomicU64,
    discard_until: AtomicU64,
}

/// Frame-aligned SPSC ring buffer of interleaved `f32` samples
pub struct AudioRingBuffer {
    producer: HeapProducer<f32>,
    consumer: HeapConsumer<f32>,
    channels: usize,
    cursors: Arc<Cursors>,
}

impl AudioRingBuffer {
    /// Create a ring buffer holding at least `capacity` samples.
    ///
    /// Capacity is rounded up to a whole number of `channels`-sample frames.
    pub fn new(capacity: usize, channels: u16) -> Self {
        let channels = channels.max(1) as usize;
        let frames = capacity.div_ceil(channels).max(1);
        let (producer, consumer) = HeapRb::<f32>::new(frames * channels).split();

        Self {
            producer,
            consumer,
            channels,
            cursors: Arc::new(Cursors::default()),
        }
    }

    /// Handle that can mark everything written so far as stale
    pub fn discard_handle(&self) -> DiscardHandle {
        DiscardHandle {
            cursors: Arc::clone(&self.cursors),
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
                channels: self.channels,
                cursors: Arc::clone(&self.cursors),
            },
            AudioConsumer {
                consumer: self.consumer,
                channels: self.channels,
                read: 0,
                cursors: self.cursors,
            },
        )
    }
}

/// Writing end, owned by the device callback
pub struct AudioProducer {
    producer: HeapProducer<f32>,
    channels: usize,
    cursors: Arc<Cursors>,
}

impl AudioProducer {
    /// Push as many whole frames of `samples` as fit.
    ///
    /// Returns the number of samples written. Frames that do not fit are
    /// dropped, newest first.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        let fit = samples.len().min(self.producer.free_len());
        let fit = fit - fit % self.channels;
        let written = self.producer.push_slice(&samples[..fit]);
        self.cursors.written.fetch_add(written as u64, Ordering::Release);
        written
    }

    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }
}

/// Reading end, owned by the pipeline
pub struct AudioConsumer {
    consumer: HeapConsumer<f32>,
    channels: usize,
    read: u64,
    cursors: Arc<Cursors>,
}

impl AudioConsumer {
    /// Pop up to `buffer.len()` samples, rounded down to whole frames.
    ///
    /// Samples marked stale through a [`DiscardHandle`] are skipped first.
    pub fn read(&mut self, buffer: &mut [f32]) -> usize {
        self.skip_stale();
        let take = buffer.len().min(self.consumer.len());
        let take = take - take % self.channels;
        let popped = self.consumer.pop_slice(&mut buffer[..take]);
        self.read += popped as u64;
        popped
    }

    fn skip_stale(&mut self) {
        let until = self.cursors.discard_until.load(Ordering::Acquire);
        if self.read >= until {
            return;
        }
        let stale = usize::try_from(until - self.read).unwrap_or(usize::MAX);
        let skip = stale.min(self.consumer.len());
        let skipped = self.consumer.skip(skip - skip % self.channels);
        self.read += skipped as u64;
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}

/// Drops buffered audio from the reading side without owning it
#[derive(Clone)]
pub struct DiscardHandle {
    cursors: Arc<Cursors>,
}

impl DiscardHandle {
    /// Mark every sample written so far as stale. The consumer skips them on
    /// its next read; later writes are unaffected.
    pub fn discard_written(&self) {
        let written = self.cursors.written.load(Ordering::Acquire);
        self.cursors.discard_until.store(written, Ordering::Release);
    }
}
