//! Error types for the device layer and the router

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by an audio device or one of its streams
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("No output device at index {index} ({available} available)")]
    DeviceNotFound { index: usize, available: usize },

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to get default config: {0}")]
    DefaultConfig(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("Expected {expected} channels, device has {found}")]
    UnsupportedChannels { expected: u16, found: u16 },

    #[error("Resampler error: {0}")]
    Resampler(String),
}

/// Which end of the pipeline a device sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Source,
    Target,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

/// Coarse classification of a [`RouterError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Device,
    Format,
    Lifecycle,
}

/// Errors surfaced by [`Router`](crate::Router) operations.
///
/// Nothing is retried; every failure is returned synchronously from the call
/// that caused it.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Switch interval must be greater than zero (got {0:?})")]
    InvalidInterval(Duration),

    #[error("Latency {0:?} is outside the supported range")]
    InvalidLatency(Duration),

    #[error("{role} device error: {source}")]
    Device {
        role: DeviceRole,
        #[source]
        source: AudioError,
    },

    #[error("Mix format of {role} device '{device}' unavailable: {reason}")]
    Format {
        role: DeviceRole,
        device: String,
        reason: String,
    },

    #[error("{role} device '{device}' has {channels} channels; only stereo is supported")]
    UnsupportedChannels {
        role: DeviceRole,
        device: String,
        channels: u16,
    },

    #[error("Cannot {operation} router in state {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Failed to spawn channel switch thread: {0}")]
    Scheduler(#[from] std::io::Error),
}

impl RouterError {
    pub fn device(role: DeviceRole, source: AudioError) -> Self {
        Self::Device { role, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInterval(_) | Self::InvalidLatency(_) => ErrorKind::Configuration,
            Self::Device { .. } | Self::Scheduler(_) => ErrorKind::Device,
            Self::Format { .. } | Self::UnsupportedChannels { .. } => ErrorKind::Format,
            Self::InvalidState { .. } => ErrorKind::Lifecycle,
        }
    }
}
