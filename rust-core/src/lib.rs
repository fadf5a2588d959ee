//! Channel Router - Alternating Stereo Channel Loopback Core
//!
//! Captures what one output device is playing, silences one stereo channel
//! at a time, flips the audible channel on a fixed timer, resamples to a
//! second output device's mix format and plays it there.

pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod router;
pub mod scheduler;

pub use audio::{AudioDevice, ChannelGate, ChannelSwitch, CpalDevice, SampleSource, StreamFormat};
pub use channel::StereoChannel;
pub use config::{RouterConfig, TimerMode};
pub use error::{AudioError, DeviceRole, ErrorKind, RouterError};
pub use event::{switch_listener, SwitchEvent, SwitchListener};
pub use router::{Router, RouterState};
pub use scheduler::{ManualClock, SwitchScheduler};
