//! Audio pipeline stages
//!
//! Loopback capture → channel gate → format bridge → render sink, each stage
//! owning the one before it and pulled by the render device.

pub mod bridge;
pub mod buffer;
pub mod capture;
pub mod device;
pub mod gate;
pub mod mock;
pub mod render;
pub mod source;

pub use bridge::FormatBridge;
pub use buffer::AudioRingBuffer;
pub use capture::{CaptureReader, CaptureSource};
pub use device::{list_output_devices, output_device, AudioDevice, AudioDeviceInfo, CpalDevice, StreamControl};
pub use gate::{ChannelGate, ChannelSwitch};
pub use render::RenderSink;
pub use source::{SampleSource, StreamFormat};
