//! Router: owns and sequences the whole capture → gate → bridge → render chain
//!
//! Lifecycle is `Constructed → Running → Disposed`, with `stop` returning a
//! running router to `Constructed`. The render device pulls audio on its own
//! thread, the switch timer flips channels on another; the router itself is
//! driven from a single control thread.

use crate::audio::{
    AudioDevice, CaptureSource, ChannelGate, ChannelSwitch, FormatBridge, RenderSink, StreamFormat,
};
use crate::channel::StereoChannel;
use crate::config::RouterConfig;
use crate::error::{DeviceRole, RouterError};
use crate::event::{log_switch, SwitchEvent, SwitchListener};
use crate::scheduler::{ManualClock, SwitchScheduler};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Channel audible right after construction
pub const INITIAL_CHANNEL: StereoChannel = StereoChannel::Left;

/// Lifecycle state of a [`Router`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    Constructed,
    Running,
    Disposed,
}

impl RouterState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Constructed => "constructed",
            Self::Running => "running",
            Self::Disposed => "disposed",
        }
    }
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Routes a source device's loopback audio to a target device, silencing
/// one stereo channel at a time and flipping on a fixed interval.
pub struct Router {
    state: RouterState,
    scheduler: Option<SwitchScheduler>,
    capture: Option<CaptureSource>,
    render: Option<RenderSink>,
    switch: ChannelSwitch,
    source_format: StreamFormat,
    target_format: StreamFormat,
}

impl Router {
    /// Build the pipeline between `source` and `target`, logging each flip
    pub fn new(
        source: &dyn AudioDevice,
        target: &dyn AudioDevice,
        config: RouterConfig,
    ) -> Result<Self, RouterError> {
        Self::with_listener(source, target, config, log_switch())
    }

    /// Build the pipeline, reporting each flip to `listener`.
    ///
    /// Nothing is started. Both devices must expose a stereo mix format; the
    /// target's format is read here and the bridge converts to it.
    pub fn with_listener(
        source: &dyn AudioDevice,
        target: &dyn AudioDevice,
        config: RouterConfig,
        listener: SwitchListener,
    ) -> Result<Self, RouterError> {
        config.validate()?;

        let source_format = stereo_mix_format(source, DeviceRole::Source)?;
        let target_format = stereo_mix_format(target, DeviceRole::Target)?;

        let buffer_samples = config.buffer_samples(source_format.sample_rate, source_format.channels);
        let (capture, reader) = CaptureSource::open(source, source_format, buffer_samples)
            .map_err(|e| RouterError::device(DeviceRole::Source, e))?;

        let gate = ChannelGate::new(reader, INITIAL_CHANNEL)
            .map_err(|e| RouterError::device(DeviceRole::Source, e))?;
        let switch = gate.switch();

        let bridge = FormatBridge::new(gate, target_format)
            .map_err(|e| RouterError::device(DeviceRole::Target, e))?;

        let render = RenderSink::init(target, target_format, Box::new(bridge))
            .map_err(|e| RouterError::device(DeviceRole::Target, e))?;

        let tick_switch = switch.clone();
        let scheduler = SwitchScheduler::new(
            config.switch_interval,
            config.timer,
            Arc::new(move || {
                flip_channel(&tick_switch, &listener);
            }),
        );

        info!(
            "Router ready: '{}' ({}) -> '{}' ({}), switching every {:?}",
            source.name(),
            source_format,
            target.name(),
            target_format,
            config.switch_interval
        );

        Ok(Self {
            state: RouterState::Constructed,
            scheduler: Some(scheduler),
            capture: Some(capture),
            render: Some(render),
            switch,
            source_format,
            target_format,
        })
    }

    /// Start capture, playback and the switch timer.
    ///
    /// Only valid from `Constructed`. If any part fails to start, the parts
    /// already started are stopped again before the error is returned.
    pub fn start(&mut self) -> Result<(), RouterError> {
        if self.state != RouterState::Constructed {
            return Err(RouterError::InvalidState {
                operation: "start",
                state: self.state.name(),
            });
        }

        if let Err(e) = self.start_parts() {
            self.halt();
            return Err(e);
        }

        self.state = RouterState::Running;
        info!("Router started, {} channel active", self.switch.current());
        Ok(())
    }

    fn start_parts(&mut self) -> Result<(), RouterError> {
        if let Some(capture) = self.capture.as_mut() {
            capture
                .start()
                .map_err(|e| RouterError::device(DeviceRole::Source, e))?;
        }
        if let Some(render) = self.render.as_mut() {
            render
                .play()
                .map_err(|e| RouterError::device(DeviceRole::Target, e))?;
        }
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.start()?;
        }
        Ok(())
    }

    /// Halt a running router without releasing anything; `start` may be
    /// called again afterwards. A no-op when already stopped.
    ///
    /// Captured audio not yet rendered is dropped. When resampling, at most
    /// one converter chunk (about 10 ms) may still play after a restart.
    pub fn stop(&mut self) -> Result<(), RouterError> {
        match self.state {
            RouterState::Running => {
                self.halt();
                self.state = RouterState::Constructed;
                info!("Router stopped");
                Ok(())
            }
            RouterState::Constructed => Ok(()),
            RouterState::Disposed => Err(RouterError::InvalidState {
                operation: "stop",
                state: self.state.name(),
            }),
        }
    }

    // Timer first so no flip lands on a pipeline being torn down
    fn halt(&mut self) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.stop();
        }
        if let Some(capture) = self.capture.as_mut() {
            if let Err(e) = capture.stop() {
                warn!("Failed to stop capture: {}", e);
            }
        }
        if let Some(render) = self.render.as_mut() {
            if let Err(e) = render.stop() {
                warn!("Failed to stop render: {}", e);
            }
        }
    }

    /// Stop everything and release all devices.
    ///
    /// Order: timer, capture, render, then the render stream (which owns
    /// bridge, gate and capture reader), then the capture stream. Every step
    /// skips parts that are already gone, so calling this again is harmless.
    pub fn dispose(&mut self) {
        let was_disposed = self.state == RouterState::Disposed;

        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        if let Some(capture) = self.capture.as_mut() {
            if let Err(e) = capture.stop() {
                warn!("Failed to stop capture: {}", e);
            }
        }
        if let Some(render) = self.render.as_mut() {
            if let Err(e) = render.stop() {
                warn!("Failed to stop render: {}", e);
            }
        }
        if let Some(mut render) = self.render.take() {
            render.release();
            debug!("Render stream and conversion chain released");
        }
        if let Some(mut capture) = self.capture.take() {
            capture.release();
            debug!("Loopback capture released");
        }

        self.state = RouterState::Disposed;
        if !was_disposed {
            info!("Router disposed");
        }
    }

    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Channel currently left audible
    pub fn active_channel(&self) -> StereoChannel {
        self.switch.current()
    }

    /// Handle to the gate's channel selection
    pub fn channel_switch(&self) -> ChannelSwitch {
        self.switch.clone()
    }

    pub fn source_format(&self) -> StreamFormat {
        self.source_format
    }

    pub fn target_format(&self) -> StreamFormat {
        self.target_format
    }

    /// Clock driving the switch timer, when running with
    /// [`TimerMode::Manual`](crate::TimerMode::Manual)
    pub fn manual_clock(&self) -> Option<ManualClock> {
        self.scheduler.as_ref().and_then(SwitchScheduler::manual_clock)
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Timer tick: flip the audible channel and report it
fn flip_channel(switch: &ChannelSwitch, listener: &SwitchListener) -> StereoChannel {
    let channel = switch.toggle();
    listener(&SwitchEvent::now(channel));
    channel
}

fn stereo_mix_format(device: &dyn AudioDevice, role: DeviceRole) -> Result<StreamFormat, RouterError> {
    let format = device.mix_format().map_err(|e| RouterError::Format {
        role,
        device: device.name(),
        reason: e.to_string(),
    })?;

    if !format.is_stereo() {
        return Err(RouterError::UnsupportedChannels {
            role,
            device: device.name(),
            channels: format.channels,
        });
    }

    debug!("{} device '{}' mix format: {}", role, device.name(), format);
    Ok(format)
}
