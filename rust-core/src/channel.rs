//! Stereo channel selection

use std::fmt;

/// One side of an interleaved stereo frame.
///
/// In the router this is the channel that is currently audible; the other
/// one is silenced by [`ChannelGate`](crate::audio::ChannelGate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StereoChannel {
    #[default]
    Left,
    Right,
}

impl StereoChannel {
    /// The opposite channel
    #[inline]
    pub fn toggled(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Offset of this channel inside an interleaved frame (L = 0, R = 1)
    #[inline]
    pub fn frame_offset(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    /// Offset of the sample that must be zeroed when `self` is active
    #[inline]
    pub fn muted_offset(self) -> usize {
        self.toggled().frame_offset()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }
}

impl fmt::Display for StereoChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
