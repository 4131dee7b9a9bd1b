//! Channel filter/force policy applied while extracting events from a ring.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::midi;

/// How channel-voice messages are treated on the way out of a ring.
/// System messages always pass unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelPolicy {
    #[default]
    PassThrough,
    /// Keep only channels whose bit is set (bit 0 = channel 0).
    Filter(u16),
    /// Rewrite the channel nibble to this channel (0-15).
    Force(u8),
}

impl ChannelPolicy {
    pub const ALL_CHANNELS: u16 = 0xFFFF;

    #[inline]
    pub fn only(channel: u8) -> Self {
        Self::Filter(1 << (channel & 0x0F))
    }

    /// New status byte, or `None` if the event is filtered out.
    #[inline]
    pub fn apply(&self, status: u8) -> Option<u8> {
        if !midi::is_channel_voice(status) {
            return Some(status);
        }
        match *self {
            Self::PassThrough => Some(status),
            Self::Filter(mask) => {
                let bit = 1u16 << midi::channel_of(status);
                ((mask & bit) != 0).then_some(status)
            }
            Self::Force(channel) => Some((status & 0xF0) | (channel & 0x0F)),
        }
    }

    fn pack(self) -> u32 {
        match self {
            Self::PassThrough => 0,
            Self::Filter(mask) => (1 << 16) | mask as u32,
            Self::Force(channel) => (2 << 16) | (channel & 0x0F) as u32,
        }
    }

    fn unpack(bits: u32) -> Self {
        match bits >> 16 {
            1 => Self::Filter(bits as u16),
            2 => Self::Force((bits & 0x0F) as u8),
            _ => Self::PassThrough,
        }
    }
}

/// Lock-free cell holding a [`ChannelPolicy`].
///
/// The audio thread loads it once per `read`; any other thread may store a
/// new policy at any time.
#[derive(Debug, Default)]
pub struct SharedChannelPolicy {
    bits: AtomicU32,
}

impl SharedChannelPolicy {
    pub fn new(policy: ChannelPolicy) -> Self {
        Self {
            bits: AtomicU32::new(policy.pack()),
        }
    }

    #[inline]
    pub fn load(&self) -> ChannelPolicy {
        ChannelPolicy::unpack(self.bits.load(Ordering::Acquire))
    }

    #[inline]
    pub fn store(&self, policy: ChannelPolicy) {
        self.bits.store(policy.pack(), Ordering::Release);
    }
}
