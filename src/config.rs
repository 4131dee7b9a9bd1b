//! MIDI port configuration.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelPolicy;
use crate::encoding::HEADER_SIZE;
use crate::port::PortDirection;
use crate::{Error, Result};

/// Largest ring or buffer a port will allocate.
pub const MAX_CAPACITY: usize = 1 << 24;

/// Configuration for one [`MidiPort`](crate::MidiPort).
///
/// Capacities are in bytes. Ring capacities are rounded up to a power of
/// two when the port is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub name: String,
    pub direction: PortDirection,
    /// Input byte ring (driver source -> audio thread).
    pub input_capacity: usize,
    /// Per-cycle output event buffer.
    pub output_capacity: usize,
    /// Non-realtime writer FIFO (any thread -> audio thread).
    pub fifo_capacity: usize,
    /// Channel policy applied when reading the input ring.
    pub channel_policy: ChannelPolicy,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            name: "midi".to_string(),
            direction: PortDirection::Duplex,
            input_capacity: 4096,
            output_capacity: 4096,
            fifo_capacity: 1024,
            channel_policy: ChannelPolicy::PassThrough,
        }
    }
}

impl PortConfig {
    pub fn new(name: impl Into<String>, direction: PortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            ..Self::default()
        }
    }

    pub fn with_input_capacity(mut self, bytes: usize) -> Self {
        self.input_capacity = bytes;
        self
    }

    pub fn with_output_capacity(mut self, bytes: usize) -> Self {
        self.output_capacity = bytes;
        self
    }

    pub fn with_fifo_capacity(mut self, bytes: usize) -> Self {
        self.fifo_capacity = bytes;
        self
    }

    pub fn with_channel_policy(mut self, policy: ChannelPolicy) -> Self {
        self.channel_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidConfig("port name is empty".to_string()));
        }
        if let ChannelPolicy::Force(channel) = self.channel_policy {
            if channel > 15 {
                return Err(Error::InvalidConfig(format!(
                    "forced channel {} out of range (0-15)",
                    channel
                )));
            }
        }

        // A capacity must hold at least one 3-byte channel message.
        let min = HEADER_SIZE + 3;
        let mut checks = Vec::with_capacity(3);
        if self.direction.has_input() {
            checks.push(("input_capacity", self.input_capacity));
        }
        if self.direction.has_output() {
            checks.push(("output_capacity", self.output_capacity));
            checks.push(("fifo_capacity", self.fifo_capacity));
        }
        for (field, value) in checks {
            if value < min || value > MAX_CAPACITY {
                return Err(Error::InvalidConfig(format!(
                    "{} {} out of range ({}-{} bytes)",
                    field, value, min, MAX_CAPACITY
                )));
            }
        }
        Ok(())
    }
}
