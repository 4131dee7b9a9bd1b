//! Real-time MIDI event transport for Tutti.
//!
//! Moves time-stamped MIDI between a realtime audio thread and everything
//! else without locks or allocation on the audio thread:
//! - [`ByteRing`]: lock-free SPSC byte ring with atomic multi-part writes
//! - [`EventBuffer`]: fixed-capacity arena of encoded events for one cycle
//! - [`MidiRing`]: event framing, time windows, channel policy, note tracking
//! - [`NoteTracker`]: sounding notes, resolved into note-offs on loop/stop
//! - [`MidiPort`]: input ring + output FIFO bracketed by audio cycles
//!
//! ```ignore
//! use tutti_midi_rt::{ExecutionContext, MidiPort, NoMidiInput, PortConfig, PortDirection};
//!
//! let mut port = MidiPort::new(PortConfig::new("synth", PortDirection::Output));
//! port.open()?;
//! let mut writer = port.take_writer().unwrap();
//!
//! // UI thread
//! port.write(ExecutionContext::NonRealtime(&mut writer), 0, &tutti_midi_rt::midi::note_on(0, 60, 100));
//!
//! // audio thread
//! let mut cycle = port.cycle_start(256, &mut NoMidiInput)?;
//! port.write(ExecutionContext::Realtime(&mut cycle), 128, &tutti_midi_rt::midi::note_off(0, 60, 0));
//! port.cycle_end(cycle, &mut driver_sink);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod midi;
pub use midi::{Classify, EventType, StandardClassifier};

pub mod encoding;
pub use encoding::{EventHeader, FrameTime, HEADER_SIZE};

mod traits;
pub use traits::{MidiSink, MidiSource, NoMidiInput};

pub mod byte_ring;
pub use byte_ring::{byte_ring, ByteRing, ByteRingReader, ByteRingWriter};

pub mod event_buffer;
pub use event_buffer::{EventBuffer, EventView, Merge};

pub mod channel;
pub use channel::{ChannelPolicy, SharedChannelPolicy};

pub mod note_tracker;
pub use note_tracker::NoteTracker;

pub mod stats;
pub use stats::{TransportStats, TransportStatsSnapshot};

pub mod midi_ring;
pub use midi_ring::{midi_ring, midi_ring_with_classifier, MidiRing, MidiRingReader, MidiRingWriter};

pub mod config;
pub use config::PortConfig;

pub mod port;
pub use port::{
    Cycle, ExecutionContext, MidiPort, PortDirection, PortState, PortStats, PortWriter,
};

pub use midi_msg::MidiMsg;
