//! Seams between the transport core and its collaborators.
//!
//! - [`MidiSink`]: where decoded events go (per-cycle buffers, driver output)
//! - [`MidiSource`]: where raw device bytes come from (driver input)

use crate::encoding::FrameTime;
use crate::midi::EventType;

/// Accepts time-stamped events in non-decreasing time order.
///
/// # RT-Safety
/// Implementations called from the audio thread must not block or allocate.
pub trait MidiSink {
    /// Returns `false` if the event could not be stored (full, malformed).
    fn push_event(&mut self, time: FrameTime, kind: EventType, payload: &[u8]) -> bool;
}

/// Produces raw device MIDI for the current cycle.
///
/// Called by [`MidiPort::cycle_start`](crate::MidiPort::cycle_start) on the
/// audio thread until it returns `None`.
pub trait MidiSource {
    /// Next complete message and its frame offset within the cycle.
    /// Offsets at or past `nframes` are clamped to the last frame.
    fn next_event(&mut self, nframes: u32) -> Option<(u32, &[u8])>;
}

/// A source with nothing to deliver (output-only ports, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMidiInput;

impl MidiSource for NoMidiInput {
    #[inline]
    fn next_event(&mut self, _nframes: u32) -> Option<(u32, &[u8])> {
        None
    }
}

impl<S: MidiSink + ?Sized> MidiSink for &mut S {
    #[inline]
    fn push_event(&mut self, time: FrameTime, kind: EventType, payload: &[u8]) -> bool {
        (**self).push_event(time, kind, payload)
    }
}
