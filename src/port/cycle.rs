//! Per-cycle access token for the audio thread.

use std::fmt;
use std::ptr;

use super::{MidiPort, PortWriter, RtState};
use crate::encoding::FrameTime;
use crate::event_buffer::EventBuffer;
use crate::midi::{self, Classify, StandardClassifier};
use crate::traits::MidiSink;

/// Where a [`MidiPort::write`] call comes from.
///
/// There is no ambient "am I the audio thread" check; the caller proves
/// where it runs by presenting either the current [`Cycle`] or the port's
/// single [`PortWriter`].
pub enum ExecutionContext<'c, 'p> {
    Realtime(&'c mut Cycle<'p>),
    NonRealtime(&'c mut PortWriter),
}

/// Exclusive access to a port's realtime state between
/// [`MidiPort::cycle_start`] and [`MidiPort::cycle_end`].
///
/// Dropping it (or passing it to `cycle_end`) returns the port to Idle and
/// advances the port's frame clock by `nframes`.
pub struct Cycle<'p> {
    port: &'p MidiPort,
    rt: &'p mut RtState,
    nframes: u32,
}

impl<'p> Cycle<'p> {
    pub(super) fn new(port: &'p MidiPort, rt: &'p mut RtState, nframes: u32) -> Self {
        Self { port, rt, nframes }
    }

    #[inline]
    pub fn nframes(&self) -> u32 {
        self.nframes
    }

    /// Absolute frame of this cycle's first frame.
    #[inline]
    pub fn origin(&self) -> FrameTime {
        self.rt.origin
    }

    #[inline]
    pub(super) fn belongs_to(&self, port: &MidiPort) -> bool {
        ptr::eq(self.port, port)
    }

    /// Moves this cycle's input events into `dest` with cycle-relative
    /// times. Input left over from earlier cycles is flushed first.
    /// Returns 0 on ports without an input side.
    pub fn read_input(&mut self, dest: &mut EventBuffer) -> usize {
        let origin = self.rt.origin;
        let end = origin + self.nframes as FrameTime;
        match self.rt.input.as_mut() {
            Some(input) => {
                input.reader.flush(origin);
                input.reader.read(dest, origin, end, 0, false)
            }
            None => 0,
        }
    }

    /// Discards input events before cycle frame `frame`.
    pub fn flush_input(&mut self, frame: u32) -> usize {
        let end = self.rt.origin + frame.min(self.nframes) as FrameTime;
        match self.rt.input.as_mut() {
            Some(input) => input.reader.flush(end),
            None => 0,
        }
    }

    /// Note-offs for every input note delivered so far and still held, at
    /// cycle frame `frame`. Used on loop and locate.
    pub fn resolve_input_notes<S: MidiSink + ?Sized>(&mut self, dest: &mut S, frame: u32) -> usize {
        match self.rt.input.as_mut() {
            Some(input) => input.reader.resolve_notes_into(dest, frame as FrameTime),
            None => 0,
        }
    }

    pub fn reset_input_notes(&mut self) {
        if let Some(input) = self.rt.input.as_mut() {
            input.reader.reset_note_tracking();
        }
    }

    /// Inserts one message into this cycle's output at frame `frame`,
    /// after any events already at that frame. A full output buffer is
    /// counted in [`PortStats::output_overflows`](super::PortStats).
    pub fn write(&mut self, frame: u32, payload: &[u8]) -> bool {
        if frame >= self.nframes || !midi::is_valid_message(payload) {
            return false;
        }
        let Some(output) = self.rt.output.as_mut() else {
            return false;
        };
        let kind = StandardClassifier.classify(payload[0]);
        if output
            .buffer
            .insert_event(frame as FrameTime, kind, payload)
        {
            true
        } else {
            self.port.record_output_overflow();
            false
        }
    }

    /// Events queued for the driver so far this cycle.
    pub fn output(&self) -> Option<&EventBuffer> {
        self.rt.output.as_ref().map(|o| &o.buffer)
    }

    /// Pushes the output buffer into `sink`; returns (accepted, refused).
    pub(super) fn deliver<S: MidiSink + ?Sized>(self, sink: &mut S) -> (usize, usize) {
        let Some(output) = self.rt.output.as_ref() else {
            return (0, 0);
        };
        let mut accepted = 0;
        let mut refused = 0;
        for ev in output.buffer.iter() {
            if sink.push_event(ev.time, ev.kind, ev.payload) {
                accepted += 1;
            } else {
                refused += 1;
            }
        }
        (accepted, refused)
    }
}

impl Drop for Cycle<'_> {
    fn drop(&mut self) {
        self.rt.origin += self.nframes as FrameTime;
        self.port.finish_cycle();
    }
}

impl fmt::Debug for Cycle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cycle")
            .field("port", &self.port.name())
            .field("origin", &self.rt.origin)
            .field("nframes", &self.nframes)
            .finish()
    }
}
