//! Shared fixtures for transport integration tests.
//!
//! A scripted driver source, a recording driver sink, and a tracing
//! subscriber that writes through the test harness.

#![allow(dead_code)]

use tutti_midi_rt::{EventType, FrameTime, MidiSink, MidiSource};

/// Standard cycle length for port tests.
pub const TEST_NFRAMES: u32 = 64;

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Driver input that replays a fixed list once.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    events: Vec<(u32, Vec<u8>)>,
    next: usize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, offset: u32, bytes: &[u8]) -> Self {
        self.events.push((offset, bytes.to_vec()));
        self
    }
}

impl MidiSource for ScriptedSource {
    fn next_event(&mut self, _nframes: u32) -> Option<(u32, &[u8])> {
        let (offset, bytes) = self.events.get(self.next)?;
        self.next += 1;
        Some((*offset, bytes.as_slice()))
    }
}

/// Driver output that records everything it accepts.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<(FrameTime, EventType, Vec<u8>)>,
}

impl RecordingSink {
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.events.iter().map(|(_, _, p)| p.clone()).collect()
    }

    pub fn times(&self) -> Vec<FrameTime> {
        self.events.iter().map(|(t, _, _)| *t).collect()
    }
}

impl MidiSink for RecordingSink {
    fn push_event(&mut self, time: FrameTime, kind: EventType, payload: &[u8]) -> bool {
        self.events.push((time, kind, payload.to_vec()));
        true
    }
}
