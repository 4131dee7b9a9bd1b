//! Sounding-note bookkeeping for stuck-note prevention.
//!
//! One 128-bit mask per channel; no allocation, `Copy`-cheap to reset.

use std::fmt;

use crate::encoding::FrameTime;
use crate::midi::{self, EventType};
use crate::traits::MidiSink;

#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteTracker {
    on: [u128; 16],
}

impl NoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    #[inline]
    pub fn add(&mut self, channel: u8, note: u8) {
        self.on[(channel & 0x0F) as usize] |= 1u128 << (note & 0x7F);
    }

    /// Idempotent; removing an untracked note is not an error.
    #[inline]
    pub fn remove(&mut self, channel: u8, note: u8) {
        self.on[(channel & 0x0F) as usize] &= !(1u128 << (note & 0x7F));
    }

    #[inline]
    pub fn is_active(&self, channel: u8, note: u8) -> bool {
        self.on[(channel & 0x0F) as usize] & (1u128 << (note & 0x7F)) != 0
    }

    /// Number of tracked (channel, note) pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.on.iter().map(|mask| mask.count_ones() as usize).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.on.iter().all(|mask| *mask == 0)
    }

    /// Feeds one raw message. Note-on with velocity 0 counts as note-off;
    /// anything else is ignored.
    #[inline]
    pub fn track(&mut self, bytes: &[u8]) {
        if let Some((channel, note)) = midi::note_on_of(bytes) {
            self.add(channel, note);
        } else if let Some((channel, note)) = midi::note_off_of(bytes) {
            self.remove(channel, note);
        }
    }

    /// Emits a note-off at `time` for every tracked note, channel then note
    /// ascending. Notes the sink refuses stay tracked so a later call can
    /// retry. Returns the number of note-offs delivered.
    pub fn resolve_notes<S: MidiSink + ?Sized>(&mut self, dest: &mut S, time: FrameTime) -> usize {
        let mut resolved = 0;
        for channel in 0..16u8 {
            let mut pending = self.on[channel as usize];
            while pending != 0 {
                let note = pending.trailing_zeros() as u8;
                pending &= pending - 1;
                if dest.push_event(time, EventType::Note, &midi::note_off(channel, note, 0)) {
                    self.remove(channel, note);
                    resolved += 1;
                }
            }
        }
        resolved
    }

    /// Forgets every note without emitting anything. Only for when no
    /// downstream synth state can exist (engine init), never mid-playback.
    #[inline]
    pub fn reset(&mut self) {
        self.on = [0; 16];
    }

    /// Tracked pairs, channel then note ascending.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.on.iter().enumerate().flat_map(|(channel, mask)| {
            let mask = *mask;
            (0..128u8)
                .filter(move |note| mask & (1u128 << note) != 0)
                .map(move |note| (channel as u8, note))
        })
    }
}

impl fmt::Debug for NoteTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
