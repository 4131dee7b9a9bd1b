//! Event-framed MIDI transport over a [`byte_ring`](crate::byte_ring).
//!
//! - Writer (producer thread): validates, classifies and encodes
//!   `[prefix][payload]` records, published atomically.
//! - Reader (consumer thread): extracts the records inside a time window into
//!   an [`EventBuffer`], remapping timestamps, applying the channel policy and
//!   feeding note-on/off into a [`NoteTracker`].
//!
//! Neither side blocks or allocates.

use std::fmt;
use std::sync::Arc;

use crate::byte_ring::{byte_ring, ByteRingReader, ByteRingWriter};
use crate::channel::{ChannelPolicy, SharedChannelPolicy};
use crate::encoding::{EventHeader, FrameTime, HEADER_SIZE};
use crate::event_buffer::EventBuffer;
use crate::midi::{self, Classify, EventType, StandardClassifier};
use crate::note_tracker::NoteTracker;
use crate::stats::{TransportStats, TransportStatsSnapshot};
use crate::traits::MidiSink;

/// Split constructor with the standard status-byte classifier.
pub fn midi_ring(capacity: usize) -> (MidiRingWriter, MidiRingReader) {
    midi_ring_with_classifier(capacity, StandardClassifier)
}

pub fn midi_ring_with_classifier<C: Classify>(
    capacity: usize,
    classifier: C,
) -> (MidiRingWriter<C>, MidiRingReader) {
    let (ring_writer, ring_reader) = byte_ring(capacity);
    let stats = Arc::new(TransportStats::new());
    (
        MidiRingWriter {
            ring: ring_writer,
            classifier,
            stats: Arc::clone(&stats),
        },
        MidiRingReader {
            ring: ring_reader,
            tracker: NoteTracker::new(),
            policy: Arc::new(SharedChannelPolicy::default()),
            stats,
        },
    )
}

/// Producer half.
pub struct MidiRingWriter<C = StandardClassifier> {
    ring: ByteRingWriter,
    classifier: C,
    stats: Arc<TransportStats>,
}

impl<C: Classify> MidiRingWriter<C> {
    /// Validates, classifies and enqueues one message. Returns `false` for
    /// malformed payloads and when the ring lacks room for the whole record;
    /// the ring is untouched in both cases.
    #[inline]
    pub fn write_event(&mut self, time: FrameTime, payload: &[u8]) -> bool {
        if !midi::is_valid_message(payload) {
            self.stats.record_malformed();
            return false;
        }
        let kind = self.classifier.classify(payload[0]);
        self.write_encoded(time, kind, payload)
    }

    /// Like [`write_event`](Self::write_event) with a caller-chosen type tag.
    pub fn write_typed(&mut self, time: FrameTime, kind: EventType, payload: &[u8]) -> bool {
        if !midi::is_valid_message(payload) {
            self.stats.record_malformed();
            return false;
        }
        self.write_encoded(time, kind, payload)
    }

    fn write_encoded(&mut self, time: FrameTime, kind: EventType, payload: &[u8]) -> bool {
        let Ok(size) = u32::try_from(payload.len()) else {
            self.stats.record_write_overflow();
            return false;
        };
        let prefix = EventHeader::new(time, kind, size).encode();
        if self.ring.write_vectored(&[&prefix[..], payload]) {
            self.stats.record_written();
            true
        } else {
            self.stats.record_write_overflow();
            false
        }
    }

    #[inline]
    pub fn write_space(&self) -> usize {
        self.ring.write_space()
    }

    #[inline]
    pub fn read_space(&self) -> usize {
        self.ring.read_space()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn stats(&self) -> TransportStatsSnapshot {
        self.stats.snapshot()
    }
}

impl<C> fmt::Debug for MidiRingWriter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiRingWriter")
            .field("capacity", &self.ring.capacity())
            .field("write_space", &self.ring.write_space())
            .finish()
    }
}

/// Consumer half. Owns the note tracker for the events it delivers.
pub struct MidiRingReader {
    ring: ByteRingReader,
    tracker: NoteTracker,
    policy: Arc<SharedChannelPolicy>,
    stats: Arc<TransportStats>,
}

impl MidiRingReader {
    /// Prefix of the next unread record.
    ///
    /// # Panics
    /// If a partial record is visible; writes are published whole, so that
    /// means the cursors are corrupted.
    pub fn peek_header(&self) -> Option<EventHeader> {
        let available = self.ring.read_space();
        if available == 0 {
            return None;
        }
        let mut prefix = [0u8; HEADER_SIZE];
        if !self.ring.peek(&mut prefix) {
            panic!(
                "MIDI ring corrupted: {} readable bytes cannot hold an event prefix",
                available
            );
        }
        let header = EventHeader::decode(&prefix);
        let payload_space = available - HEADER_SIZE;
        if header.size == 0 || header.size as usize > payload_space {
            panic!(
                "MIDI ring corrupted: event declares {} payload bytes, {} readable",
                header.size, payload_space
            );
        }
        Some(header)
    }

    /// Moves events with `start <= time < end` into `dest`.
    ///
    /// Stops, leaving the event unread, at the first event outside the
    /// window (either side). Delivered times become `time - start + offset`.
    /// Channel-voice events are filtered or re-channelled per the current
    /// [`ChannelPolicy`]; filtered events are consumed. When `dest` is full
    /// the event stays in the ring if `stop_on_dest_overflow`, otherwise it
    /// is consumed, dropped and counted.
    ///
    /// Returns the number of events written to `dest`.
    pub fn read(
        &mut self,
        dest: &mut EventBuffer,
        start: FrameTime,
        end: FrameTime,
        offset: FrameTime,
        stop_on_dest_overflow: bool,
    ) -> usize {
        let policy = self.policy.load();
        let mut delivered = 0;

        while let Some(header) = self.peek_header() {
            if header.time >= end || header.time < start {
                break;
            }

            let mut status = [0u8; 1];
            self.ring.peek_at(HEADER_SIZE, &mut status);
            let Some(status) = policy.apply(status[0]) else {
                self.ring.advance_read(header.encoded_len());
                self.stats.record_filtered();
                continue;
            };

            let time = (header.time - start).saturating_add(offset);
            match dest.reserve_typed(time, header.kind, header.size as usize) {
                Some(slot) => {
                    self.ring.peek_at(HEADER_SIZE, slot);
                    slot[0] = status;
                    self.tracker.track(slot);
                    self.ring.advance_read(header.encoded_len());
                    delivered += 1;
                }
                None if stop_on_dest_overflow => break,
                None => {
                    self.ring.advance_read(header.encoded_len());
                    self.stats.record_dest_overflow();
                }
            }
        }

        self.stats.record_delivered(delivered);
        delivered
    }

    /// Discards every event with `time < end` without copying it anywhere.
    /// Returns the number discarded.
    pub fn flush(&mut self, end: FrameTime) -> usize {
        let mut flushed = 0;
        while let Some(header) = self.peek_header() {
            if header.time >= end {
                break;
            }
            self.ring.advance_read(header.encoded_len());
            flushed += 1;
        }
        self.stats.record_flushed(flushed);
        flushed
    }

    #[inline]
    pub fn reset_note_tracking(&mut self) {
        self.tracker.reset();
    }

    /// Note-offs at `time` for every note this reader delivered an
    /// unmatched note-on for.
    #[inline]
    pub fn resolve_notes_into<S: MidiSink + ?Sized>(
        &mut self,
        dest: &mut S,
        time: FrameTime,
    ) -> usize {
        self.tracker.resolve_notes(dest, time)
    }

    #[inline]
    pub fn note_tracker(&self) -> &NoteTracker {
        &self.tracker
    }

    #[inline]
    pub fn channel_policy(&self) -> ChannelPolicy {
        self.policy.load()
    }

    #[inline]
    pub fn set_channel_policy(&self, policy: ChannelPolicy) {
        self.policy.store(policy);
    }

    /// Handle another thread can use to change the policy while this reader
    /// runs on the audio thread.
    pub fn shared_channel_policy(&self) -> Arc<SharedChannelPolicy> {
        Arc::clone(&self.policy)
    }

    #[inline]
    pub fn read_space(&self) -> usize {
        self.ring.read_space()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.read_space() == 0
    }

    pub fn stats(&self) -> TransportStatsSnapshot {
        self.stats.snapshot()
    }

    /// Counter handle that stays readable after the reader moves to the
    /// audio thread.
    pub fn stats_handle(&self) -> Arc<TransportStats> {
        Arc::clone(&self.stats)
    }
}

impl fmt::Debug for MidiRingReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiRingReader")
            .field("read_space", &self.ring.read_space())
            .field("policy", &self.policy.load())
            .field("active_notes", &self.tracker)
            .finish()
    }
}

/// Both halves together, for single-thread use or deferred splitting.
#[derive(Debug)]
pub struct MidiRing<C = StandardClassifier> {
    writer: MidiRingWriter<C>,
    reader: MidiRingReader,
}

impl MidiRing<StandardClassifier> {
    pub fn new(capacity: usize) -> Self {
        Self::with_classifier(capacity, StandardClassifier)
    }
}

impl<C: Classify> MidiRing<C> {
    pub fn with_classifier(capacity: usize, classifier: C) -> Self {
        let (writer, reader) = midi_ring_with_classifier(capacity, classifier);
        Self { writer, reader }
    }

    pub fn split(self) -> (MidiRingWriter<C>, MidiRingReader) {
        (self.writer, self.reader)
    }

    #[inline]
    pub fn write_event(&mut self, time: FrameTime, payload: &[u8]) -> bool {
        self.writer.write_event(time, payload)
    }

    #[inline]
    pub fn read(
        &mut self,
        dest: &mut EventBuffer,
        start: FrameTime,
        end: FrameTime,
        offset: FrameTime,
        stop_on_dest_overflow: bool,
    ) -> usize {
        self.reader
            .read(dest, start, end, offset, stop_on_dest_overflow)
    }

    #[inline]
    pub fn flush(&mut self, end: FrameTime) -> usize {
        self.reader.flush(end)
    }

    #[inline]
    pub fn reset_note_tracking(&mut self) {
        self.reader.reset_note_tracking()
    }

    #[inline]
    pub fn resolve_notes_into<S: MidiSink + ?Sized>(
        &mut self,
        dest: &mut S,
        time: FrameTime,
    ) -> usize {
        self.reader.resolve_notes_into(dest, time)
    }

    #[inline]
    pub fn set_channel_policy(&self, policy: ChannelPolicy) {
        self.reader.set_channel_policy(policy)
    }

    #[inline]
    pub fn note_tracker(&self) -> &NoteTracker {
        self.reader.note_tracker()
    }

    #[inline]
    pub fn read_space(&self) -> usize {
        self.reader.read_space()
    }

    #[inline]
    pub fn write_space(&self) -> usize {
        self.writer.write_space()
    }

    pub fn stats(&self) -> TransportStatsSnapshot {
        self.reader.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{control_change, note_off, note_on};

    const NOTE_RECORD: usize = HEADER_SIZE + 3;

    fn ring_with_notes(times: &[FrameTime]) -> MidiRing {
        let mut ring = MidiRing::new(1024);
        for (i, &t) in times.iter().enumerate() {
            assert!(ring.write_event(t, &control_change(0, i as u8, 0)));
        }
        ring
    }

    fn times(buf: &EventBuffer) -> Vec<FrameTime> {
        buf.iter().map(|ev| ev.time).collect()
    }

    #[test]
    fn test_window_is_inclusive_start_exclusive_end() {
        let mut ring = ring_with_notes(&[5, 10, 15, 20]);
        let mut dest = EventBuffer::new(256);

        // 5 is before the window: nothing is read
        assert_eq!(ring.read(&mut dest, 10, 20, 0, false), 0);
        assert_eq!(ring.flush(10), 1);

        assert_eq!(ring.read(&mut dest, 10, 20, 0, false), 2);
        assert_eq!(times(&dest), vec![0, 5]);
        assert_eq!(ring.read_space(), NOTE_RECORD);
        assert_eq!(ring.reader.peek_header().unwrap().time, 20);
    }

    #[test]
    fn test_offset_remap() {
        let mut ring = ring_with_notes(&[12]);
        let mut dest = EventBuffer::new(64);
        assert_eq!(ring.read(&mut dest, 10, 20, 100, false), 1);
        assert_eq!(times(&dest), vec![102]);
    }

    #[test]
    fn test_event_before_start_is_left_unread() {
        let mut ring = ring_with_notes(&[5]);
        let mut dest = EventBuffer::new(64);
        assert_eq!(ring.read(&mut dest, 10, 20, 0, false), 0);
        assert_eq!(ring.read_space(), NOTE_RECORD);
        assert!(dest.is_empty());
    }

    #[test]
    fn test_payload_and_type_preserved() {
        let mut ring = MidiRing::new(256);
        let sysex = [0xF0, 0x43, 0x10, 0x4C, 0x00, 0x00, 0x7E, 0x00, 0xF7];
        ring.write_event(0, &sysex);
        ring.write_event(1, &control_change(4, 74, 10));

        let mut dest = EventBuffer::new(256);
        assert_eq!(ring.read(&mut dest, 0, FrameTime::MAX, 0, false), 2);
        let events: Vec<_> = dest.iter().collect();
        assert_eq!(events[0].payload, &sysex);
        assert_eq!(events[0].kind, EventType::Sysex);
        assert_eq!(events[1].kind, EventType::Controller);
        assert!(ring.reader.is_empty());
    }

    #[test]
    fn test_write_rejects_malformed() {
        let mut ring = MidiRing::new(256);
        assert!(!ring.write_event(0, &[0x90, 60]));
        assert!(!ring.write_event(0, &[]));
        assert_eq!(ring.read_space(), 0);
        assert_eq!(ring.stats().malformed_rejected, 2);
    }

    #[test]
    fn test_overflow_leaves_ring_untouched() {
        let mut ring = MidiRing::new(64);
        let mut written = 0;
        while ring.write_space() >= NOTE_RECORD {
            assert!(ring.write_event(written, &note_on(0, 60, 100)));
            written += 1;
        }
        let before = ring.read_space();
        assert!(!ring.write_event(written, &note_on(0, 61, 100)));
        assert_eq!(ring.read_space(), before);
        assert_eq!(ring.stats().write_overflows, 1);

        let mut dest = EventBuffer::new(1024);
        assert_eq!(
            ring.read(&mut dest, 0, FrameTime::MAX, 0, false) as u64,
            written
        );
    }

    #[test]
    fn test_channel_filter_consumes_but_drops() {
        let mut ring = MidiRing::new(256);
        ring.set_channel_policy(ChannelPolicy::only(0));
        ring.write_event(0, &note_on(1, 60, 100));
        ring.write_event(1, &note_on(0, 62, 100));

        let mut dest = EventBuffer::new(256);
        assert_eq!(ring.read(&mut dest, 0, 100, 0, false), 1);
        assert_eq!(dest.iter().next().unwrap().payload, &note_on(0, 62, 100));
        assert_eq!(ring.read_space(), 0);
        assert_eq!(ring.stats().filtered, 1);
        assert!(!ring.note_tracker().is_active(1, 60));
    }

    #[test]
    fn test_channel_force_rewrites_status() {
        let mut ring = MidiRing::new(256);
        ring.set_channel_policy(ChannelPolicy::Force(5));
        ring.write_event(0, &note_on(0, 60, 100));
        ring.write_event(1, &[0xF8]);

        let mut dest = EventBuffer::new(256);
        ring.read(&mut dest, 0, 100, 0, false);
        let events: Vec<_> = dest.iter().collect();
        assert_eq!(events[0].payload, &note_on(5, 60, 100));
        assert_eq!(events[1].payload, &[0xF8]);
        assert!(ring.note_tracker().is_active(5, 60));
    }

    #[test]
    fn test_policy_change_from_shared_handle() {
        let mut ring = MidiRing::new(256);
        let handle = ring.reader.shared_channel_policy();
        handle.store(ChannelPolicy::Filter(0));
        ring.write_event(0, &note_on(3, 60, 100));

        let mut dest = EventBuffer::new(64);
        assert_eq!(ring.read(&mut dest, 0, 10, 0, false), 0);
        assert_eq!(ring.reader.channel_policy(), ChannelPolicy::Filter(0));
    }

    #[test]
    fn test_stop_on_dest_overflow_resumes() {
        let mut ring = ring_with_notes(&[0, 1, 2, 3, 4]);
        let mut dest = EventBuffer::new(2 * NOTE_RECORD);

        assert_eq!(ring.read(&mut dest, 0, 100, 0, true), 2);
        assert_eq!(ring.read_space(), 3 * NOTE_RECORD);

        dest.clear();
        assert_eq!(ring.read(&mut dest, 0, 100, 0, true), 2);
        assert_eq!(times(&dest), vec![2, 3]);
        assert_eq!(ring.stats().dest_overflow_drops, 0);
    }

    #[test]
    fn test_drop_and_continue_on_dest_overflow() {
        let mut ring = ring_with_notes(&[0, 1, 2, 3, 4]);
        let mut dest = EventBuffer::new(2 * NOTE_RECORD);

        assert_eq!(ring.read(&mut dest, 0, 100, 0, false), 2);
        assert_eq!(ring.read_space(), 0);
        assert_eq!(ring.stats().dest_overflow_drops, 3);
        assert_eq!(ring.stats().events_delivered, 2);
    }

    #[test]
    fn test_note_tracking_and_resolution() {
        let mut ring = MidiRing::new(256);
        ring.write_event(0, &note_on(0, 60, 100));
        ring.write_event(1, &note_on(0, 64, 100));
        ring.write_event(2, &note_off(0, 60, 0));

        let mut dest = EventBuffer::new(256);
        ring.read(&mut dest, 0, 10, 0, false);
        assert!(ring.note_tracker().is_active(0, 64));
        assert_eq!(ring.note_tracker().len(), 1);

        let mut offs = EventBuffer::new(64);
        assert_eq!(ring.resolve_notes_into(&mut offs, 10), 1);
        assert_eq!(ring.resolve_notes_into(&mut offs, 10), 0);
        assert_eq!(offs.iter().next().unwrap().payload, &note_off(0, 64, 0));
    }

    #[test]
    fn test_reset_note_tracking() {
        let mut ring = MidiRing::new(256);
        ring.write_event(0, &note_on(0, 60, 100));
        let mut dest = EventBuffer::new(64);
        ring.read(&mut dest, 0, 10, 0, false);

        ring.reset_note_tracking();
        let mut offs = EventBuffer::new(64);
        assert_eq!(ring.resolve_notes_into(&mut offs, 0), 0);
    }

    #[test]
    fn test_flush_discards_stale_events() {
        let mut ring = ring_with_notes(&[1, 2, 50, 60]);
        assert_eq!(ring.flush(50), 2);
        assert_eq!(ring.stats().flushed, 2);

        let mut dest = EventBuffer::new(256);
        assert_eq!(ring.read(&mut dest, 50, 100, 0, false), 2);
    }

    #[test]
    fn test_write_typed_keeps_caller_tag() {
        let (mut writer, mut reader) = midi_ring(256);
        assert!(writer.write_typed(0, EventType::SystemCommon, &crate::midi::all_notes_off(2)));
        assert!(!writer.write_typed(1, EventType::Note, &[0x90]));
        assert_eq!(writer.stats().malformed_rejected, 1);

        let mut dest = EventBuffer::new(64);
        assert_eq!(reader.read(&mut dest, 0, 10, 0, false), 1);
        let ev = dest.iter().next().unwrap();
        assert_eq!(ev.kind, EventType::SystemCommon);
        assert_eq!(ev.payload, &[0xB2, 0x7B, 0x00]);
    }

    #[test]
    fn test_custom_classifier() {
        let mut ring = MidiRing::with_classifier(256, |_status: u8| EventType::Realtime);
        ring.write_event(0, &note_on(0, 60, 100));

        let mut dest = EventBuffer::new(64);
        ring.read(&mut dest, 0, 10, 0, false);
        assert_eq!(dest.iter().next().unwrap().kind, EventType::Realtime);
    }

    #[test]
    fn test_records_wrap_around_ring_end() {
        let mut ring = MidiRing::new(64);
        let mut dest = EventBuffer::new(1024);
        for cycle in 0..20u64 {
            assert!(ring.write_event(cycle, &note_on(0, (cycle % 128) as u8, 1)));
            assert!(ring.write_event(cycle, &[0xF0, 1, 2, 3, 4, 5, 0xF7]));
            assert_eq!(ring.read(&mut dest, cycle, cycle + 1, 0, false), 2);
        }
        assert_eq!(dest.event_count(), 40);
        assert!(dest
            .iter()
            .filter(|ev| ev.kind == EventType::Sysex)
            .all(|ev| ev.payload == [0xF0, 1, 2, 3, 4, 5, 0xF7]));
    }

    #[test]
    #[should_panic(expected = "MIDI ring corrupted")]
    fn test_truncated_record_is_fatal() {
        let (mut bytes, reader) = byte_ring(64);
        let prefix = EventHeader::new(0, EventType::Note, 40).encode();
        bytes.write_vectored(&[&prefix[..], &[0x90, 60, 100]]);

        let mut reader = MidiRingReader {
            ring: reader,
            tracker: NoteTracker::new(),
            policy: Arc::new(SharedChannelPolicy::default()),
            stats: Arc::new(TransportStats::new()),
        };
        let mut dest = EventBuffer::new(64);
        reader.read(&mut dest, 0, 10, 0, false);
    }
}
