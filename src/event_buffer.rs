//! Per-cycle encoded MIDI event buffer.
//!
//! A fixed-capacity byte arena holding `[prefix][payload]` records back to
//! back. Allocated once; `clear()` only resets the logical length, so the
//! audio thread can refill it every cycle without touching the allocator.

use std::fmt;

use midi_msg::{MidiMsg, ParseError};

use crate::encoding::{EventHeader, FrameTime, HEADER_SIZE};
use crate::midi::{self, EventType};
use crate::traits::MidiSink;

/// Operand shapes for [`EventBuffer::merge`].
///
/// The borrow checker already rules out passing the destination as an
/// operand, so the aliasing cases are spelled out as their own variants.
#[derive(Clone, Copy)]
pub enum Merge<'a> {
    /// The destination is the first operand: `dest = dest ++ other`.
    SelfFirst(&'a EventBuffer),
    /// The destination is the second operand: `dest = other ++ dest`.
    SelfSecond(&'a EventBuffer),
    /// `dest = a ++ b`; previous contents are discarded.
    Distinct(&'a EventBuffer, &'a EventBuffer),
}

pub struct EventBuffer {
    data: Box<[u8]>,
    /// Logical length in bytes. Invariant: `size <= data.len()`.
    size: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            size: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Logical length in bytes, prefixes included.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Walks the buffer, O(n).
    pub fn event_count(&self) -> usize {
        self.iter().count()
    }

    /// Resets the logical length. O(1), the arena is kept.
    #[inline]
    pub fn clear(&mut self) {
        self.size = 0;
    }

    #[inline]
    pub fn silence(&mut self) {
        self.clear();
    }

    /// Reserves room for one event and returns its payload region.
    ///
    /// The prefix is written with [`EventType::Unclassified`] and the buffer
    /// grows immediately. The caller must fill all `size` bytes before the
    /// next buffer operation; until then the region holds stale bytes and is
    /// still visited by [`iter`](Self::iter).
    #[inline]
    pub fn reserve(&mut self, time: FrameTime, size: usize) -> Option<&mut [u8]> {
        self.reserve_typed(time, EventType::Unclassified, size)
    }

    pub(crate) fn reserve_typed(
        &mut self,
        time: FrameTime,
        kind: EventType,
        size: usize,
    ) -> Option<&mut [u8]> {
        if size == 0 || size > u32::MAX as usize {
            return None;
        }
        let needed = HEADER_SIZE + size;
        if needed > self.remaining() {
            return None;
        }

        let start = self.size;
        let header = EventHeader::new(time, kind, size as u32);
        self.write_header(start, &header);
        self.size += needed;
        debug_assert!(self.size <= self.data.len());
        Some(&mut self.data[start + HEADER_SIZE..start + needed])
    }

    /// Appends a validated copy of `payload`. Malformed messages and
    /// insufficient capacity leave the buffer untouched.
    pub fn push(&mut self, time: FrameTime, kind: EventType, payload: &[u8]) -> bool {
        if !midi::is_valid_message(payload) {
            return false;
        }
        match self.reserve_typed(time, kind, payload.len()) {
            Some(slot) => {
                slot.copy_from_slice(payload);
                true
            }
            None => false,
        }
    }

    /// Inserts after every event whose time is `<= time`, keeping the buffer
    /// time-ordered when the existing contents already are.
    pub fn insert_event(&mut self, time: FrameTime, kind: EventType, payload: &[u8]) -> bool {
        if !midi::is_valid_message(payload) {
            return false;
        }
        let needed = HEADER_SIZE + payload.len();
        if payload.len() > u32::MAX as usize || needed > self.remaining() {
            return false;
        }

        let mut pos = self.size;
        let mut offset = 0;
        while offset < self.size {
            let header = self.header_at(offset);
            if header.time > time {
                pos = offset;
                break;
            }
            offset += header.encoded_len();
        }

        self.data.copy_within(pos..self.size, pos + needed);
        let header = EventHeader::new(time, kind, payload.len() as u32);
        self.write_header(pos, &header);
        self.data[pos + HEADER_SIZE..pos + needed].copy_from_slice(payload);
        self.size += needed;
        true
    }

    /// Concatenates buffer contents into `self`. Returns `false`, with
    /// `self` unchanged, if the result would not fit.
    pub fn merge(&mut self, operands: Merge<'_>) -> bool {
        match operands {
            Merge::SelfFirst(other) => {
                let len = other.size;
                if len > self.remaining() {
                    return false;
                }
                self.data[self.size..self.size + len].copy_from_slice(other.as_bytes());
                self.size += len;
                true
            }
            Merge::SelfSecond(other) => {
                let len = other.size;
                if len > self.remaining() {
                    return false;
                }
                self.data.copy_within(0..self.size, len);
                self.data[..len].copy_from_slice(other.as_bytes());
                self.size += len;
                true
            }
            Merge::Distinct(a, b) => {
                let total = a.size + b.size;
                if total > self.capacity() {
                    return false;
                }
                self.data[..a.size].copy_from_slice(a.as_bytes());
                self.data[a.size..total].copy_from_slice(b.as_bytes());
                self.size = total;
                true
            }
        }
    }

    /// Time of the last stored event.
    pub fn last_time(&self) -> Option<FrameTime> {
        self.iter().last().map(|ev| ev.time)
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            data: &self.data[..self.size],
            offset: 0,
        }
    }

    /// Encoded contents, prefixes included.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.size]
    }

    #[inline]
    fn write_header(&mut self, offset: usize, header: &EventHeader) {
        header.encode_into(&mut self.data[offset..offset + HEADER_SIZE]);
    }

    #[inline]
    fn header_at(&self, offset: usize) -> EventHeader {
        decode_header(&self.data[..self.size], offset)
    }
}

#[inline]
fn decode_header(data: &[u8], offset: usize) -> EventHeader {
    EventHeader::decode(&data[offset..offset + HEADER_SIZE])
}

impl MidiSink for EventBuffer {
    #[inline]
    fn push_event(&mut self, time: FrameTime, kind: EventType, payload: &[u8]) -> bool {
        self.push(time, kind, payload)
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = EventView<'a>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for EventBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBuffer")
            .field("capacity", &self.capacity())
            .field("size", &self.size)
            .field("events", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

/// Borrowed view of one stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventView<'a> {
    pub time: FrameTime,
    pub kind: EventType,
    pub payload: &'a [u8],
}

impl<'a> EventView<'a> {
    #[inline]
    pub fn status(&self) -> u8 {
        self.payload.first().copied().unwrap_or(0)
    }

    /// Channel of a channel-voice message.
    #[inline]
    pub fn channel(&self) -> Option<u8> {
        let status = self.status();
        midi::is_channel_voice(status).then(|| midi::channel_of(status))
    }

    /// Parses the payload. Allocates for sysex; not for the audio thread.
    pub fn decode(&self) -> Result<MidiMsg, ParseError> {
        MidiMsg::from_midi(self.payload).map(|(msg, _len)| msg)
    }
}

/// Forward iterator over an [`EventBuffer`]. Restart by calling `iter()` again.
#[derive(Clone)]
pub struct Iter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = EventView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + HEADER_SIZE > self.data.len() {
            debug_assert_eq!(self.offset, self.data.len(), "truncated event prefix");
            return None;
        }
        let header = decode_header(self.data, self.offset);
        let start = self.offset + HEADER_SIZE;
        let end = start + header.size as usize;
        debug_assert!(end <= self.data.len(), "event payload past logical end");
        self.offset = end;
        Some(EventView {
            time: header.time,
            kind: header.kind,
            payload: &self.data[start..end],
        })
    }
}
