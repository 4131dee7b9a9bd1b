//! Prefix codec shared by [`EventBuffer`](crate::EventBuffer) and the MIDI ring.
//!
//! Layout: `[time: u64][type: u32][size: u32]`, host byte order, no padding,
//! followed by `size` payload bytes.

use crate::midi::EventType;

/// Sample (or tick) position of an event.
pub type FrameTime = u64;

pub const TIME_SIZE: usize = std::mem::size_of::<FrameTime>();
pub const TYPE_SIZE: usize = std::mem::size_of::<u32>();
pub const SIZE_SIZE: usize = std::mem::size_of::<u32>();
pub const HEADER_SIZE: usize = TIME_SIZE + TYPE_SIZE + SIZE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    pub time: FrameTime,
    pub kind: EventType,
    pub size: u32,
}

impl EventHeader {
    #[inline]
    pub fn new(time: FrameTime, kind: EventType, size: u32) -> Self {
        Self { time, kind, size }
    }

    /// Total encoded length, prefix included.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.size as usize
    }

    #[inline]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        self.encode_into(&mut out);
        out
    }

    /// Writes the prefix into the first `HEADER_SIZE` bytes of `out`.
    #[inline]
    pub fn encode_into(&self, out: &mut [u8]) {
        out[..TIME_SIZE].copy_from_slice(&self.time.to_ne_bytes());
        out[TIME_SIZE..TIME_SIZE + TYPE_SIZE].copy_from_slice(&self.kind.to_u32().to_ne_bytes());
        out[TIME_SIZE + TYPE_SIZE..HEADER_SIZE].copy_from_slice(&self.size.to_ne_bytes());
    }

    /// Reads a prefix from the first `HEADER_SIZE` bytes of `bytes`.
    #[inline]
    pub fn decode(bytes: &[u8]) -> Self {
        let mut time = [0u8; TIME_SIZE];
        let mut kind = [0u8; TYPE_SIZE];
        let mut size = [0u8; SIZE_SIZE];
        time.copy_from_slice(&bytes[..TIME_SIZE]);
        kind.copy_from_slice(&bytes[TIME_SIZE..TIME_SIZE + TYPE_SIZE]);
        size.copy_from_slice(&bytes[TIME_SIZE + TYPE_SIZE..HEADER_SIZE]);
        Self {
            time: FrameTime::from_ne_bytes(time),
            kind: EventType::from_u32(u32::from_ne_bytes(kind)),
            size: u32::from_ne_bytes(size),
        }
    }
}
