//! Lock-free SPSC byte ring.
//!
//! Thin layer over `ringbuf`'s heap ring specialised for `u8`:
//! - capacity is rounded up to a power of two
//! - multi-part writes are published with a single write-cursor advance, so
//!   the consumer never observes half of a record
//! - `peek` copies without consuming; `advance_read` consumes
//!
//! Neither side blocks or allocates after construction. Overflow is reported
//! by returning `false`.

use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

const MIN_CAPACITY: usize = 16;

/// Split constructor: producer half for one thread, consumer half for another.
pub fn byte_ring(capacity: usize) -> (ByteRingWriter, ByteRingReader) {
    let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
    let (prod, cons) = HeapRb::<u8>::new(capacity).split();
    (ByteRingWriter { prod }, ByteRingReader { cons })
}

/// Producer half. Only this side moves the write cursor.
pub struct ByteRingWriter {
    prod: HeapProd<u8>,
}

impl ByteRingWriter {
    /// Returns `false`, writing nothing, if `bytes` does not fit.
    #[inline]
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        self.write_vectored(&[bytes])
    }

    /// Writes all `parts` back to back and publishes them together.
    /// Returns `false`, writing nothing, if they do not fit.
    pub fn write_vectored(&mut self, parts: &[&[u8]]) -> bool {
        let total: usize = parts.iter().map(|p| p.len()).sum();
        if total > self.prod.vacant_len() {
            return false;
        }

        let (head, tail) = self.prod.vacant_slices_mut();
        let mut slots = head.iter_mut().chain(tail.iter_mut());
        let mut written = 0;
        for part in parts {
            for (byte, slot) in part.iter().zip(slots.by_ref()) {
                slot.write(*byte);
                written += 1;
            }
        }
        debug_assert_eq!(written, total);

        // SAFETY: the first `total` vacant slots were initialised above and
        // `total <= vacant_len()`. Only this producer advances the write index.
        unsafe { self.prod.advance_write_index(total) };
        true
    }

    #[inline]
    pub fn write_space(&self) -> usize {
        self.prod.vacant_len()
    }

    #[inline]
    pub fn read_space(&self) -> usize {
        self.prod.occupied_len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.prod.capacity().get()
    }
}

/// Consumer half. Only this side moves the read cursor.
pub struct ByteRingReader {
    cons: HeapCons<u8>,
}

impl ByteRingReader {
    /// Copies the next `dest.len()` unread bytes without consuming them.
    #[inline]
    pub fn peek(&self, dest: &mut [u8]) -> bool {
        self.peek_at(0, dest)
    }

    /// Like [`peek`](Self::peek), starting `offset` bytes past the read cursor.
    pub fn peek_at(&self, offset: usize, dest: &mut [u8]) -> bool {
        let n = dest.len();
        if offset + n > self.cons.occupied_len() {
            return false;
        }

        let (head, tail) = self.cons.as_slices();
        if offset + n <= head.len() {
            dest.copy_from_slice(&head[offset..offset + n]);
        } else if offset >= head.len() {
            let start = offset - head.len();
            dest.copy_from_slice(&tail[start..start + n]);
        } else {
            let split = head.len() - offset;
            dest[..split].copy_from_slice(&head[offset..]);
            dest[split..].copy_from_slice(&tail[..n - split]);
        }
        true
    }

    /// Consumes `n` bytes the caller has already peeked.
    ///
    /// # Panics
    /// If fewer than `n` bytes are readable; that means the producer and
    /// consumer disagree about what is in the ring.
    #[inline]
    pub fn advance_read(&mut self, n: usize) {
        let available = self.cons.occupied_len();
        assert!(
            n <= available,
            "byte ring read cursor advanced past write cursor ({} > {})",
            n,
            available
        );
        self.cons.skip(n);
    }

    #[inline]
    pub fn read_space(&self) -> usize {
        self.cons.occupied_len()
    }

    #[inline]
    pub fn write_space(&self) -> usize {
        self.cons.vacant_len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cons.capacity().get()
    }
}

/// Both halves in one value, for single-thread use or deferred splitting.
pub struct ByteRing {
    writer: ByteRingWriter,
    reader: ByteRingReader,
}

impl ByteRing {
    pub fn new(capacity: usize) -> Self {
        let (writer, reader) = byte_ring(capacity);
        Self { writer, reader }
    }

    pub fn split(self) -> (ByteRingWriter, ByteRingReader) {
        (self.writer, self.reader)
    }

    #[inline]
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        self.writer.write(bytes)
    }

    #[inline]
    pub fn write_vectored(&mut self, parts: &[&[u8]]) -> bool {
        self.writer.write_vectored(parts)
    }

    #[inline]
    pub fn peek(&self, dest: &mut [u8]) -> bool {
        self.reader.peek(dest)
    }

    #[inline]
    pub fn advance_read(&mut self, n: usize) {
        self.reader.advance_read(n)
    }

    #[inline]
    pub fn read_space(&self) -> usize {
        self.reader.read_space()
    }

    #[inline]
    pub fn write_space(&self) -> usize {
        self.writer.write_space()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.writer.capacity()
    }
}
