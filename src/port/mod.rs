//! MIDI port wrapper.
//!
//! A port owns an input ring (driver source -> audio thread) and/or an output
//! side (non-realtime FIFO + per-cycle output buffer -> driver sink), and
//! brackets each audio cycle with [`MidiPort::cycle_start`] /
//! [`MidiPort::cycle_end`].
//!
//! State machine: `Closed -> Idle -> (Active <-> Idle) -> Closed`.

mod cycle;

pub use cycle::{Cycle, ExecutionContext};

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelPolicy, SharedChannelPolicy};
use crate::config::PortConfig;
use crate::encoding::{FrameTime, HEADER_SIZE};
use crate::event_buffer::EventBuffer;
use crate::midi_ring::{midi_ring, MidiRingReader, MidiRingWriter};
use crate::stats::{TransportStats, TransportStatsSnapshot};
use crate::traits::{MidiSink, MidiSource};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
    Duplex,
}

impl PortDirection {
    #[inline]
    pub fn has_input(self) -> bool {
        matches!(self, Self::Input | Self::Duplex)
    }

    #[inline]
    pub fn has_output(self) -> bool {
        matches!(self, Self::Output | Self::Duplex)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PortState {
    Closed = 0,
    /// Open, between cycles.
    Idle = 1,
    /// Open, inside `cycle_start`..`cycle_end`.
    Active = 2,
}

impl PortState {
    #[inline]
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Idle,
            2 => Self::Active,
            _ => Self::Closed,
        }
    }
}

/// Point-in-time port counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStats {
    pub input: TransportStatsSnapshot,
    pub fifo: TransportStatsSnapshot,
    /// Realtime writes refused because the output buffer was full.
    pub output_overflows: u64,
    /// Output events the driver sink refused at `cycle_end`.
    pub sink_refusals: u64,
    pub cycles: u64,
}

/// Audio-thread-only state. Reached only through a [`Cycle`].
struct RtState {
    input: Option<InputSide>,
    output: Option<OutputSide>,
    /// Absolute frame of the current cycle's first frame.
    origin: FrameTime,
}

struct InputSide {
    writer: MidiRingWriter,
    reader: MidiRingReader,
}

struct OutputSide {
    fifo: MidiRingReader,
    buffer: EventBuffer,
}

/// Everything `open` allocates and `close` releases.
struct PortBuffers {
    rt: UnsafeCell<RtState>,
    /// Producer half of the non-realtime FIFO until
    /// [`MidiPort::take_writer`] hands it out.
    fifo_writer: Option<MidiRingWriter>,
    input_policy: Option<Arc<SharedChannelPolicy>>,
    input_stats: Option<Arc<TransportStats>>,
    fifo_stats: Option<Arc<TransportStats>>,
}

impl PortBuffers {
    fn allocate(config: &PortConfig) -> Self {
        let input = config.direction.has_input().then(|| {
            let (writer, reader) = midi_ring(config.input_capacity);
            reader.set_channel_policy(config.channel_policy);
            InputSide { writer, reader }
        });
        let (fifo_writer, output) = if config.direction.has_output() {
            let (writer, reader) = midi_ring(config.fifo_capacity);
            let side = OutputSide {
                fifo: reader,
                buffer: EventBuffer::new(config.output_capacity),
            };
            (Some(writer), Some(side))
        } else {
            (None, None)
        };

        Self {
            input_policy: input.as_ref().map(|i| i.reader.shared_channel_policy()),
            input_stats: input.as_ref().map(|i| i.reader.stats_handle()),
            fifo_stats: output.as_ref().map(|o| o.fifo.stats_handle()),
            fifo_writer,
            rt: UnsafeCell::new(RtState {
                input,
                output,
                origin: 0,
            }),
        }
    }
}

/// Producer half of a port's non-realtime FIFO.
///
/// Each open port has exactly one, taken with [`MidiPort::take_writer`] by
/// the thread that sends outside the audio cycle. Pass it to
/// [`MidiPort::write`] as [`ExecutionContext::NonRealtime`].
pub struct PortWriter {
    ring: MidiRingWriter,
    fifo_stats: Arc<TransportStats>,
}

impl PortWriter {
    /// Free FIFO bytes. A message of `n` bytes fits when
    /// `write_space() >= HEADER_SIZE + n`.
    #[inline]
    pub fn write_space(&self) -> usize {
        self.ring.write_space()
    }

    pub fn stats(&self) -> TransportStatsSnapshot {
        self.fifo_stats.snapshot()
    }
}

impl fmt::Debug for PortWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortWriter")
            .field("write_space", &self.ring.write_space())
            .finish()
    }
}

pub struct MidiPort {
    config: PortConfig,
    state: AtomicU8,
    buffers: Option<PortBuffers>,
    output_overflows: AtomicU64,
    sink_refusals: AtomicU64,
    cycles: AtomicU64,
}

// SAFETY: `PortBuffers::rt` is only dereferenced by the holder of a `Cycle`,
// and `cycle_start` hands out at most one `Cycle` at a time (Idle -> Active
// compare-exchange, released by `Cycle::drop`). Every other field is atomic
// or only touched through `&mut self`.
unsafe impl Sync for MidiPort {}

impl MidiPort {
    /// Creates a closed port. Nothing is allocated until [`open`](Self::open).
    pub fn new(config: PortConfig) -> Self {
        Self {
            config,
            state: AtomicU8::new(PortState::Closed as u8),
            buffers: None,
            output_overflows: AtomicU64::new(0),
            sink_refusals: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn direction(&self) -> PortDirection {
        self.config.direction
    }

    #[inline]
    pub fn state(&self) -> PortState {
        PortState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state() != PortState::Closed
    }

    /// Validates the config and allocates every ring and buffer.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::PortAlreadyOpen(self.config.name.clone()));
        }
        if let Err(e) = self.config.validate() {
            tracing::warn!("MIDI port '{}' rejected config: {}", self.config.name, e);
            return Err(e);
        }

        self.buffers = Some(PortBuffers::allocate(&self.config));
        self.output_overflows.store(0, Ordering::Relaxed);
        self.sink_refusals.store(0, Ordering::Relaxed);
        self.cycles.store(0, Ordering::Relaxed);
        self.state.store(PortState::Idle as u8, Ordering::Release);

        tracing::debug!(
            "Opened MIDI port '{}' ({:?}, input={}B output={}B fifo={}B)",
            self.config.name,
            self.config.direction,
            self.config.input_capacity,
            self.config.output_capacity,
            self.config.fifo_capacity
        );
        Ok(())
    }

    /// Hands out the FIFO producer. Returns `None` on closed or input-only
    /// ports and once the writer for this open has already been taken.
    /// Writers from a previous open are refused by [`write`](Self::write).
    pub fn take_writer(&mut self) -> Option<PortWriter> {
        let buffers = self.buffers.as_mut()?;
        let ring = buffers.fifo_writer.take()?;
        let fifo_stats = Arc::clone(buffers.fifo_stats.as_ref()?);
        Some(PortWriter { ring, fifo_stats })
    }

    /// Releases every ring and buffer. Undelivered events are dropped.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::PortClosed(self.config.name.clone()));
        }
        self.state.store(PortState::Closed as u8, Ordering::Release);
        self.buffers = None;
        tracing::debug!("Closed MIDI port '{}'", self.config.name);
        Ok(())
    }

    /// Begins a cycle of `nframes` frames.
    ///
    /// Output: clears last cycle's output buffer, then drains the FIFO into it
    /// in arrival order (everything at frame 0). Input: pulls every event
    /// `source` has into the input ring, clamping offsets into
    /// `[0, nframes)`.
    ///
    /// # RT-Safety
    /// Lock-free and allocation-free.
    pub fn cycle_start<S: MidiSource + ?Sized>(
        &self,
        nframes: u32,
        source: &mut S,
    ) -> Result<Cycle<'_>> {
        let buffers = self.acquire_cycle()?;

        // SAFETY: the Idle -> Active transition above succeeded, so no other
        // `Cycle` exists until this one is dropped.
        let rt = unsafe { &mut *buffers.rt.get() };

        if let Some(output) = rt.output.as_mut() {
            output.buffer.clear();
            output
                .fifo
                .read(&mut output.buffer, 0, FrameTime::MAX, 0, true);
        }

        if let Some(input) = rt.input.as_mut() {
            let last = nframes.saturating_sub(1);
            while let Some((offset, bytes)) = source.next_event(nframes) {
                let time = rt.origin + offset.min(last) as FrameTime;
                input.writer.write_event(time, bytes);
            }
        }

        Ok(Cycle::new(self, rt, nframes))
    }

    fn acquire_cycle(&self) -> Result<&PortBuffers> {
        let buffers = self
            .buffers
            .as_ref()
            .ok_or_else(|| Error::PortClosed(self.config.name.clone()))?;
        match self.state.compare_exchange(
            PortState::Idle as u8,
            PortState::Active as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(buffers),
            Err(state) => Err(Error::CycleInProgress {
                name: self.config.name.clone(),
                state: PortState::from_u8(state),
            }),
        }
    }

    /// Hands this cycle's output buffer to the driver and returns the port
    /// to Idle. Returns the number of events the sink accepted.
    pub fn cycle_end<S: MidiSink + ?Sized>(&self, cycle: Cycle<'_>, sink: &mut S) -> usize {
        let (delivered, refused) = cycle.deliver(sink);
        if refused > 0 {
            self.sink_refusals
                .fetch_add(refused as u64, Ordering::Relaxed);
        }
        delivered
    }

    #[inline]
    pub(crate) fn record_output_overflow(&self) {
        self.output_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn finish_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.state.store(PortState::Idle as u8, Ordering::Release);
    }

    /// Writes one outgoing message.
    ///
    /// - `Realtime(cycle)`: into the current cycle's output buffer at frame
    ///   `timestamp`, which must be `< nframes`.
    /// - `NonRealtime(writer)`: into the FIFO; the event is delivered at
    ///   frame 0 of the next cycle and `timestamp` is ignored. Fails only
    ///   when the payload is malformed or the FIFO lacks room, and both are
    ///   counted in [`PortStats::fifo`].
    ///
    /// Cycles and writers belonging to another port (or an earlier open of
    /// this one) are refused.
    pub fn write(&self, ctx: ExecutionContext<'_, '_>, timestamp: u32, payload: &[u8]) -> bool {
        match ctx {
            ExecutionContext::Realtime(cycle) => {
                cycle.belongs_to(self) && cycle.write(timestamp, payload)
            }
            ExecutionContext::NonRealtime(writer) => self.write_fifo(writer, payload),
        }
    }

    fn write_fifo(&self, writer: &mut PortWriter, payload: &[u8]) -> bool {
        let owned = self
            .buffers
            .as_ref()
            .and_then(|b| b.fifo_stats.as_ref())
            .is_some_and(|stats| Arc::ptr_eq(stats, &writer.fifo_stats));
        if !owned {
            return false;
        }
        let written = writer.ring.write_event(0, payload);
        if !written && writer.ring.write_space() < HEADER_SIZE + payload.len() {
            tracing::warn!("MIDI port '{}' FIFO full, dropping event", self.config.name);
        }
        written
    }

    /// Changes the input channel policy; safe while cycles are running.
    pub fn set_channel_policy(&self, policy: ChannelPolicy) -> Result<()> {
        let buffers = self
            .buffers
            .as_ref()
            .ok_or_else(|| Error::PortClosed(self.config.name.clone()))?;
        let shared = buffers
            .input_policy
            .as_ref()
            .ok_or_else(|| Error::WrongDirection {
                name: self.config.name.clone(),
                required: PortDirection::Input,
            })?;
        shared.store(policy);
        Ok(())
    }

    pub fn stats(&self) -> PortStats {
        let snapshot = |stats: Option<&Arc<TransportStats>>| {
            stats.map(|s| s.snapshot()).unwrap_or_default()
        };
        let buffers = self.buffers.as_ref();
        PortStats {
            input: snapshot(buffers.and_then(|b| b.input_stats.as_ref())),
            fifo: snapshot(buffers.and_then(|b| b.fifo_stats.as_ref())),
            output_overflows: self.output_overflows.load(Ordering::Relaxed),
            sink_refusals: self.sink_refusals.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for MidiPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidiPort")
            .field("name", &self.config.name)
            .field("direction", &self.config.direction)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for MidiPort {
    fn drop(&mut self) {
        if self.is_open() {
            tracing::debug!("Dropping open MIDI port '{}'", self.config.name);
        }
    }
}
