//! Property tests for ring framing and time windows.

use proptest::prelude::*;

use tutti_midi_rt::midi::{control_change, note_on, pitch_bend};
use tutti_midi_rt::{EventBuffer, FrameTime, MidiRing};

fn message() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        (0u8..16, 0u8..128, 1u8..128).prop_map(|(c, n, v)| note_on(c, n, v).to_vec()),
        (0u8..16, 0u8..120, 0u8..128).prop_map(|(c, cc, v)| control_change(c, cc, v).to_vec()),
        (0u8..16, any::<i16>()).prop_map(|(c, v)| pitch_bend(c, v).to_vec()),
        prop::collection::vec(0u8..128, 0..24).prop_map(|body| {
            let mut sysex = vec![0xF0];
            sysex.extend(body);
            sysex.push(0xF7);
            sysex
        }),
        Just(vec![0xF8]),
    ]
}

/// Non-decreasing timestamps paired with messages.
fn timeline() -> impl Strategy<Value = Vec<(FrameTime, Vec<u8>)>> {
    prop::collection::vec((0u64..8, message()), 0..64).prop_map(|steps| {
        let mut time = 0;
        steps
            .into_iter()
            .map(|(delta, msg)| {
                time += delta;
                (time, msg)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_ring_preserves_events(events in timeline()) {
        let mut ring = MidiRing::new(8192);
        for (time, msg) in &events {
            prop_assert!(ring.write_event(*time, msg));
        }

        let mut dest = EventBuffer::new(8192);
        let read = ring.read(&mut dest, 0, FrameTime::MAX, 0, false);
        prop_assert_eq!(read, events.len());

        let out: Vec<(FrameTime, Vec<u8>)> =
            dest.iter().map(|ev| (ev.time, ev.payload.to_vec())).collect();
        prop_assert_eq!(out, events);
        prop_assert_eq!(ring.read_space(), 0);
    }

    #[test]
    fn prop_window_delivers_exactly_its_events(
        events in timeline(),
        start in 0u64..200,
        len in 0u64..200,
        offset in 0u64..1000,
    ) {
        let end = start + len;
        let mut ring = MidiRing::new(8192);
        for (time, msg) in &events {
            ring.write_event(*time, msg);
        }

        let stale = ring.flush(start);
        let mut dest = EventBuffer::new(8192);
        ring.read(&mut dest, start, end, offset, false);

        let expected: Vec<FrameTime> = events
            .iter()
            .map(|(t, _)| *t)
            .filter(|t| *t >= start && *t < end)
            .map(|t| t - start + offset)
            .collect();
        let got: Vec<FrameTime> = dest.iter().map(|ev| ev.time).collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(stale, events.iter().filter(|(t, _)| *t < start).count());
    }
}
