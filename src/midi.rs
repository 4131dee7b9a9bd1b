//! Raw MIDI 1.0 byte helpers: structural validation, event classification
//! and fixed-size message constructors.
//!
//! Everything here works on borrowed byte slices and never allocates, so it
//! is safe to call from the audio thread.

use serde::{Deserialize, Serialize};

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;
pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// CC 123.
pub const ALL_NOTES_OFF: u8 = 0x7B;

/// Semantic class of a stored event.
///
/// Used for filtering and accounting only; the raw status byte in the
/// payload stays authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum EventType {
    /// Placeholder written by `EventBuffer::reserve` before the payload is known.
    Unclassified = 0,
    Note = 1,
    NotePressure = 2,
    Controller = 3,
    Program = 4,
    ChannelPressure = 5,
    PitchBend = 6,
    Sysex = 7,
    SystemCommon = 8,
    Realtime = 9,
}

impl EventType {
    #[inline]
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    /// Unknown tags decode as `Unclassified`.
    #[inline]
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::Note,
            2 => Self::NotePressure,
            3 => Self::Controller,
            4 => Self::Program,
            5 => Self::ChannelPressure,
            6 => Self::PitchBend,
            7 => Self::Sysex,
            8 => Self::SystemCommon,
            9 => Self::Realtime,
            _ => Self::Unclassified,
        }
    }
}

/// Maps a status byte to an [`EventType`].
///
/// Injected into the ring writer so tests (or hosts with their own type
/// tables) can substitute a deterministic mapping.
pub trait Classify {
    fn classify(&self, status: u8) -> EventType;
}

/// Standard MIDI 1.0 status-byte classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardClassifier;

impl Classify for StandardClassifier {
    #[inline]
    fn classify(&self, status: u8) -> EventType {
        match status & 0xF0 {
            NOTE_OFF | NOTE_ON => EventType::Note,
            POLY_PRESSURE => EventType::NotePressure,
            CONTROL_CHANGE => EventType::Controller,
            PROGRAM_CHANGE => EventType::Program,
            CHANNEL_PRESSURE => EventType::ChannelPressure,
            PITCH_BEND => EventType::PitchBend,
            _ => match status {
                SYSEX_START => EventType::Sysex,
                0xF1..=0xF7 => EventType::SystemCommon,
                0xF8..=0xFF => EventType::Realtime,
                _ => EventType::Unclassified,
            },
        }
    }
}

impl<F> Classify for F
where
    F: Fn(u8) -> EventType,
{
    #[inline]
    fn classify(&self, status: u8) -> EventType {
        self(status)
    }
}

#[inline]
pub fn is_channel_voice(status: u8) -> bool {
    (0x80..0xF0).contains(&status)
}

#[inline]
pub fn channel_of(status: u8) -> u8 {
    status & 0x0F
}

/// Expected message length for a status byte. `None` for sysex (variable)
/// and for bytes that cannot start a message.
#[inline]
pub fn expected_len(status: u8) -> Option<usize> {
    match status {
        0x80..=0xBF | 0xE0..=0xEF => Some(3),
        0xC0..=0xDF => Some(2),
        0xF1 | 0xF3 => Some(2),
        0xF2 => Some(3),
        0xF6 => Some(1),
        0xF8..=0xFF => Some(1),
        _ => None,
    }
}

/// Structural validation of one complete MIDI message.
///
/// Running status, undefined system-common bytes (0xF4, 0xF5), stray 0xF7
/// and unterminated sysex are rejected.
pub fn is_valid_message(bytes: &[u8]) -> bool {
    let Some((&status, data)) = bytes.split_first() else {
        return false;
    };
    if status < 0x80 {
        return false;
    }
    if status == SYSEX_START {
        return match data.split_last() {
            Some((&SYSEX_END, body)) => body.iter().all(|b| *b < 0x80),
            _ => false,
        };
    }
    match expected_len(status) {
        Some(len) => bytes.len() == len && data.iter().all(|b| *b < 0x80),
        None => false,
    }
}

/// Note number when `bytes` is a note-on with non-zero velocity.
#[inline]
pub fn note_on_of(bytes: &[u8]) -> Option<(u8, u8)> {
    match bytes {
        [status, note, velocity] if status & 0xF0 == NOTE_ON && *velocity > 0 => {
            Some((channel_of(*status), *note))
        }
        _ => None,
    }
}

/// Note-off, or note-on with velocity 0.
#[inline]
pub fn note_off_of(bytes: &[u8]) -> Option<(u8, u8)> {
    match bytes {
        [status, note, _] if status & 0xF0 == NOTE_OFF => Some((channel_of(*status), *note)),
        [status, note, 0] if status & 0xF0 == NOTE_ON => Some((channel_of(*status), *note)),
        _ => None,
    }
}

#[inline]
pub fn note_on(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [NOTE_ON | channel.min(15), note & 0x7F, velocity & 0x7F]
}

#[inline]
pub fn note_off(channel: u8, note: u8, velocity: u8) -> [u8; 3] {
    [NOTE_OFF | channel.min(15), note & 0x7F, velocity & 0x7F]
}

#[inline]
pub fn control_change(channel: u8, cc: u8, value: u8) -> [u8; 3] {
    [CONTROL_CHANGE | channel.min(15), cc & 0x7F, value & 0x7F]
}

#[inline]
pub fn program_change(channel: u8, program: u8) -> [u8; 2] {
    [PROGRAM_CHANGE | channel.min(15), program & 0x7F]
}

/// `value`: signed 14-bit (-8192 to 8191).
#[inline]
pub fn pitch_bend(channel: u8, value: i16) -> [u8; 3] {
    let unsigned = (value as i32 + 8192).clamp(0, 16383) as u16;
    [
        PITCH_BEND | channel.min(15),
        (unsigned & 0x7F) as u8,
        ((unsigned >> 7) & 0x7F) as u8,
    ]
}

#[inline]
pub fn all_notes_off(channel: u8) -> [u8; 3] {
    control_change(channel, ALL_NOTES_OFF, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_voice_lengths() {
        assert!(is_valid_message(&note_on(0, 60, 100)));
        assert!(is_valid_message(&note_off(15, 60, 0)));
        assert!(is_valid_message(&program_change(3, 12)));
        assert!(is_valid_message(&[CHANNEL_PRESSURE | 2, 64]));
        assert!(!is_valid_message(&[NOTE_ON, 60]));
        assert!(!is_valid_message(&[PROGRAM_CHANGE, 1, 2]));
    }

    #[test]
    fn test_rejects_data_bytes_with_high_bit() {
        assert!(!is_valid_message(&[NOTE_ON, 0x80, 100]));
        assert!(!is_valid_message(&[CONTROL_CHANGE, 7, 0xFF]));
    }

    #[test]
    fn test_rejects_running_status_and_empty() {
        assert!(!is_valid_message(&[]));
        assert!(!is_valid_message(&[60, 100]));
    }

    #[test]
    fn test_sysex_framing() {
        assert!(is_valid_message(&[0xF0, 0x7E, 0x7F, 0x09, 0x01, 0xF7]));
        assert!(is_valid_message(&[0xF0, 0xF7]));
        assert!(!is_valid_message(&[0xF0, 0x7E, 0x7F]));
        assert!(!is_valid_message(&[0xF0, 0x7E, 0x90, 0xF7]));
        assert!(!is_valid_message(&[0xF7]));
    }

    #[test]
    fn test_system_messages() {
        assert!(is_valid_message(&[0xF8]));
        assert!(is_valid_message(&[0xF2, 0x10, 0x02]));
        assert!(is_valid_message(&[0xF1, 0x23]));
        assert!(!is_valid_message(&[0xF4]));
        assert!(!is_valid_message(&[0xF8, 0x00]));
    }

    #[test]
    fn test_note_on_velocity_zero_is_note_off() {
        assert_eq!(note_on_of(&note_on(2, 64, 0)), None);
        assert_eq!(note_off_of(&note_on(2, 64, 0)), Some((2, 64)));
        assert_eq!(note_off_of(&note_off(2, 64, 40)), Some((2, 64)));
        assert_eq!(note_on_of(&note_on(2, 64, 1)), Some((2, 64)));
    }

    #[test]
    fn test_standard_classifier() {
        let c = StandardClassifier;
        assert_eq!(c.classify(0x93), EventType::Note);
        assert_eq!(c.classify(0x83), EventType::Note);
        assert_eq!(c.classify(0xB0), EventType::Controller);
        assert_eq!(c.classify(0xE5), EventType::PitchBend);
        assert_eq!(c.classify(0xF0), EventType::Sysex);
        assert_eq!(c.classify(0xF2), EventType::SystemCommon);
        assert_eq!(c.classify(0xFE), EventType::Realtime);
        assert_eq!(c.classify(0x40), EventType::Unclassified);
    }

    #[test]
    fn test_closure_classifier() {
        let fixed = |_status: u8| EventType::Sysex;
        assert_eq!(fixed.classify(0x90), EventType::Sysex);
    }

    #[test]
    fn test_event_type_tag_roundtrip() {
        assert_eq!(EventType::from_u32(EventType::PitchBend.to_u32()), EventType::PitchBend);
        assert_eq!(EventType::from_u32(1000), EventType::Unclassified);
    }

    #[test]
    fn test_pitch_bend_bytes() {
        assert_eq!(pitch_bend(0, 0), [0xE0, 0x00, 0x40]);
        assert_eq!(pitch_bend(1, -8192), [0xE1, 0x00, 0x00]);
        assert_eq!(pitch_bend(1, 8191), [0xE1, 0x7F, 0x7F]);
    }
}
