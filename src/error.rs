//! Error types for the MIDI transport core.
//!
//! Only setup and state-machine failures are errors. Recoverable realtime
//! conditions (full rings, full buffers, malformed payloads) are reported
//! through `bool`/count returns instead.

use thiserror::Error;

use crate::port::{PortDirection, PortState};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("MIDI port '{0}' is closed")]
    PortClosed(String),

    #[error("MIDI port '{0}' is already open")]
    PortAlreadyOpen(String),

    #[error("MIDI port '{name}' cannot start a cycle while {state:?}")]
    CycleInProgress { name: String, state: PortState },

    #[error("MIDI port '{name}' does not support {required:?} operations")]
    WrongDirection {
        name: String,
        required: PortDirection,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
