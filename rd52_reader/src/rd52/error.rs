use std::{io, path::PathBuf};

use thiserror::Error;

use super::reader::ReaderState;
use super::types::Structure;

/// Every failure the decoder can report.
///
/// Offsets are byte positions from the start of the stream.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open {path:?}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("truncated stream at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        offset: u64,
        needed: u64,
        available: u64,
    },

    #[error("bad {structure} marker at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic {
        structure: Structure,
        offset: u64,
        expected: u32,
        actual: u32,
    },

    #[error("unsupported {structure} size at offset {offset}: expected {expected}, got {actual}")]
    UnsupportedHeaderSize {
        structure: Structure,
        offset: u64,
        expected: u32,
        actual: u32,
    },

    #[error("framing error in event {event_number} at offset {offset}: {detail}")]
    FramingError {
        offset: u64,
        event_number: u32,
        detail: String,
    },

    #[error("payload of {declared} bytes at offset {offset} exceeds the {limit} byte limit")]
    PayloadTooLarge { offset: u64, declared: u32, limit: u32 },

    #[error("{operation} is not allowed while the reader is {state}")]
    OutOfSequence {
        operation: &'static str,
        state: ReaderState,
    },

    #[error("{operation} refused: the reader failed earlier and must be reopened")]
    ReaderFailed { operation: &'static str },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    pub fn io(offset: u64, source: io::Error) -> Self {
        Self::Io { offset, source }
    }

    pub fn framing(offset: u64, event_number: u32, detail: impl Into<String>) -> Self {
        Self::FramingError {
            offset,
            event_number,
            detail: detail.into(),
        }
    }

    /// True for errors that leave the byte stream in an unknown position.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::OutOfSequence { .. } | Self::ReaderFailed { .. })
    }
}
