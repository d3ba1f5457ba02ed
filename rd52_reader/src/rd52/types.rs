// RD52 record layouts.
//
// Every field on disk is an unsigned 32-bit little-endian integer. Headers are
// decoded field by field with `byteorder` so the host byte order never matters.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use super::sink::{RunMetadata, PARAM_MAGIC_WORD, PARAM_NUMBER_OF_EVENTS};
use super::unpack::{ChannelMap, UnpackStats};

pub const WORD_LEN: usize = 4;

pub const RUN_MAGIC: u32 = 0xAABB_CCDD;
pub const EVENT_MARKER: u32 = 0xCAFE_CAFE;
pub const SUBEVENT_MARKER: u32 = 0xACAB_ACAB;

pub const RUN_HEADER_LEN: usize = 24;
pub const EVENT_HEADER_LEN: usize = 28;
pub const SUBEVENT_HEADER_LEN: usize = 16;

// Compile-time size checks
const _: () = assert!(RUN_HEADER_LEN == 6 * WORD_LEN);
const _: () = assert!(EVENT_HEADER_LEN == 7 * WORD_LEN);
const _: () = assert!(SUBEVENT_HEADER_LEN == 4 * WORD_LEN);

/// Which header a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Structure {
    RunHeader,
    EventHeader,
    SubEventHeader,
}

impl Structure {
    pub const fn fixed_len(self) -> usize {
        match self {
            Structure::RunHeader => RUN_HEADER_LEN,
            Structure::EventHeader => EVENT_HEADER_LEN,
            Structure::SubEventHeader => SUBEVENT_HEADER_LEN,
        }
    }

    pub const fn marker(self) -> u32 {
        match self {
            Structure::RunHeader => RUN_MAGIC,
            Structure::EventHeader => EVENT_MARKER,
            Structure::SubEventHeader => SUBEVENT_MARKER,
        }
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Structure::RunHeader => write!(f, "run header"),
            Structure::EventHeader => write!(f, "event header"),
            Structure::SubEventHeader => write!(f, "sub-event header"),
        }
    }
}

/// Run header - 24 bytes, once at the start of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunHeader {
    pub magic_word: u32,       // 0xAABBCCDD
    pub header_size: u32,      // In bytes
    pub run_number: u32,
    pub number_of_events: u32, // Declared by the DAQ, not authoritative
    pub start_time: u32,       // Opaque time stamp
    pub end_time: u32,         // Opaque time stamp
}

impl RunHeader {
    pub fn new(run_number: u32, number_of_events: u32, start_time: u32, end_time: u32) -> Self {
        Self {
            magic_word: RUN_MAGIC,
            header_size: RUN_HEADER_LEN as u32,
            run_number,
            number_of_events,
            start_time,
            end_time,
        }
    }

    pub fn from_le_bytes(buf: &[u8; RUN_HEADER_LEN]) -> Self {
        let mut f = [0u32; RUN_HEADER_LEN / WORD_LEN];
        LittleEndian::read_u32_into(buf, &mut f);
        Self {
            magic_word: f[0],
            header_size: f[1],
            run_number: f[2],
            number_of_events: f[3],
            start_time: f[4],
            end_time: f[5],
        }
    }

    pub fn to_le_bytes(&self) -> [u8; RUN_HEADER_LEN] {
        let mut out = [0u8; RUN_HEADER_LEN];
        LittleEndian::write_u32_into(
            &[
                self.magic_word,
                self.header_size,
                self.run_number,
                self.number_of_events,
                self.start_time,
                self.end_time,
            ],
            &mut out,
        );
        out
    }
}

/// Event header - 28 bytes, one per event record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventHeader {
    pub event_marker: u32,      // 0xCAFECAFE
    pub event_header_size: u32, // In bytes
    pub event_size: u32,        // Header plus sub-event payload bytes
    pub event_number: u32,
    pub spill_number: u32,
    pub tsec: u32,
    pub tusec: u32,
}

impl EventHeader {
    pub fn new(event_number: u32, spill_number: u32, tsec: u32, tusec: u32, payload_len: u32) -> Self {
        Self {
            event_marker: EVENT_MARKER,
            event_header_size: EVENT_HEADER_LEN as u32,
            event_size: EVENT_HEADER_LEN as u32 + payload_len,
            event_number,
            spill_number,
            tsec,
            tusec,
        }
    }

    pub fn from_le_bytes(buf: &[u8; EVENT_HEADER_LEN]) -> Self {
        let mut f = [0u32; EVENT_HEADER_LEN / WORD_LEN];
        LittleEndian::read_u32_into(buf, &mut f);
        Self {
            event_marker: f[0],
            event_header_size: f[1],
            event_size: f[2],
            event_number: f[3],
            spill_number: f[4],
            tsec: f[5],
            tusec: f[6],
        }
    }

    pub fn to_le_bytes(&self) -> [u8; EVENT_HEADER_LEN] {
        let mut out = [0u8; EVENT_HEADER_LEN];
        LittleEndian::write_u32_into(
            &[
                self.event_marker,
                self.event_header_size,
                self.event_size,
                self.event_number,
                self.spill_number,
                self.tsec,
                self.tusec,
            ],
            &mut out,
        );
        out
    }

    /// Payload bytes declared for this event, `None` if `event_size` is
    /// smaller than the header itself.
    pub fn payload_len(&self) -> Option<u32> {
        self.event_size.checked_sub(self.event_header_size)
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp {
            tsec: self.tsec,
            tusec: self.tusec,
        }
    }
}

/// Sub-event header - 16 bytes, precedes each module's block of data words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubEventHeader {
    pub begin_marker: u32,  // 0xACABACAB
    pub header_size: u32,   // In bytes
    pub module_id: u32,
    pub subevent_size: u32, // Payload bytes following this header
}

impl SubEventHeader {
    pub fn new(module_id: u32, subevent_size: u32) -> Self {
        Self {
            begin_marker: SUBEVENT_MARKER,
            header_size: SUBEVENT_HEADER_LEN as u32,
            module_id,
            subevent_size,
        }
    }

    pub fn from_le_bytes(buf: &[u8; SUBEVENT_HEADER_LEN]) -> Self {
        let mut f = [0u32; SUBEVENT_HEADER_LEN / WORD_LEN];
        LittleEndian::read_u32_into(buf, &mut f);
        Self {
            begin_marker: f[0],
            header_size: f[1],
            module_id: f[2],
            subevent_size: f[3],
        }
    }

    pub fn to_le_bytes(&self) -> [u8; SUBEVENT_HEADER_LEN] {
        let mut out = [0u8; SUBEVENT_HEADER_LEN];
        LittleEndian::write_u32_into(
            &[
                self.begin_marker,
                self.header_size,
                self.module_id,
                self.subevent_size,
            ],
            &mut out,
        );
        out
    }
}

/// Event time as written by the DAQ.
///
/// The encoding of `tsec`/`tusec` (epoch, time of day or a device counter) is
/// not documented, so no calendar conversion is attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Timestamp {
    pub tsec: u32,
    pub tusec: u32,
}

/// One fully decoded event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEvent {
    pub event_number: u32,
    pub spill_number: u32,
    pub timestamp: Timestamp,
    /// `moduleID` of every sub-event, in file order
    pub module_ids: Vec<u32>,
    pub channels: ChannelMap,
    pub diagnostics: UnpackStats,
}

impl DecodedEvent {
    pub fn new(header: &EventHeader) -> Self {
        Self {
            event_number: header.event_number,
            spill_number: header.spill_number,
            timestamp: header.timestamp(),
            module_ids: Vec::new(),
            channels: ChannelMap::new(),
            diagnostics: UnpackStats::default(),
        }
    }

    /// Values recorded for `channel`, in word order.
    pub fn values(&self, channel: u8) -> Vec<u16> {
        self.channels
            .get(&channel)
            .map(|samples| samples.iter().map(|s| s.value).collect())
            .unwrap_or_default()
    }
}

/// Run metadata extracted from the run header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedRun {
    pub run_number: u32,
    pub start_time: u32,
    pub end_time: u32,
    pub number_of_events: u32,
    pub magic_word: u32,
}

impl From<&RunHeader> for DecodedRun {
    fn from(header: &RunHeader) -> Self {
        Self {
            run_number: header.run_number,
            start_time: header.start_time,
            end_time: header.end_time,
            number_of_events: header.number_of_events,
            magic_word: header.magic_word,
        }
    }
}

impl DecodedRun {
    /// Hand the run fields and annotations to a metadata collaborator.
    pub fn forward_to<M: RunMetadata + ?Sized>(&self, run: &mut M) {
        run.set_run_number(self.run_number);
        run.set_start_time(self.start_time);
        run.set_end_time(self.end_time);
        run.set_parameter(PARAM_NUMBER_OF_EVENTS, u64::from(self.number_of_events));
        run.set_parameter(PARAM_MAGIC_WORD, u64::from(self.magic_word));
    }
}
