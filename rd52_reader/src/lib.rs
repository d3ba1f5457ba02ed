//! RD52 data-file reader
//!
//! Decodes DREAM RD52 calorimeter `.dat` captures: a run header followed by
//! framed event records, each carrying sub-event blocks of packed 32-bit words.
//!
//! ```no_run
//! use rd52_reader::{Rd52Reader, ReaderConfig, RunRecord};
//!
//! # fn main() -> rd52_reader::Result<()> {
//! let mut reader = Rd52Reader::new(ReaderConfig::default());
//! reader.open("run_0007.dat")?;
//!
//! let mut run = RunRecord::default();
//! reader.read_run_info(&mut run)?;
//!
//! while let Some(event) = reader.read_next_event()? {
//!     println!("event {} carries {} channels", event.event_number, event.channels.len());
//! }
//! reader.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod rd52;

pub use config::{ConfigError, ReaderConfig};
pub use rd52::{
    ByteCursor, ByteSource, ChannelMap, DataWord, DecodeError, DecodedEvent, DecodedRun,
    EventHeader, EventSink, JsonLinesSink, PayloadUnpacker, Rd52Reader, ReaderState,
    ReaderStats, Result, RunHeader, RunMetadata, RunRecord, Sample, StreamEncoder, SubEventBlock,
    SubEventHeader, Timestamp, UnpackStats,
};
