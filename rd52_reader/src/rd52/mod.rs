// RD52 stream decoding: byte cursor, frame decoder, payload unpacker and
// the stream walker that drives them.

pub mod cursor;
pub mod encode;
pub mod error;
pub mod frame;
pub mod reader;
pub mod sink;
pub mod types;
pub mod unpack;

// Re-export main types
pub use cursor::{ByteCursor, ByteSource};
pub use encode::{StreamEncoder, SubEventBlock};
pub use error::{DecodeError, Result};
pub use frame::FrameDecoder;
pub use reader::{Rd52Reader, ReaderState, ReaderStats};
pub use sink::{
    EventSink, JsonLinesSink, RunMetadata, RunRecord, PARAM_MAGIC_WORD, PARAM_NUMBER_OF_EVENTS,
};
pub use types::{
    DecodedEvent, DecodedRun, EventHeader, RunHeader, Structure, SubEventHeader, Timestamp,
    EVENT_HEADER_LEN, EVENT_MARKER, RUN_HEADER_LEN, RUN_MAGIC, SUBEVENT_HEADER_LEN,
    SUBEVENT_MARKER, WORD_LEN,
};
pub use unpack::{
    pack_channel_map, pack_word, ChannelMap, DataWord, PayloadUnpacker, Sample, UnpackStats,
    ALL_DATA_TYPES,
};
