//! RD52 stream walker.
//!
//! Drives the frame decoder over one capture: run header first, then event
//! records in file order. Any structural error moves the reader to
//! [`ReaderState::Failed`]; only a new `open` leaves that state.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::cursor::{ByteCursor, ByteSource};
use super::error::{DecodeError, Result};
use super::frame::FrameDecoder;
use super::sink::{EventSink, RunMetadata};
use super::types::{DecodedEvent, DecodedRun, EventHeader, EVENT_HEADER_LEN, WORD_LEN};
use super::unpack::{PayloadUnpacker, UnpackStats};
use crate::config::ReaderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReaderState {
    Unopened,
    Opened,
    RunRead,
    Reading,
    Exhausted,
    Failed,
    Closed,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReaderState::Unopened => "unopened",
            ReaderState::Opened => "opened",
            ReaderState::RunRead => "run-read",
            ReaderState::Reading => "reading",
            ReaderState::Exhausted => "exhausted",
            ReaderState::Failed => "failed",
            ReaderState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Session totals, reset on every `open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    pub events_read: u64,
    pub events_skipped: u64,
    pub sub_events: u64,
    /// Stream offset after the last completed header or event
    pub bytes_consumed: u64,
    pub unpack: UnpackStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkMode {
    Read,
    Skip,
}

const EVENT_STATES: &[ReaderState] = &[
    ReaderState::Opened,
    ReaderState::RunRead,
    ReaderState::Reading,
    ReaderState::Exhausted,
];

pub struct Rd52Reader {
    config: ReaderConfig,
    frames: FrameDecoder,
    unpacker: PayloadUnpacker,
    cursor: Option<ByteCursor>,
    state: ReaderState,
    /// Reused for every sub-event payload
    payload: Vec<u8>,
    declared_events: Option<u32>,
    last_event_number: Option<u32>,
    stats: ReaderStats,
}

impl Default for Rd52Reader {
    fn default() -> Self {
        Self::new(ReaderConfig::default())
    }
}

impl Rd52Reader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            frames: FrameDecoder::new(config.strict_header_sizes),
            unpacker: PayloadUnpacker::new(config.data_type_mask(), config.warn_on_unknown_words),
            config,
            cursor: None,
            state: ReaderState::Unopened,
            payload: Vec::new(),
            declared_events: None,
            last_event_number: None,
            stats: ReaderStats::default(),
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Current byte offset, `None` while no source is attached.
    pub fn offset(&self) -> Option<u64> {
        self.cursor.as_ref().map(ByteCursor::offset)
    }

    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    /// Open a capture through a buffered file reader.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        const OP: &str = "open";
        self.check_openable(OP)?;
        let path = path.as_ref();
        let opened = ByteCursor::open(path);
        self.attach(OP, opened, path)
    }

    /// Open a capture through a memory map.
    pub fn open_mapped(&mut self, path: impl AsRef<Path>) -> Result<()> {
        const OP: &str = "open_mapped";
        self.check_openable(OP)?;
        let path = path.as_ref();
        let opened = ByteCursor::open_mapped(path);
        self.attach(OP, opened, path)
    }

    /// Decode from any seekable source, starting at its current position.
    pub fn open_source<S: ByteSource + 'static>(&mut self, source: S) -> Result<()> {
        const OP: &str = "open_source";
        self.check_openable(OP)?;
        let opened = ByteCursor::from_source(source);
        self.attach(OP, opened, Path::new("<source>"))
    }

    /// Decode the run header and forward it to `run`.
    ///
    /// Only valid straight after opening: the format has no way to find the
    /// run header again once the cursor has moved on.
    pub fn read_run_info<M: RunMetadata + ?Sized>(&mut self, run: &mut M) -> Result<DecodedRun> {
        const OP: &str = "read_run_info";
        self.check_state(OP, &[ReaderState::Opened])?;

        let decoded = match self.cursor.as_mut() {
            Some(cursor) => self.frames.read_run_header(cursor),
            None => Err(DecodeError::ReaderFailed { operation: OP }),
        };
        let header = self.settle(OP, decoded)?;

        let decoded_run = DecodedRun::from(&header);
        decoded_run.forward_to(run);
        self.declared_events = Some(header.number_of_events);
        self.note_consumed();
        self.state = ReaderState::RunRead;

        info!(
            run_number = header.run_number,
            number_of_events = header.number_of_events,
            start_time = header.start_time,
            end_time = header.end_time,
            "RD52 run header decoded",
        );
        Ok(decoded_run)
    }

    /// Step over `count` events without unpacking their payloads.
    ///
    /// Fails with `Truncated` if fewer than `count` whole events remain; the
    /// cursor is left at the first unreadable byte.
    pub fn skip_events(&mut self, count: u32) -> Result<()> {
        const OP: &str = "skip_events";
        self.check_state(OP, EVENT_STATES)?;
        if count == 0 {
            return Ok(());
        }
        self.consume_run_header(OP)?;

        for _ in 0..count {
            let walked = self.walk_event(OP, WalkMode::Skip);
            let skipped = match self.settle(OP, walked)? {
                Some(event) => event,
                None => {
                    let truncated = self.end_of_stream_error();
                    return self.settle(OP, Err(truncated));
                }
            };
            self.note_event_number(skipped.event_number);
            self.stats.events_skipped += 1;
            self.note_consumed();
        }
        self.state = ReaderState::Reading;

        debug!(count, offset = ?self.offset(), "RD52 events skipped");
        Ok(())
    }

    /// Decode the next event, or `Ok(None)` once the stream ends cleanly on
    /// an event boundary.
    pub fn read_next_event(&mut self) -> Result<Option<DecodedEvent>> {
        const OP: &str = "read_next_event";
        self.check_state(OP, EVENT_STATES)?;
        if self.state == ReaderState::Exhausted {
            return Ok(None);
        }
        self.consume_run_header(OP)?;

        let walked = self.walk_event(OP, WalkMode::Read);
        match self.settle(OP, walked)? {
            Some(event) => {
                self.note_event_number(event.event_number);
                self.stats.events_read += 1;
                self.stats.unpack.merge(&event.diagnostics);
                self.note_consumed();
                self.state = ReaderState::Reading;
                debug!(
                    event_number = event.event_number,
                    sub_events = event.module_ids.len(),
                    channels = event.channels.len(),
                    "RD52 event decoded",
                );
                Ok(Some(event))
            }
            None => {
                self.mark_exhausted();
                Ok(None)
            }
        }
    }

    /// Forward every remaining event to `sink`, returning how many were sent.
    pub fn read_all<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Result<u64> {
        let mut forwarded = 0u64;
        while let Some(event) = self.read_next_event()? {
            sink.on_event(event);
            forwarded += 1;
        }
        Ok(forwarded)
    }

    /// Release the source. Safe from any state and idempotent.
    pub fn close(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            info!(
                offset = cursor.offset(),
                events_read = self.stats.events_read,
                events_skipped = self.stats.events_skipped,
                "RD52 stream closed",
            );
        }
        if self.state != ReaderState::Unopened {
            self.state = ReaderState::Closed;
        }
    }

    fn check_openable(&self, operation: &'static str) -> Result<()> {
        match self.state {
            ReaderState::Unopened | ReaderState::Failed | ReaderState::Closed => Ok(()),
            state => Err(DecodeError::OutOfSequence { operation, state }),
        }
    }

    fn attach(&mut self, operation: &'static str, opened: Result<ByteCursor>, path: &Path) -> Result<()> {
        self.cursor = None;
        self.declared_events = None;
        self.last_event_number = None;
        self.stats = ReaderStats::default();

        match opened {
            Ok(cursor) => {
                info!(path = %path.display(), len = cursor.len(), "RD52 stream opened");
                self.cursor = Some(cursor);
                self.state = ReaderState::Opened;
                Ok(())
            }
            Err(err) => {
                error!(operation, path = %path.display(), error = %err, "failed to open RD52 stream");
                self.state = ReaderState::Failed;
                Err(err)
            }
        }
    }

    fn check_state(&self, operation: &'static str, allowed: &[ReaderState]) -> Result<()> {
        match self.state {
            ReaderState::Failed => Err(DecodeError::ReaderFailed { operation }),
            state if allowed.contains(&state) => Ok(()),
            state => Err(DecodeError::OutOfSequence { operation, state }),
        }
    }

    /// Move to `Failed` on any fatal error from a decode step.
    fn settle<T>(&mut self, operation: &'static str, result: Result<T>) -> Result<T> {
        match &result {
            Err(err) if err.is_fatal() => {
                error!(operation, offset = ?self.offset(), error = %err, "RD52 reader failed");
                self.state = ReaderState::Failed;
            }
            _ => {}
        }
        result
    }

    /// Events requested without `read_run_info`: validate the run header and
    /// step past it without forwarding.
    fn consume_run_header(&mut self, operation: &'static str) -> Result<()> {
        if self.state != ReaderState::Opened {
            return Ok(());
        }
        let decoded = match self.cursor.as_mut() {
            Some(cursor) => self.frames.read_run_header(cursor),
            None => Err(DecodeError::ReaderFailed { operation }),
        };
        let header = self.settle(operation, decoded)?;
        debug!(run_number = header.run_number, "RD52 run header consumed without forwarding");
        self.declared_events = Some(header.number_of_events);
        self.note_consumed();
        self.state = ReaderState::Reading;
        Ok(())
    }

    /// Decode one event record. In skip mode payloads are seeked over and the
    /// returned event carries headers only.
    fn walk_event(&mut self, operation: &'static str, mode: WalkMode) -> Result<Option<DecodedEvent>> {
        let Self {
            config,
            frames,
            unpacker,
            cursor,
            payload,
            stats,
            ..
        } = self;
        let cursor = cursor
            .as_mut()
            .ok_or(DecodeError::ReaderFailed { operation })?;

        if cursor.at_end() {
            return Ok(None);
        }

        let event_offset = cursor.offset();
        let header = frames.read_event_header(cursor)?;
        let mut remaining = event_payload_len(&header, event_offset, config.max_event_payload_bytes)?;
        let mut event = DecodedEvent::new(&header);

        // At least one sub-event per event; keep consuming until the declared
        // payload is used up exactly.
        loop {
            let sub_offset = cursor.offset();
            let sub = match frames.read_subevent_header(cursor) {
                Ok(sub) => sub,
                // Past the first sub-event the budget is still open, so a
                // missing header means eventSize overstates the payload.
                Err(DecodeError::BadMagic { .. } | DecodeError::Truncated { .. })
                    if !event.module_ids.is_empty() =>
                {
                    return Err(DecodeError::framing(
                        sub_offset,
                        header.event_number,
                        format!("eventSize declares {remaining} more bytes than its sub-events carry"),
                    ));
                }
                Err(err) => return Err(err),
            };
            let size = sub.subevent_size;

            if size % WORD_LEN as u32 != 0 {
                return Err(DecodeError::framing(
                    sub_offset,
                    header.event_number,
                    format!(
                        "sub-event of module {} declares {size} bytes, not a whole number of words",
                        sub.module_id
                    ),
                ));
            }
            if size > remaining {
                return Err(DecodeError::framing(
                    sub_offset,
                    header.event_number,
                    format!(
                        "sub-event of module {} declares {size} bytes but only {remaining} remain of event size {}",
                        sub.module_id, header.event_size
                    ),
                ));
            }

            match mode {
                WalkMode::Skip => cursor.skip(u64::from(size))?,
                WalkMode::Read => {
                    cursor.require(u64::from(size))?;
                    payload.clear();
                    payload.resize(size as usize, 0);
                    cursor.read_into(payload)?;
                    unpacker.unpack_bytes_into(payload, &mut event.channels, &mut event.diagnostics);
                }
            }

            event.module_ids.push(sub.module_id);
            stats.sub_events += 1;
            remaining -= size;
            if remaining == 0 {
                break;
            }
        }

        Ok(Some(event))
    }

    fn note_event_number(&mut self, event_number: u32) {
        if let Some(previous) = self.last_event_number {
            if event_number <= previous {
                warn!(previous, event_number, "RD52 event numbers not increasing");
            }
        }
        self.last_event_number = Some(event_number);
    }

    fn note_consumed(&mut self) {
        if let Some(offset) = self.offset() {
            self.stats.bytes_consumed = offset;
        }
    }

    fn mark_exhausted(&mut self) {
        self.state = ReaderState::Exhausted;
        let seen = self.stats.events_read + self.stats.events_skipped;
        match self.declared_events {
            Some(declared) if u64::from(declared) != seen => warn!(
                declared,
                seen, "RD52 stream ended with a different event count than the run header declared"
            ),
            _ => info!(events = seen, "RD52 stream exhausted"),
        }
    }

    fn end_of_stream_error(&self) -> DecodeError {
        DecodeError::Truncated {
            offset: self.offset().unwrap_or_default(),
            needed: EVENT_HEADER_LEN as u64,
            available: 0,
        }
    }
}

impl fmt::Debug for Rd52Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rd52Reader")
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Validate the event's declared payload length before anything is read.
fn event_payload_len(header: &EventHeader, offset: u64, limit: u32) -> Result<u32> {
    let Some(len) = header.payload_len() else {
        return Err(DecodeError::framing(
            offset,
            header.event_number,
            format!(
                "event size {} is smaller than header size {}",
                header.event_size, header.event_header_size
            ),
        ));
    };
    if len % WORD_LEN as u32 != 0 {
        return Err(DecodeError::framing(
            offset,
            header.event_number,
            format!("payload of {len} bytes is not a whole number of words"),
        ));
    }
    if len > limit {
        return Err(DecodeError::PayloadTooLarge {
            offset,
            declared: len,
            limit,
        });
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::rd52::encode::{StreamEncoder, SubEventBlock};
    use crate::rd52::sink::RunRecord;
    use crate::rd52::types::{RunHeader, SubEventHeader};
    use std::io::Cursor;

    fn reader_over(bytes: Vec<u8>) -> Rd52Reader {
        let mut reader = Rd52Reader::default();
        reader.open_source(Cursor::new(bytes)).unwrap();
        reader
    }

    fn two_event_stream() -> Vec<u8> {
        StreamEncoder::new()
            .run_header(&RunHeader::new(7, 2, 1000, 2000))
            .event(1, 0, 5, 0, &[SubEventBlock::new(3, &[0x0100_2005])])
            .event(2, 0, 6, 10, &[SubEventBlock::new(3, &[0x0002_0007])])
            .finish()
    }

    #[test]
    fn test_reader__run_info_then_events__then_state_progresses() {
        let mut reader = reader_over(two_event_stream());
        assert_eq!(reader.state(), ReaderState::Opened);

        let mut run = RunRecord::default();
        let decoded = reader.read_run_info(&mut run).unwrap();
        assert_eq!(decoded.run_number, 7);
        assert_eq!(reader.state(), ReaderState::RunRead);

        assert_eq!(reader.read_next_event().unwrap().unwrap().event_number, 1);
        assert_eq!(reader.state(), ReaderState::Reading);
        assert_eq!(reader.read_next_event().unwrap().unwrap().event_number, 2);
        assert!(reader.read_next_event().unwrap().is_none());
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert!(reader.read_next_event().unwrap().is_none());
    }

    #[test]
    fn test_reader__run_info_twice__then_out_of_sequence_without_state_change() {
        let mut reader = reader_over(two_event_stream());
        let mut run = RunRecord::default();
        reader.read_run_info(&mut run).unwrap();

        let err = reader.read_run_info(&mut run).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::OutOfSequence {
                operation: "read_run_info",
                state: ReaderState::RunRead
            }
        ));
        assert_eq!(reader.state(), ReaderState::RunRead);
        assert_eq!(reader.read_next_event().unwrap().unwrap().event_number, 1);
    }

    #[test]
    fn test_reader__run_info_after_events__then_out_of_sequence() {
        let mut reader = reader_over(two_event_stream());
        reader.read_next_event().unwrap().unwrap();

        let err = reader.read_run_info(&mut RunRecord::default()).unwrap_err();
        assert!(matches!(err, DecodeError::OutOfSequence { .. }));
        assert_eq!(reader.state(), ReaderState::Reading);
    }

    #[test]
    fn test_reader__events_without_run_info__then_run_header_consumed() {
        let mut reader = reader_over(two_event_stream());
        let event = reader.read_next_event().unwrap().unwrap();
        assert_eq!(event.event_number, 1);
        assert_eq!(event.values(0), vec![5]);
    }

    #[test]
    fn test_reader__unopened__then_out_of_sequence() {
        let mut reader = Rd52Reader::default();
        let err = reader.read_next_event().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::OutOfSequence {
                state: ReaderState::Unopened,
                ..
            }
        ));
        assert_eq!(reader.offset(), None);
    }

    #[test]
    fn test_reader__failed_open__then_every_operation_refused() {
        let mut reader = Rd52Reader::default();
        let err = reader.open("/nonexistent/rd52/run.dat").unwrap_err();
        assert!(matches!(err, DecodeError::OpenFailed { .. }));
        assert_eq!(reader.state(), ReaderState::Failed);

        assert!(matches!(
            reader.read_run_info(&mut RunRecord::default()),
            Err(DecodeError::ReaderFailed { .. })
        ));
        assert!(matches!(reader.skip_events(1), Err(DecodeError::ReaderFailed { .. })));
        assert!(matches!(reader.read_next_event(), Err(DecodeError::ReaderFailed { .. })));

        reader.close();
        reader.close();
        assert_eq!(reader.state(), ReaderState::Closed);
    }

    #[test]
    fn test_reader__open_while_reading__then_out_of_sequence() {
        let mut reader = reader_over(two_event_stream());
        let err = reader.open_source(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::OutOfSequence {
                operation: "open_source",
                state: ReaderState::Opened
            }
        ));
    }

    #[test]
    fn test_reader__reopen_after_close__then_fresh_session() {
        let mut reader = reader_over(two_event_stream());
        reader.read_next_event().unwrap();
        reader.close();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(matches!(reader.read_next_event(), Err(DecodeError::OutOfSequence { .. })));

        reader.open_source(Cursor::new(two_event_stream())).unwrap();
        assert_eq!(reader.stats().events_read, 0);
        let mut run = RunRecord::default();
        assert_eq!(reader.read_run_info(&mut run).unwrap().run_number, 7);
    }

    #[test]
    fn test_reader__multiple_subevents__then_channels_concatenate_in_order() {
        let bytes = StreamEncoder::new()
            .run_header(&RunHeader::new(1, 1, 0, 0))
            .event(
                4,
                1,
                0,
                0,
                &[
                    SubEventBlock::new(10, &[0x0002_0001, 0x0004_0002]),
                    SubEventBlock::new(11, &[0x0002_0003]),
                ],
            )
            .finish();
        let mut reader = reader_over(bytes);

        let event = reader.read_next_event().unwrap().unwrap();
        assert_eq!(event.module_ids, vec![10, 11]);
        assert_eq!(event.values(1), vec![1, 3]);
        assert_eq!(event.values(2), vec![2]);
        assert_eq!(reader.stats().sub_events, 2);
        assert_eq!(reader.stats().unpack.samples, 3);
        assert_eq!(reader.stats().bytes_consumed, 24 + 28 + 2 * 16 + 12);
    }

    #[test]
    fn test_reader__subevent_overruns_event__then_framing_error_and_failed() {
        let mut encoder = StreamEncoder::new();
        encoder
            .run_header(&RunHeader::new(1, 2, 0, 0))
            .event_header(&EventHeader::new(1, 0, 0, 0, 4))
            .subevent(&SubEventHeader::new(3, 8), &[1, 2])
            .event(2, 0, 0, 0, &[SubEventBlock::new(3, &[1])]);
        let mut reader = reader_over(encoder.finish());

        let err = reader.read_next_event().unwrap_err();
        match err {
            DecodeError::FramingError {
                offset,
                event_number,
                ..
            } => {
                assert_eq!(event_number, 1);
                assert_eq!(offset, 24 + 28);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert_eq!(reader.state(), ReaderState::Failed);
        assert!(matches!(reader.read_next_event(), Err(DecodeError::ReaderFailed { .. })));
    }

    fn overstated_event_stream(followed: bool) -> Vec<u8> {
        let mut encoder = StreamEncoder::new();
        encoder
            .run_header(&RunHeader::new(1, 2, 0, 0))
            .event_header(&EventHeader::new(1, 0, 0, 0, 8))
            .subevent(&SubEventHeader::new(3, 4), &[0x0002_0001]);
        if followed {
            encoder.event(2, 0, 0, 0, &[SubEventBlock::new(3, &[0x0002_0002])]);
        }
        encoder.finish()
    }

    #[test]
    fn test_reader__event_size_overstated__then_framing_error_whatever_follows() {
        let header_end = (24 + 28 + 16 + 4) as u64;
        for followed in [true, false] {
            let mut reader = reader_over(overstated_event_stream(followed));
            let err = reader.read_next_event().unwrap_err();
            match err {
                DecodeError::FramingError {
                    offset,
                    event_number,
                    ref detail,
                } => {
                    assert_eq!(offset, header_end);
                    assert_eq!(event_number, 1);
                    assert!(detail.contains("4 more bytes"), "{detail}");
                }
                ref other => panic!("followed={followed}: unexpected variant: {other:?}"),
            }
            assert_eq!(reader.state(), ReaderState::Failed);
        }
    }

    #[test]
    fn test_reader__skip_event_size_overstated__then_framing_error() {
        let mut reader = reader_over(overstated_event_stream(true));
        let err = reader.skip_events(1).unwrap_err();
        assert!(matches!(err, DecodeError::FramingError { event_number: 1, .. }));
        assert_eq!(reader.stats().events_skipped, 0);
    }

    #[test]
    fn test_reader__first_subevent_marker_wrong__then_bad_magic_kept() {
        let mut sub = SubEventHeader::new(3, 4);
        sub.begin_marker = 0x1111_1111;
        let bytes = StreamEncoder::new()
            .run_header(&RunHeader::new(1, 1, 0, 0))
            .event_header(&EventHeader::new(1, 0, 0, 0, 4))
            .subevent(&sub, &[0x0002_0001])
            .finish();
        let mut reader = reader_over(bytes);

        let err = reader.read_next_event().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::BadMagic {
                offset: 52,
                actual: 0x1111_1111,
                ..
            }
        ));
    }

    #[test]
    fn test_reader__event_size_below_header__then_framing_error() {
        let mut header = EventHeader::new(3, 0, 0, 0, 0);
        header.event_size = 12;
        let bytes = StreamEncoder::new()
            .run_header(&RunHeader::new(1, 1, 0, 0))
            .event_header(&header)
            .finish();
        let mut reader = reader_over(bytes);

        let err = reader.read_next_event().unwrap_err();
        assert!(matches!(err, DecodeError::FramingError { event_number: 3, .. }));
    }

    #[test]
    fn test_reader__unaligned_event_payload__then_framing_error() {
        let bytes = StreamEncoder::new()
            .run_header(&RunHeader::new(1, 1, 0, 0))
            .event_header(&EventHeader::new(3, 0, 0, 0, 6))
            .finish();
        let mut reader = reader_over(bytes);

        let err = reader.read_next_event().unwrap_err();
        assert!(err.to_string().contains("whole number of words"));
    }

    #[test]
    fn test_reader__payload_over_cap__then_refused_before_reading() {
        let config = ReaderConfig {
            max_event_payload_bytes: 8,
            ..ReaderConfig::default()
        };
        let bytes = StreamEncoder::new()
            .run_header(&RunHeader::new(1, 1, 0, 0))
            .event(1, 0, 0, 0, &[SubEventBlock::new(1, &[1, 2, 3])])
            .finish();
        let mut reader = Rd52Reader::new(config);
        reader.open_source(Cursor::new(bytes)).unwrap();

        let err = reader.read_next_event().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::PayloadTooLarge {
                offset: 24,
                declared: 12,
                limit: 8
            }
        ));
    }

    #[test]
    fn test_reader__hostile_event_size__then_no_allocation_attempted() {
        let mut header = EventHeader::new(1, 0, 0, 0, 0);
        header.event_size = u32::MAX - 3;
        let bytes = StreamEncoder::new()
            .run_header(&RunHeader::new(1, 1, 0, 0))
            .event_header(&header)
            .finish();
        let mut reader = reader_over(bytes);

        let err = reader.read_next_event().unwrap_err();
        assert!(matches!(err, DecodeError::PayloadTooLarge { .. }));
    }

    #[test]
    fn test_reader__stream_ends_mid_payload__then_truncated() {
        let mut bytes = two_event_stream();
        bytes.truncate(bytes.len() - 2);
        let mut reader = reader_over(bytes);

        assert!(reader.read_next_event().unwrap().is_some());
        let err = reader.read_next_event().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                needed: 4,
                available: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_reader__skip_more_than_available__then_truncated_at_end() {
        let mut reader = reader_over(two_event_stream());
        let err = reader.skip_events(3).unwrap_err();
        let len = two_event_stream().len() as u64;
        assert!(matches!(
            err,
            DecodeError::Truncated {
                needed: 28,
                available: 0,
                offset
            } if offset == len
        ));
        assert_eq!(reader.stats().events_skipped, 2);
        assert_eq!(reader.state(), ReaderState::Failed);
    }

    #[test]
    fn test_reader__skip_then_read__then_next_event_returned() {
        let mut reader = reader_over(two_event_stream());
        reader.skip_events(1).unwrap();
        let event = reader.read_next_event().unwrap().unwrap();
        assert_eq!(event.event_number, 2);
        assert_eq!(event.timestamp.tusec, 10);
        assert_eq!(reader.stats().events_skipped, 1);
        assert_eq!(reader.stats().events_read, 1);
    }

    #[test]
    fn test_reader__skip_zero__then_no_state_change() {
        let mut reader = reader_over(two_event_stream());
        reader.skip_events(0).unwrap();
        assert_eq!(reader.state(), ReaderState::Opened);
        reader.read_run_info(&mut RunRecord::default()).unwrap();
    }

    #[test]
    fn test_reader__read_all__then_every_event_forwarded() {
        let mut reader = reader_over(two_event_stream());
        reader.read_run_info(&mut RunRecord::default()).unwrap();

        let mut sink: Vec<DecodedEvent> = Vec::new();
        assert_eq!(reader.read_all(&mut sink).unwrap(), 2);
        assert_eq!(sink.len(), 2);
        assert_eq!(reader.state(), ReaderState::Exhausted);
    }

    #[test]
    fn test_reader__lenient_sizes__then_extended_event_header_accepted() {
        let mut header = EventHeader::new(5, 0, 0, 0, 4);
        header.event_header_size = 32;
        header.event_size = 36;
        let bytes = StreamEncoder::new()
            .run_header(&RunHeader::new(1, 1, 0, 0))
            .event_header(&header)
            .raw(&[0u8; 4])
            .subevent(&SubEventHeader::new(2, 4), &[0x0002_0009])
            .finish();
        let config = ReaderConfig {
            strict_header_sizes: false,
            ..ReaderConfig::default()
        };
        let mut reader = Rd52Reader::new(config);
        reader.open_source(Cursor::new(bytes)).unwrap();

        let event = reader.read_next_event().unwrap().unwrap();
        assert_eq!(event.event_number, 5);
        assert_eq!(event.values(1), vec![9]);
        assert!(reader.read_next_event().unwrap().is_none());
    }

    #[test]
    fn test_reader_state__display__then_lowercase_names() {
        assert_eq!(ReaderState::RunRead.to_string(), "run-read");
        assert_eq!(ReaderState::Exhausted.to_string(), "exhausted");
    }
}
