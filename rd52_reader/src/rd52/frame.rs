// Header decoding for the three RD52 record types.
//
// Each decoder reads exactly the fixed header size, checks the marker, then
// cross-checks the declared header size. The caller owns all positioning.

use tracing::trace;

use super::cursor::ByteCursor;
use super::error::{DecodeError, Result};
use super::types::{
    EventHeader, RunHeader, Structure, SubEventHeader, EVENT_HEADER_LEN, RUN_HEADER_LEN,
    SUBEVENT_HEADER_LEN,
};

#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    strict_header_sizes: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FrameDecoder {
    pub fn new(strict_header_sizes: bool) -> Self {
        Self {
            strict_header_sizes,
        }
    }

    pub fn read_run_header(&self, cursor: &mut ByteCursor) -> Result<RunHeader> {
        let offset = cursor.offset();
        let header = RunHeader::from_le_bytes(&cursor.read_array::<RUN_HEADER_LEN>()?);
        check_marker(Structure::RunHeader, offset, header.magic_word)?;
        self.check_header_size(cursor, Structure::RunHeader, offset, header.header_size)?;
        trace!(offset, run_number = header.run_number, "run header decoded");
        Ok(header)
    }

    pub fn read_event_header(&self, cursor: &mut ByteCursor) -> Result<EventHeader> {
        let offset = cursor.offset();
        let header = EventHeader::from_le_bytes(&cursor.read_array::<EVENT_HEADER_LEN>()?);
        check_marker(Structure::EventHeader, offset, header.event_marker)?;
        self.check_header_size(cursor, Structure::EventHeader, offset, header.event_header_size)?;
        trace!(
            offset,
            event_number = header.event_number,
            event_size = header.event_size,
            "event header decoded"
        );
        Ok(header)
    }

    pub fn read_subevent_header(&self, cursor: &mut ByteCursor) -> Result<SubEventHeader> {
        let offset = cursor.offset();
        let header = SubEventHeader::from_le_bytes(&cursor.read_array::<SUBEVENT_HEADER_LEN>()?);
        check_marker(Structure::SubEventHeader, offset, header.begin_marker)?;
        self.check_header_size(cursor, Structure::SubEventHeader, offset, header.header_size)?;
        trace!(
            offset,
            module_id = header.module_id,
            subevent_size = header.subevent_size,
            "sub-event header decoded"
        );
        Ok(header)
    }

    /// Strict mode requires the exact layout size. Lenient mode accepts a
    /// larger declared size and skips the extension bytes.
    fn check_header_size(
        &self,
        cursor: &mut ByteCursor,
        structure: Structure,
        offset: u64,
        declared: u32,
    ) -> Result<()> {
        let fixed = structure.fixed_len() as u32;
        if declared == fixed {
            return Ok(());
        }
        if self.strict_header_sizes || declared < fixed {
            return Err(DecodeError::UnsupportedHeaderSize {
                structure,
                offset,
                expected: fixed,
                actual: declared,
            });
        }
        cursor.skip(u64::from(declared - fixed))
    }
}

fn check_marker(structure: Structure, offset: u64, actual: u32) -> Result<()> {
    let expected = structure.marker();
    if actual != expected {
        return Err(DecodeError::BadMagic {
            structure,
            offset,
            expected,
            actual,
        });
    }
    Ok(())
}
