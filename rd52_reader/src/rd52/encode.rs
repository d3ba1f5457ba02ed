//! Stream encoder producing well-formed RD52 captures.
//!
//! Sizes are computed the same way the walker checks them: `eventSize` is the
//! event header plus every sub-event payload, and sub-event headers are framing
//! overhead outside that count.

use super::types::{EventHeader, RunHeader, SubEventHeader, WORD_LEN};

/// One module's block of payload words.
#[derive(Debug, Clone, Copy)]
pub struct SubEventBlock<'a> {
    pub module_id: u32,
    pub words: &'a [u32],
}

impl<'a> SubEventBlock<'a> {
    pub fn new(module_id: u32, words: &'a [u32]) -> Self {
        Self { module_id, words }
    }

    fn payload_len(&self) -> u32 {
        (self.words.len() * WORD_LEN) as u32
    }
}

#[derive(Debug, Default, Clone)]
pub struct StreamEncoder {
    bytes: Vec<u8>,
}

impl StreamEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_header(&mut self, header: &RunHeader) -> &mut Self {
        self.bytes.extend_from_slice(&header.to_le_bytes());
        self
    }

    /// Append an event whose sizes are derived from `blocks`.
    pub fn event(
        &mut self,
        event_number: u32,
        spill_number: u32,
        tsec: u32,
        tusec: u32,
        blocks: &[SubEventBlock<'_>],
    ) -> &mut Self {
        let payload_len = blocks.iter().map(SubEventBlock::payload_len).sum();
        let header = EventHeader::new(event_number, spill_number, tsec, tusec, payload_len);
        self.bytes.extend_from_slice(&header.to_le_bytes());
        for block in blocks {
            self.subevent(&SubEventHeader::new(block.module_id, block.payload_len()), block.words);
        }
        self
    }

    /// Append a sub-event verbatim, for hand-built or deliberately broken events.
    pub fn subevent(&mut self, header: &SubEventHeader, words: &[u32]) -> &mut Self {
        self.bytes.extend_from_slice(&header.to_le_bytes());
        for word in words {
            self.bytes.extend_from_slice(&word.to_le_bytes());
        }
        self
    }

    pub fn event_header(&mut self, header: &EventHeader) -> &mut Self {
        self.bytes.extend_from_slice(&header.to_le_bytes());
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}
