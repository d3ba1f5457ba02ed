//! Collaborators that receive decoded data.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde::Serialize;

use super::types::DecodedEvent;

pub const PARAM_NUMBER_OF_EVENTS: &str = "Number of events";
pub const PARAM_MAGIC_WORD: &str = "Magic word";

/// Receives decoded events in file order. Hand-off is synchronous and
/// cannot be refused.
pub trait EventSink {
    fn on_event(&mut self, event: DecodedEvent);
}

impl EventSink for Vec<DecodedEvent> {
    fn on_event(&mut self, event: DecodedEvent) {
        self.push(event);
    }
}

/// Receives run-level metadata.
pub trait RunMetadata {
    fn set_run_number(&mut self, run_number: u32);
    fn set_start_time(&mut self, start_time: u32);
    fn set_end_time(&mut self, end_time: u32);
    fn set_parameter(&mut self, name: &str, value: u64);
}

/// Plain run record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub run_number: Option<u32>,
    pub start_time: Option<u32>,
    pub end_time: Option<u32>,
    pub parameters: BTreeMap<String, u64>,
}

impl RunRecord {
    pub fn parameter(&self, name: &str) -> Option<u64> {
        self.parameters.get(name).copied()
    }
}

impl RunMetadata for RunRecord {
    fn set_run_number(&mut self, run_number: u32) {
        self.run_number = Some(run_number);
    }

    fn set_start_time(&mut self, start_time: u32) {
        self.start_time = Some(start_time);
    }

    fn set_end_time(&mut self, end_time: u32) {
        self.end_time = Some(end_time);
    }

    fn set_parameter(&mut self, name: &str, value: u64) {
        self.parameters.insert(name.to_string(), value);
    }
}

/// Writes one JSON document per event.
///
/// `on_event` cannot fail, so the first write error is held and every later
/// event is dropped; `finish` reports it.
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
    error: Option<io::Error>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            error: None,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> io::Result<W> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_event(&mut self, event: &DecodedEvent) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn on_event(&mut self, event: DecodedEvent) {
        if self.error.is_some() {
            return;
        }
        match self.write_event(&event) {
            Ok(()) => self.written += 1,
            Err(err) => self.error = Some(err),
        }
    }
}
