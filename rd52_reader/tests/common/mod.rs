#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rd52_reader::{RunHeader, StreamEncoder, SubEventBlock};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Route reader logs through the test harness; `RUST_LOG` overrides the level.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Data-type 0 payload word for `channel` carrying `value`.
pub fn measurement_word(channel: u8, value: u16) -> u32 {
    (u32::from(channel & 0xF) << 17) | u32::from(value & 0xFFF)
}

/// Capture with `event_count` events numbered from 1, each with one
/// sub-event of two words.
pub fn build_capture(run_number: u32, event_count: u32) -> Vec<u8> {
    let mut encoder = StreamEncoder::new();
    encoder.run_header(&RunHeader::new(run_number, event_count, 1000, 2000));
    for n in 1..=event_count {
        let words = [
            measurement_word((n % 16) as u8, (n * 3) as u16),
            measurement_word(15, n as u16),
        ];
        encoder.event(n, n / 10, 5 + n, n * 100, &[SubEventBlock::new(3, &words)]);
    }
    encoder.finish()
}

pub fn write_capture(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}
