//! Payload word unpacking.
//!
//! Each 32-bit payload word packs a data type, a channel index and a 12-bit
//! value. Only the constants below describe the layout; a format revision
//! changes them and nothing else.
//!
//! The meaning of individual data-type codes is not fixed by the format, so
//! every accepted word becomes a [`Sample`] tagged with its raw code. Codes
//! outside the unpacker's known set are counted, never sampled.

use std::collections::BTreeMap;

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use tracing::warn;

use super::types::WORD_LEN;

/// Data word bit layout
pub const DATA_TYPE_SHIFT: u32 = 24;
pub const DATA_TYPE_MASK: u32 = 0x7;
pub const CHANNEL_SHIFT: u32 = 17;
pub const CHANNEL_MASK: u32 = 0xF;
pub const VALUE_SHIFT: u32 = 0;
pub const VALUE_MASK: u32 = 0xFFF;

/// Bit set with every 3-bit data-type code marked as known.
pub const ALL_DATA_TYPES: u8 = 0xFF;

/// One payload word split into its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataWord {
    pub data_type: u8,
    pub channel: u8,
    pub value: u16,
}

impl DataWord {
    pub fn decode(word: u32) -> Self {
        Self {
            data_type: ((word >> DATA_TYPE_SHIFT) & DATA_TYPE_MASK) as u8,
            channel: ((word >> CHANNEL_SHIFT) & CHANNEL_MASK) as u8,
            value: ((word >> VALUE_SHIFT) & VALUE_MASK) as u16,
        }
    }

    /// Inverse of [`DataWord::decode`]; bits outside the three fields stay zero.
    pub fn encode(&self) -> u32 {
        ((u32::from(self.data_type) & DATA_TYPE_MASK) << DATA_TYPE_SHIFT)
            | ((u32::from(self.channel) & CHANNEL_MASK) << CHANNEL_SHIFT)
            | ((u32::from(self.value) & VALUE_MASK) << VALUE_SHIFT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Sample {
    pub data_type: u8,
    pub value: u16,
}

/// Channel index to samples in payload word order.
pub type ChannelMap = BTreeMap<u8, Vec<Sample>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnpackStats {
    pub words: u64,
    pub samples: u64,
    /// Words whose data type is outside the known set
    pub unknown_words: u64,
}

impl UnpackStats {
    pub fn merge(&mut self, other: &UnpackStats) {
        self.words += other.words;
        self.samples += other.samples;
        self.unknown_words += other.unknown_words;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PayloadUnpacker {
    /// Bit `n` set means data type `n` is sampled
    known_types: u8,
    warn_on_unknown: bool,
}

impl Default for PayloadUnpacker {
    fn default() -> Self {
        Self::new(ALL_DATA_TYPES, true)
    }
}

impl PayloadUnpacker {
    pub fn new(known_types: u8, warn_on_unknown: bool) -> Self {
        Self {
            known_types,
            warn_on_unknown,
        }
    }

    pub fn is_known(&self, data_type: u8) -> bool {
        data_type <= DATA_TYPE_MASK as u8 && self.known_types & (1 << data_type) != 0
    }

    pub fn unpack(&self, words: &[u32]) -> (ChannelMap, UnpackStats) {
        let mut channels = ChannelMap::new();
        let mut stats = UnpackStats::default();
        self.unpack_into(words.iter().copied(), &mut channels, &mut stats);
        (channels, stats)
    }

    /// Unpack a little-endian payload buffer. The length must be a whole
    /// number of words; the stream walker validates that before reading.
    pub fn unpack_bytes_into(&self, payload: &[u8], channels: &mut ChannelMap, stats: &mut UnpackStats) {
        debug_assert_eq!(payload.len() % WORD_LEN, 0);
        let words = payload.chunks_exact(WORD_LEN).map(LittleEndian::read_u32);
        self.unpack_into(words, channels, stats);
    }

    /// Append decoded samples to `channels`, so consecutive calls concatenate
    /// per-channel sequences in call order.
    pub fn unpack_into<I>(&self, words: I, channels: &mut ChannelMap, stats: &mut UnpackStats)
    where
        I: IntoIterator<Item = u32>,
    {
        let mut unknown = 0u64;
        for raw in words {
            stats.words += 1;
            let word = DataWord::decode(raw);
            if !self.is_known(word.data_type) {
                unknown += 1;
                continue;
            }
            stats.samples += 1;
            channels.entry(word.channel).or_default().push(Sample {
                data_type: word.data_type,
                value: word.value,
            });
        }

        stats.unknown_words += unknown;
        if unknown > 0 && self.warn_on_unknown {
            warn!(count = unknown, "payload words with unknown data type");
        }
    }
}

pub fn pack_word(channel: u8, sample: Sample) -> u32 {
    DataWord {
        data_type: sample.data_type,
        channel,
        value: sample.value,
    }
    .encode()
}

/// Encode a channel map back into payload words, channels ascending and
/// samples in stored order.
pub fn pack_channel_map(channels: &ChannelMap) -> Vec<u32> {
    channels
        .iter()
        .flat_map(|(&channel, samples)| samples.iter().map(move |&s| pack_word(channel, s)))
        .collect()
}
