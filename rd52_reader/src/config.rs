use std::{fmt, fs, io, path::Path, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::rd52::unpack::DATA_TYPE_MASK;

/// Largest event payload accepted unless configured otherwise (16 MiB).
pub const DEFAULT_MAX_EVENT_PAYLOAD_BYTES: u32 = 16 * 1024 * 1024;

/// Reader tuning knobs.
///
/// Every field has a default, so a JSON file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Require every declared header size to equal the fixed layout size.
    /// When false, larger headers are accepted and their extra bytes skipped.
    pub strict_header_sizes: bool,

    /// Cap on `eventSize - eventHeaderSize`, checked before any buffer grows.
    pub max_event_payload_bytes: u32,

    /// Data-type codes (0 to 7) decoded into samples. Words of any other type
    /// are only counted in `UnpackStats::unknown_words`.
    pub known_data_types: Vec<u8>,

    /// Log a warning for payload words whose data type is not known.
    pub warn_on_unknown_words: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            strict_header_sizes: true,
            max_event_payload_bytes: DEFAULT_MAX_EVENT_PAYLOAD_BYTES,
            known_data_types: (0..=DATA_TYPE_MASK as u8).collect(),
            warn_on_unknown_words: true,
        }
    }
}

impl ReaderConfig {
    /// Load a config from a JSON document on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::io(path, source))?;
        Self::from_json_str(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_event_payload_bytes == 0 {
            return Err(ConfigError::invalid("max_event_payload_bytes must be non-zero"));
        }
        if self.max_event_payload_bytes % 4 != 0 {
            return Err(ConfigError::invalid(
                "max_event_payload_bytes must be a multiple of the 4-byte word size",
            ));
        }
        if let Some(code) = self.known_data_types.iter().find(|&&code| u32::from(code) > DATA_TYPE_MASK) {
            return Err(ConfigError::invalid(format!(
                "known_data_types entry {code} does not fit the 3-bit data type field"
            )));
        }
        Ok(())
    }

    /// `known_data_types` as a bit set, bit `n` for code `n`.
    pub fn data_type_mask(&self) -> u8 {
        self.known_data_types
            .iter()
            .fold(0u8, |mask, &code| mask | (1 << (code & DATA_TYPE_MASK as u8)))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config parse error in {path:?}: {source}")]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(details: impl fmt::Display) -> Self {
        Self::Invalid(details.to_string())
    }
}
