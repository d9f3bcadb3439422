//! Codec configuration.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Payloads up to this many bytes are sealed single-shot (10 MiB).
pub const DEFAULT_THRESHOLD: u64 = 10 * 1024 * 1024;
/// Plaintext bytes per full streaming chunk (1 MiB).
pub const DEFAULT_CHUNK_SIZE: u32 = 1024 * 1024;
/// Upper bound on the chunk size, for writing and for accepting headers.
pub const MAX_CHUNK_SIZE: u32 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Largest plaintext length still sealed single-shot.
    pub threshold: u64,
    /// Plaintext bytes per chunk in streaming containers.
    pub chunk_size: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl CodecConfig {
    pub fn new(threshold: u64, chunk_size: u32) -> Result<Self> {
        let config = Self {
            threshold,
            chunk_size,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CodecError::Config("chunk size must be >= 1".into()));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(CodecError::Config(format!(
                "chunk size must be <= {MAX_CHUNK_SIZE}"
            )));
        }
        Ok(())
    }

    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path)?;
        let config: Self = serde_json::from_slice(&raw)
            .map_err(|e| CodecError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }
}

/// Platform config location, e.g. `~/.config/strongbox/config.json` on Linux.
pub fn default_config_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "strongbox")
        .ok_or_else(|| CodecError::Config("could not determine platform directories".into()))?;

    Ok(project_dirs.config_dir().join("config.json"))
}
