//! Container formats.
//!
//! Two layouts exist. Payloads up to the configured threshold are sealed
//! single-shot:
//!
//! ```text
//! NONCE (12) | CIPHERTEXT (len) | TAG (16)
//! ```
//!
//! Larger payloads use the streaming layout, a fixed header followed by
//! length-prefixed frames:
//!
//! ```text
//! MAGIC (4) | VERSION (1) | CHUNK_SIZE (4) | CHUNK_COUNT (4) | BASE_NONCE (12) | PLAINTEXT_LEN (8)
//! FRAME_LEN (4) | CIPHERTEXT || TAG (FRAME_LEN)    (repeated CHUNK_COUNT times)
//! ```

use serde::Serialize;

pub mod header;
pub mod single;

pub use header::StreamHeader;

/// Magic bytes identifying a streaming container ("SBXS").
pub const MAGIC: &[u8; 4] = b"SBXS";
/// Length of magic bytes.
pub const MAGIC_LEN: usize = 4;
/// Length of version field.
pub const VER_LEN: usize = 1;
/// Latest streaming format version.
pub const CURRENT_VERSION: u8 = header::VERSION_V1;
/// Length of a frame's length prefix.
pub const FRAME_LEN_PREFIX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    SingleShot,
    Streaming,
}

/// Picks the container format for a plaintext of `len` bytes.
///
/// Exactly `threshold` bytes is still single-shot.
pub fn select_format(len: u64, threshold: u64) -> Format {
    if len <= threshold {
        Format::SingleShot
    } else {
        Format::Streaming
    }
}

/// Returns `true` if `data` starts with the streaming magic. Never fails,
/// inputs shorter than the magic are simply not streaming.
pub fn is_streaming(data: &[u8]) -> bool {
    data.len() >= MAGIC_LEN && &data[..MAGIC_LEN] == MAGIC
}

/// Detects the format of a sealed container from its leading bytes.
pub fn detect(data: &[u8]) -> Format {
    if is_streaming(data) {
        Format::Streaming
    } else {
        Format::SingleShot
    }
}
