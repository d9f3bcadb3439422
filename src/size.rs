//! Sealed-size prediction.
//!
//! Pure arithmetic over plaintext lengths. Shares [`select_format`] with the
//! encrypt paths so a prediction and an actual encryption always take the same
//! branch.

use crate::config::CodecConfig;
use crate::crypto::TAG_LEN;
use crate::format::{FRAME_LEN_PREFIX, Format, StreamHeader, select_format, single};

/// Number of chunks a streaming container holds for `len` plaintext bytes.
///
/// An empty plaintext still occupies one (empty) chunk.
pub fn chunk_count(len: u64, chunk_size: u32) -> u64 {
    let chunk_size = u64::from(chunk_size.max(1));
    len.div_ceil(chunk_size).max(1)
}

/// Exact length of a single-shot container for `len` plaintext bytes.
pub fn predict_single_shot_size(len: u64) -> u64 {
    len.saturating_add(single::OVERHEAD as u64)
}

/// Exact length of a streaming container for `len` plaintext bytes.
///
/// Ciphertext is as long as plaintext, so each frame adds only its length
/// prefix and tag.
pub fn predict_streaming_size(len: u64, chunk_size: u32) -> u64 {
    let per_frame = (FRAME_LEN_PREFIX + TAG_LEN) as u64;
    let frames = chunk_count(len, chunk_size);

    (StreamHeader::LEN as u64)
        .saturating_add(frames.saturating_mul(per_frame))
        .saturating_add(len)
}

/// Exact sealed length for `len` plaintext bytes under `config`.
pub fn predict_sealed_size(len: u64, config: &CodecConfig) -> u64 {
    match select_format(len, config.threshold) {
        Format::SingleShot => predict_single_shot_size(len),
        Format::Streaming => predict_streaming_size(len, config.chunk_size),
    }
}
