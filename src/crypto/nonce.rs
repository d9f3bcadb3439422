//! Per-chunk nonce derivation.
//!
//! A streaming container stores one random base nonce. The nonce for chunk `i`
//! is the base nonce with its last 8 bytes XOR-ed with `i` encoded as a
//! little-endian `u64`; the first 4 bytes are never touched. This mapping is
//! part of the wire format.

use super::{NONCE_LEN, Nonce, aead};
use crate::error::Result;

/// Number of leading nonce bytes left unchanged by derivation.
const FIXED_PREFIX_LEN: usize = NONCE_LEN - 8;

/// Derive the nonce for chunk `index` from the container's base nonce.
///
/// Index 0 returns `base` unchanged.
pub fn derive_chunk_nonce(base: &Nonce, index: u64) -> Nonce {
    let mut nonce = *base;
    for (byte, ctr) in nonce[FIXED_PREFIX_LEN..]
        .iter_mut()
        .zip(index.to_le_bytes())
    {
        *byte ^= ctr;
    }
    nonce
}

/// Generate a fresh random base nonce for one encryption call.
pub fn generate_base_nonce() -> Result<Nonce> {
    aead::generate_nonce()
}
