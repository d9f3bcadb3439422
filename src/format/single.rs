//! Single-shot containers: `NONCE (12) | CIPHERTEXT | TAG (16)`.

use zeroize::Zeroizing;

use super::is_streaming;
use crate::crypto::{AeadProvider, Key, NONCE_LEN, Nonce, TAG_LEN, aead::generate_nonce};
use crate::error::{CodecError, Result};

/// Fixed overhead of a single-shot container.
pub const OVERHEAD: usize = NONCE_LEN + TAG_LEN;

/// Seals `plaintext` under a fresh random nonce.
///
/// The nonce never begins with the streaming magic, so [`detect`](super::detect)
/// can't mistake a single-shot container for a streaming one.
pub fn seal<P: AeadProvider>(provider: &P, key: &Key, plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = loop {
        let candidate = generate_nonce()?;
        if !is_streaming(&candidate) {
            break candidate;
        }
    };
    seal_with_nonce(provider, key, &nonce, plaintext)
}

pub(crate) fn seal_with_nonce<P: AeadProvider>(
    provider: &P,
    key: &Key,
    nonce: &Nonce,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let sealed = provider.seal(key, nonce, &[], plaintext)?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Opens a single-shot container.
///
/// Buffers shorter than [`OVERHEAD`] are rejected before any cryptography.
pub fn open<P: AeadProvider>(
    provider: &P,
    key: &Key,
    container: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if container.len() < OVERHEAD {
        return Err(CodecError::invalid(format!(
            "sealed data too short: {} bytes (minimum {OVERHEAD})",
            container.len()
        )));
    }

    let (nonce, sealed) = container.split_at(NONCE_LEN);
    let nonce: Nonce = nonce
        .try_into()
        .map_err(|_| CodecError::invalid("invalid nonce length"))?;

    let plaintext = provider.open(key, &nonce, &[], sealed).inspect_err(|e| {
        if e.is_integrity() {
            tracing::warn!(len = container.len(), "single-shot container failed authentication");
        }
    })?;
    Ok(Zeroizing::new(plaintext))
}
