//! Chunked authenticated encryption for client-side file vaults.
//!
//! Small payloads are sealed in one ChaCha20-Poly1305 call; payloads above the
//! configured threshold are split into fixed-size chunks, each sealed under a
//! nonce derived from a per-file base nonce and the chunk's position. Either
//! container can be told apart from its first four bytes.
//!
//! The free functions below use [`CodecConfig::default`]; build a [`Codec`] to
//! choose the threshold and chunk size.

mod codec;
pub mod config;
pub mod crypto;
mod error;
pub mod format;
pub mod size;
pub mod source;
pub mod storage;
pub mod stream;

pub use crate::codec::{Codec, ContainerInfo, inspect, inspect_file, inspect_reader};
pub use crate::config::CodecConfig;
pub use crate::crypto::{AeadProvider, ChaChaProvider, Key, derive_chunk_nonce};
pub use crate::error::{CodecError, Result};
pub use crate::format::{Format, is_streaming};

use zeroize::Zeroizing;

/// Seals `plaintext` single-shot.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    default_codec().encrypt(plaintext, key)
}

/// Seals `plaintext` single-shot or streaming, depending on its size.
pub fn encrypt_large(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    default_codec().encrypt_large(plaintext, key)
}

/// Opens a single-shot container.
pub fn decrypt(sealed: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    default_codec().decrypt(sealed, key)
}

/// Opens a streaming container.
pub fn decrypt_streaming(sealed: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    default_codec().decrypt_streaming(sealed, key)
}

/// Opens a container of either format.
pub fn decrypt_auto(sealed: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    default_codec().decrypt_auto(sealed, key)
}

/// Sealed length for `len` plaintext bytes under the default configuration.
pub fn predict_sealed_size(len: u64) -> u64 {
    size::predict_sealed_size(len, &CodecConfig::default())
}

fn default_codec() -> Codec {
    Codec::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = Key::generate().unwrap();

        let data = b"secret data".to_vec();
        let sealed = encrypt(&data, key.as_bytes()).unwrap();
        let plaintext = decrypt(&sealed, key.as_bytes()).unwrap();

        assert_eq!(*plaintext, data);
    }

    #[test]
    fn auto_decrypt_of_single_shot() {
        let key = [1u8; 32];
        let sealed = encrypt_large(b"small", &key).unwrap();

        assert!(!is_streaming(&sealed));
        assert_eq!(*decrypt_auto(&sealed, &key).unwrap(), b"small");
    }

    #[test]
    fn default_prediction_matches_single_shot_encrypt() {
        let key = [1u8; 32];
        let sealed = encrypt_large(&[0u8; 1000], &key).unwrap();
        assert_eq!(sealed.len() as u64, predict_sealed_size(1000));
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt(b"secret", &[1u8; 32]).unwrap();
        assert!(decrypt(&sealed, &[2u8; 32]).unwrap_err().is_integrity());
    }

    #[test]
    fn streaming_free_function_rejects_single_shot() {
        let sealed = encrypt(b"secret", &[1u8; 32]).unwrap();
        assert!(decrypt_streaming(&sealed, &[1u8; 32]).is_err());
    }
}
