use chacha20poly1305::{
    ChaCha20Poly1305,
    aead::{Aead, KeyInit, Payload},
};
use getrandom::fill;

use super::{Key, NONCE_LEN, Nonce, TAG_LEN};
use crate::error::{CodecError, Result};

/// Seals and opens buffers under a 256-bit key and a 96-bit nonce.
///
/// Implementations return `ciphertext || tag` from [`seal`](Self::seal), where the
/// tag is [`TAG_LEN`] bytes, and report any authentication failure from
/// [`open`](Self::open) as [`CodecError::Integrity`] with no chunk index.
pub trait AeadProvider {
    fn seal(&self, key: &Key, nonce: &Nonce, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    fn open(&self, key: &Key, nonce: &Nonce, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>>;
}

/// ChaCha20-Poly1305 (RFC 8439).
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaChaProvider;

impl AeadProvider for ChaChaProvider {
    fn seal(&self, key: &Key, nonce: &Nonce, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

        cipher
            .encrypt(
                nonce.into(),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CodecError::Encryption)
    }

    fn open(&self, key: &Key, nonce: &Nonce, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < TAG_LEN {
            return Err(CodecError::invalid("sealed payload shorter than tag"));
        }

        let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

        cipher
            .decrypt(nonce.into(), Payload { msg: sealed, aad })
            .map_err(|_| CodecError::Integrity { chunk: None })
    }
}

/// Fill buffer with cryptographically secure random bytes
pub(crate) fn secure_random(buf: &mut [u8]) -> Result<()> {
    fill(buf).map_err(|_| CodecError::Random)
}

/// Generate a fresh random nonce
pub fn generate_nonce() -> Result<Nonce> {
    let mut nonce = [0u8; NONCE_LEN];
    secure_random(&mut nonce)?;
    Ok(nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> Key {
        Key::from_slice(&[byte; 32]).unwrap()
    }

    #[test]
    fn seal_open_roundtrip() {
        let provider = ChaChaProvider;
        let nonce = generate_nonce().unwrap();

        let sealed = provider.seal(&key(1), &nonce, b"", b"secret data").unwrap();
        assert_eq!(sealed.len(), b"secret data".len() + TAG_LEN);

        let opened = provider.open(&key(1), &nonce, b"", &sealed).unwrap();
        assert_eq!(opened, b"secret data");
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let provider = ChaChaProvider;
        let nonce = [9u8; NONCE_LEN];

        let sealed = provider.seal(&key(1), &nonce, b"", b"secret data").unwrap();
        let result = provider.open(&key(2), &nonce, b"", &sealed);

        assert!(matches!(result, Err(CodecError::Integrity { chunk: None })));
    }

    #[test]
    fn open_with_wrong_aad_fails() {
        let provider = ChaChaProvider;
        let nonce = [9u8; NONCE_LEN];

        let sealed = provider.seal(&key(1), &nonce, b"a", b"secret").unwrap();
        assert!(provider.open(&key(1), &nonce, b"b", &sealed).is_err());
    }

    #[test]
    fn open_short_payload_is_structural() {
        let provider = ChaChaProvider;
        let result = provider.open(&key(1), &[0u8; NONCE_LEN], b"", &[0u8; TAG_LEN - 1]);
        assert!(matches!(result, Err(CodecError::InvalidData(_))));
    }

    #[test]
    fn nonces_are_random() {
        assert_ne!(generate_nonce().unwrap(), generate_nonce().unwrap());
    }
}
