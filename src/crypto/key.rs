use std::fmt;

use getrandom::fill;
use zeroize::Zeroizing;

use super::KEY_LEN;
use crate::error::{CodecError, Result};

/// A validated 256-bit key, wiped from memory on drop.
#[derive(Clone)]
pub struct Key {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl Key {
    /// Copies `bytes` into a key, rejecting anything that is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CodecError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self {
            bytes: Zeroizing::new(array),
        })
    }

    /// Generates a fresh random key.
    pub fn generate() -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        fill(&mut bytes[..]).map_err(|_| CodecError::Random)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key").field("bytes", &"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_exactly_32_bytes() {
        let key = Key::from_slice(&[7u8; 32]).unwrap();
        assert_eq!(key.as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn rejects_wrong_lengths() {
        for len in [0usize, 16, 31, 33, 64] {
            match Key::from_slice(&vec![0u8; len]) {
                Err(CodecError::InvalidKeyLength { expected, actual }) => {
                    assert_eq!(expected, 32);
                    assert_eq!(actual, len);
                }
                other => panic!("expected InvalidKeyLength for {len}, got: {other:?}"),
            }
        }
    }

    #[test]
    fn generated_keys_differ() {
        let a = Key::generate().unwrap();
        let b = Key::generate().unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn debug_redacts_bytes() {
        let key = Key::from_slice(&[0xAB; 32]).unwrap();
        let printed = format!("{key:?}");
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("171"));
    }
}
