//! Cryptographic primitives for the codec.
//!
//! Provides key validation, the AEAD wrapper and per-chunk nonce derivation.

pub mod aead;
pub mod key;
pub mod nonce;

pub use aead::{AeadProvider, ChaChaProvider};
pub use key::Key;
pub use nonce::{derive_chunk_nonce, generate_base_nonce};

/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the nonce (12 bytes for ChaCha20-Poly1305).
pub const NONCE_LEN: usize = 12;
/// Length of the Poly1305 authentication tag (16 bytes).
pub const TAG_LEN: usize = 16;

/// A 96-bit AEAD nonce.
pub type Nonce = [u8; NONCE_LEN];
