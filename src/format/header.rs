use serde::Serialize;

use super::{MAGIC, MAGIC_LEN, VER_LEN};
use crate::config::MAX_CHUNK_SIZE;
use crate::crypto::{NONCE_LEN, Nonce};
use crate::error::{CodecError, Result};
use crate::size::chunk_count;
use crate::source::ByteSource;

pub const VERSION_V1: u8 = 1;

const CHUNK_SIZE_LEN: usize = 4;
const CHUNK_COUNT_LEN: usize = 4;
const PLAINTEXT_LEN: usize = 8;

/// The fixed header at the start of every streaming container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamHeader {
    version: u8,
    chunk_size: u32,
    chunk_count: u32,
    #[serde(skip)]
    base_nonce: Nonce,
    plaintext_len: u64,
}

impl StreamHeader {
    pub const LEN: usize =
        MAGIC_LEN + VER_LEN + CHUNK_SIZE_LEN + CHUNK_COUNT_LEN + NONCE_LEN + PLAINTEXT_LEN;

    /// Builds the header for a plaintext of `plaintext_len` bytes.
    pub fn new(chunk_size: u32, base_nonce: Nonce, plaintext_len: u64) -> Result<Self> {
        if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
            return Err(CodecError::Config(format!(
                "chunk size {chunk_size} outside 1..={MAX_CHUNK_SIZE}"
            )));
        }

        let chunk_count = u32::try_from(chunk_count(plaintext_len, chunk_size))
            .map_err(|_| CodecError::invalid("plaintext too large for streaming format"))?;

        Ok(Self {
            version: VERSION_V1,
            chunk_size,
            chunk_count,
            base_nonce,
            plaintext_len,
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    pub fn base_nonce(&self) -> &Nonce {
        &self.base_nonce
    }

    pub fn plaintext_len(&self) -> u64 {
        self.plaintext_len
    }

    /// Plaintext length of chunk `index`.
    pub fn chunk_len(&self, index: u32) -> usize {
        let start = u64::from(index) * u64::from(self.chunk_size);
        let len = self
            .plaintext_len
            .saturating_sub(start)
            .min(u64::from(self.chunk_size));
        len as usize
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);

        buf.extend_from_slice(MAGIC);
        buf.push(self.version);

        buf.extend_from_slice(&self.chunk_size.to_le_bytes());
        buf.extend_from_slice(&self.chunk_count.to_le_bytes());
        buf.extend_from_slice(&self.base_nonce);
        buf.extend_from_slice(&self.plaintext_len.to_le_bytes());

        buf
    }

    /// Parses and validates a header from the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::LEN {
            return Err(CodecError::invalid(format!(
                "streaming header too short: {} bytes (minimum {})",
                data.len(),
                Self::LEN
            )));
        }

        if &data[..MAGIC_LEN] != MAGIC {
            return Err(CodecError::invalid("invalid streaming magic"));
        }

        let version = data[MAGIC_LEN];

        let mut offset = MAGIC_LEN + VER_LEN;
        let chunk_size = u32::from_le_bytes(field(data, offset));
        offset += CHUNK_SIZE_LEN;

        let chunk_count = u32::from_le_bytes(field(data, offset));
        offset += CHUNK_COUNT_LEN;

        let base_nonce: Nonce = field(data, offset);
        offset += NONCE_LEN;

        let plaintext_len = u64::from_le_bytes(field(data, offset));

        let header = Self {
            version,
            chunk_size,
            chunk_count,
            base_nonce,
            plaintext_len,
        };
        header.validate()?;
        Ok(header)
    }

    /// Reads the header from a source without consuming anything past it.
    pub fn read_from<S: ByteSource>(source: &mut S) -> Result<Self> {
        let bytes = source.read_exact_vec(Self::LEN, "streaming header")?;
        Self::from_bytes(&bytes)
    }

    fn validate(&self) -> Result<()> {
        if self.version != VERSION_V1 {
            return Err(CodecError::invalid(format!(
                "unsupported streaming version: {}",
                self.version
            )));
        }

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(CodecError::invalid(format!(
                "chunk size {} outside 1..={MAX_CHUNK_SIZE}",
                self.chunk_size
            )));
        }

        let expected = chunk_count(self.plaintext_len, self.chunk_size);
        if u64::from(self.chunk_count) != expected {
            return Err(CodecError::invalid(format!(
                "header declares {} chunks but {} plaintext bytes need {expected}",
                self.chunk_count, self.plaintext_len
            )));
        }

        Ok(())
    }
}

/// Copies the `N`-byte field at `offset`; callers check `data` is long enough.
fn field<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&data[offset..offset + N]);
    out
}
