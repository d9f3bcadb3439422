use thiserror::Error;

pub type Result<T, E = CodecError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("{}", integrity_message(.chunk))]
    Integrity { chunk: Option<u64> },

    #[error("encryption failed")]
    Encryption,

    #[error("OS random generator unavailable")]
    Random,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CodecError::InvalidData(msg.into())
    }

    /// Returns `true` for failures raised by parsing alone.
    pub fn is_structural(&self) -> bool {
        matches!(self, CodecError::InvalidData(_))
    }

    /// Returns `true` for AEAD authentication failures.
    pub fn is_integrity(&self) -> bool {
        matches!(self, CodecError::Integrity { .. })
    }
}

fn integrity_message(chunk: &Option<u64>) -> String {
    match chunk {
        Some(index) => {
            format!("chunk {index} failed authentication: wrong key, corrupted or reordered data")
        }
        None => "authentication failed: wrong key or corrupted data".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_message_names_chunk() {
        let err = CodecError::Integrity { chunk: Some(3) };
        assert!(err.to_string().contains("chunk 3"));
        assert!(err.is_integrity());
        assert!(!err.is_structural());
    }

    #[test]
    fn key_length_message_has_both_lengths() {
        let err = CodecError::InvalidKeyLength {
            expected: 32,
            actual: 16,
        };
        assert_eq!(
            err.to_string(),
            "invalid key length: expected 32 bytes, got 16"
        );
    }
}
