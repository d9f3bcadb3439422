//! Byte sources for container parsing.
//!
//! Every structural check in the codec goes through [`ByteSource`]: a read
//! either yields exactly the requested number of bytes or fails with
//! [`CodecError::InvalidData`]. Sinks are plain [`std::io::Write`] values.

use std::io::{ErrorKind, Read};

use crate::error::{CodecError, Result};

pub trait ByteSource {
    /// Reads exactly `len` bytes, failing structurally on a short read.
    fn read_exact_vec(&mut self, len: usize, what: &str) -> Result<Vec<u8>>;

    /// Bytes left in the source, when the source knows it.
    fn remaining(&self) -> Option<u64>;

    /// Returns `true` once no further byte can be read.
    fn is_exhausted(&mut self) -> Result<bool>;

    fn read_array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]>
    where
        Self: Sized,
    {
        let bytes = self.read_exact_vec(N, what)?;
        bytes
            .try_into()
            .map_err(|_| CodecError::invalid(format!("short read for {what}")))
    }
}

/// An in-memory source over a borrowed buffer.
#[derive(Debug)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_exact_vec(&mut self, len: usize, what: &str) -> Result<Vec<u8>> {
        let available = self.data.len() - self.offset;
        if len > available {
            return Err(CodecError::invalid(format!(
                "{what} needs {len} bytes but only {available} remain"
            )));
        }

        let bytes = self.data[self.offset..self.offset + len].to_vec();
        self.offset += len;
        Ok(bytes)
    }

    fn remaining(&self) -> Option<u64> {
        Some((self.data.len() - self.offset) as u64)
    }

    fn is_exhausted(&mut self) -> Result<bool> {
        Ok(self.offset == self.data.len())
    }
}

/// A source over any reader, such as an open file. The reader is borrowed and
/// never closed here.
#[derive(Debug)]
pub struct ReaderSource<'r, R: Read> {
    reader: &'r mut R,
    consumed: u64,
}

impl<'r, R: Read> ReaderSource<'r, R> {
    pub fn new(reader: &'r mut R) -> Self {
        Self {
            reader,
            consumed: 0,
        }
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }
}

impl<R: Read> ByteSource for ReaderSource<'_, R> {
    fn read_exact_vec(&mut self, len: usize, what: &str) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.consumed += len as u64;
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(CodecError::invalid(format!(
                "stream ended while reading {what} ({len} bytes expected)"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn remaining(&self) -> Option<u64> {
        None
    }

    fn is_exhausted(&mut self) -> Result<bool> {
        let mut probe = [0u8; 1];
        loop {
            match self.reader.read(&mut probe) {
                Ok(0) => return Ok(true),
                Ok(_) => {
                    self.consumed += 1;
                    return Ok(false);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn slice_reads_exact_and_tracks_remaining() {
        let data = [1u8, 2, 3, 4, 5];
        let mut src = SliceSource::new(&data);

        assert_eq!(src.read_exact_vec(2, "a").unwrap(), vec![1, 2]);
        assert_eq!(src.remaining(), Some(3));
        assert_eq!(src.read_array::<3>("b").unwrap(), [3, 4, 5]);
        assert!(src.is_exhausted().unwrap());
        assert_eq!(src.offset(), 5);
    }

    #[test]
    fn slice_short_read_is_structural_and_does_not_advance() {
        let data = [1u8, 2, 3];
        let mut src = SliceSource::new(&data);

        let err = src.read_exact_vec(4, "frame").unwrap_err();
        assert!(err.is_structural());
        assert_eq!(src.offset(), 0);
    }

    #[test]
    fn reader_short_read_is_structural() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3]);
        let mut src = ReaderSource::new(&mut cursor);

        let err = src.read_array::<4>("length prefix").unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("length prefix"));
    }

    #[test]
    fn reader_exhaustion_probe() {
        let mut cursor = Cursor::new(vec![9u8]);
        let mut src = ReaderSource::new(&mut cursor);

        assert_eq!(src.remaining(), None);
        assert!(!src.is_exhausted().unwrap());
        assert!(src.is_exhausted().unwrap());
        assert_eq!(src.consumed(), 1);
    }

    #[test]
    fn reader_source_does_not_take_ownership() {
        let mut cursor = Cursor::new(vec![1u8, 2, 3, 4]);
        {
            let mut src = ReaderSource::new(&mut cursor);
            src.read_exact_vec(2, "head").unwrap();
        }
        assert_eq!(cursor.position(), 2);
    }
}
