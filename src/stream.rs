//! Streaming containers: a [`StreamHeader`] followed by one length-prefixed
//! frame per chunk.
//!
//! Each chunk is sealed under the nonce derived from the header's base nonce
//! and the chunk's position, so a frame only authenticates at the index it
//! was written for. Memory use is bounded by one chunk in each direction.

use std::io::{Read, Write};

use zeroize::Zeroizing;

use crate::crypto::{AeadProvider, Key, TAG_LEN, derive_chunk_nonce, generate_base_nonce};
use crate::error::{CodecError, Result};
use crate::format::{FRAME_LEN_PREFIX, StreamHeader};
use crate::size::predict_streaming_size;
use crate::source::{ByteSource, ReaderSource, SliceSource};

/// Seals chunks one at a time, in order.
pub struct StreamEncryptor<'a, P: AeadProvider> {
    provider: &'a P,
    key: &'a Key,
    header: StreamHeader,
    next_index: u32,
}

impl<'a, P: AeadProvider> StreamEncryptor<'a, P> {
    /// Starts a stream for `plaintext_len` bytes under a fresh base nonce.
    pub fn new(provider: &'a P, key: &'a Key, chunk_size: u32, plaintext_len: u64) -> Result<Self> {
        let header = StreamHeader::new(chunk_size, generate_base_nonce()?, plaintext_len)?;
        Ok(Self {
            provider,
            key,
            header,
            next_index: 0,
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Plaintext length the next call to [`seal_chunk`](Self::seal_chunk) expects,
    /// or `None` once every chunk is sealed.
    pub fn next_chunk_len(&self) -> Option<usize> {
        (self.next_index < self.header.chunk_count()).then(|| self.header.chunk_len(self.next_index))
    }

    pub fn is_finished(&self) -> bool {
        self.next_index == self.header.chunk_count()
    }

    /// Seals the next chunk and returns its complete frame.
    pub fn seal_chunk(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let index = self.next_index;
        let expected = self
            .next_chunk_len()
            .ok_or_else(|| CodecError::invalid("all declared chunks already sealed"))?;
        if plaintext.len() != expected {
            return Err(CodecError::invalid(format!(
                "chunk {index} must be {expected} bytes, got {}",
                plaintext.len()
            )));
        }

        let nonce = derive_chunk_nonce(self.header.base_nonce(), u64::from(index));
        let sealed = self.provider.seal(self.key, &nonce, &[], plaintext)?;
        let frame_len = u32::try_from(sealed.len())
            .map_err(|_| CodecError::invalid("sealed chunk exceeds frame length field"))?;

        let mut frame = Vec::with_capacity(FRAME_LEN_PREFIX + sealed.len());
        frame.extend_from_slice(&frame_len.to_le_bytes());
        frame.extend_from_slice(&sealed);

        tracing::trace!(chunk = index, len = plaintext.len(), "sealed chunk");
        self.next_index += 1;
        Ok(frame)
    }
}

/// Opens frames one at a time from a [`ByteSource`].
///
/// Dropping the decryptor between chunks abandons the stream; nothing is
/// returned for a frame that did not authenticate.
pub struct StreamDecryptor<'a, P: AeadProvider, S: ByteSource> {
    provider: &'a P,
    key: &'a Key,
    source: S,
    header: StreamHeader,
    next_index: u32,
    produced: u64,
    finished: bool,
}

impl<'a, P: AeadProvider, S: ByteSource> StreamDecryptor<'a, P, S> {
    /// Reads and validates the header. No cryptography happens here.
    pub fn new(provider: &'a P, key: &'a Key, mut source: S) -> Result<Self> {
        let header = StreamHeader::read_from(&mut source)?;
        tracing::debug!(
            chunks = header.chunk_count(),
            chunk_size = header.chunk_size(),
            plaintext_len = header.plaintext_len(),
            "opening streaming container"
        );

        Ok(Self {
            provider,
            key,
            source,
            header,
            next_index: 0,
            produced: 0,
            finished: false,
        })
    }

    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Authenticates and returns the next chunk, or `None` after the last
    /// declared chunk once the source is confirmed to hold nothing more.
    pub fn next_chunk(&mut self) -> Result<Option<Zeroizing<Vec<u8>>>> {
        if self.finished {
            return Ok(None);
        }

        let index = self.next_index;
        if index == self.header.chunk_count() {
            self.finish()?;
            return Ok(None);
        }

        let frame_len = self.read_frame_len(index)?;
        let sealed = self
            .source
            .read_exact_vec(frame_len, &format!("frame of chunk {index}"))?;

        let nonce = derive_chunk_nonce(self.header.base_nonce(), u64::from(index));
        let plaintext = match self.provider.open(self.key, &nonce, &[], &sealed) {
            Ok(plaintext) => Zeroizing::new(plaintext),
            Err(CodecError::Integrity { .. }) => {
                tracing::warn!(chunk = index, "chunk failed authentication");
                return Err(CodecError::Integrity {
                    chunk: Some(u64::from(index)),
                });
            }
            Err(e) => return Err(e),
        };

        tracing::trace!(chunk = index, len = plaintext.len(), "opened chunk");
        self.produced += plaintext.len() as u64;
        self.next_index += 1;
        Ok(Some(plaintext))
    }

    fn read_frame_len(&mut self, index: u32) -> Result<usize> {
        let prefix = self
            .source
            .read_array::<FRAME_LEN_PREFIX>(&format!("length prefix of chunk {index}"))?;
        let frame_len = u32::from_le_bytes(prefix) as usize;

        // the header fixes every frame's length
        let expected = self.header.chunk_len(index) + TAG_LEN;
        if frame_len != expected {
            return Err(CodecError::invalid(format!(
                "chunk {index} declares {frame_len} bytes, expected {expected}"
            )));
        }
        if let Some(remaining) = self.source.remaining() {
            if frame_len as u64 > remaining {
                return Err(CodecError::invalid(format!(
                    "chunk {index} declares {frame_len} bytes but only {remaining} remain"
                )));
            }
        }

        Ok(frame_len)
    }

    fn finish(&mut self) -> Result<()> {
        if !self.source.is_exhausted()? {
            return Err(CodecError::invalid("trailing data after last chunk"));
        }
        if self.produced != self.header.plaintext_len() {
            return Err(CodecError::invalid(format!(
                "decrypted {} bytes but header declares {}",
                self.produced,
                self.header.plaintext_len()
            )));
        }
        self.finished = true;
        Ok(())
    }
}

/// Encrypts exactly `plaintext_len` bytes from `reader` into a streaming
/// container written to `writer`. Returns the number of bytes written.
///
/// The reader must supply exactly `plaintext_len` bytes; a shorter or longer
/// source is rejected.
pub fn encrypt_stream<P, R, W>(
    provider: &P,
    key: &Key,
    chunk_size: u32,
    reader: &mut R,
    plaintext_len: u64,
    writer: &mut W,
) -> Result<u64>
where
    P: AeadProvider,
    R: Read,
    W: Write,
{
    let mut encryptor = StreamEncryptor::new(provider, key, chunk_size, plaintext_len)?;
    tracing::debug!(
        chunks = encryptor.header().chunk_count(),
        chunk_size,
        plaintext_len,
        "writing streaming container"
    );

    writer.write_all(&encryptor.header().to_bytes())?;
    let mut written = StreamHeader::LEN as u64;

    let mut source = ReaderSource::new(reader);
    while let Some(len) = encryptor.next_chunk_len() {
        let chunk = Zeroizing::new(source.read_exact_vec(len, "plaintext chunk")?);

        let frame = encryptor.seal_chunk(&chunk)?;
        writer.write_all(&frame)?;
        written += frame.len() as u64;
    }

    if !source.is_exhausted()? {
        return Err(CodecError::invalid(format!(
            "plaintext source is longer than the declared {plaintext_len} bytes"
        )));
    }

    writer.flush()?;
    Ok(written)
}

/// Decrypts a streaming container from `source` into `writer`, returning the
/// plaintext length.
///
/// Every chunk is authenticated before it is written, but a failure on a later
/// chunk leaves earlier chunks in `writer`; callers writing to a destination
/// they cannot discard should use the buffer or file entry points instead.
pub fn decrypt_stream<P, S, W>(provider: &P, key: &Key, source: S, writer: &mut W) -> Result<u64>
where
    P: AeadProvider,
    S: ByteSource,
    W: Write,
{
    let mut decryptor = StreamDecryptor::new(provider, key, source)?;
    while let Some(chunk) = decryptor.next_chunk()? {
        writer.write_all(&chunk)?;
    }
    writer.flush()?;
    Ok(decryptor.header().plaintext_len())
}

/// Seals an in-memory plaintext as a streaming container.
pub fn seal<P: AeadProvider>(provider: &P, key: &Key, chunk_size: u32, plaintext: &[u8]) -> Result<Vec<u8>> {
    let len = plaintext.len() as u64;
    let mut out = Vec::with_capacity(predict_streaming_size(len, chunk_size) as usize);
    let mut reader = plaintext;
    encrypt_stream(provider, key, chunk_size, &mut reader, len, &mut out)?;
    Ok(out)
}

/// Opens an in-memory streaming container. Plaintext is only returned if
/// every chunk authenticated.
pub fn open<P: AeadProvider>(provider: &P, key: &Key, container: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut decryptor = StreamDecryptor::new(provider, key, SliceSource::new(container))?;

    let capacity = decryptor.header().plaintext_len().min(container.len() as u64);
    let mut out = Zeroizing::new(Vec::with_capacity(capacity as usize));
    while let Some(chunk) = decryptor.next_chunk()? {
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ChaChaProvider;
    use std::io::Cursor;

    const CHUNK: u32 = 16;

    fn key() -> Key {
        Key::from_slice(&[0x42; 32]).unwrap()
    }

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Byte offset of frame `index` in a container whose chunks are all full.
    fn frame_offset(index: usize) -> usize {
        StreamHeader::LEN + index * (FRAME_LEN_PREFIX + CHUNK as usize + TAG_LEN)
    }

    #[test]
    fn roundtrip_with_partial_final_chunk() {
        let plaintext = data(CHUNK as usize * 3 + 5);
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &plaintext).unwrap();
        assert_eq!(*open(&ChaChaProvider, &key(), &sealed).unwrap(), plaintext);
    }

    #[test]
    fn roundtrip_empty_stream_has_single_empty_frame() {
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, b"").unwrap();
        assert_eq!(sealed.len(), StreamHeader::LEN + FRAME_LEN_PREFIX + TAG_LEN);
        assert!(open(&ChaChaProvider, &key(), &sealed).unwrap().is_empty());
    }

    #[test]
    fn frame_lengths_are_little_endian_sealed_sizes() {
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(20)).unwrap();

        let first = &sealed[StreamHeader::LEN..StreamHeader::LEN + 4];
        assert_eq!(first, &(CHUNK + TAG_LEN as u32).to_le_bytes());

        let second_at = frame_offset(1);
        assert_eq!(&sealed[second_at..second_at + 4], &(4u32 + TAG_LEN as u32).to_le_bytes());
    }

    #[test]
    fn first_chunk_uses_base_nonce() {
        let plaintext = data(CHUNK as usize * 2);
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &plaintext).unwrap();
        let header = StreamHeader::from_bytes(&sealed).unwrap();

        let frame0 = &sealed[frame_offset(0) + 4..frame_offset(1)];
        let opened = ChaChaProvider
            .open(&key(), header.base_nonce(), &[], frame0)
            .unwrap();
        assert_eq!(opened, &plaintext[..CHUNK as usize]);
    }

    #[test]
    fn flipped_byte_in_any_chunk_fails_integrity() {
        let plaintext = data(CHUNK as usize * 3);
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &plaintext).unwrap();

        for index in 0..3 {
            let mut tampered = sealed.clone();
            tampered[frame_offset(index) + 4 + 3] ^= 0x01;
            match open(&ChaChaProvider, &key(), &tampered) {
                Err(CodecError::Integrity { chunk }) => assert_eq!(chunk, Some(index as u64)),
                other => panic!("expected Integrity for chunk {index}, got: {other:?}"),
            }
        }
    }

    #[test]
    fn swapped_frames_fail_integrity() {
        let plaintext = data(CHUNK as usize * 3);
        let mut sealed = seal(&ChaChaProvider, &key(), CHUNK, &plaintext).unwrap();

        let a = sealed[frame_offset(0)..frame_offset(1)].to_vec();
        let b = sealed[frame_offset(1)..frame_offset(2)].to_vec();
        sealed[frame_offset(0)..frame_offset(1)].copy_from_slice(&b);
        sealed[frame_offset(1)..frame_offset(2)].copy_from_slice(&a);

        match open(&ChaChaProvider, &key(), &sealed) {
            Err(CodecError::Integrity { chunk }) => assert_eq!(chunk, Some(0)),
            other => panic!("expected Integrity, got: {other:?}"),
        }
    }

    #[test]
    fn truncated_frame_is_structural() {
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(40)).unwrap();
        let cut = &sealed[..StreamHeader::LEN + 10];

        let err = open(&ChaChaProvider, &key(), cut).unwrap_err();
        assert!(err.is_structural(), "got {err:?}");
    }

    #[test]
    fn truncated_length_prefix_is_structural() {
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(40)).unwrap();
        let cut = &sealed[..StreamHeader::LEN + 2];

        let err = open(&ChaChaProvider, &key(), cut).unwrap_err();
        assert!(err.to_string().contains("length prefix of chunk 0"));
    }

    #[test]
    fn missing_final_frame_is_structural() {
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(CHUNK as usize * 3)).unwrap();
        let cut = &sealed[..frame_offset(2)];

        let err = open(&ChaChaProvider, &key(), cut).unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("chunk 2"));
    }

    #[test]
    fn oversized_frame_length_is_structural() {
        let mut sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(40)).unwrap();
        let at = StreamHeader::LEN;
        sealed[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let err = open(&ChaChaProvider, &key(), &sealed).unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn length_prefix_must_match_header() {
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(40)).unwrap();

        for declared in [TAG_LEN as u32, CHUNK + TAG_LEN as u32 - 1, 0] {
            let mut tampered = sealed.clone();
            let at = frame_offset(1);
            tampered[at..at + 4].copy_from_slice(&declared.to_le_bytes());

            let err = open(&ChaChaProvider, &key(), &tampered).unwrap_err();
            assert!(err.is_structural(), "declared {declared}: {err:?}");
            assert!(err.to_string().contains("chunk 1 declares"));
        }
    }

    #[test]
    fn short_final_frame_length_is_checked() {
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(40)).unwrap();
        let mut tampered = sealed.clone();
        let at = frame_offset(2);
        // final chunk holds 8 bytes; claim a full one
        tampered[at..at + 4].copy_from_slice(&(CHUNK + TAG_LEN as u32).to_le_bytes());

        assert!(open(&ChaChaProvider, &key(), &tampered).unwrap_err().is_structural());
    }

    #[test]
    fn trailing_bytes_are_structural() {
        let mut sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(40)).unwrap();
        sealed.push(0);

        let err = open(&ChaChaProvider, &key(), &sealed).unwrap_err();
        assert!(err.to_string().contains("trailing data"));
    }

    #[test]
    fn wrong_key_fails_on_first_chunk() {
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &data(40)).unwrap();
        let other = Key::from_slice(&[0x24; 32]).unwrap();

        assert!(matches!(
            open(&ChaChaProvider, &other, &sealed),
            Err(CodecError::Integrity { chunk: Some(0) })
        ));
    }

    #[test]
    fn reader_and_writer_entry_points() {
        let plaintext = data(100);
        let mut reader = Cursor::new(plaintext.clone());
        let mut sealed = Vec::new();
        let written = encrypt_stream(
            &ChaChaProvider,
            &key(),
            CHUNK,
            &mut reader,
            plaintext.len() as u64,
            &mut sealed,
        )
        .unwrap();
        assert_eq!(written, sealed.len() as u64);
        assert_eq!(written, predict_streaming_size(100, CHUNK));

        let mut input = Cursor::new(sealed);
        let mut output = Vec::new();
        let len = decrypt_stream(
            &ChaChaProvider,
            &key(),
            ReaderSource::new(&mut input),
            &mut output,
        )
        .unwrap();
        assert_eq!(len, 100);
        assert_eq!(output, plaintext);
    }

    #[test]
    fn short_plaintext_source_is_rejected() {
        let mut reader = Cursor::new(data(10));
        let err = encrypt_stream(&ChaChaProvider, &key(), CHUNK, &mut reader, 20, &mut Vec::new())
            .unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn long_plaintext_source_is_rejected() {
        let mut reader = Cursor::new(data(30));
        let err = encrypt_stream(&ChaChaProvider, &key(), CHUNK, &mut reader, 20, &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("longer than the declared"));
    }

    #[test]
    fn decryptor_can_stop_between_chunks() {
        let plaintext = data(CHUNK as usize * 4);
        let sealed = seal(&ChaChaProvider, &key(), CHUNK, &plaintext).unwrap();

        let k = key();
        let mut decryptor =
            StreamDecryptor::new(&ChaChaProvider, &k, SliceSource::new(&sealed)).unwrap();
        let first = decryptor.next_chunk().unwrap().unwrap();
        assert_eq!(*first, plaintext[..CHUNK as usize]);
        assert_eq!(decryptor.header().chunk_count(), 4);
    }

    #[test]
    fn encryptor_rejects_wrong_chunk_length() {
        let k = key();
        let mut encryptor = StreamEncryptor::new(&ChaChaProvider, &k, CHUNK, 20).unwrap();

        assert!(encryptor.seal_chunk(&data(10)).is_err());
        encryptor.seal_chunk(&data(16)).unwrap();
        encryptor.seal_chunk(&data(4)).unwrap();
        assert!(encryptor.is_finished());
        assert!(encryptor.seal_chunk(b"").is_err());
    }
}
