//! The codec facade: format selection over the single-shot and streaming
//! layouts, for buffers, readers/writers and files.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::Path;

use serde::Serialize;
use zeroize::Zeroizing;

use crate::config::CodecConfig;
use crate::crypto::{AeadProvider, ChaChaProvider, Key};
use crate::error::{CodecError, Result};
use crate::format::{self, Format, MAGIC_LEN, StreamHeader, single};
use crate::size;
use crate::source::{ByteSource, ReaderSource};
use crate::storage::AtomicFile;
use crate::stream;

/// A stateless encrypt/decrypt service.
///
/// Holds only its configuration and the AEAD provider, so one instance can be
/// shared freely across threads; keys are borrowed per call.
#[derive(Debug, Clone, Default)]
pub struct Codec<P: AeadProvider = ChaChaProvider> {
    config: CodecConfig,
    provider: P,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Result<Self> {
        Self::with_provider(config, ChaChaProvider)
    }
}

impl<P: AeadProvider> Codec<P> {
    pub fn with_provider(config: CodecConfig, provider: P) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, provider })
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Seals `plaintext` single-shot regardless of its size.
    pub fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let key = Key::from_slice(key)?;
        single::seal(&self.provider, &key, plaintext)
    }

    /// Seals `plaintext` in whichever format its size selects.
    pub fn encrypt_large(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        let key = Key::from_slice(key)?;
        let len = plaintext.len() as u64;

        match self.select(len) {
            Format::SingleShot => single::seal(&self.provider, &key, plaintext),
            Format::Streaming => stream::seal(&self.provider, &key, self.config.chunk_size, plaintext),
        }
    }

    /// Encrypts exactly `plaintext_len` bytes from `reader` into `writer` and
    /// returns the format used.
    ///
    /// Both handles are borrowed; neither is closed here.
    pub fn encrypt_reader<R: Read, W: Write>(
        &self,
        reader: &mut R,
        plaintext_len: u64,
        writer: &mut W,
        key: &[u8],
    ) -> Result<Format> {
        let key = Key::from_slice(key)?;
        let format = self.select(plaintext_len);

        match format {
            Format::SingleShot => {
                let mut source = ReaderSource::new(reader);
                let len = usize::try_from(plaintext_len).map_err(|_| {
                    CodecError::invalid(format!(
                        "{plaintext_len} bytes cannot be buffered on this platform"
                    ))
                })?;
                let plaintext = Zeroizing::new(source.read_exact_vec(len, "plaintext")?);
                if !source.is_exhausted()? {
                    return Err(CodecError::invalid(format!(
                        "plaintext source is longer than the declared {plaintext_len} bytes"
                    )));
                }

                writer.write_all(&single::seal(&self.provider, &key, &plaintext)?)?;
                writer.flush()?;
            }
            Format::Streaming => {
                stream::encrypt_stream(
                    &self.provider,
                    &key,
                    self.config.chunk_size,
                    reader,
                    plaintext_len,
                    writer,
                )?;
            }
        }

        Ok(format)
    }

    /// Encrypts the file at `src` into a new container at `dst`.
    ///
    /// `dst` only appears once the whole container is written and synced.
    pub fn encrypt_file(&self, src: &Path, dst: &Path, key: &[u8]) -> Result<Format> {
        Key::from_slice(key)?;

        let input = File::open(src)?;
        let len = input.metadata()?.len();
        let mut reader = BufReader::new(input);

        let mut output = AtomicFile::create(dst)?;
        let format = self.encrypt_reader(&mut reader, len, &mut output, key)?;
        output.commit()?;

        tracing::debug!(
            src = %src.display(),
            dst = %dst.display(),
            ?format,
            len,
            "encrypted file"
        );
        Ok(format)
    }

    /// Opens a single-shot container.
    pub fn decrypt(&self, sealed: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let key = Key::from_slice(key)?;
        if format::is_streaming(sealed) {
            return Err(CodecError::invalid(
                "streaming container passed to single-shot decrypt",
            ));
        }
        single::open(&self.provider, &key, sealed)
    }

    /// Opens a streaming container.
    pub fn decrypt_streaming(&self, sealed: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let key = Key::from_slice(key)?;
        if !format::is_streaming(sealed) {
            return Err(CodecError::invalid("not a streaming container"));
        }
        stream::open(&self.provider, &key, sealed)
    }

    /// Detects the container format and opens it.
    pub fn decrypt_auto(&self, sealed: &[u8], key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        match format::detect(sealed) {
            Format::SingleShot => self.decrypt(sealed, key),
            Format::Streaming => self.decrypt_streaming(sealed, key),
        }
    }

    /// Detects the container format from `reader` and writes the plaintext to
    /// `writer`, returning its length.
    ///
    /// Single-shot containers are buffered whole, up to the end of `reader`.
    /// For streaming containers a failing chunk leaves earlier authenticated
    /// chunks in `writer`; see [`decrypt_file`](Self::decrypt_file) for an
    /// all-or-nothing destination.
    pub fn decrypt_reader<R: Read, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        key: &[u8],
    ) -> Result<u64> {
        self.decrypt_bounded(reader, None, writer, key)
    }

    /// Decrypts the container at `src` into `dst`.
    ///
    /// `dst` is only created once every chunk has authenticated; on failure no
    /// output file is left behind.
    pub fn decrypt_file(&self, src: &Path, dst: &Path, key: &[u8]) -> Result<u64> {
        Key::from_slice(key)?;

        let input = File::open(src)?;
        let sealed_len = input.metadata()?.len();
        let mut reader = BufReader::new(input);

        let mut output = AtomicFile::create(dst)?;
        let len = self.decrypt_bounded(&mut reader, Some(sealed_len), &mut output, key)?;
        output.commit()?;

        tracing::debug!(src = %src.display(), dst = %dst.display(), len, "decrypted file");
        Ok(len)
    }

    /// Shared body of the reader and file paths. `sealed_len`, when known,
    /// caps how much of a single-shot container is buffered.
    fn decrypt_bounded<R: Read, W: Write>(
        &self,
        reader: &mut R,
        sealed_len: Option<u64>,
        writer: &mut W,
        key: &[u8],
    ) -> Result<u64> {
        let key = Key::from_slice(key)?;

        let mut magic = [0u8; MAGIC_LEN];
        let peeked = read_up_to(reader, &mut magic)?;
        let mut chained = (&magic[..peeked]).chain(reader);

        if format::is_streaming(&magic[..peeked]) {
            return stream::decrypt_stream(
                &self.provider,
                &key,
                ReaderSource::new(&mut chained),
                writer,
            );
        }

        let mut sealed = Vec::new();
        match sealed_len {
            Some(limit) => {
                sealed.reserve(usize::try_from(limit).unwrap_or(0));
                chained
                    .by_ref()
                    .take(limit.saturating_add(1))
                    .read_to_end(&mut sealed)?;
                if sealed.len() as u64 != limit {
                    return Err(CodecError::invalid(format!(
                        "container is {} bytes, expected {limit}",
                        sealed.len()
                    )));
                }
            }
            None => {
                chained.read_to_end(&mut sealed)?;
            }
        }

        let plaintext = single::open(&self.provider, &key, &sealed)?;
        writer.write_all(&plaintext)?;
        writer.flush()?;
        Ok(plaintext.len() as u64)
    }

    /// Exact container length encryption of `len` bytes would produce.
    pub fn predict_sealed_size(&self, len: u64) -> u64 {
        size::predict_sealed_size(len, &self.config)
    }

    fn select(&self, len: u64) -> Format {
        let format = format::select_format(len, self.config.threshold);
        tracing::debug!(len, threshold = self.config.threshold, ?format, "selected format");
        format
    }
}

/// A key-free summary of a sealed container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub format: Format,
    pub sealed_len: u64,
    pub plaintext_len: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<StreamHeader>,
}

/// Describes an in-memory container from its structure alone. Nothing is
/// authenticated.
pub fn inspect(sealed: &[u8]) -> Result<ContainerInfo> {
    let mut reader = sealed;
    inspect_reader(&mut reader, sealed.len() as u64)
}

/// Describes the container at `path`, reading at most its header.
pub fn inspect_file(path: &Path) -> Result<ContainerInfo> {
    let mut input = File::open(path)?;
    let sealed_len = input.metadata()?.len();
    inspect_reader(&mut input, sealed_len)
}

/// Describes a container of `sealed_len` bytes whose leading bytes are read
/// from `reader`. Only the format magic and, for streaming containers, the
/// header are consumed.
pub fn inspect_reader<R: Read>(reader: &mut R, sealed_len: u64) -> Result<ContainerInfo> {
    let mut magic = [0u8; MAGIC_LEN];
    let peeked = read_up_to(reader, &mut magic)?;

    if !format::is_streaming(&magic[..peeked]) {
        let overhead = single::OVERHEAD as u64;
        if sealed_len < overhead {
            return Err(CodecError::invalid(format!(
                "sealed data too short: {sealed_len} bytes (minimum {overhead})"
            )));
        }
        return Ok(ContainerInfo {
            format: Format::SingleShot,
            sealed_len,
            plaintext_len: sealed_len - overhead,
            header: None,
        });
    }

    let mut chained = (&magic[..peeked]).chain(reader);
    let header = StreamHeader::read_from(&mut ReaderSource::new(&mut chained))?;
    let expected = size::predict_streaming_size(header.plaintext_len(), header.chunk_size());
    if expected != sealed_len {
        return Err(CodecError::invalid(format!(
            "container is {sealed_len} bytes but its header implies {expected}"
        )));
    }

    Ok(ContainerInfo {
        format: Format::Streaming,
        sealed_len,
        plaintext_len: header.plaintext_len(),
        header: Some(header),
    })
}

/// Reads until `buf` is full or the reader is exhausted.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
