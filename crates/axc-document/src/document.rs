//! Streaming encrypt / decrypt / re-key pipeline over one container
//!
//! ```text
//! encrypt:  input ─▶ [zstd] ─▶ AES-CBC(data subkey) ─▶ output ─┐
//!                                         HMAC(headers ‖ ciphertext) ─▶ Preamble
//! decrypt:  reader ─▶ HMAC ─▶ AES-CBC⁻¹ ─▶ [zstd⁻¹] ─▶ output
//! ```
//!
//! The HMAC covers the header region after the Preamble, then the
//! ciphertext. The header region is written first with a zeroed HMAC and
//! lengths, then patched in place once the payload has been streamed, so
//! encrypt and copy need a seekable output.

use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::ops::BitOr;

use axc_core::config::PipelineConfig;
use axc_core::{AxcError, AxcResult, Progress};
use axc_crypto::{
    AesCrypto, AesEncryptor, AesKey, DataHmac, HmacSha1Stream, RandomSource, BLOCK_SIZE,
};
use tracing::{debug, info, warn};

use crate::headers::DocumentHeaders;
use crate::reader::HeaderBlockReader;

/// Encryption flags. Exactly one of the compression flags must be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EncryptionOptions(u8);

impl EncryptionOptions {
    pub const NONE: Self = Self(0);
    pub const WITH_COMPRESSION: Self = Self(1);
    pub const WITHOUT_COMPRESSION: Self = Self(1 << 1);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn compression(self) -> AxcResult<bool> {
        match (
            self.contains(Self::WITH_COMPRESSION),
            self.contains(Self::WITHOUT_COMPRESSION),
        ) {
            (true, false) => Ok(true),
            (false, true) => Ok(false),
            (true, true) => Err(AxcError::InvalidArgument(
                "both WITH_COMPRESSION and WITHOUT_COMPRESSION are set".into(),
            )),
            (false, false) => Err(AxcError::InvalidArgument(
                "one of WITH_COMPRESSION or WITHOUT_COMPRESSION is required".into(),
            )),
        }
    }
}

impl BitOr for EncryptionOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

enum DocumentState<'a> {
    Unloaded,
    Loaded {
        reader: HeaderBlockReader<Box<dyn Read + 'a>>,
        headers: DocumentHeaders,
    },
    Disposed,
}

/// One container document.
///
/// Load a stream, then decrypt or re-key it; or encrypt fresh content with
/// a set of [`DocumentHeaders`]. The payload of a loaded document can be
/// consumed once.
pub struct AxcDocument<'a> {
    state: DocumentState<'a>,
    config: PipelineConfig,
}

impl<'a> AxcDocument<'a> {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            state: DocumentState::Unloaded,
            config,
        }
    }

    fn buffer_size(&self) -> usize {
        self.config.buffer_size.max(BLOCK_SIZE)
    }

    /// Read the headers from `input` and try `key_encrypting_key` on them.
    ///
    /// `Ok(false)` means the key is wrong; load again with another key and a
    /// fresh stream. Format errors leave the document unloaded.
    pub fn load(
        &mut self,
        input: impl Read + 'a,
        key_encrypting_key: &AesKey,
    ) -> AxcResult<bool> {
        if matches!(self.state, DocumentState::Disposed) {
            return Err(AxcError::Disposed("AxcDocument"));
        }
        self.state = DocumentState::Unloaded;

        let input: Box<dyn Read + 'a> = Box::new(input);
        let mut reader = HeaderBlockReader::new(input);
        let mut headers = DocumentHeaders::for_key(key_encrypting_key);
        let valid = headers.load(&mut reader)?;
        debug!(
            valid,
            cipher_text_length = headers.cipher_text_length(),
            "document loaded"
        );
        self.state = DocumentState::Loaded { reader, headers };
        Ok(valid)
    }

    /// True once a load succeeded with the right key.
    pub fn passphrase_is_valid(&self) -> bool {
        matches!(&self.state, DocumentState::Loaded { headers, .. } if headers.is_valid())
    }

    pub fn headers(&self) -> AxcResult<&DocumentHeaders> {
        match &self.state {
            DocumentState::Loaded { headers, .. } => Ok(headers),
            DocumentState::Unloaded => Err(AxcError::InvalidOperation("no document loaded".into())),
            DocumentState::Disposed => Err(AxcError::Disposed("AxcDocument")),
        }
    }

    fn loaded_payload(
        &mut self,
    ) -> AxcResult<(&mut HeaderBlockReader<Box<dyn Read + 'a>>, &DocumentHeaders)> {
        let (reader, headers) = match &mut self.state {
            DocumentState::Loaded { reader, headers } => (reader, &*headers),
            DocumentState::Unloaded => {
                return Err(AxcError::InvalidOperation("no document loaded".into()))
            }
            DocumentState::Disposed => return Err(AxcError::Disposed("AxcDocument")),
        };
        if !headers.is_valid() {
            return Err(AxcError::Internal(
                "payload access requires a valid passphrase".into(),
            ));
        }
        if !reader.at_data_start() {
            return Err(AxcError::InvalidOperation(
                "document payload was already consumed".into(),
            ));
        }
        Ok((reader, headers))
    }

    /// Decrypt (and decompress) the payload into `output`.
    ///
    /// Plaintext is written as it is produced; on error the caller must
    /// discard what was written. A stored HMAC that does not match fails with
    /// a data-integrity error once the whole payload has been read.
    pub fn decrypt_to<W: Write>(
        &mut self,
        output: &mut W,
        progress: &mut Progress<'_>,
    ) -> AxcResult<()> {
        let buffer_size = self.buffer_size();
        let (reader, headers) = self.loaded_payload()?;
        let data_key = headers
            .data_subkey()
            .ok_or_else(|| AxcError::Internal("valid headers without a data subkey".into()))?;
        let crypto = AesCrypto::cbc(data_key, headers.iv())?;
        let mut decryptor = crypto.decryptor()?;
        let compressed = headers.is_compressed();
        let mut sink = PlainSink::new(output, compressed)?;

        let mut cipher = vec![0u8; buffer_size];
        let mut plain = Vec::with_capacity(buffer_size + BLOCK_SIZE);
        loop {
            let n = reader.read_data(&mut cipher)?;
            if n == 0 {
                break;
            }
            plain.clear();
            decryptor.update(&cipher[..n], &mut plain);
            if let Err(e) = sink.write_all(&plain) {
                return Err(classify_sink_error(reader, headers, e, compressed, &mut cipher));
            }
            progress.add(n as u64)?;
        }

        plain.clear();
        let finalized = decryptor.finalize(&mut plain);
        verify_hmac(reader.hmac()?, headers.hmac())?;
        finalized?;
        let malformed = |e: io::Error| {
            if compressed {
                AxcError::FileFormat(format!("compressed payload is malformed: {e}"))
            } else {
                e.into()
            }
        };
        sink.write_all(&plain).map_err(malformed)?;
        let written = sink.finish().map_err(malformed)?;

        info!(
            cipher_text_length = headers.cipher_text_length(),
            plaintext_length = written,
            compressed,
            "document decrypted"
        );
        Ok(())
    }

    /// Encrypt `input` into a new container on `output` described by
    /// `headers`. A fresh payload IV is drawn from `rng` for every call; the
    /// headers' IV, lengths, compression flag and HMAC are updated to match
    /// what was written.
    ///
    /// Progress counts input bytes, so cancellation is observed per input
    /// chunk with or without compression. The ciphertext is read back from
    /// `output` to compute the HMAC once the final header region is known.
    pub fn encrypt_to<I: Read, W: Read + Write + Seek>(
        &self,
        headers: &mut DocumentHeaders,
        mut input: I,
        output: &mut W,
        options: EncryptionOptions,
        rng: &mut dyn RandomSource,
        progress: &mut Progress<'_>,
    ) -> AxcResult<()> {
        if matches!(self.state, DocumentState::Disposed) {
            return Err(AxcError::Disposed("AxcDocument"));
        }
        let compress = options.compression()?;
        let start = seekable_start(output)?;

        let data_key = subkey(headers.data_subkey())?;
        let hmac_key = subkey(headers.hmac_subkey())?;
        headers.renew_iv(rng);
        headers.set_payload(compress, 0, 0, 0);
        headers.set_hmac(DataHmac::default());
        let placeholder = headers.to_bytes()?;
        output.write_all(&placeholder)?;

        let crypto = AesCrypto::cbc(&data_key, headers.iv())?;
        let sink = CipherSink::new(&mut *output, crypto.encryptor()?);
        let mut buf = vec![0u8; self.buffer_size()];
        let (sink, uncompressed_length) = if compress {
            let mut encoder =
                zstd::stream::write::Encoder::new(sink, self.config.compression_level)?;
            let read = pump(&mut input, &mut encoder, &mut buf, progress)?;
            (encoder.finish()?, read)
        } else {
            let mut sink = sink;
            let read = pump(&mut input, &mut sink, &mut buf, progress)?;
            (sink, read)
        };
        let (stored_length, cipher_text_length) = sink.finish()?;

        headers.set_payload(
            compress,
            stored_length,
            uncompressed_length,
            cipher_text_length,
        );
        let mut hmac = HmacSha1Stream::new(&hmac_key)?;
        hmac.update(&headers.hmac_region()?);
        output.seek(SeekFrom::Start(start + placeholder.len() as u64))?;
        let mut ciphertext = (&mut *output).take(cipher_text_length);
        let mut hashed = 0u64;
        loop {
            let n = read_some(&mut ciphertext, &mut buf)?;
            if n == 0 {
                break;
            }
            hmac.update(&buf[..n]);
            hashed += n as u64;
        }
        if hashed != cipher_text_length {
            return Err(AxcError::Internal(format!(
                "read back {hashed} of {cipher_text_length} ciphertext bytes"
            )));
        }
        headers.set_hmac(hmac.finalize());
        rewrite_header(output, start, headers, placeholder.len())?;

        info!(
            plaintext_length = uncompressed_length,
            stored_length,
            cipher_text_length,
            compressed = compress,
            "document encrypted"
        );
        Ok(())
    }

    /// Copy the loaded ciphertext verbatim under `new_headers`, typically
    /// produced by [`DocumentHeaders::rewrap`]. The master key must be the
    /// same; only the header region changes.
    ///
    /// The source HMAC is verified while copying. On mismatch the copy is
    /// left with a zeroed Preamble and fails with a data-integrity error.
    pub fn copy_encrypted_to<W: Write + Seek>(
        &mut self,
        new_headers: &DocumentHeaders,
        output: &mut W,
        progress: &mut Progress<'_>,
    ) -> AxcResult<()> {
        let buffer_size = self.buffer_size();
        let (reader, headers) = self.loaded_payload()?;
        match (headers.master_key(), new_headers.master_key()) {
            (Some(current), Some(replacement)) if current == replacement => {}
            _ => {
                return Err(AxcError::InvalidArgument(
                    "replacement headers must carry the document's master key".into(),
                ))
            }
        }
        let start = seekable_start(output)?;

        let mut target = new_headers.clone();
        target.adopt_payload(headers);
        target.set_hmac(DataHmac::default());
        let placeholder = target.to_bytes()?;
        output.write_all(&placeholder)?;

        // lengths are adopted up front, so the region is final already
        let mut hmac = HmacSha1Stream::new(&subkey(target.hmac_subkey())?)?;
        hmac.update(&target.hmac_region()?);
        let mut buf = vec![0u8; buffer_size];
        loop {
            let n = reader.read_data(&mut buf)?;
            if n == 0 {
                break;
            }
            output.write_all(&buf[..n])?;
            hmac.update(&buf[..n]);
            progress.add(n as u64)?;
        }
        verify_hmac(reader.hmac()?, headers.hmac())?;

        target.set_hmac(hmac.finalize());
        rewrite_header(output, start, &target, placeholder.len())?;

        info!(
            cipher_text_length = target.cipher_text_length(),
            "document re-keyed"
        );
        Ok(())
    }

    /// Release the stream and key material. Idempotent; every later
    /// operation fails with a disposed error.
    pub fn dispose(&mut self) {
        if let DocumentState::Loaded { reader, .. } = &mut self.state {
            reader.dispose();
        }
        self.state = DocumentState::Disposed;
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state, DocumentState::Disposed)
    }
}

impl Default for AxcDocument<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AxcDocument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            DocumentState::Unloaded => "unloaded",
            DocumentState::Loaded { headers, .. } if headers.is_valid() => "loaded",
            DocumentState::Loaded { .. } => "loaded (wrong key)",
            DocumentState::Disposed => "disposed",
        };
        f.debug_struct("AxcDocument")
            .field("state", &state)
            .field("config", &self.config)
            .finish()
    }
}

fn subkey(key: Option<&AesKey>) -> AxcResult<AesKey> {
    key.cloned().ok_or_else(|| {
        AxcError::InvalidOperation("headers have no master key; create or load them first".into())
    })
}

fn seekable_start<W: Seek>(output: &mut W) -> AxcResult<u64> {
    output
        .stream_position()
        .map_err(|e| AxcError::InvalidArgument(format!("output stream must be seekable: {e}")))
}

fn verify_hmac(computed: DataHmac, stored: DataHmac) -> AxcResult<()> {
    if computed != stored {
        warn!(?computed, ?stored, "document HMAC mismatch");
        return Err(AxcError::DataIntegrity(
            "stored HMAC does not match the document".into(),
        ));
    }
    Ok(())
}

/// A write failure while decompressing is usually corrupt input. Read the
/// rest of the payload so the HMAC can tell the two apart.
fn classify_sink_error<R: Read>(
    reader: &mut HeaderBlockReader<R>,
    headers: &DocumentHeaders,
    error: io::Error,
    compressed: bool,
    scratch: &mut [u8],
) -> AxcError {
    if !compressed {
        return error.into();
    }
    loop {
        match reader.read_data(scratch) {
            Ok(0) => break,
            Ok(_) => continue,
            Err(e) => return e,
        }
    }
    match reader.hmac().and_then(|computed| verify_hmac(computed, headers.hmac())) {
        Ok(()) => {
            debug!(%error, "decompression failed on authentic data");
            AxcError::FileFormat(format!("compressed payload is malformed: {error}"))
        }
        Err(e) => e,
    }
}

fn rewrite_header<W: Write + Seek>(
    output: &mut W,
    start: u64,
    headers: &DocumentHeaders,
    expected_len: usize,
) -> AxcResult<()> {
    let header = headers.to_bytes()?;
    if header.len() != expected_len {
        return Err(AxcError::Internal(format!(
            "header region changed size from {expected_len} to {} bytes",
            header.len()
        )));
    }
    let end = output.stream_position()?;
    output.seek(SeekFrom::Start(start))?;
    output.write_all(&header)?;
    output.seek(SeekFrom::Start(end))?;
    output.flush()?;
    Ok(())
}

fn read_some<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Copy `input` into `sink` chunk by chunk, reporting input bytes.
fn pump<R: Read, S: Write>(
    input: &mut R,
    sink: &mut S,
    buf: &mut [u8],
    progress: &mut Progress<'_>,
) -> AxcResult<u64> {
    let mut total = 0u64;
    loop {
        let n = read_some(input, buf)?;
        if n == 0 {
            return Ok(total);
        }
        sink.write_all(&buf[..n])?;
        total += n as u64;
        progress.add(n as u64)?;
    }
}

/// Ciphertext destination: encrypts whatever is written and forwards it.
struct CipherSink<'w, W: Write> {
    output: &'w mut W,
    encryptor: AesEncryptor,
    scratch: Vec<u8>,
    stored: u64,
    written: u64,
}

impl<'w, W: Write> CipherSink<'w, W> {
    fn new(output: &'w mut W, encryptor: AesEncryptor) -> Self {
        Self {
            output,
            encryptor,
            scratch: Vec::new(),
            stored: 0,
            written: 0,
        }
    }

    /// Write the final padded block. Returns the bytes encrypted and the
    /// ciphertext length.
    fn finish(self) -> AxcResult<(u64, u64)> {
        let Self {
            output,
            encryptor,
            mut scratch,
            stored,
            written,
        } = self;
        scratch.clear();
        encryptor.finalize(&mut scratch)?;
        output.write_all(&scratch)?;
        Ok((stored, written + scratch.len() as u64))
    }
}

impl<W: Write> Write for CipherSink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.scratch.clear();
        self.encryptor.update(buf, &mut self.scratch);
        self.output.write_all(&self.scratch)?;
        self.stored += buf.len() as u64;
        self.written += self.scratch.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}

/// Plaintext destination, optionally through a zstd decoder.
enum PlainSink<'w, W: Write> {
    Direct { output: &'w mut W, written: u64 },
    Decompress(zstd::stream::write::Decoder<'static, CountingWriter<&'w mut W>>),
}

impl<'w, W: Write> PlainSink<'w, W> {
    fn new(output: &'w mut W, compressed: bool) -> AxcResult<Self> {
        Ok(if compressed {
            Self::Decompress(zstd::stream::write::Decoder::new(CountingWriter {
                inner: output,
                count: 0,
            })?)
        } else {
            Self::Direct { output, written: 0 }
        })
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Direct { output, written } => {
                output.write_all(buf)?;
                *written += buf.len() as u64;
                Ok(())
            }
            Self::Decompress(decoder) => decoder.write_all(buf),
        }
    }

    /// Flush everything through and report the plaintext bytes written.
    fn finish(self) -> io::Result<u64> {
        match self {
            Self::Direct { output, written } => {
                output.flush()?;
                Ok(written)
            }
            Self::Decompress(mut decoder) => {
                decoder.flush()?;
                let mut counter = decoder.into_inner();
                counter.flush()?;
                Ok(counter.count)
            }
        }
    }
}

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use axc_core::ErrorStatus;
    use chrono::{TimeZone, Utc};
    use rand::rngs::OsRng;
    use std::io::Cursor;

    struct Unseekable(Vec<u8>);

    impl Write for Unseekable {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for Unseekable {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl Seek for Unseekable {
        fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(ErrorKind::Unsupported, "pipe"))
        }
    }

    fn headers(kek: &AesKey) -> DocumentHeaders {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        DocumentHeaders::create(kek, 16, 20, &mut OsRng, &clock).unwrap()
    }

    #[test]
    fn test_options_require_exactly_one_compression_flag() {
        assert!(EncryptionOptions::WITH_COMPRESSION.compression().unwrap());
        assert!(!EncryptionOptions::WITHOUT_COMPRESSION.compression().unwrap());
        for bad in [
            EncryptionOptions::NONE,
            EncryptionOptions::WITH_COMPRESSION | EncryptionOptions::WITHOUT_COMPRESSION,
        ] {
            assert_eq!(
                bad.compression().unwrap_err().status(),
                ErrorStatus::InvalidArgument
            );
        }
    }

    #[test]
    fn test_unseekable_output_rejected_before_writing() {
        let kek = AesKey::from_bytes(&[1; 16]).unwrap();
        let mut headers = headers(&kek);
        let mut sink = Unseekable(Vec::new());
        let err = AxcDocument::new()
            .encrypt_to(
                &mut headers,
                &b"data"[..],
                &mut sink,
                EncryptionOptions::WITHOUT_COMPRESSION,
                &mut OsRng,
                &mut Progress::none(),
            )
            .unwrap_err();
        assert_eq!(err.status(), ErrorStatus::InvalidArgument);
        assert!(sink.0.is_empty());
    }

    #[test]
    fn test_roundtrip_in_memory() {
        let kek = AesKey::from_bytes(&[2; 16]).unwrap();
        let mut headers = headers(&kek);
        let mut container = Cursor::new(Vec::<u8>::new());
        AxcDocument::new()
            .encrypt_to(
                &mut headers,
                &b"attack at dawn"[..],
                &mut container,
                EncryptionOptions::WITHOUT_COMPRESSION,
                &mut OsRng,
                &mut Progress::none(),
            )
            .unwrap();
        assert_eq!(headers.plaintext_length(), 14);
        assert_eq!(headers.cipher_text_length(), 16);

        let mut document = AxcDocument::new();
        assert!(document.load(Cursor::new(container.into_inner()), &kek).unwrap());
        let mut plain = Vec::new();
        document.decrypt_to(&mut plain, &mut Progress::none()).unwrap();
        assert_eq!(plain, b"attack at dawn");
    }

    #[test]
    fn test_each_encryption_draws_a_fresh_iv() {
        let kek = AesKey::from_bytes(&[5; 16]).unwrap();
        let mut headers = headers(&kek);
        let mut seal = |content: &[u8]| {
            let mut out = Cursor::new(Vec::<u8>::new());
            AxcDocument::new()
                .encrypt_to(
                    &mut headers,
                    content,
                    &mut out,
                    EncryptionOptions::WITHOUT_COMPRESSION,
                    &mut OsRng,
                    &mut Progress::none(),
                )
                .unwrap();
            let out = out.into_inner();
            let payload_at = out.len() - headers.cipher_text_length() as usize;
            (headers.iv(), out[payload_at..payload_at + BLOCK_SIZE].to_vec(), out)
        };

        let (iv_one, block_one, first) = seal(b"SAME PREFIX 16B! version one");
        let (iv_two, block_two, second) = seal(b"SAME PREFIX 16B! version two");
        assert_ne!(iv_one, iv_two);
        assert_ne!(block_one, block_two);

        for (container, expected) in [
            (first, &b"SAME PREFIX 16B! version one"[..]),
            (second, &b"SAME PREFIX 16B! version two"[..]),
        ] {
            let mut document = AxcDocument::new();
            assert!(document.load(Cursor::new(container), &kek).unwrap());
            let mut plain = Vec::new();
            document.decrypt_to(&mut plain, &mut Progress::none()).unwrap();
            assert_eq!(plain, expected);
        }
    }

    #[test]
    fn test_operations_on_unloaded_document() {
        let mut document = AxcDocument::new();
        let err = document
            .decrypt_to(&mut Vec::new(), &mut Progress::none())
            .unwrap_err();
        assert_eq!(err.status(), ErrorStatus::InvalidOperation);
        assert!(!document.passphrase_is_valid());
        assert!(document.headers().is_err());
    }

    #[test]
    fn test_headers_without_master_key_cannot_encrypt() {
        let kek = AesKey::from_bytes(&[3; 16]).unwrap();
        let mut empty = DocumentHeaders::for_key(&kek);
        let err = AxcDocument::new()
            .encrypt_to(
                &mut empty,
                &b""[..],
                &mut Cursor::new(Vec::<u8>::new()),
                EncryptionOptions::WITH_COMPRESSION,
                &mut OsRng,
                &mut Progress::none(),
            )
            .unwrap_err();
        assert_eq!(err.status(), ErrorStatus::InvalidOperation);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut document = AxcDocument::new();
        document.dispose();
        document.dispose();
        assert!(document.is_disposed());
        let kek = AesKey::from_bytes(&[4; 16]).unwrap();
        let err = document.load(Cursor::new(Vec::<u8>::new()), &kek).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::ObjectDisposed);
        let err = document
            .decrypt_to(&mut Vec::new(), &mut Progress::none())
            .unwrap_err();
        assert_eq!(err.status(), ErrorStatus::ObjectDisposed);
    }
}
