//! Document headers: the in-memory manifest of one container
//!
//! Built fresh with [`DocumentHeaders::create`] or populated from a stream by
//! [`DocumentHeaders::load`]. Loading unwraps the master key with the
//! key-encrypting key; on success the three subkeys are derived and the
//! encrypted header blocks are decoded. A wrong key is not an error: `load`
//! returns `false` and the subkey accessors return `None`.

use std::io::Read;

use axc_core::{AxcError, AxcResult};
use axc_crypto::random::random_bytes;
use axc_crypto::{
    AesCrypto, AesIv, AesKey, CipherMode, DataHmac, KeyWrap, KeyWrapMode, PaddingMode,
    RandomSource, Subkeys,
};
use tracing::{debug, warn};

use crate::blocks::{
    compression_from_plain, compression_info_from_plain, compression_info_to_plain,
    compression_to_plain, file_name_from_plain, file_name_to_plain, unicode_file_name_from_plain,
    unicode_file_name_to_plain, zero_pad, EncryptedPayload, EncryptionInfo, FileTimes,
    HeaderBlock, KeyWrapBlock, VersionBlock, KEYWRAP1_SALT_SIZE,
};
use crate::clock::Clock;
use crate::format::MAGIC;
use crate::reader::{HeaderBlockReader, ReadItem};

/// Highest file format major version this implementation reads.
pub const FILE_VERSION_MAJOR: u8 = 3;
/// Minor version written with a KeyWrap1 block.
pub const FILE_VERSION_MINOR: u8 = 2;
/// From this minor version on, the master key is carried in KeyWrap2.
pub const FILE_VERSION_MINOR_KEYWRAP2: u8 = 3;

const APP_VERSION: (u8, u8, u8) = (0, 5, 0);

#[derive(Clone)]
pub struct DocumentHeaders {
    key_encrypting_key: AesKey,
    version: VersionBlock,
    key_wrap: Option<KeyWrapBlock>,
    hmac: DataHmac,
    id_tag: Option<String>,
    file_name: Option<String>,
    file_times: Option<FileTimes>,
    iv: AesIv,
    plaintext_length: u64,
    uncompressed_length: Option<u64>,
    compressed: bool,
    cipher_text_length: u64,
    unrecognized: Vec<HeaderBlock>,
    master_key: Option<AesKey>,
    subkeys: Option<Subkeys>,
}

impl DocumentHeaders {
    /// Empty headers waiting for [`load`](Self::load).
    pub fn for_key(key_encrypting_key: &AesKey) -> Self {
        Self {
            key_encrypting_key: key_encrypting_key.clone(),
            version: VersionBlock {
                file_major: FILE_VERSION_MAJOR,
                file_minor: FILE_VERSION_MINOR,
                app_major: APP_VERSION.0,
                app_minor: APP_VERSION.1,
                app_patch: APP_VERSION.2,
            },
            key_wrap: None,
            hmac: DataHmac::default(),
            id_tag: None,
            file_name: None,
            file_times: None,
            iv: AesIv::zero(),
            plaintext_length: 0,
            uncompressed_length: None,
            compressed: false,
            cipher_text_length: 0,
            unrecognized: Vec::new(),
            master_key: None,
            subkeys: None,
        }
    }

    /// Headers for a new document: random master key of `master_key_size`
    /// bytes wrapped under the KEK, random payload IV, file times set to now.
    pub fn create(
        key_encrypting_key: &AesKey,
        master_key_size: usize,
        iterations: u32,
        rng: &mut dyn RandomSource,
        clock: &dyn Clock,
    ) -> AxcResult<Self> {
        let master = AesKey::generate(rng, master_key_size)?;
        let mut headers = Self::for_key(key_encrypting_key);
        headers.install_key_wrap(&master, iterations, rng)?;
        headers.subkeys = Some(Subkeys::derive(&master)?);
        headers.master_key = Some(master);
        headers.iv = AesIv::generate(rng);
        headers.file_times = Some(FileTimes::at(clock.now_utc()));
        debug!(
            master_key_size,
            iterations,
            key_wrap2 = headers.uses_keywrap2(),
            "created document headers"
        );
        Ok(headers)
    }

    fn install_key_wrap(
        &mut self,
        master: &AesKey,
        iterations: u32,
        rng: &mut dyn RandomSource,
    ) -> AxcResult<()> {
        let kek_len = self.key_encrypting_key.len();
        let fits_keywrap1 = master.len() == 16 && kek_len <= KEYWRAP1_SALT_SIZE;
        let salt = random_bytes(rng, kek_len.max(KEYWRAP1_SALT_SIZE));

        let wrap = KeyWrap::with_salt(
            &self.key_encrypting_key,
            &salt,
            iterations,
            KeyWrapMode::AxCrypt,
        )?;
        let wrapped = wrap.wrap(master)?;

        self.version.file_minor = if fits_keywrap1 {
            FILE_VERSION_MINOR
        } else {
            FILE_VERSION_MINOR_KEYWRAP2
        };
        self.key_wrap = Some(KeyWrapBlock {
            wrapped,
            salt,
            iterations,
        });
        Ok(())
    }

    /// Read header blocks up to and including Data, then try to unwrap the
    /// master key. `Ok(false)` means the key-encrypting key is wrong.
    ///
    /// On success the reader's HMAC is keyed and it is left positioned at
    /// the start of the ciphertext.
    pub fn load<R: Read>(&mut self, reader: &mut HeaderBlockReader<R>) -> AxcResult<bool> {
        *self = Self::for_key(&self.key_encrypting_key);

        let mut version = None;
        let mut key_wrap1 = None;
        let mut key_wrap2 = None;
        let mut encrypted = Vec::new();
        let cipher_text_length = loop {
            match reader.advance()? {
                ReadItem::MagicGuid => continue,
                ReadItem::Data { cipher_text_length } => break cipher_text_length,
                ReadItem::EndOfStream => {
                    return Err(AxcError::FileFormat(
                        "container ended before the Data block".into(),
                    ))
                }
                ReadItem::HeaderBlock(block) => match block {
                    HeaderBlock::Preamble(hmac) => self.hmac = hmac,
                    HeaderBlock::Version(v) => version = Some(v),
                    HeaderBlock::KeyWrap1(w) => key_wrap1 = Some(w),
                    HeaderBlock::KeyWrap2(w) => key_wrap2 = Some(w),
                    HeaderBlock::IdTag(tag) => self.id_tag = Some(tag),
                    HeaderBlock::Unrecognized { .. } => self.unrecognized.push(block),
                    HeaderBlock::Data { .. } => {
                        return Err(AxcError::Internal("reader yielded Data as a block".into()))
                    }
                    other => encrypted.push(other),
                },
            }
        };
        self.cipher_text_length = cipher_text_length;

        let version =
            version.ok_or_else(|| AxcError::FileFormat("missing Version block".into()))?;
        if version.file_major > FILE_VERSION_MAJOR {
            return Err(AxcError::FileFormat(format!(
                "unsupported file format version {}.{}",
                version.file_major, version.file_minor
            )));
        }
        self.version = version;

        let key_wrap = if version.file_minor >= FILE_VERSION_MINOR_KEYWRAP2 {
            key_wrap2.ok_or_else(|| AxcError::FileFormat("missing KeyWrap2 block".into()))?
        } else {
            key_wrap1.ok_or_else(|| AxcError::FileFormat("missing KeyWrap1 block".into()))?
        };
        let master = self.unwrap_master_key(&key_wrap)?;
        self.key_wrap = Some(key_wrap);

        let Some(master) = master else {
            debug!("key-encrypting key does not unwrap the master key");
            return Ok(false);
        };

        let subkeys = Subkeys::derive(&master)?;
        reader.set_hmac_key(&subkeys.hmac)?;
        self.decode_encrypted(&encrypted, &subkeys.headers)?;
        self.master_key = Some(master);
        self.subkeys = Some(subkeys);

        debug!(
            file_major = version.file_major,
            file_minor = version.file_minor,
            cipher_text_length,
            compressed = self.compressed,
            "loaded document headers"
        );
        Ok(true)
    }

    fn unwrap_master_key(&self, block: &KeyWrapBlock) -> AxcResult<Option<AesKey>> {
        if block.salt.len() < self.key_encrypting_key.len() {
            // salt shorter than the KEK cannot have been made with this key
            return Ok(None);
        }
        let wrap = KeyWrap::with_salt(
            &self.key_encrypting_key,
            &block.salt,
            block.iterations,
            KeyWrapMode::AxCrypt,
        )
        .map_err(|e| AxcError::FileFormat(format!("unusable key wrap parameters: {e}")))?;
        wrap.unwrap(&block.wrapped)
            .map_err(|e| AxcError::FileFormat(format!("malformed wrapped key: {e}")))
    }

    fn decode_encrypted(&mut self, blocks: &[HeaderBlock], headers_key: &AesKey) -> AxcResult<()> {
        let crypto = header_crypto(headers_key)?;
        let mut encryption_info = None;
        let mut utf8_name = None;
        let mut unicode_name = None;

        for block in blocks {
            match block {
                HeaderBlock::EncryptionInfo(p) => {
                    encryption_info = Some(EncryptionInfo::from_plain(&crypto.decrypt(&p.0)?)?)
                }
                HeaderBlock::CompressionInfo(p) => {
                    self.uncompressed_length =
                        Some(compression_info_from_plain(&crypto.decrypt(&p.0)?)?)
                }
                HeaderBlock::Compression(p) => {
                    self.compressed = compression_from_plain(&crypto.decrypt(&p.0)?)?
                }
                HeaderBlock::FileInfo(p) => {
                    self.file_times = Some(FileTimes::from_plain(&crypto.decrypt(&p.0)?)?)
                }
                HeaderBlock::FileNameInfo(p) => {
                    utf8_name = Some(file_name_from_plain(&crypto.decrypt(&p.0)?)?)
                }
                HeaderBlock::UnicodeFileNameInfo(p) => {
                    unicode_name = Some(unicode_file_name_from_plain(&crypto.decrypt(&p.0)?)?)
                }
                other => {
                    return Err(AxcError::Internal(format!(
                        "unexpected block in encrypted set: {:?}",
                        other.block_type()
                    )))
                }
            }
        }

        let info = encryption_info
            .ok_or_else(|| AxcError::FileFormat("missing EncryptionInfo block".into()))?;
        self.iv = info.iv;
        self.plaintext_length = info.plaintext_length;
        self.file_name = unicode_name.or(utf8_name);
        if self.compressed && self.uncompressed_length.is_none() {
            warn!("compressed document without CompressionInfo");
        }
        Ok(())
    }

    /// The full header region: magic, Preamble, and every block through Data.
    pub fn to_bytes(&self) -> AxcResult<Vec<u8>> {
        let mut out = MAGIC.to_vec();
        HeaderBlock::Preamble(self.hmac).encode_into(&mut out)?;
        self.encode_hmac_region(&mut out)?;
        Ok(out)
    }

    /// The header bytes covered by the HMAC: everything after the Preamble
    /// through the Data block.
    pub fn hmac_region(&self) -> AxcResult<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_hmac_region(&mut out)?;
        Ok(out)
    }

    fn encode_hmac_region(&self, out: &mut Vec<u8>) -> AxcResult<()> {
        let subkeys = self.subkeys.as_ref().ok_or_else(|| {
            AxcError::InvalidOperation("headers without a master key cannot be written".into())
        })?;
        let key_wrap = self
            .key_wrap
            .clone()
            .ok_or_else(|| AxcError::InvalidOperation("headers have no key wrap".into()))?;
        let crypto = header_crypto(&subkeys.headers)?;
        let seal = |plain: Vec<u8>| -> AxcResult<EncryptedPayload> {
            Ok(EncryptedPayload(crypto.encrypt(&zero_pad(plain))?))
        };

        let mut blocks = vec![HeaderBlock::Version(self.version)];
        blocks.push(if self.uses_keywrap2() {
            HeaderBlock::KeyWrap2(key_wrap)
        } else {
            HeaderBlock::KeyWrap1(key_wrap)
        });
        if let Some(tag) = &self.id_tag {
            blocks.push(HeaderBlock::IdTag(tag.clone()));
        }
        let info = EncryptionInfo {
            plaintext_length: self.plaintext_length,
            iv: self.iv,
        };
        blocks.push(HeaderBlock::EncryptionInfo(seal(info.to_plain()?)?));
        blocks.push(HeaderBlock::Compression(seal(compression_to_plain(
            self.compressed,
        ))?));
        if self.compressed {
            let uncompressed = self.uncompressed_length.unwrap_or(self.plaintext_length);
            blocks.push(HeaderBlock::CompressionInfo(seal(
                compression_info_to_plain(uncompressed)?,
            )?));
        }
        if let Some(times) = &self.file_times {
            blocks.push(HeaderBlock::FileInfo(seal(times.to_plain()?)?));
        }
        if let Some(name) = &self.file_name {
            blocks.push(HeaderBlock::FileNameInfo(seal(file_name_to_plain(name))?));
            blocks.push(HeaderBlock::UnicodeFileNameInfo(seal(
                unicode_file_name_to_plain(name),
            )?));
        }
        blocks.extend(self.unrecognized.iter().cloned());
        blocks.push(HeaderBlock::Data {
            cipher_text_length: self.cipher_text_length,
        });

        for block in &blocks {
            block.encode_into(out)?;
        }
        Ok(())
    }

    /// Copy of these headers with the master key wrapped under `new_kek`.
    /// Payload parameters, IV and file metadata are kept; the HMAC is reset.
    pub fn rewrap(
        &self,
        new_kek: &AesKey,
        iterations: u32,
        rng: &mut dyn RandomSource,
    ) -> AxcResult<Self> {
        let master = self.master_key.as_ref().ok_or_else(|| {
            AxcError::InvalidOperation("cannot rewrap headers without a master key".into())
        })?;
        let mut next = self.clone();
        next.key_encrypting_key = new_kek.clone();
        next.install_key_wrap(master, iterations, rng)?;
        next.hmac = DataHmac::default();
        Ok(next)
    }

    fn uses_keywrap2(&self) -> bool {
        self.version.file_minor >= FILE_VERSION_MINOR_KEYWRAP2
    }

    /// Whether the master key was unwrapped (or generated).
    pub fn is_valid(&self) -> bool {
        self.master_key.is_some()
    }

    pub fn version(&self) -> VersionBlock {
        self.version
    }

    pub fn key_encrypting_key(&self) -> &AesKey {
        &self.key_encrypting_key
    }

    pub fn master_key(&self) -> Option<&AesKey> {
        self.master_key.as_ref()
    }

    pub fn headers_subkey(&self) -> Option<&AesKey> {
        self.subkeys.as_ref().map(|s| &s.headers)
    }

    pub fn data_subkey(&self) -> Option<&AesKey> {
        self.subkeys.as_ref().map(|s| &s.data)
    }

    pub fn hmac_subkey(&self) -> Option<&AesKey> {
        self.subkeys.as_ref().map(|s| &s.hmac)
    }

    pub fn key_wrap_iterations(&self) -> Option<u32> {
        self.key_wrap.as_ref().map(|w| w.iterations)
    }

    pub fn key_wrap_salt(&self) -> Option<&[u8]> {
        self.key_wrap.as_ref().map(|w| w.salt.as_slice())
    }

    /// Stored HMAC from the Preamble.
    pub fn hmac(&self) -> DataHmac {
        self.hmac
    }

    pub(crate) fn set_hmac(&mut self, hmac: DataHmac) {
        self.hmac = hmac;
    }

    pub fn iv(&self) -> AesIv {
        self.iv
    }

    /// Fresh payload IV, for encrypting new content under the same headers.
    pub fn renew_iv(&mut self, rng: &mut dyn RandomSource) {
        self.iv = AesIv::generate(rng);
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn set_file_name(&mut self, name: impl Into<String>) {
        self.file_name = Some(name.into());
    }

    pub fn file_times(&self) -> Option<FileTimes> {
        self.file_times
    }

    pub fn set_file_times(&mut self, times: FileTimes) {
        self.file_times = Some(times);
    }

    pub fn id_tag(&self) -> Option<&str> {
        self.id_tag.as_deref()
    }

    pub fn set_id_tag(&mut self, tag: impl Into<String>) {
        self.id_tag = Some(tag.into());
    }

    /// Length of the data that was encrypted: compressed size when
    /// compression is on.
    pub fn plaintext_length(&self) -> u64 {
        self.plaintext_length
    }

    /// Original content length before compression.
    pub fn uncompressed_length(&self) -> u64 {
        if self.compressed {
            self.uncompressed_length.unwrap_or(self.plaintext_length)
        } else {
            self.plaintext_length
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    pub fn cipher_text_length(&self) -> u64 {
        self.cipher_text_length
    }

    pub fn unrecognized_blocks(&self) -> &[HeaderBlock] {
        &self.unrecognized
    }

    /// Payload parameters recorded after streaming.
    pub(crate) fn set_payload(
        &mut self,
        compressed: bool,
        plaintext_length: u64,
        uncompressed_length: u64,
        cipher_text_length: u64,
    ) {
        self.compressed = compressed;
        self.plaintext_length = plaintext_length;
        self.uncompressed_length = compressed.then_some(uncompressed_length);
        self.cipher_text_length = cipher_text_length;
    }

    /// Take the payload description (IV, lengths, compression) from `source`
    /// so these headers describe the same ciphertext.
    pub(crate) fn adopt_payload(&mut self, source: &DocumentHeaders) {
        self.iv = source.iv;
        self.compressed = source.compressed;
        self.plaintext_length = source.plaintext_length;
        self.uncompressed_length = source.uncompressed_length;
        self.cipher_text_length = source.cipher_text_length;
    }
}

fn header_crypto(headers_key: &AesKey) -> AxcResult<AesCrypto> {
    AesCrypto::new(headers_key, AesIv::zero(), CipherMode::Cbc, PaddingMode::None)
}

impl std::fmt::Debug for DocumentHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHeaders")
            .field("version", &self.version)
            .field("valid", &self.is_valid())
            .field("file_name", &self.file_name)
            .field("compressed", &self.compressed)
            .field("plaintext_length", &self.plaintext_length)
            .field("cipher_text_length", &self.cipher_text_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::format::{encode_prefix, HMAC_REGION_OFFSET};
    use axc_core::ErrorStatus;
    use chrono::{TimeZone, Utc};
    use rand::rngs::OsRng;
    use std::io::Cursor;

    const ITERATIONS: u32 = 20;

    fn kek(byte: u8) -> AesKey {
        AesKey::from_bytes(&[byte; 16]).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap())
    }

    fn new_headers(kek: &AesKey, master_size: usize) -> DocumentHeaders {
        DocumentHeaders::create(kek, master_size, ITERATIONS, &mut OsRng, &clock()).unwrap()
    }

    fn reload(bytes: Vec<u8>, kek: &AesKey) -> (DocumentHeaders, bool) {
        let mut reader = HeaderBlockReader::new(Cursor::new(bytes));
        let mut headers = DocumentHeaders::for_key(kek);
        let valid = headers.load(&mut reader).unwrap();
        (headers, valid)
    }

    #[test]
    fn test_create_then_load() {
        let kek = kek(1);
        let mut headers = new_headers(&kek, 16);
        headers.set_file_name("notes.txt");
        headers.set_id_tag("batch-7");

        let (loaded, valid) = reload(headers.to_bytes().unwrap(), &kek);
        assert!(valid);
        assert_eq!(loaded.file_name(), Some("notes.txt"));
        assert_eq!(loaded.id_tag(), Some("batch-7"));
        assert_eq!(loaded.iv(), headers.iv());
        assert_eq!(loaded.master_key(), headers.master_key());
        assert_eq!(loaded.file_times(), Some(FileTimes::at(clock().0)));
        assert_eq!(loaded.version().file_minor, FILE_VERSION_MINOR);
    }

    #[test]
    fn test_wrong_key_loads_invalid() {
        let headers = new_headers(&kek(1), 16);
        let (loaded, valid) = reload(headers.to_bytes().unwrap(), &kek(2));
        assert!(!valid);
        assert!(!loaded.is_valid());
        assert!(loaded.headers_subkey().is_none());
        assert!(loaded.data_subkey().is_none());
        assert!(loaded.hmac_subkey().is_none());
        assert_eq!(loaded.file_name(), None);
    }

    #[test]
    fn test_long_master_key_uses_keywrap2() {
        let kek = kek(3);
        let headers = new_headers(&kek, 32);
        assert_eq!(headers.version().file_minor, FILE_VERSION_MINOR_KEYWRAP2);
        let (loaded, valid) = reload(headers.to_bytes().unwrap(), &kek);
        assert!(valid);
        assert_eq!(loaded.master_key().map(AesKey::len), Some(32));
    }

    #[test]
    fn test_long_kek_uses_keywrap2() {
        let kek = AesKey::from_bytes(&[4; 32]).unwrap();
        let headers = new_headers(&kek, 16);
        assert_eq!(headers.key_wrap_salt().map(<[u8]>::len), Some(32));
        let (_, valid) = reload(headers.to_bytes().unwrap(), &kek);
        assert!(valid);
    }

    #[test]
    fn test_newer_major_version_rejected() {
        let kek = kek(1);
        let mut bytes = new_headers(&kek, 16).to_bytes().unwrap();
        // Version block follows the Preamble; payload starts after its prefix
        assert_eq!(bytes[HMAC_REGION_OFFSET + 4], 2);
        bytes[HMAC_REGION_OFFSET + 5] = FILE_VERSION_MAJOR + 1;

        let mut reader = HeaderBlockReader::new(Cursor::new(bytes));
        let err = DocumentHeaders::for_key(&kek)
            .load(&mut reader)
            .unwrap_err();
        assert_eq!(err.status(), ErrorStatus::FileFormatError);
    }

    #[test]
    fn test_hostile_iteration_count_is_format_error() {
        let kek = kek(1);
        let mut bytes = new_headers(&kek, 16).to_bytes().unwrap();
        // Version block (5 + 5), KeyWrap1 prefix (5), wrapped key and salt (24 + 16)
        let at = HMAC_REGION_OFFSET + 10 + 5 + 40;
        assert_eq!(&bytes[at..at + 4], &ITERATIONS.to_le_bytes());
        bytes[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());

        let mut reader = HeaderBlockReader::new(Cursor::new(bytes));
        let err = DocumentHeaders::for_key(&kek)
            .load(&mut reader)
            .unwrap_err();
        assert_eq!(err.status(), ErrorStatus::FileFormatError);
    }

    #[test]
    fn test_missing_data_block_is_format_error() {
        let kek = kek(1);
        let bytes = new_headers(&kek, 16).to_bytes().unwrap();
        let truncated = bytes[..bytes.len() - 13].to_vec();
        let mut reader = HeaderBlockReader::new(Cursor::new(truncated));
        let err = DocumentHeaders::for_key(&kek)
            .load(&mut reader)
            .unwrap_err();
        assert_eq!(err.status(), ErrorStatus::FileFormatError);
    }

    #[test]
    fn test_unrecognized_blocks_survive_rewrite() {
        let kek = kek(5);
        let headers = new_headers(&kek, 16);
        let mut bytes = headers.to_bytes().unwrap();
        let data_block_at = bytes.len() - 13;
        let mut extra = Vec::new();
        encode_prefix(3, 99, &mut extra).unwrap();
        extra.extend_from_slice(b"xyz");
        bytes.splice(data_block_at..data_block_at, extra);

        let (loaded, valid) = reload(bytes, &kek);
        assert!(valid);
        assert_eq!(
            loaded.unrecognized_blocks(),
            &[HeaderBlock::Unrecognized {
                tag: 99,
                payload: b"xyz".to_vec()
            }]
        );
        let (again, _) = reload(loaded.to_bytes().unwrap(), &kek);
        assert_eq!(again.unrecognized_blocks(), loaded.unrecognized_blocks());
    }

    #[test]
    fn test_rewrap_keeps_master_and_payload() {
        let old = kek(6);
        let new = kek(7);
        let mut headers = new_headers(&old, 16);
        headers.set_payload(true, 100, 400, 112);
        headers.set_hmac(DataHmac::from_bytes([9; 16]));

        let rewrapped = headers.rewrap(&new, ITERATIONS, &mut OsRng).unwrap();
        assert_eq!(rewrapped.master_key(), headers.master_key());
        assert_eq!(rewrapped.iv(), headers.iv());
        assert_ne!(rewrapped.key_wrap_salt(), headers.key_wrap_salt());
        assert_eq!(rewrapped.hmac(), DataHmac::default());

        let (loaded, valid) = reload(rewrapped.to_bytes().unwrap(), &new);
        assert!(valid);
        assert!(loaded.is_compressed());
        assert_eq!(loaded.plaintext_length(), 100);
        assert_eq!(loaded.uncompressed_length(), 400);
        let (_, old_valid) = reload(rewrapped.to_bytes().unwrap(), &old);
        assert!(!old_valid);
    }

    #[test]
    fn test_rewrap_requires_master_key() {
        let headers = DocumentHeaders::for_key(&kek(1));
        let err = headers.rewrap(&kek(2), ITERATIONS, &mut OsRng).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::InvalidOperation);
        assert!(headers.to_bytes().is_err());
    }

    #[test]
    fn test_hmac_region_is_suffix_of_header_bytes() {
        let headers = new_headers(&kek(8), 16);
        let all = headers.to_bytes().unwrap();
        assert_eq!(&all[HMAC_REGION_OFFSET..], headers.hmac_region().unwrap().as_slice());
    }

    #[test]
    fn test_header_size_independent_of_lengths() {
        let mut headers = new_headers(&kek(8), 16);
        let before = headers.to_bytes().unwrap().len();
        headers.set_payload(false, 1 << 33, 1 << 33, (1 << 33) + 16);
        headers.set_hmac(DataHmac::from_bytes([1; 16]));
        assert_eq!(headers.to_bytes().unwrap().len(), before);
    }
}
