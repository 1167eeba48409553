//! Header block kinds and their payload layouts
//!
//! [`HeaderBlock`] is the framed form: what the reader yields and the writer
//! emits. Encrypted kinds carry their ciphertext untouched; the plaintext
//! structures below ([`EncryptionInfo`], [`FileTimes`], ...) are what the
//! headers subkey decrypts them into.

use axc_core::{AxcError, AxcResult};
use axc_crypto::{AesIv, DataHmac, BLOCK_SIZE, HMAC_SIZE, IV_SIZE};
use chrono::{DateTime, TimeZone, Utc};

use crate::format::{
    self, encode_prefix, from_filetime, read_i32_le, read_length_le, read_u32_le, to_filetime,
    write_length_le, BlockType,
};

/// Wrapped key size for a 128-bit master key.
pub const KEYWRAP1_WRAPPED_SIZE: usize = 24;
pub const KEYWRAP1_SALT_SIZE: usize = 16;
const KEYWRAP1_PAYLOAD_SIZE: usize = KEYWRAP1_WRAPPED_SIZE + KEYWRAP1_SALT_SIZE + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionBlock {
    pub file_major: u8,
    pub file_minor: u8,
    pub app_major: u8,
    pub app_minor: u8,
    pub app_patch: u8,
}

const VERSION_PAYLOAD_SIZE: usize = 5;

/// Wrapped master key plus the parameters needed to unwrap it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyWrapBlock {
    pub wrapped: Vec<u8>,
    pub salt: Vec<u8>,
    pub iterations: u32,
}

/// Encrypted payload of one of the encrypted block kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload(pub Vec<u8>);

/// One framed header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderBlock {
    Preamble(DataHmac),
    Version(VersionBlock),
    KeyWrap1(KeyWrapBlock),
    KeyWrap2(KeyWrapBlock),
    IdTag(String),
    Data { cipher_text_length: u64 },
    FileNameInfo(EncryptedPayload),
    EncryptionInfo(EncryptedPayload),
    CompressionInfo(EncryptedPayload),
    FileInfo(EncryptedPayload),
    Compression(EncryptedPayload),
    UnicodeFileNameInfo(EncryptedPayload),
    /// Unknown tag, preserved so rewriting a document keeps it.
    Unrecognized { tag: u8, payload: Vec<u8> },
}

impl HeaderBlock {
    /// Decode a block payload. Unknown tags never fail.
    pub fn decode(tag: u8, payload: Vec<u8>) -> AxcResult<Self> {
        let Some(block_type) = BlockType::from_tag(tag) else {
            return Ok(Self::Unrecognized { tag, payload });
        };

        if block_type.is_encrypted() {
            if payload.is_empty() || payload.len() % BLOCK_SIZE != 0 {
                return Err(AxcError::FileFormat(format!(
                    "{block_type:?} payload of {} bytes is not whole cipher blocks",
                    payload.len()
                )));
            }
            let payload = EncryptedPayload(payload);
            return Ok(match block_type {
                BlockType::FileNameInfo => Self::FileNameInfo(payload),
                BlockType::EncryptionInfo => Self::EncryptionInfo(payload),
                BlockType::CompressionInfo => Self::CompressionInfo(payload),
                BlockType::FileInfo => Self::FileInfo(payload),
                BlockType::Compression => Self::Compression(payload),
                _ => Self::UnicodeFileNameInfo(payload),
            });
        }

        match block_type {
            BlockType::Preamble => {
                expect_size(block_type, &payload, HMAC_SIZE)?;
                Ok(Self::Preamble(DataHmac::from_slice(&payload)?))
            }
            BlockType::Version => {
                expect_size(block_type, &payload, VERSION_PAYLOAD_SIZE)?;
                Ok(Self::Version(VersionBlock {
                    file_major: payload[0],
                    file_minor: payload[1],
                    app_major: payload[2],
                    app_minor: payload[3],
                    app_patch: payload[4],
                }))
            }
            BlockType::KeyWrap1 => {
                expect_size(block_type, &payload, KEYWRAP1_PAYLOAD_SIZE)?;
                let salt_end = KEYWRAP1_WRAPPED_SIZE + KEYWRAP1_SALT_SIZE;
                Ok(Self::KeyWrap1(KeyWrapBlock {
                    wrapped: payload[..KEYWRAP1_WRAPPED_SIZE].to_vec(),
                    salt: payload[KEYWRAP1_WRAPPED_SIZE..salt_end].to_vec(),
                    iterations: read_u32_le(&payload, salt_end)?,
                }))
            }
            BlockType::KeyWrap2 => Ok(Self::KeyWrap2(decode_keywrap2(&payload)?)),
            BlockType::IdTag => String::from_utf8(payload)
                .map(Self::IdTag)
                .map_err(|e| AxcError::FileFormat(format!("IdTag is not UTF-8: {e}"))),
            BlockType::Data => {
                expect_size(block_type, &payload, 8)?;
                Ok(Self::Data {
                    cipher_text_length: read_length_le(&payload, 0)?,
                })
            }
            other => Err(AxcError::Internal(format!(
                "block type {other:?} missing from decode"
            ))),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::Unrecognized { tag, .. } => *tag,
            other => other.block_type().map(BlockType::tag).unwrap_or_default(),
        }
    }

    pub fn block_type(&self) -> Option<BlockType> {
        Some(match self {
            Self::Preamble(_) => BlockType::Preamble,
            Self::Version(_) => BlockType::Version,
            Self::KeyWrap1(_) => BlockType::KeyWrap1,
            Self::KeyWrap2(_) => BlockType::KeyWrap2,
            Self::IdTag(_) => BlockType::IdTag,
            Self::Data { .. } => BlockType::Data,
            Self::FileNameInfo(_) => BlockType::FileNameInfo,
            Self::EncryptionInfo(_) => BlockType::EncryptionInfo,
            Self::CompressionInfo(_) => BlockType::CompressionInfo,
            Self::FileInfo(_) => BlockType::FileInfo,
            Self::Compression(_) => BlockType::Compression,
            Self::UnicodeFileNameInfo(_) => BlockType::UnicodeFileNameInfo,
            Self::Unrecognized { .. } => return None,
        })
    }

    fn payload(&self) -> AxcResult<Vec<u8>> {
        Ok(match self {
            Self::Preamble(hmac) => hmac.as_bytes().to_vec(),
            Self::Version(v) => vec![
                v.file_major,
                v.file_minor,
                v.app_major,
                v.app_minor,
                v.app_patch,
            ],
            Self::KeyWrap1(wrap) => {
                if wrap.wrapped.len() != KEYWRAP1_WRAPPED_SIZE
                    || wrap.salt.len() != KEYWRAP1_SALT_SIZE
                {
                    return Err(AxcError::InvalidArgument(format!(
                        "KeyWrap1 holds a {}-byte wrapped key and {}-byte salt, got {} and {}",
                        KEYWRAP1_WRAPPED_SIZE,
                        KEYWRAP1_SALT_SIZE,
                        wrap.wrapped.len(),
                        wrap.salt.len()
                    )));
                }
                let mut out = Vec::with_capacity(KEYWRAP1_PAYLOAD_SIZE);
                out.extend_from_slice(&wrap.wrapped);
                out.extend_from_slice(&wrap.salt);
                out.extend_from_slice(&wrap.iterations.to_le_bytes());
                out
            }
            Self::KeyWrap2(wrap) => encode_keywrap2(wrap)?,
            Self::IdTag(tag) => tag.as_bytes().to_vec(),
            Self::Data { cipher_text_length } => {
                let mut out = Vec::with_capacity(8);
                write_length_le(*cipher_text_length, &mut out)?;
                out
            }
            Self::FileNameInfo(p)
            | Self::EncryptionInfo(p)
            | Self::CompressionInfo(p)
            | Self::FileInfo(p)
            | Self::Compression(p)
            | Self::UnicodeFileNameInfo(p) => p.0.clone(),
            Self::Unrecognized { payload, .. } => payload.clone(),
        })
    }

    /// Append the framed block (prefix and payload) to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> AxcResult<()> {
        let payload = self.payload()?;
        encode_prefix(payload.len(), self.tag(), out)?;
        out.extend_from_slice(&payload);
        Ok(())
    }
}

fn expect_size(block_type: BlockType, payload: &[u8], size: usize) -> AxcResult<()> {
    if payload.len() != size {
        return Err(AxcError::FileFormat(format!(
            "{block_type:?} payload must be {size} bytes, got {}",
            payload.len()
        )));
    }
    Ok(())
}

/// `[u8 len][wrapped][u8 len][salt][u32 LE iterations]`
fn decode_keywrap2(payload: &[u8]) -> AxcResult<KeyWrapBlock> {
    let truncated = || AxcError::FileFormat("KeyWrap2 payload truncated".into());

    let wrapped_len = *payload.first().ok_or_else(truncated)? as usize;
    let wrapped = payload.get(1..1 + wrapped_len).ok_or_else(truncated)?;
    let salt_at = 1 + wrapped_len;
    let salt_len = *payload.get(salt_at).ok_or_else(truncated)? as usize;
    let salt = payload
        .get(salt_at + 1..salt_at + 1 + salt_len)
        .ok_or_else(truncated)?;
    let iterations_at = salt_at + 1 + salt_len;
    let iterations = read_u32_le(payload, iterations_at)?;
    if payload.len() != iterations_at + 4 {
        return Err(AxcError::FileFormat(format!(
            "KeyWrap2 payload has {} trailing bytes",
            payload.len() - iterations_at - 4
        )));
    }

    Ok(KeyWrapBlock {
        wrapped: wrapped.to_vec(),
        salt: salt.to_vec(),
        iterations,
    })
}

fn encode_keywrap2(wrap: &KeyWrapBlock) -> AxcResult<Vec<u8>> {
    let wrapped_len = u8::try_from(wrap.wrapped.len())
        .map_err(|_| AxcError::InvalidArgument("wrapped key too long".into()))?;
    let salt_len = u8::try_from(wrap.salt.len())
        .map_err(|_| AxcError::InvalidArgument("key wrap salt too long".into()))?;

    let mut out = Vec::with_capacity(2 + wrap.wrapped.len() + wrap.salt.len() + 4);
    out.push(wrapped_len);
    out.extend_from_slice(&wrap.wrapped);
    out.push(salt_len);
    out.extend_from_slice(&wrap.salt);
    out.extend_from_slice(&wrap.iterations.to_le_bytes());
    Ok(out)
}

/// Pad to whole cipher blocks with zeros; encrypted header payloads are
/// never empty.
pub fn zero_pad(mut plain: Vec<u8>) -> Vec<u8> {
    let padded = plain.len().div_ceil(BLOCK_SIZE).max(1) * BLOCK_SIZE;
    plain.resize(padded, 0);
    plain
}

// ---------------------------------------------------------------------------
// Plaintext layouts of the encrypted kinds
// ---------------------------------------------------------------------------

/// Stored payload length and the payload IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub plaintext_length: u64,
    pub iv: AesIv,
}

impl EncryptionInfo {
    pub fn to_plain(&self) -> AxcResult<Vec<u8>> {
        let mut out = Vec::with_capacity(8 + IV_SIZE);
        write_length_le(self.plaintext_length, &mut out)?;
        out.extend_from_slice(self.iv.as_bytes());
        Ok(out)
    }

    pub fn from_plain(plain: &[u8]) -> AxcResult<Self> {
        let iv = plain
            .get(8..8 + IV_SIZE)
            .ok_or_else(|| AxcError::FileFormat("EncryptionInfo truncated".into()))?;
        Ok(Self {
            plaintext_length: read_length_le(plain, 0)?,
            iv: AesIv::from_slice(iv)?,
        })
    }
}

/// Length of the payload before compression.
pub fn compression_info_to_plain(uncompressed_length: u64) -> AxcResult<Vec<u8>> {
    let mut out = Vec::with_capacity(8);
    write_length_le(uncompressed_length, &mut out)?;
    Ok(out)
}

pub fn compression_info_from_plain(plain: &[u8]) -> AxcResult<u64> {
    read_length_le(plain, 0)
}

pub fn compression_to_plain(compressed: bool) -> Vec<u8> {
    i32::from(compressed).to_le_bytes().to_vec()
}

pub fn compression_from_plain(plain: &[u8]) -> AxcResult<bool> {
    Ok(read_i32_le(plain, 0)? != 0)
}

/// Creation, last access and last write times, always UTC on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
    pub created: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub last_written: DateTime<Utc>,
}

impl FileTimes {
    /// Normalize local or offset times to UTC.
    pub fn new<Tz: TimeZone>(
        created: DateTime<Tz>,
        last_accessed: DateTime<Tz>,
        last_written: DateTime<Tz>,
    ) -> Self {
        Self {
            created: created.with_timezone(&Utc),
            last_accessed: last_accessed.with_timezone(&Utc),
            last_written: last_written.with_timezone(&Utc),
        }
    }

    /// All three set to `time`.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            created: time,
            last_accessed: time,
            last_written: time,
        }
    }

    pub fn to_plain(&self) -> AxcResult<Vec<u8>> {
        let mut out = Vec::with_capacity(24);
        for time in [self.created, self.last_accessed, self.last_written] {
            out.extend_from_slice(&to_filetime(time)?.to_le_bytes());
        }
        Ok(out)
    }

    pub fn from_plain(plain: &[u8]) -> AxcResult<Self> {
        Ok(Self {
            created: from_filetime(format::read_i64_le(plain, 0)?)?,
            last_accessed: from_filetime(format::read_i64_le(plain, 8)?)?,
            last_written: from_filetime(format::read_i64_le(plain, 16)?)?,
        })
    }
}

/// NUL-terminated UTF-8.
pub fn file_name_to_plain(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1);
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    out
}

/// A missing terminator means the block was decrypted with the wrong key or
/// is damaged; that is a caller contract violation, not a format problem.
pub fn file_name_from_plain(plain: &[u8]) -> AxcResult<String> {
    let end = plain.iter().position(|b| *b == 0).ok_or_else(|| {
        AxcError::InvalidOperation("file name is not NUL-terminated".into())
    })?;
    Ok(String::from_utf8_lossy(&plain[..end]).into_owned())
}

/// NUL-terminated UTF-16LE.
pub fn unicode_file_name_to_plain(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity((name.len() + 1) * 2);
    for unit in name.encode_utf16().chain(std::iter::once(0)) {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

pub fn unicode_file_name_from_plain(plain: &[u8]) -> AxcResult<String> {
    let units: Vec<u16> = plain
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let end = units.iter().position(|u| *u == 0).ok_or_else(|| {
        AxcError::InvalidOperation("unicode file name is not NUL-terminated".into())
    })?;
    Ok(String::from_utf16_lossy(&units[..end]))
}
