//! Byte-level layout of an axc container
//!
//! ```text
//! [16 bytes: magic]
//! repeated: [u32 LE: payload length][u8: block type][payload]
//!   first block is always the Preamble, last header block is Data
//! [ciphertext: Data.cipher_text_length bytes]
//! ```
//!
//! All integers are little-endian regardless of host byte order.

use std::io::{ErrorKind, Read};

use axc_core::{AxcError, AxcResult};
use axc_crypto::HMAC_SIZE;
use chrono::{DateTime, Utc};

/// Container signature, always the first 16 bytes.
pub const MAGIC: [u8; 16] = [
    0xC0, 0xB9, 0x07, 0x2E, 0x4F, 0x93, 0xF1, 0x46, 0xA0, 0x15, 0x79, 0x2C, 0xA1, 0xD9, 0xE8, 0x21,
];

/// `u32` length followed by `u8` type tag.
pub const BLOCK_PREFIX_SIZE: usize = 5;

/// Offset of the stored HMAC: the magic plus the Preamble's prefix.
pub const HMAC_OFFSET: usize = MAGIC.len() + BLOCK_PREFIX_SIZE;

/// Start of the HMAC-covered header bytes, right after the Preamble.
pub const HMAC_REGION_OFFSET: usize = HMAC_OFFSET + HMAC_SIZE;

/// Payload lengths at or above this are rejected before any allocation.
pub const MAX_BLOCK_LENGTH: i32 = 0x0100_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Preamble,
    Version,
    KeyWrap1,
    KeyWrap2,
    IdTag,
    Data,
    FileNameInfo,
    EncryptionInfo,
    CompressionInfo,
    FileInfo,
    Compression,
    UnicodeFileNameInfo,
}

impl BlockType {
    pub fn tag(self) -> u8 {
        match self {
            Self::Preamble => 1,
            Self::Version => 2,
            Self::KeyWrap1 => 3,
            Self::KeyWrap2 => 4,
            Self::IdTag => 5,
            Self::Data => 63,
            Self::FileNameInfo => 65,
            Self::EncryptionInfo => 66,
            Self::CompressionInfo => 67,
            Self::FileInfo => 68,
            Self::Compression => 69,
            Self::UnicodeFileNameInfo => 70,
        }
    }

    /// `None` for tags this implementation does not know.
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => Self::Preamble,
            2 => Self::Version,
            3 => Self::KeyWrap1,
            4 => Self::KeyWrap2,
            5 => Self::IdTag,
            63 => Self::Data,
            65 => Self::FileNameInfo,
            66 => Self::EncryptionInfo,
            67 => Self::CompressionInfo,
            68 => Self::FileInfo,
            69 => Self::Compression,
            70 => Self::UnicodeFileNameInfo,
            _ => return None,
        })
    }

    /// Blocks whose payload is encrypted with the headers subkey.
    pub fn is_encrypted(self) -> bool {
        matches!(
            self,
            Self::FileNameInfo
                | Self::EncryptionInfo
                | Self::CompressionInfo
                | Self::FileInfo
                | Self::Compression
                | Self::UnicodeFileNameInfo
        )
    }
}

/// Decoded and validated block prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPrefix {
    pub length: usize,
    pub tag: u8,
}

/// Validate a raw prefix. Both checks run before the payload is read so a
/// hostile length never reaches an allocation.
pub fn decode_prefix(raw: &[u8; BLOCK_PREFIX_SIZE]) -> AxcResult<BlockPrefix> {
    let length = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    if length < 0 {
        return Err(AxcError::FileFormat(format!(
            "negative header block length {length}"
        )));
    }
    if length >= MAX_BLOCK_LENGTH {
        return Err(AxcError::FileFormat(format!(
            "header block length {length:#x} exceeds limit {MAX_BLOCK_LENGTH:#x}"
        )));
    }
    let tag = raw[4];
    if (tag as i8) < 0 {
        return Err(AxcError::FileFormat(format!(
            "negative header block type {}",
            tag as i8
        )));
    }
    Ok(BlockPrefix {
        length: length as usize,
        tag,
    })
}

pub fn encode_prefix(length: usize, tag: u8, out: &mut Vec<u8>) -> AxcResult<()> {
    let length = i32::try_from(length)
        .ok()
        .filter(|l| *l < MAX_BLOCK_LENGTH)
        .ok_or_else(|| {
            AxcError::InvalidArgument(format!("header block payload too large: {length} bytes"))
        })?;
    if (tag as i8) < 0 {
        return Err(AxcError::InvalidArgument(format!(
            "header block type {tag} out of range"
        )));
    }
    out.extend_from_slice(&length.to_le_bytes());
    out.push(tag);
    Ok(())
}

/// Read until `buf` is full or the stream ends. Returns the bytes read; a
/// short count means end of stream, not an error.
pub fn read_fully<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> AxcResult<usize> {
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

pub fn read_u32_le(bytes: &[u8], offset: usize) -> AxcResult<u32> {
    let raw = field(bytes, offset, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

pub fn read_i32_le(bytes: &[u8], offset: usize) -> AxcResult<i32> {
    Ok(read_u32_le(bytes, offset)? as i32)
}

pub fn read_i64_le(bytes: &[u8], offset: usize) -> AxcResult<i64> {
    let raw = field(bytes, offset, 8)?;
    let mut array = [0u8; 8];
    array.copy_from_slice(raw);
    Ok(i64::from_le_bytes(array))
}

/// A non-negative i64 length field.
pub fn read_length_le(bytes: &[u8], offset: usize) -> AxcResult<u64> {
    let value = read_i64_le(bytes, offset)?;
    u64::try_from(value)
        .map_err(|_| AxcError::FileFormat(format!("negative length field {value}")))
}

pub fn write_length_le(value: u64, out: &mut Vec<u8>) -> AxcResult<()> {
    let value = i64::try_from(value)
        .map_err(|_| AxcError::InvalidArgument(format!("length {value} out of range")))?;
    out.extend_from_slice(&value.to_le_bytes());
    Ok(())
}

fn field(bytes: &[u8], offset: usize, len: usize) -> AxcResult<&[u8]> {
    bytes.get(offset..offset + len).ok_or_else(|| {
        AxcError::FileFormat(format!(
            "field at offset {offset} ({len} bytes) past end of {}-byte block",
            bytes.len()
        ))
    })
}

/// Seconds between 1601-01-01 (Windows FILETIME epoch) and the Unix epoch.
const FILETIME_UNIX_OFFSET_SECS: i64 = 11_644_473_600;
const FILETIME_TICKS_PER_SEC: i64 = 10_000_000;

/// 100-nanosecond ticks since 1601-01-01 UTC.
pub fn to_filetime(time: DateTime<Utc>) -> AxcResult<i64> {
    time.timestamp()
        .checked_add(FILETIME_UNIX_OFFSET_SECS)
        .and_then(|secs| secs.checked_mul(FILETIME_TICKS_PER_SEC))
        .and_then(|ticks| ticks.checked_add(i64::from(time.timestamp_subsec_nanos() / 100)))
        .filter(|ticks| *ticks >= 0)
        .ok_or_else(|| AxcError::InvalidArgument(format!("timestamp {time} not representable")))
}

pub fn from_filetime(ticks: i64) -> AxcResult<DateTime<Utc>> {
    if ticks < 0 {
        return Err(AxcError::FileFormat(format!("negative file time {ticks}")));
    }
    let secs = ticks / FILETIME_TICKS_PER_SEC - FILETIME_UNIX_OFFSET_SECS;
    let nanos = (ticks % FILETIME_TICKS_PER_SEC) as u32 * 100;
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| AxcError::FileFormat(format!("file time {ticks} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axc_core::ErrorStatus;
    use chrono::TimeZone;

    fn prefix(length: i32, tag: u8) -> [u8; BLOCK_PREFIX_SIZE] {
        let l = length.to_le_bytes();
        [l[0], l[1], l[2], l[3], tag]
    }

    #[test]
    fn test_prefix_is_little_endian() {
        let mut out = Vec::new();
        encode_prefix(0x0102_03, 2, &mut out).unwrap();
        assert_eq!(out, vec![0x03, 0x02, 0x01, 0x00, 0x02]);

        let decoded = decode_prefix(&[0x03, 0x02, 0x01, 0x00, 0x02]).unwrap();
        assert_eq!(decoded, BlockPrefix { length: 0x010203, tag: 2 });
    }

    #[test]
    fn test_negative_length_rejected() {
        let err = decode_prefix(&prefix(-1, 2)).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::FileFormatError);
    }

    #[test]
    fn test_oversized_length_rejected() {
        assert!(decode_prefix(&prefix(MAX_BLOCK_LENGTH - 1, 2)).is_ok());
        let err = decode_prefix(&prefix(MAX_BLOCK_LENGTH, 2)).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::FileFormatError);
    }

    #[test]
    fn test_negative_type_rejected() {
        let err = decode_prefix(&prefix(4, 0x80)).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::FileFormatError);
        assert!(decode_prefix(&prefix(4, 0x7F)).is_ok());
    }

    #[test]
    fn test_tags_roundtrip() {
        for tag in 0..=u8::MAX {
            if let Some(block_type) = BlockType::from_tag(tag) {
                assert_eq!(block_type.tag(), tag);
            }
        }
        assert_eq!(BlockType::from_tag(6), None);
        assert!(BlockType::FileInfo.is_encrypted());
        assert!(!BlockType::KeyWrap1.is_encrypted());
    }

    #[test]
    fn test_read_fully_short_stream() {
        let mut input: &[u8] = b"abc";
        let mut buf = [0u8; 5];
        assert_eq!(read_fully(&mut input, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn test_field_past_end_is_format_error() {
        let err = read_i64_le(&[0u8; 4], 0).unwrap_err();
        assert_eq!(err.status(), ErrorStatus::FileFormatError);
        assert!(read_length_le(&(-5i64).to_le_bytes(), 0).is_err());
    }

    #[test]
    fn test_filetime_known_values() {
        let unix_epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(to_filetime(unix_epoch).unwrap(), 116_444_736_000_000_000);

        let t = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 15).unwrap();
        let back = from_filetime(to_filetime(t).unwrap()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_filetime_rejects_negative() {
        assert!(from_filetime(-1).is_err());
    }
}
