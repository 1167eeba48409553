//! axc-document: the axc container format and its streaming pipeline
//!
//! Layers, bottom up:
//! - [`format`]: magic, block prefix framing, little-endian fields, FILETIME
//! - [`blocks`]: one [`HeaderBlock`] variant per block kind, plus the
//!   plaintext layouts of the encrypted kinds
//! - [`reader`]: pull-based [`HeaderBlockReader`] that also accumulates the
//!   document HMAC
//! - [`headers`]: [`DocumentHeaders`], the decoded manifest (key unwrap,
//!   subkeys, file metadata)
//! - [`document`]: [`AxcDocument`] load / decrypt / encrypt / re-key
//! - [`names`]: encrypted file name convention

pub mod blocks;
pub mod clock;
pub mod document;
pub mod format;
pub mod headers;
pub mod names;
pub mod reader;

pub use blocks::{FileTimes, HeaderBlock, KeyWrapBlock, VersionBlock};
pub use clock::{Clock, FixedClock, SystemClock};
pub use document::{AxcDocument, EncryptionOptions};
pub use format::{BlockType, MAGIC};
pub use headers::DocumentHeaders;
pub use names::{create_encrypted_name, is_encrypted_name};
pub use reader::{HeaderBlockReader, ReadItem};
