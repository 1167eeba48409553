//! Pull-based reader over a container stream
//!
//! Each [`HeaderBlockReader::advance`] yields one item: the magic, a header
//! block, the start of the data region, or end of stream. Every byte after
//! the Preamble feeds the document HMAC in read order: header blocks through
//! the Data block, then the ciphertext. Header bytes read before the HMAC key
//! is known are kept and replayed when it is supplied.

use std::io::{ErrorKind, Read};

use axc_core::{AxcError, AxcResult};
use axc_crypto::{AesKey, DataHmac, HmacSha1Stream};
use tracing::{debug, trace};

use crate::blocks::HeaderBlock;
use crate::format::{decode_prefix, read_fully, BlockType, BLOCK_PREFIX_SIZE, MAGIC};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadItem {
    MagicGuid,
    HeaderBlock(HeaderBlock),
    /// The Data block was read; the ciphertext follows.
    Data { cipher_text_length: u64 },
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Start,
    MagicRead,
    HeaderBlocks,
    Data,
    EndOfStream,
    Disposed,
}

pub struct HeaderBlockReader<R> {
    input: R,
    state: ReaderState,
    blocks_read: usize,
    header_bytes: Vec<u8>,
    hmac: Option<HmacSha1Stream>,
    data_length: u64,
    data_remaining: u64,
    computed: Option<DataHmac>,
}

impl<R: Read> HeaderBlockReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            state: ReaderState::Start,
            blocks_read: 0,
            header_bytes: Vec::new(),
            hmac: None,
            data_length: 0,
            data_remaining: 0,
            computed: None,
        }
    }

    /// Move to the next item. In the data region this skips the remaining
    /// ciphertext (still feeding the HMAC) and reports end of stream.
    pub fn advance(&mut self) -> AxcResult<ReadItem> {
        match self.state {
            ReaderState::Disposed => Err(AxcError::Disposed("HeaderBlockReader")),
            ReaderState::Start => self.read_magic(),
            ReaderState::MagicRead | ReaderState::HeaderBlocks => self.read_block(),
            ReaderState::Data => {
                let mut sink = vec![0u8; 64 * 1024];
                while self.read_data(&mut sink)? > 0 {}
                self.state = ReaderState::EndOfStream;
                Ok(ReadItem::EndOfStream)
            }
            ReaderState::EndOfStream => Ok(ReadItem::EndOfStream),
        }
    }

    fn read_magic(&mut self) -> AxcResult<ReadItem> {
        let mut magic = [0u8; MAGIC.len()];
        let n = read_fully(&mut self.input, &mut magic)?;
        if n < magic.len() {
            return Err(AxcError::FileFormat(format!(
                "stream too short for container signature ({n} bytes)"
            )));
        }
        if magic != MAGIC {
            return Err(AxcError::FileFormat("not an axc container".into()));
        }
        self.state = ReaderState::MagicRead;
        Ok(ReadItem::MagicGuid)
    }

    fn read_block(&mut self) -> AxcResult<ReadItem> {
        let mut raw_prefix = [0u8; BLOCK_PREFIX_SIZE];
        let n = read_fully(&mut self.input, &mut raw_prefix)?;
        if n < BLOCK_PREFIX_SIZE {
            trace!(bytes = n, "stream ended at block prefix");
            self.state = ReaderState::EndOfStream;
            return Ok(ReadItem::EndOfStream);
        }

        let prefix = decode_prefix(&raw_prefix)?;
        let is_preamble = prefix.tag == BlockType::Preamble.tag();
        if is_preamble && self.blocks_read > 0 {
            return Err(AxcError::FileFormat(
                "Preamble must be the first block and appear once".into(),
            ));
        }
        if !is_preamble && self.blocks_read == 0 {
            return Err(AxcError::FileFormat(format!(
                "first header block must be the Preamble, found type {}",
                prefix.tag
            )));
        }

        let mut payload = vec![0u8; prefix.length];
        let n = read_fully(&mut self.input, &mut payload)?;
        if n < prefix.length {
            trace!(
                tag = prefix.tag,
                expected = prefix.length,
                got = n,
                "stream ended inside block payload"
            );
            self.state = ReaderState::EndOfStream;
            return Ok(ReadItem::EndOfStream);
        }

        if !is_preamble {
            self.header_bytes.extend_from_slice(&raw_prefix);
            self.header_bytes.extend_from_slice(&payload);
            if let Some(hmac) = self.hmac.as_mut() {
                hmac.update(&raw_prefix);
                hmac.update(&payload);
            }
        }
        let block = HeaderBlock::decode(prefix.tag, payload)?;
        self.blocks_read += 1;
        debug!(tag = prefix.tag, length = prefix.length, "header block");

        if let HeaderBlock::Data { cipher_text_length } = block {
            self.state = ReaderState::Data;
            self.data_length = cipher_text_length;
            self.data_remaining = cipher_text_length;
            if cipher_text_length == 0 {
                self.finish_data();
            }
            return Ok(ReadItem::Data { cipher_text_length });
        }

        self.state = ReaderState::HeaderBlocks;
        Ok(ReadItem::HeaderBlock(block))
    }

    /// Key the HMAC. Must happen before any ciphertext is read; header bytes
    /// already read are fed in first.
    pub fn set_hmac_key(&mut self, key: &AesKey) -> AxcResult<()> {
        match self.state {
            ReaderState::Disposed => return Err(AxcError::Disposed("HeaderBlockReader")),
            ReaderState::EndOfStream => {
                return Err(AxcError::InvalidOperation(
                    "HMAC key set after the stream ended".into(),
                ))
            }
            _ => {}
        }
        if self.data_remaining != self.data_length {
            return Err(AxcError::InvalidOperation(
                "HMAC key set after data was read".into(),
            ));
        }
        let mut hmac = HmacSha1Stream::new(key)?;
        hmac.update(&self.header_bytes);
        self.hmac = Some(hmac);
        if self.state == ReaderState::Data && self.data_length == 0 {
            self.computed = None;
            self.finish_data();
        }
        Ok(())
    }

    /// Read ciphertext from the data region. Returns 0 once it is exhausted.
    pub fn read_data(&mut self, buf: &mut [u8]) -> AxcResult<usize> {
        match self.state {
            ReaderState::Disposed => return Err(AxcError::Disposed("HeaderBlockReader")),
            ReaderState::Data => {}
            ReaderState::EndOfStream if self.data_remaining == 0 => return Ok(0),
            _ => {
                return Err(AxcError::InvalidOperation(
                    "reader is not positioned at the data region".into(),
                ))
            }
        }
        if self.data_remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(usize::try_from(self.data_remaining).unwrap_or(usize::MAX));
        let n = loop {
            match self.input.read(&mut buf[..want]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if n == 0 {
            return Err(AxcError::FileFormat(format!(
                "stream ended with {} ciphertext bytes missing",
                self.data_remaining
            )));
        }

        if let Some(hmac) = self.hmac.as_mut() {
            hmac.update(&buf[..n]);
        }
        self.data_remaining -= n as u64;
        if self.data_remaining == 0 {
            self.finish_data();
        }
        Ok(n)
    }

    fn finish_data(&mut self) {
        if let Some(hmac) = self.hmac.take() {
            self.computed = Some(hmac.finalize());
        }
    }

    /// HMAC over the header bytes after the Preamble and the ciphertext.
    /// Only available once the whole data region has been read.
    pub fn hmac(&self) -> AxcResult<DataHmac> {
        if self.state == ReaderState::Disposed {
            return Err(AxcError::Disposed("HeaderBlockReader"));
        }
        self.computed.ok_or_else(|| {
            AxcError::InvalidOperation(
                "HMAC is not available until the data region has been read".into(),
            )
        })
    }

    pub fn cipher_text_length(&self) -> u64 {
        self.data_length
    }

    /// True when positioned at the start of an unread data region.
    pub fn at_data_start(&self) -> bool {
        self.state == ReaderState::Data && self.data_remaining == self.data_length
    }

    /// Raw bytes of every block after the Preamble read so far.
    pub fn header_bytes(&self) -> &[u8] {
        &self.header_bytes
    }

    /// Release the underlying stream. Idempotent.
    pub fn dispose(&mut self) {
        if self.state != ReaderState::Disposed {
            self.state = ReaderState::Disposed;
            self.hmac = None;
            self.header_bytes = Vec::new();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state == ReaderState::Disposed
    }
}

impl<R> std::fmt::Debug for HeaderBlockReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderBlockReader")
            .field("state", &self.state)
            .field("blocks_read", &self.blocks_read)
            .field("data_length", &self.data_length)
            .field("data_remaining", &self.data_remaining)
            .finish()
    }
}
