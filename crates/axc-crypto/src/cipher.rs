//! AES block-cipher wrapper: one key + IV + mode + padding configuration
//!
//! One-shot `encrypt`/`decrypt` for small buffers (header blocks, subkey
//! derivation) and streaming [`AesEncryptor`]/[`AesDecryptor`] transforms for
//! the payload. Chaining is done here over the raw block cipher so the same
//! code serves all three key sizes.

use ::aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use ::aes::{Aes128, Aes192, Aes256};
use axc_core::{AxcError, AxcResult};
use zeroize::Zeroize;

use crate::key::{AesIv, AesKey};
use crate::BLOCK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Cbc,
    Ecb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingMode {
    Pkcs7,
    /// Input must already be a multiple of the block size.
    None,
}

#[derive(Clone)]
pub(crate) enum BlockCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockCipher {
    pub(crate) fn new(key: &AesKey) -> AxcResult<Self> {
        let bytes = key.as_bytes();
        let invalid = |_| AxcError::InvalidArgument(format!("bad AES key length {}", bytes.len()));
        match bytes.len() {
            16 => Aes128::new_from_slice(bytes).map(Self::Aes128).map_err(invalid),
            24 => Aes192::new_from_slice(bytes).map(Self::Aes192).map_err(invalid),
            32 => Aes256::new_from_slice(bytes).map(Self::Aes256).map_err(invalid),
            n => Err(AxcError::InvalidArgument(format!("bad AES key length {n}"))),
        }
    }

    pub(crate) fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    pub(crate) fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

pub struct AesCrypto {
    cipher: Option<BlockCipher>,
    iv: AesIv,
    mode: CipherMode,
    padding: PaddingMode,
}

impl AesCrypto {
    pub fn new(key: &AesKey, iv: AesIv, mode: CipherMode, padding: PaddingMode) -> AxcResult<Self> {
        Ok(Self {
            cipher: Some(BlockCipher::new(key)?),
            iv,
            mode,
            padding,
        })
    }

    /// CBC with PKCS7 padding, the payload configuration.
    pub fn cbc(key: &AesKey, iv: AesIv) -> AxcResult<Self> {
        Self::new(key, iv, CipherMode::Cbc, PaddingMode::Pkcs7)
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> AxcResult<Vec<u8>> {
        let mut transform = self.encryptor()?;
        let mut out = Vec::with_capacity(plaintext.len() + BLOCK_SIZE);
        transform.update(plaintext, &mut out);
        transform.finalize(&mut out)?;
        Ok(out)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> AxcResult<Vec<u8>> {
        let mut transform = self.decryptor()?;
        let mut out = Vec::with_capacity(ciphertext.len());
        transform.update(ciphertext, &mut out);
        transform.finalize(&mut out)?;
        Ok(out)
    }

    pub fn encryptor(&self) -> AxcResult<AesEncryptor> {
        Ok(AesEncryptor {
            state: ChainState::new(self.cipher()?.clone(), self.iv, self.mode),
            padding: self.padding,
        })
    }

    pub fn decryptor(&self) -> AxcResult<AesDecryptor> {
        Ok(AesDecryptor {
            state: ChainState::new(self.cipher()?.clone(), self.iv, self.mode),
            padding: self.padding,
            held: None,
        })
    }

    /// Drop the key schedule. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.cipher = None;
        self.iv = AesIv::zero();
    }

    pub fn is_disposed(&self) -> bool {
        self.cipher.is_none()
    }

    fn cipher(&self) -> AxcResult<&BlockCipher> {
        self.cipher.as_ref().ok_or(AxcError::Disposed("AesCrypto"))
    }
}

impl std::fmt::Debug for AesCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCrypto")
            .field("mode", &self.mode)
            .field("padding", &self.padding)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Block chaining state shared by both directions; buffers a partial block
/// between `update` calls.
struct ChainState {
    cipher: BlockCipher,
    mode: CipherMode,
    chain: [u8; BLOCK_SIZE],
    pending: [u8; BLOCK_SIZE],
    pending_len: usize,
}

impl ChainState {
    fn new(cipher: BlockCipher, iv: AesIv, mode: CipherMode) -> Self {
        Self {
            cipher,
            mode,
            chain: *iv.as_bytes(),
            pending: [0u8; BLOCK_SIZE],
            pending_len: 0,
        }
    }

    /// Feed `input` and call `f` for every completed block.
    fn feed(&mut self, mut input: &[u8], mut f: impl FnMut(&mut Self, [u8; BLOCK_SIZE])) {
        if self.pending_len > 0 {
            let take = (BLOCK_SIZE - self.pending_len).min(input.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&input[..take]);
            self.pending_len += take;
            input = &input[take..];
            if self.pending_len < BLOCK_SIZE {
                return;
            }
            let block = self.pending;
            self.pending_len = 0;
            f(self, block);
        }

        let mut blocks = input.chunks_exact(BLOCK_SIZE);
        for chunk in &mut blocks {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            f(self, block);
        }

        let rest = blocks.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    fn encrypt(&mut self, mut block: [u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        if self.mode == CipherMode::Cbc {
            xor_in_place(&mut block, &self.chain);
        }
        self.cipher.encrypt_block(&mut block);
        if self.mode == CipherMode::Cbc {
            self.chain = block;
        }
        block
    }

    fn decrypt(&mut self, block: [u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut plain = block;
        self.cipher.decrypt_block(&mut plain);
        if self.mode == CipherMode::Cbc {
            xor_in_place(&mut plain, &self.chain);
            self.chain = block;
        }
        plain
    }
}

impl Drop for ChainState {
    fn drop(&mut self) {
        self.chain.zeroize();
        self.pending.zeroize();
    }
}

fn xor_in_place(block: &mut [u8; BLOCK_SIZE], other: &[u8; BLOCK_SIZE]) {
    for (b, o) in block.iter_mut().zip(other) {
        *b ^= o;
    }
}

/// Streaming encrypt transform. Output lags input by at most one block.
pub struct AesEncryptor {
    state: ChainState,
    padding: PaddingMode,
}

impl AesEncryptor {
    pub fn update(&mut self, input: &[u8], output: &mut Vec<u8>) {
        self.state.feed(input, |state, block| {
            let encrypted = state.encrypt(block);
            output.extend_from_slice(&encrypted);
        });
    }

    /// Pad and flush the final block.
    pub fn finalize(mut self, output: &mut Vec<u8>) -> AxcResult<()> {
        let pending_len = self.state.pending_len;
        match self.padding {
            PaddingMode::Pkcs7 => {
                let pad = (BLOCK_SIZE - pending_len) as u8;
                let mut block = self.state.pending;
                block[pending_len..].fill(pad);
                let encrypted = self.state.encrypt(block);
                output.extend_from_slice(&encrypted);
            }
            PaddingMode::None if pending_len != 0 => {
                return Err(AxcError::InvalidArgument(format!(
                    "unpadded input must be a multiple of {BLOCK_SIZE} bytes"
                )));
            }
            PaddingMode::None => {}
        }
        self.state.pending_len = 0;
        Ok(())
    }
}

/// Streaming decrypt transform. With PKCS7 the last decrypted block is held
/// back until `finalize` so the padding can be checked and stripped.
pub struct AesDecryptor {
    state: ChainState,
    padding: PaddingMode,
    held: Option<[u8; BLOCK_SIZE]>,
}

impl AesDecryptor {
    pub fn update(&mut self, input: &[u8], output: &mut Vec<u8>) {
        let padding = self.padding;
        let held = &mut self.held;
        self.state.feed(input, |state, block| {
            let plain = state.decrypt(block);
            match padding {
                PaddingMode::None => output.extend_from_slice(&plain),
                PaddingMode::Pkcs7 => {
                    if let Some(previous) = held.replace(plain) {
                        output.extend_from_slice(&previous);
                    }
                }
            }
        });
    }

    /// Verify and strip padding. A ciphertext that is empty, not block
    /// aligned, or whose last block carries malformed padding fails with
    /// `CryptoPadding`.
    pub fn finalize(mut self, output: &mut Vec<u8>) -> AxcResult<()> {
        if self.state.pending_len != 0 {
            return Err(match self.padding {
                PaddingMode::Pkcs7 => AxcError::CryptoPadding,
                PaddingMode::None => AxcError::InvalidArgument(format!(
                    "ciphertext must be a multiple of {BLOCK_SIZE} bytes"
                )),
            });
        }
        if self.padding == PaddingMode::None {
            return Ok(());
        }

        let mut last = self.held.take().ok_or(AxcError::CryptoPadding)?;
        let pad = last[BLOCK_SIZE - 1] as usize;
        let valid = (1..=BLOCK_SIZE).contains(&pad)
            && last[BLOCK_SIZE - pad..].iter().all(|&b| b as usize == pad);
        if !valid {
            last.zeroize();
            return Err(AxcError::CryptoPadding);
        }
        output.extend_from_slice(&last[..BLOCK_SIZE - pad]);
        last.zeroize();
        Ok(())
    }
}

impl Drop for AesDecryptor {
    fn drop(&mut self) {
        if let Some(held) = self.held.as_mut() {
            held.zeroize();
        }
    }
}
