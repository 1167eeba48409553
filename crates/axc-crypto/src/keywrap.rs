//! AES key wrap (RFC 3394) in two interoperable modes
//!
//! - `Specification`: plain RFC 3394, the key-encrypting key used as given,
//!   round counter XORed big-endian.
//! - `AxCrypt`: the key-encrypting key is first XORed with a salt, the
//!   iteration count replaces the fixed six rounds, and the round counter is
//!   XORed little-endian. This makes the wrap double as the passphrase KDF.
//!
//! Unwrapping with the wrong key is detected by the integrity check value
//! and reported as `Ok(None)`, not as an error.

use axc_core::{AxcError, AxcResult};
use zeroize::Zeroize;

use crate::cipher::BlockCipher;
use crate::key::{AesKey, VALID_KEY_SIZES};
use crate::BLOCK_SIZE;

/// RFC 3394 default integrity check value.
pub const DEFAULT_ICV: [u8; 8] = [0xA6; 8];

/// Round count mandated by RFC 3394.
pub const SPECIFICATION_ITERATIONS: u32 = 6;

/// Lowest iteration count accepted by either mode.
pub const MINIMUM_ITERATIONS: u32 = 6;

/// Highest iteration count accepted. Counts read from a file above this are
/// rejected before any unwrap work is done.
pub const MAXIMUM_ITERATIONS: u32 = 0x0100_0000;

pub const MAX_SALT_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyWrapMode {
    Specification = 1,
    AxCrypt = 2,
}

impl TryFrom<u8> for KeyWrapMode {
    type Error = AxcError;

    fn try_from(value: u8) -> AxcResult<Self> {
        match value {
            1 => Ok(Self::Specification),
            2 => Ok(Self::AxCrypt),
            other => Err(AxcError::InvalidArgument(format!(
                "unknown key wrap mode {other}"
            ))),
        }
    }
}

pub struct KeyWrap {
    cipher: Option<BlockCipher>,
    iterations: u32,
    mode: KeyWrapMode,
}

impl KeyWrap {
    /// A key wrap without salt. AxCrypt mode requires a salt, so this is only
    /// valid for `Specification`.
    pub fn new(kek: &AesKey, iterations: u32, mode: KeyWrapMode) -> AxcResult<Self> {
        Self::with_salt(kek, &[], iterations, mode)
    }

    pub fn with_salt(
        kek: &AesKey,
        salt: &[u8],
        iterations: u32,
        mode: KeyWrapMode,
    ) -> AxcResult<Self> {
        if iterations < MINIMUM_ITERATIONS {
            return Err(AxcError::InvalidArgument(format!(
                "key wrap iterations must be at least {MINIMUM_ITERATIONS}, got {iterations}"
            )));
        }
        if iterations > MAXIMUM_ITERATIONS {
            return Err(AxcError::InvalidArgument(format!(
                "key wrap iterations must be at most {MAXIMUM_ITERATIONS}, got {iterations}"
            )));
        }
        if salt.len() > MAX_SALT_SIZE {
            return Err(AxcError::InvalidArgument(format!(
                "salt must be at most {MAX_SALT_SIZE} bytes, got {}",
                salt.len()
            )));
        }

        let cipher = match mode {
            KeyWrapMode::Specification => {
                if !salt.is_empty() {
                    return Err(AxcError::InvalidArgument(
                        "specification mode key wrap takes no salt".into(),
                    ));
                }
                BlockCipher::new(kek)?
            }
            KeyWrapMode::AxCrypt => {
                if salt.len() < kek.len() {
                    return Err(AxcError::InvalidArgument(format!(
                        "salt must be at least as long as the key ({} bytes), got {}",
                        kek.len(),
                        salt.len()
                    )));
                }
                let mut salted: Vec<u8> = kek
                    .as_bytes()
                    .iter()
                    .zip(salt)
                    .map(|(k, s)| k ^ s)
                    .collect();
                let salted_key = AesKey::from_bytes(&salted);
                salted.zeroize();
                BlockCipher::new(&salted_key?)?
            }
        };

        Ok(Self {
            cipher: Some(cipher),
            iterations,
            mode,
        })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn mode(&self) -> KeyWrapMode {
        self.mode
    }

    /// Wrap `key`. Output is `key.len() + 8` bytes.
    pub fn wrap(&self, key: &AesKey) -> AxcResult<Vec<u8>> {
        let cipher = self.cipher()?;
        let n = key.len() / 8;

        let mut a = DEFAULT_ICV;
        let mut r: Vec<[u8; 8]> = key
            .as_bytes()
            .chunks_exact(8)
            .map(|c| {
                let mut block = [0u8; 8];
                block.copy_from_slice(c);
                block
            })
            .collect();

        let mut b = [0u8; BLOCK_SIZE];
        for j in 0..self.iterations as u64 {
            for (i, ri) in r.iter_mut().enumerate() {
                b[..8].copy_from_slice(&a);
                b[8..].copy_from_slice(ri);
                cipher.encrypt_block(&mut b);

                let t = n as u64 * j + i as u64 + 1;
                a.copy_from_slice(&b[..8]);
                self.xor_counter(&mut a, t);
                ri.copy_from_slice(&b[8..]);
            }
        }
        b.zeroize();

        let mut wrapped = Vec::with_capacity(8 + key.len());
        wrapped.extend_from_slice(&a);
        for ri in &r {
            wrapped.extend_from_slice(ri);
        }
        r.zeroize();
        Ok(wrapped)
    }

    /// Unwrap `wrapped`. Returns `Ok(None)` if the integrity check value does
    /// not match, i.e. the key-encrypting key (or salt, or iteration count)
    /// is wrong.
    pub fn unwrap(&self, wrapped: &[u8]) -> AxcResult<Option<AesKey>> {
        let cipher = self.cipher()?;
        let key_len = wrapped.len().saturating_sub(8);
        if wrapped.len() % 8 != 0 || !VALID_KEY_SIZES.contains(&key_len) {
            return Err(AxcError::Internal(format!(
                "wrapped key data must be key length + 8 bytes, got {}",
                wrapped.len()
            )));
        }
        let n = key_len / 8;

        let mut a = [0u8; 8];
        a.copy_from_slice(&wrapped[..8]);
        let mut r: Vec<[u8; 8]> = wrapped[8..]
            .chunks_exact(8)
            .map(|c| {
                let mut block = [0u8; 8];
                block.copy_from_slice(c);
                block
            })
            .collect();

        let mut b = [0u8; BLOCK_SIZE];
        for j in (0..self.iterations as u64).rev() {
            for (i, ri) in r.iter_mut().enumerate().rev() {
                let t = n as u64 * j + i as u64 + 1;
                self.xor_counter(&mut a, t);
                b[..8].copy_from_slice(&a);
                b[8..].copy_from_slice(ri);
                cipher.decrypt_block(&mut b);

                a.copy_from_slice(&b[..8]);
                ri.copy_from_slice(&b[8..]);
            }
        }
        b.zeroize();

        let mut plain = Vec::with_capacity(key_len);
        for ri in &r {
            plain.extend_from_slice(ri);
        }
        r.zeroize();

        let result = if a == DEFAULT_ICV {
            Some(AesKey::from_bytes(&plain)?)
        } else {
            None
        };
        plain.zeroize();
        Ok(result)
    }

    /// Drop the key schedule. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.cipher = None;
    }

    pub fn is_disposed(&self) -> bool {
        self.cipher.is_none()
    }

    fn cipher(&self) -> AxcResult<&BlockCipher> {
        self.cipher.as_ref().ok_or(AxcError::Disposed("KeyWrap"))
    }

    fn xor_counter(&self, a: &mut [u8; 8], t: u64) {
        let counter = match self.mode {
            KeyWrapMode::Specification => t.to_be_bytes(),
            KeyWrapMode::AxCrypt => t.to_le_bytes(),
        };
        for (x, c) in a.iter_mut().zip(counter) {
            *x ^= c;
        }
    }
}

impl std::fmt::Debug for KeyWrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyWrap")
            .field("mode", &self.mode)
            .field("iterations", &self.iterations)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
