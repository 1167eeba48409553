//! Fixed-size key and IV value types

use axc_core::{AxcError, AxcResult};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::random::RandomSource;
use crate::thumbprint::AesKeyThumbprint;
use crate::IV_SIZE;

/// Key sizes accepted by AES-128, AES-192 and AES-256.
pub const VALID_KEY_SIZES: [usize; 3] = [16, 24, 32];

/// An AES key. Compared by content in constant time, zeroized on drop.
#[derive(Clone)]
pub struct AesKey {
    bytes: Vec<u8>,
}

impl AesKey {
    pub fn from_bytes(bytes: &[u8]) -> AxcResult<Self> {
        if !VALID_KEY_SIZES.contains(&bytes.len()) {
            return Err(AxcError::InvalidArgument(format!(
                "AES key must be 16, 24 or 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Generate a random key of `size` bytes.
    pub fn generate(rng: &mut dyn RandomSource, size: usize) -> AxcResult<Self> {
        if !VALID_KEY_SIZES.contains(&size) {
            return Err(AxcError::InvalidArgument(format!(
                "AES key must be 16, 24 or 32 bytes, got {size}"
            )));
        }
        let mut bytes = vec![0u8; size];
        rng.fill_bytes(&mut bytes);
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn thumbprint(&self, salt: &[u8], iterations: u32) -> AxcResult<AesKeyThumbprint> {
        AesKeyThumbprint::new(self, salt, iterations)
    }
}

impl PartialEq for AesKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }
}

impl Eq for AesKey {}

impl Drop for AesKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 128-bit AES-CBC initialization vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AesIv([u8; IV_SIZE]);

impl AesIv {
    pub fn zero() -> Self {
        Self([0u8; IV_SIZE])
    }

    pub fn from_bytes(bytes: [u8; IV_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> AxcResult<Self> {
        let array: [u8; IV_SIZE] = bytes.try_into().map_err(|_| {
            AxcError::InvalidArgument(format!(
                "IV must be {IV_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn generate(rng: &mut dyn RandomSource) -> Self {
        let mut bytes = [0u8; IV_SIZE];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IV_SIZE] {
        &self.0
    }
}
