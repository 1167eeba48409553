//! Salted, iterated key fingerprint
//!
//! Lets session code recognize "this passphrase produced that key" without
//! ever persisting the key. The digest is the first 8 bytes of an AxCrypt
//! mode key wrap of the key under itself.

use axc_core::AxcResult;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::key::AesKey;
use crate::keywrap::{KeyWrap, KeyWrapMode};
use crate::random::{random_bytes, RandomSource};

pub const DIGEST_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AesKeyThumbprint {
    salt: Vec<u8>,
    iterations: u32,
    digest: [u8; DIGEST_SIZE],
}

impl AesKeyThumbprint {
    /// `salt` must be at least as long as `key`.
    pub fn new(key: &AesKey, salt: &[u8], iterations: u32) -> AxcResult<Self> {
        let digest = compute_digest(key, salt, iterations)?;
        Ok(Self {
            salt: salt.to_vec(),
            iterations,
            digest,
        })
    }

    /// Thumbprint with a fresh random salt sized to the key.
    pub fn generate(key: &AesKey, iterations: u32, rng: &mut dyn RandomSource) -> AxcResult<Self> {
        let salt = random_bytes(rng, key.len());
        Self::new(key, &salt, iterations)
    }

    /// Recompute with this thumbprint's salt and iterations and compare.
    pub fn matches(&self, key: &AesKey) -> AxcResult<bool> {
        let digest = compute_digest(key, &self.salt, self.iterations)?;
        Ok(digest[..].ct_eq(&self.digest[..]).into())
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn digest(&self) -> &[u8; DIGEST_SIZE] {
        &self.digest
    }
}

fn compute_digest(key: &AesKey, salt: &[u8], iterations: u32) -> AxcResult<[u8; DIGEST_SIZE]> {
    let mut wrap = KeyWrap::with_salt(key, salt, iterations, KeyWrapMode::AxCrypt)?;
    let wrapped = wrap.wrap(key)?;
    wrap.dispose();

    let mut digest = [0u8; DIGEST_SIZE];
    digest.copy_from_slice(&wrapped[..DIGEST_SIZE]);
    Ok(digest)
}
