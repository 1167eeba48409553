//! Document HMAC: HMAC-SHA1 keyed with the HMAC subkey, truncated to 128 bits

use ::hmac::{Hmac, Mac};
use axc_core::{AxcError, AxcResult};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::key::AesKey;
use crate::HMAC_SIZE;

/// The 16-byte integrity value stored in the Preamble block.
#[derive(Clone, Copy, Default)]
pub struct DataHmac([u8; HMAC_SIZE]);

impl DataHmac {
    pub fn from_bytes(bytes: [u8; HMAC_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> AxcResult<Self> {
        let array: [u8; HMAC_SIZE] = bytes.try_into().map_err(|_| {
            AxcError::InvalidArgument(format!("HMAC must be {HMAC_SIZE} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; HMAC_SIZE] {
        &self.0
    }
}

impl PartialEq for DataHmac {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for DataHmac {}

impl std::fmt::Debug for DataHmac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataHmac(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// Incremental HMAC over everything fed to it.
pub struct HmacSha1Stream {
    mac: Hmac<Sha1>,
    count: u64,
}

impl HmacSha1Stream {
    pub fn new(key: &AesKey) -> AxcResult<Self> {
        let mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
            .map_err(|e| AxcError::Internal(format!("HMAC key setup failed: {e}")))?;
        Ok(Self { mac, count: 0 })
    }

    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
        self.count += data.len() as u64;
    }

    /// Bytes fed so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn finalize(self) -> DataHmac {
        let full = self.mac.finalize().into_bytes();
        let mut truncated = [0u8; HMAC_SIZE];
        truncated.copy_from_slice(&full[..HMAC_SIZE]);
        DataHmac(truncated)
    }
}
