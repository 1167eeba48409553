//! Purpose-separated subkeys derived from the master key
//!
//! Each subkey is AES-ECB of a block tagged with the purpose byte (and a block
//! index for keys longer than one block) under the master key. Knowing one
//! subkey gives nothing about the others without the master key.

use axc_core::AxcResult;
use zeroize::Zeroize;

use crate::cipher::{AesCrypto, CipherMode, PaddingMode};
use crate::key::{AesIv, AesKey};
use crate::BLOCK_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubkeyPurpose {
    Hmac = 0,
    Validator = 1,
    Headers = 2,
    Data = 3,
}

/// Derive the subkey for `purpose`. The result has the master key's length.
pub fn derive_subkey(master: &AesKey, purpose: SubkeyPurpose) -> AxcResult<AesKey> {
    let mut crypto = AesCrypto::new(master, AesIv::zero(), CipherMode::Ecb, PaddingMode::None)?;

    let blocks = master.len().div_ceil(BLOCK_SIZE);
    let mut tagged = vec![0u8; blocks * BLOCK_SIZE];
    for (index, block) in tagged.chunks_exact_mut(BLOCK_SIZE).enumerate() {
        block[0] = purpose as u8;
        block[1] = index as u8;
    }

    let mut derived = crypto.encrypt(&tagged)?;
    crypto.dispose();
    let subkey = AesKey::from_bytes(&derived[..master.len()]);
    derived.zeroize();
    subkey
}

/// The three subkeys a loaded document works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subkeys {
    pub headers: AesKey,
    pub data: AesKey,
    pub hmac: AesKey,
}

impl Subkeys {
    pub fn derive(master: &AesKey) -> AxcResult<Self> {
        Ok(Self {
            headers: derive_subkey(master, SubkeyPurpose::Headers)?,
            data: derive_subkey(master, SubkeyPurpose::Data)?,
            hmac: derive_subkey(master, SubkeyPurpose::Hmac)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_purposes_yield_distinct_keys() {
        let master = AesKey::generate(&mut OsRng, 16).unwrap();
        let subkeys = Subkeys::derive(&master).unwrap();
        let validator = derive_subkey(&master, SubkeyPurpose::Validator).unwrap();

        assert_ne!(subkeys.headers, subkeys.data);
        assert_ne!(subkeys.headers, subkeys.hmac);
        assert_ne!(subkeys.data, subkeys.hmac);
        assert_ne!(validator, subkeys.hmac);
        assert_ne!(subkeys.data, master);
    }

    #[test]
    fn test_deterministic_for_same_master() {
        let master = AesKey::from_bytes(&[0x11; 32]).unwrap();
        let a = Subkeys::derive(&master).unwrap();
        let b = Subkeys::derive(&master).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_subkey_length_follows_master() {
        for size in [16, 24, 32] {
            let master = AesKey::generate(&mut OsRng, size).unwrap();
            let subkey = derive_subkey(&master, SubkeyPurpose::Data).unwrap();
            assert_eq!(subkey.len(), size);
        }
    }

    #[test]
    fn test_headers_subkey_is_ecb_of_tag_block() {
        let master = AesKey::from_bytes(&[0u8; 16]).unwrap();
        let crypto =
            AesCrypto::new(&master, AesIv::zero(), CipherMode::Ecb, PaddingMode::None).unwrap();
        let mut block = [0u8; 16];
        block[0] = SubkeyPurpose::Headers as u8;
        let expected = crypto.encrypt(&block).unwrap();

        let subkey = derive_subkey(&master, SubkeyPurpose::Headers).unwrap();
        assert_eq!(subkey.as_bytes(), expected.as_slice());
    }
}
