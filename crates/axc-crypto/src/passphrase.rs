//! Passphrase → key-encrypting key

use axc_core::AxcResult;
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};
use zeroize::Zeroize;

use crate::key::AesKey;
use crate::thumbprint::AesKeyThumbprint;

/// KEK size produced from a passphrase (AES-128).
pub const DERIVED_KEY_SIZE: usize = 16;

/// A user passphrase. Held as a `SecretString`, never logged.
#[derive(Debug)]
pub struct Passphrase {
    secret: SecretString,
}

impl Passphrase {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(text.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.secret.expose_secret().is_empty()
    }

    /// The key-encrypting key: the first 128 bits of SHA-1 over the UTF-8
    /// passphrase. The cost factor lives in the key wrap iterations, not here.
    pub fn derived_key(&self) -> AxcResult<AesKey> {
        let mut digest = Sha1::digest(self.secret.expose_secret().as_bytes());
        let key = AesKey::from_bytes(&digest[..DERIVED_KEY_SIZE]);
        digest.as_mut_slice().zeroize();
        key
    }

    /// Thumbprint of the derived key, for recognizing this passphrase later.
    pub fn thumbprint(&self, salt: &[u8], iterations: u32) -> AxcResult<AesKeyThumbprint> {
        AesKeyThumbprint::new(&self.derived_key()?, salt, iterations)
    }
}

impl From<&str> for Passphrase {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_key_is_sha1_prefix() {
        // SHA-1("abc") = a9993e36 4706816a ba3e2571 7850c26c 9cd0d89d
        let key = Passphrase::new("abc").derived_key().unwrap();
        assert_eq!(hex::encode(key.as_bytes()), "a9993e364706816aba3e25717850c26c");
    }

    #[test]
    fn test_deterministic() {
        let a = Passphrase::from("correct horse").derived_key().unwrap();
        let b = Passphrase::from("correct horse").derived_key().unwrap();
        assert_eq!(a, b, "derivation must be deterministic");
    }

    #[test]
    fn test_different_passphrases_differ() {
        let a = Passphrase::from("a").derived_key().unwrap();
        let b = Passphrase::from("b").derived_key().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_does_not_leak() {
        let printed = format!("{:?}", Passphrase::from("hunter2"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_thumbprint_recognizes_passphrase() {
        let salt = [8u8; 16];
        let stored = Passphrase::from("secret").thumbprint(&salt, 20).unwrap();
        let again = Passphrase::from("secret").thumbprint(&salt, 20).unwrap();
        let other = Passphrase::from("Secret").thumbprint(&salt, 20).unwrap();
        assert_eq!(stored, again);
        assert_ne!(stored, other);
    }

    #[test]
    fn test_empty() {
        assert!(Passphrase::from("").is_empty());
        assert!(!Passphrase::from("x").is_empty());
    }
}
