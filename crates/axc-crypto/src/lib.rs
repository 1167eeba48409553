//! axc-crypto: key material and cipher primitives for the axc container format
//!
//! Key hierarchy:
//! ```text
//! Passphrase
//!   └── Key-encrypting key (SHA-1 of passphrase, 128-bit)
//!         └── KeyWrap (AxCrypt mode: KEK ⊕ salt, N iterations)
//!               └── Master key (random, 128/192/256-bit, persisted only wrapped)
//!                     ├── Headers subkey  (AES-ECB of purpose block)
//!                     ├── Data subkey     (AES-CBC + PKCS7 payload)
//!                     └── HMAC subkey     (HMAC-SHA1, truncated to 128 bits)
//! ```
//!
//! Randomness is never read from ambient state: every operation that needs
//! it takes a [`RandomSource`].

pub mod cipher;
pub mod mac;
pub mod iterations;
pub mod key;
pub mod keywrap;
pub mod passphrase;
pub mod random;
pub mod subkey;
pub mod thumbprint;

pub use cipher::{AesCrypto, AesDecryptor, AesEncryptor, CipherMode, PaddingMode};
pub use mac::{DataHmac, HmacSha1Stream};
pub use iterations::KeyWrapIterationCalculator;
pub use key::{AesIv, AesKey};
pub use keywrap::{KeyWrap, KeyWrapMode};
pub use passphrase::Passphrase;
pub use random::RandomSource;
pub use subkey::{derive_subkey, SubkeyPurpose, Subkeys};
pub use thumbprint::AesKeyThumbprint;

/// AES block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// Size of an AES-CBC initialization vector
pub const IV_SIZE: usize = 16;

/// Size of the stored (truncated) HMAC value
pub const HMAC_SIZE: usize = 16;
