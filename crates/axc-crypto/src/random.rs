//! Explicit randomness source

use rand::{CryptoRng, RngCore};

/// Any cryptographically secure RNG. Passed by `&mut dyn RandomSource` into
/// key, IV and salt generation so tests can substitute a seeded generator.
pub trait RandomSource: RngCore + CryptoRng {}

impl<T: RngCore + CryptoRng> RandomSource for T {}

/// Fill a fresh buffer of `len` random bytes.
pub fn random_bytes(rng: &mut dyn RandomSource, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_random_bytes_length_and_variety() {
        let a = random_bytes(&mut OsRng, 32);
        let b = random_bytes(&mut OsRng, 32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b, "random buffers must differ");
    }
}
