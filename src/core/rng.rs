//! Arena Randomness
//!
//! Every security-relevant random value (auth secrets, MAC keys, nonces,
//! blinding factors, byes and pairings) comes from an [`ArenaRng`].
//!
//! Production code seeds it from the operating system; tests inject a fixed
//! seed to get reproducible tournaments. Both paths use `StdRng`, a
//! cryptographically secure generator.

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, Rng, RngCore, SeedableRng};

/// Cryptographically secure, injectable random source.
///
/// # Example
///
/// ```
/// use rps_arena::core::rng::ArenaRng;
///
/// let mut a = ArenaRng::seeded(7);
/// let mut b = ArenaRng::seeded(7);
/// assert_eq!(a.random_hex(8), b.random_hex(8));
/// ```
#[derive(Clone, Debug)]
pub struct ArenaRng {
    inner: StdRng,
}

impl ArenaRng {
    /// Seed from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self { inner: StdRng::from_entropy() }
    }

    /// Deterministic generator for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self { inner: StdRng::seed_from_u64(seed) }
    }

    /// Generator from a full 256-bit seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { inner: StdRng::from_seed(seed) }
    }

    /// `len` random bytes.
    pub fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.inner.fill_bytes(&mut bytes);
        bytes
    }

    /// `len` random bytes rendered as `2 * len` hex characters.
    pub fn random_hex(&mut self, len: usize) -> String {
        hex::encode(self.random_bytes(len))
    }

    /// Uniform integer in `[0, bound)`.
    ///
    /// Returns zero for a zero bound.
    pub fn below(&mut self, bound: &BigUint) -> BigUint {
        if *bound == BigUint::from(0u32) {
            return BigUint::from(0u32);
        }
        self.inner.gen_biguint_below(bound)
    }

    /// Uniform index in `[0, len)`, `None` when `len == 0`.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.inner.gen_range(0..len))
        }
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        slice.shuffle(&mut self.inner);
    }
}

impl Default for ArenaRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl RngCore for ArenaRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

impl CryptoRng for ArenaRng {}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_determinism() {
        let mut rng1 = ArenaRng::seeded(12345);
        let mut rng2 = ArenaRng::seeded(12345);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_different_seeds() {
        let mut rng1 = ArenaRng::seeded(1);
        let mut rng2 = ArenaRng::seeded(2);
        assert_ne!(rng1.random_hex(16), rng2.random_hex(16));
    }

    #[test]
    fn test_random_hex_length() {
        let mut rng = ArenaRng::seeded(3);
        let nonce = rng.random_hex(8);
        assert_eq!(nonce.len(), 16);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_below_bound() {
        let mut rng = ArenaRng::seeded(4);
        let bound = BigUint::from(1000u32);
        for _ in 0..500 {
            assert!(rng.below(&bound) < bound);
        }
        assert_eq!(rng.below(&BigUint::from(0u32)), BigUint::from(0u32));
    }

    #[test]
    fn test_index() {
        let mut rng = ArenaRng::seeded(5);
        assert_eq!(rng.index(0), None);
        assert_eq!(rng.index(1), Some(0));
        for _ in 0..100 {
            assert!(rng.index(7).unwrap() < 7);
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = ArenaRng::seeded(6);
        let mut values: Vec<u32> = (0..20).collect();
        rng.shuffle(&mut values);

        let mut sorted = values.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut rng1 = ArenaRng::seeded(1111);
        let mut rng2 = ArenaRng::seeded(1111);

        let mut arr1 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut arr2 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        rng1.shuffle(&mut arr1);
        rng2.shuffle(&mut arr2);

        assert_eq!(arr1, arr2);
    }
}
