//! Deterministic randomness for the cuckoo filter
//!
//! Eviction needs a couple of random bits per kick, so [`SeededRandom`]
//! slices each 32-bit draw into `bit_width`-bit pieces and keeps the
//! leftover bits for later calls. [`KeySource`] supplies fresh Feistel keys
//! whenever the filter grows. Both are seeded, so a filter built from the
//! same config and the same inserts ends up in the same state.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::feistel::{mask, Feistel};

/// Small random values of a fixed bit width, cut from cached 32-bit draws
#[derive(Clone, Debug)]
pub struct SeededRandom {
    bit_width: u32,
    current: u32,
    remaining_bits: u32,
    rng: ChaCha8Rng,
}

impl SeededRandom {
    /// `bit_width` is clamped to 1..=32
    pub fn new(bit_width: u32, seed: u64) -> Self {
        Self {
            bit_width: bit_width.clamp(1, u32::BITS),
            current: 0,
            remaining_bits: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Next `bit_width` random bits
    #[inline]
    pub fn next_bits(&mut self) -> u32 {
        if self.remaining_bits < self.bit_width {
            self.current = self.rng.next_u32();
            self.remaining_bits = u32::BITS;
        }
        let result = mask(self.bit_width, u64::from(self.current)) as u32;
        // checked_shr: a 32-bit width consumes the whole draw
        self.current = self.current.checked_shr(self.bit_width).unwrap_or(0);
        self.remaining_bits -= self.bit_width;
        result
    }

    /// Random side index, 0 or 1
    #[inline]
    pub fn next_side(&mut self) -> usize {
        (self.next_bits() & 1) as usize
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }
}

/// Entropy for Feistel keys
#[derive(Clone, Debug)]
pub struct KeySource {
    rng: ChaCha8Rng,
}

impl KeySource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn next_feistel(&mut self) -> Feistel {
        Feistel::new(self.rng.gen())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_fit_bit_width() {
        let mut random = SeededRandom::new(2, 1);
        for _ in 0..1_000 {
            assert!(random.next_bits() < 4);
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeededRandom::new(3, 42);
        let mut b = SeededRandom::new(3, 42);
        let seq_a: Vec<u32> = (0..100).map(|_| a.next_bits()).collect();
        let seq_b: Vec<u32> = (0..100).map(|_| b.next_bits()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn test_different_seed_different_sequence() {
        let mut a = SeededRandom::new(8, 1);
        let mut b = SeededRandom::new(8, 2);
        let seq_a: Vec<u32> = (0..32).map(|_| a.next_bits()).collect();
        let seq_b: Vec<u32> = (0..32).map(|_| b.next_bits()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn test_all_two_bit_values_appear() {
        let mut random = SeededRandom::new(2, 9);
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[random.next_bits() as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_full_width_draws() {
        let mut random = SeededRandom::new(32, 3);
        let first = random.next_bits();
        let second = random.next_bits();
        assert_ne!(first, second);
        assert_eq!(random.bit_width(), 32);
    }

    #[test]
    fn test_width_is_clamped() {
        assert_eq!(SeededRandom::new(0, 0).bit_width(), 1);
        assert_eq!(SeededRandom::new(40, 0).bit_width(), 32);
    }

    #[test]
    fn test_key_source_is_deterministic() {
        let mut a = KeySource::new(5);
        let mut b = KeySource::new(5);
        assert_eq!(a.next_feistel(), b.next_feistel());
        assert_ne!(a.next_feistel(), KeySource::new(6).next_feistel());
    }
}
