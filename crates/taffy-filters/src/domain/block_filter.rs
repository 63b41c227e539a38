//! Split block Bloom filter
//!
//! Each bucket is 256 bits split into 8 words of 32 bits. An insert picks one
//! bucket from the high half of the hash and sets exactly one bit in each of
//! the bucket's words, so a single 64-bit hash behaves like 8 independent
//! Bloom hash functions while touching one cache line.
//!
//! INVARIANTS:
//! - Bucket count is a power of two; the index is a mask, never a modulo
//! - No false negatives: a hash re-addresses to the same 8 bits every time

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::parameters::{
    block_bytes_needed, calculate_block_parameters, BUCKET_BYTES, BUCKET_WORDS,
    MAX_BLOCK_BYTES, WORD_BITS,
};
use crate::error::{check_fpp, FilterError};

/// Odd multipliers that derive the 8 per-word bit offsets from one hash
const HASH_SEEDS: [u32; BUCKET_WORDS] = [
    0x47b6_137b, 0x4497_4d91, 0x8824_ad5b, 0xa2b7_289d, 0x7054_95c7, 0x2df1_424b,
    0x9efc_4947, 0x5c6b_fb31,
];

/// log2(WORD_BITS)
const WORD_INDEX_BITS: u32 = WORD_BITS.trailing_zeros();

/// One cache-line-sized bucket
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C, align(32))]
struct Bucket([u32; BUCKET_WORDS]);

impl Bucket {
    /// Bit mask with one bit per word, chosen by the low 32 bits of `hash`
    #[inline]
    fn mask(hash: u64) -> Self {
        let key = hash as u32;
        let mut words = [0u32; BUCKET_WORDS];
        for (word, seed) in words.iter_mut().zip(HASH_SEEDS) {
            *word = 1 << (key.wrapping_mul(seed) >> (WORD_BITS - WORD_INDEX_BITS));
        }
        Bucket(words)
    }

    #[inline]
    fn set(&mut self, mask: &Bucket) {
        for (word, bit) in self.0.iter_mut().zip(mask.0) {
            *word |= bit;
        }
    }

    #[inline]
    fn contains(&self, mask: &Bucket) -> bool {
        self.0.iter().zip(mask.0).all(|(word, bit)| word & bit != 0)
    }
}

/// Fixed-capacity blocked Bloom filter keyed by pre-hashed 64-bit values
///
/// Used on its own when the cardinality is known up front, and as the level
/// type of [`TaffyBlockFilter`](super::TaffyBlockFilter).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFilter {
    buckets: Vec<Bucket>,
}

impl BlockFilter {
    /// Bytes needed to hold `ndv` distinct hashes at false positive
    /// probability `fpp`
    pub fn bytes_needed(ndv: u64, fpp: f64) -> u64 {
        block_bytes_needed(ndv, fpp)
    }

    /// Create an empty filter of at least `bytes` bytes
    ///
    /// The bucket count is rounded up to a power of two.
    ///
    /// # Errors
    /// `InvalidByteBudget` for zero bytes, `FilterTooLarge` past the
    /// addressable maximum.
    pub fn with_bytes(bytes: u64) -> Result<Self, FilterError> {
        if bytes == 0 {
            return Err(FilterError::InvalidByteBudget { bytes });
        }
        if bytes > MAX_BLOCK_BYTES {
            return Err(FilterError::FilterTooLarge {
                size: bytes,
                max: MAX_BLOCK_BYTES,
            });
        }
        Ok(Self::with_buckets(bytes.div_ceil(BUCKET_BYTES)))
    }

    /// Create an empty filter sized for `ndv` distinct hashes at `fpp`
    pub fn with_ndv_fpp(ndv: u64, fpp: f64) -> Result<Self, FilterError> {
        if ndv == 0 {
            return Err(FilterError::InvalidNdv { ndv });
        }
        check_fpp(fpp)?;
        let params = calculate_block_parameters(ndv, fpp);
        debug!(
            ndv,
            fpp,
            size_bytes = params.size_bytes,
            expected_fpp = params.expected_fpp,
            "Creating block filter"
        );
        Self::with_bytes(params.size_bytes)
    }

    /// Infallible constructor for callers that already clamped the size
    pub(crate) fn with_buckets(num_buckets: u64) -> Self {
        let num_buckets = num_buckets.clamp(1, MAX_BLOCK_BYTES / BUCKET_BYTES);
        Self {
            buckets: vec![Bucket::default(); num_buckets.next_power_of_two() as usize],
        }
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        ((hash >> 32) as usize) & (self.buckets.len() - 1)
    }

    /// Insert a hash. Always returns `true`; a fixed-size filter never
    /// refuses an insert, its false positive rate just rises past capacity.
    pub fn add_hash(&mut self, hash: u64) -> bool {
        let idx = self.index(hash);
        self.buckets[idx].set(&Bucket::mask(hash));
        true
    }

    /// Returns `true` if the hash might have been inserted, `false` if it
    /// definitely was not
    pub fn find_hash(&self, hash: u64) -> bool {
        self.buckets[self.index(hash)].contains(&Bucket::mask(hash))
    }

    /// Heap space used by the bucket array
    pub fn size_in_bytes(&self) -> u64 {
        self.buckets.len() as u64 * BUCKET_BYTES
    }

    pub fn num_buckets(&self) -> u64 {
        self.buckets.len() as u64
    }

    /// Number of bits set across all buckets
    pub fn bits_set(&self) -> u64 {
        self.buckets
            .iter()
            .flat_map(|b| b.0)
            .map(|w| u64::from(w.count_ones()))
            .sum()
    }

    /// Serialize the filter to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, FilterError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a filter from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        let filter: Self = bincode::deserialize(bytes)?;
        if !filter.buckets.len().is_power_of_two() {
            return Err(FilterError::SerializationError(format!(
                "bucket count {} is not a power of two",
                filter.buckets.len()
            )));
        }
        Ok(filter)
    }
}

impl fmt::Debug for BlockFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockFilter")
            .field("num_buckets", &self.buckets.len())
            .field("bytes", &self.size_in_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_hashes(seed: u64, n: usize) -> Vec<u64> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen()).collect()
    }

    #[test]
    fn test_with_bytes_rounds_up_to_power_of_two() {
        let filter = BlockFilter::with_bytes(100).unwrap();
        assert_eq!(filter.num_buckets(), 4);
        assert_eq!(filter.size_in_bytes(), 128);

        let filter = BlockFilter::with_bytes(1).unwrap();
        assert_eq!(filter.num_buckets(), 1);
    }

    #[test]
    fn test_with_bytes_rejects_zero() {
        assert!(matches!(
            BlockFilter::with_bytes(0),
            Err(FilterError::InvalidByteBudget { bytes: 0 })
        ));
    }

    #[test]
    fn test_with_bytes_rejects_oversized() {
        assert!(matches!(
            BlockFilter::with_bytes(MAX_BLOCK_BYTES + 1),
            Err(FilterError::FilterTooLarge { .. })
        ));
    }

    #[test]
    fn test_with_ndv_fpp_validates() {
        assert!(matches!(
            BlockFilter::with_ndv_fpp(0, 0.01),
            Err(FilterError::InvalidNdv { ndv: 0 })
        ));
        assert!(matches!(
            BlockFilter::with_ndv_fpp(100, 1.0),
            Err(FilterError::InvalidFpp { .. })
        ));
    }

    #[test]
    fn test_with_ndv_fpp_matches_bytes_needed() {
        let filter = BlockFilter::with_ndv_fpp(1_000, 0.01).unwrap();
        assert_eq!(filter.size_in_bytes(), BlockFilter::bytes_needed(1_000, 0.01));
    }

    #[test]
    fn test_add_sets_one_bit_per_word() {
        let mut filter = BlockFilter::with_bytes(32).unwrap();
        assert_eq!(filter.bits_set(), 0);
        filter.add_hash(0xDEAD_BEEF_CAFE_F00D);
        assert_eq!(filter.bits_set(), 8);
        for word in filter.buckets[0].0 {
            assert_eq!(word.count_ones(), 1, "each word gets exactly one bit");
        }
    }

    #[test]
    fn test_empty_filter_finds_nothing() {
        let filter = BlockFilter::with_ndv_fpp(100, 0.01).unwrap();
        for hash in random_hashes(1, 1_000) {
            assert!(!filter.find_hash(hash));
        }
    }

    #[test]
    fn test_no_false_negatives_bulk() {
        let mut filter = BlockFilter::with_ndv_fpp(10_000, 0.01).unwrap();
        let hashes = random_hashes(2, 10_000);
        for &h in &hashes {
            assert!(filter.add_hash(h));
        }
        for &h in &hashes {
            assert!(filter.find_hash(h), "False negative for {:#x}", h);
        }
    }

    #[test]
    fn test_false_positive_rate_bounded() {
        let ndv = 10_000;
        let fpp = 0.01;
        let mut filter = BlockFilter::with_ndv_fpp(ndv, fpp).unwrap();
        for h in random_hashes(3, ndv as usize) {
            filter.add_hash(h);
        }

        let probes = random_hashes(4, 10 * ndv as usize);
        let positives = probes.iter().filter(|&&h| filter.find_hash(h)).count();
        let actual = positives as f64 / probes.len() as f64;
        assert!(
            actual <= fpp * 1.5,
            "Actual FPP {} exceeds 1.5 * target {}",
            actual,
            fpp
        );
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = BlockFilter::with_ndv_fpp(1_000, 0.001).unwrap();
        original.add_hash(1);
        let mut copy = original.clone();
        assert_eq!(original, copy);

        original.add_hash(0x1234_5678_9ABC_DEF0);
        copy.add_hash(0x0FED_CBA9_8765_4321);
        assert!(!copy.find_hash(0x1234_5678_9ABC_DEF0));
        assert!(!original.find_hash(0x0FED_CBA9_8765_4321));
        assert!(original.find_hash(1) && copy.find_hash(1));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut filter = BlockFilter::with_ndv_fpp(500, 0.01).unwrap();
        let hashes = random_hashes(5, 500);
        for &h in &hashes {
            filter.add_hash(h);
        }

        let bytes = filter.to_bytes().unwrap();
        let restored = BlockFilter::from_bytes(&bytes).expect("Deserialization should succeed");
        assert_eq!(restored, filter);
        assert!(hashes.iter().all(|&h| restored.find_hash(h)));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(BlockFilter::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_debug_omits_contents() {
        let filter = BlockFilter::with_bytes(64).unwrap();
        let debug = format!("{:?}", filter);
        assert!(debug.contains("BlockFilter"));
        assert!(debug.contains("num_buckets: 2"));
    }
}
