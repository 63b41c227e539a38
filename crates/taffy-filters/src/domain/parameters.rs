//! Block filter sizing model
//!
//! False positive model for a split block Bloom filter, from equation 3 of
//! Putze, Sanders and Singler, "Cache-, Hash- and Space-Efficient Bloom
//! Filters". Items land in buckets following a Poisson distribution with
//! mean λ = (bucket bits · ndv) / total bits; a query is a false positive when
//! all 8 of its probed bits are already set, or when its 32-bit in-bucket hash
//! collides exactly with a stored one.
//!
//! All functions here are pure, so they can be called before construction.

use std::f64::consts::{LN_2, PI};

/// Words per bucket, one probed bit per word
pub const BUCKET_WORDS: usize = 8;

/// Bits per bucket word
pub const WORD_BITS: u32 = 32;

/// Bytes per bucket
pub const BUCKET_BYTES: u64 = (BUCKET_WORDS as u64) * (WORD_BITS as u64) / 8;

/// Width of the hash slice that selects bits inside a bucket
const HASH_BITS: f64 = 32.0;

/// Bucket index comes from the high 32 bits of the hash
pub const MAX_BLOCK_BUCKETS: u64 = 1 << 32;

/// Largest block filter that can be addressed
pub const MAX_BLOCK_BYTES: u64 = MAX_BLOCK_BUCKETS * BUCKET_BYTES;

/// Past this many items per bit the model saturates
const MAX_ITEMS_PER_BIT: f64 = 3.0;

/// Block filter parameters
#[derive(Clone, Debug, PartialEq)]
pub struct BlockFilterParams {
    /// Size of the bucket array in bytes
    pub size_bytes: u64,
    /// Number of buckets (a power of two)
    pub num_buckets: u64,
    /// Modelled false positive probability at the requested cardinality
    pub expected_fpp: f64,
}

/// Calculate the smallest power-of-two block filter for `ndv` items at `fpp`
pub fn calculate_block_parameters(ndv: u64, fpp: f64) -> BlockFilterParams {
    let size_bytes = block_bytes_needed(ndv, fpp);
    BlockFilterParams {
        size_bytes,
        num_buckets: size_bytes / BUCKET_BYTES,
        expected_fpp: block_fpp(ndv as f64, size_bytes as f64),
    }
}

/// Modelled false positive probability of a block filter of `bytes` bytes
/// holding `ndv` distinct items
pub fn block_fpp(ndv: f64, bytes: f64) -> f64 {
    if ndv <= 0.0 {
        return 0.0;
    }
    if bytes <= 0.0 {
        return 1.0;
    }
    let bits = bytes * 8.0;
    if ndv / bits > MAX_ITEMS_PER_BIT {
        return 1.0;
    }

    let bucket_words = BUCKET_WORDS as f64;
    let word_bits = WORD_BITS as f64;
    let lam = bucket_words * word_bits * ndv / bits;
    let log_lam = lam.ln();
    let log_one_collides = -HASH_BITS * LN_2;
    let log_word_miss = (1.0 - 1.0 / word_bits).ln();

    // The Poisson mass beyond this point is far below f64 resolution
    let max_i = (lam + 12.0 * lam.sqrt() + 64.0).ceil().min(10_000.0) as u64;

    let mut result = 0.0;
    let mut log_p = -lam;
    for i in 0..=max_i {
        let x = i as f64;
        if i > 0 {
            log_p += log_lam - x.ln();
        }
        let log_all_set = bucket_words * (1.0 - (x * log_word_miss).exp()).ln();
        result += (log_p + log_all_set).exp();
        if i > 0 {
            result += (log_p + x.ln() + log_one_collides).exp();
        }
    }
    result.min(1.0)
}

/// Bytes needed for `ndv` items at false positive probability `fpp`, rounded
/// up so that the bucket count is a power of two
pub fn block_bytes_needed(ndv: u64, fpp: f64) -> u64 {
    let ndv = ndv as f64;
    let mut buckets: u64 = 1;
    while buckets < MAX_BLOCK_BUCKETS && block_fpp(ndv, (buckets * BUCKET_BYTES) as f64) > fpp {
        buckets *= 2;
    }
    buckets * BUCKET_BYTES
}

/// Number of distinct items a filter of `bytes` bytes can hold before its
/// modelled false positive probability reaches `fpp`
pub fn block_capacity(bytes: u64, fpp: f64) -> u64 {
    let bytes = bytes as f64;
    let mut hi: u64 = 1;
    while hi < (1 << 62) && block_fpp(hi as f64, bytes) < fpp {
        hi *= 2;
    }
    if hi == 1 {
        return 0;
    }
    let mut lo = hi / 2;
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if block_fpp(mid as f64, bytes) < fpp {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// False positive budget of level `level` in a leveled filter with overall
/// target `fpp`
///
/// Level i gets fpp · 6/π² / (i+1)², so the budgets of all levels sum to at
/// most `fpp`.
pub fn level_fpp(fpp: f64, level: usize) -> f64 {
    let n = (level + 1) as f64;
    fpp * 6.0 / (PI * PI) / (n * n)
}
