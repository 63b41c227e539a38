//! Frozen taffy cuckoo filter
//!
//! Read-only snapshot of a [`TaffyCuckooFilter`]. Tails are dropped and each
//! bucket's four 10-bit fingerprints are packed into 5 bytes, so the frozen
//! form takes 5/8 of the live bucket space. Lookups compare fingerprints
//! only; anything the live filter finds, the frozen one finds too.
//!
//! The saving costs accuracy on hashes that were never inserted. Without
//! tails a stored fingerprint matches every hash that shares its 10 bits,
//! and an empty slot packs as fingerprint 0, so any hash whose fingerprint is
//! 0 matches a bucket with a free slot. The false positive rate is bounded by
//! roughly `2 · 4 / 1024` (under 1%) plus the stash, against a few hundredths
//! of a percent for the live filter at the same load.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::feistel::Feistel;
use super::taffy_cuckoo::{TaffyCuckooFilter, FINGERPRINT_MASK, HEAD_BITS, MAX_LOG_SIDE_SIZE, SLOTS};
use crate::error::FilterError;

/// Bytes per packed bucket
const FROZEN_BUCKET_BYTES: usize = SLOTS * HEAD_BITS as usize / 8;

/// Immutable, compact membership filter derived from a live cuckoo filter
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenTaffyCuckooFilter {
    feistels: [Feistel; 2],
    log_side_size: u32,
    /// `FROZEN_BUCKET_BYTES` per bucket, fingerprints little-endian
    buckets: [Vec<u8>; 2],
    /// Permuted heads, `(bucket << 10) | fingerprint`
    stashes: [Box<[u64]>; 2],
}

fn pack_side(buckets: impl Iterator<Item = [u16; SLOTS]>, len: usize) -> Vec<u8> {
    let mut packed = Vec::with_capacity(len * FROZEN_BUCKET_BYTES);
    for fingerprints in buckets {
        let word = fingerprints
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &fp)| acc | (u64::from(fp) << (HEAD_BITS as usize * i)));
        packed.extend_from_slice(&word.to_le_bytes()[..FROZEN_BUCKET_BYTES]);
    }
    packed
}

impl From<&TaffyCuckooFilter> for FrozenTaffyCuckooFilter {
    fn from(live: &TaffyCuckooFilter) -> Self {
        let log_side_size = live.log_side_size;
        let side_len = 1usize << log_side_size;

        let buckets = live.sides.each_ref().map(|side| {
            let fingerprints = side.buckets.iter().map(|bucket| {
                let mut fps = [0u16; SLOTS];
                for (fp, slot) in fps.iter_mut().zip(bucket.slots()) {
                    if !slot.is_empty() {
                        *fp = slot.fingerprint();
                    }
                }
                fps
            });
            pack_side(fingerprints, side_len)
        });
        let stashes = live
            .sides
            .each_ref()
            .map(|side| side.stash.iter().map(|path| path.head()).collect::<Box<[u64]>>());

        let frozen = Self {
            feistels: [live.sides[0].feistel, live.sides[1].feistel],
            log_side_size,
            buckets,
            stashes,
        };
        debug!(
            log_side_size,
            live_bytes = live.size_in_bytes(),
            frozen_bytes = frozen.size_in_bytes(),
            "Froze taffy cuckoo filter"
        );
        frozen
    }
}

impl FrozenTaffyCuckooFilter {
    #[inline]
    fn bucket_word(&self, side: usize, bucket: usize) -> u64 {
        let start = bucket * FROZEN_BUCKET_BYTES;
        let mut bytes = [0u8; 8];
        bytes[..FROZEN_BUCKET_BYTES]
            .copy_from_slice(&self.buckets[side][start..start + FROZEN_BUCKET_BYTES]);
        u64::from_le_bytes(bytes)
    }

    /// Returns `true` if the hash might have been inserted into the source
    /// filter before freezing
    pub fn find_hash(&self, hash: u64) -> bool {
        let width = self.log_side_size + HEAD_BITS;
        (0..2).any(|side| {
            let head = self.feistels[side].permute_forward(width, hash >> (64 - width));
            if self.stashes[side].contains(&head) {
                return true;
            }
            let fingerprint = head & FINGERPRINT_MASK;
            let word = self.bucket_word(side, (head >> HEAD_BITS) as usize);
            (0..SLOTS).any(|i| (word >> (HEAD_BITS as usize * i)) & FINGERPRINT_MASK == fingerprint)
        })
    }

    /// Packed buckets plus stash entries
    pub fn size_in_bytes(&self) -> u64 {
        let buckets: usize = self.buckets.iter().map(Vec::len).sum();
        let stash: usize = self.stashes.iter().map(|s| s.len()).sum();
        (buckets + stash * std::mem::size_of::<u64>()) as u64
    }

    pub fn log_side_size(&self) -> u32 {
        self.log_side_size
    }

    pub fn stash_len(&self) -> usize {
        self.stashes.iter().map(|s| s.len()).sum()
    }

    /// Serialize the filter to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, FilterError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a filter from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        let filter: Self = bincode::deserialize(bytes)?;
        if filter.log_side_size == 0 || filter.log_side_size > MAX_LOG_SIDE_SIZE {
            return Err(FilterError::SerializationError(format!(
                "log_side_size {} out of range",
                filter.log_side_size
            )));
        }
        let expected = (1usize << filter.log_side_size) * FROZEN_BUCKET_BYTES;
        if filter.buckets.iter().any(|b| b.len() != expected) {
            return Err(FilterError::SerializationError(
                "bucket array length does not match log_side_size".to_string(),
            ));
        }
        Ok(filter)
    }
}

impl fmt::Debug for FrozenTaffyCuckooFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrozenTaffyCuckooFilter")
            .field("log_side_size", &self.log_side_size)
            .field("stash_len", &self.stash_len())
            .field("bytes", &self.size_in_bytes())
            .finish()
    }
}
