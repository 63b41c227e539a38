//! # Taffy Cuckoo Filter
//!
//! A cuckoo filter that can double in size without access to the original
//! keys ("How to Approximate A Set Without Knowing Its Size In Advance",
//! Pagh, Segev and Wieder).
//!
//! Each entry is addressed by the top `log_side_size + 10` bits of its hash,
//! passed through a keyed Feistel permutation: the high bits of the result
//! pick the bucket and the low 10 bits are the stored fingerprint. Because
//! the permutation is invertible, a stored entry can be turned back into its
//! hash prefix. The next 5 raw hash bits are kept beside it as the tail.
//! Doubling the table moves one tail bit into the address, so an entry
//! survives up to 5 doublings exactly; after that it is stored twice, once
//! for each value of the newly addressed bit.
//!
//! ## Layout
//!
//! | Part | Encoding |
//! |------|----------|
//! | Slot | 10-bit fingerprint, 6-bit tail in one `u16` |
//! | Bucket | 4 slots in one `u64` |
//! | Side | Feistel keys, bucket array, overflow stash |
//!
//! INVARIANTS:
//! - `tail == 0` marks an empty slot; a tail holds `5 - ctz(tail)` bits
//!   above its lowest set bit
//! - Every inserted hash is found: an entry lives in one of its two buckets
//!   or in the stash of the side it was evicted to
//! - `occupied` counts non-empty slots plus stash entries

use std::fmt;

use tracing::{debug, trace, warn};

use super::config::CuckooConfig;
use super::feistel::Feistel;
use super::random::{KeySource, SeededRandom};
use crate::error::FilterError;

/// Hash bits addressed through the permutation beyond the bucket index
pub const HEAD_BITS: u32 = 10;

/// Raw hash bits kept un-addressed in each slot
pub const TAIL_BITS: u32 = 5;

/// log2 of slots per bucket
const LOG_SLOTS: u32 = 2;

/// Slots per bucket
pub const SLOTS: usize = 1 << LOG_SLOTS;

/// Largest side size; keeps head and tail inside a 64-bit hash
pub const MAX_LOG_SIDE_SIZE: u32 = 48;

pub(crate) const FINGERPRINT_MASK: u64 = (1 << HEAD_BITS) - 1;

/// Tail with no bits left, only the end marker
const EMPTY_TAIL: u8 = 1 << TAIL_BITS;

const TAIL_MASK: u8 = (1 << (TAIL_BITS + 1)) - 1;

const INITIAL_STASH_CAPACITY: usize = 4;

/// Bytes per bucket
const BUCKET_BYTES: u64 = (SLOTS * std::mem::size_of::<u16>()) as u64;

/// Bytes accounted per stash entry
const STASH_ENTRY_BYTES: u64 = 16;

/// Decorrelates the kick stream from the key stream
const KICK_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Whether the bit sequence in tail `x` is a prefix of the one in tail `y`
///
/// A tail stores its sequence in the high bits followed by a single 1 marker,
/// so `0b100000` is the empty sequence and `0b110000` is the sequence "1".
#[inline]
pub(crate) fn is_prefix_of(x: u8, y: u8) -> bool {
    debug_assert!(x != 0 && y != 0);
    let c = x.trailing_zeros();
    let h = y.trailing_zeros();
    c >= h && (x ^ y) >> (c + 1) == 0
}

/// Number of sequence bits in a tail
#[inline]
fn tail_len(tail: u8) -> u32 {
    TAIL_BITS - tail.trailing_zeros()
}

/// Re-address an entry known up to `from_log` at side size `to_log`
///
/// `raw` carries the entry's known head in its top `from_log + HEAD_BITS`
/// bits. Tail bits move up into the head; when the tail runs out, every
/// completion of the missing head bits is emitted.
fn for_each_rehead(raw: u64, tail: u8, from_log: u32, to_log: u32, mut emit: impl FnMut(u64, u8)) {
    debug_assert!(to_log >= from_log);
    let diff = to_log - from_log;
    if diff == 0 {
        emit(raw, tail);
        return;
    }

    // Sequence bits without the marker, placed right below the known head
    let raw = raw | (u64::from(tail & (tail - 1)) << (64 - from_log - HEAD_BITS - TAIL_BITS - 1));
    let known = tail_len(tail);
    if known >= diff {
        emit(raw, (tail << diff) & TAIL_MASK);
    } else {
        let missing = diff - known;
        for completion in 0..(1u64 << missing) {
            emit(raw | (completion << (64 - to_log - HEAD_BITS)), EMPTY_TAIL);
        }
    }
}

/// Fingerprint and tail packed into 16 bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Slot(u16);

impl Slot {
    #[inline]
    fn new(fingerprint: u16, tail: u8) -> Self {
        Slot((u16::from(tail) << HEAD_BITS) | (fingerprint & FINGERPRINT_MASK as u16))
    }

    #[inline]
    pub(crate) fn fingerprint(self) -> u16 {
        self.0 & FINGERPRINT_MASK as u16
    }

    #[inline]
    pub(crate) fn tail(self) -> u8 {
        (self.0 >> HEAD_BITS) as u8
    }

    #[inline]
    pub(crate) fn is_empty(self) -> bool {
        self.tail() == 0
    }
}

/// Four slots packed into one word
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Bucket(u64);

impl Bucket {
    #[inline]
    pub(crate) fn slot(self, i: usize) -> Slot {
        Slot((self.0 >> (16 * i)) as u16)
    }

    #[inline]
    fn set_slot(&mut self, i: usize, slot: Slot) {
        let shift = 16 * i;
        self.0 = (self.0 & !(0xFFFF << shift)) | (u64::from(slot.0) << shift);
    }

    pub(crate) fn slots(self) -> impl Iterator<Item = Slot> {
        (0..SLOTS).map(move |i| self.slot(i))
    }
}

/// A slot together with the bucket it belongs in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Path {
    pub(crate) slot: Slot,
    pub(crate) bucket: u64,
}

impl Path {
    #[inline]
    fn with_tail(self, tail: u8) -> Self {
        Path {
            slot: Slot::new(self.slot.fingerprint(), tail),
            bucket: self.bucket,
        }
    }

    /// Permuted head: bucket index above the fingerprint
    #[inline]
    pub(crate) fn head(self) -> u64 {
        (self.bucket << HEAD_BITS) | u64::from(self.slot.fingerprint())
    }

    #[inline]
    fn matches(self, stored: Slot) -> bool {
        !stored.is_empty()
            && stored.fingerprint() == self.slot.fingerprint()
            && is_prefix_of(stored.tail(), self.slot.tail())
    }
}

enum Placement {
    Inserted,
    /// An equal or more general entry was already there
    Present,
    Full,
}

/// One of the two cuckoo tables
#[derive(Clone)]
pub(crate) struct Side {
    pub(crate) feistel: Feistel,
    pub(crate) buckets: Vec<Bucket>,
    pub(crate) stash: Vec<Path>,
    /// Grows by doubling, never shrinks
    stash_capacity: usize,
}

impl Side {
    fn new(log_side_size: u32, feistel: Feistel, stash_capacity: usize) -> Self {
        Self {
            feistel,
            buckets: vec![Bucket::default(); 1 << log_side_size],
            stash: Vec::with_capacity(stash_capacity),
            stash_capacity,
        }
    }

    /// Address a raw hash on this side
    #[inline]
    fn to_path(&self, raw: u64, log_side_size: u32) -> Path {
        let width = log_side_size + HEAD_BITS;
        let permuted = self.feistel.permute_forward(width, raw >> (64 - width));
        let raw_tail = (raw >> (64 - width - TAIL_BITS)) & u64::from(EMPTY_TAIL - 1);
        Path {
            slot: Slot::new((permuted & FINGERPRINT_MASK) as u16, (raw_tail * 2 + 1) as u8),
            bucket: permuted >> HEAD_BITS,
        }
    }

    /// Recover the hash prefix of a stored entry, in the top bits of a word.
    /// Tail bits are not included.
    #[inline]
    fn hash_prefix(&self, path: Path, log_side_size: u32) -> u64 {
        let width = log_side_size + HEAD_BITS;
        self.feistel.permute_backward(width, path.head()) << (64 - width)
    }

    fn contains(&self, path: Path) -> bool {
        self.buckets[path.bucket as usize]
            .slots()
            .any(|slot| path.matches(slot))
            || self
                .stash
                .iter()
                .any(|s| s.bucket == path.bucket && path.matches(s.slot))
    }

    fn place_in_free_slot(&mut self, path: Path) -> bool {
        let bucket = &mut self.buckets[path.bucket as usize];
        match (0..SLOTS).find(|&i| bucket.slot(i).is_empty()) {
            Some(i) => {
                bucket.set_slot(i, path.slot);
                true
            }
            None => false,
        }
    }

    fn place(&mut self, path: Path) -> Placement {
        let bucket = &mut self.buckets[path.bucket as usize];
        let mut free = None;
        for (i, slot) in bucket.slots().enumerate() {
            if path.matches(slot) {
                return Placement::Present;
            }
            if slot.is_empty() && free.is_none() {
                free = Some(i);
            }
        }
        match free {
            Some(i) => {
                bucket.set_slot(i, path.slot);
                Placement::Inserted
            }
            None => Placement::Full,
        }
    }

    /// Put `path` in slot `i` of its bucket and return the previous occupant
    fn kick(&mut self, path: Path, i: usize) -> Path {
        let bucket = &mut self.buckets[path.bucket as usize];
        let victim = bucket.slot(i);
        bucket.set_slot(i, path.slot);
        Path {
            slot: victim,
            bucket: path.bucket,
        }
    }

    fn push_stash(&mut self, path: Path) {
        if self.stash.len() == self.stash_capacity {
            self.stash_capacity *= 2;
            self.stash.reserve_exact(self.stash_capacity - self.stash.len());
        }
        self.stash.push(path);
        trace!(
            stash_len = self.stash.len(),
            stash_capacity = self.stash_capacity,
            "Stashed cuckoo entry"
        );
    }

    /// Stored entries, stash first
    pub(crate) fn entries(&self) -> impl Iterator<Item = Path> + '_ {
        let stashed = self.stash.iter().copied();
        let slotted = self.buckets.iter().enumerate().flat_map(|(bucket, b)| {
            b.slots()
                .filter(|slot| !slot.is_empty())
                .map(move |slot| Path {
                    slot,
                    bucket: bucket as u64,
                })
        });
        stashed.chain(slotted)
    }
}

/// Growable cuckoo filter over pre-hashed 64-bit values
#[derive(Clone)]
pub struct TaffyCuckooFilter {
    pub(crate) sides: [Side; 2],
    pub(crate) log_side_size: u32,
    /// Two-bit draws: the kicked slot, and the low bit for side choices
    kicks: SeededRandom,
    keys: KeySource,
    occupied: u64,
    config: CuckooConfig,
    saturated: bool,
}

impl TaffyCuckooFilter {
    /// Create a filter sized to about `bytes` bytes
    pub fn with_bytes(bytes: u64) -> Result<Self, FilterError> {
        Self::with_config(bytes, CuckooConfig::default())
    }

    pub fn with_config(bytes: u64, config: CuckooConfig) -> Result<Self, FilterError> {
        if bytes == 0 {
            return Err(FilterError::InvalidByteBudget { bytes });
        }
        config.validate()?;

        // Two sides of 4 two-byte slots per bucket
        let side_buckets = bytes / (2 * BUCKET_BYTES);
        let log_side_size = if side_buckets < 2 {
            1
        } else {
            side_buckets.ilog2().min(MAX_LOG_SIDE_SIZE)
        };
        debug!(bytes, log_side_size, ?config, "Creating taffy cuckoo filter");

        let mut keys = KeySource::new(config.seed);
        let sides = [
            Side::new(log_side_size, keys.next_feistel(), INITIAL_STASH_CAPACITY),
            Side::new(log_side_size, keys.next_feistel(), INITIAL_STASH_CAPACITY),
        ];
        Ok(Self {
            sides,
            log_side_size,
            kicks: SeededRandom::new(LOG_SLOTS, config.seed ^ KICK_SEED_SALT),
            keys,
            occupied: 0,
            config,
            saturated: false,
        })
    }

    /// Insert a hash, growing the table afterwards if it is too full
    ///
    /// Returns `false` when the table is over its load limits and already at
    /// [`MAX_LOG_SIDE_SIZE`]. The hash is still recorded.
    pub fn add_hash(&mut self, hash: u64) -> bool {
        let paths = [
            self.sides[0].to_path(hash, self.log_side_size),
            self.sides[1].to_path(hash, self.log_side_size),
        ];
        self.insert_paths(paths);
        self.grow_while_needed()
    }

    /// Returns `true` if the hash might have been inserted
    pub fn find_hash(&self, hash: u64) -> bool {
        self.sides
            .iter()
            .any(|side| side.contains(side.to_path(hash, self.log_side_size)))
    }

    /// Insert an entry whose head is in the top bits of `raw`, with its tail
    /// given explicitly
    fn insert_entry(&mut self, raw: u64, tail: u8) {
        let paths = [
            self.sides[0].to_path(raw, self.log_side_size).with_tail(tail),
            self.sides[1].to_path(raw, self.log_side_size).with_tail(tail),
        ];
        self.insert_paths(paths);
    }

    fn insert_paths(&mut self, paths: [Path; 2]) {
        if self.sides[0].contains(paths[0]) || self.sides[1].contains(paths[1]) {
            return;
        }

        let first = self.kicks.next_side();
        for side in [first, 1 - first] {
            if self.sides[side].place_in_free_slot(paths[side]) {
                self.occupied += 1;
                return;
            }
        }

        // Random walk: evict, move the victim to its other bucket, repeat
        let mut side = first;
        let mut in_hand = paths[side];
        for _ in 0..self.config.max_kicks {
            let slot = self.kicks.next_bits() as usize;
            let victim = self.sides[side].kick(in_hand, slot);
            let raw = self.sides[side].hash_prefix(victim, self.log_side_size);
            side = 1 - side;
            in_hand = self.sides[side]
                .to_path(raw, self.log_side_size)
                .with_tail(victim.slot.tail());
            match self.sides[side].place(in_hand) {
                Placement::Inserted => {
                    self.occupied += 1;
                    return;
                }
                // The victim was subsumed; the new entry took its slot
                Placement::Present => return,
                Placement::Full => {}
            }
        }

        self.sides[side].push_stash(in_hand);
        self.occupied += 1;
    }

    fn needs_growth(&self) -> bool {
        let capacity = self.capacity();
        self.occupied as f64 > self.config.max_load_factor * capacity as f64
            || self.occupied + SLOTS as u64 >= capacity
            || self.stash_len() > self.config.max_stash
    }

    /// Grow until the load limits hold. Returns `false` if the table is at
    /// its maximum size and still over them.
    fn grow_while_needed(&mut self) -> bool {
        while self.needs_growth() {
            if self.log_side_size >= MAX_LOG_SIDE_SIZE {
                if !self.saturated {
                    warn!(
                        log_side_size = self.log_side_size,
                        occupied = self.occupied,
                        stash_len = self.stash_len(),
                        "Taffy cuckoo filter at maximum size, overflowing into stash"
                    );
                    self.saturated = true;
                }
                return false;
            }
            self.grow();
        }
        true
    }

    /// Double both sides and re-address every entry with fresh keys
    fn grow(&mut self) {
        let old_log = self.log_side_size;
        let new_log = old_log + 1;
        let new_sides = [
            Side::new(
                new_log,
                self.keys.next_feistel(),
                self.sides[0].stash_capacity.max(INITIAL_STASH_CAPACITY),
            ),
            Side::new(
                new_log,
                self.keys.next_feistel(),
                self.sides[1].stash_capacity.max(INITIAL_STASH_CAPACITY),
            ),
        ];
        let old_sides = std::mem::replace(&mut self.sides, new_sides);
        let old_occupied = self.occupied;
        self.log_side_size = new_log;
        self.occupied = 0;

        for side in &old_sides {
            for path in side.entries() {
                let raw = side.hash_prefix(path, old_log);
                for_each_rehead(raw, path.slot.tail(), old_log, new_log, |raw, tail| {
                    self.insert_entry(raw, tail)
                });
            }
        }

        debug!(
            log_side_size = new_log,
            old_occupied,
            occupied = self.occupied,
            stash_len = self.stash_len(),
            "Grew taffy cuckoo filter"
        );
    }

    /// Filter holding every hash either input holds
    ///
    /// Starts from a copy of the larger input and re-addresses every entry of
    /// the smaller one at the larger size.
    pub fn union(&self, other: &Self) -> Self {
        let other_is_base = other.log_side_size > self.log_side_size
            || (other.log_side_size == self.log_side_size && other.occupied > self.occupied);
        let (base, rest) = if other_is_base { (other, self) } else { (self, other) };

        let mut result = base.clone();
        for side in &rest.sides {
            for path in side.entries() {
                let raw = side.hash_prefix(path, rest.log_side_size);
                let to_log = result.log_side_size;
                for_each_rehead(raw, path.slot.tail(), rest.log_side_size, to_log, |raw, tail| {
                    result.insert_entry(raw, tail)
                });
                result.grow_while_needed();
            }
        }

        debug!(
            log_side_size = result.log_side_size,
            occupied = result.occupied,
            "Merged taffy cuckoo filters"
        );
        result
    }

    /// Compact, read-only copy of this filter
    pub fn freeze(&self) -> super::FrozenTaffyCuckooFilter {
        super::FrozenTaffyCuckooFilter::from(self)
    }

    /// Bucket arrays plus allocated stash capacity
    pub fn size_in_bytes(&self) -> u64 {
        2 * BUCKET_BYTES * (1u64 << self.log_side_size)
            + STASH_ENTRY_BYTES
                * (self.sides[0].stash_capacity + self.sides[1].stash_capacity) as u64
    }

    pub fn log_side_size(&self) -> u32 {
        self.log_side_size
    }

    /// Stored entries, including stashed ones
    pub fn occupied(&self) -> u64 {
        self.occupied
    }

    /// Slots across both sides
    pub fn capacity(&self) -> u64 {
        2 * SLOTS as u64 * (1u64 << self.log_side_size)
    }

    pub fn stash_len(&self) -> usize {
        self.sides[0].stash.len() + self.sides[1].stash.len()
    }

    pub fn load_factor(&self) -> f64 {
        self.occupied as f64 / self.capacity() as f64
    }

    pub fn config(&self) -> &CuckooConfig {
        &self.config
    }

    /// Whether the filter hit its maximum size with load limits exceeded
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}

impl fmt::Debug for TaffyCuckooFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaffyCuckooFilter")
            .field("log_side_size", &self.log_side_size)
            .field("occupied", &self.occupied)
            .field("capacity", &self.capacity())
            .field("stash_len", &self.stash_len())
            .field("bytes", &self.size_in_bytes())
            .finish()
    }
}
