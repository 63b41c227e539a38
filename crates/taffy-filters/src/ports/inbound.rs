//! Inbound Ports (Driving Ports)
//!
//! These traits are the common API of the filter family, so callers can be
//! written once against any structure.

use crate::domain::{BlockFilter, FrozenTaffyCuckooFilter, TaffyBlockFilter, TaffyCuckooFilter};

/// Approximate membership queries over pre-hashed 64-bit values
///
/// Implementations never return a false negative for a hash they were
/// given; false positives happen at a bounded rate.
pub trait MembershipFilter: Send + Sync {
    /// Returns `true` if the hash might be in the set
    fn find_hash(&self, hash: u64) -> bool;

    /// Heap space used by the filter
    fn size_in_bytes(&self) -> u64;
}

/// A filter that accepts inserts
pub trait InsertableFilter: MembershipFilter {
    /// Insert a hash
    ///
    /// Returns `false` only when the filter is past its sizing limits and its
    /// false positive bound no longer holds. The hash is recorded either way.
    fn add_hash(&mut self, hash: u64) -> bool;

    /// Insert every hash, returning `false` if any insert did
    fn extend_hashes<I: IntoIterator<Item = u64>>(&mut self, hashes: I) -> bool
    where
        Self: Sized,
    {
        hashes
            .into_iter()
            .fold(true, |ok, hash| self.add_hash(hash) && ok)
    }
}

macro_rules! impl_membership {
    ($($filter:ty),+ $(,)?) => {
        $(
            impl MembershipFilter for $filter {
                fn find_hash(&self, hash: u64) -> bool {
                    <$filter>::find_hash(self, hash)
                }

                fn size_in_bytes(&self) -> u64 {
                    <$filter>::size_in_bytes(self)
                }
            }
        )+
    };
}

impl_membership!(
    BlockFilter,
    TaffyBlockFilter,
    TaffyCuckooFilter,
    FrozenTaffyCuckooFilter,
);

impl InsertableFilter for BlockFilter {
    fn add_hash(&mut self, hash: u64) -> bool {
        BlockFilter::add_hash(self, hash)
    }
}

impl InsertableFilter for TaffyBlockFilter {
    fn add_hash(&mut self, hash: u64) -> bool {
        TaffyBlockFilter::add_hash(self, hash)
    }
}

impl InsertableFilter for TaffyCuckooFilter {
    fn add_hash(&mut self, hash: u64) -> bool {
        TaffyCuckooFilter::add_hash(self, hash)
    }
}
