//! # Taffy Filters
//!
//! Approximate membership filters over pre-hashed 64-bit values: no false
//! negatives, a bounded false positive rate, and (for the taffy variants)
//! growth without knowing the final cardinality up front.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): Pure filter logic, no I/O
//!   - `BlockFilter`: Split block Bloom filter of fixed size
//!   - `TaffyBlockFilter`: Leveled block filters with a shrinking error budget
//!   - `TaffyCuckooFilter`: Cuckoo filter that doubles in place
//!   - `FrozenTaffyCuckooFilter`: Compact read-only snapshot of the above
//!   - `CuckooConfig` / `TaffyBlockConfig`: Tuning with validation
//!
//! - **Ports Layer** (`ports/`): Trait definitions
//!   - `MembershipFilter`: Lookups, implemented by all four filters
//!   - `InsertableFilter`: Inserts, implemented by the three mutable ones
//!
//! ## Invariants
//!
//! - **No false negatives**: once `add_hash(h)` returns, `find_hash(h)` is
//!   `true` for the life of the filter, across growth, cloning and freezing
//! - **Monotone size**: `size_in_bytes()` never decreases
//!
//! ## Usage Example
//!
//! ```
//! use taffy_filters::{InsertableFilter, MembershipFilter, TaffyCuckooFilter};
//!
//! let mut filter = TaffyCuckooFilter::with_bytes(1024)?;
//! for i in 0..10_000u64 {
//!     filter.add_hash(i.wrapping_mul(0x9E37_79B9_7F4A_7C15));
//! }
//! assert!(filter.find_hash(42u64.wrapping_mul(0x9E37_79B9_7F4A_7C15)));
//!
//! let frozen = filter.freeze();
//! assert!(frozen.size_in_bytes() < filter.size_in_bytes());
//! # Ok::<(), taffy_filters::FilterError>(())
//! ```

pub mod domain;
pub mod error;
pub mod ports;

// Re-exports for convenience
pub use domain::{
    BlockFilter, CuckooConfig, CuckooConfigBuilder, FrozenTaffyCuckooFilter, TaffyBlockConfig,
    TaffyBlockFilter, TaffyCuckooFilter,
};
pub use error::FilterError;
pub use ports::{InsertableFilter, MembershipFilter};
