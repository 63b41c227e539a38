//! Domain Layer - Pure filter logic
//!
//! This layer contains:
//! - Block filter sizing model
//! - Block filter and its leveled, growable form (taffy block)
//! - Feistel permutation and seeded randomness
//! - Taffy cuckoo filter and its frozen form
//! - Configuration
//!
//! RULES:
//! - No I/O operations
//! - No async code
//! - Callers hash their own keys; every operation takes a `u64` hash

pub mod block_filter;
pub mod config;
pub mod feistel;
pub mod frozen_cuckoo;
pub mod parameters;
pub mod random;
pub mod taffy_block;
pub mod taffy_cuckoo;

pub use block_filter::BlockFilter;
pub use config::{
    CuckooConfig, CuckooConfigBuilder, TaffyBlockConfig, DEFAULT_MAX_KICKS,
    DEFAULT_MAX_LOAD_FACTOR, DEFAULT_MAX_STASH, MAX_TAFFY_LEVELS,
};
pub use feistel::Feistel;
pub use frozen_cuckoo::FrozenTaffyCuckooFilter;
pub use parameters::{
    block_bytes_needed, block_capacity, block_fpp, calculate_block_parameters, level_fpp,
    BlockFilterParams, BUCKET_BYTES, MAX_BLOCK_BYTES,
};
pub use random::{KeySource, SeededRandom};
pub use taffy_block::TaffyBlockFilter;
pub use taffy_cuckoo::{TaffyCuckooFilter, MAX_LOG_SIDE_SIZE};
