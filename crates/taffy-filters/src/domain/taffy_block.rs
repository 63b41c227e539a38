//! Taffy block filter
//!
//! A stack of block filters that grows without knowing the final
//! cardinality. Only the newest level takes inserts; when its capacity is
//! used up a level sized for twice as many items is appended. Level `i` is
//! given the false positive budget `fpp · 6/π² / (i+1)²`, so the union of all
//! levels stays below the caller's `fpp` however many levels are created.
//!
//! INVARIANTS:
//! - Every level except the newest is read-only
//! - A lookup ORs every level, so nothing inserted is ever lost
//! - At most `max_levels` levels; past that the newest level keeps absorbing
//!   inserts and the filter reports saturation

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::block_filter::BlockFilter;
use super::config::TaffyBlockConfig;
use super::parameters::{
    block_bytes_needed, block_capacity, level_fpp, BUCKET_BYTES, MAX_BLOCK_BYTES,
};
use crate::error::{check_fpp, FilterError};

#[derive(Clone, PartialEq, Serialize, Deserialize)]
struct Level {
    filter: BlockFilter,
    bytes: u64,
}

impl Level {
    /// Level sized for `ndv` items at its share of the error budget, along
    /// with the number of inserts it can take
    fn sized_for(ndv: u64, fpp: f64) -> (Self, u64) {
        let bytes = block_bytes_needed(ndv, fpp).min(MAX_BLOCK_BYTES);
        let filter = BlockFilter::with_buckets(bytes / BUCKET_BYTES);
        let bytes = filter.size_in_bytes();
        let ttl = block_capacity(bytes, fpp).max(ndv);
        (Self { filter, bytes }, ttl)
    }
}

/// Growable block filter built from levels of doubling capacity
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TaffyBlockFilter {
    levels: Vec<Level>,
    /// Cardinality the newest level was sized for
    last_ndv: u64,
    /// Inserts left before the newest level is full
    ttl: u64,
    fpp: f64,
    max_levels: usize,
    saturated: bool,
}

impl TaffyBlockFilter {
    /// Create a filter whose first level is sized for `ndv` items
    pub fn new(ndv: u64, fpp: f64) -> Result<Self, FilterError> {
        Self::with_config(ndv, fpp, TaffyBlockConfig::default())
    }

    pub fn with_config(ndv: u64, fpp: f64, config: TaffyBlockConfig) -> Result<Self, FilterError> {
        if ndv == 0 {
            return Err(FilterError::InvalidNdv { ndv });
        }
        check_fpp(fpp)?;
        config.validate()?;

        let (level, ttl) = Level::sized_for(ndv, level_fpp(fpp, 0));
        debug!(
            ndv,
            fpp,
            bytes = level.bytes,
            ttl,
            max_levels = config.max_levels,
            "Creating taffy block filter"
        );

        Ok(Self {
            levels: vec![level],
            last_ndv: ndv,
            ttl,
            fpp,
            max_levels: config.max_levels,
            saturated: false,
        })
    }

    /// Insert a hash into the newest level, appending a level first if the
    /// newest one is full
    ///
    /// Returns `false` once every level is full. The hash is recorded
    /// regardless, only the false positive bound no longer holds.
    pub fn add_hash(&mut self, hash: u64) -> bool {
        if self.ttl == 0 {
            self.promote();
        }
        let cursor = self.cursor();
        self.levels[cursor].filter.add_hash(hash);
        self.ttl = self.ttl.saturating_sub(1);
        !self.saturated
    }

    fn promote(&mut self) {
        if self.levels.len() >= self.max_levels {
            if !self.saturated {
                error!(
                    levels = self.levels.len(),
                    fpp = self.fpp,
                    "Taffy block filter saturated, false positive bound no longer holds"
                );
                self.saturated = true;
            }
            return;
        }

        self.last_ndv = self.last_ndv.saturating_mul(2);
        let index = self.levels.len();
        let (level, ttl) = Level::sized_for(self.last_ndv, level_fpp(self.fpp, index));
        debug!(
            level = index,
            ndv = self.last_ndv,
            bytes = level.bytes,
            ttl,
            "Promoting taffy block filter"
        );
        self.levels.push(level);
        self.ttl = ttl;
    }

    pub fn find_hash(&self, hash: u64) -> bool {
        self.levels.iter().any(|level| level.filter.find_hash(hash))
    }

    /// Total bytes across all levels
    pub fn size_in_bytes(&self) -> u64 {
        self.levels.iter().map(|level| level.bytes).sum()
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Index of the level currently taking inserts
    pub fn cursor(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    pub fn last_ndv(&self) -> u64 {
        self.last_ndv
    }

    pub fn fpp(&self) -> f64 {
        self.fpp
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    /// Serialize the filter to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, FilterError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize a filter from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FilterError> {
        let filter: Self = bincode::deserialize(bytes)?;
        check_fpp(filter.fpp)?;
        TaffyBlockConfig {
            max_levels: filter.max_levels,
        }
        .validate()?;
        if filter.levels.is_empty() || filter.levels.len() > filter.max_levels {
            return Err(FilterError::SerializationError(format!(
                "level count {} outside 1..={}",
                filter.levels.len(),
                filter.max_levels
            )));
        }
        for (i, level) in filter.levels.iter().enumerate() {
            if !level.filter.num_buckets().is_power_of_two()
                || level.bytes != level.filter.size_in_bytes()
            {
                return Err(FilterError::SerializationError(format!(
                    "level {} has {} buckets for {} bytes",
                    i,
                    level.filter.num_buckets(),
                    level.bytes
                )));
            }
        }
        Ok(filter)
    }
}

impl fmt::Debug for TaffyBlockFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaffyBlockFilter")
            .field("levels", &self.levels.len())
            .field("last_ndv", &self.last_ndv)
            .field("ttl", &self.ttl)
            .field("fpp", &self.fpp)
            .field("bytes", &self.size_in_bytes())
            .field("saturated", &self.saturated)
            .finish()
    }
}
