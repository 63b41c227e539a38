//! Filter configuration and validation
//!
//! # Example
//!
//! ```
//! use taffy_filters::domain::CuckooConfigBuilder;
//!
//! let config = CuckooConfigBuilder::new()
//!     .max_kicks(200)
//!     .max_load_factor(0.85)
//!     .seed(7)
//!     .build()
//!     .expect("Valid config");
//! assert_eq!(config.max_kicks, 200);
//! ```

use crate::error::FilterError;
use serde::{Deserialize, Serialize};

/// Eviction walk length before an entry is sent to the stash
pub const DEFAULT_MAX_KICKS: usize = 500;

/// Occupancy ratio that triggers growth
pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.90;

/// Stash entries (both sides combined) tolerated before growth
pub const DEFAULT_MAX_STASH: usize = 8;

/// Seed of the kick generator and the Feistel key source
pub const DEFAULT_SEED: u64 = 0x7AFF_C0C0_5EED_0001;

/// Hard ceiling on the number of levels of a taffy block filter
pub const MAX_TAFFY_LEVELS: usize = 48;

/// Taffy cuckoo filter tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CuckooConfig {
    /// Maximum evictions per insert before falling back to the stash
    pub max_kicks: usize,
    /// Grow once occupied slots exceed this fraction of capacity, in (0, 1)
    pub max_load_factor: f64,
    /// Grow once the stashes hold more than this many entries
    pub max_stash: usize,
    /// Seed for eviction choices and Feistel keys
    pub seed: u64,
}

impl Default for CuckooConfig {
    fn default() -> Self {
        Self {
            max_kicks: DEFAULT_MAX_KICKS,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            max_stash: DEFAULT_MAX_STASH,
            seed: DEFAULT_SEED,
        }
    }
}

impl CuckooConfig {
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.max_kicks == 0 {
            return Err(FilterError::InvalidParameters(
                "max_kicks cannot be 0".to_string(),
            ));
        }

        // Strictly below 1.0: a full table cannot absorb the walk
        if !(self.max_load_factor > 0.0 && self.max_load_factor < 1.0) {
            return Err(FilterError::InvalidParameters(format!(
                "max_load_factor must be in (0, 1), got {}",
                self.max_load_factor
            )));
        }

        Ok(())
    }

    /// Builder-style method to set the eviction walk length
    pub fn with_max_kicks(mut self, kicks: usize) -> Self {
        self.max_kicks = kicks;
        self
    }

    /// Builder-style method to set the growth load factor
    pub fn with_max_load_factor(mut self, load: f64) -> Self {
        self.max_load_factor = load;
        self
    }

    pub fn with_max_stash(mut self, stash: usize) -> Self {
        self.max_stash = stash;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Builder for CuckooConfig with validation
#[derive(Default)]
pub struct CuckooConfigBuilder {
    max_kicks: Option<usize>,
    max_load_factor: Option<f64>,
    max_stash: Option<usize>,
    seed: Option<u64>,
}

impl CuckooConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_kicks(mut self, kicks: usize) -> Self {
        self.max_kicks = Some(kicks);
        self
    }

    pub fn max_load_factor(mut self, load: f64) -> Self {
        self.max_load_factor = Some(load);
        self
    }

    pub fn max_stash(mut self, stash: usize) -> Self {
        self.max_stash = Some(stash);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the CuckooConfig, validating all parameters
    pub fn build(self) -> Result<CuckooConfig, FilterError> {
        let defaults = CuckooConfig::default();

        let config = CuckooConfig {
            max_kicks: self.max_kicks.unwrap_or(defaults.max_kicks),
            max_load_factor: self.max_load_factor.unwrap_or(defaults.max_load_factor),
            max_stash: self.max_stash.unwrap_or(defaults.max_stash),
            seed: self.seed.unwrap_or(defaults.seed),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Taffy block filter tuning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaffyBlockConfig {
    /// Maximum number of levels, 1 to [`MAX_TAFFY_LEVELS`]
    pub max_levels: usize,
}

impl Default for TaffyBlockConfig {
    fn default() -> Self {
        Self {
            max_levels: MAX_TAFFY_LEVELS,
        }
    }
}

impl TaffyBlockConfig {
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.max_levels == 0 || self.max_levels > MAX_TAFFY_LEVELS {
            return Err(FilterError::LevelsExhausted {
                levels: self.max_levels,
                max: MAX_TAFFY_LEVELS,
            });
        }
        Ok(())
    }

    /// Builder-style method to cap the level count
    pub fn with_max_levels(mut self, levels: usize) -> Self {
        self.max_levels = levels;
        self
    }
}
