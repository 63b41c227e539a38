//! Error types for the filter family

use thiserror::Error;

/// Errors that can occur while constructing or decoding a filter
///
/// Insertion and lookup never fail: eviction exhaustion is absorbed by the
/// stash and stash pressure by growth.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid distinct value count: {ndv} (must be > 0)")]
    InvalidNdv { ndv: u64 },

    #[error("Invalid false positive probability: {fpp} (must be between 0 and 1)")]
    InvalidFpp { fpp: f64 },

    #[error("Invalid byte budget: {bytes} (must be > 0)")]
    InvalidByteBudget { bytes: u64 },

    #[error("Filter size exceeds maximum: {size} > {max}")]
    FilterTooLarge { size: u64, max: u64 },

    #[error("Level capacity exhausted: {levels} levels requested (max {max})")]
    LevelsExhausted { levels: usize, max: usize },

    #[error("Invalid filter parameters: {0}")]
    InvalidParameters(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<bincode::Error> for FilterError {
    fn from(e: bincode::Error) -> Self {
        FilterError::SerializationError(e.to_string())
    }
}

/// Reject a false positive probability outside the open interval (0, 1)
pub(crate) fn check_fpp(fpp: f64) -> Result<(), FilterError> {
    if fpp.is_finite() && fpp > 0.0 && fpp < 1.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidFpp { fpp })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_fpp_accepts_open_interval() {
        assert!(check_fpp(0.01).is_ok());
        assert!(check_fpp(0.999).is_ok());
    }

    #[test]
    fn test_check_fpp_rejects_bounds_and_nan() {
        for fpp in [0.0, 1.0, -0.5, 2.0, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(check_fpp(fpp), Err(FilterError::InvalidFpp { .. })),
                "fpp {} should be rejected",
                fpp
            );
        }
    }

    #[test]
    fn test_error_messages_name_the_value() {
        let err = FilterError::InvalidByteBudget { bytes: 0 };
        assert!(err.to_string().contains("byte budget: 0"));

        let err = FilterError::LevelsExhausted { levels: 49, max: 48 };
        assert!(err.to_string().contains("49"));
    }
}
