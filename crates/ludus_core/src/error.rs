//! Error types for the simulation engine.
//!
//! Configuration problems are normally repaired and logged by
//! [`crate::config::ModelConfig::sanitize`]; the variants here surface what
//! cannot be repaired. Invariant violations are fatal and abort the run.

use ludus_data::TraitIndex;
use thiserror::Error;

/// Main error type for ludus_core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Bookkeeping no longer matches the population; indicates a logic defect.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A trait index outside `0..n_traits` reached the engine or a game.
    #[error("Unknown trait {trait_index} (game declares {n_traits} traits)")]
    UnknownTrait {
        trait_index: TraitIndex,
        n_traits: usize,
    },

    /// The game or geometry does not provide a required capability.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A configuration that could not be repaired.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for ludus_core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Creates a new invariant violation.
    #[must_use]
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Creates a new unsupported-operation error.
    #[must_use]
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error indicates a defect rather than bad input.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::UnknownTrait { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invariant("deme sum 3 != 4");
        assert_eq!(err.to_string(), "Invariant violation: deme sum 3 != 4");
    }

    #[test]
    fn test_unknown_trait_is_fatal() {
        let err = CoreError::UnknownTrait {
            trait_index: 7,
            n_traits: 2,
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Unknown trait 7"));
        assert!(!CoreError::unsupported("mean field").is_fatal());
    }
}
