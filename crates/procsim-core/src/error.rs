//! Unified error handling for ProcSim.
//!
//! Each subsystem keeps its own error enum; this type aggregates them for hosts that
//! prefer a single `Result` across the crate.

use crate::config::ConfigError;
use crate::models::ModelError;
use crate::storage::StoreError;

/// Unified error type for ProcSim.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Parameter store errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Model plugin errors.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_keeps_message() {
        let err: Error = StoreError::Serialization("bad json".into()).into();
        assert!(err.to_string().contains("Store error"));
        assert!(err.to_string().contains("bad json"));
    }

    #[test]
    fn test_model_error_converts() {
        let err: Error = ModelError::AbiMismatch { expected: 3, found: 4 }.into();
        assert_eq!(
            err.to_string(),
            "Model error: ABI version mismatch: expected 3, found 4"
        );
    }
}
