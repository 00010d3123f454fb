use thiserror::Error;

use super::{ConfigError, TransportError, ValidationError};

/// Top-level error type for all client operations.
///
/// Every fallible entry point in the crate returns this type. Match on the
/// variants (or use the predicate helpers) to branch on the failure class.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request shape was rejected before any network activity.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The transport failed to complete the exchange.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The client or endpoint registry is misconfigured.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// Returns `true` if this error was caused by cooperative cancellation.
    ///
    /// Lets callers distinguish user-initiated aborts from genuine network
    /// failures without matching the full hierarchy.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Aborted))
    }

    /// Returns `true` if this error was raised before dispatch.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aborted_predicate() {
        let err = ApiError::from(TransportError::Aborted);
        assert!(err.is_aborted());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_predicate() {
        let err = ApiError::from(ValidationError::NullQuery);
        assert!(err.is_validation());
        assert!(!err.is_aborted());
    }
}
