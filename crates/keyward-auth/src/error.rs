//! Error types for grant and session storage operations.
//!
//! Lookup misses are never errors: every `find_*` operation returns
//! `Ok(None)` or an empty collection for absent, expired, or evicted
//! entries. The variants here cover the failures that must surface.

use std::fmt;

/// Errors that can occur during credential storage operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A backing store (remote tier or connection pool) failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Store configuration is invalid at construction time.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration violation.
        message: String,
    },

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the codec failure.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if the error came from a backing store rather than
    /// from this process.
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Returns `true` if the error is a construction-time misconfiguration
    /// that no retry can fix.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Serialization { .. } => ErrorCategory::Serialization,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Infrastructure/backing-store errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Encode/decode errors.
    Serialization,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Serialization => write!(f, "serialization"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::storage("connection refused");
        assert_eq!(err.to_string(), "Storage error: connection refused");

        let err = AuthError::configuration("max TTL must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: max TTL must be greater than zero"
        );

        let err = AuthError::serialization("unexpected end of input");
        assert_eq!(
            err.to_string(),
            "Serialization error: unexpected end of input"
        );
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::storage("pool exhausted");
        assert!(err.is_storage_error());
        assert!(!err.is_configuration_error());

        let err = AuthError::configuration("capacity must be positive");
        assert!(err.is_configuration_error());
        assert!(!err.is_storage_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::storage("test").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            AuthError::configuration("test").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            AuthError::serialization("test").category(),
            ErrorCategory::Serialization
        );
        assert_eq!(
            AuthError::internal("test").category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
        assert_eq!(ErrorCategory::Serialization.to_string(), "serialization");
        assert_eq!(ErrorCategory::Internal.to_string(), "internal");
    }
}
