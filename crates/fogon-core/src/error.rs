//! # Error Types
//!
//! Domain-specific error types for fogon-core.
//!
//! ## Error Hierarchy
//! ```text
//! fogon-core errors (this file)
//! ├── CoreError        - Settlement domain errors
//! └── ValidationError  - Input validation failures
//!
//! fogon-db errors (separate crate)
//! └── DbError          - Database operation failures
//!
//! fogon-fiscal errors (separate crate)
//! └── SettlementError  - Pipeline failures surfaced to callers
//!
//! Flow: ValidationError → CoreError → SettlementError → caller
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (item id, shortfall, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core settlement logic errors.
///
/// These represent business rule violations. They are caught by the
/// orchestrator and translated into pipeline-level errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Access key construction produced something other than 49 digits.
    ///
    /// Indicates a non-numeric field slipped through; the inputs are
    /// sanitized before assembly so this is a programming error surfaced
    /// as data, not a panic.
    #[error("Malformed access key ({length} chars): {key}")]
    MalformedAccessKey { key: String, length: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any state mutation; a settlement request that fails
/// validation leaves the sale and the stock untouched.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long where truncation is not allowed.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. non-numeric tax id, invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_key_message() {
        let err = CoreError::MalformedAccessKey {
            key: "123".to_string(),
            length: 3,
        };
        assert_eq!(err.to_string(), "Malformed access key (3 chars): 123");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "tax_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
