//! Error types for the payroll engine.
//!
//! Fatal conditions (configuration that cannot be loaded, malformed input,
//! callers opting to block on validation) are [`EngineError`]s. Problems the
//! engine can work around are reported as warnings beside the numeric result
//! instead; see [`crate::models::AuditWarning`].

use chrono::NaiveDate;
use thiserror::Error;

/// The main error type for the payroll engine.
///
/// # Example
///
/// ```
/// use payroll_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/engine.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/engine.yaml");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A pay type code was not found in the registry.
    #[error("Pay type not found: {code}")]
    PayTypeNotFound {
        /// The pay type code that was not found.
        code: String,
    },

    /// No tax table is effective on the requested date.
    #[error("No tax table effective on {date}")]
    TaxTableNotFound {
        /// The date for which a table was requested.
        date: NaiveDate,
    },

    /// A jurisdiction code was not found in the registry.
    #[error("Jurisdiction not found: {code}")]
    JurisdictionNotFound {
        /// The jurisdiction code that was not found.
        code: String,
    },

    /// The same jurisdiction code was registered twice.
    #[error("Duplicate jurisdiction: {code}")]
    DuplicateJurisdiction {
        /// The duplicated code.
        code: String,
    },

    /// The calculation input was malformed.
    #[error("Invalid input field '{field}': {message}")]
    InvalidInput {
        /// The offending field.
        field: String,
        /// A description of what made the field invalid.
        message: String,
    },

    /// Validation errors were found and the caller asked to block on them.
    #[error("Validation failed: {}", errors.join("; "))]
    ValidationFailed {
        /// The validation error messages.
        errors: Vec<String>,
    },

    /// The result failed an integrity check and cannot be finalized.
    #[error("Calculation integrity violation: {}", issues.join("; "))]
    IntegrityViolation {
        /// The integrity issue messages.
        issues: Vec<String>,
    },
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
