//! # Errors
//!
//! [`MainCalculator::calculate`](crate::calculations::MainCalculator::calculate)
//! is total and never hands a `CalcError` back. Errors come from the edges
//! around it: raw-JSON intake, dotted-path edits, formula checks, import and
//! the document store.
//!
//! Every variant serializes as `{"type": "...", "details": {...}}` so a front
//! end can branch on `type` without parsing messages.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::errors::{CalcError, CalcResult};
//!
//! fn staff_count(raw: &str) -> CalcResult<f64> {
//!     raw.trim()
//!         .parse::<f64>()
//!         .ok()
//!         .filter(|n| *n >= 0.0)
//!         .ok_or_else(|| CalcError::invalid_input("cost.fixed.staffCount", raw, "expected a non-negative number"))
//! }
//!
//! assert_eq!(staff_count("8").unwrap(), 8.0);
//! assert_eq!(staff_count("-1").unwrap_err().error_code(), "INVALID_INPUT");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formula::FormulaError;

pub type CalcResult<T> = Result<T, CalcError>;

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// A value that cannot be used where it was given
    #[error("{field} = {value}: {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// Document section or dotted path not present
    #[error("'{field}' not found in document")]
    MissingField { field: String },

    #[error("formula '{formula}' rejected: {reason}")]
    InvalidFormula { formula: String, reason: String },

    /// Import refused because the document has blocking errors
    #[error("document has {} error(s): {}", errors.len(), errors.join("; "))]
    ValidationFailed { errors: Vec<String> },

    /// The pipeline aborted inside `stage`
    #[error("{stage} stage aborted: {reason}")]
    CalculationFailed { stage: String, reason: String },

    #[error("cannot {operation} '{path}': {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// Another writer holds the store lock; retry later
    #[error("'{path}' is being saved by {locked_by} (since {locked_at})")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    #[error("bad JSON: {reason}")]
    SerializationError { reason: String },

    /// Export envelope from an incompatible release
    #[error("export version {file_version} is not compatible with {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },

    #[error("internal: {message}")]
    Internal { message: String },
}

impl CalcError {
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        CalcError::MissingField { field: field.into() }
    }

    pub fn invalid_formula(formula: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidFormula {
            formula: formula.into(),
            reason: reason.into(),
        }
    }

    pub fn calculation_failed(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::CalculationFailed {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// `operation` reads as a verb phrase: "read", "write lock", ...
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        CalcError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    pub fn serialization(reason: impl std::fmt::Display) -> Self {
        CalcError::SerializationError {
            reason: reason.to_string(),
        }
    }

    /// Only a held store lock goes away by itself.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CalcError::FileLocked { .. })
    }

    /// Stable SCREAMING_CASE code for scripts and front ends.
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::MissingField { .. } => "MISSING_FIELD",
            CalcError::InvalidFormula { .. } => "INVALID_FORMULA",
            CalcError::ValidationFailed { .. } => "VALIDATION_FAILED",
            CalcError::CalculationFailed { .. } => "CALCULATION_FAILED",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::FileLocked { .. } => "FILE_LOCKED",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::VersionMismatch { .. } => "VERSION_MISMATCH",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for CalcError {
    fn from(e: serde_json::Error) -> Self {
        CalcError::serialization(e)
    }
}

impl From<(String, FormulaError)> for CalcError {
    fn from((formula, e): (String, FormulaError)) -> Self {
        CalcError::invalid_formula(formula, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json_shape() {
        let error = CalcError::missing_field("investment");
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["type"], "MissingField");
        assert_eq!(value["details"]["field"], "investment");

        let back: CalcError = serde_json::from_value(value).unwrap();
        assert_eq!(back, error);
    }

    #[test]
    fn test_codes() {
        assert_eq!(CalcError::invalid_formula("1 +", "unexpected end").error_code(), "INVALID_FORMULA");
        assert_eq!(CalcError::calculation_failed("pipeline", "x").error_code(), "CALCULATION_FAILED");
        assert_eq!(CalcError::ValidationFailed { errors: vec![] }.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn test_messages() {
        let error = CalcError::ValidationFailed {
            errors: vec!["面积为负".to_string(), "员工数为负".to_string()],
        };
        assert_eq!(error.to_string(), "document has 2 error(s): 面积为负; 员工数为负");
        assert_eq!(
            CalcError::calculation_failed("pipeline", "boom").to_string(),
            "pipeline stage aborted: boom"
        );
    }

    #[test]
    fn test_only_lock_errors_are_recoverable() {
        assert!(CalcError::file_locked("store.json", "someone", "now").is_recoverable());
        assert!(!CalcError::missing_field("cost").is_recoverable());
    }

    #[test]
    fn test_formula_error_conversion() {
        let error: CalcError = ("max(".to_string(), FormulaError::UnexpectedEnd).into();
        assert_eq!(error.error_code(), "INVALID_FORMULA");
        assert!(error.to_string().contains("max("));
    }
}
