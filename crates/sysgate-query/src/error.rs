//! Client-facing error object: `{code, message, details?, field?}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A parameter is malformed or out of bounds.
    InvalidParameter,
    /// A required parameter is absent.
    MissingParameter,
    /// The column is not in the schema allow-list.
    InvalidColumn,
    /// The date range is inverted or too wide.
    InvalidDateRange,
    /// A severity value is outside 0-7.
    InvalidSeverity,
    /// A facility value is outside 0-23.
    InvalidFacility,
    /// Missing or invalid credential.
    Unauthorized,
    /// Credential valid but origin not allowed.
    Forbidden,
    /// The addressed resource does not exist.
    NotFound,
    /// The resource already exists or is in the wrong state.
    Conflict,
    /// The database failed.
    DatabaseError,
    /// Any other server-side failure.
    InternalError,
}

impl ErrorCode {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::MissingParameter => "MISSING_PARAMETER",
            Self::InvalidColumn => "INVALID_COLUMN",
            Self::InvalidDateRange => "INVALID_DATE_RANGE",
            Self::InvalidSeverity => "INVALID_SEVERITY",
            Self::InvalidFacility => "INVALID_FACILITY",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured API error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Error category.
    pub code: ErrorCode,
    /// Human-readable summary.
    pub message: String,
    /// Extra context, such as the requested span or available columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// The offending query parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ApiError {
    /// Creates an error with no details or field.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            field: None,
        }
    }

    /// Creates a field-tagged `INVALID_PARAMETER` error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParameter, message).with_field(field)
    }

    /// Attaches details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attaches the offending field name.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}
