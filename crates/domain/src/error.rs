//! Resolution error taxonomy
//!
//! Every resolution failure is recorded against its owning address as a
//! [`ResolutionError`] carrying a machine-checkable [`ErrorCode`]. Failures
//! never abort a resolution pass; callers enumerate them afterwards.

use std::fmt;

use thiserror::Error;

/// Machine-checkable identifier for a resolution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed expression syntax (unmatched `${`), in the original
    /// configuration or in a string returned by a source.
    UnterminatedVariable,

    /// A source yielded nothing and the expression carries no fallback.
    MissingVariableResult,

    /// A concatenation fragment resolved to a value that cannot be embedded
    /// in a string (an object or a sequence).
    NonStringVariableResult,

    /// Catch-all: a source failed, a property dependency errored or formed a
    /// cycle, or a result could not be accepted.
    VariableResolutionError,

    /// A source's own output kept re-triggering resolution past the nesting
    /// depth bound.
    ExcessiveResolvedPropertiesNestDepth,
}

impl ErrorCode {
    /// Returns the canonical identifier surfaced to callers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnterminatedVariable => "UNTERMINATED_VARIABLE",
            Self::MissingVariableResult => "MISSING_VARIABLE_RESULT",
            Self::NonStringVariableResult => "NON_STRING_VARIABLE_RESULT",
            Self::VariableResolutionError => "VARIABLE_RESOLUTION_ERROR",
            Self::ExcessiveResolvedPropertiesNestDepth => {
                "EXCESSIVE_RESOLVED_PROPERTIES_NEST_DEPTH"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolution failure recorded against one configuration address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ResolutionError {
    /// The failure class.
    pub code: ErrorCode,
    /// Human-readable detail, carrying the original source message when one
    /// was available.
    pub message: String,
}

impl ResolutionError {
    /// Creates an error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for the `VARIABLE_RESOLUTION_ERROR` catch-all.
    #[must_use]
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::VariableResolutionError, message)
    }
}
