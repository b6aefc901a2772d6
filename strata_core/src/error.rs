//! Language-level exceptions and the crate-wide result type.
//!
//! Every generic operation that can throw returns [`StrataResult`]. The inline
//! cache layer never creates these for optimization failures; it only
//! propagates the ones raised by the object model.

use crate::value::Value;
use std::fmt;
use thiserror::Error;

/// The unified result type used throughout Strata.
pub type StrataResult<T> = Result<T, StrataError>;

/// An exception raised while executing an operation.
#[derive(Error, Debug, Clone)]
pub enum StrataError {
    /// Operation applied to a value of the wrong type.
    #[error("TypeError: {message}")]
    TypeError {
        /// Error description.
        message: String,
    },

    /// Unresolvable binding.
    #[error("ReferenceError: {name} is not defined")]
    ReferenceError {
        /// The unbound name.
        name: String,
    },

    /// Numeric value out of the allowed range.
    #[error("RangeError: {message}")]
    RangeError {
        /// Error description.
        message: String,
    },

    /// Allocation failed.
    #[error("InternalError: out of memory ({message})")]
    OutOfMemory {
        /// What was being allocated.
        message: String,
    },

    /// A value thrown by user code.
    #[error("uncaught exception: {value:?}")]
    Thrown {
        /// The thrown value.
        value: Value,
    },

    /// Malformed input reaching the runtime (bad bytecode, bad operand).
    #[error("InternalError: {message}")]
    InternalError {
        /// Error description.
        message: String,
    },
}

impl StrataError {
    /// Create a type error.
    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Create a reference error for an unbound name.
    #[must_use]
    pub fn reference(name: impl Into<String>) -> Self {
        Self::ReferenceError { name: name.into() }
    }

    /// Create a range error.
    #[must_use]
    pub fn range(message: impl Into<String>) -> Self {
        Self::RangeError {
            message: message.into(),
        }
    }

    /// Create an out-of-memory error.
    #[must_use]
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        Self::OutOfMemory {
            message: message.into(),
        }
    }

    /// Wrap a user-thrown value.
    #[must_use]
    pub fn thrown(value: Value) -> Self {
        Self::Thrown { value }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Exception class name as seen by scripts.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeError { .. } => ErrorKind::TypeError,
            Self::ReferenceError { .. } => ErrorKind::ReferenceError,
            Self::RangeError { .. } => ErrorKind::RangeError,
            Self::OutOfMemory { .. } | Self::InternalError { .. } => ErrorKind::InternalError,
            Self::Thrown { .. } => ErrorKind::Thrown,
        }
    }

    /// Check for a type error.
    #[inline]
    #[must_use]
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::TypeError { .. })
    }

    /// Check for a reference error.
    #[inline]
    #[must_use]
    pub fn is_reference_error(&self) -> bool {
        matches!(self, Self::ReferenceError { .. })
    }
}

/// Exception classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// `TypeError`
    TypeError,
    /// `ReferenceError`
    ReferenceError,
    /// `RangeError`
    RangeError,
    /// Engine-internal failure, including allocation failure.
    InternalError,
    /// Arbitrary value thrown by user code.
    Thrown,
}

impl ErrorKind {
    /// Class name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TypeError => "TypeError",
            Self::ReferenceError => "ReferenceError",
            Self::RangeError => "RangeError",
            Self::InternalError => "InternalError",
            Self::Thrown => "Error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
