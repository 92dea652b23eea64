//! Definition of errors.

use core::fmt;

use std::error::Error;

/// Error used when the argument is invalid.
#[derive(Debug)]
pub struct InvalidArgumentError {
    msg: &'static str,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidArgumentError: {}", self.msg)
    }
}

impl Error for InvalidArgumentError {}

/// Error used when a vector does not have the dimension of the parameters.
#[derive(Debug)]
pub struct DimensionMismatchError {
    /// Name of the offending vector.
    pub what: &'static str,

    /// Dimension of the parameter vector.
    pub expected: usize,

    /// Dimension that was actually supplied.
    pub actual: usize,
}

impl fmt::Display for DimensionMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "DimensionMismatchError: {} has dimension {}, expected {}",
            self.what, self.actual, self.expected
        )
    }
}

impl Error for DimensionMismatchError {}

/// The error type for Rusgo.
#[derive(Debug)]
pub enum RusgoError {
    /// A hyperparameter or argument is out of its valid range.
    InvalidArgument(InvalidArgumentError),

    /// A gradient or parameter vector has the wrong dimension.
    DimensionMismatch(DimensionMismatchError),
}

impl RusgoError {
    /// Creates a new [`InvalidArgumentError`].
    pub const fn invalid_argument(msg: &'static str) -> Self {
        Self::InvalidArgument(InvalidArgumentError { msg })
    }

    /// Creates a new [`DimensionMismatchError`].
    pub const fn dimension_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch(DimensionMismatchError {
            what,
            expected,
            actual,
        })
    }
}

impl fmt::Display for RusgoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => e.fmt(f),
            Self::DimensionMismatch(e) => e.fmt(f),
        }
    }
}

impl Error for RusgoError {}

/// A specialized Result type.
pub type Result<T, E = RusgoError> = core::result::Result<T, E>;

/// Returns an error unless `actual` equals `expected`.
#[inline(always)]
pub(crate) fn check_dimension(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RusgoError::dimension_mismatch(what, expected, actual))
    }
}
