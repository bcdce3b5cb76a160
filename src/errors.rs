//! Error types reported when building iterators, views and slicers.

use crate::dtype::DataType;

/// Error returned by a [`SliceVisitor`](crate::SliceVisitor).
pub type VisitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when constructing iterators or views.
///
/// Apart from [`Error::Visit`], all of these are detected eagerly when an
/// iterator, view or plan is built. Once an iterator exists, advancing and
/// resetting it cannot fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Two shapes have conflicting sizes (neither of which is 1) in a
    /// dimension. `dim` is counted in the padded, broadcast rank.
    #[error("shapes cannot be broadcast: dim {dim} has sizes {first} and {second}")]
    ShapeMismatch {
        dim: usize,
        first: usize,
        second: usize,
    },

    /// Item widths of the operands cannot be reconciled, or an output array
    /// does not match the broadcast result.
    #[error("incompatible operands: {reason}")]
    IncompatibleOperands { reason: String },

    /// A precondition on an argument was violated.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// An array of this type cannot produce numeric or boolean element values.
    #[error("elements of type {dtype} cannot be read as numbers")]
    UnsupportedElementAccess { dtype: DataType },

    /// A slice visitor failed.
    #[error("visit of slice {slice} failed")]
    Visit {
        slice: String,
        #[source]
        source: VisitError,
    },
}

impl Error {
    pub(crate) fn incompatible(reason: impl Into<String>) -> Error {
        Error::IncompatibleOperands {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_arg(reason: impl Into<String>) -> Error {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }
}

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
