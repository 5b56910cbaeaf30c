//! Error taxonomy for the Claw runtime.
//!
//! One enum covers the whole crate: wire-format violations surface as
//! [`Error::Malformed`], caller mistakes as the typed argument variants,
//! and `total`/`final-40` disagreements as [`Error::InternalInvariant`]
//! (those indicate a bug in the runtime itself, not in the input).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure kinds produced by the Claw runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// Wire input violates the format: truncation, non-aligned sizes,
    /// decreasing field numbers, zero-length string/bytes/list, a header
    /// type that disagrees with the mapping, count/payload mismatches.
    #[error("malformed wire data: {0}")]
    Malformed(String),

    /// A final-40 write or list length would exceed 2^40 − 1, or a
    /// per-entry length in a bytes list would exceed 2^32 − 1.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// Getter/setter type disagrees with the mapping's declared type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Index beyond a list's length, or a field number beyond the mapping.
    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },

    /// Empty string/bytes on set, or an otherwise unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Attaching a child that already has a parent.
    #[error("child is already attached to a parent")]
    AlreadyAttached,

    /// `total` and `final-40` disagree, or bytes written ≠ `total`.
    /// Surfacing these aids test diagnostics; they are runtime bugs.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Byte source/sink failure, propagated with context.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand used by the decoder.
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::Malformed(msg.into())
    }
}
