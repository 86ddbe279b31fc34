//! Error types for `PropMap` operations.
//!
//! Every public mutating operation either fully succeeds or reports one of
//! these variants; single-entry mutations are never partially applied.

use thiserror::Error;

/// Result type alias for `PropMap` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or mutating a `PropMap`.
#[derive(Error, Debug)]
pub enum Error {
    /// The key was empty, or blank after trimming.
    #[error("key must not be empty or blank")]
    EmptyKey,

    /// An immutable entry was asked to take a different value.
    #[error("entry '{key}' is immutable")]
    ImmutableConflict {
        /// Key of the immutable entry.
        key: String,
    },

    /// A malformed escape sequence was met while loading text.
    ///
    /// Lines before `line` have been applied; the faulting line and
    /// everything after it have not.
    #[error("malformed escape in line {line}: {source}")]
    Decode {
        /// 1-based number of the physical line the logical line started on.
        line: usize,
        /// What was wrong with the escape.
        #[source]
        source: EscapeError,
    },

    /// The underlying stream failed, or its bytes were not valid in the
    /// requested encoding.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn immutable(key: &str) -> Self {
        Error::ImmutableConflict {
            key: key.to_owned(),
        }
    }
}

/// Failure of [`unescape`](crate::codec::unescape).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeError {
    /// `\u` followed by fewer than four characters.
    #[error("\\uXXXX escape is too short")]
    Truncated,

    /// `\u` followed by something other than four hex digits.
    #[error("invalid hex digit {0:?} in \\uXXXX escape")]
    InvalidHex(char),

    /// A `\uXXXX` surrogate that does not pair up with its partner.
    #[error("unpaired surrogate \\u{0:04X}")]
    UnpairedSurrogate(u16),
}
