//! Codec errors.

use std::io;

use thiserror::Error;

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The coder was created without the reader or writer this operation needs.
    #[error("unsupported operation: coder has no {0}")]
    Unsupported(&'static str),

    /// The coder has already been closed.
    #[error("coder is closed")]
    Closed,

    /// Malformed or truncated compressed or JSON data. The stream cannot be resumed.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),

    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// A decoded object did not contain any known message variant.
    #[error("message contains no known variant")]
    EmptyMessage,

    /// A decoded object contained more than one message variant.
    #[error("message contains {0} variants, expected exactly one")]
    MultipleVariants(usize),

    /// The underlying writer failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
