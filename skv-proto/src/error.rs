//! # Protocol Error Taxonomy
//!
//! Purpose: Classify every failure the wire codec and frame decoder can
//! produce, split along the line that matters to callers: data that arrived
//! malformed (`ProtocolViolation`) versus arguments the caller supplied
//! wrong (`InvalidArgument`).
//!
//! A `ProtocolViolation` is always fatal to the current parse. The owning
//! connection must be discarded rather than resynchronized, because a
//! misaligned cursor would corrupt every later read on that stream.

use thiserror::Error;

/// Result type for codec and decoder operations.
pub type ProtoResult<T> = Result<T, ProtoError>;

/// Broad classification of a [`ProtoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or inconsistent wire data. Fatal to the current parse.
    ProtocolViolation,
    /// Caller supplied a bad argument. Raised before any bytes are written.
    InvalidArgument,
}

/// Errors surfaced by the wire codec and frame decoder.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// A typed scalar read found a length prefix that does not match the
    /// scalar's fixed byte width.
    #[error("length field does not match expected value: declared {declared}, expected {expected}")]
    LengthMismatch { declared: usize, expected: usize },

    /// A length prefix declared more bytes than remain readable.
    #[error("declared length exceeds available data: need {needed}, have {available}")]
    LengthOverrun { needed: usize, available: usize },

    /// A key entry declared a zero length. Keys must be at least one byte.
    #[error("key length field must be at least 1")]
    ZeroKeyLength,

    /// The caller passed an empty key to the encoder.
    #[error("key must be non-empty")]
    EmptyKey,

    /// The caller passed a key longer than the 2-byte length field can hold.
    #[error("key length {0} exceeds the 65535-byte limit")]
    KeyTooLong(usize),

    /// An inbound frame declared a total length smaller than the fixed header.
    #[error("frame length {0} is below the fixed header size")]
    FrameTooShort(usize),

    /// An inbound frame declared a total length above the decoder's bound.
    #[error("frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The major byte of a request did not map to a known command.
    #[error("unknown command code {0}")]
    UnknownCommand(u8),

    /// The major byte of a response did not map to a known status.
    #[error("unknown status code {0}")]
    UnknownStatus(u8),

    /// A string-typed read found bytes that are not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}

impl ProtoError {
    /// Classify this error for propagation policy decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtoError::EmptyKey | ProtoError::KeyTooLong(_) => ErrorKind::InvalidArgument,
            _ => ErrorKind::ProtocolViolation,
        }
    }
}
