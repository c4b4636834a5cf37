//! Protocol error types.
//!
//! Every decode failure is fatal for the connection that produced it: the
//! server terminates that session and leaves the rest untouched. None of these
//! errors are transient.

use thiserror::Error;

/// Errors produced while encoding, decoding, or interpreting protocol units.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Buffer too short to contain a frame header.
    #[error("frame too short: need {expected} bytes, have {actual}")]
    FrameTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes actually available
        actual: usize,
    },

    /// Header claims more payload bytes than the buffer holds.
    #[error("truncated frame: header claims {expected} payload bytes, have {actual}")]
    FrameTruncated {
        /// Payload size claimed by the header
        expected: usize,
        /// Payload bytes actually available
        actual: usize,
    },

    /// Frame kind byte is not a known kind.
    #[error("unknown frame kind: {0:#04x}")]
    UnknownKind(u8),

    /// Payload exceeds the size limit for its frame kind.
    #[error("payload too large: {size} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Actual payload size
        size: usize,
        /// Maximum allowed for this frame kind
        max: usize,
    },

    /// Text frame payload is not valid UTF-8.
    #[error("text frame is not valid UTF-8")]
    InvalidUtf8,

    /// Received a frame of the wrong kind for the current protocol position.
    #[error("expected {expected} frame, got {actual} frame")]
    UnexpectedKind {
        /// Kind the protocol position requires
        expected: &'static str,
        /// Kind that was actually received
        actual: &'static str,
    },

    /// Text unit does not match any known server unit shape.
    #[error("malformed protocol unit: {0:?}")]
    MalformedUnit(String),

    /// Underlying stream I/O failure while reading or writing a frame.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
