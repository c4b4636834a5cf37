//! Frame codec: one length-prefixed unit on the wire.
//!
//! Layout: `[kind: u8] [length: u32, big-endian] [payload: length bytes]`.
//!
//! The explicit length prefix keeps the stream unit-at-a-time without a
//! serialization runtime, and lets the reader reject oversized or malformed
//! units before allocating for them.

use bytes::{BufMut, Bytes};

use crate::errors::{ProtocolError, Result};

/// Discriminates the two unit shapes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// UTF-8 text: handshake tokens, chat lines, image headers, client input.
    Text,
    /// Raw bytes: an image payload, always paired with a preceding header.
    Binary,
}

impl FrameKind {
    /// Wire tag for this kind.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Text => 0x01,
            Self::Binary => 0x02,
        }
    }

    /// Parse a wire tag.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Text),
            0x02 => Ok(Self::Binary),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }

    /// Maximum payload size accepted for this kind.
    ///
    /// Text units are small (names, rendered lines); binary units carry whole
    /// images and get a far larger bound.
    pub fn max_payload(self) -> usize {
        match self {
            Self::Text => Frame::MAX_TEXT_SIZE,
            Self::Binary => Frame::MAX_BINARY_SIZE,
        }
    }

    /// Human-readable kind name, for error reporting.
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }
}

/// One discrete protocol unit.
///
/// # Invariants
///
/// - A `Text` frame's payload is valid UTF-8. [`Frame::text`] guarantees this
///   by construction and [`Frame::decode`] validates it.
/// - `payload.len()` never exceeds [`FrameKind::max_payload`] on the wire;
///   [`Frame::encode`] and [`Frame::decode`] both enforce the bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Unit shape.
    pub kind: FrameKind,
    /// Raw payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Size of the frame prefix (kind byte plus length word).
    pub const HEADER_SIZE: usize = 5;

    /// Maximum text payload (64 KiB).
    pub const MAX_TEXT_SIZE: usize = 64 * 1024;

    /// Maximum binary payload (16 MiB).
    pub const MAX_BINARY_SIZE: usize = 16 * 1024 * 1024;

    /// Create a text frame from a line.
    pub fn text(line: impl Into<String>) -> Self {
        Self { kind: FrameKind::Text, payload: Bytes::from(line.into()) }
    }

    /// Create a binary frame from raw bytes.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self { kind: FrameKind::Binary, payload: payload.into() }
    }

    /// View the payload as text.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnexpectedKind` if this is a binary frame
    /// - `ProtocolError::InvalidUtf8` if the payload is not UTF-8 (cannot
    ///   happen for frames built by this crate, only for hand-rolled ones)
    pub fn as_text(&self) -> Result<&str> {
        if self.kind != FrameKind::Text {
            return Err(ProtocolError::UnexpectedKind {
                expected: FrameKind::Text.name(),
                actual: self.kind.name(),
            });
        }
        std::str::from_utf8(&self.payload).map_err(|_| ProtocolError::InvalidUtf8)
    }

    /// Encode the frame into a buffer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload exceeds the limit for
    ///   this frame's kind
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let max = self.kind.max_payload();
        if self.payload.len() > max {
            return Err(ProtocolError::PayloadTooLarge { size: self.payload.len(), max });
        }

        // Bounded by max_payload (16 MiB), so the length always fits in u32.
        let length = u32::try_from(self.payload.len())
            .map_err(|_| ProtocolError::PayloadTooLarge { size: self.payload.len(), max })?;

        dst.put_u8(self.kind.to_u8());
        dst.put_u32(length);
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Decode one frame from the front of a buffer.
    ///
    /// Returns the frame and the number of bytes consumed. Trailing bytes are
    /// left untouched so callers can decode back-to-back frames.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if the buffer cannot hold a prefix
    /// - `ProtocolError::UnknownKind` for an unrecognized kind byte
    /// - `ProtocolError::PayloadTooLarge` if the claimed length exceeds the
    ///   kind's limit (rejected before any allocation)
    /// - `ProtocolError::FrameTruncated` if the payload is cut short
    /// - `ProtocolError::InvalidUtf8` for a non-UTF-8 text payload
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < Self::HEADER_SIZE {
            return Err(ProtocolError::FrameTooShort {
                expected: Self::HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let kind = FrameKind::from_u8(bytes[0])?;

        let length = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        if length > kind.max_payload() {
            return Err(ProtocolError::PayloadTooLarge { size: length, max: kind.max_payload() });
        }

        let total = Self::HEADER_SIZE + length;
        if bytes.len() < total {
            return Err(ProtocolError::FrameTruncated {
                expected: length,
                actual: bytes.len() - Self::HEADER_SIZE,
            });
        }

        let payload = Bytes::copy_from_slice(&bytes[Self::HEADER_SIZE..total]);
        let frame = Self { kind, payload };

        if frame.kind == FrameKind::Text {
            frame.as_text()?;
        }

        Ok((frame, total))
    }
}
