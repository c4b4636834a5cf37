//! Typed protocol units layered on text frames.
//!
//! Server-to-client text frames always carry one of four unit shapes:
//! the `SUBMITNAME` prompt, the `NAMEACCEPTED` acknowledgement, a rendered
//! `TEXT <line>` chat line, or an `IMAGE <sender>` header announcing that the
//! next frame on the stream is the image bytes. Client-to-server text frames
//! are bare strings (a proposed name or a chat body), except for the same
//! `IMAGE <sender>` marker preceding a client-initiated image upload.
//!
//! Chat lines arrive fully rendered - `alice: hi` or a system notice like
//! `alice joined the chat` - so clients display them verbatim and never need
//! to re-derive who said what.

use crate::errors::{ProtocolError, Result};

/// Handshake prompt: the server wants a display name.
pub const SUBMIT_NAME: &str = "SUBMITNAME";

/// Handshake acknowledgement: the proposed name was accepted.
pub const NAME_ACCEPTED: &str = "NAMEACCEPTED";

/// Prefix for rendered chat lines.
pub const TEXT_PREFIX: &str = "TEXT ";

/// Prefix for image headers, followed by the sender name.
pub const IMAGE_PREFIX: &str = "IMAGE ";

/// One server-to-client text unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerUnit {
    /// Prompt for a display name.
    SubmitName,
    /// Handshake complete.
    NameAccepted,
    /// A rendered chat line, displayed verbatim.
    Text(String),
    /// Image announcement; the next frame is the image bytes from this sender.
    ImageHeader(String),
}

impl ServerUnit {
    /// Render the unit to its wire line.
    pub fn render(&self) -> String {
        match self {
            Self::SubmitName => SUBMIT_NAME.to_string(),
            Self::NameAccepted => NAME_ACCEPTED.to_string(),
            Self::Text(line) => format!("{TEXT_PREFIX}{line}"),
            Self::ImageHeader(sender) => format!("{IMAGE_PREFIX}{sender}"),
        }
    }

    /// Parse a wire line into a unit.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MalformedUnit` if the line matches no unit shape
    pub fn parse(line: &str) -> Result<Self> {
        if line == SUBMIT_NAME {
            return Ok(Self::SubmitName);
        }
        if line == NAME_ACCEPTED {
            return Ok(Self::NameAccepted);
        }
        if let Some(rest) = line.strip_prefix(TEXT_PREFIX) {
            return Ok(Self::Text(rest.to_string()));
        }
        if let Some(sender) = line.strip_prefix(IMAGE_PREFIX) {
            return Ok(Self::ImageHeader(sender.to_string()));
        }
        Err(ProtocolError::MalformedUnit(line.to_string()))
    }
}

/// Render a chat message as the line every recipient sees.
pub fn chat_line(sender: &str, body: &str) -> String {
    format!("{sender}: {body}")
}

/// System notice for a completed join.
pub fn joined_notice(name: &str) -> String {
    format!("{name} joined the chat")
}

/// System notice for a departure.
pub fn left_notice(name: &str) -> String {
    format!("{name} left the chat")
}

/// Detect an inbound image marker on a client text unit.
///
/// Returns the sender name the client claimed. The server ignores the claim
/// and stamps outbound headers with the session's registered name, but the
/// marker itself is what commits both sides to reading the next frame as the
/// image bytes.
pub fn image_marker(line: &str) -> Option<&str> {
    line.strip_prefix(IMAGE_PREFIX)
}
