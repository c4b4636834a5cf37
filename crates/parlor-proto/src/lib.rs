//! Wire protocol for the Parlor chat server.
//!
//! The protocol is unit-oriented: every discrete message on the stream is one
//! [`Frame`], either text (UTF-8) or binary (raw bytes). Text frames carry the
//! handshake tokens, rendered chat lines, and image headers; binary frames
//! carry raw image payloads. An image transfer is always two consecutive
//! frames: an `IMAGE <sender>` text header immediately followed by one binary
//! frame. Both sides must read the pair together or the stream desyncs, so
//! consumers treat a broken pair as a protocol error.
//!
//! This crate is pure codec logic - no I/O, no async. Framed reading and
//! writing over sockets lives with the server and client crates.

mod errors;
mod frame;
pub mod message;

pub use errors::{ProtocolError, Result};
pub use frame::{Frame, FrameKind};
