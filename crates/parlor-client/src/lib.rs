//! Protocol-level client for the Parlor chat server.
//!
//! [`ChatClient`] drives the name handshake and decodes the server's
//! broadcast stream into [`ClientEvent`]s. It carries no UI: front-ends
//! render the events however they like, and the server's integration suite
//! uses this crate as its test harness.

mod client;
mod transport;

pub use client::{ChatClient, ClientError, ClientEvent};
