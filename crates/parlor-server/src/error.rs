//! Server error types.

use std::io;

use parlor_proto::ProtocolError;
use thiserror::Error;

/// Errors that can occur in the server.
///
/// Only [`ServerError::Bind`] is fatal to the process. Everything else
/// terminates at most the one session it came from; the listener and the
/// other sessions keep running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listening endpoint. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind
        addr: String,
        /// Underlying bind failure
        #[source]
        source: io::Error,
    },

    /// Listener-level I/O failure outside the accept path.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// Socket-level or decode failure on one connection.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
