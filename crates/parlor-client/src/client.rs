//! The chat client: handshake driving and broadcast-stream decoding.

use bytes::Bytes;
use parlor_proto::{
    Frame, FrameKind, ProtocolError,
    message::ServerUnit,
};
use thiserror::Error;
use tokio::net::{
    TcpStream, ToSocketAddrs,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

use crate::transport::{read_frame, write_frame};

/// Client-side errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connect failed.
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Framing, decode, or socket failure on the established stream.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Server closed the connection while a unit was still expected.
    #[error("server closed the connection")]
    Closed,

    /// Server sent a unit that makes no sense at this protocol position.
    #[error("unexpected server unit: {0:?}")]
    Unexpected(ServerUnit),

    /// Operation requires a completed handshake.
    #[error("not registered: complete the handshake first")]
    NotRegistered,
}

/// One decoded server-to-client event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A rendered chat line (message or system notice), displayed verbatim.
    Text(String),
    /// An image broadcast from `sender`.
    Image {
        /// Name of the sending session
        sender: String,
        /// Raw image payload
        bytes: Bytes,
    },
}

/// A connected chat client.
pub struct ChatClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    name: Option<String>,
}

impl ChatClient {
    /// Connect to a server. The handshake has not run yet; call
    /// [`ChatClient::handshake`] next.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await.map_err(ClientError::Connect)?;
        let (reader, writer) = stream.into_split();
        Ok(Self { reader, writer, name: None })
    }

    /// Complete the name handshake.
    ///
    /// A blank name makes the server re-prompt forever, so this sends one
    /// proposal and requires it to be accepted. Use
    /// [`ChatClient::propose_name`] directly to drive rejection rounds.
    pub async fn handshake(&mut self, name: &str) -> Result<(), ClientError> {
        self.propose_name(name).await?;
        match self.next_unit().await? {
            ServerUnit::NameAccepted => {
                self.name = Some(name.trim().to_string());
                Ok(())
            },
            other => Err(ClientError::Unexpected(other)),
        }
    }

    /// Answer the next `SUBMITNAME` prompt with one proposal.
    ///
    /// Low-level building block: after a blank proposal the server's answer
    /// is simply the next prompt, which the following call consumes.
    pub async fn propose_name(&mut self, name: &str) -> Result<(), ClientError> {
        match self.next_unit().await? {
            ServerUnit::SubmitName => {},
            other => return Err(ClientError::Unexpected(other)),
        }
        write_frame(&mut self.writer, &Frame::text(name)).await?;
        Ok(())
    }

    /// Display name, once the handshake has completed.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Send a chat message body.
    pub async fn send_text(&mut self, body: &str) -> Result<(), ClientError> {
        if self.name.is_none() {
            return Err(ClientError::NotRegistered);
        }
        write_frame(&mut self.writer, &Frame::text(body)).await?;
        Ok(())
    }

    /// Send an image: the `IMAGE <name>` marker, then the bytes, back to
    /// back. The server reads the two as a pair.
    pub async fn send_image(&mut self, bytes: Bytes) -> Result<(), ClientError> {
        let Some(name) = self.name.clone() else {
            return Err(ClientError::NotRegistered);
        };

        write_frame(&mut self.writer, &Frame::text(ServerUnit::ImageHeader(name).render()))
            .await?;
        write_frame(&mut self.writer, &Frame::binary(bytes)).await?;
        Ok(())
    }

    /// Receive the next broadcast event. `Ok(None)` means the server closed
    /// the connection.
    pub async fn next_event(&mut self) -> Result<Option<ClientEvent>, ClientError> {
        let Some(frame) = read_frame(&mut self.reader).await? else {
            return Ok(None);
        };

        match ServerUnit::parse(frame.as_text()?)? {
            ServerUnit::Text(line) => Ok(Some(ClientEvent::Text(line))),
            ServerUnit::ImageHeader(sender) => {
                // The header commits the stream: the very next frame must be
                // the image bytes.
                let Some(image) = read_frame(&mut self.reader).await? else {
                    return Err(ProtocolError::UnexpectedKind {
                        expected: "binary",
                        actual: "end of stream",
                    }
                    .into());
                };
                if image.kind != FrameKind::Binary {
                    return Err(ProtocolError::UnexpectedKind {
                        expected: "binary",
                        actual: image.kind.name(),
                    }
                    .into());
                }
                Ok(Some(ClientEvent::Image { sender, bytes: image.payload }))
            },
            other => Err(ClientError::Unexpected(other)),
        }
    }

    /// Close the outbound half, signalling departure to the server. Already
    /// queued broadcasts can still be read afterwards.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        use tokio::io::AsyncWriteExt;
        self.writer.shutdown().await.map_err(ProtocolError::Io)?;
        Ok(())
    }

    async fn next_unit(&mut self) -> Result<ServerUnit, ClientError> {
        let Some(frame) = read_frame(&mut self.reader).await? else {
            return Err(ClientError::Closed);
        };
        Ok(ServerUnit::parse(frame.as_text()?)?)
    }
}
