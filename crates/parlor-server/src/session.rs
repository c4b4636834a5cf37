//! Per-connection session: the handshake state machine and relay loop.
//!
//! A session moves through three phases:
//!
//! - Awaiting name: prompt with `SUBMITNAME` and read one proposal at a time.
//!   Blank proposals are re-prompted indefinitely. A stream that ends or
//!   errors in this phase terminates with no broadcast; the client never
//!   joined.
//! - Registered: acknowledge with `NAMEACCEPTED`, start the writer task,
//!   register the outbound channel, announce the join, then relay each
//!   inbound unit as a broadcast until the stream ends.
//! - Terminated: unregister, announce the departure (only if the session ever
//!   registered), and let the writer task drain and close the socket.

use std::sync::Arc;

use parlor_proto::{
    Frame, FrameKind, ProtocolError,
    message::{self, ServerUnit},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::mpsc,
};

use crate::{
    connection::{read_frame, write_frame},
    error::ServerError,
    registry::{Outbound, Registry, SessionId},
};

/// Drive one connection from accept to close.
pub(crate) async fn run(
    stream: TcpStream,
    id: SessionId,
    registry: Arc<Registry>,
    channel_capacity: usize,
) {
    let (mut reader, mut writer) = stream.into_split();

    let name = match handshake(&mut reader, &mut writer).await {
        Ok(Some(name)) => name,
        Ok(None) => {
            tracing::debug!(session = id, "client left during handshake");
            return;
        },
        Err(error) => {
            tracing::debug!(session = id, %error, "handshake failed");
            return;
        },
    };

    tracing::info!(session = id, name = %name, "client registered");

    let (tx, rx) = mpsc::channel(channel_capacity);
    tokio::spawn(write_outbound(writer, rx, id));

    registry.register(id, tx);
    registry.broadcast_joined(&name);

    let result = relay(&mut reader, &registry, &name).await;

    // Termination side effects run exactly once, in this order: drop the
    // channel from the registry, then announce the departure. The writer task
    // exits once the registry's sender is gone, closing the socket.
    registry.unregister(id);
    registry.broadcast_left(&name);

    match result {
        Ok(()) => tracing::info!(session = id, name = %name, "client disconnected"),
        Err(error) => {
            tracing::debug!(session = id, name = %name, %error, "session ended with error");
        },
    }
}

/// Awaiting-name phase.
///
/// Returns the accepted display name, or `None` if the stream ended before
/// one was supplied.
async fn handshake<R, W>(reader: &mut R, writer: &mut W) -> Result<Option<String>, ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        write_frame(writer, &Frame::text(ServerUnit::SubmitName.render())).await?;

        let Some(frame) = read_frame(reader).await? else {
            return Ok(None);
        };

        let name = frame.as_text()?.trim().to_string();
        if name.is_empty() {
            // Blank proposal: not an error, just re-prompt.
            continue;
        }

        write_frame(writer, &Frame::text(ServerUnit::NameAccepted.render())).await?;
        return Ok(Some(name));
    }
}

/// Registered phase: relay inbound units as broadcasts until the stream ends.
async fn relay<R>(reader: &mut R, registry: &Registry, name: &str) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let Some(frame) = read_frame(reader).await? else {
            return Ok(());
        };

        // A binary frame with no preceding header is a desynced stream.
        let line = frame.as_text()?;

        if message::image_marker(line).is_some() {
            // The marker commits the stream to exactly one binary frame next.
            // Anything else would desync every later read, so it terminates
            // the session instead.
            let Some(image) = read_frame(reader).await? else {
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

            // Outbound headers carry the session's registered name, not
            // whatever name the client put in its marker.
            registry.broadcast_image(name, image.payload);
        } else {
            registry.broadcast_text(name, line);
        }
    }
}

/// Writer task: drain one session's queue onto its socket.
///
/// This task is the socket's only writer, so the two frames of an image item
/// go out back to back with nothing in between.
async fn write_outbound<W>(mut writer: W, mut rx: mpsc::Receiver<Outbound>, id: SessionId)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = rx.recv().await {
        let result = match item {
            Outbound::Line(line) => {
                write_frame(&mut writer, &Frame::text(ServerUnit::Text(line).render())).await
            },
            Outbound::Image { sender, bytes } => {
                match write_frame(&mut writer, &Frame::text(ServerUnit::ImageHeader(sender).render()))
                    .await
                {
                    Ok(()) => write_frame(&mut writer, &Frame::binary(bytes)).await,
                    Err(error) => Err(error),
                }
            },
        };

        if let Err(error) = result {
            // The owning session detects the dead socket through its own read
            // loop; this task just stops delivering.
            tracing::debug!(session = id, %error, "outbound write failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;

    use super::*;

    async fn client_frame(stream: &mut (impl AsyncWrite + Unpin), frame: &Frame) {
        write_frame(stream, frame).await.unwrap();
    }

    async fn server_line(stream: &mut (impl AsyncRead + Unpin)) -> String {
        let frame = read_frame(stream).await.unwrap().unwrap();
        frame.as_text().unwrap().to_string()
    }

    #[tokio::test]
    async fn handshake_reprompts_blank_names() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (mut server_rd, mut server_wr) = tokio::io::split(server);

        client_frame(&mut client, &Frame::text("   ")).await;
        client_frame(&mut client, &Frame::text("")).await;
        client_frame(&mut client, &Frame::text("  alice  ")).await;

        let name = handshake(&mut server_rd, &mut server_wr).await.unwrap();
        assert_eq!(name.as_deref(), Some("alice"));

        // One prompt per proposal, then the acceptance.
        assert_eq!(server_line(&mut client).await, "SUBMITNAME");
        assert_eq!(server_line(&mut client).await, "SUBMITNAME");
        assert_eq!(server_line(&mut client).await, "SUBMITNAME");
        assert_eq!(server_line(&mut client).await, "NAMEACCEPTED");
    }

    #[tokio::test]
    async fn handshake_eof_yields_no_name() {
        let (client, server) = tokio::io::duplex(4096);
        let (mut server_rd, mut server_wr) = tokio::io::split(server);
        drop(client);

        // Writes into the closed duplex fail or the read sees EOF; either way
        // no name comes out and nothing was registered.
        let outcome = handshake(&mut server_rd, &mut server_wr).await;
        assert!(matches!(outcome, Ok(None) | Err(_)));
    }

    #[tokio::test]
    async fn handshake_rejects_binary_proposal() {
        let (mut client, server) = tokio::io::duplex(4096);
        let (mut server_rd, mut server_wr) = tokio::io::split(server);

        client_frame(&mut client, &Frame::binary(vec![1, 2, 3])).await;

        assert!(handshake(&mut server_rd, &mut server_wr).await.is_err());
    }

    #[tokio::test]
    async fn relay_broadcasts_text_and_paired_images() {
        let registry = Registry::new();
        let (tx, mut rx) = mpsc::channel(8);
        registry.register(1, tx);

        let (mut client, server) = tokio::io::duplex(4096);
        let (mut server_rd, _server_wr) = tokio::io::split(server);

        client_frame(&mut client, &Frame::text("hi")).await;
        client_frame(&mut client, &Frame::text("IMAGE whoever")).await;
        client_frame(&mut client, &Frame::binary(vec![42u8; 16])).await;
        client.shutdown().await.unwrap();
        drop(client);

        relay(&mut server_rd, &registry, "alice").await.unwrap();

        match rx.try_recv().unwrap() {
            Outbound::Line(line) => assert_eq!(line, "alice: hi"),
            other => panic!("expected line, got {other:?}"),
        }
        match rx.try_recv().unwrap() {
            Outbound::Image { sender, bytes } => {
                // Stamped with the registered name, not the client's claim.
                assert_eq!(sender, "alice");
                assert_eq!(bytes, Bytes::from(vec![42u8; 16]));
            },
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn relay_rejects_header_without_bytes() {
        let registry = Registry::new();

        let (mut client, server) = tokio::io::duplex(4096);
        let (mut server_rd, _server_wr) = tokio::io::split(server);

        client_frame(&mut client, &Frame::text("IMAGE alice")).await;
        client_frame(&mut client, &Frame::text("not the image")).await;

        assert!(relay(&mut server_rd, &registry, "alice").await.is_err());
    }

    #[tokio::test]
    async fn relay_rejects_header_at_end_of_stream() {
        let registry = Registry::new();

        let (mut client, server) = tokio::io::duplex(4096);
        let (mut server_rd, _server_wr) = tokio::io::split(server);

        client_frame(&mut client, &Frame::text("IMAGE alice")).await;
        client.shutdown().await.unwrap();
        drop(client);

        assert!(relay(&mut server_rd, &registry, "alice").await.is_err());
    }

    #[tokio::test]
    async fn relay_rejects_bare_binary_frame() {
        let registry = Registry::new();

        let (mut client, server) = tokio::io::duplex(4096);
        let (mut server_rd, _server_wr) = tokio::io::split(server);

        client_frame(&mut client, &Frame::binary(vec![1, 2, 3])).await;

        assert!(relay(&mut server_rd, &registry, "alice").await.is_err());
    }

    #[tokio::test]
    async fn writer_task_keeps_image_frames_adjacent() {
        let (server, mut client) = tokio::io::duplex(4096);
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(write_outbound(server, rx, 1));

        tx.send(Outbound::Line("alice: before".to_string())).await.unwrap();
        tx.send(Outbound::Image {
            sender: "alice".to_string(),
            bytes: Bytes::from_static(&[7, 7, 7]),
        })
        .await
        .unwrap();
        tx.send(Outbound::Line("alice: after".to_string())).await.unwrap();

        assert_eq!(server_line(&mut client).await, "TEXT alice: before");
        assert_eq!(server_line(&mut client).await, "IMAGE alice");

        let image = read_frame(&mut client).await.unwrap().unwrap();
        assert_eq!(image.kind, FrameKind::Binary);
        assert_eq!(&image.payload[..], &[7, 7, 7]);

        assert_eq!(server_line(&mut client).await, "TEXT alice: after");
    }
}
