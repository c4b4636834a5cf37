//! Framed reads and writes over a byte stream.
//!
//! One frame per call, symmetric with the codec in `parlor-proto`: the prefix
//! is read first so oversized or malformed units are rejected before any
//! payload allocation.

use bytes::BytesMut;
use parlor_proto::{Frame, FrameKind, ProtocolError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read one frame from the stream.
///
/// Returns `Ok(None)` on a clean end-of-stream at a frame boundary. An EOF in
/// the middle of a frame is an error - the peer hung up mid-unit.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; Frame::HEADER_SIZE];

    match reader.read_exact(&mut prefix[..1]).await {
        Ok(_) => {},
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    reader.read_exact(&mut prefix[1..]).await?;

    let kind = FrameKind::from_u8(prefix[0])?;
    let length = u32::from_be_bytes([prefix[1], prefix[2], prefix[3], prefix[4]]) as usize;
    if length > kind.max_payload() {
        return Err(ProtocolError::PayloadTooLarge { size: length, max: kind.max_payload() });
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;

    let frame = Frame { kind, payload: payload.into() };
    if frame.kind == FrameKind::Text {
        frame.as_text()?;
    }

    Ok(Some(frame))
}

/// Write one frame to the stream and flush it.
pub(crate) async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(Frame::HEADER_SIZE + frame.payload.len());
    frame.encode(&mut buf)?;

    writer.write_all(&buf).await?;
    writer.flush().await?;

    Ok(())
}
