//! Frame-level send and receive helpers.
//!
//! Every endpoint in the cluster speaks the same framed format, so the
//! header/payload read sequence lives here once instead of at each call
//! site. Receiving distinguishes a clean EOF (peer closed between
//! frames) from a connection dropped mid-frame.

use std::io;
use std::time::Duration;

use rkyv::api::high::HighSerializer;
use rkyv::rancor::Error as RkyvError;
use rkyv::ser::allocator::ArenaHandle;
use rkyv::util::AlignedVec;
use rkyv::{Archive, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use cares_proto::{Codec, Envelope, FrameHeader, MessageType, ProtocolError, FRAME_HEADER_SIZE};

/// One received frame: parsed header plus raw payload bytes.
///
/// The payload is left undecoded so callers can dispatch on
/// `header.message_type` before committing to an envelope type.
#[derive(Debug)]
pub struct Frame {
    /// Parsed frame header.
    pub header: FrameHeader,
    /// Raw payload bytes (without the header).
    pub payload: Vec<u8>,
}

/// Encodes an envelope and writes the complete frame.
pub async fn send_envelope<T, W>(
    writer: &mut W,
    envelope: &Envelope<T>,
    message_type: MessageType,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Archive,
    Envelope<T>: for<'a> Serialize<HighSerializer<AlignedVec, ArenaHandle<'a>, RkyvError>>,
{
    let mut codec = Codec::new();
    let bytes = codec.encode(envelope, message_type)?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame from the stream.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between
/// frames; a close mid-frame is an error.
pub async fn recv_frame<R>(reader: &mut R) -> Result<Option<Frame>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; FRAME_HEADER_SIZE];
    let mut filled = 0;
    while filled < FRAME_HEADER_SIZE {
        let n = reader.read(&mut header_buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame",
            )));
        }
        filled += n;
    }

    let header = FrameHeader::decode(&header_buf)?;
    header.validate_payload_len()?;

    let mut payload = vec![0u8; header.payload_len as usize];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame { header, payload }))
}

/// Reads one frame, failing if it does not arrive within `timeout`.
pub async fn recv_frame_timeout<R>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Option<Frame>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(timeout, recv_frame(reader))
        .await
        .map_err(|_| {
            ProtocolError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "timed out waiting for frame",
            ))
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use cares_proto::{Acknowledgement, ClusterMessage};

    #[tokio::test]
    async fn send_and_receive_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let envelope = Envelope::new(ClusterMessage::JoinAck(Acknowledgement::ok("welcome")));
        send_envelope(&mut client, &envelope, MessageType::Cluster)
            .await
            .unwrap();

        let frame = recv_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(frame.header.message_type, MessageType::Cluster);

        let decoded: Envelope<ClusterMessage> = Codec::decode(&frame.payload).unwrap();
        assert_eq!(decoded.header.correlation_id, envelope.header.correlation_id);
        match decoded.payload {
            ClusterMessage::JoinAck(ack) => assert!(ack.success),
            other => panic!("expected JoinAck, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clean_eof_returns_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);

        let frame = recv_frame(&mut server).await.unwrap();
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_error() {
        let (mut client, mut server) = tokio::io::duplex(64);

        // Write half a header, then close.
        client.write_all(&[0u8; 4]).await.unwrap();
        drop(client);

        let result = recv_frame(&mut server).await;
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }

    #[tokio::test]
    async fn recv_timeout_fires() {
        let (_client, mut server) = tokio::io::duplex(64);

        let result = recv_frame_timeout(&mut server, Duration::from_millis(20)).await;
        match result {
            Err(ProtocolError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected timeout error, got {other:?}"),
        }
    }
}
