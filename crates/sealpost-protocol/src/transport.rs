//! The request/response seam between a session and the network.
//!
//! A [`Transport`] carries one request and returns the correlated response.
//! [`StreamTransport`] implements it over any byte stream (TLS, TCP, or an
//! in-memory duplex in tests) using the length-prefixed framing in
//! [`crate::codec`].

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::{decode_message, encode_frame, try_decode_frame};
use crate::error::{ProtocolError, TransportError};
use crate::message::Message;

/// Send a request and receive its response.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, request: Message) -> Result<Message, TransportError>;
}

fn codec_error(err: ProtocolError) -> TransportError {
    TransportError::Codec(err.to_string())
}

/// Write one framed message and flush.
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(msg).map_err(codec_error)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    trace!(bytes = frame.len(), "frame written");
    Ok(())
}

/// Read the next framed message.
///
/// Returns `Ok(None)` on a clean EOF between frames and
/// [`TransportError::Closed`] if the stream ends mid-frame.
pub async fn read_message<R>(
    reader: &mut R,
    buf: &mut BytesMut,
) -> Result<Option<Message>, TransportError>
where
    R: AsyncRead + Unpin,
{
    loop {
        if let Some(payload) = try_decode_frame(buf).map_err(codec_error)? {
            trace!(bytes = payload.len(), "frame read");
            return decode_message(&payload).map(Some).map_err(codec_error);
        }
        if reader.read_buf(buf).await? == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(TransportError::Closed);
        }
    }
}

/// Request/response over a single byte stream, one round trip at a time.
///
/// Every round trip is bounded by `timeout`. After a timeout the stream may
/// hold a partial frame, so the transport should be dropped.
pub struct StreamTransport<S> {
    stream: S,
    buf: BytesMut,
    timeout: Duration,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(4096),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn round_trip(&mut self, request: &Message) -> Result<Message, TransportError> {
        write_message(&mut self.stream, request).await?;
        read_message(&mut self.stream, &mut self.buf)
            .await?
            .ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, request: Message) -> Result<Message, TransportError> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.round_trip(&request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::fields;

    #[tokio::test]
    async fn round_trip_over_duplex() {
        let (client, mut server) = tokio::io::duplex(64 * 1024);

        let server_task = tokio::spawn(async move {
            let mut buf = BytesMut::new();
            while let Some(msg) = read_message(&mut server, &mut buf).await.unwrap() {
                let reply = Message::new()
                    .with(fields::STATUS, "OK")
                    .with(fields::CMD, msg.get(fields::CMD).unwrap_or_default().to_vec());
                write_message(&mut server, &reply).await.unwrap();
            }
        });

        let mut transport = StreamTransport::new(client, Duration::from_secs(5));
        for cmd in ["xchg", "data"] {
            let reply = transport
                .send(Message::new().with(fields::CMD, cmd))
                .await
                .unwrap();
            assert_eq!(reply.get_str(fields::CMD).as_deref(), Some(cmd));
            assert_eq!(reply.get_str(fields::STATUS).as_deref(), Some("OK"));
        }

        drop(transport);
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut transport = StreamTransport::new(client, Duration::from_millis(50));
        let result = transport.send(Message::new().with(fields::CMD, "xchg")).await;
        assert!(matches!(result, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn closed_peer_reports_closed() {
        let (client, mut server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let mut buf = BytesMut::new();
            let _ = read_message(&mut server, &mut buf).await;
            // dropped without replying
        });

        let mut transport = StreamTransport::new(client, Duration::from_secs(5));
        let result = transport.send(Message::new().with(fields::CMD, "xchg")).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn eof_mid_frame_is_closed() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&[0, 0, 0, 10, b'{']).await.unwrap();
        drop(client);

        let mut buf = BytesMut::new();
        let result = read_message(&mut server, &mut buf).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn clean_eof_is_none() {
        let (client, mut server) = tokio::io::duplex(1024);
        drop(client);
        let mut buf = BytesMut::new();
        assert!(read_message(&mut server, &mut buf).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_frame_is_codec_error() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(&[0, 0, 0, 3, b'a', b'b', b'c']).await.unwrap();

        let mut buf = BytesMut::new();
        let result = read_message(&mut server, &mut buf).await;
        assert!(matches!(result, Err(TransportError::Codec(_))));
    }
}
