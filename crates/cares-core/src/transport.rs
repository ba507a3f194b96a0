//! TCP transport for cluster communication.
//!
//! The cluster runs over unauthenticated plain TCP; these wrappers exist
//! so connection errors carry addresses and map onto the crate's error
//! taxonomy rather than bare `io::Error`s.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener as TokioTcpListener, TcpStream};

/// Errors that can occur during transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// I/O error from the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection was refused by the remote endpoint.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// TCP listener that accepts incoming cluster connections.
#[derive(Debug)]
pub struct TcpListener {
    inner: TokioTcpListener,
}

impl TcpListener {
    /// Binds to the given address.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let inner = TokioTcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    /// Accepts a new incoming connection.
    pub async fn accept(&self) -> Result<(TcpConnection, SocketAddr)> {
        let (stream, addr) = self.inner.accept().await?;
        Ok((TcpConnection { inner: stream }, addr))
    }

    /// Returns the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }
}

/// TCP connection for bidirectional frame exchange.
#[derive(Debug)]
pub struct TcpConnection {
    inner: TcpStream,
}

impl TcpConnection {
    /// Connects to the given address.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let inner = TcpStream::connect(addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                TransportError::ConnectionRefused(addr.to_string())
            } else {
                TransportError::Io(e)
            }
        })?;
        Ok(Self { inner })
    }
}

impl AsyncRead for TcpConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
