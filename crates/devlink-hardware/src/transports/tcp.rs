//! Raw TCP socket transport.
//!
//! Network printers usually listen on port 9100 and accept raw bytes. The
//! socket is non-blocking; [`available`](Transport::available) pulls whatever
//! the kernel already holds into a local buffer so the device stream can ask
//! how much is readable without waiting.

use crate::error::{HardwareError, Result, not_open};
use crate::traits::Transport;
use bytes::{Buf, BytesMut};
use devlink_core::config::TcpConfig;
use devlink_core::constants::TAG_TCP;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Bytes pulled from the socket per non-blocking read.
const SOCKET_CHUNK: usize = 4096;

/// Transport over a single TCP connection.
#[derive(Debug)]
pub struct TcpTransport {
    config: TcpConfig,
    stream: Option<TcpStream>,
    pending: BytesMut,
}

impl TcpTransport {
    /// # Errors
    ///
    /// Returns a configuration error when the host or port is missing.
    pub fn new(config: TcpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stream: None,
            pending: BytesMut::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Move everything the socket holds right now into the local buffer.
    fn fill_pending(&mut self) {
        let Some(stream) = self.stream.as_ref() else {
            return;
        };

        let mut chunk = [0u8; SOCKET_CHUNK];
        loop {
            match stream.try_read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => self.pending.extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!(address = %self.config.address(), error = %err, "Socket poll failed");
                    break;
                }
            }
        }
    }
}

impl Transport for TcpTransport {
    fn tag(&self) -> &str {
        TAG_TCP
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn open(&mut self) -> Result<bool> {
        if self.stream.is_some() {
            return Ok(false);
        }

        let address = self.config.address();
        let timeout = self.config.settings().timeout();
        info!("Connecting to {}", address);

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => {
                warn!("Connection to {} failed: {}", address, err);
                return Err(err.into());
            }
            Err(_) => {
                warn!("Connection timeout after {}ms", timeout.as_millis());
                return Err(HardwareError::timeout(timeout.as_millis() as u64));
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", err);
        }

        self.stream = Some(stream);
        self.pending.clear();
        Ok(true)
    }

    async fn close(&mut self) -> Result<bool> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(false);
        };

        if let Err(err) = stream.shutdown().await {
            debug!(address = %self.config.address(), error = %err, "Socket shutdown failed");
        }
        self.pending.clear();
        debug!("Connection to {} closed", self.config.address());
        Ok(true)
    }

    fn available(&mut self) -> usize {
        self.fill_pending();
        self.pending.len()
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.pending.is_empty() {
            let count = buf.len().min(self.pending.len());
            self.pending.copy_to_slice(&mut buf[..count]);
            return Ok(count);
        }

        let address = self.config.address();
        let stream = self.stream.as_mut().ok_or_else(|| not_open(&address))?;
        stream.read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let address = self.config.address();
        let stream = self.stream.as_mut().ok_or_else(|| not_open(&address))?;
        stream.write_all(buf).await?;
        stream.flush().await
    }

    async fn clear(&mut self) -> Result<()> {
        self.fill_pending();
        if !self.pending.is_empty() {
            debug!(bytes = self.pending.len(), "Discarding pending socket input");
        }
        self.pending.clear();
        Ok(())
    }

    fn release(&mut self) {
        self.stream = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_requires_host() {
        assert!(matches!(
            TcpTransport::new(TcpConfig::default()),
            Err(HardwareError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_round_trip_with_local_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(b"PONG").await.unwrap();
            request
        });

        let mut transport = TcpTransport::new(TcpConfig::new("127.0.0.1", port)).unwrap();
        assert!(transport.open().await.unwrap());
        transport.write(b"PING").await.unwrap();
        assert_eq!(&peer.await.unwrap(), b"PING");

        while transport.available() < 4 {
            tokio::task::yield_now().await;
        }
        let mut answer = [0u8; 4];
        assert_eq!(transport.read(&mut answer).await.unwrap(), 4);
        assert_eq!(&answer, b"PONG");

        assert!(transport.close().await.unwrap());
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut transport = TcpTransport::new(TcpConfig::new("127.0.0.1", port)).unwrap();
        assert!(transport.open().await.is_err());
        assert!(!transport.is_open());
    }
}
