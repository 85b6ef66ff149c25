//! Adapter for push-based ports.
//!
//! A [`PushPort`](devlink_core::config::PushPort) hands out an asynchronous
//! reader that produces bytes whenever the device sends them. A background
//! task drains that reader into a bounded queue; [`available`] and [`read`]
//! only ever look at the queue, so the device stream sees the same pull-style
//! contract as every other backend. When the queue is full the pump stops
//! reading until the stream catches up.
//!
//! [`available`]: Transport::available
//! [`read`]: Transport::read

use crate::error::{HardwareError, Result, not_open};
use crate::traits::Transport;
use bytes::{Buf, Bytes, BytesMut};
use devlink_core::config::{PortReader, PortWriter, QueuedConfig};
use devlink_core::constants::TAG_QUEUED;
use std::fmt;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

const PUMP_CHUNK: usize = 1024;

/// Transport over a push-based port.
pub struct QueuedTransport {
    config: QueuedConfig,
    writer: Option<PortWriter>,
    queue: Option<mpsc::Receiver<Bytes>>,
    pending: BytesMut,
    cancel: Option<CancellationToken>,
    pump: Option<JoinHandle<()>>,
}

impl QueuedTransport {
    /// # Errors
    ///
    /// Returns a configuration error when no port is attached.
    pub fn new(config: QueuedConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            writer: None,
            queue: None,
            pending: BytesMut::new(),
            cancel: None,
            pump: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &QueuedConfig {
        &self.config
    }

    fn name(&self) -> &str {
        self.config.settings().name()
    }

    /// Move every queued chunk into the local buffer.
    fn drain_queue(&mut self) {
        let Some(queue) = self.queue.as_mut() else {
            return;
        };

        loop {
            match queue.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    fn stop_pump(&mut self) -> Option<JoinHandle<()>> {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.pump.take()
    }
}

impl fmt::Debug for QueuedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedTransport")
            .field("config", &self.config)
            .field("open", &self.writer.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

async fn pump(
    mut reader: PortReader,
    queue: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    device: String,
) {
    let mut buffer = BytesMut::with_capacity(PUMP_CHUNK);

    loop {
        buffer.reserve(PUMP_CHUNK);
        let read = tokio::select! {
            () = cancel.cancelled() => break,
            read = reader.read_buf(&mut buffer) => read,
        };

        match read {
            Ok(0) => {
                debug!(device, "Port reached end of stream");
                break;
            }
            Ok(count) => {
                trace!(device, bytes = count, "Queued incoming chunk");
                let chunk = buffer.split().freeze();
                let sent = tokio::select! {
                    () = cancel.cancelled() => break,
                    sent = queue.send(chunk) => sent,
                };
                if sent.is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(device, error = %err, "Port read failed, stopping pump");
                break;
            }
        }
    }
}

impl Transport for QueuedTransport {
    fn tag(&self) -> &str {
        TAG_QUEUED
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    async fn open(&mut self) -> Result<bool> {
        if self.writer.is_some() {
            return Ok(false);
        }

        let port = self
            .config
            .port()
            .ok_or_else(|| HardwareError::configuration("queued transport has no port attached"))?;
        let (reader, writer) = port.connect()?;

        let (sender, receiver) = mpsc::channel(self.config.queue_capacity());
        let cancel = CancellationToken::new();
        let device = self.name().to_string();
        debug!(device, capacity = self.config.queue_capacity(), "Starting port pump");

        self.pump = Some(tokio::spawn(pump(reader, sender, cancel.clone(), device)));
        self.cancel = Some(cancel);
        self.queue = Some(receiver);
        self.writer = Some(writer);
        self.pending.clear();
        Ok(true)
    }

    async fn close(&mut self) -> Result<bool> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(false);
        };

        if let Some(pump) = self.stop_pump()
            && let Err(err) = pump.await
        {
            debug!(device = self.name(), error = %err, "Port pump ended abnormally");
        }
        self.queue = None;
        self.pending.clear();

        writer.shutdown().await?;
        Ok(true)
    }

    fn available(&mut self) -> usize {
        self.drain_queue();
        self.pending.len()
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            let queue = match self.queue.as_mut() {
                Some(queue) => queue,
                None => return Err(not_open(self.config.settings().name())),
            };
            // A closed queue means the port reached end of stream.
            match queue.recv().await {
                Some(chunk) => self.pending.extend_from_slice(&chunk),
                None => return Ok(0),
            }
        }

        let count = buf.len().min(self.pending.len());
        self.pending.copy_to_slice(&mut buf[..count]);
        Ok(count)
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => return Err(not_open(self.config.settings().name())),
        };
        writer.write_all(buf).await?;
        writer.flush().await
    }

    async fn clear(&mut self) -> Result<()> {
        self.drain_queue();
        self.pending.clear();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(pump) = self.stop_pump() {
            pump.abort();
        }
        self.writer = None;
        self.queue = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlink_core::config::PushPort;
    use std::sync::{Arc, Mutex};
    use tokio::io::{DuplexStream, duplex};

    /// Port handing out one end of an in-memory pipe.
    #[derive(Debug)]
    struct DuplexPort {
        end: Mutex<Option<DuplexStream>>,
    }

    impl DuplexPort {
        fn pair() -> (Arc<Self>, DuplexStream) {
            let (ours, theirs) = duplex(256);
            let port = Arc::new(Self {
                end: Mutex::new(Some(ours)),
            });
            (port, theirs)
        }
    }

    impl PushPort for DuplexPort {
        fn connect(&self) -> io::Result<(PortReader, PortWriter)> {
            let stream = self
                .end
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| io::Error::other("port already taken"))?;
            let (reader, writer) = tokio::io::split(stream);
            Ok((Box::pin(reader), Box::pin(writer)))
        }
    }

    async fn wait_for(transport: &mut QueuedTransport, count: usize) {
        while transport.available() < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_pushed_bytes_become_available() {
        let (port, mut device) = DuplexPort::pair();
        let mut transport = QueuedTransport::new(QueuedConfig::new(port)).unwrap();

        assert_eq!(transport.available(), 0);
        assert!(transport.open().await.unwrap());

        device.write_all(b"HELLO").await.unwrap();
        wait_for(&mut transport, 5).await;

        let mut buffer = [0u8; 3];
        assert_eq!(transport.read(&mut buffer).await.unwrap(), 3);
        assert_eq!(&buffer, b"HEL");
        assert_eq!(transport.available(), 2);

        transport.write(b"ACK").await.unwrap();
        let mut answer = [0u8; 3];
        device.read_exact(&mut answer).await.unwrap();
        assert_eq!(&answer, b"ACK");

        assert!(transport.close().await.unwrap());
        assert!(!transport.is_open());
        assert_eq!(transport.available(), 0);
    }

    #[tokio::test]
    async fn test_bounded_queue_keeps_every_byte() {
        let (port, mut device) = DuplexPort::pair();
        let config = QueuedConfig::new(port).with_queue_capacity(1);
        let mut transport = QueuedTransport::new(config).unwrap();
        transport.open().await.unwrap();

        let writer = tokio::spawn(async move {
            for round in 0u8..20 {
                device.write_all(&[round; 16]).await.unwrap();
            }
            device
        });

        let mut received = Vec::new();
        let mut buffer = [0u8; 64];
        while received.len() < 320 {
            let read = transport.read(&mut buffer).await.unwrap();
            received.extend_from_slice(&buffer[..read]);
        }
        let _device = writer.await.unwrap();

        let expected: Vec<u8> = (0u8..20).flat_map(|round| [round; 16]).collect();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_end_of_stream_reads_zero() {
        let (port, mut device) = DuplexPort::pair();
        let mut transport = QueuedTransport::new(QueuedConfig::new(port)).unwrap();
        transport.open().await.unwrap();

        device.write_all(b"BYE").await.unwrap();
        drop(device);

        let mut buffer = [0u8; 8];
        assert_eq!(transport.read(&mut buffer).await.unwrap(), 3);
        assert_eq!(transport.read(&mut buffer).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_discards_queued_input() {
        let (port, mut device) = DuplexPort::pair();
        let mut transport = QueuedTransport::new(QueuedConfig::new(port)).unwrap();
        transport.open().await.unwrap();

        device.write_all(b"stale").await.unwrap();
        wait_for(&mut transport, 5).await;
        transport.clear().await.unwrap();

        assert_eq!(transport.available(), 0);
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_transport_closed() {
        let (port, _device) = DuplexPort::pair();
        let mut transport = QueuedTransport::new(QueuedConfig::new(port)).unwrap();

        transport.open().await.unwrap();
        transport.close().await.unwrap();

        assert!(matches!(transport.open().await, Err(HardwareError::Io(_))));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_release_stops_pump() {
        let (port, _device) = DuplexPort::pair();
        let mut transport = QueuedTransport::new(QueuedConfig::new(port)).unwrap();
        transport.open().await.unwrap();

        transport.release();

        assert!(!transport.is_open());
        let error = transport.write(b"x").await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::NotConnected);
    }
}
