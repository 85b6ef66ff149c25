//! Device stream: one transport, one set of settings, one reliable contract.
//!
//! [`DeviceStream`] wraps a [`Transport`] and applies everything the
//! transport itself does not do:
//!
//! - the port-control policy (open and close around every operation, or keep
//!   the transport open between explicit [`open`](DeviceStream::open) and
//!   [`close`](DeviceStream::close) calls)
//! - chunked writes bounded by the write buffer size
//! - drain-while-available reads bounded by the read buffer size
//! - retry with a forced close and reopen between attempts
//! - idempotent disposal
//!
//! # Port Control
//!
//! With `port_control` enabled (automatic mode), [`write`](DeviceStream::write),
//! [`read`](DeviceStream::read) and [`write_read`](DeviceStream::write_read)
//! each open the transport, run, and close it again, on the error path too.
//! The bracket wraps the whole operation: a multi-chunk write or a write-read
//! round trip never closes the transport in the middle, except for a retry.
//!
//! With `port_control` disabled (persistent mode), the transport stays open
//! from [`open`](DeviceStream::open) until [`close`](DeviceStream::close) or
//! [`dispose`](DeviceStream::dispose).
//!
//! # Retries
//!
//! Each operation phase keeps one failure counter. After a transport I/O error
//! the counter is incremented; once it reaches `retries` the error is returned
//! as [`HardwareError::RetriesExhausted`]. Otherwise the stream sleeps for
//! `retry_interval`, closes and reopens the transport, and retries the same
//! chunk. An operation therefore makes at most `retries` failing attempts and
//! waits `retries - 1` times. Bytes already written are never sent again.
//!
//! # Examples
//!
//! ```
//! use devlink_core::DeviceSettings;
//! use devlink_hardware::DeviceStream;
//! use devlink_hardware::mock::LoopbackTransport;
//!
//! #[tokio::main]
//! async fn main() -> devlink_hardware::Result<()> {
//!     let (transport, _handle) = LoopbackTransport::new();
//!     let settings = DeviceSettings::new("Scale").with_port_control(false);
//!     let mut stream = DeviceStream::new(settings, transport);
//!
//!     stream.open().await?;
//!     let echo = stream.write_read(b"\x05").await?;
//!     assert_eq!(echo, b"\x05");
//!
//!     stream.close().await?;
//!     assert!(!stream.is_connected());
//!     Ok(())
//! }
//! ```

use crate::devices::AnyTransport;
use crate::error::{HardwareError, Result};
use crate::traits::Transport;
use devlink_core::constants::DEFAULT_WRITE_READ_DELAY_MS;
use devlink_core::{ByteArrayBuilder, DeviceSettings};
use std::io;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Reliable read/write contract over a single transport.
///
/// A stream is not meant to be shared: every operation takes `&mut self`, so
/// callers serialize access to a device by owning its stream.
#[derive(Debug)]
pub struct DeviceStream<T: Transport = AnyTransport> {
    settings: DeviceSettings,
    transport: T,
    connected: bool,
    disposed: bool,
}

impl<T: Transport> DeviceStream<T> {
    /// Create a disconnected stream.
    pub fn new(settings: DeviceSettings, transport: T) -> Self {
        debug!(
            device = settings.name(),
            transport = transport.tag(),
            "Creating device stream"
        );

        Self {
            settings,
            transport,
            connected: false,
            disposed: false,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    /// Adjust the settings used by the next operation.
    ///
    /// Changes are not re-applied to a transport that is already open.
    pub fn settings_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether the last [`open`](Self::open) proved the device reachable and no
    /// [`close`](Self::close) has happened since.
    ///
    /// In automatic mode the transport itself is closed again right after the
    /// check; see [`is_port_open`](Self::is_port_open) for the handle state.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether the transport handle is open right now.
    #[must_use]
    pub fn is_port_open(&self) -> bool {
        self.transport.is_open()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn can_read(&self) -> bool {
        self.transport.can_read()
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.transport.can_write()
    }

    /// Open the device.
    ///
    /// In automatic mode the transport is opened and immediately closed again,
    /// which proves the device is reachable. In persistent mode it stays open.
    ///
    /// # Errors
    ///
    /// Returns configuration errors and transport open failures unchanged.
    pub async fn open(&mut self) -> Result<()> {
        self.ensure_live()?;
        info!(
            device = self.settings.name(),
            transport = self.transport.tag(),
            port_control = self.settings.port_control(),
            "Open"
        );

        let opened = self.transport.open().await?;
        self.connected = opened || self.transport.is_open();

        if self.settings.port_control() && self.connected {
            self.transport.close().await?;
        }
        Ok(())
    }

    /// Close the device.
    ///
    /// In automatic mode this only clears the connected flag, the transport is
    /// already closed between operations.
    ///
    /// # Errors
    ///
    /// Returns the transport close error, if any.
    pub async fn close(&mut self) -> Result<()> {
        self.ensure_live()?;
        info!(
            device = self.settings.name(),
            transport = self.transport.tag(),
            "Close"
        );

        if self.settings.port_control() && !self.transport.is_open() {
            self.connected = false;
            return Ok(());
        }

        let closed = self.transport.close().await?;
        if closed || !self.transport.is_open() {
            self.connected = false;
        }
        Ok(())
    }

    /// Discard input the device sent but nobody read.
    ///
    /// # Errors
    ///
    /// Returns the transport error, if any.
    pub async fn clear(&mut self) -> Result<()> {
        self.ensure_live()?;
        debug!(device = self.settings.name(), "Clearing pending input");
        self.transport.clear().await
    }

    /// Send all of `data`, in chunks of at most `write_buffer_size` bytes.
    ///
    /// Writing an empty slice does nothing, not even an open/close cycle.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::RetriesExhausted`] when a chunk keeps failing,
    /// [`HardwareError::NotOpen`] in persistent mode before [`open`](Self::open),
    /// or the first fatal error.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.ensure_live()?;

        self.begin().await?;
        let result = self.send(data).await;
        self.finish(result).await
    }

    /// Drain every byte available right now.
    ///
    /// The drain stops as soon as the transport reports nothing available, so
    /// a response that arrives in several bursts may be returned partially.
    ///
    /// In automatic mode the transport is opened to ask what is available and
    /// closed afterwards, so a read with nothing pending still costs one
    /// open/close cycle. In persistent mode such a read touches nothing.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::RetriesExhausted`] when reads keep failing,
    /// [`HardwareError::NotOpen`] in persistent mode before [`open`](Self::open),
    /// or the first fatal error.
    pub async fn read(&mut self) -> Result<Vec<u8>> {
        self.ensure_live()?;

        self.begin().await?;
        let result = self.drain().await;
        self.finish(result).await
    }

    /// Write `data`, wait the default turnaround delay, then read the answer.
    ///
    /// # Errors
    ///
    /// See [`write_read_with_delay`](Self::write_read_with_delay).
    pub async fn write_read(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.write_read_with_delay(data, Duration::from_millis(DEFAULT_WRITE_READ_DELAY_MS))
            .await
    }

    /// Write `data`, wait `delay`, then read the answer, without closing the
    /// transport in between.
    ///
    /// An empty request returns an empty answer without touching the transport.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::RetriesExhausted`] when either phase keeps
    /// failing, [`HardwareError::NotOpen`] in persistent mode before
    /// [`open`](Self::open), or the first fatal error.
    pub async fn write_read_with_delay(&mut self, data: &[u8], delay: Duration) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_live()?;

        self.begin().await?;
        let result = match self.send(data).await {
            Ok(()) => {
                tokio::time::sleep(delay).await;
                self.drain().await
            }
            Err(err) => Err(err),
        };
        self.finish(result).await
    }

    /// Close the transport and drop its handles.
    ///
    /// Safe to call more than once. Close failures are logged and swallowed so
    /// disposal always completes.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if self.transport.is_open()
            && let Err(err) = self.transport.close().await
        {
            debug!(device = self.settings.name(), error = %err, "Dispose issue closing transport");
        }
        self.transport.release();
        self.connected = false;

        debug!(device = self.settings.name(), "Device stream disposed");
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(HardwareError::disposed(self.settings.name()));
        }
        Ok(())
    }

    /// Open the transport for one operation in automatic mode. In persistent
    /// mode the stream must already be open.
    async fn begin(&mut self) -> Result<()> {
        if self.settings.port_control() {
            self.transport.open().await?;
        } else if !self.connected {
            return Err(HardwareError::not_open(self.settings.name()));
        }
        Ok(())
    }

    /// Close the transport after one operation in automatic mode.
    ///
    /// A close failure is reported only when the operation itself succeeded.
    /// A failed operation leaves the stream disconnected.
    async fn finish<R>(&mut self, result: Result<R>) -> Result<R> {
        if !self.settings.port_control() {
            return result;
        }
        if result.is_err() {
            self.connected = false;
        }

        match (result, self.transport.close().await) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(close_err)) => {
                debug!(
                    device = self.settings.name(),
                    error = %close_err,
                    "Close failed after an operation error"
                );
                Err(err)
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let chunk_size = self.settings.write_buffer_size();
        let mut failures = 0;

        for chunk in data.chunks(chunk_size) {
            loop {
                match self.transport.write(chunk).await {
                    Ok(()) => break,
                    Err(err) => {
                        failures += 1;
                        self.recover("write", failures, err).await?;
                    }
                }
            }
            trace!(device = self.settings.name(), bytes = chunk.len(), "Chunk written");
        }

        debug!(device = self.settings.name(), bytes = data.len(), "Write complete");
        Ok(())
    }

    async fn drain(&mut self) -> Result<Vec<u8>> {
        let mut received = ByteArrayBuilder::new();
        let mut buffer = vec![0u8; self.settings.read_buffer_size()];
        let mut failures = 0;

        loop {
            let available = self.transport.available();
            if available == 0 {
                break;
            }

            let wanted = available.min(buffer.len());
            match self.transport.read(&mut buffer[..wanted]).await {
                Ok(0) => tokio::task::yield_now().await,
                Ok(read) => {
                    received.append_slice(&buffer[..read]);
                }
                Err(err) => {
                    failures += 1;
                    self.recover("read", failures, err).await?;
                }
            }
        }

        debug!(device = self.settings.name(), bytes = received.len(), "Read complete");
        Ok(received.to_vec())
    }

    /// Handle one failed attempt: give up, or wait and reopen the transport.
    async fn recover(&mut self, operation: &'static str, failures: u32, err: io::Error) -> Result<()> {
        error!(
            device = self.settings.name(),
            operation,
            attempt = failures,
            error = %err,
            "Device I/O attempt failed"
        );

        if failures >= self.settings.retries() {
            return Err(HardwareError::RetriesExhausted {
                operation,
                attempts: failures,
                source: err,
            });
        }

        tokio::time::sleep(self.settings.retry_interval()).await;
        self.reopen().await
    }

    /// Force a close and reopen. I/O failures are left for the next attempt
    /// to run into; fatal errors abort the operation.
    async fn reopen(&mut self) -> Result<()> {
        debug!(device = self.settings.name(), "Reopening transport");

        if let Err(err) = self.transport.close().await {
            if err.is_fatal() {
                return Err(err);
            }
            warn!(device = self.settings.name(), error = %err, "Close failed during reopen");
        }

        if let Err(err) = self.transport.open().await {
            if err.is_fatal() {
                return Err(err);
            }
            warn!(device = self.settings.name(), error = %err, "Reopen failed");
        }
        Ok(())
    }
}

impl<T: Transport> Drop for DeviceStream<T> {
    fn drop(&mut self) {
        if !self.disposed {
            self.transport.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FlakyTransport, LoopbackTransport};

    fn automatic() -> DeviceSettings {
        DeviceSettings::new("Test").with_retry_interval_ms(100)
    }

    fn persistent() -> DeviceSettings {
        automatic().with_port_control(false)
    }

    #[tokio::test]
    async fn test_open_in_automatic_mode_closes_again() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(automatic(), transport);

        stream.open().await.unwrap();

        assert!(stream.is_connected());
        assert!(!stream.is_port_open());
        assert_eq!((handle.opens(), handle.closes()), (1, 1));

        stream.close().await.unwrap();
        assert!(!stream.is_connected());
        assert_eq!(handle.closes(), 1);
    }

    #[tokio::test]
    async fn test_open_in_persistent_mode_stays_open() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(persistent(), transport);

        stream.open().await.unwrap();
        stream.open().await.unwrap();
        assert!(stream.is_connected());
        assert!(stream.is_port_open());
        assert_eq!(handle.opens(), 1);

        stream.close().await.unwrap();
        assert!(!stream.is_connected());
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_write_brackets_whole_operation() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(automatic().with_write_buffer_size(3), transport);

        stream.write(b"0123456789").await.unwrap();

        assert_eq!(handle.chunk_sizes(), vec![3, 3, 3, 1]);
        assert_eq!((handle.opens(), handle.closes()), (1, 1));
    }

    #[tokio::test]
    async fn test_empty_write_is_a_noop() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(automatic(), transport);

        stream.write(&[]).await.unwrap();
        assert!(stream.write_read(&[]).await.unwrap().is_empty());

        assert_eq!(handle.opens(), 0);
        assert_eq!(handle.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_read_limits_each_call_to_buffer_size() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(persistent().with_read_buffer_size(4), transport);
        stream.open().await.unwrap();
        handle.push_incoming(b"0123456789");

        assert_eq!(stream.read().await.unwrap(), b"0123456789");
        assert_eq!(handle.read_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_retry_reopens_once() {
        let (transport, handle) = FlakyTransport::failing_writes(1);
        let mut stream = DeviceStream::new(persistent(), transport);
        stream.open().await.unwrap();

        stream.write(b"abc").await.unwrap();
        assert_eq!(handle.write_calls(), 2);
        assert_eq!(handle.opens(), 2);
        assert_eq!(handle.closes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_operations_require_open() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(persistent(), transport);
        let started = tokio::time::Instant::now();

        assert!(matches!(
            stream.write(b"abc").await,
            Err(HardwareError::NotOpen { .. })
        ));
        assert!(matches!(
            stream.read().await,
            Err(HardwareError::NotOpen { .. })
        ));
        assert!(matches!(
            stream.write_read(b"abc").await,
            Err(HardwareError::NotOpen { .. })
        ));

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(handle.opens(), 0);
        assert_eq!(handle.write_calls(), 0);
        assert!(!stream.is_connected());
        assert!(!stream.is_port_open());
    }

    #[tokio::test]
    async fn test_persistent_operations_fail_after_close() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(persistent(), transport);
        stream.open().await.unwrap();
        stream.close().await.unwrap();

        assert!(matches!(
            stream.write(b"abc").await,
            Err(HardwareError::NotOpen { .. })
        ));
        assert_eq!(handle.opens(), 1);
        assert!(handle.written().is_empty());
    }

    #[tokio::test]
    async fn test_operations_after_dispose_fail() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(persistent(), transport);
        stream.open().await.unwrap();

        stream.dispose().await;
        stream.dispose().await;

        assert!(stream.is_disposed());
        assert_eq!(handle.releases(), 1);
        assert!(matches!(
            stream.write(b"x").await,
            Err(HardwareError::Disposed { .. })
        ));
    }

    #[tokio::test]
    async fn test_drop_releases_transport() {
        let (transport, handle) = LoopbackTransport::new();
        let mut stream = DeviceStream::new(persistent(), transport);
        stream.open().await.unwrap();

        drop(stream);

        assert!(!handle.is_open());
        assert_eq!(handle.releases(), 1);
    }
}
