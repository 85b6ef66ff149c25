//! Transport capability traits.
//!
//! A transport is the thin adapter between the device stream and one platform
//! primitive (a serial port, a socket, a file...). It only moves bytes and
//! tracks whether it is open; retries, chunking and the port-control policy
//! belong to [`DeviceStream`](crate::DeviceStream).
//!
//! # Contract
//!
//! - [`open`](Transport::open) returns `Ok(false)` when the transport is already
//!   open instead of opening it twice; I/O failures are returned as errors.
//! - [`close`](Transport::close) returns `Ok(true)` when the transport was open
//!   and is now fully closed, `Ok(false)` when there was nothing to close.
//! - [`available`](Transport::available) never blocks and never fails; a closed
//!   or broken transport reports zero bytes.
//! - [`read`](Transport::read) and [`write`](Transport::write) report failures
//!   as [`std::io::Error`], which the device stream treats as transient.
//! - [`release`](Transport::release) drops every handle synchronously. It is
//!   the last call a transport receives and must not fail.
//!
//! # Static and Dynamic Dispatch
//!
//! [`Transport`] uses `impl Future` return types, so it is not object-safe.
//! Built-in transports are dispatched through the
//! [`AnyTransport`](crate::devices::AnyTransport) enum. Transports registered at
//! runtime are boxed as [`DynTransport`], which every [`Transport`] implements
//! automatically.

use crate::error::Result;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::io;

/// Byte-level capability set every backend provides.
///
/// # Examples
///
/// ```
/// use devlink_hardware::Transport;
/// use devlink_hardware::mock::LoopbackTransport;
///
/// #[tokio::main]
/// async fn main() -> devlink_hardware::Result<()> {
///     let (mut transport, _handle) = LoopbackTransport::new();
///
///     assert!(transport.open().await?);
///     assert!(!transport.open().await?);
///
///     transport.write(b"PING").await?;
///     assert_eq!(transport.available(), 4);
///
///     let mut buffer = [0u8; 8];
///     let read = transport.read(&mut buffer).await?;
///     assert_eq!(&buffer[..read], b"PING");
///
///     assert!(transport.close().await?);
///     Ok(())
/// }
/// ```
pub trait Transport: Send {
    /// Registry tag of this transport kind.
    fn tag(&self) -> &str;

    /// Whether the underlying handle is currently open.
    fn is_open(&self) -> bool;

    /// Open the underlying handle.
    fn open(&mut self) -> impl Future<Output = Result<bool>> + Send;

    /// Close the underlying handle.
    fn close(&mut self) -> impl Future<Output = Result<bool>> + Send;

    /// Number of bytes readable right now without blocking.
    fn available(&mut self) -> usize;

    /// Read up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Write all of `buf`.
    fn write(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Discard pending input.
    fn clear(&mut self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    /// Drop every handle without waiting.
    fn release(&mut self) {}
}

/// Object-safe form of [`Transport`].
pub trait DynTransport: fmt::Debug + Send {
    fn tag(&self) -> &str;

    fn is_open(&self) -> bool;

    fn open_boxed(&mut self) -> BoxFuture<'_, Result<bool>>;

    fn close_boxed(&mut self) -> BoxFuture<'_, Result<bool>>;

    fn available(&mut self) -> usize;

    fn read_boxed<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>>;

    fn write_boxed<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<()>>;

    fn clear_boxed(&mut self) -> BoxFuture<'_, Result<()>>;

    fn can_read(&self) -> bool;

    fn can_write(&self) -> bool;

    fn release(&mut self);
}

impl<T: Transport + fmt::Debug> DynTransport for T {
    fn tag(&self) -> &str {
        Transport::tag(self)
    }

    fn is_open(&self) -> bool {
        Transport::is_open(self)
    }

    fn open_boxed(&mut self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(Transport::open(self))
    }

    fn close_boxed(&mut self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(Transport::close(self))
    }

    fn available(&mut self) -> usize {
        Transport::available(self)
    }

    fn read_boxed<'a>(&'a mut self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(Transport::read(self, buf))
    }

    fn write_boxed<'a>(&'a mut self, buf: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(Transport::write(self, buf))
    }

    fn clear_boxed(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(Transport::clear(self))
    }

    fn can_read(&self) -> bool {
        Transport::can_read(self)
    }

    fn can_write(&self) -> bool {
        Transport::can_write(self)
    }

    fn release(&mut self) {
        Transport::release(self);
    }
}

impl Transport for Box<dyn DynTransport> {
    fn tag(&self) -> &str {
        (**self).tag()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    async fn open(&mut self) -> Result<bool> {
        (**self).open_boxed().await
    }

    async fn close(&mut self) -> Result<bool> {
        (**self).close_boxed().await
    }

    fn available(&mut self) -> usize {
        (**self).available()
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_boxed(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        (**self).write_boxed(buf).await
    }

    async fn clear(&mut self) -> Result<()> {
        (**self).clear_boxed().await
    }

    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_write(&self) -> bool {
        (**self).can_write()
    }

    fn release(&mut self) {
        (**self).release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::LoopbackTransport;

    #[tokio::test]
    async fn test_boxed_transport_delegates() {
        let (loopback, handle) = LoopbackTransport::new();
        let mut boxed: Box<dyn DynTransport> = Box::new(loopback);

        assert_eq!(Transport::tag(&boxed), "loopback");
        assert!(Transport::open(&mut boxed).await.unwrap());
        Transport::write(&mut boxed, b"abc").await.unwrap();
        assert_eq!(Transport::available(&mut boxed), 3);

        let mut buffer = [0u8; 3];
        assert_eq!(Transport::read(&mut boxed, &mut buffer).await.unwrap(), 3);
        assert_eq!(&buffer, b"abc");

        Transport::release(&mut boxed);
        assert!(!handle.is_open());
    }
}
