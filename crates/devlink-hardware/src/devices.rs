//! Enum wrapper for transport dispatch.
//!
//! [`Transport`] uses native `async fn` in traits, which is not object-safe, so
//! the device stream cannot hold a `Box<dyn Transport>`. [`AnyTransport`]
//! closes the set of built-in backends into one concrete type instead, and
//! keeps a boxed [`DynTransport`] variant for backends registered at runtime.
//! Hardware backends are only compiled in when their feature is enabled.
//!
//! # Examples
//!
//! ```
//! use devlink_hardware::devices::AnyTransport;
//! use devlink_hardware::mock::LoopbackTransport;
//! use devlink_hardware::Transport;
//!
//! #[tokio::main]
//! async fn main() -> devlink_hardware::Result<()> {
//!     let (loopback, _handle) = LoopbackTransport::new();
//!     let mut transport = AnyTransport::custom(loopback);
//!
//!     assert_eq!(Transport::tag(&transport), "loopback");
//!     assert!(Transport::open(&mut transport).await?);
//!     Ok(())
//! }
//! ```

use crate::error::Result;
use crate::mock::LoopbackTransport;
use crate::traits::{DynTransport, Transport};
#[cfg(feature = "hardware-hid")]
use crate::transports::HidTransport;
#[cfg(feature = "hardware-serial")]
use crate::transports::SerialTransport;
use crate::transports::{FileTransport, QueuedTransport, RawTransport, TcpTransport};
use std::fmt;
use std::io;

/// Any transport the registry can build.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTransport {
    #[cfg(feature = "hardware-serial")]
    Serial(SerialTransport),
    Tcp(TcpTransport),
    Raw(RawTransport),
    File(FileTransport),
    #[cfg(feature = "hardware-hid")]
    Hid(HidTransport),
    Queued(QueuedTransport),
    /// In-memory loopback for development and testing.
    Loopback(LoopbackTransport),
    /// Transport registered at runtime.
    Custom(Box<dyn DynTransport>),
}

impl AnyTransport {
    /// Box a transport that has no dedicated variant.
    pub fn custom<T>(transport: T) -> Self
    where
        T: Transport + fmt::Debug + 'static,
    {
        Self::Custom(Box::new(transport))
    }
}

macro_rules! dispatch {
    ($self:ident, $transport:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "hardware-serial")]
            AnyTransport::Serial($transport) => $call,
            AnyTransport::Tcp($transport) => $call,
            AnyTransport::Raw($transport) => $call,
            AnyTransport::File($transport) => $call,
            #[cfg(feature = "hardware-hid")]
            AnyTransport::Hid($transport) => $call,
            AnyTransport::Queued($transport) => $call,
            AnyTransport::Loopback($transport) => $call,
            AnyTransport::Custom($transport) => $call,
        }
    };
}

impl Transport for AnyTransport {
    fn tag(&self) -> &str {
        dispatch!(self, transport => Transport::tag(transport))
    }

    fn is_open(&self) -> bool {
        dispatch!(self, transport => Transport::is_open(transport))
    }

    async fn open(&mut self) -> Result<bool> {
        dispatch!(self, transport => Transport::open(transport).await)
    }

    async fn close(&mut self) -> Result<bool> {
        dispatch!(self, transport => Transport::close(transport).await)
    }

    fn available(&mut self) -> usize {
        dispatch!(self, transport => Transport::available(transport))
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        dispatch!(self, transport => Transport::read(transport, buf).await)
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        dispatch!(self, transport => Transport::write(transport, buf).await)
    }

    async fn clear(&mut self) -> Result<()> {
        dispatch!(self, transport => Transport::clear(transport).await)
    }

    fn can_read(&self) -> bool {
        dispatch!(self, transport => Transport::can_read(transport))
    }

    fn can_write(&self) -> bool {
        dispatch!(self, transport => Transport::can_write(transport))
    }

    fn release(&mut self) {
        dispatch!(self, transport => Transport::release(transport))
    }
}

#[cfg(feature = "hardware-serial")]
impl From<SerialTransport> for AnyTransport {
    fn from(transport: SerialTransport) -> Self {
        Self::Serial(transport)
    }
}

impl From<TcpTransport> for AnyTransport {
    fn from(transport: TcpTransport) -> Self {
        Self::Tcp(transport)
    }
}

impl From<RawTransport> for AnyTransport {
    fn from(transport: RawTransport) -> Self {
        Self::Raw(transport)
    }
}

impl From<FileTransport> for AnyTransport {
    fn from(transport: FileTransport) -> Self {
        Self::File(transport)
    }
}

#[cfg(feature = "hardware-hid")]
impl From<HidTransport> for AnyTransport {
    fn from(transport: HidTransport) -> Self {
        Self::Hid(transport)
    }
}

impl From<QueuedTransport> for AnyTransport {
    fn from(transport: QueuedTransport) -> Self {
        Self::Queued(transport)
    }
}

impl From<LoopbackTransport> for AnyTransport {
    fn from(transport: LoopbackTransport) -> Self {
        Self::Loopback(transport)
    }
}

impl From<Box<dyn DynTransport>> for AnyTransport {
    fn from(transport: Box<dyn DynTransport>) -> Self {
        Self::Custom(transport)
    }
}
