//! Reliable byte streams over POS and fiscal peripherals.
//!
//! Receipt printers, fiscal printers, scales and displays hang off very
//! different ports: RS-232 and USB-serial adapters, raw TCP sockets, USB HID,
//! operating system print spoolers, or a plain file when nothing is attached.
//! Device drivers above this crate only want to write command bytes and read
//! the answer. This crate gives them a single contract for that.
//!
//! # Layers
//!
//! - [`Transport`] is the thin adapter over one platform primitive. It opens,
//!   closes, reports how many bytes are readable and moves bytes. Built-in
//!   backends live in [`transports`].
//! - [`DeviceStream`] owns a transport and a [`DeviceSettings`] snapshot and
//!   adds the port-control policy, chunked writes, draining reads, retries
//!   with reopen, and idempotent disposal.
//! - [`TransportRegistry`] maps configuration tags and port prefixes to
//!   transport constructors, so a [`DeviceConfig`] or a port string such as
//!   `TCP:10.0.0.7:9100` becomes a ready stream.
//!
//! # Example
//!
//! ```no_run
//! use devlink_core::DeviceConfig;
//! use devlink_hardware::TransportRegistry;
//!
//! #[tokio::main]
//! async fn main() -> devlink_hardware::Result<()> {
//!     let registry = TransportRegistry::new();
//!     let mut printer = registry.create_for_port("TCP:192.168.0.50:9100")?;
//!
//!     printer.write(b"\x1b@Hello\n").await?;
//!     printer.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `hardware-serial` (default): serial ports through `serialport`.
//! - `hardware-hid`: USB HID devices through `hidapi`.
//!
//! # Testing Without Hardware
//!
//! The [`mock`] module carries in-memory transports (loopback, scripted
//! failures, paced arrival) with shared handles for inspecting what the
//! stream did.
//!
//! [`DeviceSettings`]: devlink_core::DeviceSettings
//! [`DeviceConfig`]: devlink_core::DeviceConfig

pub mod devices;
pub mod error;
pub mod mock;
pub mod registry;
pub mod stream;
pub mod traits;
pub mod transports;

pub use devices::AnyTransport;
pub use error::{HardwareError, Result};
pub use registry::{TransportFactory, TransportRegistry};
pub use stream::DeviceStream;
pub use traits::{DynTransport, Transport};
