//! Core types for the devlink device stream layer.
//!
//! This crate holds everything that does not touch a port: the
//! [`DeviceSettings`] knobs shared by every transport, the per-transport
//! configurations gathered in [`DeviceConfig`], the [`ByteArrayBuilder`] used
//! to accumulate reads, and the crate-wide [`Error`] type.
//!
//! The transports themselves and the retrying device stream live in
//! `devlink-hardware`.

pub mod buffer;
pub mod config;
pub mod constants;
pub mod error;
pub mod settings;

pub use buffer::ByteArrayBuilder;
pub use config::{CustomConfig, DeviceConfig};
pub use error::{Error, Result};
pub use settings::{ChangeNotifier, ChangePhase, ConfigEvent, DeviceSettings};

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
