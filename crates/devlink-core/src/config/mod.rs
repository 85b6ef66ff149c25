//! Transport configurations.
//!
//! Each transport kind has its own configuration type holding the
//! [`DeviceSettings`] shared by all kinds plus its own parameters.
//! [`DeviceConfig`] is the closed set of built-in kinds, extended by
//! [`CustomConfig`] for transports registered at runtime. Every variant reports
//! a stable string tag that the transport registry dispatches on.
//!
//! # JSON Layout
//!
//! ```
//! use devlink_core::DeviceConfig;
//!
//! let config = DeviceConfig::from_json(r#"{
//!     "transport": "tcp",
//!     "host": "192.168.0.50",
//!     "port": 9100,
//!     "settings": { "name": "Kitchen printer", "port_control": false }
//! }"#).unwrap();
//!
//! assert_eq!(config.tag(), "tcp");
//! assert_eq!(config.settings().name(), "Kitchen printer");
//! assert!(!config.settings().port_control());
//! ```

mod file;
mod printer;
mod queued;
mod serial;
mod tcp;
mod usb;

pub use file::FileConfig;
pub use printer::{PRINTER_PLACEHOLDER, RawConfig, SpoolCommand};
pub use queued::{PortReader, PortWriter, PushPort, QueuedConfig};
pub use serial::{DataBits, FlowControl, Parity, SerialConfig, StopBits, is_serial_port};
pub use tcp::TcpConfig;
pub use usb::HidConfig;

use crate::constants::{
    PORT_PREFIX_FILE, PORT_PREFIX_RAW, PORT_PREFIX_TCP, TAG_FILE, TAG_HID, TAG_QUEUED, TAG_RAW,
    TAG_SERIAL, TAG_TCP,
};
use crate::{DeviceSettings, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Configuration of a transport kind that is not built in.
///
/// `tag` selects the registration; `params` is handed to the registered
/// constructor untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomConfig {
    pub tag: String,
    #[serde(default = "custom_settings")]
    pub settings: DeviceSettings,
    #[serde(default)]
    pub params: serde_json::Value,
}

fn custom_settings() -> DeviceSettings {
    DeviceSettings::new("Custom")
}

impl CustomConfig {
    pub fn new(tag: impl Into<String>, params: serde_json::Value) -> Self {
        let tag = tag.into();
        Self {
            settings: DeviceSettings::new(tag.clone()),
            tag,
            params,
        }
    }
}

/// Configuration for any transport kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum DeviceConfig {
    Serial(SerialConfig),
    Tcp(TcpConfig),
    Raw(RawConfig),
    File(FileConfig),
    Hid(HidConfig),
    Queued(QueuedConfig),
    Custom(CustomConfig),
}

impl DeviceConfig {
    /// Registry tag of this configuration.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Serial(_) => TAG_SERIAL,
            Self::Tcp(_) => TAG_TCP,
            Self::Raw(_) => TAG_RAW,
            Self::File(_) => TAG_FILE,
            Self::Hid(_) => TAG_HID,
            Self::Queued(_) => TAG_QUEUED,
            Self::Custom(config) => &config.tag,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &DeviceSettings {
        match self {
            Self::Serial(config) => config.settings(),
            Self::Tcp(config) => config.settings(),
            Self::Raw(config) => config.settings(),
            Self::File(config) => config.settings(),
            Self::Hid(config) => config.settings(),
            Self::Queued(config) => config.settings(),
            Self::Custom(config) => &config.settings,
        }
    }

    pub fn settings_mut(&mut self) -> &mut DeviceSettings {
        match self {
            Self::Serial(config) => config.settings_mut(),
            Self::Tcp(config) => config.settings_mut(),
            Self::Raw(config) => config.settings_mut(),
            Self::File(config) => config.settings_mut(),
            Self::Hid(config) => config.settings_mut(),
            Self::Queued(config) => config.settings_mut(),
            Self::Custom(config) => &mut config.settings,
        }
    }

    /// Check the preconditions of the transport-specific fields.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found. Custom configurations
    /// are validated by their registered constructor instead.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Serial(config) => config.validate(),
            Self::Tcp(config) => config.validate(),
            Self::Raw(config) => config.validate(),
            Self::File(config) => config.validate(),
            Self::Hid(config) => config.validate(),
            Self::Queued(config) => config.validate(),
            Self::Custom(config) if config.tag.trim().is_empty() => {
                Err(Error::missing_field("tag"))
            }
            Self::Custom(_) => Ok(()),
        }
    }

    /// Build a configuration from a port string.
    ///
    /// Accepted forms (prefixes are case-insensitive):
    ///
    /// | Port                | Transport |
    /// |---------------------|-----------|
    /// | `COM3`, `LPT1`      | serial    |
    /// | `/dev/ttyUSB0`      | serial    |
    /// | `TCP:host:port`     | tcp       |
    /// | `RAW:printer name`  | raw       |
    /// | `FILE:/path/to/out` | file      |
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] for unknown prefixes or a malformed
    /// `TCP:` address.
    ///
    /// # Examples
    ///
    /// ```
    /// use devlink_core::DeviceConfig;
    ///
    /// let config = DeviceConfig::from_port("tcp:10.0.0.7:9100").unwrap();
    /// assert_eq!(config.tag(), "tcp");
    ///
    /// let config = DeviceConfig::from_port("COM4").unwrap();
    /// assert_eq!(config.tag(), "serial");
    ///
    /// assert!(DeviceConfig::from_port("USB:1").is_err());
    /// ```
    pub fn from_port(port: &str) -> Result<Self> {
        if is_serial_port(port) {
            return Ok(Self::Serial(SerialConfig::new(port, crate::constants::DEFAULT_BAUD_RATE)?));
        }

        if let Some(address) = strip_prefix_ignore_case(port, PORT_PREFIX_TCP) {
            let (host, port_number) = address
                .rsplit_once(':')
                .ok_or_else(|| Error::InvalidPort(port.to_string()))?;
            let port_number: u16 = port_number
                .parse()
                .map_err(|_| Error::InvalidPort(port.to_string()))?;
            return Ok(Self::Tcp(TcpConfig::new(host, port_number)));
        }

        if let Some(printer) = strip_prefix_ignore_case(port, PORT_PREFIX_RAW) {
            return Ok(Self::Raw(RawConfig::new(printer)));
        }

        if let Some(path) = strip_prefix_ignore_case(port, PORT_PREFIX_FILE) {
            return Ok(Self::File(FileConfig::new(path)));
        }

        Err(Error::InvalidPort(port.to_string()))
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the document does not describe a configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Json`]
    /// if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading device configuration from {}", path.display());

        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;

        debug!(
            transport = config.tag(),
            device = config.settings().name(),
            "Device configuration loaded"
        );
        Ok(config)
    }
}

impl From<SerialConfig> for DeviceConfig {
    fn from(config: SerialConfig) -> Self {
        Self::Serial(config)
    }
}

impl From<TcpConfig> for DeviceConfig {
    fn from(config: TcpConfig) -> Self {
        Self::Tcp(config)
    }
}

impl From<RawConfig> for DeviceConfig {
    fn from(config: RawConfig) -> Self {
        Self::Raw(config)
    }
}

impl From<FileConfig> for DeviceConfig {
    fn from(config: FileConfig) -> Self {
        Self::File(config)
    }
}

impl From<HidConfig> for DeviceConfig {
    fn from(config: HidConfig) -> Self {
        Self::Hid(config)
    }
}

impl From<QueuedConfig> for DeviceConfig {
    fn from(config: QueuedConfig) -> Self {
        Self::Queued(config)
    }
}

impl From<CustomConfig> for DeviceConfig {
    fn from(config: CustomConfig) -> Self {
        Self::Custom(config)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}
