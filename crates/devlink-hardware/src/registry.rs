//! Transport registry.
//!
//! The registry maps string tags to transport constructors and builds
//! [`DeviceStream`]s from configurations. Tags form a dotted hierarchy: a
//! configuration tagged `tcp.kitchen` is served by a `tcp.kitchen`
//! registration when there is one and falls back to the closest registered
//! ancestor (`tcp`) otherwise.
//!
//! A second table maps port prefixes (`TCP:`, `RAW:`, ...) to tags so that a
//! plain port string such as `TCP:10.0.0.7:9100` can be turned into a
//! configuration.
//!
//! # Examples
//!
//! ```
//! use devlink_core::DeviceConfig;
//! use devlink_hardware::{AnyTransport, TransportRegistry};
//! use devlink_hardware::mock::LoopbackTransport;
//!
//! let mut registry = TransportRegistry::new();
//! registry
//!     .register("loopback", |_config: &DeviceConfig| {
//!         Ok(AnyTransport::from(LoopbackTransport::new().0))
//!     })
//!     .unwrap();
//!
//! assert!(registry.register("loopback", |_config: &DeviceConfig| {
//!     Ok(AnyTransport::from(LoopbackTransport::new().0))
//! }).is_err());
//!
//! let config = DeviceConfig::from_port("TCP:127.0.0.1:9100").unwrap();
//! let stream = registry.create(&config).unwrap();
//! assert!(!stream.is_connected());
//! ```

use crate::devices::AnyTransport;
use crate::error::{HardwareError, Result};
use crate::stream::DeviceStream;
#[cfg(feature = "hardware-hid")]
use crate::transports::HidTransport;
#[cfg(feature = "hardware-serial")]
use crate::transports::SerialTransport;
use crate::transports::{FileTransport, QueuedTransport, RawTransport, TcpTransport};
use devlink_core::config::{
    CustomConfig, FileConfig, RawConfig, TcpConfig, is_serial_port,
};
use devlink_core::constants::{
    PORT_PREFIX_FILE, PORT_PREFIX_RAW, PORT_PREFIX_TCP, TAG_FILE, TAG_QUEUED, TAG_RAW, TAG_SEPARATOR,
    TAG_TCP,
};
use devlink_core::{DeviceConfig, DeviceSettings};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Constructor building a transport from its configuration.
pub type TransportFactory = Arc<dyn Fn(&DeviceConfig) -> Result<AnyTransport> + Send + Sync>;

/// Tag-keyed table of transport constructors.
///
/// [`TransportRegistry::new`] comes with every built-in transport registered;
/// [`TransportRegistry::empty`] starts blank.
#[derive(Clone)]
pub struct TransportRegistry {
    factories: HashMap<String, TransportFactory>,
    prefixes: Vec<(String, String)>,
}

impl Default for TransportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("tags", &self.tags())
            .field("prefixes", &self.prefixes)
            .finish()
    }
}

impl TransportRegistry {
    /// Registry with no transport registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
            prefixes: Vec::new(),
        }
    }

    /// Registry with the built-in transports and port prefixes.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();

        #[cfg(feature = "hardware-serial")]
        registry.insert(devlink_core::constants::TAG_SERIAL, Arc::new(serial_factory));
        registry.insert(TAG_TCP, Arc::new(tcp_factory));
        registry.insert(TAG_RAW, Arc::new(raw_factory));
        registry.insert(TAG_FILE, Arc::new(file_factory));
        #[cfg(feature = "hardware-hid")]
        registry.insert(devlink_core::constants::TAG_HID, Arc::new(hid_factory));
        registry.insert(TAG_QUEUED, Arc::new(queued_factory));

        for (prefix, tag) in [
            (PORT_PREFIX_TCP, TAG_TCP),
            (PORT_PREFIX_RAW, TAG_RAW),
            (PORT_PREFIX_FILE, TAG_FILE),
        ] {
            registry.prefixes.push((prefix.to_string(), tag.to_string()));
        }

        registry
    }

    fn insert(&mut self, tag: &str, factory: TransportFactory) {
        self.factories.insert(tag.to_string(), factory);
    }

    /// Register a constructor under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::DuplicateRegistration`] when `tag` is already
    /// registered, and a configuration error for an empty tag.
    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&DeviceConfig) -> Result<AnyTransport> + Send + Sync + 'static,
    {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(HardwareError::configuration("transport tag cannot be empty"));
        }
        if self.factories.contains_key(&tag) {
            return Err(HardwareError::duplicate(tag));
        }

        debug!(tag, "Registering transport");
        self.factories.insert(tag, Arc::new(factory));
        Ok(())
    }

    /// Remove a registration, returning whether it existed.
    pub fn unregister(&mut self, tag: &str) -> bool {
        self.factories.remove(tag).is_some()
    }

    /// Whether `tag` itself is registered. Ancestors are not considered.
    #[must_use]
    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags, sorted.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Find the registration serving `tag`: the tag itself, otherwise the
    /// closest registered ancestor.
    ///
    /// Returns the tag that matched together with its constructor.
    #[must_use]
    pub fn resolve(&self, tag: &str) -> Option<(&str, &TransportFactory)> {
        lineage(tag).find_map(|candidate| {
            self.factories
                .get_key_value(candidate)
                .map(|(matched, factory)| (matched.as_str(), factory))
        })
    }

    /// Build the transport for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::TransportNotFound`] when neither the tag nor
    /// any of its ancestors is registered, and whatever the constructor
    /// returns otherwise.
    pub fn create_transport(&self, config: &DeviceConfig) -> Result<AnyTransport> {
        config.validate()?;

        let tag = config.tag();
        let (matched, factory) = self
            .resolve(tag)
            .ok_or_else(|| HardwareError::not_found(tag))?;
        if matched != tag {
            debug!(tag, ancestor = matched, "Transport resolved through ancestor tag");
        }

        factory(config)
    }

    /// Build a device stream for `config`.
    ///
    /// The stream receives its own copy of the configuration's settings.
    ///
    /// # Errors
    ///
    /// See [`create_transport`](Self::create_transport).
    pub fn create(&self, config: &DeviceConfig) -> Result<DeviceStream> {
        let transport = self.create_transport(config)?;
        Ok(DeviceStream::new(config.settings().clone(), transport))
    }

    /// Map a port prefix to a registered tag.
    ///
    /// Prefixes are matched case-insensitively; the longest matching prefix
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::DuplicateRegistration`] when the prefix is
    /// already mapped and a configuration error when it is empty.
    pub fn register_prefix(&mut self, prefix: &str, tag: impl Into<String>) -> Result<()> {
        let prefix = prefix.trim().to_uppercase();
        if prefix.is_empty() {
            return Err(HardwareError::configuration("port prefix cannot be empty"));
        }
        if self.prefixes.iter().any(|(known, _)| *known == prefix) {
            return Err(HardwareError::duplicate(prefix));
        }

        let tag = tag.into();
        debug!(prefix, tag, "Registering port prefix");
        self.prefixes.push((prefix, tag));
        Ok(())
    }

    /// Tag serving a port string, if one of the registered prefixes matches.
    #[must_use]
    pub fn resolve_port(&self, port: &str) -> Option<&str> {
        let upper = port.trim().to_uppercase();
        self.prefixes
            .iter()
            .filter(|(prefix, _)| upper.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, tag)| tag.as_str())
    }

    /// Whether a port string names a serial device or a registered prefix.
    #[must_use]
    pub fn is_valid_port(&self, port: &str) -> bool {
        is_serial_port(port) || self.resolve_port(port).is_some()
    }

    /// Build a configuration for a port string.
    ///
    /// Built-in prefixes produce their typed configuration. Prefixes mapped
    /// to other tags produce a [`CustomConfig`] whose parameters carry the
    /// full port string under `"port"`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-port error when nothing matches the port.
    pub fn config_for_port(&self, port: &str) -> Result<DeviceConfig> {
        let port = port.trim();
        match self.resolve_port(port) {
            Some(tag) if [TAG_TCP, TAG_RAW, TAG_FILE].contains(&tag) => {
                Ok(DeviceConfig::from_port(port)?)
            }
            Some(tag) => {
                trace!(port, tag, "Port mapped to custom transport");
                let mut config = CustomConfig::new(tag, serde_json::json!({ "port": port }));
                config.settings = DeviceSettings::new(port);
                Ok(DeviceConfig::Custom(config))
            }
            None => Ok(DeviceConfig::from_port(port)?),
        }
    }

    /// Build a device stream straight from a port string.
    ///
    /// # Errors
    ///
    /// See [`config_for_port`](Self::config_for_port) and
    /// [`create_transport`](Self::create_transport).
    pub fn create_for_port(&self, port: &str) -> Result<DeviceStream> {
        let config = self.config_for_port(port)?;
        self.create(&config)
    }
}

/// `tcp.kitchen.left`, `tcp.kitchen`, `tcp`.
fn lineage(tag: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(Some(tag), |tag| {
        tag.rsplit_once(TAG_SEPARATOR).map(|(parent, _)| parent)
    })
}

/// Read a built-in configuration out of a custom one.
fn from_custom<C: DeserializeOwned>(
    custom: &CustomConfig,
    settings: impl FnOnce(&mut C) -> &mut DeviceSettings,
) -> Result<C> {
    let mut config: C = serde_json::from_value(custom.params.clone()).map_err(|err| {
        HardwareError::configuration(format!("invalid parameters for `{}`: {err}", custom.tag))
    })?;
    *settings(&mut config) = custom.settings.clone();
    Ok(config)
}

fn mismatch(expected: &str, config: &DeviceConfig) -> HardwareError {
    HardwareError::configuration(format!(
        "`{expected}` transport cannot be built from a `{}` configuration",
        config.tag()
    ))
}

#[cfg(feature = "hardware-serial")]
fn serial_factory(config: &DeviceConfig) -> Result<AnyTransport> {
    let config = match config {
        DeviceConfig::Serial(serial) => serial.clone(),
        DeviceConfig::Custom(custom) => {
            from_custom(custom, devlink_core::config::SerialConfig::settings_mut)?
        }
        other => return Err(mismatch(devlink_core::constants::TAG_SERIAL, other)),
    };
    Ok(SerialTransport::new(config)?.into())
}

fn tcp_factory(config: &DeviceConfig) -> Result<AnyTransport> {
    let config = match config {
        DeviceConfig::Tcp(tcp) => tcp.clone(),
        DeviceConfig::Custom(custom) => {
            from_custom(custom, TcpConfig::settings_mut)?
        }
        other => return Err(mismatch(TAG_TCP, other)),
    };
    Ok(TcpTransport::new(config)?.into())
}

fn raw_factory(config: &DeviceConfig) -> Result<AnyTransport> {
    let config = match config {
        DeviceConfig::Raw(raw) => raw.clone(),
        DeviceConfig::Custom(custom) => {
            from_custom(custom, RawConfig::settings_mut)?
        }
        other => return Err(mismatch(TAG_RAW, other)),
    };
    Ok(RawTransport::new(config)?.into())
}

fn file_factory(config: &DeviceConfig) -> Result<AnyTransport> {
    let config = match config {
        DeviceConfig::File(file) => file.clone(),
        DeviceConfig::Custom(custom) => {
            from_custom(custom, FileConfig::settings_mut)?
        }
        other => return Err(mismatch(TAG_FILE, other)),
    };
    Ok(FileTransport::new(config)?.into())
}

#[cfg(feature = "hardware-hid")]
fn hid_factory(config: &DeviceConfig) -> Result<AnyTransport> {
    let config = match config {
        DeviceConfig::Hid(hid) => hid.clone(),
        DeviceConfig::Custom(custom) => {
            from_custom(custom, devlink_core::config::HidConfig::settings_mut)?
        }
        other => return Err(mismatch(devlink_core::constants::TAG_HID, other)),
    };
    Ok(HidTransport::new(config)?.into())
}

/// Push ports are runtime handles, so only a typed configuration will do.
fn queued_factory(config: &DeviceConfig) -> Result<AnyTransport> {
    match config {
        DeviceConfig::Queued(queued) => Ok(QueuedTransport::new(queued.clone())?.into()),
        other => Err(mismatch(TAG_QUEUED, other)),
    }
}
