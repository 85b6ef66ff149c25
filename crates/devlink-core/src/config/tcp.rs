//! Raw TCP socket configuration.

use crate::{DeviceSettings, Error, Result};
use serde::{Deserialize, Serialize};

/// Host and port of a network-attached device.
///
/// # Examples
///
/// ```
/// use devlink_core::config::TcpConfig;
///
/// let config = TcpConfig::new("192.168.0.50", 9100);
/// assert_eq!(config.address(), "192.168.0.50:9100");
/// assert!(config.validate().is_ok());
///
/// assert!(TcpConfig::new("", 9100).validate().is_err());
/// assert!(TcpConfig::new("printer.local", 0).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    settings: DeviceSettings,
    host: String,
    port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            settings: DeviceSettings::new("TCP"),
            host: String::new(),
            port: 0,
        }
    }
}

impl TcpConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, ready for name resolution.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.settings.update("host", &mut self.host, host.into());
    }

    pub fn set_port(&mut self, port: u16) {
        self.settings.update("port", &mut self.port, port);
    }

    /// # Errors
    ///
    /// Returns [`Error::MissingField`] when the host is blank or the port is zero.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::missing_field("host"));
        }
        if self.port < 1 {
            return Err(Error::missing_field("port"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_defaults() {
        let config = TcpConfig::default();

        assert_eq!(config.settings().name(), "TCP");
        assert!(config.host().is_empty());
        assert!(matches!(config.validate(), Err(Error::MissingField(f)) if f == "host"));
    }

    #[test]
    fn test_setters_publish_events() {
        let mut config = TcpConfig::new("10.0.0.1", 9100);
        let mut events = config.settings_mut().subscribe();

        config.set_port(9101);
        config.set_port(9101);

        assert_eq!(events.try_recv().unwrap().property, "port");
        assert_eq!(events.try_recv().unwrap().value, "9101");
        assert!(events.try_recv().is_err());
    }
}
