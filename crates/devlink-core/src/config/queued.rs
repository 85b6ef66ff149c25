//! Configuration for push-based byte sources.
//!
//! Some ports only hand out asynchronous streams, the browser serial API
//! being the typical case. [`QueuedConfig`] carries a [`PushPort`] handle to
//! such a source; the queued transport pumps it into a bounded queue so the
//! device stream can keep its synchronous "available bytes" contract.

use crate::constants::DEFAULT_QUEUE_CAPACITY;
use crate::{DeviceSettings, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Receiving half of an opened push port.
pub type PortReader = Pin<Box<dyn AsyncRead + Send>>;

/// Sending half of an opened push port.
pub type PortWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// A port that opens into an asynchronous reader/writer pair.
pub trait PushPort: fmt::Debug + Send + Sync {
    /// Open the port and hand out both halves.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the port cannot be opened.
    fn connect(&self) -> std::io::Result<(PortReader, PortWriter)>;
}

/// Queued transport configuration.
///
/// The port handle is a runtime object and is not serialized.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuedConfig {
    settings: DeviceSettings,
    queue_capacity: usize,
    #[serde(skip)]
    port: Option<Arc<dyn PushPort>>,
}

impl Default for QueuedConfig {
    fn default() -> Self {
        Self {
            settings: DeviceSettings::new("Queued"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            port: None,
        }
    }
}

impl fmt::Debug for QueuedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedConfig")
            .field("settings", &self.settings)
            .field("queue_capacity", &self.queue_capacity)
            .field("port", &self.port)
            .finish()
    }
}

impl QueuedConfig {
    pub fn new(port: Arc<dyn PushPort>) -> Self {
        Self {
            port: Some(port),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.set_queue_capacity(capacity);
        self
    }

    #[must_use]
    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }

    /// Chunks the background pump may queue before it waits for the reader.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    #[must_use]
    pub fn port(&self) -> Option<&Arc<dyn PushPort>> {
        self.port.as_ref()
    }

    /// Set the queue capacity, clamped to at least one chunk.
    pub fn set_queue_capacity(&mut self, capacity: usize) {
        self.settings
            .update("queue_capacity", &mut self.queue_capacity, capacity.max(1));
    }

    pub fn set_port(&mut self, port: Arc<dyn PushPort>) {
        self.port = Some(port);
    }

    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no port handle is attached.
    pub fn validate(&self) -> Result<()> {
        if self.port.is_none() {
            return Err(Error::configuration("queued transport has no port attached"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NullPort;

    impl PushPort for NullPort {
        fn connect(&self) -> std::io::Result<(PortReader, PortWriter)> {
            let reader: PortReader = Box::pin(tokio::io::empty());
            let writer: PortWriter = Box::pin(tokio::io::sink());
            Ok((reader, writer))
        }
    }

    #[test]
    fn test_requires_port() {
        assert!(matches!(
            QueuedConfig::default().validate(),
            Err(Error::Configuration(_))
        ));
        assert!(QueuedConfig::new(Arc::new(NullPort)).validate().is_ok());
    }

    #[test]
    fn test_capacity_is_clamped() {
        let config = QueuedConfig::new(Arc::new(NullPort)).with_queue_capacity(0);
        assert_eq!(config.queue_capacity(), 1);
    }

    #[test]
    fn test_port_is_not_serialized() {
        let config = QueuedConfig::new(Arc::new(NullPort));
        let json = serde_json::to_string(&config).unwrap();
        let back: QueuedConfig = serde_json::from_str(&json).unwrap();

        assert!(back.port().is_none());
        assert_eq!(back.queue_capacity(), config.queue_capacity());
    }
}
