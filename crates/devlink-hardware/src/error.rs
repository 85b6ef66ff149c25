//! Error types for device stream operations.
//!
//! Errors fall into four groups:
//!
//! - precondition problems ([`HardwareError::Config`], [`HardwareError::NotOpen`],
//!   [`HardwareError::Unsupported`]) are fatal and never retried
//! - transient transport failures surface as [`std::io::Error`] from the
//!   transport and are retried by the device stream; once the attempts run out
//!   they become [`HardwareError::RetriesExhausted`]
//! - registry lookups fail with [`HardwareError::TransportNotFound`] or
//!   [`HardwareError::DuplicateRegistration`]
//! - everything else is passed through as [`HardwareError::Io`]

use std::io;

/// Result type alias for device stream operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while talking to a device.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Missing or invalid configuration.
    #[error(transparent)]
    Config(#[from] devlink_core::Error),

    /// No transport is registered for the requested tag or port.
    #[error("Transport not found: {tag}")]
    TransportNotFound { tag: String },

    /// A transport is already registered under this tag or prefix.
    #[error("Transport already registered: {tag}")]
    DuplicateRegistration { tag: String },

    /// A transport operation kept failing after every allowed attempt.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    /// Opening the transport took longer than the configured timeout.
    #[error("Open timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A persistent-mode operation was called before `open`.
    #[error("Device not open: {device}")]
    NotOpen { device: String },

    /// The stream was disposed and cannot be used again.
    #[error("Device disposed: {device}")]
    Disposed { device: String },

    /// Operation is not supported by this transport or platform.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HardwareError {
    /// Create a configuration error from a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Config(devlink_core::Error::configuration(message))
    }

    pub fn not_found(tag: impl Into<String>) -> Self {
        Self::TransportNotFound { tag: tag.into() }
    }

    pub fn duplicate(tag: impl Into<String>) -> Self {
        Self::DuplicateRegistration { tag: tag.into() }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn not_open(device: impl Into<String>) -> Self {
        Self::NotOpen {
            device: device.into(),
        }
    }

    pub fn disposed(device: impl Into<String>) -> Self {
        Self::Disposed {
            device: device.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Whether retrying with a reopened transport cannot help.
    ///
    /// # Examples
    ///
    /// ```
    /// use devlink_hardware::HardwareError;
    ///
    /// assert!(HardwareError::configuration("no port").is_fatal());
    /// assert!(!HardwareError::timeout(3000).is_fatal());
    /// ```
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::NotOpen { .. }
                | Self::Unsupported { .. }
                | Self::Disposed { .. }
        )
    }
}

/// Error returned by transports asked to move bytes while closed.
pub(crate) fn not_open(device: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("{device} is not open"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_from_core() {
        let error: HardwareError = devlink_core::Error::missing_field("host").into();
        assert!(matches!(error, HardwareError::Config(_)));
        assert!(error.is_fatal());
        assert_eq!(error.to_string(), "Missing configuration field: host");
    }

    #[test]
    fn test_retries_exhausted_keeps_source() {
        let error = HardwareError::RetriesExhausted {
            operation: "write",
            attempts: 3,
            source: io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
        };

        assert!(!error.is_fatal());
        assert_eq!(error.to_string(), "write failed after 3 attempts: pipe closed");
        let source = std::error::Error::source(&error).unwrap();
        assert_eq!(source.to_string(), "pipe closed");
    }

    #[test]
    fn test_lookup_errors() {
        assert_eq!(
            HardwareError::not_found("bluetooth").to_string(),
            "Transport not found: bluetooth"
        );
        assert_eq!(
            HardwareError::duplicate("serial").to_string(),
            "Transport already registered: serial"
        );
    }

    #[test]
    fn test_stream_not_open_is_fatal() {
        let error = HardwareError::not_open("Printer");
        assert!(error.is_fatal());
        assert_eq!(error.to_string(), "Device not open: Printer");
    }

    #[test]
    fn test_not_open_kind() {
        assert_eq!(not_open("COM1").kind(), io::ErrorKind::NotConnected);
    }
}
