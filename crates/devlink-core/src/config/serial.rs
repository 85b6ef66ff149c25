//! Serial port configuration.

use crate::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_SERIAL_PORT, PORT_PREFIX_COM, PORT_PREFIX_DEV, PORT_PREFIX_LPT,
    SERIAL_READ_BUFFER_SIZE, SERIAL_WRITE_BUFFER_SIZE,
};
use crate::{DeviceSettings, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// Flow control (handshake) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowControl {
    #[default]
    None,
    /// XON/XOFF.
    Software,
    /// RTS/CTS.
    Hardware,
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = match self {
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
        };
        write!(f, "{bits}")
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Odd => write!(f, "Odd"),
            Self::Even => write!(f, "Even"),
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "1"),
            Self::Two => write!(f, "2"),
        }
    }
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Software => write!(f, "XOnXOff"),
            Self::Hardware => write!(f, "RequestToSend"),
        }
    }
}

/// Returns `true` if `port` names something the serial backend can open:
/// `COMx`, `LPTx` (any case) or a `/dev/` node.
///
/// # Examples
///
/// ```
/// use devlink_core::config::is_serial_port;
///
/// assert!(is_serial_port("COM3"));
/// assert!(is_serial_port("lpt1"));
/// assert!(is_serial_port("/dev/ttyUSB0"));
/// assert!(!is_serial_port("TCP:10.0.0.1:9100"));
/// assert!(!is_serial_port(""));
/// ```
#[must_use]
pub fn is_serial_port(port: &str) -> bool {
    let upper = port.to_ascii_uppercase();
    !port.is_empty()
        && (upper.starts_with(PORT_PREFIX_COM)
            || upper.starts_with(PORT_PREFIX_LPT)
            || port.starts_with(PORT_PREFIX_DEV))
}

/// Serial line parameters plus the shared device settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    settings: DeviceSettings,
    port: String,
    baud_rate: u32,
    data_bits: DataBits,
    parity: Parity,
    stop_bits: StopBits,
    flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            settings: DeviceSettings::new("Serial")
                .with_read_buffer_size(SERIAL_READ_BUFFER_SIZE)
                .with_write_buffer_size(SERIAL_WRITE_BUFFER_SIZE),
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
            flow_control: FlowControl::default(),
        }
    }
}

impl SerialConfig {
    /// Create a configuration for `port` at `baud_rate`, 8N1 without flow control.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] if `port` is not a serial port name.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Result<Self> {
        let mut config = Self::default();
        config.set_port(port)?;
        config.set_baud_rate(baud_rate);
        Ok(config)
    }

    #[must_use]
    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DeviceSettings {
        &mut self.settings
    }

    #[must_use]
    pub fn port(&self) -> &str {
        &self.port
    }

    #[must_use]
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    #[must_use]
    pub fn data_bits(&self) -> DataBits {
        self.data_bits
    }

    #[must_use]
    pub fn parity(&self) -> Parity {
        self.parity
    }

    #[must_use]
    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    #[must_use]
    pub fn flow_control(&self) -> FlowControl {
        self.flow_control
    }

    /// Change the port name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] and leaves the port untouched if the
    /// name is not a serial port.
    pub fn set_port(&mut self, port: impl Into<String>) -> Result<()> {
        let port = port.into();
        if !is_serial_port(&port) {
            return Err(Error::InvalidPort(port));
        }
        self.settings.update("port", &mut self.port, port);
        Ok(())
    }

    pub fn set_baud_rate(&mut self, baud_rate: u32) {
        self.settings
            .update("baud_rate", &mut self.baud_rate, baud_rate);
    }

    pub fn set_data_bits(&mut self, data_bits: DataBits) {
        self.settings
            .update("data_bits", &mut self.data_bits, data_bits);
    }

    pub fn set_parity(&mut self, parity: Parity) {
        self.settings.update("parity", &mut self.parity, parity);
    }

    pub fn set_stop_bits(&mut self, stop_bits: StopBits) {
        self.settings
            .update("stop_bits", &mut self.stop_bits, stop_bits);
    }

    pub fn set_flow_control(&mut self, flow_control: FlowControl) {
        self.settings
            .update("flow_control", &mut self.flow_control, flow_control);
    }

    /// Check the preconditions for opening the port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] if the port name is empty or unknown
    /// (possible after deserialization) and [`Error::Configuration`] for a
    /// zero baud rate.
    pub fn validate(&self) -> Result<()> {
        if !is_serial_port(&self.port) {
            return Err(Error::InvalidPort(self.port.clone()));
        }
        if self.baud_rate == 0 {
            return Err(Error::configuration("baud rate must be greater than zero"));
        }
        Ok(())
    }
}
