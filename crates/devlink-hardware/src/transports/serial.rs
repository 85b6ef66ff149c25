//! Serial port transport backed by the `serialport` crate.

use super::{joined, lock_driver};
use crate::error::{Result, not_open};
use crate::traits::Transport;
use devlink_core::config::{DataBits, FlowControl, Parity, SerialConfig, StopBits};
use devlink_core::constants::TAG_SERIAL;
use serialport::{ClearBuffer, SerialPort};
use std::fmt;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// RS-232 / USB-serial transport.
///
/// The driver is blocking; every read and write runs on the blocking thread
/// pool. The configured timeout applies to each driver call.
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<SharedPort>,
}

impl SerialTransport {
    /// # Errors
    ///
    /// Returns a configuration error when the port name or baud rate is invalid.
    pub fn new(config: SerialConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, port: None })
    }

    #[must_use]
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn shared_port(&self) -> io::Result<SharedPort> {
        self.port
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| not_open(self.config.port()))
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("config", &self.config)
            .field("open", &self.port.is_some())
            .finish()
    }
}

fn data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Five => serialport::DataBits::Five,
        DataBits::Six => serialport::DataBits::Six,
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

fn stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

fn flow_control(flow: FlowControl) -> serialport::FlowControl {
    match flow {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Software => serialport::FlowControl::Software,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
    }
}

impl Transport for SerialTransport {
    fn tag(&self) -> &str {
        TAG_SERIAL
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    async fn open(&mut self) -> Result<bool> {
        if self.port.is_some() {
            return Ok(false);
        }

        let config = &self.config;
        let builder = serialport::new(config.port(), config.baud_rate())
            .data_bits(data_bits(config.data_bits()))
            .parity(parity(config.parity()))
            .stop_bits(stop_bits(config.stop_bits()))
            .flow_control(flow_control(config.flow_control()))
            .timeout(config.settings().timeout());

        debug!(
            port = config.port(),
            baud = config.baud_rate(),
            data_bits = %config.data_bits(),
            parity = %config.parity(),
            stop_bits = %config.stop_bits(),
            "Opening serial port"
        );

        let port = joined(
            tokio::task::spawn_blocking(move || builder.open().map_err(io::Error::from)).await,
        )?;
        self.port = Some(Arc::new(Mutex::new(port)));
        Ok(true)
    }

    async fn close(&mut self) -> Result<bool> {
        let Some(port) = self.port.take() else {
            return Ok(false);
        };

        // Flush whatever the driver still buffers before the handle goes away.
        let flushed = tokio::task::spawn_blocking(move || {
            let mut port = lock_driver(&port, "serial")?;
            port.flush()
        })
        .await;
        if let Err(err) = joined(flushed) {
            warn!(port = self.config.port(), error = %err, "Flush failed while closing serial port");
        }
        Ok(true)
    }

    fn available(&mut self) -> usize {
        let Some(port) = self.port.as_ref() else {
            return 0;
        };

        let pending = lock_driver(port, "serial")
            .and_then(|port| port.bytes_to_read().map_err(io::Error::from));
        match pending {
            Ok(count) => count as usize,
            Err(err) => {
                debug!(port = self.config.port(), error = %err, "Could not query pending bytes");
                0
            }
        }
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let port = self.shared_port()?;
        let wanted = buf.len();

        let (read, data) = joined(
            tokio::task::spawn_blocking(move || {
                let mut data = vec![0u8; wanted];
                let read = lock_driver(&port, "serial")?.read(&mut data)?;
                Ok::<_, io::Error>((read, data))
            })
            .await,
        )?;

        buf[..read].copy_from_slice(&data[..read]);
        Ok(read)
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let port = self.shared_port()?;
        let data = buf.to_vec();

        joined(
            tokio::task::spawn_blocking(move || {
                let mut port = lock_driver(&port, "serial")?;
                port.write_all(&data)?;
                port.flush()
            })
            .await,
        )
    }

    async fn clear(&mut self) -> Result<()> {
        if let Some(port) = self.port.as_ref() {
            lock_driver(port, "serial")?
                .clear(ClearBuffer::Input)
                .map_err(io::Error::from)?;
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.port.take().is_some() {
            debug!(port = self.config.port(), "Serial port released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_port() {
        let mut config = SerialConfig::default();
        config.set_baud_rate(0);
        assert!(SerialTransport::new(config).is_err());
    }

    #[tokio::test]
    async fn test_closed_port_reports_nothing() {
        let mut transport = SerialTransport::new(SerialConfig::default()).unwrap();

        assert!(!transport.is_open());
        assert_eq!(transport.available(), 0);
        assert!(!transport.close().await.unwrap());

        let error = transport.write(b"x").await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_line_settings_map_to_driver() {
        assert_eq!(data_bits(DataBits::Seven), serialport::DataBits::Seven);
        assert_eq!(parity(Parity::Even), serialport::Parity::Even);
        assert_eq!(stop_bits(StopBits::Two), serialport::StopBits::Two);
        assert_eq!(
            flow_control(FlowControl::Hardware),
            serialport::FlowControl::Hardware
        );
    }
}
