//! USB HID transport backed by `hidapi`.
//!
//! HID devices deliver input reports instead of a byte stream. Reports are
//! polled with a zero timeout whenever the device stream asks how much is
//! available and buffered locally until read.

use super::{joined, lock_driver};
use crate::error::{HardwareError, Result, not_open};
use crate::traits::Transport;
use bytes::{Buf, BytesMut};
use devlink_core::config::HidConfig;
use devlink_core::constants::TAG_HID;
use hidapi::{HidApi, HidDevice};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Largest input report we poll for.
const REPORT_SIZE: usize = 64;

/// Report id prepended to every output report.
const REPORT_ID: u8 = 0x00;

type SharedDevice = Arc<Mutex<HidDevice>>;

/// Transport over a USB HID device.
pub struct HidTransport {
    config: HidConfig,
    device: Option<SharedDevice>,
    pending: BytesMut,
}

impl HidTransport {
    /// # Errors
    ///
    /// Returns a configuration error when no vendor id is set.
    pub fn new(config: HidConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            device: None,
            pending: BytesMut::new(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &HidConfig {
        &self.config
    }

    fn label(&self) -> String {
        format!(
            "{:04x}:{:04x}",
            self.config.vendor_id(),
            self.config.product_id()
        )
    }

    fn shared_device(&self) -> io::Result<SharedDevice> {
        self.device
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| not_open(&self.label()))
    }

    fn poll_reports(&mut self) {
        let Some(device) = self.device.as_ref() else {
            return;
        };

        let mut report = [0u8; REPORT_SIZE];
        loop {
            let polled = lock_driver(device, "hid").and_then(|device| {
                device
                    .read_timeout(&mut report, 0)
                    .map_err(io::Error::other)
            });
            match polled {
                Ok(0) => break,
                Ok(read) => self.pending.extend_from_slice(&report[..read]),
                Err(err) => {
                    debug!(device = %self.label(), error = %err, "HID poll failed");
                    break;
                }
            }
        }
    }
}

impl fmt::Debug for HidTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HidTransport")
            .field("config", &self.config)
            .field("open", &self.device.is_some())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Transport for HidTransport {
    fn tag(&self) -> &str {
        TAG_HID
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    async fn open(&mut self) -> Result<bool> {
        if self.device.is_some() {
            return Ok(false);
        }

        let vendor_id = self.config.vendor_id();
        let product_id = self.config.product_id();
        info!(device = %self.label(), "Opening HID device");

        let device = tokio::task::spawn_blocking(move || {
            let api = HidApi::new().map_err(io::Error::other)?;
            api.open(vendor_id, product_id).map_err(io::Error::other)
        })
        .await;
        let device = joined(device).map_err(|err| {
            HardwareError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("HID device {:04x}:{:04x}: {err}", vendor_id, product_id),
            ))
        })?;

        self.device = Some(Arc::new(Mutex::new(device)));
        self.pending.clear();
        Ok(true)
    }

    async fn close(&mut self) -> Result<bool> {
        if self.device.take().is_none() {
            return Ok(false);
        }
        self.pending.clear();
        debug!(device = %self.label(), "HID device closed");
        Ok(true)
    }

    fn available(&mut self) -> usize {
        self.poll_reports();
        self.pending.len()
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.pending.is_empty() {
            let count = buf.len().min(self.pending.len());
            self.pending.copy_to_slice(&mut buf[..count]);
            return Ok(count);
        }

        let device = self.shared_device()?;
        let timeout = i32::try_from(self.config.settings().timeout().as_millis()).unwrap_or(i32::MAX);
        let wanted = buf.len();

        let (read, data) = joined(
            tokio::task::spawn_blocking(move || {
                let mut data = vec![0u8; wanted];
                let read = lock_driver(&device, "hid")?
                    .read_timeout(&mut data, timeout)
                    .map_err(io::Error::other)?;
                Ok::<_, io::Error>((read, data))
            })
            .await,
        )?;

        buf[..read].copy_from_slice(&data[..read]);
        Ok(read)
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let device = self.shared_device()?;
        let mut report = Vec::with_capacity(buf.len() + 1);
        report.push(REPORT_ID);
        report.extend_from_slice(buf);

        joined(
            tokio::task::spawn_blocking(move || {
                lock_driver(&device, "hid")?
                    .write(&report)
                    .map(|_| ())
                    .map_err(io::Error::other)
            })
            .await,
        )
    }

    async fn clear(&mut self) -> Result<()> {
        self.poll_reports();
        self.pending.clear();
        Ok(())
    }

    fn release(&mut self) {
        self.device = None;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_vendor_id() {
        assert!(matches!(
            HidTransport::new(HidConfig::default()),
            Err(HardwareError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_device_reports_nothing() {
        let mut transport = HidTransport::new(HidConfig::new(0x04b8, 0x0202)).unwrap();

        assert_eq!(Transport::tag(&transport), TAG_HID);
        assert_eq!(transport.available(), 0);
        assert!(!transport.close().await.unwrap());

        let error = transport.write(b"x").await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::NotConnected);
    }
}
