//! File transport: every write is appended to a file.
//!
//! Handy for capturing what would be sent to a printer. The file is opened for
//! append, so consecutive jobs accumulate. Nothing can be read back.

use crate::error::{Result, not_open};
use crate::traits::Transport;
use devlink_core::config::FileConfig;
use devlink_core::constants::TAG_FILE;
use std::io;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Write-only transport appending to a file.
#[derive(Debug)]
pub struct FileTransport {
    config: FileConfig,
    file: Option<File>,
}

impl FileTransport {
    /// # Errors
    ///
    /// Returns a configuration error when no path is set.
    pub fn new(config: FileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, file: None })
    }

    #[must_use]
    pub fn config(&self) -> &FileConfig {
        &self.config
    }
}

impl Transport for FileTransport {
    fn tag(&self) -> &str {
        TAG_FILE
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    async fn open(&mut self) -> Result<bool> {
        if self.file.is_some() {
            return Ok(false);
        }

        let file = OpenOptions::new()
            .append(true)
            .create(self.config.create_if_missing())
            .open(self.config.path())
            .await?;

        debug!(path = %self.config.path().display(), "File opened");
        self.file = Some(file);
        Ok(true)
    }

    async fn close(&mut self) -> Result<bool> {
        let Some(mut file) = self.file.take() else {
            return Ok(false);
        };

        file.flush().await?;
        file.sync_all().await?;
        Ok(true)
    }

    fn available(&mut self) -> usize {
        0
    }

    async fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file transport is write-only",
        ))
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let path = self.config.path().display().to_string();
        let file = self.file.as_mut().ok_or_else(|| not_open(&path))?;
        file.write_all(buf).await
    }

    fn can_read(&self) -> bool {
        false
    }

    fn release(&mut self) {
        self.file = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_appends_across_sessions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("receipt.prn");
        let config = FileConfig::new(path.display().to_string()).with_create_if_missing(true);
        let mut transport = FileTransport::new(config).unwrap();

        transport.open().await.unwrap();
        transport.write(b"first ").await.unwrap();
        transport.close().await.unwrap();

        transport.open().await.unwrap();
        transport.write(b"second").await.unwrap();
        transport.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"first second");
    }

    #[tokio::test]
    async fn test_missing_file_without_create() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.prn");
        let mut transport = FileTransport::new(FileConfig::new(path.display().to_string())).unwrap();

        assert!(transport.open().await.is_err());
        assert!(!transport.is_open());
    }

    #[test]
    fn test_is_write_only() {
        let transport = FileTransport::new(FileConfig::new("/tmp/out.prn")).unwrap();
        assert!(!transport.can_read());
        assert!(transport.can_write());
    }
}
