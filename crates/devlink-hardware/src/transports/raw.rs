//! Raw printer transport through the operating system spooler.
//!
//! Opening the transport starts a print job; writes accumulate in memory and
//! closing hands the whole job to the spooler command on stdin (`lp -d
//! <printer> -o raw` by default), bypassing any driver-side rendering. Nothing
//! can be read back from a spooled printer.

use crate::error::{HardwareError, Result};
use crate::traits::Transport;
use devlink_core::config::RawConfig;
use devlink_core::constants::TAG_RAW;
use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Write-only transport spooling one job per open/close cycle.
#[derive(Debug)]
pub struct RawTransport {
    config: RawConfig,
    job: Option<Vec<u8>>,
}

impl RawTransport {
    /// # Errors
    ///
    /// Returns a configuration error when the printer or spooler is missing.
    pub fn new(config: RawConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, job: None })
    }

    #[must_use]
    pub fn config(&self) -> &RawConfig {
        &self.config
    }

    /// Bytes buffered for the job in progress.
    #[must_use]
    pub fn pending_job(&self) -> usize {
        self.job.as_ref().map_or(0, Vec::len)
    }

    async fn spool(&self, job: &[u8]) -> Result<()> {
        let printer = self.config.printer();
        let (program, args) = self
            .config
            .spool_command()
            .resolve(printer)
            .ok_or_else(|| HardwareError::configuration("empty spool command"))?;

        info!(printer, bytes = job.len(), command = %self.config.spool_command(), "Spooling raw job");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(job).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HardwareError::Io(io::Error::other(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            ))));
        }
        Ok(())
    }
}

impl Transport for RawTransport {
    fn tag(&self) -> &str {
        TAG_RAW
    }

    fn is_open(&self) -> bool {
        self.job.is_some()
    }

    async fn open(&mut self) -> Result<bool> {
        if !cfg!(unix) {
            return Err(HardwareError::unsupported(
                "raw printing is only available on unix spoolers",
            ));
        }
        if self.job.is_some() {
            return Ok(false);
        }

        debug!(printer = self.config.printer(), "Starting raw job");
        self.job = Some(Vec::new());
        Ok(true)
    }

    async fn close(&mut self) -> Result<bool> {
        let Some(job) = self.job.take() else {
            return Ok(false);
        };

        if job.is_empty() {
            debug!(printer = self.config.printer(), "Empty raw job discarded");
        } else {
            self.spool(&job).await?;
        }
        Ok(true)
    }

    fn available(&mut self) -> usize {
        0
    }

    async fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "raw printer transport is write-only",
        ))
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let job = self
            .job
            .as_mut()
            .ok_or_else(|| crate::error::not_open(self.config.printer()))?;
        job.extend_from_slice(buf);
        Ok(())
    }

    fn can_read(&self) -> bool {
        false
    }

    fn release(&mut self) {
        if let Some(job) = self.job.take()
            && !job.is_empty()
        {
            warn!(
                printer = self.config.printer(),
                bytes = job.len(),
                "Raw job dropped without being spooled"
            );
        }
    }
}
