//! Transport that fails a scripted number of attempts before behaving.

use super::{MockHandle, MockState, SharedState, lock};
use crate::error::{HardwareError, Result, not_open};
use crate::traits::Transport;
use std::io;
use std::sync::{Arc, Mutex};

/// Loopback transport with injected failures.
///
/// The first `write_failures` writes and the first `read_failures` reads fail
/// with [`io::ErrorKind::BrokenPipe`]; after that the transport behaves like
/// [`LoopbackTransport`](super::LoopbackTransport). Use [`u32::MAX`] for a
/// transport that never recovers.
///
/// # Examples
///
/// ```
/// use devlink_hardware::DeviceStream;
/// use devlink_hardware::mock::FlakyTransport;
/// use devlink_core::DeviceSettings;
///
/// #[tokio::main(flavor = "current_thread", start_paused = true)]
/// async fn main() -> devlink_hardware::Result<()> {
///     let (transport, handle) = FlakyTransport::failing_writes(2);
///     let settings = DeviceSettings::new("Flaky").with_retries(3);
///     let mut stream = DeviceStream::new(settings, transport);
///
///     stream.write(b"PING").await?;
///     assert_eq!(handle.write_calls(), 3);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FlakyTransport {
    state: SharedState,
    write_failures: u32,
    read_failures: u32,
    open_failures: u32,
}

impl FlakyTransport {
    pub fn new(write_failures: u32, read_failures: u32) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let handle = MockHandle::new(Arc::clone(&state));
        let transport = Self {
            state,
            write_failures,
            read_failures,
            open_failures: 0,
        };
        (transport, handle)
    }

    pub fn failing_writes(failures: u32) -> (Self, MockHandle) {
        Self::new(failures, 0)
    }

    pub fn failing_reads(failures: u32) -> (Self, MockHandle) {
        Self::new(0, failures)
    }

    /// Every read and write fails.
    pub fn always_failing() -> (Self, MockHandle) {
        Self::new(u32::MAX, u32::MAX)
    }

    /// Make the next `failures` open calls fail as well.
    #[must_use]
    pub fn with_open_failures(mut self, failures: u32) -> Self {
        self.open_failures = failures;
        self
    }
}

fn consume(budget: &mut u32) -> bool {
    if *budget == 0 {
        return false;
    }
    if *budget != u32::MAX {
        *budget -= 1;
    }
    true
}

fn injected(operation: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("injected {operation} failure"),
    )
}

impl Transport for FlakyTransport {
    fn tag(&self) -> &str {
        "flaky"
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    async fn open(&mut self) -> Result<bool> {
        if consume(&mut self.open_failures) {
            return Err(HardwareError::Io(injected("open")));
        }
        Ok(lock(&self.state).open())
    }

    async fn close(&mut self) -> Result<bool> {
        Ok(lock(&self.state).close())
    }

    fn available(&mut self) -> usize {
        let state = lock(&self.state);
        if state.open { state.incoming.len() } else { 0 }
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        state.read_calls += 1;
        if consume(&mut self.read_failures) {
            return Err(injected("read"));
        }
        if !state.open {
            return Err(not_open("flaky"));
        }
        Ok(state.take_incoming(buf))
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.write_calls += 1;
        if consume(&mut self.write_failures) {
            return Err(injected("write"));
        }
        if !state.open {
            return Err(not_open("flaky"));
        }
        state.record_write(buf);
        state.incoming.extend(buf.iter().copied());
        Ok(())
    }

    fn release(&mut self) {
        let mut state = lock(&self.state);
        state.open = false;
        state.releases += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recovers_after_budget() {
        let (mut transport, handle) = FlakyTransport::failing_writes(2);
        transport.open().await.unwrap();

        assert!(transport.write(b"a").await.is_err());
        assert!(transport.write(b"a").await.is_err());
        transport.write(b"a").await.unwrap();

        assert_eq!(handle.write_calls(), 3);
        assert_eq!(handle.written(), b"a");
    }

    #[tokio::test]
    async fn test_always_failing_never_recovers() {
        let (mut transport, _handle) = FlakyTransport::always_failing();
        transport.open().await.unwrap();

        for _ in 0..10 {
            assert!(transport.write(b"a").await.is_err());
        }
    }

    #[tokio::test]
    async fn test_open_failures() {
        let (transport, handle) = FlakyTransport::failing_writes(0);
        let mut transport = transport.with_open_failures(1);

        assert!(matches!(transport.open().await, Err(HardwareError::Io(_))));
        assert!(transport.open().await.unwrap());
        assert_eq!(handle.opens(), 1);
    }
}
