//! Mock transports for testing and development.
//!
//! Every mock returns a [`MockHandle`] alongside the transport. The handle
//! shares state with the transport, so a test can feed incoming bytes and
//! inspect what the device stream did (open and close cycles, write calls,
//! chunk sizes) after the transport has been moved into a stream.
//!
//! - [`LoopbackTransport`] echoes every write back as readable input.
//! - [`FlakyTransport`] fails a configurable number of attempts first.
//! - [`PacedTransport`] releases scripted input in bursts separated by a delay.

pub mod flaky;
pub mod loopback;
pub mod paced;

pub use flaky::FlakyTransport;
pub use loopback::LoopbackTransport;
pub use paced::PacedTransport;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Counters and buffers shared between a mock and its handle.
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub(crate) open: bool,
    pub(crate) opens: usize,
    pub(crate) closes: usize,
    pub(crate) releases: usize,
    pub(crate) write_calls: usize,
    pub(crate) read_calls: usize,
    pub(crate) chunks: Vec<usize>,
    pub(crate) written: Vec<u8>,
    pub(crate) incoming: VecDeque<u8>,
}

impl MockState {
    /// Returns `false` when already open.
    pub(crate) fn open(&mut self) -> bool {
        if self.open {
            return false;
        }
        self.open = true;
        self.opens += 1;
        true
    }

    pub(crate) fn close(&mut self) -> bool {
        if !self.open {
            return false;
        }
        self.open = false;
        self.closes += 1;
        true
    }

    pub(crate) fn record_write(&mut self, buf: &[u8]) {
        self.chunks.push(buf.len());
        self.written.extend_from_slice(buf);
    }

    pub(crate) fn take_incoming(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..count)) {
            *slot = byte;
        }
        count
    }
}

pub(crate) type SharedState = Arc<Mutex<MockState>>;

pub(crate) fn lock(state: &SharedState) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle for driving and inspecting a mock transport.
///
/// # Examples
///
/// ```
/// use devlink_hardware::DeviceStream;
/// use devlink_hardware::mock::LoopbackTransport;
/// use devlink_core::DeviceSettings;
///
/// #[tokio::main]
/// async fn main() -> devlink_hardware::Result<()> {
///     let (transport, handle) = LoopbackTransport::new();
///     let settings = DeviceSettings::new("Loopback").with_write_buffer_size(2);
///     let mut stream = DeviceStream::new(settings, transport);
///
///     stream.write(b"HELLO").await?;
///
///     assert_eq!(handle.written(), b"HELLO");
///     assert_eq!(handle.chunk_sizes(), vec![2, 2, 1]);
///     assert_eq!(handle.opens(), 1);
///     assert_eq!(handle.closes(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: SharedState,
}

impl MockHandle {
    pub(crate) fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Queue bytes the transport will report as readable.
    pub fn push_incoming(&self, bytes: &[u8]) {
        lock(&self.state).incoming.extend(bytes.iter().copied());
    }

    /// Bytes queued but not read yet.
    pub fn pending(&self) -> usize {
        lock(&self.state).incoming.len()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Successful open calls.
    pub fn opens(&self) -> usize {
        lock(&self.state).opens
    }

    /// Successful close calls.
    pub fn closes(&self) -> usize {
        lock(&self.state).closes
    }

    pub fn releases(&self) -> usize {
        lock(&self.state).releases
    }

    /// Write attempts, failed ones included.
    pub fn write_calls(&self) -> usize {
        lock(&self.state).write_calls
    }

    /// Read attempts, failed ones included.
    pub fn read_calls(&self) -> usize {
        lock(&self.state).read_calls
    }

    /// Sizes of the successful writes, in order.
    pub fn chunk_sizes(&self) -> Vec<usize> {
        lock(&self.state).chunks.clone()
    }

    /// Every byte successfully written, in order.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).written.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close_are_idempotent() {
        let mut state = MockState::default();

        assert!(state.open());
        assert!(!state.open());
        assert!(state.close());
        assert!(!state.close());
        assert_eq!((state.opens, state.closes), (1, 1));
    }

    #[test]
    fn test_take_incoming_is_bounded() {
        let mut state = MockState::default();
        state.incoming.extend([1, 2, 3, 4, 5]);

        let mut buffer = [0u8; 3];
        assert_eq!(state.take_incoming(&mut buffer), 3);
        assert_eq!(buffer, [1, 2, 3]);
        assert_eq!(state.incoming.len(), 2);
    }
}
