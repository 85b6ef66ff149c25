//! Transport that releases scripted input in timed bursts.
//!
//! Models a slow responder: a device that answers in several bursts with a
//! pause between them. A drain that stops as soon as no bytes are available
//! only sees the bursts released so far.

use super::{MockHandle, MockState, SharedState, lock};
use crate::error::{Result, not_open};
use crate::traits::Transport;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Scripted transport releasing one burst every `gap`.
///
/// The first burst is readable as soon as the transport opens; each following
/// burst becomes readable `gap` after the previous one was released. Writes
/// are recorded and otherwise ignored.
#[derive(Debug)]
pub struct PacedTransport {
    state: SharedState,
    bursts: VecDeque<Vec<u8>>,
    gap: Duration,
    next_release: Option<Instant>,
    zero_reads: u32,
}

impl PacedTransport {
    pub fn new<I>(bursts: I, gap: Duration) -> (Self, MockHandle)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let state = Arc::new(Mutex::new(MockState::default()));
        let handle = MockHandle::new(Arc::clone(&state));
        let transport = Self {
            state,
            bursts: bursts.into_iter().collect(),
            gap,
            next_release: None,
            zero_reads: 0,
        };
        (transport, handle)
    }

    /// Make the next `count` reads return zero bytes even though input is pending.
    #[must_use]
    pub fn with_zero_reads(mut self, count: u32) -> Self {
        self.zero_reads = count;
        self
    }

    /// Bursts not released yet.
    pub fn remaining_bursts(&self) -> usize {
        self.bursts.len()
    }

    fn release_due(&mut self, state: &mut MockState) {
        if !state.incoming.is_empty() {
            return;
        }
        let Some(due) = self.next_release else {
            return;
        };
        if Instant::now() < due {
            return;
        }
        if let Some(burst) = self.bursts.pop_front() {
            state.incoming.extend(burst);
            self.next_release = Some(Instant::now() + self.gap);
        }
    }
}

impl Transport for PacedTransport {
    fn tag(&self) -> &str {
        "paced"
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    async fn open(&mut self) -> Result<bool> {
        let opened = lock(&self.state).open();
        if opened && self.next_release.is_none() {
            self.next_release = Some(Instant::now());
        }
        Ok(opened)
    }

    async fn close(&mut self) -> Result<bool> {
        Ok(lock(&self.state).close())
    }

    fn available(&mut self) -> usize {
        let state_handle = Arc::clone(&self.state);
        let mut state = lock(&state_handle);
        if !state.open {
            return 0;
        }
        self.release_due(&mut state);
        state.incoming.len()
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        state.read_calls += 1;
        if !state.open {
            return Err(not_open("paced"));
        }
        if self.zero_reads > 0 {
            self.zero_reads -= 1;
            return Ok(0);
        }
        Ok(state.take_incoming(buf))
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.write_calls += 1;
        if !state.open {
            return Err(not_open("paced"));
        }
        state.record_write(buf);
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

    #[tokio::test(start_paused = true)]
    async fn test_bursts_follow_the_gap() {
        let (mut transport, _handle) =
            PacedTransport::new([b"AB".to_vec(), b"CD".to_vec()], Duration::from_millis(50));
        transport.open().await.unwrap();

        assert_eq!(transport.available(), 2);
        let mut buffer = [0u8; 8];
        assert_eq!(transport.read(&mut buffer).await.unwrap(), 2);

        assert_eq!(transport.available(), 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.available(), 2);
        assert_eq!(transport.remaining_bursts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_reads_keep_input() {
        let (transport, handle) = PacedTransport::new([b"XY".to_vec()], Duration::ZERO);
        let mut transport = transport.with_zero_reads(1);
        transport.open().await.unwrap();

        let mut buffer = [0u8; 2];
        assert_eq!(transport.available(), 2);
        assert_eq!(transport.read(&mut buffer).await.unwrap(), 0);
        assert_eq!(transport.read(&mut buffer).await.unwrap(), 2);
        assert_eq!(handle.read_calls(), 2);
    }
}
