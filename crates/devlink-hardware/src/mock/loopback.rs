//! Loopback transport: everything written becomes readable.

use super::{MockHandle, MockState, SharedState, lock};
use crate::error::{Result, not_open};
use crate::traits::Transport;
use std::io;
use std::sync::{Arc, Mutex};

/// In-memory transport that echoes writes back as input.
#[derive(Debug)]
pub struct LoopbackTransport {
    state: SharedState,
}

impl LoopbackTransport {
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let handle = MockHandle::new(Arc::clone(&state));
        (Self { state }, handle)
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new().0
    }
}

impl Transport for LoopbackTransport {
    fn tag(&self) -> &str {
        "loopback"
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    async fn open(&mut self) -> Result<bool> {
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
        if !state.open {
            return Err(not_open("loopback"));
        }
        Ok(state.take_incoming(buf))
    }

    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.write_calls += 1;
        if !state.open {
            return Err(not_open("loopback"));
        }
        state.record_write(buf);
        state.incoming.extend(buf.iter().copied());
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        lock(&self.state).incoming.clear();
        Ok(())
    }

    fn release(&mut self) {
        let mut state = lock(&self.state);
        state.open = false;
        state.releases += 1;
    }
}
