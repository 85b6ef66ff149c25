//! Growable byte accumulator used to assemble multi-chunk reads.
//!
//! [`ByteArrayBuilder`] only ever grows between two [`clear`](ByteArrayBuilder::clear)
//! calls. Appends always land at the end, regardless of the read cursor, so
//! bytes already appended are never overwritten. The cursor exists for callers
//! that re-parse previously appended data with [`rewind`](ByteArrayBuilder::rewind),
//! [`seek`](ByteArrayBuilder::seek) and [`read_bytes`](ByteArrayBuilder::read_bytes).
//!
//! # Examples
//!
//! ```
//! use devlink_core::ByteArrayBuilder;
//!
//! let mut builder = ByteArrayBuilder::new();
//! builder.append(0x02).append_slice(b"PING").append(0x03);
//!
//! assert_eq!(builder.to_vec(), b"\x02PING\x03");
//!
//! builder.rewind();
//! assert_eq!(builder.read_bytes(1).unwrap(), vec![0x02]);
//! ```

use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Append-only byte buffer with a read cursor.
#[derive(Debug, Clone, Default)]
pub struct ByteArrayBuilder {
    store: BytesMut,
    position: usize,
}

impl ByteArrayBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty builder with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: BytesMut::with_capacity(capacity),
            position: 0,
        }
    }

    /// Number of bytes appended since construction or the last [`clear`](Self::clear).
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` when nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Append a single byte.
    pub fn append(&mut self, byte: u8) -> &mut Self {
        self.store.put_u8(byte);
        self
    }

    /// Append a slice of bytes.
    pub fn append_slice(&mut self, bytes: &[u8]) -> &mut Self {
        self.store.put_slice(bytes);
        self
    }

    /// Drop the backing store and start over with an empty one.
    pub fn clear(&mut self) {
        self.store = BytesMut::new();
        self.position = 0;
    }

    /// Move the read cursor back to the first byte.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Move the read cursor to `position`.
    ///
    /// Seeking past the end is allowed; the next [`read_bytes`](Self::read_bytes)
    /// call reports the underflow.
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Current read cursor.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Read `count` bytes at the cursor and advance it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferUnderflow`] if fewer than `count` bytes remain
    /// after the cursor. The cursor does not move in that case.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let remaining = self.store.len().saturating_sub(self.position);
        if count > remaining {
            return Err(Error::BufferUnderflow {
                requested: count,
                remaining,
            });
        }

        let data = self.store[self.position..self.position + count].to_vec();
        self.position += count;
        Ok(data)
    }

    /// Borrow the appended bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.store
    }

    /// Copy exactly the appended bytes, in append order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.store.to_vec()
    }

    /// Consume the builder and return the appended bytes without copying.
    #[must_use]
    pub fn freeze(self) -> Bytes {
        self.store.freeze()
    }
}

impl Extend<u8> for ByteArrayBuilder {
    fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
        for byte in iter {
            self.store.put_u8(byte);
        }
    }
}

impl<'a> Extend<&'a u8> for ByteArrayBuilder {
    fn extend<I: IntoIterator<Item = &'a u8>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

impl From<&[u8]> for ByteArrayBuilder {
    fn from(bytes: &[u8]) -> Self {
        let mut builder = Self::with_capacity(bytes.len());
        builder.append_slice(bytes);
        builder
    }
}

/// Hex dump, two uppercase digits per byte separated by spaces.
impl fmt::Display for ByteArrayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.store.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}
