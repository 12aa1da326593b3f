//! Receive byte buffer
//!
//! Bytes read off the link are appended at the tail, the parser looks ahead
//! without copying and discards from the front once it has decided what the
//! bytes were. Backed by a single `BytesMut`, so consuming from the front is
//! an O(1) cursor move and a peek never reallocates.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// Buffer errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BufferError {
    #[error("Buffer overflow: {requested} bytes requested, {free} free")]
    Overflow { requested: usize, free: usize },
}

/// Bounded lookahead/consume byte accumulator
pub struct ByteRingBuffer {
    /// Buffered bytes, oldest first
    buf: BytesMut,
    /// Maximum number of bytes held at once
    capacity: usize,
}

impl ByteRingBuffer {
    /// Create a buffer holding at most `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        ByteRingBuffer {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append bytes at the tail
    pub fn extend(&mut self, data: &[u8]) -> Result<(), BufferError> {
        if data.len() > self.free() {
            return Err(BufferError::Overflow {
                requested: data.len(),
                free: self.free(),
            });
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Number of buffered bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of bytes the buffer may hold
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Room left before `extend` starts refusing data
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// First `n` bytes, without removing them
    #[inline]
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        self.buf.get(..n)
    }

    /// First two bytes as a little-endian `u16`, without removing them
    #[inline]
    pub fn peek16(&self) -> Option<u16> {
        self.peek(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    /// Discard the first `n` bytes (or everything, if fewer are buffered)
    #[inline]
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
    }

    /// Remove and return the first `n` bytes without copying them.
    ///
    /// Returns `None` and leaves the buffer untouched if fewer are buffered.
    pub fn take(&mut self, n: usize) -> Option<Bytes> {
        if self.buf.len() < n {
            return None;
        }
        Some(self.buf.split_to(n).freeze())
    }

    /// Discard everything
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl std::fmt::Debug for ByteRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteRingBuffer")
            .field("len", &self.buf.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_peek_consume() {
        let mut ring = ByteRingBuffer::with_capacity(16);
        ring.extend(&[1, 2, 3, 4]).unwrap();

        assert_eq!(ring.len(), 4);
        assert_eq!(ring.peek(2), Some(&[1u8, 2][..]));
        assert_eq!(ring.peek(5), None);

        ring.consume(1);
        assert_eq!(ring.peek(3), Some(&[2u8, 3, 4][..]));
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_peek16_little_endian() {
        let mut ring = ByteRingBuffer::with_capacity(16);
        assert_eq!(ring.peek16(), None);
        ring.extend(&[0xAA]).unwrap();
        assert_eq!(ring.peek16(), None);
        ring.extend(&[0xD5]).unwrap();
        assert_eq!(ring.peek16(), Some(0xD5AA));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut ring = ByteRingBuffer::with_capacity(4);
        ring.extend(&[0; 3]).unwrap();
        assert_eq!(ring.free(), 1);

        let err = ring.extend(&[0; 2]).unwrap_err();
        assert_eq!(
            err,
            BufferError::Overflow {
                requested: 2,
                free: 1
            }
        );
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn test_consume_frees_space() {
        let mut ring = ByteRingBuffer::with_capacity(4);
        ring.extend(&[1, 2, 3, 4]).unwrap();
        ring.consume(3);
        ring.extend(&[5, 6, 7]).unwrap();
        assert_eq!(ring.peek(4), Some(&[4u8, 5, 6, 7][..]));
    }

    #[test]
    fn test_consume_more_than_len() {
        let mut ring = ByteRingBuffer::with_capacity(8);
        ring.extend(&[1, 2]).unwrap();
        ring.consume(10);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_take() {
        let mut ring = ByteRingBuffer::with_capacity(8);
        ring.extend(b"abcdef").unwrap();

        assert_eq!(ring.take(7), None);
        assert_eq!(ring.len(), 6);

        let head = ring.take(4).unwrap();
        assert_eq!(&head[..], b"abcd");
        assert_eq!(ring.peek(2), Some(&b"ef"[..]));
    }

    #[test]
    fn test_clear() {
        let mut ring = ByteRingBuffer::with_capacity(8);
        ring.extend(b"abc").unwrap();
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.free(), 8);
    }
}
