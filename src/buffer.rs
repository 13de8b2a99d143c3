use bytes::{Buf as _, Bytes, BytesMut};

/// Append-only byte accumulator that can be trimmed from the front.
///
/// Appending is amortized O(1); discarding or splitting off a prefix of `k` bytes does not
/// copy the remaining bytes.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn last(&self) -> Option<u8> {
        self.buf.last().copied()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Finds the first occurrence of the 2-byte `marker` starting at offset `from`.
    ///
    /// Returns the offset of the marker's first byte.
    pub fn find(&self, marker: [u8; 2], from: usize) -> Option<usize> {
        if from >= self.buf.len() {
            return None;
        }

        self.buf[from..]
            .windows(2)
            .position(|window| window == marker)
            .map(|pos| pos + from)
    }

    /// Removes the first `n` bytes (clamped to the buffer length).
    pub fn discard(&mut self, n: usize) {
        let n = n.min(self.buf.len());
        self.buf.advance(n);
    }

    /// Removes the first `n` bytes and returns them.
    ///
    /// Panics if `n` is larger than the buffer length.
    pub fn split_prefix(&mut self, n: usize) -> Bytes {
        self.buf.split_to(n).freeze()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
