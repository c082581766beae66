//! Reusable buffer pool for response encoding.
//!
//! Each encode call checks out exactly one buffer and returns it after the
//! response has been written, so buffer capacity is amortized across
//! requests instead of being reallocated per response.

use bytes::BytesMut;
use std::sync::Mutex;

/// Shared pool of reusable encode buffers.
///
/// Checkout is exclusive: a buffer handed out by [`acquire`](Self::acquire)
/// has a single owner until it is passed back to
/// [`release`](Self::release). Released buffers are truncated to zero
/// length but keep their capacity. The pool retains at most `max_idle`
/// buffers; surplus releases simply drop the buffer.
pub struct BufferPool {
    /// Idle buffers (LIFO for cache locality).
    idle: Mutex<Vec<BytesMut>>,
    /// Initial capacity of freshly allocated buffers.
    buffer_size: usize,
    /// Maximum number of idle buffers retained.
    max_idle: usize,
}

impl BufferPool {
    /// Create a new buffer pool.
    ///
    /// # Arguments
    /// * `buffer_size` - Initial capacity of each buffer in bytes
    /// * `max_idle` - Maximum number of idle buffers to retain
    pub fn new(buffer_size: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            buffer_size,
            max_idle,
        }
    }

    /// Check out a buffer, reusing an idle one when available.
    pub fn acquire(&self) -> BytesMut {
        let mut idle = self.idle.lock().unwrap();
        idle.pop()
            .unwrap_or_else(|| BytesMut::with_capacity(self.buffer_size))
    }

    /// Return a buffer to the pool.
    ///
    /// The buffer is reset to zero length; its capacity (including any
    /// growth during encoding) is kept for the next checkout.
    pub fn release(&self, mut buf: BytesMut) {
        buf.clear();
        let mut idle = self.idle.lock().unwrap();
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    /// Initial capacity of freshly allocated buffers.
    #[allow(dead_code)]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of idle buffers currently held.
    #[allow(dead_code)] // exercised by encoder tests
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }
}
