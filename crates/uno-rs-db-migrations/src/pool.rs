//! Reusable scratch buffers.
//!
//! The script parser accumulates statement text in a `String` per parse. A
//! [`BufferPool`] keeps released buffers (with their capacity) so repeated
//! parses over a directory of migrations do not reallocate from scratch.
//!
//! A [`PooledBuffer`] is an RAII guard: it derefs to `String` and returns the
//! buffer to its pool when dropped. The guard borrows the pool and is not
//! `Clone`, so a borrowed buffer belongs to exactly one parse at a time and
//! must not be shared across concurrent parses.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

/// Initial capacity of freshly allocated buffers.
pub const DEFAULT_BUFFER_CAPACITY: usize = 16 * 1024;

/// Maximum number of idle buffers kept by default.
pub const DEFAULT_MAX_IDLE: usize = 8;

/// A pool of reusable `String` buffers.
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<String>>,
    capacity: usize,
    max_idle: usize,
}

impl BufferPool {
    /// Creates a pool whose new buffers start with `capacity` bytes.
    pub fn new(capacity: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            capacity,
            max_idle,
        }
    }

    /// Takes a cleared buffer from the pool, allocating one if none is idle.
    pub fn acquire(&self) -> PooledBuffer<'_> {
        let buf = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| String::with_capacity(self.capacity));
        PooledBuffer { pool: self, buf }
    }

    /// Number of buffers currently waiting to be reused.
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, mut buf: String) {
        buf.clear();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_IDLE)
    }
}

/// A buffer on loan from a [`BufferPool`].
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: String,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let pool = BufferPool::default();
        assert_eq!(pool.idle_count(), 0);
        {
            let mut buf = pool.acquire();
            buf.push_str("SELECT 1;");
            assert_eq!(buf.as_str(), "SELECT 1;");
        }
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_released_buffer_is_cleared_and_reused() {
        let pool = BufferPool::new(64, 4);
        {
            let mut buf = pool.acquire();
            buf.push_str("leftover");
        }
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 64);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_max_idle_bound() {
        let pool = BufferPool::new(8, 1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 1);
    }
}
