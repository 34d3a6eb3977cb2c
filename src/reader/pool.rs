//! Shared buffer pool for asynchronous reads
//!
//! A buffer is borrowed for one refill and returned when its guard drops,
//! so every exit path (completion, error, cancellation, a dropped future)
//! gives it back. `outstanding()` counts buffers currently borrowed.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<Box<[u8]>>>,
    buffer_size: usize,
    retain: usize,
    outstanding: AtomicUsize,
    created: AtomicUsize,
}

/// Cheaply cloneable handle to a shared pool
#[derive(Debug, Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Creates a pool handing out `buffer_size` byte buffers and keeping at
    /// most `retain` idle buffers.
    pub fn new(buffer_size: usize, retain: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                buffer_size: buffer_size.max(1),
                retain,
                outstanding: AtomicUsize::new(0),
                created: AtomicUsize::new(0),
            }),
        }
    }

    /// Borrows a buffer, allocating one if none is idle
    pub fn acquire(&self) -> PooledBuffer {
        let reused = match self.inner.free.lock() {
            Ok(mut free) => free.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        };
        let buf = reused.unwrap_or_else(|| {
            self.inner.created.fetch_add(1, Ordering::Relaxed);
            trace!(size = self.inner.buffer_size, "pool buffer created");
            vec![0u8; self.inner.buffer_size].into_boxed_slice()
        });
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        PooledBuffer {
            buf: Some(buf),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Buffers currently borrowed
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Idle buffers kept for reuse
    pub fn retained(&self) -> usize {
        match self.inner.free.lock() {
            Ok(free) => free.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Buffers allocated over the pool's lifetime
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::Relaxed)
    }

    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }
}

/// A borrowed buffer, returned to its pool on drop
#[derive(Debug)]
pub struct PooledBuffer {
    buf: Option<Box<[u8]>>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            let mut free = match self.pool.free.lock() {
                Ok(free) => free,
                Err(poisoned) => poisoned.into_inner(),
            };
            if free.len() < self.pool.retain {
                free.push(buf);
            }
        }
        self.pool.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}
