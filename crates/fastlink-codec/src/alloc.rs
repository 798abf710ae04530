//! Pluggable memory pools for frame buffers.
//!
//! Every buffer the encoder or decoder borrows goes through an [`Allocator`]
//! and is handed back exactly once, on success and on error alike. The
//! [`PooledBuf`] guard makes that release unconditional.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use bytes::BytesMut;

/// Allocates and releases byte buffers.
///
/// Implementations are shared by every encoder and decoder of a codec
/// factory and must tolerate concurrent calls.
pub trait Allocator: Send + Sync {
    /// Return a buffer whose length is exactly `size`.
    ///
    /// The capacity may be larger, never smaller.
    fn alloc(&self, size: usize) -> BytesMut;

    /// Give a buffer back to the pool.
    fn free(&self, buf: BytesMut);
}

/// Pass-through allocator: fresh zeroed memory on `alloc`, nothing on `free`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl Allocator for HeapAllocator {
    fn alloc(&self, size: usize) -> BytesMut {
        BytesMut::zeroed(size)
    }

    fn free(&self, _buf: BytesMut) {}
}

const MIN_CLASS_SHIFT: u32 = 6;
const MAX_CLASS_SHIFT: u32 = 17;
const CLASS_COUNT: usize = (MAX_CLASS_SHIFT - MIN_CLASS_SHIFT + 1) as usize;

/// Default number of idle buffers kept per size class.
pub const DEFAULT_MAX_IDLE_PER_CLASS: usize = 32;

/// Bounded, size-classed buffer pool.
///
/// Buffers are bucketed by power-of-two capacity between 64 bytes and
/// 128 KiB, which covers the largest possible frame. An empty class falls
/// back to a fresh allocation; a full class drops the returned buffer.
#[derive(Debug)]
pub struct PoolAllocator {
    classes: Vec<Mutex<Vec<BytesMut>>>,
    max_idle_per_class: usize,
}

impl PoolAllocator {
    /// Create a pool with [`DEFAULT_MAX_IDLE_PER_CLASS`] idle slots per class.
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_MAX_IDLE_PER_CLASS)
    }

    /// Create a pool keeping at most `max_idle_per_class` buffers per class.
    pub fn with_max_idle(max_idle_per_class: usize) -> Self {
        Self {
            classes: (0..CLASS_COUNT).map(|_| Mutex::new(Vec::new())).collect(),
            max_idle_per_class,
        }
    }

    /// Number of idle buffers currently held across all classes.
    pub fn idle(&self) -> usize {
        self.classes
            .iter()
            .map(|class| class.lock().map(|bufs| bufs.len()).unwrap_or(0))
            .sum()
    }

    // Smallest class whose buffers are guaranteed to hold `size` bytes.
    fn class_for_alloc(size: usize) -> Option<usize> {
        let shift = size.next_power_of_two().trailing_zeros().max(MIN_CLASS_SHIFT);
        (shift <= MAX_CLASS_SHIFT).then(|| (shift - MIN_CLASS_SHIFT) as usize)
    }

    // Largest class a buffer of `capacity` bytes can serve.
    fn class_for_free(capacity: usize) -> Option<usize> {
        if capacity < (1 << MIN_CLASS_SHIFT) {
            return None;
        }
        let shift = (usize::BITS - 1 - capacity.leading_zeros()).min(MAX_CLASS_SHIFT);
        Some((shift - MIN_CLASS_SHIFT) as usize)
    }
}

impl Default for PoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for PoolAllocator {
    fn alloc(&self, size: usize) -> BytesMut {
        if size == 0 {
            return BytesMut::new();
        }
        let Some(class) = Self::class_for_alloc(size) else {
            return BytesMut::zeroed(size);
        };

        let reused = self.classes[class]
            .lock()
            .ok()
            .and_then(|mut bufs| bufs.pop());
        let mut buf = reused.unwrap_or_else(|| {
            BytesMut::with_capacity(1 << (class as u32 + MIN_CLASS_SHIFT))
        });
        buf.clear();
        buf.resize(size, 0);
        buf
    }

    fn free(&self, buf: BytesMut) {
        let Some(class) = Self::class_for_free(buf.capacity()) else {
            return;
        };
        if let Ok(mut bufs) = self.classes[class].lock() {
            if bufs.len() < self.max_idle_per_class {
                bufs.push(buf);
            }
        }
    }
}

/// A buffer borrowed from an [`Allocator`], released when dropped.
pub struct PooledBuf<'a> {
    allocator: &'a dyn Allocator,
    buf: BytesMut,
}

impl<'a> PooledBuf<'a> {
    /// Borrow `size` bytes from `allocator`.
    pub fn new(allocator: &'a dyn Allocator, size: usize) -> Self {
        let buf = allocator.alloc(size);
        debug_assert_eq!(buf.len(), size, "allocator returned wrong length");
        Self { allocator, buf }
    }
}

impl Deref for PooledBuf<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuf<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuf<'_> {
    fn drop(&mut self) {
        self.allocator.free(std::mem::take(&mut self.buf));
    }
}
