use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::BufferError;

/// Circular byte buffer with `N - 1` usable slots.
///
/// `head` is only ever written by the producer and `tail` only by the consumer. The indices are
/// atomics accessed with plain `load`/`store`, so no read-modify-write support is needed from
/// the core.
///
/// Use [`RingBuffer::write`] and [`RingBuffer::read`] when a single context owns the buffer, or
/// [`RingBuffer::split`] to hand the two ends to different execution contexts.
pub struct RingBuffer<const N: usize> {
    storage: [UnsafeCell<u8>; N],
    head: AtomicUsize,
    tail: AtomicUsize,
}

// Safety: a slot is written by the producer strictly before `head` is published past it, and
// read by the consumer strictly before `tail` is published past it, so the two ends never touch
// the same slot at the same time. `split` hands out at most one of each end.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    pub const fn new() -> Self {
        const { assert!(N >= 2, "a ring buffer needs at least two slots") };
        Self {
            storage: [const { UnsafeCell::new(0) }; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    #[inline(always)]
    const fn advance(index: usize) -> usize {
        if index + 1 >= N { 0 } else { index + 1 }
    }

    /// Stores `value` at `head` and advances it, or reports `Overflow` leaving everything untouched.
    pub fn write(&mut self, value: u8) -> Result<(), BufferError> {
        // exclusive borrow, so we are trivially the only producer
        unsafe { self.push(value) }
    }

    /// Returns the byte at `tail` and advances it, or reports `Underflow` leaving `tail` untouched.
    ///
    /// `read().unwrap_or_default()` yields the zero sentinel on underflow.
    pub fn read(&mut self) -> Result<u8, BufferError> {
        // exclusive borrow, so we are trivially the only consumer
        unsafe { self.pop() }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        Self::advance(self.head.load(Ordering::Acquire)) == self.tail.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    /// Number of bytes currently resident.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + N - tail) % N
    }

    /// Usable slots, always `N - 1`.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Split into the producer end (owns `head`) and the consumer end (owns `tail`).
    ///
    /// Each end can be moved to a different execution context. While they exist the buffer
    /// itself stays mutably borrowed, so no second producer or consumer can be created.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let buffer: &RingBuffer<N> = self;
        (Producer { buffer }, Consumer { buffer })
    }

    /// # Safety
    ///
    /// Must only be called by the single producer of this buffer.
    unsafe fn push(&self, value: u8) -> Result<(), BufferError> {
        let head = self.head.load(Ordering::Relaxed);
        let next = Self::advance(head);
        if next == self.tail.load(Ordering::Acquire) {
            return Err(BufferError::Overflow);
        }

        unsafe {
            *self.storage[head].get() = value;
        }
        self.head.store(next, Ordering::Release);
        Ok(())
    }

    /// # Safety
    ///
    /// Must only be called by the single consumer of this buffer.
    unsafe fn pop(&self) -> Result<u8, BufferError> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return Err(BufferError::Underflow);
        }

        let value = unsafe { *self.storage[tail].get() };
        self.tail.store(Self::advance(tail), Ordering::Release);
        Ok(value)
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for RingBuffer<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Writing end of a split [`RingBuffer`]. Sole writer of `head`.
pub struct Producer<'a, const N: usize> {
    buffer: &'a RingBuffer<N>,
}

impl<const N: usize> Producer<'_, N> {
    #[inline]
    pub fn write(&mut self, value: u8) -> Result<(), BufferError> {
        // `Producer` is neither `Clone` nor `Copy` and `split` hands out exactly one
        unsafe { self.buffer.push(value) }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

/// Reading end of a split [`RingBuffer`]. Sole writer of `tail`.
pub struct Consumer<'a, const N: usize> {
    buffer: &'a RingBuffer<N>,
}

impl<const N: usize> Consumer<'_, N> {
    #[inline]
    pub fn read(&mut self) -> Result<u8, BufferError> {
        // `Consumer` is neither `Clone` nor `Copy` and `split` hands out exactly one
        unsafe { self.buffer.pop() }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub const fn capacity(&self) -> usize {
        N - 1
    }
}
