//! Fixed-capacity byte rings
//!
//! [`RingBuffer`] is the plain data structure. [`SharedRing`] wraps it in a
//! critical-section mutex so one side can live in an interrupt handler and
//! the other in the foreground loop. Every operation holds the lock only for
//! the duration of a single push or pop.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

/// The ring was full; the byte was not stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Overrun;

/// Circular byte buffer holding up to `N` bytes
#[derive(Debug, Clone)]
pub struct RingBuffer<const N: usize> {
    data: [u8; N],
    read: usize,
    write: usize,
    len: usize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    /// Create an empty ring
    pub const fn new() -> Self {
        Self {
            data: [0; N],
            read: 0,
            write: 0,
            len: 0,
        }
    }

    /// Maximum number of bytes held at once
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes currently stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Free space in bytes
    pub fn free(&self) -> usize {
        N - self.len
    }

    /// Append a byte at the write end
    pub fn push(&mut self, byte: u8) -> Result<(), Overrun> {
        if self.is_full() {
            return Err(Overrun);
        }
        self.data[self.write] = byte;
        self.write = (self.write + 1) % N;
        self.len += 1;
        Ok(())
    }

    /// Take the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.data[self.read];
        self.read = (self.read + 1) % N;
        self.len -= 1;
        Some(byte)
    }

    /// Drop all stored bytes
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.len = 0;
    }
}

/// A [`RingBuffer`] shared between interrupt and foreground context
pub struct SharedRing<const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<RingBuffer<N>>>,
}

impl<const N: usize> Default for SharedRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SharedRing<N> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(RingBuffer::new())),
        }
    }

    /// Run `f` on the ring with interrupts masked
    ///
    /// Keep `f` short: it blocks every interrupt handler on this core.
    pub fn with<R>(&self, f: impl FnOnce(&mut RingBuffer<N>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn push(&self, byte: u8) -> Result<(), Overrun> {
        self.with(|ring| ring.push(byte))
    }

    pub fn pop(&self) -> Option<u8> {
        self.with(|ring| ring.pop())
    }

    pub fn len(&self) -> usize {
        self.with(|ring| ring.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with(|ring| ring.is_empty())
    }

    pub fn free(&self) -> usize {
        self.with(|ring| ring.free())
    }

    pub fn clear(&self) {
        self.with(|ring| ring.clear())
    }
}
