//! Fixed-capacity single-producer/single-consumer queue.
//!
//! One thread may call [`Ring::push`], a different (but fixed) thread may call
//! [`Ring::front`] / [`Ring::pop`]. Mixing producers or consumers is undefined
//! behavior from a correctness standpoint (not memory-unsafe, just wrong: the
//! `cached_*` fields assume a single writer).

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

/// Ring capacity. Power of two so index wrapping is a mask, not a division.
pub const CAPACITY: usize = 1024;

const MASK: u64 = (CAPACITY - 1) as u64;

/// Pads a single atomic counter onto its own cache line on both sides, so the
/// producer's writes to `tail` never bounce the consumer's `head` cache line
/// (and vice versa).
#[repr(align(64))]
struct PaddedAtomic {
    value: AtomicU64,
    _pad: [u8; 64 - std::mem::size_of::<AtomicU64>()],
}

impl PaddedAtomic {
    fn new(v: u64) -> Self {
        PaddedAtomic {
            value: AtomicU64::new(v),
            _pad: [0; 64 - std::mem::size_of::<AtomicU64>()],
        }
    }
}

/// Single-producer single-consumer bounded ring buffer.
pub struct Ring<T> {
    head: PaddedAtomic,
    // producer's private view of `head`, avoids a cross-core load on every push
    cached_head: UnsafeCell<u64>,

    tail: PaddedAtomic,
    // consumer's private view of `tail`
    cached_tail: UnsafeCell<u64>,

    buffer: UnsafeCell<[MaybeUninit<T>; CAPACITY]>,
}

unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    pub fn new() -> Self {
        Ring {
            head: PaddedAtomic::new(0),
            cached_head: UnsafeCell::new(0),
            tail: PaddedAtomic::new(0),
            cached_tail: UnsafeCell::new(0),
            buffer: UnsafeCell::new(unsafe { MaybeUninit::uninit().assume_init() }),
        }
    }

    /// Producer-only. Pushes one value; rejects (returning it back) when the
    /// ring is full, so the caller can retry without losing the job.
    pub fn push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.value.load(Ordering::Relaxed);

        // SAFETY: cached_head is only ever written by the producer.
        let cached_head = unsafe { *self.cached_head.get() };
        if tail.wrapping_sub(cached_head) >= CAPACITY as u64 {
            let head = self.head.value.load(Ordering::Acquire);
            // SAFETY: see above; the Acquire load synchronizes with the
            // consumer's Release store to `head`.
            unsafe { *self.cached_head.get() = head };
            if tail.wrapping_sub(head) >= CAPACITY as u64 {
                return Err(value);
            }
        }

        let idx = (tail & MASK) as usize;
        // SAFETY: slot `idx` is not reachable by the consumer until `tail` is
        // published below, and only the producer ever writes to it.
        unsafe {
            let buf = &mut *self.buffer.get();
            buf[idx].write(value);
        }

        self.tail.value.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Consumer-only. Peek at the next value without removing it.
    pub fn front(&self) -> Option<&T> {
        let head = self.head.value.load(Ordering::Relaxed);

        // SAFETY: cached_tail is only ever written by the consumer.
        let mut cached_tail = unsafe { *self.cached_tail.get() };
        if head == cached_tail {
            cached_tail = self.tail.value.load(Ordering::Acquire);
            // SAFETY: see above; Acquire synchronizes with the producer's
            // Release store to `tail`.
            unsafe { *self.cached_tail.get() = cached_tail };
            if head == cached_tail {
                return None;
            }
        }

        let idx = (head & MASK) as usize;
        // SAFETY: slot `idx` was published by the producer's Release store to
        // `tail`, observed above via the Acquire load (or a prior one).
        unsafe {
            let buf = &*self.buffer.get();
            Some(buf[idx].assume_init_ref())
        }
    }

    /// Consumer-only. Removes the front value, if any.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.value.load(Ordering::Relaxed);

        let mut cached_tail = unsafe { *self.cached_tail.get() };
        if head == cached_tail {
            cached_tail = self.tail.value.load(Ordering::Acquire);
            unsafe { *self.cached_tail.get() = cached_tail };
            if head == cached_tail {
                return None;
            }
        }

        let idx = (head & MASK) as usize;
        let value = unsafe {
            let buf = &mut *self.buffer.get();
            buf[idx].assume_init_read()
        };

        self.head.value.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    pub fn is_empty(&self) -> bool {
        self.head.value.load(Ordering::Acquire) == self.tail.value.load(Ordering::Acquire)
    }
}

impl<T> Default for Ring<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let head = *self.head.value.get_mut();
        let tail = *self.tail.value.get_mut();

        let mut pos = head;
        while pos != tail {
            let idx = (pos & MASK) as usize;
            unsafe {
                let buf = &mut *self.buffer.get();
                buf[idx].assume_init_drop();
            }
            pos = pos.wrapping_add(1);
        }
    }
}
