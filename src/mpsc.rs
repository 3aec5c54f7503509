//! Many-producer/single-consumer fan-in built from one [`Ring`] per producer.
//!
//! Each worker owns exactly one `Mpsc<T>` as its inbox, reached through a
//! shared `Arc` so every other worker (and the controller) can enqueue into
//! it. Only the owning worker ever calls the consumer-side methods
//! (`flush`/`dequeue`/`flushed`); `flushed` therefore uses the same
//! single-writer `UnsafeCell` discipline as `Ring`'s head/tail cache, rather
//! than a lock, so the owner can call it through a shared reference.

use std::cell::UnsafeCell;

use crate::ring::Ring;

pub struct Mpsc<T> {
    queues: Vec<Ring<T>>,
    // SAFETY: only the single designated consumer thread ever touches this.
    flushed: UnsafeCell<Vec<T>>,
}

unsafe impl<T: Send> Send for Mpsc<T> {}
unsafe impl<T: Send> Sync for Mpsc<T> {}

impl<T> Mpsc<T> {
    /// `width` is the number of producer slots (workers + controller).
    pub fn new(width: usize) -> Self {
        let mut queues = Vec::with_capacity(width);
        for _ in 0..width {
            queues.push(Ring::new());
        }

        Mpsc {
            queues,
            flushed: UnsafeCell::new(Vec::new()),
        }
    }

    /// Producer-only: push into the ring dedicated to `producer_idx`. Only
    /// the thread identified by `producer_idx` may call this. Spin-retries
    /// on backpressure per the saturation policy (ring sized for load factor
    /// 6 in-flight jobs, so this should not spin in practice).
    pub fn enqueue(&self, value: T, producer_idx: usize) {
        let mut value = value;
        loop {
            match self.queues[producer_idx].push(value) {
                Ok(()) => return,
                Err(rejected) => {
                    value = rejected;
                    std::thread::yield_now();
                }
            }
        }
    }

    #[allow(clippy::mut_from_ref)]
    fn flushed_mut(&self) -> &mut Vec<T> {
        // SAFETY: only the owning worker thread calls any method that
        // reaches this, and it never does so reentrantly.
        unsafe { &mut *self.flushed.get() }
    }

    /// Consumer-only: drain every producer ring into the private `flushed`
    /// buffer, which is popped in LIFO order so the newest jobs (often a
    /// back-prop finishing a path) are served first.
    pub fn flush(&self) {
        let flushed = self.flushed_mut();
        for queue in &self.queues {
            while let Some(item) = queue.pop() {
                flushed.push(item);
            }
        }
    }

    /// Consumer-only: spin-flush until at least one item is available, then
    /// pop it from the tail (LIFO).
    pub fn dequeue(&self) -> T {
        let mut backoff = 0u32;
        while self.flushed_mut().is_empty() {
            self.flush();
            if self.flushed_mut().is_empty() {
                backoff = backoff.saturating_add(1);
                if backoff < 64 {
                    std::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
            }
        }

        self.flushed_mut().pop().expect("just checked non-empty")
    }

    /// Consumer-only: read-only view for steal decisions.
    pub fn flushed(&self) -> &[T] {
        self.flushed_mut()
    }
}
