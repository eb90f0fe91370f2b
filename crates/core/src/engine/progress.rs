//! Atomically updated progress scalar.
//!
//! Progress is written by the worker thread during ticks and read by the
//! driver thread every frame. Storing the f64 bit pattern in an `AtomicU64`
//! rules out torn reads without making readers take the engine lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// A fractional progress value in `[0, 1]`, shared between threads.
///
/// There is a single writer (the worker thread); any number of threads may
/// read concurrently.
#[derive(Debug, Default)]
pub struct AtomicProgress(AtomicU64);

impl AtomicProgress {
    /// A progress value starting at `0.0`.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Overwrite the value.
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    /// Add `delta` to the value.
    ///
    /// Not a fetch-add: correctness relies on the single-writer contract.
    pub fn add(&self, delta: f64) {
        self.set(self.get() + delta);
    }
}
