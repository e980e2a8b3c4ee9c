//! Randomness providers for key generation.
//!
//! Slug generation draws indices through [`RandomSource`] instead of
//! touching the thread RNG directly, so tests can script the exact
//! sequence of candidates.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Source of uniformly distributed indices.
pub trait RandomSource: Send + Sync + 'static {
    /// Return a value in `0..bound`.  `bound` is always non-zero.
    fn next_int(&self, bound: usize) -> usize;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_int(&self, bound: usize) -> usize {
        rand::thread_rng().gen_range(0..bound)
    }
}

/// Deterministic source that replays a fixed sequence, wrapping around at
/// the end.  Each value is reduced modulo the requested bound.
#[derive(Debug)]
pub struct SequenceRandom {
    values: Vec<usize>,
    cursor: AtomicUsize,
}

impl SequenceRandom {
    /// Build a source replaying `values`.  An empty sequence yields zeros.
    pub fn new(values: Vec<usize>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }

    /// How many values have been drawn so far.
    pub fn draws(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

impl RandomSource for SequenceRandom {
    fn next_int(&self, bound: usize) -> usize {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.values.is_empty() {
            return 0;
        }
        self.values[idx % self.values.len()] % bound
    }
}
