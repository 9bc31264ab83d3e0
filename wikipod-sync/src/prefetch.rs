//! Prefetch queue.
//!
//! Titles discovered by a listing are queued here and fetched one at a time
//! in the background so that a later `load` can be answered from memory. A
//! title stays tracked from `enqueue` until `release`, which covers the time
//! it is being fetched; enqueueing a tracked title is a no-op.

use rand::Rng;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

/// Deduplicating FIFO of titles awaiting a background fetch.
#[derive(Debug, Default)]
pub struct PrefetchQueue {
    queue: VecDeque<String>,
    tracked: HashSet<String>,
}

impl PrefetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a title. Returns false if it was already tracked.
    pub fn enqueue(&mut self, title: &str) -> bool {
        if !self.tracked.insert(title.to_string()) {
            return false;
        }
        self.queue.push_back(title.to_string());
        true
    }

    /// Takes the next title. It stays tracked until [`release`](Self::release).
    pub fn pop(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    /// Forgets a title once its fetch has finished, successfully or not.
    pub fn release(&mut self, title: &str) {
        self.tracked.remove(title);
    }

    /// Returns true while a title is queued or being fetched.
    pub fn is_tracked(&self, title: &str) -> bool {
        self.tracked.contains(title)
    }

    /// Number of titles waiting (in-flight titles excluded).
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.tracked.clear();
    }
}

/// Delay before the next pump wake-up: `base` plus up to `jitter` extra, so
/// sessions sharing a pod don't fetch in lockstep.
pub fn jittered_delay(base: Duration, jitter: Duration) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    if jitter_ms == 0 {
        return base;
    }
    base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
}
