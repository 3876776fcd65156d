//! Work items and the outstanding-item accounting used for backpressure.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts items emitted by a source but not yet disposed.
///
/// Only the source acquires leases, so `peak` is the highest value the
/// counter reached right after an emit.
#[derive(Debug, Default)]
pub struct OutstandingCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl OutstandingCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    /// Take one unit of outstanding credit. Released when the lease drops.
    pub fn acquire(self: &Arc<Self>) -> Lease {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        Lease { counter: Arc::clone(self) }
    }
}

/// One unit of outstanding credit held by an in-flight item.
pub struct Lease {
    counter: Arc<OutstandingCounter>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.counter.current.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("outstanding", &self.counter.current())
            .finish()
    }
}

/// A word drawn from the source, optionally holding outstanding credit.
#[derive(Debug)]
pub struct Item {
    word: String,
    lease: Option<Lease>,
}

impl Item {
    /// An item that does not take part in outstanding accounting.
    pub fn new(word: impl Into<String>) -> Self {
        Self { word: word.into(), lease: None }
    }

    pub fn leased(word: impl Into<String>, lease: Lease) -> Self {
        Self { word: word.into(), lease: Some(lease) }
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn is_leased(&self) -> bool {
        self.lease.is_some()
    }

    /// Mark the item consumed, releasing its outstanding credit.
    pub fn dispose(self) {
        drop(self);
    }

    /// Release the credit and keep the word.
    pub fn into_word(self) -> String {
        self.word
    }
}
