//! Finite, non-restartable item source with optional self-throttling.
//!
//! A [`ThrottledSource`] walks a word list once. In soft-limited mode every
//! emitted [`Item`] carries a [`Lease`](scrabble_core::Lease) on the shared
//! [`OutstandingCounter`]; before emitting, the source waits while too many
//! items are still in flight. Waiting escalates from yields to a 1 ms sleep,
//! and a source that keeps waiting past its budget aborts the run.

use std::fmt;
use std::iter::Peekable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use scrabble_core::{BenchConfig, Item, OutstandingCounter};
use tracing::{debug, error, warn};

use crate::error::SourceError;

/// Words fed into a source.
pub type WordIter = Box<dyn Iterator<Item = String> + Send>;

/// Soft-limit throttling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    pub soft_limit: usize,
    /// Outstanding items tolerated above `soft_limit` before waiting.
    pub slack: usize,
    /// Yield rounds before escalating to a sleep.
    pub wait_budget: u32,
    /// Waits past the budget tolerated before the source gives up.
    pub max_stalls: u32,
}

impl ThrottleConfig {
    pub fn limit(&self) -> usize {
        self.soft_limit + self.slack
    }
}

impl From<&BenchConfig> for ThrottleConfig {
    fn from(config: &BenchConfig) -> Self {
        Self {
            soft_limit: config.soft_limit,
            slack: config.slack,
            wait_budget: config.wait_budget,
            max_stalls: config.max_stalls,
        }
    }
}

/// Throttling mode of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// Emit immediately.
    Unthrottled,
    /// Wait while `outstanding >= soft_limit + slack`.
    SoftLimited(ThrottleConfig),
    /// Emit at most the first N items.
    Capped(usize),
}

impl Throttle {
    /// Pick the mode from config: a wait budget enables soft limiting,
    /// otherwise `max_items` caps the stream.
    pub fn from_config(config: &BenchConfig) -> Self {
        if config.is_throttled() {
            Throttle::SoftLimited(ThrottleConfig::from(config))
        } else if let Some(n) = config.max_items {
            Throttle::Capped(n)
        } else {
            Throttle::Unthrottled
        }
    }
}

/// One draw from the source.
#[derive(Debug)]
pub enum Draw {
    Item(Item),
    /// The wait was interrupted; no word was consumed.
    Vacant,
}

impl Draw {
    pub fn into_item(self) -> Option<Item> {
        match self {
            Draw::Item(item) => Some(item),
            Draw::Vacant => None,
        }
    }
}

/// Handle that interrupts a source while it waits on the outstanding limit.
#[derive(Debug, Clone, Default)]
pub struct Interrupter {
    flag: Arc<AtomicBool>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// Counters describing what a source has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub emitted: usize,
    pub vacancies: usize,
    pub stalls: u32,
    pub peak_outstanding: usize,
}

pub struct ThrottledSource {
    words: Peekable<WordIter>,
    throttle: Throttle,
    remaining: Option<usize>,
    counter: Arc<OutstandingCounter>,
    interrupter: Interrupter,
    stats: SourceStats,
    failed: bool,
}

impl ThrottledSource {
    pub fn new<I>(words: I, throttle: Throttle) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let words: WordIter = Box::new(words.into_iter());
        let remaining = match throttle {
            Throttle::Capped(n) => Some(n),
            _ => None,
        };
        Self {
            words: words.peekable(),
            throttle,
            remaining,
            counter: OutstandingCounter::new(),
            interrupter: Interrupter::default(),
            stats: SourceStats::default(),
            failed: false,
        }
    }

    /// Build the source the config asks for. `max_items` also caps a
    /// soft-limited source.
    pub fn from_config<I>(words: I, config: &BenchConfig) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        let throttle = Throttle::from_config(config);
        let source = Self::new(words, throttle);
        match (throttle, config.max_items) {
            (Throttle::SoftLimited(_), Some(n)) => source.with_cap(n),
            _ => source,
        }
    }

    /// Stop after `n` more items.
    pub fn with_cap(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    /// Share an existing counter instead of the source's own.
    pub fn with_counter(mut self, counter: Arc<OutstandingCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn counter(&self) -> Arc<OutstandingCounter> {
        Arc::clone(&self.counter)
    }

    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    pub fn throttle(&self) -> Throttle {
        self.throttle
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            peak_outstanding: self.counter.peak(),
            ..self.stats
        }
    }

    /// Wait while the outstanding limit is reached.
    ///
    /// Returns `Ok(false)` when an interrupt arrived during the wait.
    fn wait_for_credit(&mut self, cfg: ThrottleConfig) -> Result<bool, SourceError> {
        let limit = cfg.limit();
        let mut round = 0u32;
        while round <= cfg.wait_budget && self.counter.current() >= limit {
            if self.interrupter.take() {
                return Ok(false);
            }
            if round < cfg.wait_budget {
                thread::yield_now();
            } else {
                thread::sleep(Duration::from_millis(1));
            }
            round += 1;
        }

        if round > cfg.wait_budget {
            self.stats.stalls += 1;
            debug!(stalls = self.stats.stalls, outstanding = self.counter.current(), "source waited past budget");
            if self.stats.stalls > cfg.max_stalls {
                error!(
                    stalls = self.stats.stalls,
                    limit = cfg.max_stalls,
                    "consumer stalled, aborting run"
                );
                return Err(SourceError::Stalled {
                    stalls: self.stats.stalls,
                    limit: cfg.max_stalls,
                });
            }
        }
        Ok(true)
    }

    fn take_word(&mut self) -> Option<String> {
        if self.remaining == Some(0) {
            return None;
        }
        let word = self.words.next()?;
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        self.stats.emitted += 1;
        Some(word)
    }

    fn has_next(&mut self) -> bool {
        self.remaining != Some(0) && self.words.peek().is_some()
    }
}

impl Iterator for ThrottledSource {
    type Item = Result<Draw, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.has_next() {
            return None;
        }

        match self.throttle {
            Throttle::Unthrottled | Throttle::Capped(_) => {
                self.take_word().map(|word| Ok(Draw::Item(Item::new(word))))
            }
            Throttle::SoftLimited(cfg) => match self.wait_for_credit(cfg) {
                Ok(true) => {
                    let lease = self.counter.acquire();
                    self.take_word()
                        .map(|word| Ok(Draw::Item(Item::leased(word, lease))))
                }
                Ok(false) => {
                    // Interrupted: the word stays in place for the next draw.
                    self.stats.vacancies += 1;
                    warn!(vacancies = self.stats.vacancies, "source wait interrupted, yielding vacant slot");
                    Some(Ok(Draw::Vacant))
                }
                Err(e) => {
                    self.failed = true;
                    Some(Err(e))
                }
            },
        }
    }
}

impl fmt::Debug for ThrottledSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottledSource")
            .field("throttle", &self.throttle)
            .field("remaining", &self.remaining)
            .field("outstanding", &self.counter.current())
            .field("stats", &self.stats)
            .finish()
    }
}
