//! Bounded ranked table and the shared aggregator wrapping it.
//!
//! The table maps priority -> items (insertion order kept per priority),
//! iterated in descending priority. In bounded mode it keeps at most
//! `num_save` distinct priorities: a new priority below the current floor is
//! rejected without touching the map, and a new priority above it evicts the
//! whole floor bucket.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::RunError;

/// Retention policy of a [`RankedTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableMode {
    /// Keep at most this many distinct priorities.
    Bounded(usize),
    /// Keep everything.
    Unbounded,
}

/// One bucket of the ranked output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry<T> {
    pub priority: i32,
    pub items: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct RankedTable<T> {
    entries: BTreeMap<Reverse<i32>, Vec<T>>,
    mode: TableMode,
    /// Smallest retained priority, cached for the reject check.
    floor: Option<i32>,
}

impl<T> RankedTable<T> {
    pub fn new(mode: TableMode) -> Self {
        let mode = match mode {
            TableMode::Bounded(n) => TableMode::Bounded(n.max(1)),
            unbounded => unbounded,
        };
        Self { entries: BTreeMap::new(), mode, floor: None }
    }

    pub fn bounded(num_save: usize) -> Self {
        Self::new(TableMode::Bounded(num_save))
    }

    pub fn unbounded() -> Self {
        Self::new(TableMode::Unbounded)
    }

    pub fn mode(&self) -> TableMode {
        self.mode
    }

    /// Insert one scored item. Returns `false` when it was rejected.
    pub fn insert(&mut self, priority: i32, item: T) -> bool {
        let key = Reverse(priority);
        if let TableMode::Bounded(num_save) = self.mode {
            let full = self.entries.len() >= num_save;
            if full && self.floor.is_some_and(|floor| priority < floor) {
                return false;
            }
            if full && !self.entries.contains_key(&key) {
                self.entries.pop_last();
                self.floor = self.entries.last_key_value().map(|(k, _)| k.0);
            }
        }

        self.entries.entry(key).or_default().push(item);
        self.floor = Some(self.floor.map_or(priority, |floor| floor.min(priority)));
        true
    }

    /// Insert a batch. Returns how many were kept at insert time.
    pub fn extend<I>(&mut self, scored: I) -> usize
    where
        I: IntoIterator<Item = (i32, T)>,
    {
        scored
            .into_iter()
            .map(|(priority, item)| self.insert(priority, item))
            .filter(|kept| *kept)
            .count()
    }

    /// Number of distinct priorities retained.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total items across all buckets.
    pub fn item_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Retained priorities, highest first.
    pub fn priorities(&self) -> Vec<i32> {
        self.entries.keys().map(|k| k.0).collect()
    }

    pub fn floor(&self) -> Option<i32> {
        self.floor
    }

    pub fn get(&self, priority: i32) -> Option<&[T]> {
        self.entries.get(&Reverse(priority)).map(Vec::as_slice)
    }

    /// The `k` highest buckets, highest first.
    pub fn top_k(&self, k: usize) -> Vec<RankedEntry<T>>
    where
        T: Clone,
    {
        self.entries
            .iter()
            .take(k)
            .map(|(p, items)| RankedEntry { priority: p.0, items: items.clone() })
            .collect()
    }
}

/// Thread-safe ranked table shared by the workers of a run.
///
/// One lock guards the whole table; every insert is a single critical section.
#[derive(Debug)]
pub struct Aggregator<T> {
    table: Mutex<RankedTable<T>>,
}

impl<T> Aggregator<T> {
    pub fn new(mode: TableMode) -> Self {
        Self { table: Mutex::new(RankedTable::new(mode)) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RankedTable<T>>, RunError> {
        self.table
            .lock()
            .map_err(|e| RunError::LockPoisoned(format!("aggregator lock: {}", e)))
    }

    pub fn insert(&self, priority: i32, item: T) -> Result<bool, RunError> {
        let mut table = self.lock()?;
        Ok(table.insert(priority, item))
    }

    /// Merge a batch of deferred results under one lock acquisition.
    pub fn merge<I>(&self, scored: I) -> Result<usize, RunError>
    where
        I: IntoIterator<Item = (i32, T)>,
    {
        let mut table = self.lock()?;
        Ok(table.extend(scored))
    }

    pub fn top_k(&self, k: usize) -> Result<Vec<RankedEntry<T>>, RunError>
    where
        T: Clone,
    {
        let table = self.lock()?;
        Ok(table.top_k(k))
    }

    /// Copy of the whole table at this instant.
    pub fn snapshot(&self) -> Result<RankedTable<T>, RunError>
    where
        T: Clone,
    {
        let table = self.lock()?;
        Ok(table.clone())
    }

    /// Distinct priorities currently retained.
    pub fn len(&self) -> Result<usize, RunError> {
        let table = self.lock()?;
        Ok(table.len())
    }

    pub fn into_table(self) -> Result<RankedTable<T>, RunError> {
        self.table
            .into_inner()
            .map_err(|e| RunError::LockPoisoned(format!("aggregator lock: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn keeps_descending_order_and_insertion_order_within_bucket() {
        let mut table = RankedTable::unbounded();
        table.insert(5, "cat");
        table.insert(7, "dog");
        table.insert(5, "act");

        let top = table.top_k(3);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], RankedEntry { priority: 7, items: vec!["dog"] });
        assert_eq!(top[1], RankedEntry { priority: 5, items: vec!["cat", "act"] });
    }

    #[test]
    fn bounded_rejects_below_floor_when_full() {
        let mut table = RankedTable::bounded(2);
        assert!(table.insert(10, "a"));
        assert!(table.insert(20, "b"));
        assert!(!table.insert(5, "c"), "below floor with a full table");
        assert_eq!(table.priorities(), vec![20, 10]);
        assert_eq!(table.item_count(), 2);
    }

    #[test]
    fn bounded_appends_to_floor_bucket() {
        let mut table = RankedTable::bounded(2);
        table.insert(10, "a");
        table.insert(20, "b");
        assert!(table.insert(10, "c"));
        assert_eq!(table.get(10), Some(&["a", "c"][..]));
    }

    #[test]
    fn bounded_evicts_whole_floor_bucket() {
        let mut table = RankedTable::bounded(2);
        table.insert(10, "a");
        table.insert(10, "b");
        table.insert(20, "c");
        assert!(table.insert(15, "d"));

        assert_eq!(table.priorities(), vec![20, 15]);
        assert_eq!(table.get(10), None);
        assert_eq!(table.floor(), Some(15));
    }

    #[test]
    fn bounded_accepts_anything_until_full() {
        let mut table = RankedTable::bounded(3);
        assert!(table.insert(1, 'x'));
        assert!(table.insert(-4, 'y'));
        assert!(table.insert(0, 'z'));
        assert_eq!(table.priorities(), vec![1, 0, -4]);
        assert_eq!(table.floor(), Some(-4));
    }

    #[test]
    fn bounded_never_exceeds_width() {
        let mut table = RankedTable::bounded(3);
        for (i, p) in [4, 9, 1, 9, 7, 3, 12, 12, 0, 8, 15, 2].into_iter().enumerate() {
            table.insert(p, i);
            assert!(table.len() <= 3);
            let keys = table.priorities();
            assert!(keys.windows(2).all(|w| w[0] > w[1]), "strictly descending: {keys:?}");
        }
        assert_eq!(table.priorities(), vec![15, 12, 9]);
    }

    #[test]
    fn zero_width_is_clamped_to_one() {
        let mut table = RankedTable::bounded(0);
        table.insert(1, "a");
        table.insert(2, "b");
        assert_eq!(table.mode(), TableMode::Bounded(1));
        assert_eq!(table.priorities(), vec![2]);
    }

    #[test]
    fn bounded_top_matches_unbounded_top() {
        let scored: Vec<(i32, usize)> = (0..500).map(|i| ((i * 37 % 101) as i32, i)).collect();
        let mut bounded = RankedTable::bounded(3);
        let mut unbounded = RankedTable::unbounded();
        bounded.extend(scored.clone());
        unbounded.extend(scored);
        assert_eq!(bounded.top_k(3), unbounded.top_k(3));
    }

    #[test]
    fn top_k_limits_buckets() {
        let mut table = RankedTable::unbounded();
        table.extend((0..10).map(|p| (p, p)));
        let top = table.top_k(4);
        let keys: Vec<i32> = top.iter().map(|e| e.priority).collect();
        assert_eq!(keys, vec![9, 8, 7, 6]);
        assert_eq!(table.len(), 10, "top_k does not mutate");
    }

    #[test]
    fn concurrent_inserts_keep_invariants() {
        let aggregator = Arc::new(Aggregator::new(TableMode::Bounded(3)));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let agg = Arc::clone(&aggregator);
                thread::spawn(move || {
                    for i in 0..1000 {
                        agg.insert((i % 50) as i32, (t, i)).unwrap();
                        assert!(agg.len().unwrap() <= 3);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let top = aggregator.top_k(3).unwrap();
        let keys: Vec<i32> = top.iter().map(|e| e.priority).collect();
        assert_eq!(keys, vec![49, 48, 47]);
        // Each thread inserts priority 49 twenty times.
        assert_eq!(top[0].items.len(), 80);
    }

    #[test]
    fn merge_takes_a_batch() {
        let aggregator = Aggregator::new(TableMode::Bounded(2));
        let kept = aggregator.merge(vec![(1, "a"), (3, "b"), (2, "c"), (0, "d")]).unwrap();
        assert_eq!(kept, 3);
        let table = aggregator.into_table().unwrap();
        assert_eq!(table.priorities(), vec![3, 2]);
    }

    #[test]
    fn snapshot_is_detached_from_later_inserts() {
        let aggregator = Aggregator::new(TableMode::Bounded(2));
        aggregator.insert(4, "cat").unwrap();
        let snapshot = aggregator.snapshot().unwrap();

        aggregator.insert(9, "dog").unwrap();
        assert_eq!(snapshot.priorities(), vec![4]);
        assert_eq!(aggregator.len().unwrap(), 2);
    }
}
