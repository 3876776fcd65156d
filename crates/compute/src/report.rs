//! What a finished run reports.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregator::RankedEntry;
use crate::strategy::FeedStats;
use crate::worker::{MergeMode, WorkerReport};

/// Wall time spent in each phase, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub spawn_ms: f64,
    pub feed_ms: f64,
    pub signal_ms: f64,
    pub drain_ms: f64,
    pub collect_ms: f64,
    pub total_ms: f64,
}

pub(crate) fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub processed: u64,
    pub accepted: u64,
}

impl From<&WorkerReport> for WorkerSummary {
    fn from(report: &WorkerReport) -> Self {
        Self {
            worker_id: report.worker_id,
            processed: report.processed,
            accepted: report.accepted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub strategy: String,
    pub merge: MergeMode,
    pub started_at: DateTime<Utc>,
    pub timings: PhaseTimings,
    /// Items the source handed out.
    pub emitted: usize,
    /// Interrupted draws that produced no item.
    pub vacancies: usize,
    pub stalls: u32,
    pub peak_outstanding: usize,
    pub feed: FeedStats,
    /// Results merged from private worker buffers during collect.
    pub deferred_merged: usize,
    pub workers: Vec<WorkerSummary>,
    pub top: Vec<RankedEntry<String>>,
}

impl RunReport {
    /// Items scored across all workers.
    pub fn processed(&self) -> u64 {
        self.workers.iter().map(|w| w.processed).sum()
    }

    pub fn accepted(&self) -> u64 {
        self.workers.iter().map(|w| w.accepted).sum()
    }

    /// Every `(priority, item)` pair in the top table, ignoring order within a bucket.
    pub fn table_signature(&self) -> BTreeSet<(i32, String)> {
        self.top
            .iter()
            .flat_map(|entry| entry.items.iter().map(move |item| (entry.priority, item.clone())))
            .collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
