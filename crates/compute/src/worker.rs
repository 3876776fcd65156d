//! Pool worker: scores items, forwards accepted results, releases leases.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scrabble_core::{Envelope, Item};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::Aggregator;
use crate::error::RunError;
use crate::kernel::ScoringKernel;

/// Where a worker sends accepted results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeMode {
    /// Insert into the shared aggregator as soon as an item is scored.
    Immediate,
    /// Buffer privately; the orchestrator merges after join.
    Deferred,
}

impl MergeMode {
    pub fn all() -> [MergeMode; 2] {
        [MergeMode::Immediate, MergeMode::Deferred]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Immediate => "immediate",
            MergeMode::Deferred => "deferred",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMode {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(MergeMode::Immediate),
            "deferred" => Ok(MergeMode::Deferred),
            other => Err(RunError::Unknown { kind: "merge mode", name: other.to_string() }),
        }
    }
}

pub enum ResultSink {
    Shared(Arc<Aggregator<String>>),
    Deferred(Vec<(i32, String)>),
}

/// What a worker did over its lifetime. `deferred` is empty in immediate mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub processed: u64,
    pub accepted: u64,
    pub deferred: Vec<(i32, String)>,
}

pub struct Worker {
    id: usize,
    kernel: Arc<dyn ScoringKernel>,
    sink: ResultSink,
    processed: u64,
    accepted: u64,
}

impl Worker {
    pub fn new(
        id: usize,
        kernel: Arc<dyn ScoringKernel>,
        aggregator: &Arc<Aggregator<String>>,
        merge: MergeMode,
    ) -> Self {
        let sink = match merge {
            MergeMode::Immediate => ResultSink::Shared(Arc::clone(aggregator)),
            MergeMode::Deferred => ResultSink::Deferred(Vec::new()),
        };
        Self { id, kernel, sink, processed: 0, accepted: 0 }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Score one item and forward it if accepted. The item's lease is
    /// released before this returns, whatever the score.
    pub fn handle(&mut self, item: Item) -> Result<(), RunError> {
        self.processed += 1;
        let Some(priority) = self.kernel.score(item.word()) else {
            item.dispose();
            return Ok(());
        };

        self.accepted += 1;
        let word = item.into_word();
        match &mut self.sink {
            ResultSink::Shared(aggregator) => {
                aggregator.insert(priority, word)?;
            }
            ResultSink::Deferred(buffer) => buffer.push((priority, word)),
        }
        Ok(())
    }

    /// Drain `recv` until end of stream.
    pub fn run<F>(mut self, mut recv: F) -> Result<WorkerReport, RunError>
    where
        F: FnMut() -> Result<Envelope<Item>, RunError>,
    {
        while let Envelope::Data(item) = recv()? {
            self.handle(item)?;
        }
        let report = self.finish();
        debug!(
            worker = report.worker_id,
            processed = report.processed,
            accepted = report.accepted,
            "worker reached end of stream"
        );
        Ok(report)
    }

    pub fn finish(self) -> WorkerReport {
        let deferred = match self.sink {
            ResultSink::Shared(_) => Vec::new(),
            ResultSink::Deferred(buffer) => buffer,
        };
        WorkerReport {
            worker_id: self.id,
            processed: self.processed,
            accepted: self.accepted,
            deferred,
        }
    }
}
