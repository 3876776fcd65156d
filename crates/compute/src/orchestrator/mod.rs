//! Single-shot run orchestration.
//!
//! A [`Run`] owns its source, kernel and strategy and walks
//! `Init -> Spawn -> Feed -> Signal -> Drain -> Collect -> Done` exactly once.
//! `execute` consumes the run, so it cannot be restarted.

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use scrabble_core::BenchConfig;
use scrabble_queue::ThrottledSource;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::{Aggregator, TableMode};
use crate::error::RunError;
use crate::kernel::ScoringKernel;
use crate::report::{millis, PhaseTimings, RunReport, WorkerSummary};
use crate::strategy::{DistributionStrategy, RunContext, StrategyKind};
use crate::worker::MergeMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RunPhase {
    Init,
    Spawn,
    Feed,
    Signal,
    Drain,
    Collect,
    Done,
}

impl RunPhase {
    pub fn next(self) -> Option<RunPhase> {
        match self {
            RunPhase::Init => Some(RunPhase::Spawn),
            RunPhase::Spawn => Some(RunPhase::Feed),
            RunPhase::Feed => Some(RunPhase::Signal),
            RunPhase::Signal => Some(RunPhase::Drain),
            RunPhase::Drain => Some(RunPhase::Collect),
            RunPhase::Collect => Some(RunPhase::Done),
            RunPhase::Done => None,
        }
    }
}

/// Per-run knobs derived from [`BenchConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub workers: usize,
    pub channel_capacity: usize,
    pub merge: MergeMode,
    pub table: TableMode,
    /// Buckets returned by the collect phase.
    pub top_k: usize,
}

impl RunSettings {
    pub fn from_config(config: &BenchConfig, merge: MergeMode) -> Self {
        let table = if config.fast {
            TableMode::Bounded(config.num_save)
        } else {
            TableMode::Unbounded
        };
        Self {
            workers: config.resolved_workers(),
            channel_capacity: config.channel_capacity,
            merge,
            table,
            top_k: config.num_save,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&BenchConfig::default(), MergeMode::Immediate)
    }
}

pub struct Run {
    strategy: Box<dyn DistributionStrategy>,
    settings: RunSettings,
    kernel: Arc<dyn ScoringKernel>,
    source: ThrottledSource,
    phase: RunPhase,
    timings: PhaseTimings,
}

impl Run {
    pub fn new(
        strategy: Box<dyn DistributionStrategy>,
        settings: RunSettings,
        kernel: Arc<dyn ScoringKernel>,
        source: ThrottledSource,
    ) -> Self {
        Self {
            strategy,
            settings,
            kernel,
            source,
            phase: RunPhase::Init,
            timings: PhaseTimings::default(),
        }
    }

    /// Build a run over `words` with the source and table the config asks for.
    pub fn from_config<I>(
        kind: StrategyKind,
        merge: MergeMode,
        config: &BenchConfig,
        kernel: Arc<dyn ScoringKernel>,
        words: I,
    ) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::new(
            kind.build(),
            RunSettings::from_config(config, merge),
            kernel,
            ThrottledSource::from_config(words, config),
        )
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    fn advance(&mut self, to: RunPhase) -> Result<(), RunError> {
        if self.phase.next() != Some(to) {
            return Err(RunError::PhaseOrder { from: self.phase, to });
        }
        debug!(strategy = self.strategy.name(), from = ?self.phase, to = ?to, "run phase");
        self.phase = to;
        Ok(())
    }

    pub fn execute(mut self) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let run_start = Instant::now();
        let strategy = self.strategy.name();
        info!(
            run = %run_id,
            strategy,
            merge = %self.settings.merge,
            workers = self.settings.workers,
            "run starting"
        );

        let aggregator = Arc::new(Aggregator::new(self.settings.table));
        let ctx = RunContext {
            workers: self.settings.workers.max(1),
            channel_capacity: self.settings.channel_capacity,
            kernel: Arc::clone(&self.kernel),
            aggregator: Arc::clone(&aggregator),
            merge: self.settings.merge,
        };

        self.advance(RunPhase::Spawn)?;
        let t = Instant::now();
        let mut topology = self.strategy.spawn(&ctx)?;
        self.timings.spawn_ms = millis(t.elapsed());

        self.advance(RunPhase::Feed)?;
        let t = Instant::now();
        let feed = match topology.feed(&mut self.source) {
            Ok(stats) => stats,
            Err(e) => {
                warn!(run = %run_id, strategy, error = %e, "feed failed, aborting run");
                topology.abort();
                return Err(e);
            }
        };
        self.timings.feed_ms = millis(t.elapsed());

        self.advance(RunPhase::Signal)?;
        let t = Instant::now();
        if let Err(e) = topology.signal() {
            warn!(run = %run_id, strategy, error = %e, "signal failed, aborting run");
            topology.abort();
            return Err(e);
        }
        self.timings.signal_ms = millis(t.elapsed());

        self.advance(RunPhase::Drain)?;
        let t = Instant::now();
        let mut reports = topology.drain()?;
        self.timings.drain_ms = millis(t.elapsed());

        self.advance(RunPhase::Collect)?;
        let t = Instant::now();
        let mut deferred_merged = 0;
        for report in &mut reports {
            let batch = std::mem::take(&mut report.deferred);
            deferred_merged += batch.len();
            aggregator.merge(batch)?;
        }
        let top = aggregator.top_k(self.settings.top_k)?;
        self.timings.collect_ms = millis(t.elapsed());

        self.advance(RunPhase::Done)?;
        self.timings.total_ms = millis(run_start.elapsed());

        let source_stats = self.source.stats();
        let report = RunReport {
            run_id,
            strategy: strategy.to_string(),
            merge: self.settings.merge,
            started_at,
            timings: self.timings,
            emitted: source_stats.emitted,
            vacancies: source_stats.vacancies,
            stalls: source_stats.stalls,
            peak_outstanding: source_stats.peak_outstanding,
            feed,
            deferred_merged,
            workers: reports.iter().map(WorkerSummary::from).collect(),
            top,
        };
        info!(
            run = %run_id,
            strategy,
            emitted = report.emitted,
            accepted = report.accepted(),
            buckets = report.top.len(),
            total_ms = report.timings.total_ms,
            "run complete"
        );
        Ok(report)
    }
}
