//! Warmup and measurement loop around single runs.

use std::sync::Arc;

use scrabble_compute::{MergeMode, RankedEntry, Run, RunError, RunReport, ScoringKernel, StrategyKind};
use scrabble_core::BenchConfig;
use serde::Serialize;
use tracing::{debug, info};

/// Repetition counts for one strategy.
#[derive(Debug, Clone, Copy)]
pub struct HarnessPlan {
    pub warmup: usize,
    pub iterations: usize,
}

/// Timings of the measured runs of one strategy and merge mode.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub strategy: StrategyKind,
    pub merge: MergeMode,
    pub iterations: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub emitted: usize,
    pub accepted: u64,
    pub top: Vec<RankedEntry<String>>,
    /// The last measured run in full.
    pub last: RunReport,
}

pub fn measure(
    kind: StrategyKind,
    merge: MergeMode,
    config: &BenchConfig,
    kernel: &Arc<dyn ScoringKernel>,
    words: &[String],
    plan: HarnessPlan,
) -> Result<Measurement, RunError> {
    let run_once = || Run::from_config(kind, merge, config, Arc::clone(kernel), words.to_vec()).execute();

    for round in 0..plan.warmup {
        let report = run_once()?;
        debug!(strategy = %kind, round, total_ms = report.timings.total_ms, "warmup run");
    }

    let iterations = plan.iterations.max(1);
    let mut reports = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        reports.push(run_once()?);
    }

    let times: Vec<f64> = reports.iter().map(|r| r.timings.total_ms).collect();
    let mean_ms = times.iter().sum::<f64>() / times.len() as f64;
    let min_ms = times.iter().copied().fold(f64::INFINITY, f64::min);
    let max_ms = times.iter().copied().fold(0.0, f64::max);

    let last = reports.pop().ok_or_else(|| RunError::Runtime("no measured run".into()))?;
    info!(strategy = %kind, %merge, mean_ms, min_ms, max_ms, "measured");
    Ok(Measurement {
        strategy: kind,
        merge,
        iterations,
        mean_ms,
        min_ms,
        max_ms,
        emitted: last.emitted,
        accepted: last.accepted(),
        top: last.top.clone(),
        last,
    })
}

/// Render measurements as an aligned text table followed by each top table.
pub fn render_table(measurements: &[Measurement]) -> String {
    let mut out = format!(
        "{:<18} {:<10} {:>10} {:>10} {:>10} {:>9} {:>9}\n",
        "strategy", "merge", "mean ms", "min ms", "max ms", "emitted", "accepted"
    );
    for m in measurements {
        out.push_str(&format!(
            "{:<18} {:<10} {:>10.2} {:>10.2} {:>10.2} {:>9} {:>9}\n",
            m.strategy.as_str(),
            m.merge.as_str(),
            m.mean_ms,
            m.min_ms,
            m.max_ms,
            m.emitted,
            m.accepted
        ));
    }
    for m in measurements {
        out.push_str(&format!("\n{} / {}\n", m.strategy, m.merge));
        for entry in &m.top {
            out.push_str(&format!("  {:>5}  {}\n", entry.priority, entry.items.join(", ")));
        }
    }
    out
}
