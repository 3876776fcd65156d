//! Distribution strategies: how items travel from the source to the workers.
//!
//! Every strategy builds a [`Topology`] for one run. The orchestrator drives
//! it through `feed`, `signal` and `drain`; a topology never outlives its run.
//!
//! | Strategy            | Scheduling                         | Termination                   |
//! |---------------------|------------------------------------|-------------------------------|
//! | `direct`            | caller thread, no channels         | source exhaustion             |
//! | `shared-queue`      | N OS threads on one bounded queue  | N end markers, any worker     |
//! | `partitioned-spin`  | N OS threads, one spin lane each   | one end marker per lane       |
//! | `partitioned-park`  | N OS threads, one park lane each   | one end marker per lane       |
//! | `mailbox`           | N tokio tasks, blocking send       | `Stop` broadcast              |
//! | `cooperative`       | N tokio tasks, try/yield/send      | `Stop` broadcast              |
//! | `stream-sequential` | caller thread fold                 | source exhaustion             |
//! | `stream-parallel`   | rayon pool, `par_bridge`           | source exhaustion             |

mod actors;
mod direct;
mod partitioned;
mod shared_queue;
mod stream;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use scrabble_core::Item;
use scrabble_queue::{Draw, ThrottledSource, WaitPolicy};
use serde::{Deserialize, Serialize};

use crate::aggregator::Aggregator;
use crate::error::RunError;
use crate::kernel::ScoringKernel;
use crate::worker::{MergeMode, Worker, WorkerReport};

pub use actors::{ActorMode, ActorStrategy};
pub use direct::DirectStrategy;
pub use partitioned::PartitionedStrategy;
pub use shared_queue::SharedQueueStrategy;
pub use stream::StreamStrategy;

/// Everything a strategy needs to build its workers.
#[derive(Clone)]
pub struct RunContext {
    pub workers: usize,
    pub channel_capacity: usize,
    pub kernel: Arc<dyn ScoringKernel>,
    pub aggregator: Arc<Aggregator<String>>,
    pub merge: MergeMode,
}

impl RunContext {
    pub fn worker(&self, id: usize) -> Worker {
        Worker::new(id, Arc::clone(&self.kernel), &self.aggregator, self.merge)
    }
}

/// Contention counters gathered while feeding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    /// Failed non-blocking sends retried by the feeder.
    pub retries: u64,
    /// Cooperative yields taken by the feeder.
    pub yields: u64,
    /// Sends that fell back to suspending until space was available.
    pub blocking_sends: u64,
}

/// One run's worth of wiring between source and workers.
pub trait Topology: Send {
    /// Push every item of `source` towards the workers.
    fn feed(&mut self, source: &mut ThrottledSource) -> Result<FeedStats, RunError>;

    /// Tell every worker the stream has ended.
    fn signal(&mut self) -> Result<(), RunError>;

    /// Wait for every worker and collect their reports.
    fn drain(self: Box<Self>) -> Result<Vec<WorkerReport>, RunError>;

    /// Tear down without joining after a failed phase.
    fn abort(self: Box<Self>) {}
}

pub trait DistributionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn spawn(&self, ctx: &RunContext) -> Result<Box<dyn Topology>, RunError>;
}

/// Every strategy the benchmark knows, by its command-line name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Direct,
    SharedQueue,
    PartitionedSpin,
    PartitionedPark,
    Mailbox,
    Cooperative,
    StreamSequential,
    StreamParallel,
}

impl StrategyKind {
    pub fn all() -> [StrategyKind; 8] {
        [
            StrategyKind::Direct,
            StrategyKind::SharedQueue,
            StrategyKind::PartitionedSpin,
            StrategyKind::PartitionedPark,
            StrategyKind::Mailbox,
            StrategyKind::Cooperative,
            StrategyKind::StreamSequential,
            StrategyKind::StreamParallel,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct",
            StrategyKind::SharedQueue => "shared-queue",
            StrategyKind::PartitionedSpin => "partitioned-spin",
            StrategyKind::PartitionedPark => "partitioned-park",
            StrategyKind::Mailbox => "mailbox",
            StrategyKind::Cooperative => "cooperative",
            StrategyKind::StreamSequential => "stream-sequential",
            StrategyKind::StreamParallel => "stream-parallel",
        }
    }

    pub fn build(&self) -> Box<dyn DistributionStrategy> {
        match self {
            StrategyKind::Direct => Box::new(DirectStrategy),
            StrategyKind::SharedQueue => Box::new(SharedQueueStrategy),
            StrategyKind::PartitionedSpin => Box::new(PartitionedStrategy::new(WaitPolicy::Spin)),
            StrategyKind::PartitionedPark => Box::new(PartitionedStrategy::new(WaitPolicy::Park)),
            StrategyKind::Mailbox => Box::new(ActorStrategy::new(ActorMode::Mailbox)),
            StrategyKind::Cooperative => Box::new(ActorStrategy::new(ActorMode::Cooperative)),
            StrategyKind::StreamSequential => Box::new(StreamStrategy::sequential()),
            StrategyKind::StreamParallel => Box::new(StreamStrategy::parallel()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        StrategyKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or(RunError::Unknown { kind: "strategy", name: s.to_string() })
    }
}

/// Apply `f` to every item the source yields, skipping vacant slots.
pub(crate) fn for_each_item<F>(source: &mut ThrottledSource, mut f: F) -> Result<(), RunError>
where
    F: FnMut(Item) -> Result<(), RunError>,
{
    for draw in source {
        match draw? {
            Draw::Item(item) => f(item)?,
            Draw::Vacant => {}
        }
    }
    Ok(())
}

/// Join an OS-thread worker, mapping a panic to [`RunError::WorkerPanicked`].
pub(crate) fn join_worker(
    id: usize,
    handle: std::thread::JoinHandle<Result<WorkerReport, RunError>>,
) -> Result<WorkerReport, RunError> {
    handle.join().map_err(|_| RunError::WorkerPanicked(id))?
}

pub(crate) fn spawn_worker_thread<F>(
    id: usize,
    body: F,
) -> Result<std::thread::JoinHandle<Result<WorkerReport, RunError>>, RunError>
where
    F: FnOnce() -> Result<WorkerReport, RunError> + Send + 'static,
{
    std::thread::Builder::new()
        .name(format!("scrabble-worker-{id}"))
        .spawn(body)
        .map_err(|e| RunError::Runtime(format!("spawn worker {id}: {e}")))
}
