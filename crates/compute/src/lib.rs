pub mod aggregator;
pub mod error;
pub mod kernel;
pub mod orchestrator;
pub mod report;
pub mod strategy;
pub mod worker;

pub use aggregator::{Aggregator, RankedEntry, RankedTable, TableMode};
pub use error::RunError;
pub use kernel::{ScoringKernel, ScrabbleKernel};
pub use orchestrator::{Run, RunPhase, RunSettings};
pub use report::{PhaseTimings, RunReport, WorkerSummary};
pub use strategy::{
    ActorMode, DistributionStrategy, FeedStats, RunContext, StrategyKind, Topology,
};
pub use worker::{MergeMode, Worker, WorkerReport};
