//! Implicit distribution: hand the source to an iteration facility.
//!
//! The sequential variant folds on the caller's thread. The parallel variant
//! bridges the source into a dedicated rayon pool, which splits the work
//! and folds one [`Worker`] per split.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::iter::{ParallelBridge, ParallelIterator};
use rayon::{ThreadPool, ThreadPoolBuilder};
use scrabble_queue::{Draw, ThrottledSource};

use super::{for_each_item, DistributionStrategy, FeedStats, RunContext, Topology};
use crate::error::RunError;
use crate::worker::{Worker, WorkerReport};

#[derive(Debug, Clone, Copy)]
pub struct StreamStrategy {
    parallel: bool,
}

impl StreamStrategy {
    pub fn sequential() -> Self {
        Self { parallel: false }
    }

    pub fn parallel() -> Self {
        Self { parallel: true }
    }
}

impl DistributionStrategy for StreamStrategy {
    fn name(&self) -> &'static str {
        if self.parallel {
            "stream-parallel"
        } else {
            "stream-sequential"
        }
    }

    fn spawn(&self, ctx: &RunContext) -> Result<Box<dyn Topology>, RunError> {
        let pool = if self.parallel {
            let pool = ThreadPoolBuilder::new()
                .num_threads(ctx.workers.max(1))
                .thread_name(|i| format!("scrabble-stream-{i}"))
                .build()
                .map_err(|e| RunError::Runtime(format!("build stream pool: {e}")))?;
            Some(pool)
        } else {
            None
        };
        Ok(Box::new(StreamTopology { ctx: ctx.clone(), pool, workers: Vec::new() }))
    }
}

struct StreamTopology {
    ctx: RunContext,
    pool: Option<ThreadPool>,
    workers: Vec<Worker>,
}

impl Topology for StreamTopology {
    fn feed(&mut self, source: &mut ThrottledSource) -> Result<FeedStats, RunError> {
        match &self.pool {
            None => {
                let mut worker = self.ctx.worker(0);
                for_each_item(source, |item| worker.handle(item))?;
                self.workers.push(worker);
            }
            Some(pool) => {
                let ctx = &self.ctx;
                let ids = AtomicUsize::new(0);
                let folded = pool.install(|| {
                    source
                        .par_bridge()
                        .try_fold(
                            || ctx.worker(ids.fetch_add(1, Ordering::Relaxed)),
                            |mut worker, draw| {
                                if let Draw::Item(item) = draw? {
                                    worker.handle(item)?;
                                }
                                Ok::<_, RunError>(worker)
                            },
                        )
                        .collect::<Result<Vec<_>, RunError>>()
                })?;
                self.workers.extend(folded);
            }
        }
        Ok(FeedStats::default())
    }

    fn signal(&mut self) -> Result<(), RunError> {
        Ok(())
    }

    fn drain(self: Box<Self>) -> Result<Vec<WorkerReport>, RunError> {
        Ok(self.workers.into_iter().map(Worker::finish).collect())
    }
}
