//! Single-threaded baseline: the caller scores every item itself.

use scrabble_queue::ThrottledSource;

use super::{for_each_item, DistributionStrategy, FeedStats, RunContext, Topology};
use crate::error::RunError;
use crate::worker::{Worker, WorkerReport};

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectStrategy;

impl DistributionStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn spawn(&self, ctx: &RunContext) -> Result<Box<dyn Topology>, RunError> {
        Ok(Box::new(DirectTopology { worker: ctx.worker(0) }))
    }
}

struct DirectTopology {
    worker: Worker,
}

impl Topology for DirectTopology {
    fn feed(&mut self, source: &mut ThrottledSource) -> Result<FeedStats, RunError> {
        for_each_item(source, |item| self.worker.handle(item))?;
        Ok(FeedStats::default())
    }

    fn signal(&mut self) -> Result<(), RunError> {
        Ok(())
    }

    fn drain(self: Box<Self>) -> Result<Vec<WorkerReport>, RunError> {
        Ok(vec![self.worker.finish()])
    }
}
