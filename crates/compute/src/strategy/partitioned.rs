//! One single-producer/single-consumer lane per worker, fed round-robin.

use std::thread::JoinHandle;

use scrabble_core::{Envelope, Item};
use scrabble_queue::{lane, LaneSender, ThrottledSource, WaitPolicy};
use tracing::debug;

use super::{
    for_each_item, join_worker, spawn_worker_thread, DistributionStrategy, FeedStats, RunContext,
    Topology,
};
use crate::error::RunError;
use crate::worker::WorkerReport;

#[derive(Debug, Clone, Copy)]
pub struct PartitionedStrategy {
    policy: WaitPolicy,
}

impl PartitionedStrategy {
    pub fn new(policy: WaitPolicy) -> Self {
        Self { policy }
    }
}

impl DistributionStrategy for PartitionedStrategy {
    fn name(&self) -> &'static str {
        match self.policy {
            WaitPolicy::Spin => "partitioned-spin",
            WaitPolicy::Park => "partitioned-park",
        }
    }

    fn spawn(&self, ctx: &RunContext) -> Result<Box<dyn Topology>, RunError> {
        let mut lanes = Vec::with_capacity(ctx.workers);
        let mut handles = Vec::with_capacity(ctx.workers);
        for id in 0..ctx.workers {
            let (tx, rx) = lane::<Envelope<Item>>(ctx.channel_capacity, self.policy);
            let worker = ctx.worker(id);
            // A spawn failure drops the lanes built so far, which disconnects
            // the workers already running.
            let handle = spawn_worker_thread(id, move || worker.run(|| Ok(rx.recv()?)))?;
            lanes.push(tx);
            handles.push(handle);
        }
        debug!(workers = ctx.workers, policy = %self.policy, "partitioned lanes started");
        Ok(Box::new(PartitionedTopology { lanes, handles, next: 0 }))
    }
}

struct PartitionedTopology {
    lanes: Vec<LaneSender<Envelope<Item>>>,
    handles: Vec<JoinHandle<Result<WorkerReport, RunError>>>,
    /// Lane that receives the next item.
    next: usize,
}

impl Topology for PartitionedTopology {
    fn feed(&mut self, source: &mut ThrottledSource) -> Result<FeedStats, RunError> {
        let mut stats = FeedStats::default();
        let lanes = &self.lanes;
        let next = &mut self.next;
        for_each_item(source, |item| {
            let target = &lanes[*next];
            *next = (*next + 1) % lanes.len();
            match target.try_send(Envelope::Data(item))? {
                Ok(()) => Ok(()),
                Err(rejected) => {
                    stats.retries += 1;
                    Ok(target.send(rejected)?)
                }
            }
        })?;
        Ok(stats)
    }

    fn signal(&mut self) -> Result<(), RunError> {
        for lane in &self.lanes {
            lane.send(Envelope::EndOfStream)?;
        }
        Ok(())
    }

    fn drain(self: Box<Self>) -> Result<Vec<WorkerReport>, RunError> {
        let Self { lanes, handles, .. } = *self;
        drop(lanes);
        handles
            .into_iter()
            .enumerate()
            .map(|(id, handle)| join_worker(id, handle))
            .collect()
    }
}
