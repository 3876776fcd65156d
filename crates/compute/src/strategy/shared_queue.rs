//! One bounded queue shared by the whole pool.
//!
//! The feeder busy-retries each enqueue. Whichever worker is free takes the
//! next item. After the stream, one end marker per worker is enqueued; a
//! worker exits on the first marker it sees, not necessarily "its own".

use std::sync::Arc;
use std::thread::JoinHandle;

use scrabble_core::{Envelope, Item};
use scrabble_queue::{SharedQueue, ThrottledSource};
use tracing::debug;

use super::{
    for_each_item, join_worker, spawn_worker_thread, DistributionStrategy, FeedStats, RunContext,
    Topology,
};
use crate::error::RunError;
use crate::worker::WorkerReport;

#[derive(Debug, Clone, Copy, Default)]
pub struct SharedQueueStrategy;

impl DistributionStrategy for SharedQueueStrategy {
    fn name(&self) -> &'static str {
        "shared-queue"
    }

    fn spawn(&self, ctx: &RunContext) -> Result<Box<dyn Topology>, RunError> {
        let queue: Arc<SharedQueue<Envelope<Item>>> = SharedQueue::new(ctx.channel_capacity);
        let mut topology = SharedQueueTopology { queue, handles: Vec::with_capacity(ctx.workers) };

        for id in 0..ctx.workers {
            let worker = ctx.worker(id);
            let queue = Arc::clone(&topology.queue);
            let spawned = spawn_worker_thread(id, move || {
                worker.run(|| {
                    queue
                        .pop_spin()
                        .ok_or_else(|| RunError::ChannelClosed("shared queue closed".into()))
                })
            });
            match spawned {
                Ok(handle) => topology.handles.push(handle),
                Err(e) => {
                    Box::new(topology).abort();
                    return Err(e);
                }
            }
        }
        debug!(workers = ctx.workers, capacity = ctx.channel_capacity, "shared queue pool started");
        Ok(Box::new(topology))
    }
}

struct SharedQueueTopology {
    queue: Arc<SharedQueue<Envelope<Item>>>,
    handles: Vec<JoinHandle<Result<WorkerReport, RunError>>>,
}

impl SharedQueueTopology {
    fn push(&self, envelope: Envelope<Item>) -> Result<u64, RunError> {
        self.queue
            .push_spin(envelope)
            .map_err(|_| RunError::ChannelClosed("shared queue closed".into()))
    }
}

impl Topology for SharedQueueTopology {
    fn feed(&mut self, source: &mut ThrottledSource) -> Result<FeedStats, RunError> {
        let mut stats = FeedStats::default();
        for_each_item(source, |item| {
            stats.retries += self.push(Envelope::Data(item))?;
            Ok(())
        })?;
        Ok(stats)
    }

    fn signal(&mut self) -> Result<(), RunError> {
        for _ in 0..self.handles.len() {
            self.push(Envelope::EndOfStream)?;
        }
        Ok(())
    }

    fn drain(self: Box<Self>) -> Result<Vec<WorkerReport>, RunError> {
        self.handles
            .into_iter()
            .enumerate()
            .map(|(id, handle)| join_worker(id, handle))
            .collect()
    }

    fn abort(self: Box<Self>) {
        // Spinning workers see the close and exit on their own.
        self.queue.close();
    }
}
