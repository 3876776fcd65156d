//! Actor pool: lightweight tasks with bounded mailboxes on a tokio runtime.
//!
//! A fixed set of runtime threads hosts one task per worker. The feeder
//! runs on the caller's thread inside `block_on` and delivers items to the
//! mailboxes round-robin. End of stream is a separate `Stop` message rather
//! than a data envelope.

use scrabble_core::Item;
use scrabble_queue::{Draw, ThrottledSource};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::debug;

use super::{DistributionStrategy, FeedStats, RunContext, Topology};
use crate::error::RunError;
use crate::worker::{Worker, WorkerReport};

/// How the feeder deals with a full mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorMode {
    /// Suspend on the target mailbox until it has room.
    Mailbox,
    /// Try the target, then every mailbox, yield, try every mailbox again,
    /// and only then suspend on the target.
    Cooperative,
}

enum Mail<T> {
    Deliver(T),
    Stop,
}

#[derive(Debug, Clone, Copy)]
pub struct ActorStrategy {
    mode: ActorMode,
}

impl ActorStrategy {
    pub fn new(mode: ActorMode) -> Self {
        Self { mode }
    }
}

impl DistributionStrategy for ActorStrategy {
    fn name(&self) -> &'static str {
        match self.mode {
            ActorMode::Mailbox => "mailbox",
            ActorMode::Cooperative => "cooperative",
        }
    }

    fn spawn(&self, ctx: &RunContext) -> Result<Box<dyn Topology>, RunError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(ctx.workers.max(1))
            .thread_name("scrabble-actor")
            .build()
            .map_err(|e| RunError::Runtime(format!("build actor runtime: {e}")))?;

        let mut mailboxes = Vec::with_capacity(ctx.workers);
        let mut handles = Vec::with_capacity(ctx.workers);
        for id in 0..ctx.workers {
            let (tx, rx) = mpsc::channel(ctx.channel_capacity.max(1));
            handles.push(runtime.spawn(run_actor(ctx.worker(id), rx, self.mode)));
            mailboxes.push(tx);
        }
        debug!(actors = ctx.workers, mode = ?self.mode, "actor pool started");

        Ok(Box::new(ActorTopology { runtime, mailboxes, handles, mode: self.mode, next: 0 }))
    }
}

async fn run_actor(
    mut worker: Worker,
    mut mailbox: Receiver<Mail<Item>>,
    mode: ActorMode,
) -> Result<WorkerReport, RunError> {
    loop {
        let mail = match mode {
            ActorMode::Mailbox => mailbox.recv().await,
            ActorMode::Cooperative => receive_cooperatively(&mut mailbox).await,
        };
        match mail {
            Some(Mail::Deliver(item)) => worker.handle(item)?,
            Some(Mail::Stop) => break,
            None => return Err(mailbox_closed(worker.id())),
        }
    }

    let report = worker.finish();
    debug!(
        worker = report.worker_id,
        processed = report.processed,
        accepted = report.accepted,
        "actor stopped"
    );
    Ok(report)
}

async fn receive_cooperatively(mailbox: &mut Receiver<Mail<Item>>) -> Option<Mail<Item>> {
    match mailbox.try_recv() {
        Ok(mail) => return Some(mail),
        Err(TryRecvError::Disconnected) => return None,
        Err(TryRecvError::Empty) => {}
    }
    tokio::task::yield_now().await;
    mailbox.recv().await
}

fn mailbox_closed(id: usize) -> RunError {
    RunError::ChannelClosed(format!("mailbox {id} closed before stop"))
}

/// Non-blocking send. A full mailbox hands the mail back in `Ok(Err(mail))`.
fn offer(
    mailboxes: &[Sender<Mail<Item>>],
    idx: usize,
    mail: Mail<Item>,
) -> Result<Result<(), Mail<Item>>, RunError> {
    match mailboxes[idx].try_send(mail) {
        Ok(()) => Ok(Ok(())),
        Err(TrySendError::Full(mail)) => Ok(Err(mail)),
        Err(TrySendError::Closed(_)) => Err(mailbox_closed(idx)),
    }
}

/// Offer `mail` to every mailbox once, starting at `start`.
fn offer_all(
    mailboxes: &[Sender<Mail<Item>>],
    start: usize,
    mut mail: Mail<Item>,
    stats: &mut FeedStats,
) -> Result<Result<(), Mail<Item>>, RunError> {
    for offset in 0..mailboxes.len() {
        match offer(mailboxes, (start + offset) % mailboxes.len(), mail)? {
            Ok(()) => return Ok(Ok(())),
            Err(rejected) => {
                stats.retries += 1;
                mail = rejected;
            }
        }
    }
    Ok(Err(mail))
}

async fn deliver_cooperatively(
    mailboxes: &[Sender<Mail<Item>>],
    target: usize,
    mail: Mail<Item>,
    stats: &mut FeedStats,
) -> Result<(), RunError> {
    let Err(mail) = offer(mailboxes, target, mail)? else {
        return Ok(());
    };
    let Err(mail) = offer_all(mailboxes, target, mail, stats)? else {
        return Ok(());
    };

    stats.yields += 1;
    tokio::task::yield_now().await;
    let Err(mail) = offer_all(mailboxes, target, mail, stats)? else {
        return Ok(());
    };

    stats.blocking_sends += 1;
    mailboxes[target].send(mail).await.map_err(|_| mailbox_closed(target))
}

async fn deliver_blocking(
    mailboxes: &[Sender<Mail<Item>>],
    target: usize,
    mail: Mail<Item>,
    stats: &mut FeedStats,
) -> Result<(), RunError> {
    let Err(mail) = offer(mailboxes, target, mail)? else {
        return Ok(());
    };
    stats.blocking_sends += 1;
    mailboxes[target].send(mail).await.map_err(|_| mailbox_closed(target))
}

struct ActorTopology {
    runtime: Runtime,
    mailboxes: Vec<Sender<Mail<Item>>>,
    handles: Vec<JoinHandle<Result<WorkerReport, RunError>>>,
    mode: ActorMode,
    next: usize,
}

impl Topology for ActorTopology {
    fn feed(&mut self, source: &mut ThrottledSource) -> Result<FeedStats, RunError> {
        let Self { runtime, mailboxes, mode, next, .. } = self;
        runtime.block_on(async {
            let mut stats = FeedStats::default();
            for draw in source {
                let Draw::Item(item) = draw? else {
                    continue;
                };
                let target = *next;
                *next = (target + 1) % mailboxes.len();
                let mail = Mail::Deliver(item);
                match mode {
                    ActorMode::Mailbox => deliver_blocking(mailboxes, target, mail, &mut stats).await?,
                    ActorMode::Cooperative => {
                        deliver_cooperatively(mailboxes, target, mail, &mut stats).await?
                    }
                }
            }
            Ok::<_, RunError>(stats)
        })
    }

    fn signal(&mut self) -> Result<(), RunError> {
        let Self { runtime, mailboxes, .. } = self;
        runtime.block_on(async {
            for (id, mailbox) in mailboxes.iter().enumerate() {
                mailbox.send(Mail::Stop).await.map_err(|_| mailbox_closed(id))?;
            }
            Ok::<_, RunError>(())
        })
    }

    fn drain(self: Box<Self>) -> Result<Vec<WorkerReport>, RunError> {
        let Self { runtime, mailboxes, handles, .. } = *self;
        drop(mailboxes);
        runtime.block_on(async {
            let mut reports = Vec::with_capacity(handles.len());
            for (id, handle) in handles.into_iter().enumerate() {
                reports.push(handle.await.map_err(|_| RunError::WorkerPanicked(id))??);
            }
            Ok::<_, RunError>(reports)
        })
    }

    fn abort(self: Box<Self>) {
        let Self { runtime, mailboxes, .. } = *self;
        drop(mailboxes);
        runtime.shutdown_background();
    }
}
