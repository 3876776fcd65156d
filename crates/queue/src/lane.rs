//! Bounded queues connecting a feeder to its workers.
//!
//! - [`SharedQueue`]: one bounded multi-consumer queue, non-blocking on both
//!   ends. Callers busy-retry with [`SharedQueue::push_spin`] / [`SharedQueue::pop_spin`].
//! - [`lane`]: a single-producer/single-consumer pair whose full/empty waits
//!   follow a [`WaitPolicy`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread;

use crossbeam_queue::ArrayQueue;

use crate::error::LaneError;

/// Spins before a waiting side starts yielding its time slice.
const SPINS_BEFORE_YIELD: u32 = 64;

/// How a lane waits when it is full (sender) or empty (receiver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitPolicy {
    /// Busy-spin on a lock-free ring.
    Spin,
    /// Park the thread until the other side makes progress.
    Park,
}

impl fmt::Display for WaitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitPolicy::Spin => write!(f, "spin"),
            WaitPolicy::Park => write!(f, "park"),
        }
    }
}

#[derive(Default)]
struct Backoff {
    step: u32,
}

impl Backoff {
    fn snooze(&mut self) {
        if self.step < SPINS_BEFORE_YIELD {
            std::hint::spin_loop();
            self.step += 1;
        } else {
            thread::yield_now();
        }
    }
}

// ── SharedQueue ─────────────────────────────────────────────────────

/// Bounded queue shared by one feeder and every worker of a pool.
///
/// Closing the queue releases every spinning caller: pushes are refused and
/// pops return `None` once the remaining values are drained.
pub struct SharedQueue<T> {
    inner: ArrayQueue<T>,
    closed: AtomicBool,
}

impl<T> SharedQueue<T> {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { inner: ArrayQueue::new(capacity.max(1)), closed: AtomicBool::new(false) })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Non-blocking enqueue; hands the value back when the queue is full.
    pub fn offer(&self, value: T) -> Result<(), T> {
        self.inner.push(value)
    }

    /// Non-blocking dequeue.
    pub fn poll(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Retry `offer` until accepted. Returns the number of failed attempts,
    /// or the value itself if the queue was closed first.
    pub fn push_spin(&self, mut value: T) -> Result<u64, T> {
        let mut retries = 0u64;
        let mut backoff = Backoff::default();
        loop {
            if self.is_closed() {
                return Err(value);
            }
            match self.inner.push(value) {
                Ok(()) => return Ok(retries),
                Err(rejected) => {
                    value = rejected;
                    retries += 1;
                    backoff.snooze();
                }
            }
        }
    }

    /// Retry `poll` until a value arrives. `None` once closed and drained.
    pub fn pop_spin(&self) -> Option<T> {
        let mut backoff = Backoff::default();
        loop {
            if let Some(value) = self.inner.pop() {
                return Some(value);
            }
            if self.is_closed() {
                return self.inner.pop();
            }
            backoff.snooze();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

// ── SPSC lanes ──────────────────────────────────────────────────────

enum SenderInner<T> {
    Spin(Arc<ArrayQueue<T>>),
    Park(SyncSender<T>),
}

enum ReceiverInner<T> {
    Spin(Arc<ArrayQueue<T>>),
    Park(Receiver<T>),
}

/// Producing end of a lane.
pub struct LaneSender<T> {
    inner: SenderInner<T>,
}

/// Consuming end of a lane.
pub struct LaneReceiver<T> {
    inner: ReceiverInner<T>,
}

/// Create a bounded single-producer/single-consumer lane.
pub fn lane<T>(capacity: usize, policy: WaitPolicy) -> (LaneSender<T>, LaneReceiver<T>) {
    let capacity = capacity.max(1);
    match policy {
        WaitPolicy::Spin => {
            let ring = Arc::new(ArrayQueue::new(capacity));
            (
                LaneSender { inner: SenderInner::Spin(Arc::clone(&ring)) },
                LaneReceiver { inner: ReceiverInner::Spin(ring) },
            )
        }
        WaitPolicy::Park => {
            let (tx, rx) = mpsc::sync_channel(capacity);
            (
                LaneSender { inner: SenderInner::Park(tx) },
                LaneReceiver { inner: ReceiverInner::Park(rx) },
            )
        }
    }
}

impl<T> LaneSender<T> {
    /// Non-blocking send. A full lane hands the value back in `Ok(Err(v))`.
    pub fn try_send(&self, value: T) -> Result<Result<(), T>, LaneError> {
        match &self.inner {
            SenderInner::Spin(ring) => {
                if Arc::strong_count(ring) == 1 {
                    return Err(LaneError::Disconnected);
                }
                Ok(ring.push(value))
            }
            SenderInner::Park(tx) => match tx.try_send(value) {
                Ok(()) => Ok(Ok(())),
                Err(TrySendError::Full(v)) => Ok(Err(v)),
                Err(TrySendError::Disconnected(_)) => Err(LaneError::Disconnected),
            },
        }
    }

    /// Send, waiting per the lane's policy while it is full.
    pub fn send(&self, value: T) -> Result<(), LaneError> {
        match &self.inner {
            SenderInner::Spin(ring) => {
                let mut value = value;
                let mut backoff = Backoff::default();
                loop {
                    if Arc::strong_count(ring) == 1 {
                        return Err(LaneError::Disconnected);
                    }
                    match ring.push(value) {
                        Ok(()) => return Ok(()),
                        Err(rejected) => {
                            value = rejected;
                            backoff.snooze();
                        }
                    }
                }
            }
            SenderInner::Park(tx) => tx.send(value).map_err(|_| LaneError::Disconnected),
        }
    }
}

impl<T> LaneReceiver<T> {
    /// Non-blocking receive. `Ok(None)` means the lane is currently empty.
    pub fn try_recv(&self) -> Result<Option<T>, LaneError> {
        match &self.inner {
            ReceiverInner::Spin(ring) => match ring.pop() {
                Some(v) => Ok(Some(v)),
                None if Arc::strong_count(ring) == 1 => Err(LaneError::Disconnected),
                None => Ok(None),
            },
            ReceiverInner::Park(rx) => match rx.try_recv() {
                Ok(v) => Ok(Some(v)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(LaneError::Disconnected),
            },
        }
    }

    /// Receive, waiting per the lane's policy while it is empty.
    pub fn recv(&self) -> Result<T, LaneError> {
        match &self.inner {
            ReceiverInner::Spin(ring) => {
                let mut backoff = Backoff::default();
                loop {
                    if let Some(v) = ring.pop() {
                        return Ok(v);
                    }
                    // Re-check after observing disconnect: the sender may have
                    // pushed its last value right before dropping.
                    if Arc::strong_count(ring) == 1 {
                        return ring.pop().ok_or(LaneError::Disconnected);
                    }
                    backoff.snooze();
                }
            }
            ReceiverInner::Park(rx) => rx.recv().map_err(|_| LaneError::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_queue_offer_rejects_when_full() {
        let queue = SharedQueue::new(2);
        assert!(queue.offer(1).is_ok());
        assert!(queue.offer(2).is_ok());
        assert_eq!(queue.offer(3), Err(3));
        assert_eq!(queue.poll(), Some(1));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn shared_queue_distributes_to_many_consumers() {
        let queue = SharedQueue::new(4);
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut sum = 0u64;
                    while let Some(Some(v)) = q.pop_spin() {
                        sum += v;
                    }
                    sum
                })
            })
            .collect();

        for v in 1..=100u64 {
            queue.push_spin(Some(v)).unwrap();
        }
        for _ in 0..3 {
            queue.push_spin(None).unwrap();
        }

        let total: u64 = consumers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 5050);
    }

    #[test]
    fn closed_queue_releases_spinners() {
        let queue = SharedQueue::new(1);
        queue.offer(1u8).unwrap();
        let waiter = {
            let q = Arc::clone(&queue);
            thread::spawn(move || q.push_spin(2))
        };
        queue.close();
        assert_eq!(waiter.join().unwrap(), Err(2));
        assert_eq!(queue.pop_spin(), Some(1), "values queued before close still drain");
        assert_eq!(queue.pop_spin(), None);
    }

    #[test]
    fn spin_lane_preserves_order() {
        let (tx, rx) = lane(4, WaitPolicy::Spin);
        let producer = thread::spawn(move || {
            for v in 0..1000 {
                tx.send(v).unwrap();
            }
        });
        let received: Vec<i32> = (0..1000).map(|_| rx.recv().unwrap()).collect();
        producer.join().unwrap();
        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn park_lane_preserves_order() {
        let (tx, rx) = lane(2, WaitPolicy::Park);
        let producer = thread::spawn(move || {
            for v in 0..500 {
                tx.send(v).unwrap();
            }
        });
        let received: Vec<i32> = (0..500).map(|_| rx.recv().unwrap()).collect();
        producer.join().unwrap();
        assert_eq!(received, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn try_send_hands_back_value_when_full() {
        for policy in [WaitPolicy::Spin, WaitPolicy::Park] {
            let (tx, rx) = lane(1, policy);
            assert_eq!(tx.try_send(1), Ok(Ok(())));
            assert_eq!(tx.try_send(2), Ok(Err(2)), "policy {policy}");
            assert_eq!(rx.try_recv(), Ok(Some(1)));
            assert_eq!(rx.try_recv(), Ok(None));
        }
    }

    #[test]
    fn dropped_receiver_disconnects_sender() {
        for policy in [WaitPolicy::Spin, WaitPolicy::Park] {
            let (tx, rx) = lane::<u8>(1, policy);
            drop(rx);
            assert_eq!(tx.send(1), Err(LaneError::Disconnected), "policy {policy}");
        }
    }

    #[test]
    fn dropped_sender_drains_then_disconnects() {
        for policy in [WaitPolicy::Spin, WaitPolicy::Park] {
            let (tx, rx) = lane(2, policy);
            tx.send(7u8).unwrap();
            drop(tx);
            assert_eq!(rx.recv(), Ok(7));
            assert_eq!(rx.recv(), Err(LaneError::Disconnected), "policy {policy}");
        }
    }
}
