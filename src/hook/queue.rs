//! Bounded dispatch queue between producers and the sender thread.
//!
//! Producers enqueue through [`DispatchQueue`], which applies the overflow
//! policy and never reports failure to its caller. [`Pending`] counts records
//! that are queued or being sent so `flush` can wait for quiescence on a
//! condition variable instead of polling.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};
use parking_lot::{Condvar, Mutex, RwLock};

use crate::{
    diagnostics::Diagnostics, log_record::LogRecord, rate_limited_warner::RateLimitedWarner,
};

use super::config::OverflowPolicy;

/// Records accepted by the queue but not yet fully handled by the sender.
#[derive(Debug, Default)]
pub struct Pending {
    count: Mutex<usize>,
    drained: Condvar,
}

impl Pending {
    pub fn begin(&self) {
        *self.count.lock() += 1;
    }

    pub fn complete(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
    }

    /// Forget all outstanding work. Used once the sender has stopped.
    pub fn clear(&self) {
        *self.count.lock() = 0;
        self.drained.notify_all();
    }

    pub fn get(&self) -> usize {
        *self.count.lock()
    }

    /// Block until nothing is pending; `false` when `timeout` elapses first.
    ///
    /// A timeout too large to express as a deadline waits without one.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut count = self.count.lock();
        while *count > 0 {
            match deadline {
                Some(deadline) => {
                    if self.drained.wait_until(&mut count, deadline).timed_out() {
                        return *count == 0;
                    }
                }
                None => self.drained.wait(&mut count),
            }
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DropReason {
    Full,
    Closed,
}

/// Producer side of the bounded record channel.
#[derive(Debug)]
pub struct DispatchQueue {
    tx: RwLock<Option<Sender<LogRecord>>>,
    pending: Arc<Pending>,
    warner: RateLimitedWarner,
    diagnostics: Diagnostics,
}

/// Create a queue of `capacity` records and the receiver the sender drains.
pub fn dispatch_queue(
    capacity: usize,
    warn_interval: Duration,
    diagnostics: Diagnostics,
) -> (DispatchQueue, Receiver<LogRecord>) {
    let (tx, rx) = bounded(capacity);
    let queue = DispatchQueue {
        tx: RwLock::new(Some(tx)),
        pending: Arc::new(Pending::default()),
        warner: RateLimitedWarner::new(warn_interval),
        diagnostics,
    };
    (queue, rx)
}

impl DispatchQueue {
    pub fn pending(&self) -> Arc<Pending> {
        Arc::clone(&self.pending)
    }

    /// Insert `record` according to `policy`. Drops are logged, not returned.
    pub fn enqueue(&self, record: LogRecord, policy: OverflowPolicy) {
        let Some(tx) = self.sender() else {
            self.note_drop(DropReason::Closed);
            return;
        };
        self.pending.begin();
        let outcome = match policy {
            OverflowPolicy::Drop => tx.try_send(record).map_err(|err| match err {
                TrySendError::Full(_) => DropReason::Full,
                TrySendError::Disconnected(_) => DropReason::Closed,
            }),
            OverflowPolicy::Block => tx.send(record).map_err(|_| DropReason::Closed),
            OverflowPolicy::Timeout(timeout) => {
                tx.send_timeout(record, timeout).map_err(|err| match err {
                    SendTimeoutError::Timeout(_) => DropReason::Full,
                    SendTimeoutError::Disconnected(_) => DropReason::Closed,
                })
            }
        };
        if let Err(reason) = outcome {
            self.pending.complete();
            self.note_drop(reason);
        }
    }

    /// Stop accepting records. The sender drains what is already queued.
    pub fn close(&self) {
        self.tx.write().take();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.read().is_none()
    }

    /// Report any drops not yet warned about.
    pub fn flush_warnings(&self) {
        self.warner.flush(|count| {
            self.diagnostics
                .warn(format_args!("dropped {count} records in the last interval"));
        });
    }

    fn sender(&self) -> Option<Sender<LogRecord>> {
        self.tx.read().as_ref().cloned()
    }

    fn note_drop(&self, reason: DropReason) {
        self.warner.record_drop();
        self.warner.warn_if_due(|count| match reason {
            DropReason::Full => self
                .diagnostics
                .warn(format_args!("dispatch queue full; dropped {count} records")),
            DropReason::Closed => self
                .diagnostics
                .warn(format_args!("hook closed; dropped {count} records")),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{diagnostics::capture::CaptureLog, level::Level};
    use rstest::rstest;
    use std::thread;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Level::Info, message)
    }

    fn queue(capacity: usize) -> (DispatchQueue, Receiver<LogRecord>, Arc<CaptureLog>) {
        let log = Arc::new(CaptureLog::default());
        let (queue, rx) = dispatch_queue(capacity, Duration::ZERO, Diagnostics::new(log.clone()));
        (queue, rx, log)
    }

    #[rstest]
    fn preserves_fifo_order() {
        let (queue, rx, _) = queue(8);
        for i in 0..5 {
            queue.enqueue(record(&i.to_string()), OverflowPolicy::Drop);
        }
        let order: Vec<_> = rx.try_iter().map(|r| r.message).collect();
        assert_eq!(order, ["0", "1", "2", "3", "4"]);
        assert_eq!(queue.pending().get(), 5);
    }

    #[rstest]
    fn drop_policy_returns_immediately_when_full() {
        let (queue, rx, log) = queue(2);
        queue.enqueue(record("a"), OverflowPolicy::Drop);
        queue.enqueue(record("b"), OverflowPolicy::Drop);

        let start = Instant::now();
        queue.enqueue(record("c"), OverflowPolicy::Drop);
        assert!(start.elapsed() < Duration::from_millis(100));

        let kept: Vec<_> = rx.try_iter().map(|r| r.message).collect();
        assert_eq!(kept, ["a", "b"]);
        assert_eq!(queue.pending().get(), 2);
        assert!(log.contains("dispatch queue full; dropped 1 records"));
    }

    #[rstest]
    fn timeout_policy_waits_then_drops() {
        let (queue, rx, log) = queue(1);
        queue.enqueue(record("a"), OverflowPolicy::Drop);

        let start = Instant::now();
        queue.enqueue(record("b"), OverflowPolicy::Timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));

        assert_eq!(rx.try_iter().count(), 1);
        assert!(log.contains("dispatch queue full"));
    }

    #[rstest]
    fn block_policy_waits_for_space() {
        let (queue, rx, _) = queue(1);
        queue.enqueue(record("a"), OverflowPolicy::Block);
        let consumer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            rx.iter().take(2).map(|r| r.message).collect::<Vec<_>>()
        });

        queue.enqueue(record("b"), OverflowPolicy::Block);

        assert_eq!(consumer.join().expect("consumer"), ["a", "b"]);
    }

    #[rstest]
    fn closed_queue_drops_records() {
        let (queue, rx, log) = queue(4);
        queue.close();
        queue.enqueue(record("late"), OverflowPolicy::Block);
        assert!(queue.is_closed());
        assert_eq!(rx.try_iter().count(), 0);
        assert_eq!(queue.pending().get(), 0);
        assert!(log.contains("hook closed; dropped 1 records"));
    }

    #[rstest]
    fn wait_drained_observes_completion() {
        let pending = Arc::new(Pending::default());
        pending.begin();
        let worker = {
            let pending = Arc::clone(&pending);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                pending.complete();
            })
        };
        assert!(pending.wait_drained(Duration::from_secs(2)));
        worker.join().expect("worker");
    }

    #[rstest]
    fn wait_drained_accepts_unbounded_timeout() {
        let pending = Arc::new(Pending::default());
        assert!(pending.wait_drained(Duration::MAX));

        pending.begin();
        let worker = {
            let pending = Arc::clone(&pending);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                pending.complete();
            })
        };
        assert!(pending.wait_drained(Duration::MAX));
        worker.join().expect("worker");
    }

    #[rstest]
    fn wait_drained_times_out() {
        let pending = Pending::default();
        pending.begin();
        assert!(!pending.wait_drained(Duration::from_millis(20)));
        pending.clear();
        assert!(pending.wait_drained(Duration::ZERO));
    }
}
