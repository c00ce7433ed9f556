// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Expiry scheduler: a min-heap of artifact deadlines drained by a periodic
// sweep running on its own Tokio task.
//
// Sweep failures are logged and never surface to callers.  An artifact
// still leased when its deadline passes is re-enqueued with backoff; once
// the deferral budget is spent it is dropped from the queue and left for
// the shutdown/startup purge.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use pexel_core::ArtifactHandle;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::backoff::{DeferralDecision, DeferralPolicy};
use crate::clock::Clock;
use crate::store::{ArtifactStore, Removal};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Scheduled {
    due: DateTime<Utc>,
    /// Insertion order; breaks ties between equal deadlines.
    seq: u64,
    handle: ArtifactHandle,
    deferrals: u32,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct Queue {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl Queue {
    fn push(&mut self, handle: ArtifactHandle, due: DateTime<Utc>, deferrals: u32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled {
            due,
            seq,
            handle,
            deferrals,
        }));
    }

    fn remove(&mut self, handle: ArtifactHandle) -> bool {
        let before = self.heap.len();
        self.heap.retain(|Reverse(entry)| entry.handle != handle);
        self.heap.len() != before
    }

    /// Pop every entry due at or before `now`, earliest first.
    fn drain_due(&mut self, now: DateTime<Utc>) -> Vec<Scheduled> {
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(entry)| entry.due <= now)
        {
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry);
            }
        }
        due
    }
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub deleted: usize,
    /// Re-enqueued because of active readers.
    pub deferred: usize,
    /// Deferral budget exhausted; the artifact is left in place.
    pub dropped: usize,
    /// Already deleted or extended since it was scheduled.
    pub skipped: usize,
    /// Removal failed with an I/O error.
    pub failed: usize,
}

/// Owns artifact deadlines and the background sweep task.
///
/// Create one per process, hand it to [`ArtifactStore::open`], then call
/// [`ExpiryScheduler::start`].  [`ExpiryScheduler::shutdown`] stops the task
/// and purges the store.
pub struct ExpiryScheduler {
    queue: Mutex<Queue>,
    policy: DeferralPolicy,
    clock: Arc<dyn Clock>,
    shutdown_signal: Arc<Notify>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ExpiryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryScheduler")
            .field("pending", &self.pending())
            .field("policy", &self.policy)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ExpiryScheduler {
    pub fn new(policy: DeferralPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            policy,
            clock,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: Mutex::new(None),
        }
    }

    pub fn policy(&self) -> &DeferralPolicy {
        &self.policy
    }

    // -- Queue ----------------------------------------------------------------

    /// Register a deadline for `handle`.
    pub fn schedule(&self, handle: ArtifactHandle, due: DateTime<Utc>) {
        self.queue.lock().push(handle, due, 0);
        debug!(%handle, %due, "Expiry scheduled");
    }

    /// Drop any pending deadline for `handle`.  Returns whether one existed.
    pub fn cancel(&self, handle: ArtifactHandle) -> bool {
        let removed = self.queue.lock().remove(handle);
        if removed {
            debug!(%handle, "Expiry cancelled");
        }
        removed
    }

    /// Replace the deadline for `handle`.
    pub fn reschedule(&self, handle: ArtifactHandle, due: DateTime<Utc>) {
        let mut queue = self.queue.lock();
        queue.remove(handle);
        queue.push(handle, due, 0);
    }

    /// Number of deadlines waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.lock().heap.len()
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.queue.lock().heap.peek().map(|Reverse(entry)| entry.due)
    }

    // -- Sweep ----------------------------------------------------------------

    /// Delete every due artifact that has no readers.
    #[instrument(skip_all)]
    pub async fn sweep(&self, store: &ArtifactStore) -> SweepReport {
        let now = self.clock.now();
        let due = self.queue.lock().drain_due(now);
        let mut report = SweepReport::default();

        for entry in due {
            match store.remove_expired(entry.handle).await {
                Ok(Removal::Deleted) => report.deleted += 1,
                Ok(Removal::Absent | Removal::NotDue) => report.skipped += 1,
                Ok(Removal::Deferred(readers)) => match self.policy.decide(entry.deferrals) {
                    DeferralDecision::RetryAfter(delay) => {
                        let retry_at = now + TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
                        self.queue
                            .lock()
                            .push(entry.handle, retry_at, entry.deferrals + 1);
                        debug!(
                            handle = %entry.handle,
                            readers,
                            attempt = entry.deferrals + 1,
                            %retry_at,
                            "Deletion deferred"
                        );
                        report.deferred += 1;
                    }
                    DeferralDecision::Exhausted => {
                        warn!(
                            handle = %entry.handle,
                            readers,
                            deferrals = entry.deferrals,
                            "Artifact still leased after every retry; leaving it for the purge"
                        );
                        report.dropped += 1;
                    }
                },
                Err(err) => {
                    warn!(handle = %entry.handle, error = %err, "Failed to remove expired artifact");
                    report.failed += 1;
                }
            }
        }

        if report != SweepReport::default() {
            debug!(
                deleted = report.deleted,
                deferred = report.deferred,
                dropped = report.dropped,
                skipped = report.skipped,
                failed = report.failed,
                "Sweep finished"
            );
        }
        report
    }

    // -- Lifecycle ------------------------------------------------------------

    pub fn is_running(&self) -> bool {
        self.task_handle
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Spawn the periodic sweep.  Calling it again while running is a no-op.
    ///
    /// The task holds only a weak reference to the store and exits on its
    /// own once the store is dropped.
    pub fn start(self: &Arc<Self>, store: &Arc<ArtifactStore>, interval: Duration) {
        let mut task_handle = self.task_handle.lock();
        if task_handle.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("Expiry scheduler already running");
            return;
        }

        let scheduler = Arc::clone(self);
        let store = Arc::downgrade(store);
        let shutdown = Arc::clone(&self.shutdown_signal);
        *task_handle = Some(tokio::spawn(async move {
            scheduler.sweep_loop(store, shutdown, interval).await;
        }));
        info!(interval_ms = interval.as_millis() as u64, "Expiry scheduler started");
    }

    async fn sweep_loop(&self, store: Weak<ArtifactStore>, shutdown: Arc<Notify>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("Sweep loop received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let Some(store) = store.upgrade() else {
                        debug!("Store dropped; sweep loop exiting");
                        break;
                    };
                    self.sweep(&store).await;
                }
            }
        }
    }

    /// Stop the sweep task, then best-effort delete every remaining
    /// artifact.  Returns how many were removed.
    #[instrument(skip_all)]
    pub async fn shutdown(&self, store: &ArtifactStore) -> usize {
        let task = self.task_handle.lock().take();
        if let Some(task) = task {
            self.shutdown_signal.notify_one();
            if let Err(err) = task.await {
                warn!(error = %err, "Sweep task ended abnormally");
            }
        }

        let removed = store.purge().await;
        self.queue.lock().heap.clear();
        info!(removed, "Expiry scheduler stopped");
        removed
    }
}
