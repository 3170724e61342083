//! Demand and supply counters.
//!
//! Every field is an atomic and every mutation is a single indivisible
//! increment or decrement. The two headline counters are never updated
//! together; readers may observe one before the other has caught up.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use tokio::sync::Notify;

/// How a provisioning attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The provisioner accepted the call.
    Provisioned,
    /// The provisioner returned an error.
    Failed,
    /// Stopped before the call: limiter refusal or bad payload.
    Aborted,
}

pub(crate) struct LauncherState {
    /// Demand events not yet matched by done/timedout. May go negative.
    pending_jobs: AtomicI64,
    /// Attempts between start and finish.
    active_workers: AtomicI64,
    triggered: AtomicU64,
    finished: AtomicU64,
    provisioned: AtomicU64,
    failed: AtomicU64,
    aborted: AtomicU64,
    /// Woken whenever an attempt finishes.
    settled: Notify,
}

impl LauncherState {
    pub(crate) fn new() -> Self {
        Self {
            pending_jobs: AtomicI64::new(0),
            active_workers: AtomicI64::new(0),
            triggered: AtomicU64::new(0),
            finished: AtomicU64::new(0),
            provisioned: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            settled: Notify::new(),
        }
    }

    /// Record one demand event, returning the new pending count.
    pub(crate) fn add_pending(&self) -> i64 {
        self.pending_jobs.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Record one served or expired demand event, returning the new pending count.
    pub(crate) fn remove_pending(&self) -> i64 {
        self.pending_jobs.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub(crate) fn pending_jobs(&self) -> i64 {
        self.pending_jobs.load(Ordering::SeqCst)
    }

    pub(crate) fn active_workers(&self) -> i64 {
        self.active_workers.load(Ordering::SeqCst)
    }

    pub(crate) fn triggered(&self) -> u64 {
        self.triggered.load(Ordering::SeqCst)
    }

    pub(crate) fn finished(&self) -> u64 {
        self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn provisioned(&self) -> u64 {
        self.provisioned.load(Ordering::SeqCst)
    }

    pub(crate) fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub(crate) fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::SeqCst)
    }

    pub(crate) fn settled(&self) -> &Notify {
        &self.settled
    }

    /// True once every triggered attempt has finished.
    pub(crate) fn is_settled(&self) -> bool {
        self.finished() >= self.triggered()
    }

    /// Register a newly triggered attempt.
    pub(crate) fn open_attempt(self: &Arc<Self>) -> Attempt {
        self.triggered.fetch_add(1, Ordering::SeqCst);
        Attempt {
            state: Arc::clone(self),
            outcome: Outcome::Aborted,
        }
    }

    /// Mark one attempt as in flight until the guard drops.
    pub(crate) fn begin_active(self: &Arc<Self>) -> ActiveWorker {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
        ActiveWorker {
            state: Arc::clone(self),
        }
    }
}

/// Ticket for one triggered attempt.
///
/// Dropping it records the outcome and wakes `settle()` waiters, so an
/// attempt whose task is torn down mid-flight still counts as finished.
pub(crate) struct Attempt {
    state: Arc<LauncherState>,
    outcome: Outcome,
}

impl Attempt {
    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.outcome = outcome;
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        let counter = match self.outcome {
            Outcome::Provisioned => &self.state.provisioned,
            Outcome::Failed => &self.state.failed,
            Outcome::Aborted => &self.state.aborted,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.state.finished.fetch_add(1, Ordering::SeqCst);
        self.state.settled.notify_waiters();
    }
}

/// Holds one unit of `active_workers` for its lifetime.
pub(crate) struct ActiveWorker {
    state: Arc<LauncherState>,
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.state.active_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The provisioning trigger: demand exceeds in-flight supply minus one slot
/// of slack, so the very first job still launches a worker.
pub(crate) fn should_provision(pending: i64, active: i64) -> bool {
    pending > active - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_tracks_inbound_minus_completions() {
        let state = LauncherState::new();
        assert_eq!(state.add_pending(), 1);
        assert_eq!(state.add_pending(), 2);
        assert_eq!(state.remove_pending(), 1);
        assert_eq!(state.remove_pending(), 0);
        assert_eq!(state.remove_pending(), -1);
        assert_eq!(state.pending_jobs(), -1);
    }

    #[test]
    fn trigger_rule_boundaries() {
        // First job with nothing in flight.
        assert!(should_provision(1, 0));
        // Demand equal to in-flight supply still triggers.
        assert!(should_provision(2, 2));
        // Demand at or below supply minus one does not.
        assert!(!should_provision(1, 2));
        assert!(!should_provision(-2, 0));
        assert!(should_provision(0, 0));
    }

    #[test]
    fn active_guard_releases_on_drop() {
        let state = Arc::new(LauncherState::new());
        {
            let _a = state.begin_active();
            let _b = state.begin_active();
            assert_eq!(state.active_workers(), 2);
        }
        assert_eq!(state.active_workers(), 0);
    }

    #[test]
    fn attempt_records_outcome_on_drop() {
        let state = Arc::new(LauncherState::new());

        let mut ok = state.open_attempt();
        let mut failed = state.open_attempt();
        let dropped = state.open_attempt();
        assert_eq!(state.triggered(), 3);
        assert!(!state.is_settled());

        ok.finish(Outcome::Provisioned);
        failed.finish(Outcome::Failed);
        drop(ok);
        drop(failed);
        drop(dropped);

        assert!(state.is_settled());
        assert_eq!(state.provisioned(), 1);
        assert_eq!(state.failed(), 1);
        assert_eq!(state.aborted(), 1);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        use std::thread;

        let state = Arc::new(LauncherState::new());
        let mut handles = vec![];

        for i in 0..8 {
            let state = state.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    if i % 2 == 0 {
                        state.add_pending();
                    } else {
                        state.remove_pending();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(state.pending_jobs(), 0);
    }
}
