//! Failure observation for tasks that error or panic inside a worker.
//!
//! Workers never let a task failure end their loop. Instead each failure is
//! handed to a [`FailureObserver`]. The default observer logs through
//! `tracing`; [`CollectingObserver`] keeps failures in memory for tests and
//! diagnostics.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::core::error::TaskExecutionError;

/// Receives every task failure raised inside a worker thread.
///
/// Called from worker threads, so implementations must be cheap and must not
/// block on the pool that reports to them.
pub trait FailureObserver: Send + Sync {
    /// Record a task failure.
    fn task_failed(&self, failure: TaskExecutionError);
}

/// Observer that logs failures at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FailureObserver for TracingObserver {
    fn task_failed(&self, failure: TaskExecutionError) {
        tracing::error!(
            worker = failure.worker(),
            panicked = failure.is_panic(),
            error = %failure,
            "Task execution failed"
        );
    }
}

/// In-memory observer with a bounded buffer; oldest failures are evicted first.
#[derive(Debug)]
pub struct CollectingObserver {
    failures: Mutex<VecDeque<TaskExecutionError>>,
    max_failures: usize,
}

impl CollectingObserver {
    /// Create an observer retaining at most `max_failures` entries.
    pub fn new(max_failures: usize) -> Self {
        Self {
            failures: Mutex::new(VecDeque::with_capacity(max_failures.min(1024))),
            max_failures,
        }
    }

    /// Number of retained failures.
    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    /// Whether no failure has been retained.
    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }

    /// Remove and return all retained failures, oldest first.
    pub fn drain(&self) -> Vec<TaskExecutionError> {
        self.failures.lock().drain(..).collect()
    }
}

impl Default for CollectingObserver {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl FailureObserver for CollectingObserver {
    fn task_failed(&self, failure: TaskExecutionError) {
        if self.max_failures == 0 {
            return;
        }
        let mut failures = self.failures.lock();
        if failures.len() >= self.max_failures {
            failures.pop_front();
        }
        failures.push_back(failure);
    }
}
