//! Worker pool with dedicated OS threads and a sentinel-based shutdown.
//!
//! A `WorkerPool` owns a fixed set of [`Worker`]s decided at construction.
//! Tasks reach them in one of two layouts:
//!
//! - **Shared queue**: every worker pops from one [`BoundedQueue`]. With a
//!   capacity, `submit` blocks while the queue is full (backpressure).
//! - **Per-worker inbox**: each worker has a private unbounded inbox and a
//!   [`Scheduler`] decides which inbox receives each task.
//!
//! # Lifecycle
//!
//! `Open` --submit*--> `Open` --shutdown()--> `Draining` --join()--> `Closed`
//!
//! `shutdown()` sends exactly one [`Message::Shutdown`] per worker: N of them
//! into the shared queue, or one straight into every inbox (bypassing the
//! scheduler). Queues are FIFO, so every task accepted before `shutdown()` runs
//! before the worker that dequeues it sees its sentinel.
//!
//! # Example
//!
//! ```rust,ignore
//! use prometheus_task_pool::config::WorkerPoolConfig;
//! use prometheus_task_pool::core::WorkerPool;
//!
//! let pool = WorkerPool::new(
//!     WorkerPoolConfig::new()
//!         .with_worker_count(4)
//!         .with_queue_capacity(128),
//! )?;
//!
//! pool.submit(|| println!("hello from a worker"))?;
//! pool.shutdown()?;
//! pool.join();
//! ```
//!
//! [`BoundedQueue`]: crate::core::BoundedQueue

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{QueueMode, SchedulerConfig, WorkerPoolConfig};
use crate::core::error::PoolError;
use crate::core::observer::{FailureObserver, TracingObserver};
use crate::core::queue::Message;
use crate::core::scheduler::{self, Scheduler};
use crate::core::task::{Job, Task};
use crate::core::worker::{JobQueue, Worker, WorkerQueue};

/// Lifecycle state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting submissions.
    Open,
    /// `shutdown()` was called; workers are draining their queues.
    Draining,
    /// Every worker thread has been joined.
    Closed,
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Tasks accepted by `submit`.
    pub submitted_tasks: u64,
    /// Tasks that ran to completion.
    pub completed_tasks: u64,
    /// Tasks that returned an error or panicked.
    pub failed_tasks: u64,
    /// Accepted tasks that have not finished yet.
    pub pending_tasks: u64,
}

enum Layout {
    Shared(Arc<JobQueue>),
    Inbox(SchedulerConfig),
}

enum Dispatch {
    Shared(Arc<JobQueue>),
    Scheduled(Box<dyn Scheduler>),
}

impl Dispatch {
    fn shared_queue(&self) -> Option<&JobQueue> {
        match self {
            Self::Shared(queue) => Some(queue),
            Self::Scheduled(_) => None,
        }
    }
}

/// Fixed-size pool of worker threads.
///
/// `WorkerPool` is `Send + Sync`; wrap it in an `Arc` to submit from several
/// producer threads.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    workers: Arc<[Worker]>,
    dispatch: Dispatch,
    /// Held for reading across a whole submission so `shutdown()` cannot slip
    /// its sentinels in front of a task that was already accepted.
    state: RwLock<PoolState>,
    submitted: AtomicU64,
}

impl WorkerPool {
    /// Create a pool that logs task failures through `tracing`.
    ///
    /// # Errors
    ///
    /// See [`with_observer`](Self::with_observer).
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a pool reporting task failures to `observer`.
    ///
    /// Spawns `config.worker_count` threads named
    /// `{thread_name_prefix}-{index}`.
    ///
    /// # Errors
    ///
    /// - `PoolError::InvalidConfig` if the configuration is invalid
    /// - `PoolError::PartitionConfiguration` if topics cannot be laid out over
    ///   the workers
    /// - `PoolError::Spawn` if a thread cannot be started; workers already
    ///   started are told to shut down
    pub fn with_observer(
        config: WorkerPoolConfig,
        observer: Arc<dyn FailureObserver>,
    ) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let layout = match &config.mode {
            QueueMode::SharedQueue { capacity } => Layout::Shared(Arc::new(
                JobQueue::with_capacity(capacity.and_then(NonZeroUsize::new)),
            )),
            QueueMode::PerWorkerInbox { scheduler } => {
                if let SchedulerConfig::TopicPartition { topics } = scheduler {
                    // Reject bad layouts before any thread exists.
                    scheduler::partition(topics, config.worker_count)?;
                }
                Layout::Inbox(scheduler.clone())
            }
        };
        let shared = match &layout {
            Layout::Shared(queue) => Some(queue.as_ref()),
            Layout::Inbox(_) => None,
        };

        let mut workers = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            let queue = match &layout {
                Layout::Shared(queue) => WorkerQueue::Shared(Arc::clone(queue)),
                Layout::Inbox(_) => WorkerQueue::Inbox,
            };
            let name = format!("{}-{index}", config.thread_name_prefix);
            match Worker::spawn(
                index,
                name,
                queue,
                Arc::clone(&observer),
                config.thread_stack_size,
            ) {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    warn!(index, error = %err, "Worker spawn failed, stopping started workers");
                    send_shutdown(&workers, shared);
                    return Err(err);
                }
            }
        }
        let workers: Arc<[Worker]> = workers.into();

        let dispatch = match layout {
            Layout::Shared(queue) => Dispatch::Shared(queue),
            Layout::Inbox(scheduler_config) => {
                match scheduler::build(&scheduler_config, Arc::clone(&workers)) {
                    Ok(scheduler) => Dispatch::Scheduled(scheduler),
                    Err(err) => {
                        send_shutdown(&workers, None);
                        return Err(err);
                    }
                }
            }
        };

        info!(
            worker_count = config.worker_count,
            strategy = dispatch.name(),
            capacity = ?dispatch.shared_queue().and_then(JobQueue::capacity),
            "WorkerPool initialized with dedicated OS threads"
        );

        Ok(Self {
            config,
            workers,
            dispatch,
            state: RwLock::new(PoolState::Open),
            submitted: AtomicU64::new(0),
        })
    }

    /// Submit a task.
    ///
    /// On a bounded shared queue this blocks while the queue is full. In
    /// per-worker mode the task goes to the inbox chosen by the scheduler.
    ///
    /// # Errors
    ///
    /// - `PoolError::PoolClosed` once `shutdown()` has been called
    /// - `PoolError::UnknownTopic` / `PoolError::MissingTopic` from
    ///   topic-partitioned scheduling; the task is dropped unexecuted
    pub fn submit<T: Task>(&self, task: T) -> Result<(), PoolError> {
        self.submit_boxed(Box::new(task))
    }

    /// Submit an already boxed task.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub fn submit_boxed(&self, job: Job) -> Result<(), PoolError> {
        let state = self.state.read();
        if *state != PoolState::Open {
            return Err(PoolError::PoolClosed);
        }

        match &self.dispatch {
            Dispatch::Shared(queue) => {
                queue.push(Message::Task(job));
                debug!("Task submitted to shared queue");
            }
            Dispatch::Scheduled(scheduler) => {
                let worker = scheduler.schedule(job)?;
                debug!(worker, strategy = scheduler.name(), "Task scheduled");
            }
        }

        self.submitted.fetch_add(1, Ordering::Relaxed);
        drop(state);
        Ok(())
    }

    /// Stop accepting tasks and send every worker its shutdown message.
    ///
    /// Does not wait; call [`join`](Self::join) afterwards. On a full bounded
    /// queue this blocks until workers make room for the sentinels.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::AlreadyShuttingDown` on any call after the first.
    pub fn shutdown(&self) -> Result<(), PoolError> {
        {
            let mut state = self.state.write();
            if *state != PoolState::Open {
                warn!(state = ?*state, "shutdown() called more than once");
                return Err(PoolError::AlreadyShuttingDown);
            }
            *state = PoolState::Draining;
        }

        info!(
            worker_count = self.workers.len(),
            "Shutting down worker pool"
        );
        send_shutdown(&self.workers, self.dispatch.shared_queue());
        Ok(())
    }

    /// Block until every worker thread has terminated.
    ///
    /// Workers only terminate after consuming their shutdown message, so
    /// calling this before [`shutdown`](Self::shutdown) blocks until some
    /// other thread shuts the pool down, possibly forever.
    pub fn join(&self) {
        if self.state() == PoolState::Open {
            warn!("join() called on an open pool; blocking until shutdown() is called");
        }

        for worker in self.workers.iter() {
            worker.join();
        }

        *self.state.write() = PoolState::Closed;
        info!(
            worker_count = self.workers.len(),
            "Worker pool shut down complete"
        );
    }

    /// [`shutdown`](Self::shutdown) followed by [`join`](Self::join).
    ///
    /// # Errors
    ///
    /// Returns `PoolError::AlreadyShuttingDown` without joining if the pool
    /// was already shut down.
    pub fn shutdown_and_join(&self) -> Result<(), PoolError> {
        self.shutdown()?;
        self.join();
        Ok(())
    }

    /// Pending task count of each worker, in construction order.
    ///
    /// With per-worker inboxes this is the inbox length plus the running task.
    /// On a shared queue each entry is 0 or 1 (the running task); tasks still
    /// waiting in the shared queue are reported by
    /// [`queue_len`](Self::queue_len) instead. Values are snapshots.
    pub fn status(&self) -> Vec<usize> {
        self.workers.iter().map(Worker::pending_count).collect()
    }

    /// Number of messages waiting in the shared queue, shutdown messages
    /// included. `None` for per-worker inbox pools.
    pub fn queue_len(&self) -> Option<usize> {
        self.dispatch.shared_queue().map(JobQueue::len)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        *self.state.read()
    }

    /// Number of workers.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Workers in construction order.
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Configuration the pool was built from.
    pub const fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (completed_tasks, failed_tasks) =
            self.workers.iter().fold((0, 0), |(completed, failed), worker| {
                let stats = worker.stats();
                (completed + stats.completed_tasks, failed + stats.failed_tasks)
            });
        let submitted_tasks = self.submitted.load(Ordering::Relaxed);
        PoolStats {
            worker_count: self.workers.len(),
            submitted_tasks,
            completed_tasks,
            failed_tasks,
            pending_tasks: submitted_tasks.saturating_sub(completed_tasks + failed_tasks),
        }
    }
}

impl Dispatch {
    fn name(&self) -> &'static str {
        match self {
            Self::Shared(_) => "shared_queue",
            Self::Scheduled(scheduler) => scheduler.name(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Never join here: a long task would hang the dropping thread.
        let state = self.state.get_mut();
        if *state == PoolState::Open {
            *state = PoolState::Draining;
            send_shutdown(&self.workers, self.dispatch.shared_queue());
            debug!("WorkerPool dropped without explicit shutdown - workers will drain and exit");
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("strategy", &self.dispatch.name())
            .field("state", &self.state())
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

/// One shutdown message per worker: all into `shared` when present, otherwise
/// one into each worker's inbox.
fn send_shutdown(workers: &[Worker], shared: Option<&JobQueue>) {
    match shared {
        Some(queue) => {
            for _ in workers {
                queue.push(Message::Shutdown);
            }
        }
        None => {
            for worker in workers {
                if let Err(err) = worker.enqueue_shutdown() {
                    warn!(worker = worker.name(), error = %err, "Failed to deliver shutdown");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observer::CollectingObserver;
    use crate::core::task;

    fn shared_pool(workers: usize) -> WorkerPool {
        WorkerPool::new(WorkerPoolConfig::new().with_worker_count(workers)).unwrap()
    }

    #[test]
    fn test_state_machine() {
        let pool = shared_pool(2);
        assert_eq!(pool.state(), PoolState::Open);
        pool.submit(|| {}).unwrap();

        pool.shutdown().unwrap();
        assert_eq!(pool.state(), PoolState::Draining);
        assert!(matches!(pool.submit(|| {}), Err(PoolError::PoolClosed)));

        pool.join();
        assert_eq!(pool.state(), PoolState::Closed);
        assert!(matches!(pool.submit(|| {}), Err(PoolError::PoolClosed)));
        assert!(matches!(
            pool.shutdown(),
            Err(PoolError::AlreadyShuttingDown)
        ));
    }

    #[test]
    fn test_double_shutdown_is_reported() {
        let pool = shared_pool(1);
        pool.shutdown().unwrap();
        assert!(matches!(
            pool.shutdown(),
            Err(PoolError::AlreadyShuttingDown)
        ));
        assert!(matches!(
            pool.shutdown_and_join(),
            Err(PoolError::AlreadyShuttingDown)
        ));
        pool.join();
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(0)).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));

        let err = WorkerPool::new(WorkerPoolConfig::new().with_queue_capacity(0)).unwrap_err();
        assert!(matches!(err, PoolError::InvalidConfig(_)));
    }

    #[test]
    fn test_bad_partition_rejected_before_spawn() {
        let config = WorkerPoolConfig::new()
            .with_worker_count(1)
            .with_scheduler(SchedulerConfig::TopicPartition {
                topics: vec!["a".into(), "b".into()],
            });
        assert!(matches!(
            WorkerPool::new(config),
            Err(PoolError::PartitionConfiguration(_))
        ));
    }

    #[test]
    fn test_stats_count_failures() {
        let observer = Arc::new(CollectingObserver::default());
        let pool = WorkerPool::with_observer(
            WorkerPoolConfig::new()
                .with_worker_count(2)
                .with_scheduler(SchedulerConfig::RoundRobin),
            observer.clone(),
        )
        .unwrap();

        pool.submit(|| {}).unwrap();
        pool.submit(task::fallible(|| anyhow::bail!("nope"))).unwrap();
        pool.submit(|| panic!("kaboom")).unwrap();
        pool.shutdown_and_join().unwrap();

        let stats = pool.stats();
        assert_eq!(
            stats,
            PoolStats {
                worker_count: 2,
                submitted_tasks: 3,
                completed_tasks: 1,
                failed_tasks: 2,
                pending_tasks: 0,
            }
        );
        assert_eq!(observer.len(), 2);
    }

    #[test]
    fn test_queue_len_reports_waiting_shared_tasks() {
        let pool = shared_pool(1);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(0);
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        pool.submit(move || {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
        })
        .unwrap();
        started_rx.recv().unwrap();

        for _ in 0..3 {
            pool.submit(|| {}).unwrap();
        }
        assert_eq!(pool.queue_len(), Some(3));
        assert_eq!(pool.status(), vec![1]);

        release_tx.send(()).unwrap();
        pool.shutdown_and_join().unwrap();
        assert_eq!(pool.queue_len(), Some(0));
        assert_eq!(pool.status(), vec![0]);

        let inbox = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_worker_count(2)
                .with_scheduler(SchedulerConfig::RoundRobin),
        )
        .unwrap();
        assert_eq!(inbox.queue_len(), None);
        inbox.shutdown_and_join().unwrap();
    }

    #[test]
    fn test_thread_prefix_applied() {
        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_worker_count(3)
                .with_thread_name_prefix("ingest"),
        )
        .unwrap();
        let names: Vec<_> = pool.workers().iter().map(Worker::name).collect();
        assert_eq!(names, vec!["ingest-0", "ingest-1", "ingest-2"]);
        pool.shutdown_and_join().unwrap();
    }

    #[test]
    fn test_drop_without_shutdown_lets_tasks_finish() {
        let (tx, rx) = crossbeam_channel::unbounded();
        {
            let pool = shared_pool(2);
            for i in 0..10 {
                let tx = tx.clone();
                pool.submit(move || {
                    let _ = tx.send(i);
                })
                .unwrap();
            }
        }
        drop(tx);
        let mut got: Vec<i32> = rx.iter().collect();
        got.sort_unstable();
        assert_eq!(got, (0..10).collect::<Vec<_>>());
    }
}
