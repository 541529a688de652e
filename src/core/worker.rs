//! A single worker: one OS thread draining one queue.
//!
//! A worker either owns a private, unbounded inbox (per-worker scheduling) or
//! consumes from a queue shared with every other worker in the pool. In both
//! cases the thread pops until it sees [`Message::Shutdown`], which it consumes
//! without forwarding.
//!
//! Task failures stay inside the loop: an `Err` or a panic is turned into a
//! [`TaskExecutionError`] for the pool's [`FailureObserver`] and the worker moves
//! on to the next message.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::error::{PoolError, TaskExecutionError};
use crate::core::observer::FailureObserver;
use crate::core::queue::{BoundedQueue, Message};
use crate::core::task::Job;

/// Queue type shared between a pool and its workers.
pub type JobQueue = BoundedQueue<Message<Job>>;

/// Where a worker takes its messages from.
#[derive(Debug, Clone)]
pub enum WorkerQueue {
    /// A private unbounded inbox created for this worker.
    Inbox,
    /// A queue shared with other workers.
    Shared(Arc<JobQueue>),
}

/// Lifecycle of a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// The thread is polling its queue or running a task.
    Running,
    /// The thread consumed its shutdown message and exited.
    Terminated,
}

/// Per-worker execution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Tasks that returned `Ok`.
    pub completed_tasks: u64,
    /// Tasks that returned an error or panicked.
    pub failed_tasks: u64,
}

#[derive(Debug, Default)]
struct WorkerCounters {
    pending: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
    terminated: AtomicBool,
}

/// Owns exactly one execution thread.
pub struct Worker {
    index: usize,
    name: String,
    queue: Arc<JobQueue>,
    owns_queue: bool,
    counters: Arc<WorkerCounters>,
    /// Set once the shutdown message is queued; guards inbox pushes so no
    /// task can land behind it.
    closed: Mutex<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// Start a worker thread named `name` reading from `queue`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::Spawn` if the thread cannot be created.
    pub fn spawn(
        index: usize,
        name: impl Into<String>,
        queue: WorkerQueue,
        observer: Arc<dyn FailureObserver>,
        stack_size: Option<usize>,
    ) -> Result<Self, PoolError> {
        let name = name.into();
        let (queue, owns_queue) = match queue {
            WorkerQueue::Inbox => (Arc::new(JobQueue::unbounded()), true),
            WorkerQueue::Shared(queue) => (queue, false),
        };
        let counters = Arc::new(WorkerCounters::default());

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }

        let handle = {
            let queue = Arc::clone(&queue);
            let counters = Arc::clone(&counters);
            let name = name.clone();
            builder.spawn(move || {
                run_loop(&name, &queue, &counters, observer.as_ref(), owns_queue);
            })?
        };

        debug!(worker = %name, index, inbox = owns_queue, "Worker spawned");

        Ok(Self {
            index,
            name,
            queue,
            owns_queue,
            counters,
            closed: Mutex::new(false),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Position of this worker in its pool.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Thread name of this worker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the worker reads from its own inbox.
    pub const fn has_inbox(&self) -> bool {
        self.owns_queue
    }

    /// Push a task onto this worker's inbox.
    ///
    /// # Errors
    ///
    /// - `PoolError::NotAnInbox` for a worker on a shared queue
    /// - `PoolError::PoolClosed` once the shutdown message has been queued;
    ///   the job is dropped unexecuted
    pub fn enqueue(&self, job: Job) -> Result<(), PoolError> {
        if !self.owns_queue {
            return Err(PoolError::NotAnInbox(self.name.clone()));
        }
        let closed = self.closed.lock();
        if *closed {
            return Err(PoolError::PoolClosed);
        }
        // Count before pushing so the worker's decrement can never run first.
        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        self.queue.push(Message::Task(job));
        drop(closed);
        Ok(())
    }

    /// Push the shutdown message onto this worker's inbox.
    ///
    /// # Errors
    ///
    /// - `PoolError::NotAnInbox` for a worker on a shared queue; there the
    ///   pool owns the fan-out
    /// - `PoolError::AlreadyShuttingDown` if the message was already queued
    pub fn enqueue_shutdown(&self) -> Result<(), PoolError> {
        if !self.owns_queue {
            return Err(PoolError::NotAnInbox(self.name.clone()));
        }
        let mut closed = self.closed.lock();
        if *closed {
            return Err(PoolError::AlreadyShuttingDown);
        }
        *closed = true;
        self.queue.push(Message::Shutdown);
        drop(closed);
        Ok(())
    }

    /// Tasks assigned to this worker that have not finished.
    ///
    /// Counts queued inbox tasks plus the task currently running. On a shared
    /// queue only the running task is counted. This is a snapshot that may be
    /// stale by the time the caller acts on it: fine for load balancing, not
    /// for correctness decisions.
    pub fn pending_count(&self) -> usize {
        self.counters.pending.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        if self.counters.terminated.load(Ordering::Acquire) {
            WorkerState::Terminated
        } else {
            WorkerState::Running
        }
    }

    /// Snapshot of execution counters.
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            completed_tasks: self.counters.completed.load(Ordering::Relaxed),
            failed_tasks: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Block until the worker thread has exited. Returns immediately once it
    /// has already been joined.
    pub fn join(&self) {
        let mut handle = self.handle.lock();
        if let Some(handle) = handle.take() {
            if handle.join().is_err() {
                warn!(worker = %self.name, "Worker thread panicked");
            } else {
                debug!(worker = %self.name, "Worker joined");
            }
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("inbox", &self.owns_queue)
            .field("pending", &self.pending_count())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn run_loop(
    name: &str,
    queue: &JobQueue,
    counters: &WorkerCounters,
    observer: &dyn FailureObserver,
    owns_queue: bool,
) {
    debug!(worker = name, "Worker thread started");

    loop {
        let job = match queue.pop() {
            Message::Task(job) => job,
            Message::Shutdown => break,
        };

        if !owns_queue {
            counters.pending.fetch_add(1, Ordering::AcqRel);
        }

        match panic::catch_unwind(AssertUnwindSafe(move || job.call())) {
            Ok(Ok(())) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(error)) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                report(
                    observer,
                    name,
                    TaskExecutionError::Failed {
                        worker: name.to_owned(),
                        error,
                    },
                );
            }
            Err(payload) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                report(
                    observer,
                    name,
                    TaskExecutionError::Panicked {
                        worker: name.to_owned(),
                        message: panic_message(payload.as_ref()),
                    },
                );
            }
        }

        counters.pending.fetch_sub(1, Ordering::AcqRel);
    }

    counters.terminated.store(true, Ordering::Release);
    debug!(worker = name, "Worker thread exiting");
}

/// Hand `failure` to the observer; a panicking observer must not end the loop.
fn report(observer: &dyn FailureObserver, name: &str, failure: TaskExecutionError) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer.task_failed(failure))) {
        warn!(
            worker = name,
            panic = %panic_message(payload.as_ref()),
            "Failure observer panicked"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
