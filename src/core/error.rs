//! Error types for pool, scheduler and task execution.

use thiserror::Error;

/// Errors surfaced synchronously by pool, worker and scheduler operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// `submit` was called after `shutdown`.
    #[error("pool is closed")]
    PoolClosed,
    /// `shutdown` was called more than once.
    #[error("pool is already shutting down")]
    AlreadyShuttingDown,
    /// The task's topic has no worker group.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),
    /// A topic-partitioned pool received a task without a topic.
    #[error("task has no topic")]
    MissingTopic,
    /// Topic partitioning cannot be built for the given workers.
    #[error("partition configuration error: {0}")]
    PartitionConfiguration(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The worker reads from a shared queue and has no inbox.
    #[error("worker {0} has no private inbox")]
    NotAnInbox(String),
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A task failed while a worker was running it.
///
/// These never escape the worker loop; they are handed to the pool's
/// [`FailureObserver`](crate::core::FailureObserver).
#[derive(Debug, Error)]
pub enum TaskExecutionError {
    /// The task returned an error.
    #[error("task on {worker} failed: {error:#}")]
    Failed {
        /// Name of the worker that ran the task.
        worker: String,
        /// Error returned by the task.
        error: anyhow::Error,
    },
    /// The task panicked.
    #[error("task on {worker} panicked: {message}")]
    Panicked {
        /// Name of the worker that ran the task.
        worker: String,
        /// Panic payload rendered as text.
        message: String,
    },
}

impl TaskExecutionError {
    /// Name of the worker the failure happened on.
    pub fn worker(&self) -> &str {
        match self {
            Self::Failed { worker, .. } | Self::Panicked { worker, .. } => worker,
        }
    }

    /// Whether the task panicked rather than returning an error.
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_display() {
        assert_eq!(PoolError::PoolClosed.to_string(), "pool is closed");
        assert_eq!(
            PoolError::AlreadyShuttingDown.to_string(),
            "pool is already shutting down"
        );
        assert_eq!(
            PoolError::UnknownTopic("billing".into()).to_string(),
            "unknown topic: billing"
        );
        assert_eq!(
            PoolError::NotAnInbox("pool-worker-3".into()).to_string(),
            "worker pool-worker-3 has no private inbox"
        );
    }

    #[test]
    fn test_spawn_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads left");
        let err: PoolError = io.into();
        assert!(matches!(err, PoolError::Spawn(_)));
        assert_eq!(err.to_string(), "failed to spawn worker thread: no threads left");
    }

    #[test]
    fn test_task_execution_error() {
        let failed = TaskExecutionError::Failed {
            worker: "w-0".into(),
            error: anyhow::anyhow!("disk full").context("writing report"),
        };
        assert_eq!(failed.worker(), "w-0");
        assert!(!failed.is_panic());
        assert_eq!(failed.to_string(), "task on w-0 failed: writing report: disk full");

        let panicked = TaskExecutionError::Panicked {
            worker: "w-1".into(),
            message: "boom".into(),
        };
        assert!(panicked.is_panic());
        assert_eq!(panicked.to_string(), "task on w-1 panicked: boom");
    }
}
