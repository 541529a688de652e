//! Core pool abstractions: queue, tasks, workers, schedulers and the pool.

pub mod error;
pub mod observer;
pub mod queue;
pub mod scheduler;
pub mod task;
pub mod worker;
pub mod worker_pool;

pub use error::{AppResult, PoolError, TaskExecutionError};
pub use observer::{CollectingObserver, FailureObserver, TracingObserver};
pub use queue::{BoundedQueue, Message};
pub use scheduler::{LeastBusyFirst, RoundRobin, Scheduler, TopicPartition};
pub use task::{fallible, routed, Fallible, Job, Routed, Task, TaskResult};
pub use worker::{JobQueue, Worker, WorkerQueue, WorkerState, WorkerStats};
pub use worker_pool::{PoolState, PoolStats, WorkerPool};
