//! Configuration models for worker pools and scheduling strategies.

pub mod pool;

pub use pool::{QueueMode, SchedulerConfig, WorkerPoolConfig, DEFAULT_THREAD_PREFIX};
