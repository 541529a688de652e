//! # Prometheus Task Pool
//!
//! A fixed-size pool of OS-thread workers that consume tasks from queues, with
//! bounded backpressure, pluggable scheduling and a graceful shutdown protocol.
//!
//! ## Key Features
//!
//! - **Two queue layouts**: one shared FIFO consumed by every worker, or one
//!   private inbox per worker filled by a scheduler
//! - **Backpressure**: a bounded shared queue blocks producers while full
//! - **Scheduling strategies**: round-robin, least-busy-first and
//!   topic-partitioned worker groups
//! - **Graceful shutdown**: every task accepted before `shutdown()` runs before
//!   `join()` returns
//! - **Failure isolation**: a task that errors or panics is reported to a
//!   [`FailureObserver`](core::FailureObserver); its worker keeps running
//!
//! ## Shared queue with backpressure
//!
//! ```rust,ignore
//! use prometheus_task_pool::config::WorkerPoolConfig;
//! use prometheus_task_pool::core::WorkerPool;
//!
//! let pool = WorkerPool::new(
//!     WorkerPoolConfig::new()
//!         .with_worker_count(4)
//!         .with_queue_capacity(64),
//! )?;
//!
//! for n in 0..1_000 {
//!     pool.submit(move || crunch(n))?; // blocks while 64 tasks are queued
//! }
//! pool.shutdown()?;
//! pool.join();
//! ```
//!
//! ## Per-worker inboxes
//!
//! ```rust,ignore
//! use prometheus_task_pool::config::{SchedulerConfig, WorkerPoolConfig};
//! use prometheus_task_pool::core::{task, WorkerPool};
//!
//! let pool = WorkerPool::new(
//!     WorkerPoolConfig::new()
//!         .with_worker_count(4)
//!         .with_scheduler(SchedulerConfig::TopicPartition {
//!             topics: vec!["orders".into(), "emails".into()],
//!         }),
//! )?;
//!
//! pool.submit(task::routed("orders", || settle_order()))?;
//! println!("{:?}", pool.status()); // pending tasks per worker
//! pool.shutdown_and_join()?;
//! ```
//!
//! For complete examples, see `tests/worker_pool_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Queue, task, worker, scheduler and pool abstractions.
pub mod core;
/// Configuration models for pools and scheduling strategies.
pub mod config;
/// Shared utilities.
pub mod util;
