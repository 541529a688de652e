//! The unit of work a pool executes.
//!
//! A [`Task`] is invoked exactly once, takes no arguments and hands nothing
//! back to the pool. Any `FnOnce() + Send + 'static` closure is a task.
//! [`fallible`] wraps closures that report failure through `anyhow`, and
//! [`routed`] attaches a topic for topic-partitioned scheduling.
//!
//! ```rust,ignore
//! use prometheus_task_pool::core::task;
//!
//! pool.submit(|| println!("plain"))?;
//! pool.submit(task::fallible(|| { std::fs::remove_file("/tmp/x")?; Ok(()) }))?;
//! pool.submit(task::routed("billing", || charge()))?;
//! ```

/// Outcome of a task invocation.
pub type TaskResult = anyhow::Result<()>;

/// A boxed task as stored in the queues.
pub type Job = Box<dyn Task>;

/// Single-capability unit of work.
pub trait Task: Send + 'static {
    /// Run the task, consuming it.
    fn call(self: Box<Self>) -> TaskResult;

    /// Routing label used by topic-partitioned scheduling.
    fn topic(&self) -> Option<&str> {
        None
    }
}

impl<F> Task for F
where
    F: FnOnce() + Send + 'static,
{
    fn call(self: Box<Self>) -> TaskResult {
        (*self)();
        Ok(())
    }
}

/// Task built from a closure returning [`TaskResult`].
pub struct Fallible<F>(F);

impl<F> Task for Fallible<F>
where
    F: FnOnce() -> TaskResult + Send + 'static,
{
    fn call(self: Box<Self>) -> TaskResult {
        (self.0)()
    }
}

/// Wrap a closure whose error is reported to the pool's failure observer.
pub const fn fallible<F>(f: F) -> Fallible<F>
where
    F: FnOnce() -> TaskResult + Send + 'static,
{
    Fallible(f)
}

/// Task carrying a topic label.
pub struct Routed<T> {
    topic: String,
    inner: T,
}

impl<T: Task> Task for Routed<T> {
    fn call(self: Box<Self>) -> TaskResult {
        Box::new(self.inner).call()
    }

    fn topic(&self) -> Option<&str> {
        Some(&self.topic)
    }
}

/// Attach `topic` to `task`.
pub fn routed<T: Task>(topic: impl Into<String>, task: T) -> Routed<T> {
    Routed {
        topic: topic.into(),
        inner: task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_is_task() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        let job: Job = Box::new(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        assert!(job.topic().is_none());
        job.call().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallible_propagates_error() {
        let job: Job = Box::new(fallible(|| anyhow::bail!("nope")));
        let err = job.call().unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn test_routed_keeps_topic_and_runs_inner() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        let job: Job = Box::new(routed("orders", move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(job.topic(), Some("orders"));
        job.call().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_routed_fallible() {
        let job: Job = Box::new(routed("orders", fallible(|| Err(anyhow::anyhow!("bad row")))));
        assert_eq!(job.topic(), Some("orders"));
        assert!(job.call().is_err());
    }
}
