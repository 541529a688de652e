//! Scheduling strategies for per-worker-inbox pools.
//!
//! A [`Scheduler`] picks exactly one worker for each task and pushes the task
//! onto that worker's inbox. Inboxes are unbounded, so scheduling never blocks.
//!
//! | Strategy            | Policy                                                   |
//! |---------------------|----------------------------------------------------------|
//! | [`RoundRobin`]      | Cyclic over workers in construction order, ignores load  |
//! | [`LeastBusyFirst`]  | Lowest `pending_count()`, ties go to the lowest index    |
//! | [`TopicPartition`]  | Least busy within the worker group owning the task topic |
//!
//! Load-aware strategies read [`Worker::pending_count`], a snapshot that may be
//! stale by the time the task lands. Balancing is therefore best-effort.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SchedulerConfig;
use crate::core::error::PoolError;
use crate::core::task::{Job, Task};
use crate::core::worker::Worker;

/// Chooses which worker's inbox receives a task.
pub trait Scheduler: Send + Sync {
    /// Strategy name used in logs.
    fn name(&self) -> &'static str;

    /// The workers this scheduler distributes over, in construction order.
    fn workers(&self) -> &[Worker];

    /// Pick the index of the worker that should run `task`.
    ///
    /// # Errors
    ///
    /// Strategy-specific; see the implementations.
    fn select(&self, task: &dyn Task) -> Result<usize, PoolError>;

    /// Select a worker and push `job` onto its inbox. Returns the worker index.
    ///
    /// # Errors
    ///
    /// Propagates `select` errors; the job is dropped without being enqueued.
    fn schedule(&self, job: Job) -> Result<usize, PoolError> {
        let index = self.select(job.as_ref())?;
        self.workers()[index].enqueue(job)?;
        Ok(index)
    }
}

/// Build the scheduler described by `config` over `workers`.
///
/// # Errors
///
/// Returns `PoolError::PartitionConfiguration` when topic partitioning cannot
/// be laid out over the workers.
pub fn build(
    config: &SchedulerConfig,
    workers: Arc<[Worker]>,
) -> Result<Box<dyn Scheduler>, PoolError> {
    Ok(match config {
        SchedulerConfig::RoundRobin => Box::new(RoundRobin::new(workers)),
        SchedulerConfig::LeastBusyFirst => Box::new(LeastBusyFirst::new(workers)),
        SchedulerConfig::TopicPartition { topics } => {
            Box::new(TopicPartition::new(topics.clone(), workers)?)
        }
    })
}

/// Index of the least busy worker in `range`; the first one wins ties.
fn least_busy_in(workers: &[Worker], range: Range<usize>) -> Option<usize> {
    workers[range.clone()]
        .iter()
        .zip(range)
        .min_by_key(|(worker, index)| (worker.pending_count(), *index))
        .map(|(_, index)| index)
}

fn no_workers() -> PoolError {
    PoolError::InvalidConfig("scheduler has no workers".into())
}

fn non_empty(workers: &[Worker]) -> Result<usize, PoolError> {
    match workers.len() {
        0 => Err(no_workers()),
        len => Ok(len),
    }
}

/// Cyclic assignment over the fixed worker sequence.
pub struct RoundRobin {
    workers: Arc<[Worker]>,
    cursor: Mutex<usize>,
}

impl RoundRobin {
    /// Create a round-robin scheduler starting at worker 0.
    pub fn new(workers: Arc<[Worker]>) -> Self {
        Self {
            workers,
            cursor: Mutex::new(0),
        }
    }
}

impl Scheduler for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// # Errors
    ///
    /// `PoolError::InvalidConfig` when there are no workers.
    fn select(&self, _task: &dyn Task) -> Result<usize, PoolError> {
        let mut cursor = self.cursor.lock();
        let index = *cursor;
        *cursor = (index + 1) % non_empty(&self.workers)?;
        Ok(index)
    }

    fn schedule(&self, job: Job) -> Result<usize, PoolError> {
        // Enqueue under the cursor lock so concurrent submitters land in
        // cursor order.
        let mut cursor = self.cursor.lock();
        let index = *cursor;
        let len = non_empty(&self.workers)?;
        self.workers[index].enqueue(job)?;
        *cursor = (index + 1) % len;
        Ok(index)
    }
}

/// Always picks the worker with the fewest pending tasks.
pub struct LeastBusyFirst {
    workers: Arc<[Worker]>,
}

impl LeastBusyFirst {
    /// Create a least-busy-first scheduler.
    pub const fn new(workers: Arc<[Worker]>) -> Self {
        Self { workers }
    }
}

impl Scheduler for LeastBusyFirst {
    fn name(&self) -> &'static str {
        "least_busy_first"
    }

    fn workers(&self) -> &[Worker] {
        &self.workers
    }

    fn select(&self, _task: &dyn Task) -> Result<usize, PoolError> {
        let len = non_empty(&self.workers)?;
        least_busy_in(&self.workers, 0..len).ok_or_else(no_workers)
    }
}

/// Routes each task to the worker group that owns its topic.
///
/// Workers are split into contiguous, disjoint groups in topic order, each of
/// `workers / topics` members. The remainder of that division is added to the
/// last group so every worker serves exactly one topic.
pub struct TopicPartition {
    workers: Arc<[Worker]>,
    topics: Vec<String>,
    groups: HashMap<String, Range<usize>>,
}

impl TopicPartition {
    /// Partition `workers` over `topics`.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::PartitionConfiguration` if `topics` is empty,
    /// contains an empty or duplicate label, or has more entries than there
    /// are workers.
    pub fn new(topics: Vec<String>, workers: Arc<[Worker]>) -> Result<Self, PoolError> {
        let groups = partition(&topics, workers.len())?;
        Ok(Self {
            workers,
            topics,
            groups,
        })
    }

    /// Worker index range serving `topic`.
    pub fn group(&self, topic: &str) -> Option<Range<usize>> {
        self.groups.get(topic).cloned()
    }

    /// All topics with their worker ranges, in configuration order.
    pub fn groups(&self) -> Vec<(&str, Range<usize>)> {
        self.topics
            .iter()
            .map(|topic| (topic.as_str(), self.groups[topic].clone()))
            .collect()
    }
}

impl Scheduler for TopicPartition {
    fn name(&self) -> &'static str {
        "topic_partition"
    }

    fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// # Errors
    ///
    /// `PoolError::MissingTopic` for an untagged task and
    /// `PoolError::UnknownTopic` for a topic with no group.
    fn select(&self, task: &dyn Task) -> Result<usize, PoolError> {
        let topic = task.topic().ok_or(PoolError::MissingTopic)?;
        let range = self
            .groups
            .get(topic)
            .cloned()
            .ok_or_else(|| PoolError::UnknownTopic(topic.to_owned()))?;
        least_busy_in(&self.workers, range)
            .ok_or_else(|| PoolError::PartitionConfiguration(format!("topic `{topic}` has no workers")))
    }
}

/// Lay out contiguous worker ranges for `topics` over `worker_count` workers.
pub(crate) fn partition(
    topics: &[String],
    worker_count: usize,
) -> Result<HashMap<String, Range<usize>>, PoolError> {
    if topics.is_empty() {
        return Err(PoolError::PartitionConfiguration(
            "at least one topic is required".into(),
        ));
    }
    if topics.len() > worker_count {
        return Err(PoolError::PartitionConfiguration(format!(
            "{} topics cannot be served by {worker_count} workers",
            topics.len()
        )));
    }

    let per_group = worker_count / topics.len();
    let last = topics.len() - 1;
    let mut groups = HashMap::with_capacity(topics.len());

    for (i, topic) in topics.iter().enumerate() {
        if topic.is_empty() {
            return Err(PoolError::PartitionConfiguration(
                "topic labels must not be empty".into(),
            ));
        }
        let start = i * per_group;
        let end = if i == last { worker_count } else { start + per_group };
        if groups.insert(topic.clone(), start..end).is_some() {
            return Err(PoolError::PartitionConfiguration(format!(
                "duplicate topic `{topic}`"
            )));
        }
    }

    Ok(groups)
}
