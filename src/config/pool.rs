//! Worker pool configuration structures.

use serde::{Deserialize, Serialize};

/// Default thread name prefix; workers are named `{prefix}-{index}`.
pub const DEFAULT_THREAD_PREFIX: &str = "pool-worker";

/// Scheduling strategy for per-worker-inbox pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SchedulerConfig {
    /// Cyclic assignment, ignores load.
    RoundRobin,
    /// Fewest pending tasks first, lowest index on ties.
    LeastBusyFirst,
    /// Topic-owned worker groups, least busy within the group.
    TopicPartition {
        /// Ordered topic labels; workers are split into one group per topic.
        topics: Vec<String>,
    },
}

/// How tasks reach workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueueMode {
    /// One queue consumed by every worker.
    SharedQueue {
        /// Maximum queued tasks before `submit` blocks. `None` is unbounded.
        #[serde(default)]
        capacity: Option<usize>,
    },
    /// One private inbox per worker, filled by a scheduler.
    PerWorkerInbox {
        /// Strategy that picks the inbox.
        scheduler: SchedulerConfig,
    },
}

impl Default for QueueMode {
    fn default() -> Self {
        Self::SharedQueue { capacity: None }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    /// Number of worker threads; fixed for the pool's lifetime.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Queue layout and, for per-worker inboxes, the scheduling strategy.
    #[serde(default)]
    pub mode: QueueMode,
    /// Prefix for worker thread names.
    #[serde(default = "default_thread_prefix")]
    pub thread_name_prefix: String,
    /// Stack size for worker threads in bytes; platform default when unset.
    #[serde(default)]
    pub thread_stack_size: Option<usize>,
}

fn default_worker_count() -> usize {
    num_cpus::get().max(1)
}

fn default_thread_prefix() -> String {
    DEFAULT_THREAD_PREFIX.to_string()
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            mode: QueueMode::default(),
            thread_name_prefix: default_thread_prefix(),
            thread_stack_size: None,
        }
    }
}

impl WorkerPoolConfig {
    /// Shared unbounded queue with one worker per CPU.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of workers.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Use a shared queue holding at most `capacity` tasks.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.mode = QueueMode::SharedQueue {
            capacity: Some(capacity),
        };
        self
    }

    /// Use a shared unbounded queue.
    #[must_use]
    pub fn with_unbounded_queue(mut self) -> Self {
        self.mode = QueueMode::SharedQueue { capacity: None };
        self
    }

    /// Use per-worker inboxes filled by `scheduler`.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.mode = QueueMode::PerWorkerInbox { scheduler };
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size in bytes.
    #[must_use]
    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }

    /// Validate configuration values.
    ///
    /// Topic layout is checked when the scheduler is built, since it depends
    /// on the worker count.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        if self.thread_stack_size == Some(0) {
            return Err("thread_stack_size must be greater than 0".into());
        }
        if let QueueMode::SharedQueue { capacity: Some(0) } = self.mode {
            return Err("queue capacity must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the process environment, reading a `.env` file
    /// first if one exists.
    ///
    /// | Variable                   | Meaning                                            |
    /// |----------------------------|----------------------------------------------------|
    /// | `TASK_POOL_WORKERS`        | worker count                                       |
    /// | `TASK_POOL_MODE`           | `shared_queue` (default) or `per_worker_inbox`     |
    /// | `TASK_POOL_QUEUE_CAPACITY` | shared queue capacity                              |
    /// | `TASK_POOL_STRATEGY`       | `round_robin`, `least_busy_first`, `topic_partition` |
    /// | `TASK_POOL_TOPICS`         | comma-separated topics for `topic_partition`       |
    /// | `TASK_POOL_THREAD_PREFIX`  | worker thread name prefix                          |
    /// | `TASK_POOL_STACK_SIZE`     | worker stack size in bytes                         |
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup using the variable
    /// names documented on [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(workers) = lookup("TASK_POOL_WORKERS") {
            cfg.worker_count = parse_number("TASK_POOL_WORKERS", &workers)?;
        }
        if let Some(prefix) = lookup("TASK_POOL_THREAD_PREFIX") {
            cfg.thread_name_prefix = prefix;
        }
        if let Some(stack) = lookup("TASK_POOL_STACK_SIZE") {
            cfg.thread_stack_size = Some(parse_number("TASK_POOL_STACK_SIZE", &stack)?);
        }

        let mode = lookup("TASK_POOL_MODE").unwrap_or_else(|| "shared_queue".into());
        cfg.mode = match mode.trim() {
            "shared_queue" => {
                let capacity = lookup("TASK_POOL_QUEUE_CAPACITY")
                    .map(|raw| parse_number("TASK_POOL_QUEUE_CAPACITY", &raw))
                    .transpose()?;
                QueueMode::SharedQueue { capacity }
            }
            "per_worker_inbox" => {
                let strategy =
                    lookup("TASK_POOL_STRATEGY").unwrap_or_else(|| "round_robin".into());
                let scheduler = match strategy.trim() {
                    "round_robin" => SchedulerConfig::RoundRobin,
                    "least_busy_first" => SchedulerConfig::LeastBusyFirst,
                    "topic_partition" => SchedulerConfig::TopicPartition {
                        topics: lookup("TASK_POOL_TOPICS")
                            .map(|raw| split_topics(&raw))
                            .unwrap_or_default(),
                    },
                    other => return Err(format!("unknown TASK_POOL_STRATEGY `{other}`")),
                };
                QueueMode::PerWorkerInbox { scheduler }
            }
            other => return Err(format!("unknown TASK_POOL_MODE `{other}`")),
        };

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_number(key: &str, raw: &str) -> Result<usize, String> {
    raw.trim()
        .parse()
        .map_err(|e| format!("{key} must be a non-negative integer: {e}"))
}

fn split_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = WorkerPoolConfig::new();
        assert!(cfg.worker_count >= 1);
        assert_eq!(cfg.mode, QueueMode::SharedQueue { capacity: None });
        assert_eq!(cfg.thread_name_prefix, DEFAULT_THREAD_PREFIX);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_split_topics_skips_blanks() {
        assert_eq!(split_topics(" a, b ,,c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_number_reports_key() {
        let err = parse_number("TASK_POOL_WORKERS", "four").unwrap_err();
        assert!(err.starts_with("TASK_POOL_WORKERS"));
    }
}
