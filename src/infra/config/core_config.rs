use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const DEFAULT_WORKER_THREADS: usize = 2;
const MAX_WORKER_THREADS: usize = 32;
const DEFAULT_MAX_BLOCKING_THREADS: usize = 16;
const MAX_BLOCKING_THREADS: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CoreConfig {
    pub logging: LogConfig,
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Log file path; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerConfig {
    pub worker_threads: usize,
    pub max_blocking_threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            max_blocking_threads: DEFAULT_MAX_BLOCKING_THREADS,
        }
    }
}

impl WorkerConfig {
    pub fn normalized_worker_threads(&self) -> usize {
        match self.worker_threads {
            0 => DEFAULT_WORKER_THREADS,
            value if value > MAX_WORKER_THREADS => MAX_WORKER_THREADS,
            value => value,
        }
    }

    pub fn normalized_max_blocking_threads(&self) -> usize {
        match self.max_blocking_threads {
            0 => DEFAULT_MAX_BLOCKING_THREADS,
            value if value > MAX_BLOCKING_THREADS => MAX_BLOCKING_THREADS,
            value => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_thread_counts_fall_back_to_defaults() {
        let config = WorkerConfig {
            worker_threads: 0,
            max_blocking_threads: 0,
        };

        assert_eq!(config.normalized_worker_threads(), 2);
        assert_eq!(config.normalized_max_blocking_threads(), 16);
    }

    #[test]
    fn oversized_thread_counts_are_capped() {
        let config = WorkerConfig {
            worker_threads: 10_000,
            max_blocking_threads: 10_000,
        };

        assert_eq!(config.normalized_worker_threads(), 32);
        assert_eq!(config.normalized_max_blocking_threads(), 256);
    }

    #[test]
    fn reasonable_thread_counts_pass_through() {
        let config = WorkerConfig {
            worker_threads: 4,
            max_blocking_threads: 32,
        };

        assert_eq!(config.normalized_worker_threads(), 4);
        assert_eq!(config.normalized_max_blocking_threads(), 32);
    }
}
