use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{CoreConfig, LogConfig, WorkerConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub workers: Option<FileWorkerConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut CoreConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(workers) = self.workers {
            workers.merge_into(&mut config.workers);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileWorkerConfig {
    pub worker_threads: Option<usize>,
    pub max_blocking_threads: Option<usize>,
}

impl FileWorkerConfig {
    fn merge_into(self, config: &mut WorkerConfig) {
        if let Some(worker_threads) = self.worker_threads {
            config.worker_threads = worker_threads;
        }

        if let Some(max_blocking_threads) = self.max_blocking_threads {
            config.max_blocking_threads = max_blocking_threads;
        }
    }
}
