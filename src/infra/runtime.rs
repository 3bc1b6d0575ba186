use tokio::runtime::Runtime;

use crate::infra::{config::WorkerConfig, error::AppError};

const WORKER_THREAD_NAME: &str = "conversation-worker";

/// Builds the runtime that hosts every blocking store, directory, and blob
/// call.
pub fn build_worker_runtime(config: &WorkerConfig) -> Result<Runtime, AppError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.normalized_worker_threads())
        .max_blocking_threads(config.normalized_max_blocking_threads())
        .thread_name(WORKER_THREAD_NAME)
        .enable_time()
        .build()
        .map_err(AppError::RuntimeBuild)
}
