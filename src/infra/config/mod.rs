mod core_config;
mod file_config;
mod loader;

pub use core_config::{CoreConfig, LogConfig, WorkerConfig};
pub use loader::load;
