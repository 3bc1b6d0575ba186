//! Infrastructure layer: configuration, logging, the worker runtime, and log
//! hygiene.

pub mod config;
pub mod error;
pub mod logging;
pub mod redact;
pub mod runtime;
