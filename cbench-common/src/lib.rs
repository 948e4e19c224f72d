//! cbench - Common Library
//!
//! Shared configuration, logging, and domain types used by the cbench
//! benchmark harness and its telemetry framework.

#![forbid(unsafe_code)]

pub mod config;
pub mod logging;
pub mod types;

pub use config::{BenchConfig, ConfigError};
pub use logging::{LogConfig, LogFormat, LoggingGuards, init_logging};
pub use types::{Candidate, Cluster, Node};
