//! # DSA Sample Generator
//!
//! Drives the allocation engines of `dsa-core` over many random scenarios
//! and writes the labeled samples to text files.
//!
//! - [`config`]: YAML configuration and its search path
//! - [`driver`]: parallel per-worker sample loop
//! - [`output`]: per-worker sample files and merging
//! - [`stats`]: per-worker counters and the run summary
//! - [`replay`]: crowd-sourced evaluation of recorded samples
//! - [`logging`]: `tracing` subscriber setup

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod output;
pub mod replay;
pub mod stats;

pub use config::{ConfigError, SimConfig};
pub use driver::{run, RunReport};
pub use error::{SimError, SimResult};
pub use stats::{RunSummary, StatsRegistry, WorkerStats};
