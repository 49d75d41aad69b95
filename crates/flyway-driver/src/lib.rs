//! Drives the flyway simulation over a directory of generated logs and aggregates the results.
//!
//! The usual pipeline is [`run_all`] to simulate every (flow log, allocation log) pair,
//! [`parse_all`] to turn the allocation logs into training tensors, and [`summarize`] to pick the
//! best allocation of every scenario.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

pub mod best;
pub mod config;
pub mod parse;
pub mod render;
pub mod run;

use std::io;
use std::path::PathBuf;

use flyway_core::files::FileError;
use flyway_core::output::OutputDirError;
use flyway_core::results::ResultError;
use flyway_core::FormatError;

pub use best::{best_allocation_for_scenario, summarize, ScenarioBest};
pub use config::{read_run_config, ConfigError, RunConfig};
pub use parse::{parse_all, parse_allocation_to_matrix, Batch};
pub use render::{render_allocation_diagram, Layout, RenderError};
pub use run::{run_all, PairFailure, RunOpts, RunSummary};

/// Error kinds for driving and aggregating simulations.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The output directory could not be used.
    #[error("invalid output directory")]
    OutputDir(#[from] OutputDirError),

    /// A log file could not be read.
    #[error("failed to read log file")]
    File(#[from] FileError),

    /// A log file is inconsistent with the requested topology.
    #[error("invalid log file {path}")]
    Format {
        /// The file.
        path: PathBuf,
        /// What was wrong.
        source: FormatError,
    },

    /// A result file could not be read.
    #[error("failed to read simulation result")]
    Result(#[from] ResultError),

    /// The worker pool could not be started.
    #[error("failed to start worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// I/O error.
    #[error("IO error")]
    Io(#[from] io::Error),
}
