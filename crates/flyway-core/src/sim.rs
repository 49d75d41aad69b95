//! The interface to the external network simulator.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::layout::{ScenarioId, VariantId};

/// One simulator run over a flow log and one of its allocation logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimJob {
    /// The scenario being simulated.
    pub scenario: ScenarioId,
    /// The allocation variant being simulated.
    pub variant: VariantId,
    /// The scenario's flow log.
    pub flow_file: PathBuf,
    /// The allocation log.
    pub alloc_file: PathBuf,
    /// Where the simulator must write its result text.
    pub out_file: PathBuf,
    /// Where the simulator's console output goes.
    pub log_file: PathBuf,
}

/// An interface for network simulators.
pub trait Simulator {
    /// Runs `job` to completion. On success the result text is at `job.out_file`.
    fn simulate(&self, job: &SimJob) -> Result<(), SimError>;
}

impl<S: Simulator + ?Sized> Simulator for &S {
    fn simulate(&self, job: &SimJob) -> Result<(), SimError> {
        (**self).simulate(job)
    }
}

/// A failed simulator run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The simulator could not be started.
    #[error("failed to launch simulator")]
    Spawn(#[source] io::Error),

    /// The simulator exited unsuccessfully. `code` is `None` if it was killed by a signal.
    #[error("simulator exited unsuccessfully (exit code {code:?})")]
    Failed {
        /// Exit code.
        code: Option<i32>,
    },

    /// An argument cannot be passed to the simulator intact.
    #[error("cannot pass argument {0:?} to the simulator")]
    InvalidArgument(String),

    /// The simulator ran past its time limit and was killed.
    #[error("simulator timed out after {0:?}")]
    TimedOut(Duration),

    /// The simulator exited successfully without writing its result.
    #[error("simulator wrote no result to {0}")]
    MissingOutput(PathBuf),

    /// IO error.
    #[error(transparent)]
    Io(#[from] io::Error),
}
