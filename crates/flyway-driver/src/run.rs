//! Running the simulator over every (flow log, allocation log) pair.

use std::fs;
use std::io;
use std::path::Path;

use flyway_core::layout;
use flyway_core::output::prepare_output_dir;
use flyway_core::sim::{SimError, SimJob, Simulator};
use flyway_core::{ScenarioId, VariantId};
use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::DriverError;

/// Options for [`run_all`].
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct RunOpts {
    /// Reuse an existing results directory.
    #[builder(default)]
    pub allow_overwrite: bool,
    /// Maximum number of simulator runs in flight.
    #[builder(default = 1)]
    pub jobs: usize,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// What happened to every pair of a [`run_all`] batch.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Pairs whose result file is now in the results directory, in sorted order.
    pub succeeded: Vec<(ScenarioId, VariantId)>,
    /// Pairs whose run failed, in sorted order.
    pub failed: Vec<PairFailure>,
    /// Scenarios with a flow log but no allocation logs.
    pub skipped: Vec<ScenarioId>,
}

impl RunSummary {
    /// Number of simulator runs attempted.
    pub fn nr_runs(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether every attempted run succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A failed simulator run.
#[derive(Debug, derive_new::new)]
pub struct PairFailure {
    /// The scenario.
    pub scenario: ScenarioId,
    /// The allocation variant.
    pub variant: VariantId,
    /// Why the run failed.
    pub error: SimError,
}

/// Runs `sim` once for every flow log in `flow_dir` and each of its allocation logs, writing
/// results to `results_dir` as `<scenario>_<variant>.txt`.
///
/// Failed runs are recorded in the summary and never stop the batch. A result file only appears
/// once its run has succeeded, and a stale result from an earlier batch is removed before the
/// pair is rerun.
pub fn run_all<S>(
    sim: S,
    flow_dir: &Path,
    results_dir: &Path,
    opts: &RunOpts,
) -> Result<RunSummary, DriverError>
where
    S: Simulator + Sync,
{
    let flows = layout::flow_files(flow_dir)?;
    let allocs = layout::alloc_files(flow_dir)?;
    for ((scenario, variant), path) in &allocs {
        if flows.binary_search_by_key(scenario, |&(s, _)| s).is_err() {
            warn!(
                "ignoring allocation {scenario}_{variant} with no flow log: {}",
                path.display()
            );
        }
    }

    let mut summary = RunSummary::default();
    let mut jobs = Vec::new();
    for (scenario, flow_file) in &flows {
        let len = jobs.len();
        jobs.extend(
            allocs
                .iter()
                .filter(|((s, _), _)| s == scenario)
                .map(|((scenario, variant), alloc_file)| {
                    let (scenario, variant) = (*scenario, *variant);
                    let name = layout::result_file_name(scenario, variant);
                    SimJob {
                        scenario,
                        variant,
                        flow_file: flow_file.clone(),
                        alloc_file: alloc_file.clone(),
                        out_file: results_dir.join(format!(".{name}.partial")),
                        log_file: results_dir.join(format!("{scenario}_{variant}.log")),
                    }
                }),
        );
        if jobs.len() == len {
            warn!("scenario {scenario} has no allocation logs, skipping");
            summary.skipped.push(*scenario);
        }
    }

    prepare_output_dir(results_dir, opts.allow_overwrite)?;
    info!(
        "Simulating {} pairs from {} with {} worker(s)",
        jobs.len(),
        flow_dir.display(),
        opts.jobs.max(1)
    );
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()?;
    let bar = ProgressBar::new(jobs.len() as u64);
    let outcomes = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let outcome = run_one(&sim, job, results_dir);
                bar.inc(1);
                outcome
            })
            .collect::<Vec<_>>()
    });
    bar.finish_and_clear();

    for (job, outcome) in jobs.into_iter().zip(outcomes) {
        match outcome {
            Ok(()) => summary.succeeded.push((job.scenario, job.variant)),
            Err(error) => {
                warn!(
                    "simulation of {}_{} failed: {error} (see {})",
                    job.scenario,
                    job.variant,
                    job.log_file.display()
                );
                summary
                    .failed
                    .push(PairFailure::new(job.scenario, job.variant, error));
            }
        }
    }
    info!(
        "{} of {} simulations succeeded",
        summary.succeeded.len(),
        summary.nr_runs()
    );
    Ok(summary)
}

fn run_one<S: Simulator>(sim: &S, job: &SimJob, results_dir: &Path) -> Result<(), SimError> {
    let result_file = results_dir.join(layout::result_file_name(job.scenario, job.variant));
    remove_if_present(&result_file)?;
    debug!(
        "simulating {} with {}",
        job.flow_file.display(),
        job.alloc_file.display()
    );
    match sim.simulate(job) {
        Ok(()) => {
            fs::rename(&job.out_file, &result_file)?;
            Ok(())
        }
        Err(e) => {
            remove_if_present(&job.out_file)?;
            Err(e)
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
