//! Synthetic flow and allocation logs.
//!
//! Every random choice here is "pick `k` distinct items out of `n`", done with
//! [`rand::seq::index::sample`]. Pass a seeded RNG (e.g. `StdRng::seed_from_u64`) to make a batch
//! reproducible byte for byte.

use std::io;
use std::path::Path;

use log::{debug, info};
use rand::seq::index;
use rand::Rng;

use crate::files::{AllocationFile, FlowFile};
use crate::layout::{ScenarioId, VariantId};
use crate::output::{self, OutputDirError};
use crate::record::{AllocationRecord, FlowRecord, LinkType, NodeId};
use crate::units::{Bytes, Gbps};

/// Transfer size of every generated flow.
pub const DEFAULT_TRANSFER_SIZE: Bytes = Bytes::new(100_000_000);

/// Data rate of every generated flow.
pub const DEFAULT_DATA_RATE: Gbps = Gbps::ONE;

/// Parameters of one generated scenario.
#[derive(Debug, Clone, PartialEq, Eq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct ScenarioOpts {
    /// Number of ToR switches.
    pub num_tors: usize,
    /// Flows drawn at every time step.
    #[builder(default = 15)]
    pub flows_per_step: usize,
    /// Number of time steps.
    #[builder(default = 1)]
    pub time_steps: u64,
    /// Transfer size of each flow.
    #[builder(default = DEFAULT_TRANSFER_SIZE)]
    pub transfer_size: Bytes,
    /// Data rate of each flow.
    #[builder(default = DEFAULT_DATA_RATE)]
    pub data_rate: Gbps,
}

impl ScenarioOpts {
    /// Number of ordered (source, destination) pairs without self-loops.
    pub fn nr_pairs(&self) -> usize {
        self.num_tors.saturating_mul(self.num_tors.saturating_sub(1))
    }

    /// Number of flows in a generated scenario, or `None` if it overflows `usize`.
    pub fn nr_flows(&self) -> Option<usize> {
        usize::try_from(self.time_steps)
            .ok()?
            .checked_mul(self.flows_per_step)
    }

    fn checked_nr_flows(&self) -> Result<usize, SampleError> {
        self.nr_flows().ok_or(SampleError::Overflow("flow records"))
    }

    fn check(&self) -> Result<(), SampleError> {
        check_sample("node pairs", self.flows_per_step, self.nr_pairs())?;
        self.checked_nr_flows()?;
        Ok(())
    }
}

/// Parameters of a batch of scenarios and their allocations.
#[derive(Debug, Clone, PartialEq, Eq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct BatchOpts {
    /// Shape of every scenario.
    pub scenario: ScenarioOpts,
    /// Number of scenarios (flow logs).
    #[builder(default = 1)]
    pub nr_scenarios: usize,
    /// Allocation logs per scenario.
    #[builder(default = 4)]
    pub variants_per_scenario: usize,
    /// Wireless flows in each allocation.
    #[builder(default = 4)]
    pub nr_wireless: usize,
}

impl BatchOpts {
    fn check(&self) -> Result<(), SampleError> {
        self.scenario.check()?;
        if self.variants_per_scenario > 0 {
            check_sample("flow records", self.nr_wireless, self.scenario.checked_nr_flows()?)?;
        }
        Ok(())
    }
}

/// Counts of what [`generate_batch`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Flow logs written.
    pub flow_files: usize,
    /// Allocation logs written.
    pub alloc_files: usize,
    /// Flow records across all flow logs.
    pub flows: usize,
}

/// Generates one scenario: at every time step, `flows_per_step` distinct ordered node pairs drawn
/// uniformly without replacement.
pub fn generate_scenario<R>(
    scenario: ScenarioId,
    opts: &ScenarioOpts,
    rng: &mut R,
) -> Result<FlowFile, SampleError>
where
    R: Rng + ?Sized,
{
    opts.check()?;
    let mut records = Vec::new();
    for time_step in 0..opts.time_steps {
        for pair in index::sample(rng, opts.nr_pairs(), opts.flows_per_step) {
            let (src, dst) = nth_pair(pair, opts.num_tors);
            records.push(FlowRecord::new(
                time_step,
                src,
                dst,
                opts.transfer_size,
                opts.data_rate,
            ));
        }
    }
    Ok(FlowFile { scenario, records })
}

/// Allocates exactly `nr_wireless` of the scenario's flows, chosen uniformly without replacement,
/// to wireless links and the rest to wired links.
pub fn generate_allocation_variant<R>(
    flows: &FlowFile,
    variant: VariantId,
    nr_wireless: usize,
    rng: &mut R,
) -> Result<AllocationFile, SampleError>
where
    R: Rng + ?Sized,
{
    check_sample("flow records", nr_wireless, flows.len())?;
    let mut wireless = vec![false; flows.len()];
    for i in index::sample(rng, flows.len(), nr_wireless) {
        wireless[i] = true;
    }
    let records = flows
        .records
        .iter()
        .zip(wireless)
        .map(|(flow, is_wireless)| AllocationRecord {
            flow: flow.clone(),
            link_type: if is_wireless {
                LinkType::Wireless
            } else {
                LinkType::Wired
            },
        })
        .collect();
    Ok(AllocationFile {
        scenario: flows.scenario,
        variant,
        records,
    })
}

/// Writes `nr_scenarios` flow logs and `variants_per_scenario` allocation logs for each into
/// `output_dir`.
///
/// All sampling preconditions are checked before anything is created or written. An existing
/// `output_dir` is only written into when `allow_overwrite` is set.
pub fn generate_batch<R>(
    output_dir: &Path,
    opts: &BatchOpts,
    allow_overwrite: bool,
    rng: &mut R,
) -> Result<BatchSummary, GenError>
where
    R: Rng + ?Sized,
{
    opts.check()?;
    output::prepare_output_dir(output_dir, allow_overwrite)?;
    let mut summary = BatchSummary::default();
    for s in 0..opts.nr_scenarios {
        let flows = generate_scenario(ScenarioId::new(s), &opts.scenario, rng)?;
        let path = flows.write(output_dir)?;
        debug!("wrote {} flows to {}", flows.len(), path.display());
        summary.flow_files += 1;
        summary.flows += flows.len();
        for v in 0..opts.variants_per_scenario {
            let alloc = generate_allocation_variant(&flows, VariantId::new(v), opts.nr_wireless, rng)?;
            alloc.write(output_dir)?;
            summary.alloc_files += 1;
        }
    }
    info!(
        "generated {} flows in {} flow files and {} allocation files under {}",
        summary.flows,
        summary.flow_files,
        summary.alloc_files,
        output_dir.display()
    );
    Ok(summary)
}

// Index `i` of the permutations of `0..num_tors` taken two at a time, in lexicographic order.
fn nth_pair(i: usize, num_tors: usize) -> (NodeId, NodeId) {
    let others = num_tors - 1;
    let src = i / others;
    let rest = i % others;
    let dst = if rest >= src { rest + 1 } else { rest };
    (NodeId::new(src), NodeId::new(dst))
}

fn check_sample(what: &'static str, requested: usize, available: usize) -> Result<(), SampleError> {
    if requested > available {
        return Err(SampleError::TooMany {
            what,
            requested,
            available,
        });
    }
    Ok(())
}

/// A sampling request larger than its population.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    /// More distinct items requested than exist.
    #[error("cannot draw {requested} distinct {what} out of {available}")]
    TooMany {
        /// What was being sampled.
        what: &'static str,
        /// Number requested.
        requested: usize,
        /// Population size.
        available: usize,
    },

    /// The requested population does not fit in memory.
    #[error("number of {0} overflows usize")]
    Overflow(&'static str),
}

/// Error generating a batch.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    /// A sampling precondition failed.
    #[error(transparent)]
    Sample(#[from] SampleError),

    /// The output directory could not be used.
    #[error(transparent)]
    OutputDir(#[from] OutputDirError),

    /// IO error.
    #[error(transparent)]
    Io(#[from] io::Error),
}
