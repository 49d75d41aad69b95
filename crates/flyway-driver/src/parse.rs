//! Allocation logs to training tensors.

use std::path::Path;

use flyway_core::layout;
use flyway_core::matrix::{self, AdjacencyPair};
use flyway_core::{AllocationFile, ScenarioId, VariantId};
use log::{debug, info};
use ndarray::{Array3, Array4};
use rayon::prelude::*;

use crate::DriverError;

/// Reads an allocation log and builds its adjacency pair over `num_tors` ToRs.
pub fn parse_allocation_to_matrix(
    path: impl AsRef<Path>,
    num_tors: usize,
) -> Result<AdjacencyPair, DriverError> {
    let path = path.as_ref();
    let file = AllocationFile::read(path)?;
    debug!("{}: {} records", path.display(), file.records.len());
    matrix::adjacency(&file, num_tors).map_err(|source| DriverError::Format {
        path: path.into(),
        source,
    })
}

/// Every allocation log of a directory, stacked.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Adjacency matrices, shape `(batch, 1, num_tors, num_tors)`.
    pub xs: Array4<f64>,
    /// Wireless labels, shape `(batch, num_tors², 1)`.
    pub ys: Array3<f64>,
    /// The allocation behind each batch entry.
    pub ids: Vec<(ScenarioId, VariantId)>,
}

impl Batch {
    /// Number of allocations in the batch.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Parses every allocation log in `flow_dir`, ordered by (scenario, variant).
pub fn parse_all(flow_dir: &Path, num_tors: usize) -> Result<Batch, DriverError> {
    let files = layout::alloc_files(flow_dir)?;
    let pairs = files
        .par_iter()
        .map(|(_, path)| parse_allocation_to_matrix(path, num_tors))
        .collect::<Result<Vec<_>, _>>()?;
    let (xs, ys) = matrix::stack(&pairs, num_tors);
    info!(
        "Parsed {} allocation logs from {}",
        pairs.len(),
        flow_dir.display()
    );
    Ok(Batch {
        xs,
        ys,
        ids: files.into_iter().map(|(id, _)| id).collect(),
    })
}
