//! Allocation logs as dense adjacency matrices.

use ndarray::{s, Array1, Array2, Array3, Array4, Axis};

use crate::files::AllocationFile;
use crate::record::FormatError;

/// Adjacency and wireless-label matrices of one allocation, both `num_tors × num_tors`.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyPair {
    /// `x[[src, dst]]` is 1 iff some flow goes from `src` to `dst`.
    pub x: Array2<f64>,
    /// `y[[src, dst]]` is 1 iff at least one such flow is allocated a wireless link.
    pub y: Array2<f64>,
}

impl AdjacencyPair {
    /// Number of ToRs.
    pub fn num_tors(&self) -> usize {
        self.x.nrows()
    }

    /// `y` flattened row-major into a `(num_tors², 1)` column.
    pub fn y_column(&self) -> Array2<f64> {
        self.y.iter().copied().collect::<Array1<_>>().insert_axis(Axis(1))
    }

    /// Converts matrices back into an allocation log. Not supported: the matrices drop flow
    /// sizes, rates, and time steps.
    pub fn to_allocation_file(&self) -> Result<AllocationFile, MatrixError> {
        Err(MatrixError::Unsupported(
            "converting adjacency matrices back into an allocation log",
        ))
    }
}

/// Builds the adjacency pair of an allocation over `num_tors` ToRs.
///
/// Fails if any record names a node outside `[0, num_tors)`.
pub fn adjacency(file: &AllocationFile, num_tors: usize) -> Result<AdjacencyPair, FormatError> {
    let mut x = Array2::zeros((num_tors, num_tors));
    let mut y = Array2::zeros((num_tors, num_tors));
    for record in &file.records {
        let (src, dst) = (record.flow.src, record.flow.dst);
        for node in [src, dst] {
            if node.inner() >= num_tors {
                return Err(FormatError::NodeOutOfRange { node, num_tors });
            }
        }
        x[[src.inner(), dst.inner()]] = 1.0;
        if record.link_type.is_wireless() {
            y[[src.inner(), dst.inner()]] = 1.0;
        }
    }
    Ok(AdjacencyPair { x, y })
}

/// Stacks adjacency pairs into `xs` of shape `(batch, 1, n, n)` and `ys` of shape `(batch, n², 1)`.
///
/// PRECONDITION: every pair is over `num_tors` ToRs.
pub fn stack(pairs: &[AdjacencyPair], num_tors: usize) -> (Array4<f64>, Array3<f64>) {
    let mut xs = Array4::zeros((pairs.len(), 1, num_tors, num_tors));
    let mut ys = Array3::zeros((pairs.len(), num_tors * num_tors, 1));
    for (i, pair) in pairs.iter().enumerate() {
        assert_eq!(pair.num_tors(), num_tors);
        xs.slice_mut(s![i, 0, .., ..]).assign(&pair.x);
        ys.slice_mut(s![i, .., ..]).assign(&pair.y_column());
    }
    (xs, ys)
}

/// Error converting matrices.
#[derive(Debug, thiserror::Error)]
pub enum MatrixError {
    /// The conversion is not implemented.
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}
