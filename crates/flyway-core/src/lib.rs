//! The core library for flyway simulation data: the flow and allocation log formats, synthetic
//! log generation, adjacency matrices for learning, and simulator result parsing.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

#[macro_use]
mod ident;

pub mod files;
pub mod generate;
pub mod layout;
pub mod matrix;
pub mod output;
pub mod record;
pub mod results;
pub mod sim;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use files::{AllocationFile, FlowFile};
pub use layout::{ScenarioId, VariantId};
pub use record::{AllocationRecord, FlowRecord, FormatError, LinkType, NodeId, UnknownCode};
pub use sim::{SimError, SimJob, Simulator};
