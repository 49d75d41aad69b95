use crate::files::{AllocationFile, FlowFile};
use crate::generate::{DEFAULT_DATA_RATE, DEFAULT_TRANSFER_SIZE};
use crate::layout::{ScenarioId, VariantId};
use crate::record::{AllocationRecord, FlowRecord, LinkType, NodeId};

fn flow(src: usize, dst: usize) -> FlowRecord {
    FlowRecord::new(
        0,
        NodeId::new(src),
        NodeId::new(dst),
        DEFAULT_TRANSFER_SIZE,
        DEFAULT_DATA_RATE,
    )
}

// Three ToRs, flows 0 -> 1 and 1 -> 2.
pub(crate) fn three_tor_flows() -> FlowFile {
    FlowFile {
        scenario: ScenarioId::new(0),
        records: vec![flow(0, 1), flow(1, 2)],
    }
}

// `three_tor_flows` with 0 -> 1 wired and 1 -> 2 wireless.
pub(crate) fn three_tor_allocation() -> AllocationFile {
    let link_types = [LinkType::Wired, LinkType::Wireless];
    let records = three_tor_flows()
        .records
        .into_iter()
        .zip(link_types)
        .map(|(flow, link_type)| AllocationRecord { flow, link_type })
        .collect();
    AllocationFile {
        scenario: ScenarioId::new(0),
        variant: VariantId::new(0),
        records,
    }
}
