//! The flow-log and allocation-log line formats.
//!
//! One record per line, fields separated by single spaces:
//!
//! ```text
//! <time_step> <src> <dst> <protocol> <transfer_size> <data_rate>            (flow, 6 fields)
//! <time_step> <src> <dst> <protocol> <transfer_size> <data_rate> <link>     (allocation, 7 fields)
//! ```
//!
//! e.g. `0 8 6 Tcp 100000000 1Gbps 2`. Older logs mixed several layouts with no version marker;
//! only this one is accepted.

use std::fmt;
use std::str::FromStr;

use crate::units::{Bytes, Gbps};

identifier!(
    /// A top-of-rack switch, indexed the same way the simulator indexes them.
    NodeId
);

const NR_FLOW_FIELDS: usize = 6;
const NR_ALLOC_FIELDS: usize = 7;

/// Transport label of a flow. Generated logs only ever use [`Protocol::Tcp`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// TCP.
    #[default]
    Tcp,
    /// Any other label, kept verbatim.
    Other(String),
}

impl From<&str> for Protocol {
    fn from(s: &str) -> Self {
        match s {
            "Tcp" => Protocol::Tcp,
            other => Protocol::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("Tcp"),
            Protocol::Other(label) => f.write_str(label),
        }
    }
}

/// One traffic demand at a discrete time step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowRecord {
    /// Simulated time step (seconds in the simulator).
    pub time_step: u64,
    /// Sending ToR.
    pub src: NodeId,
    /// Receiving ToR.
    pub dst: NodeId,
    /// Transport label.
    pub protocol: Protocol,
    /// Bytes to transfer.
    pub size: Bytes,
    /// Application data rate.
    pub rate: Gbps,
}

impl FlowRecord {
    /// Creates a TCP flow record.
    ///
    /// PRECONDITION: `src != dst` and `size` is non-zero. Violations are caller bugs and panic.
    pub fn new(time_step: u64, src: NodeId, dst: NodeId, size: Bytes, rate: Gbps) -> Self {
        assert_ne!(src, dst, "flow from node {src} to itself");
        assert!(size > Bytes::ZERO, "flow {src} -> {dst} transfers no data");
        Self {
            time_step,
            src,
            dst,
            protocol: Protocol::Tcp,
            size,
            rate,
        }
    }
}

impl fmt::Display for FlowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.time_step, self.src, self.dst, self.protocol, self.size, self.rate
        )
    }
}

impl FromStr for FlowRecord {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_flow(s)
    }
}

/// Physical transport assigned to a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkType {
    /// A wireless flyway (code 1).
    Wireless,
    /// The wired fabric (code 2).
    Wired,
    /// Any other code. Neither wired nor wireless.
    Unknown(UnknownCode),
}

/// A link code other than 1 or 2. Only [`LinkType::from_code`] builds one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnknownCode(i64);

impl UnknownCode {
    /// The raw code.
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl LinkType {
    /// Maps a numeric code to a link type.
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => LinkType::Wireless,
            2 => LinkType::Wired,
            other => LinkType::Unknown(UnknownCode(other)),
        }
    }

    /// The numeric code written to allocation logs.
    pub const fn code(self) -> i64 {
        match self {
            LinkType::Wireless => 1,
            LinkType::Wired => 2,
            LinkType::Unknown(code) => code.value(),
        }
    }

    /// Whether this is a wireless link.
    pub const fn is_wireless(self) -> bool {
        matches!(self, LinkType::Wireless)
    }
}

/// A flow together with the link type it was allocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllocationRecord {
    /// The flow.
    pub flow: FlowRecord,
    /// Its link allocation.
    pub link_type: LinkType,
}

impl fmt::Display for AllocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.flow, self.link_type.code())
    }
}

impl FromStr for AllocationRecord {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_allocation(s)
    }
}

/// Encodes a flow as a flow-log line (without the newline).
pub fn encode_flow(flow: &FlowRecord) -> String {
    flow.to_string()
}

/// Decodes a flow-log line.
///
/// Fields are read positionally from the first six tokens; anything after them is ignored, which
/// lets the flow part of an allocation line be read as a flow.
pub fn decode_flow(line: &str) -> Result<FlowRecord, FormatError> {
    let fields = split_fields(line);
    if fields.len() < NR_FLOW_FIELDS {
        return Err(FormatError::TooFewFields {
            expected: NR_FLOW_FIELDS,
            got: fields.len(),
        });
    }
    flow_from_fields(&fields)
}

/// Encodes a flow and its link type as an allocation-log line (without the newline).
pub fn encode_allocation(flow: &FlowRecord, link_type: LinkType) -> String {
    format!("{} {}", encode_flow(flow), link_type.code())
}

/// Decodes an allocation-log line. The line must have exactly seven fields.
pub fn decode_allocation(line: &str) -> Result<AllocationRecord, FormatError> {
    let fields = split_fields(line);
    if fields.len() != NR_ALLOC_FIELDS {
        return Err(FormatError::WrongNrFields {
            expected: NR_ALLOC_FIELDS,
            got: fields.len(),
        });
    }
    let flow = flow_from_fields(&fields)?;
    let code = parse_field("link type", fields[NR_ALLOC_FIELDS - 1])?;
    Ok(AllocationRecord {
        flow,
        link_type: LinkType::from_code(code),
    })
}

fn split_fields(line: &str) -> Vec<&str> {
    line.trim_end().split(' ').collect()
}

fn flow_from_fields(fields: &[&str]) -> Result<FlowRecord, FormatError> {
    Ok(FlowRecord {
        time_step: parse_field("time step", fields[0])?,
        src: parse_field("source node", fields[1])?,
        dst: parse_field("destination node", fields[2])?,
        protocol: Protocol::from(fields[3]),
        size: parse_field("transfer size", fields[4])?,
        rate: parse_field("data rate", fields[5])?,
    })
}

pub(crate) fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, FormatError> {
    value.parse().map_err(|_| FormatError::InvalidField {
        field,
        value: value.to_owned(),
    })
}

/// A malformed record, result line, or out-of-range index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A line had fewer fields than its format requires.
    #[error("too few fields (expected at least {expected}, got {got})")]
    TooFewFields {
        /// Minimum number of fields.
        expected: usize,
        /// Actual number of fields.
        got: usize,
    },

    /// A line had a different number of fields than its format requires.
    #[error("wrong number of fields (expected {expected}, got {got})")]
    WrongNrFields {
        /// Expected number of fields.
        expected: usize,
        /// Actual number of fields.
        got: usize,
    },

    /// A field could not be parsed.
    #[error("invalid {field}: {value:?}")]
    InvalidField {
        /// Which field.
        field: &'static str,
        /// The offending text.
        value: String,
    },

    /// A node index outside `[0, num_tors)`.
    #[error("node {node} is out of range for {num_tors} ToRs")]
    NodeOutOfRange {
        /// The offending node.
        node: NodeId,
        /// Number of ToRs.
        num_tors: usize,
    },

    /// A result file header that could not be understood.
    #[error("invalid result header: {0:?}")]
    InvalidHeader(String),

    /// A result file with the wrong number of per-application lines.
    #[error("wrong number of result lines (expected {expected}, got {got})")]
    WrongNrLines {
        /// Expected number of lines.
        expected: usize,
        /// Actual number of lines.
        got: usize,
    },

    /// An error on a specific line of a file.
    #[error("line {line}: {source}")]
    AtLine {
        /// 1-based line number.
        line: usize,
        /// The underlying error.
        source: Box<FormatError>,
    },
}

impl FormatError {
    pub(crate) fn at_line(self, line: usize) -> Self {
        FormatError::AtLine {
            line,
            source: Box::new(self),
        }
    }
}
