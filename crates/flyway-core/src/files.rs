//! Flow logs and allocation logs as whole files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::layout::{self, ScenarioId, VariantId};
use crate::output::write_atomic;
use crate::record::{decode_allocation, decode_flow, AllocationRecord, FlowRecord, FormatError};

/// The flows of one scenario, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowFile {
    /// The scenario.
    pub scenario: ScenarioId,
    /// One record per line.
    pub records: Vec<FlowRecord>,
}

impl FlowFile {
    /// Parses flow-log text. Blank lines are skipped.
    pub fn from_text(scenario: ScenarioId, s: &str) -> Result<Self, FormatError> {
        Ok(Self {
            scenario,
            records: parse_lines(s, decode_flow)?,
        })
    }

    /// Renders the file, one record per line.
    pub fn to_text(&self) -> String {
        to_lines(&self.records)
    }

    /// Reads a flow log. The scenario is taken from the file name.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        let scenario = file_name(path)
            .and_then(layout::parse_flow_file_name)
            .ok_or_else(|| FileError::UnrecognizedName(path.into()))?;
        let s = fs::read_to_string(path)?;
        Self::from_text(scenario, &s).map_err(|source| FileError::Format {
            path: path.into(),
            source,
        })
    }

    /// Writes the flow log into `dir` under its canonical name, returning its path.
    pub fn write(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(layout::flow_file_name(self.scenario));
        write_atomic(&path, self.to_text())?;
        Ok(path)
    }

    /// Number of flows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no flows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One wired/wireless assignment over a scenario's flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationFile {
    /// The scenario whose flows are allocated.
    pub scenario: ScenarioId,
    /// Which allocation of that scenario.
    pub variant: VariantId,
    /// One record per line.
    pub records: Vec<AllocationRecord>,
}

impl AllocationFile {
    /// Parses allocation-log text. Blank lines are skipped.
    pub fn from_text(
        scenario: ScenarioId,
        variant: VariantId,
        s: &str,
    ) -> Result<Self, FormatError> {
        Ok(Self {
            scenario,
            variant,
            records: parse_lines(s, decode_allocation)?,
        })
    }

    /// Renders the file, one record per line.
    pub fn to_text(&self) -> String {
        to_lines(&self.records)
    }

    /// Reads an allocation log. The scenario and variant are taken from the file name.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, FileError> {
        let path = path.as_ref();
        let (scenario, variant) = file_name(path)
            .and_then(layout::parse_alloc_file_name)
            .ok_or_else(|| FileError::UnrecognizedName(path.into()))?;
        let s = fs::read_to_string(path)?;
        Self::from_text(scenario, variant, &s).map_err(|source| FileError::Format {
            path: path.into(),
            source,
        })
    }

    /// Writes the allocation log into `dir` under its canonical name, returning its path.
    pub fn write(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(layout::alloc_file_name(self.scenario, self.variant));
        write_atomic(&path, self.to_text())?;
        Ok(path)
    }

    /// Number of wireless allocations.
    pub fn nr_wireless(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.link_type.is_wireless())
            .count()
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

fn parse_lines<T>(
    s: &str,
    decode: fn(&str) -> Result<T, FormatError>,
) -> Result<Vec<T>, FormatError> {
    s.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| decode(line).map_err(|e| e.at_line(i + 1)))
        .collect()
}

fn to_lines<T: ToString>(records: &[T]) -> String {
    records
        .iter()
        .map(|r| r.to_string() + "\n")
        .collect::<String>()
}

/// Error reading a log file.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    /// The file name does not follow the log naming scheme.
    #[error("unrecognized log file name: {0}")]
    UnrecognizedName(PathBuf),

    /// The contents are malformed.
    #[error("malformed log file {path}")]
    Format {
        /// The file.
        path: PathBuf,
        /// What was wrong.
        source: FormatError,
    },

    /// IO error.
    #[error(transparent)]
    Io(#[from] io::Error),
}
