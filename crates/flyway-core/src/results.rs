//! Simulator result files.
//!
//! A result file has an optional timing header followed by one bracketed line per application:
//!
//! ```text
//! Sim: 120, WallClock: 35, WallDiff: 1
//! [0: 100000000.0 0.512]
//! [1: 99874112.5 0.498]
//! ...
//! ```
//!
//! The header is also accepted in the simulator's console form `Time: [Sim=120, WallClock=35,
//! WallDiff=1]`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::record::{parse_field, FormatError};

/// Number of application lines in a result file.
pub const NR_APP_LINES: usize = 15;

/// Timing header of a result file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultHeader {
    /// Simulated seconds.
    pub sim: f64,
    /// Wall-clock seconds since the start of the run.
    pub wall_clock: f64,
    /// Wall-clock seconds since the previous report.
    pub wall_diff: f64,
}

/// The outcome of one application (flow) in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppResult {
    /// Application index.
    pub index: usize,
    /// Measured throughput.
    pub throughput: f64,
    /// Measured latency.
    pub latency: f64,
}

/// A parsed result file.
#[derive(Debug, Clone, PartialEq)]
pub struct SimResult {
    /// The timing header, if present.
    pub header: Option<ResultHeader>,
    /// Exactly [`NR_APP_LINES`] application results.
    pub apps: Vec<AppResult>,
}

impl SimResult {
    /// Parses result text. Blank lines are skipped.
    pub fn parse(s: &str) -> Result<Self, FormatError> {
        let mut lines = s
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .peekable();
        let header = match lines.peek().copied() {
            Some((i, line)) if !line.trim_start().starts_with('[') => {
                lines.next();
                Some(parse_header(line).map_err(|e| e.at_line(i + 1))?)
            }
            _ => None,
        };
        let apps = lines
            .map(|(i, line)| parse_app(line).map_err(|e| e.at_line(i + 1)))
            .collect::<Result<Vec<_>, _>>()?;
        if apps.len() != NR_APP_LINES {
            return Err(FormatError::WrongNrLines {
                expected: NR_APP_LINES,
                got: apps.len(),
            });
        }
        Ok(Self { header, apps })
    }

    /// Arithmetic mean of the application throughputs.
    pub fn average_throughput(&self) -> f64 {
        if self.apps.is_empty() {
            return 0.0;
        }
        self.apps.iter().map(|app| app.throughput).sum::<f64>() / self.apps.len() as f64
    }
}

fn parse_header(line: &str) -> Result<ResultHeader, FormatError> {
    let field = |key: &str| -> Result<f64, FormatError> {
        let invalid = || FormatError::InvalidHeader(line.to_owned());
        let start = line.find(key).ok_or_else(invalid)? + key.len();
        let value = line[start..]
            .trim_start_matches(|c: char| c == ':' || c == '=' || c == ' ')
            .split(|c: char| c == ',' || c == ']' || c.is_whitespace())
            .next()
            .ok_or_else(invalid)?;
        value.parse().map_err(|_| invalid())
    };
    Ok(ResultHeader {
        sim: field("Sim")?,
        wall_clock: field("WallClock")?,
        wall_diff: field("WallDiff")?,
    })
}

fn parse_app(line: &str) -> Result<AppResult, FormatError> {
    let inner = line
        .trim()
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(']'))
        .ok_or_else(|| FormatError::InvalidField {
            field: "application result",
            value: line.to_owned(),
        })?;
    let fields = inner.split_whitespace().collect::<Vec<_>>();
    if fields.len() < 3 {
        return Err(FormatError::TooFewFields {
            expected: 3,
            got: fields.len(),
        });
    }
    Ok(AppResult {
        index: parse_field("application index", fields[0].trim_end_matches(':'))?,
        throughput: parse_field("throughput", fields[1])?,
        latency: parse_field("latency", fields[2])?,
    })
}

/// Average throughput of a run, or the fact that the run left no result file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Throughput {
    /// The result file exists and was parsed.
    Measured(f64),
    /// There is no result file.
    Absent,
}

impl Throughput {
    /// The throughput, with absent runs counting as `0.0`.
    pub fn value(self) -> f64 {
        match self {
            Throughput::Measured(value) => value,
            Throughput::Absent => 0.0,
        }
    }

    /// Whether the result file was missing.
    pub fn is_absent(self) -> bool {
        matches!(self, Throughput::Absent)
    }
}

/// Reads and parses a result file.
pub fn read_result(path: impl AsRef<Path>) -> Result<SimResult, ResultError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ResultError::Missing(path.into()),
        _ => ResultError::Io(e),
    })?;
    SimResult::parse(&s).map_err(|source| ResultError::Format {
        path: path.into(),
        source,
    })
}

/// Average throughput recorded in a result file. A missing file is [`Throughput::Absent`], not an
/// error.
pub fn average_throughput(path: impl AsRef<Path>) -> Result<Throughput, ResultError> {
    match read_result(path) {
        Ok(result) => Ok(Throughput::Measured(result.average_throughput())),
        Err(ResultError::Missing(path)) => {
            log::debug!("no result file at {}", path.display());
            Ok(Throughput::Absent)
        }
        Err(e) => Err(e),
    }
}

/// Error reading a result file.
#[derive(Debug, thiserror::Error)]
pub enum ResultError {
    /// The file does not exist.
    #[error("missing result file {0}")]
    Missing(PathBuf),

    /// The contents are malformed.
    #[error("malformed result file {path}")]
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
