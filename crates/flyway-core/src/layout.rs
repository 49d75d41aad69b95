//! File naming for flow logs, allocation logs, and simulator results.
//!
//! | file | name |
//! |---|---|
//! | flow log | `flows__<scenario>.dat` |
//! | allocation log | `alloc__<scenario>_<variant>.dat` |
//! | simulator result | `<scenario>_<variant>.txt` |
//!
//! Directory listings are always returned sorted by the IDs parsed from the names, so batch
//! processing is reproducible regardless of the order the OS lists entries in.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

identifier!(
    /// A generated traffic scenario (one flow log).
    ScenarioId
);

identifier!(
    /// One wired/wireless assignment over a scenario's flows.
    VariantId
);

const FLOW_PREFIX: &str = "flows__";
const ALLOC_PREFIX: &str = "alloc__";
const LOG_EXT: &str = ".dat";
const RESULT_EXT: &str = ".txt";

/// The file name of a scenario's flow log.
pub fn flow_file_name(scenario: ScenarioId) -> String {
    format!("{FLOW_PREFIX}{scenario}{LOG_EXT}")
}

/// The file name of an allocation log.
pub fn alloc_file_name(scenario: ScenarioId, variant: VariantId) -> String {
    format!("{ALLOC_PREFIX}{scenario}_{variant}{LOG_EXT}")
}

/// The file name of a simulator result.
pub fn result_file_name(scenario: ScenarioId, variant: VariantId) -> String {
    format!("{scenario}_{variant}{RESULT_EXT}")
}

// Only canonical names parse: `flows__01.dat` is not scenario 1.

/// Parses a flow log file name.
pub fn parse_flow_file_name(name: &str) -> Option<ScenarioId> {
    let scenario = name
        .strip_prefix(FLOW_PREFIX)?
        .strip_suffix(LOG_EXT)?
        .parse()
        .ok()?;
    (flow_file_name(scenario) == name).then_some(scenario)
}

/// Parses an allocation log file name.
pub fn parse_alloc_file_name(name: &str) -> Option<(ScenarioId, VariantId)> {
    let ids = name.strip_prefix(ALLOC_PREFIX)?.strip_suffix(LOG_EXT)?;
    let (scenario, variant) = parse_id_pair(ids)?;
    (alloc_file_name(scenario, variant) == name).then_some((scenario, variant))
}

/// Parses a simulator result file name.
pub fn parse_result_file_name(name: &str) -> Option<(ScenarioId, VariantId)> {
    let (scenario, variant) = parse_id_pair(name.strip_suffix(RESULT_EXT)?)?;
    (result_file_name(scenario, variant) == name).then_some((scenario, variant))
}

fn parse_id_pair(s: &str) -> Option<(ScenarioId, VariantId)> {
    let (scenario, variant) = s.split_once('_')?;
    Some((scenario.parse().ok()?, variant.parse().ok()?))
}

/// Flow logs in `dir`, sorted by scenario.
pub fn flow_files(dir: &Path) -> io::Result<Vec<(ScenarioId, PathBuf)>> {
    list_sorted(dir, parse_flow_file_name)
}

/// Allocation logs in `dir`, sorted by (scenario, variant).
pub fn alloc_files(dir: &Path) -> io::Result<Vec<((ScenarioId, VariantId), PathBuf)>> {
    list_sorted(dir, parse_alloc_file_name)
}

/// Simulator results in `dir`, sorted by (scenario, variant).
pub fn result_files(dir: &Path) -> io::Result<Vec<((ScenarioId, VariantId), PathBuf)>> {
    list_sorted(dir, parse_result_file_name)
}

fn list_sorted<K, F>(dir: &Path, parse: F) -> io::Result<Vec<(K, PathBuf)>>
where
    K: Ord,
    F: Fn(&str) -> Option<K>,
{
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let key = entry.file_name().to_str().and_then(&parse);
        if let Some(key) = key {
            entries.push((key, entry.path()));
        }
    }
    entries.sort();
    Ok(entries)
}
