//! Picking the best allocation of each scenario by average throughput.

use std::path::Path;

use flyway_core::layout;
use flyway_core::results::average_throughput;
use flyway_core::{ScenarioId, VariantId};
use itertools::Itertools;

use crate::DriverError;

/// The best allocation of a scenario.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ScenarioBest {
    /// The scenario.
    pub scenario: ScenarioId,
    /// The variant with the highest average throughput.
    pub variant: VariantId,
    /// Its average throughput.
    pub throughput: f64,
    /// How many variants had results.
    pub nr_variants: usize,
}

/// The variant of `scenario` with the highest average throughput among the results in
/// `results_dir`, or `None` if the scenario has no results. Ties go to the lowest variant.
pub fn best_allocation_for_scenario(
    scenario: ScenarioId,
    results_dir: &Path,
) -> Result<Option<(VariantId, f64)>, DriverError> {
    let files = layout::result_files(results_dir)?;
    let values = files
        .iter()
        .filter(|((s, _), _)| *s == scenario)
        .map(|((_, variant), path)| -> Result<_, DriverError> {
            Ok((*variant, average_throughput(path)?.value()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(first_max(values))
}

/// The best allocation of every scenario with results in `results_dir`, ordered by scenario.
pub fn summarize(results_dir: &Path) -> Result<Vec<ScenarioBest>, DriverError> {
    let files = layout::result_files(results_dir)?;
    let mut bests = Vec::new();
    for (scenario, group) in &files.iter().group_by(|((s, _), _)| *s) {
        let values = group
            .map(|((_, variant), path)| -> Result<_, DriverError> {
                Ok((*variant, average_throughput(path)?.value()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let nr_variants = values.len();
        if let Some((variant, throughput)) = first_max(values) {
            bests.push(ScenarioBest {
                scenario,
                variant,
                throughput,
                nr_variants,
            });
        }
    }
    Ok(bests)
}

// Only a strictly greater value replaces the current best. NaN never wins.
fn first_max<T>(values: impl IntoIterator<Item = (T, f64)>) -> Option<(T, f64)> {
    values
        .into_iter()
        .filter(|(_, value)| !value.is_nan())
        .fold(None, |best, (id, value)| match best {
            Some((_, max)) if value <= max => best,
            _ => Some((id, value)),
        })
}
