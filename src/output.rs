//! Writing batch results to the output directory.
//!
//! Each scenario gets its own subdirectory with a flat key/value summary
//! (diffable across runs and scenarios) and CSV tables for capacities and
//! generation. The batch as a whole gets a one-row-per-scenario CSV.
use crate::orchestrator::{Outcome, ScenarioReport};
use crate::results::ScenarioResult;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// The default name of the output directory, created next to the model
pub const OUTPUT_DIRECTORY_ROOT: &str = "nexusplan_results";

const SUMMARY_FILE_NAME: &str = "summary.txt";
const CAPACITIES_FILE_NAME: &str = "capacities.csv";
const GENERATION_FILE_NAME: &str = "generation.csv";
const SCENARIOS_FILE_NAME: &str = "scenarios.csv";

/// The default output directory for a model: `nexusplan_results/<model name>`.
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    let model_name = model_dir
        .canonicalize()?
        .file_name()
        .context("Could not resolve the model directory name")?
        .to_string_lossy()
        .into_owned();
    Ok([OUTPUT_DIRECTORY_ROOT, &model_name].iter().collect())
}

/// Create the output directory.
///
/// A non-empty existing directory is an error unless `overwrite` is set, in
/// which case it is cleared. Returns whether existing output was removed.
pub fn create_output_directory(output_dir: &Path, overwrite: bool) -> Result<bool> {
    let mut overwritten = false;
    if output_dir.is_dir() && output_dir.read_dir()?.next().is_some() {
        ensure!(
            overwrite,
            "Output directory {} already exists and is not empty",
            output_dir.display()
        );
        fs::remove_dir_all(output_dir)?;
        overwritten = true;
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create output directory {}", output_dir.display()))?;
    Ok(overwritten)
}

#[derive(Serialize)]
struct CapacityRow<'a> {
    technology: &'a str,
    optimal_capacity: f64,
}

#[derive(Serialize)]
struct GenerationRow<'a> {
    source: &'a str,
    annual_kwh: f64,
}

#[derive(Serialize)]
struct ScenarioRow<'a> {
    scenario: &'a str,
    name: &'a str,
    status: String,
    total_npv_usd: Option<f64>,
    lcoe_usd_per_mwh: Option<f64>,
    total_tons_co2: Option<f64>,
}

/// Write all per-scenario files plus the batch summary CSV.
pub fn write_results(output_dir: &Path, reports: &[ScenarioReport]) -> Result<()> {
    let mut scenarios_writer = csv::Writer::from_path(output_dir.join(SCENARIOS_FILE_NAME))?;
    for report in reports {
        let scenario_dir = output_dir.join(&report.scenario_id);
        fs::create_dir_all(&scenario_dir)?;

        match &report.outcome {
            Outcome::Completed(result) => {
                write_scenario_files(&scenario_dir, result)?;
                scenarios_writer.serialize(ScenarioRow {
                    scenario: &report.scenario_id,
                    name: &report.scenario_name,
                    status: "completed".to_string(),
                    total_npv_usd: Some(result.economics.total_npv_usd),
                    lcoe_usd_per_mwh: result.economics.lcoe_usd_per_mwh,
                    total_tons_co2: Some(result.emissions.total_tons_co2),
                })?;
            }
            Outcome::Failed(failure) => {
                let mut summary = format!(
                    "scenario.id = {}\nscenario.name = {}\nstatus = failed ({})\n",
                    report.scenario_id, report.scenario_name, failure.kind
                );
                for detail in &failure.details {
                    writeln!(summary, "detail = {detail}")?;
                }
                fs::write(scenario_dir.join(SUMMARY_FILE_NAME), summary)?;
                scenarios_writer.serialize(ScenarioRow {
                    scenario: &report.scenario_id,
                    name: &report.scenario_name,
                    status: format!("failed ({})", failure.kind),
                    total_npv_usd: None,
                    lcoe_usd_per_mwh: None,
                    total_tons_co2: None,
                })?;
            }
        }
    }
    scenarios_writer.flush()?;
    Ok(())
}

fn write_scenario_files(scenario_dir: &Path, result: &ScenarioResult) -> Result<()> {
    fs::write(
        scenario_dir.join(SUMMARY_FILE_NAME),
        render_summary(result)?,
    )?;

    let mut capacities = csv::Writer::from_path(scenario_dir.join(CAPACITIES_FILE_NAME))?;
    for (technology, &capacity) in &result.optimal_capacities {
        capacities.serialize(CapacityRow {
            technology: &technology.0,
            optimal_capacity: capacity,
        })?;
    }
    capacities.flush()?;

    let mut generation = csv::Writer::from_path(scenario_dir.join(GENERATION_FILE_NAME))?;
    for (source, &annual_kwh) in &result.operations.generation_kwh {
        generation.serialize(GenerationRow { source, annual_kwh })?;
    }
    generation.flush()?;

    Ok(())
}

/// The flat key/value rendering of one scenario's results.
fn render_summary(result: &ScenarioResult) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "scenario.id = {}", result.scenario_id)?;
    writeln!(out, "scenario.name = {}", result.scenario_name)?;
    writeln!(out, "status = completed")?;
    for (technology, capacity) in &result.optimal_capacities {
        writeln!(out, "optimal_capacities.{technology} = {capacity:.3}")?;
    }
    let economics = &result.economics;
    writeln!(out, "economics.total_capex_usd = {:.2}", economics.total_capex_usd)?;
    writeln!(out, "economics.annual_opex_usd = {:.2}", economics.annual_opex_usd)?;
    writeln!(out, "economics.npv_opex_usd = {:.2}", economics.npv_opex_usd)?;
    writeln!(out, "economics.total_npv_usd = {:.2}", economics.total_npv_usd)?;
    match economics.lcoe_usd_per_mwh {
        Some(lcoe) => writeln!(out, "economics.lcoe_usd_per_mwh = {lcoe:.2}")?,
        None => writeln!(out, "economics.lcoe_usd_per_mwh = n/a")?,
    }
    for (source, generation) in &result.operations.generation_kwh {
        writeln!(out, "operations.generation_kwh.{source} = {generation:.1}")?;
    }
    writeln!(
        out,
        "operations.renewable_fraction_pct = {:.2}",
        result.operations.renewable_fraction_pct
    )?;
    writeln!(out, "emissions.gas_tons_co2 = {:.3}", result.emissions.gas_tons_co2)?;
    writeln!(out, "emissions.grid_tons_co2 = {:.3}", result.emissions.grid_tons_co2)?;
    writeln!(out, "emissions.total_tons_co2 = {:.3}", result.emissions.total_tons_co2)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{Failure, FailureKind};
    use crate::results::{Economics, Emissions, Operations};
    use indexmap::indexmap;
    use tempfile::tempdir;

    fn completed_result() -> ScenarioResult {
        ScenarioResult {
            scenario_id: "s1_baseline".into(),
            scenario_name: "Baseline".to_string(),
            optimal_capacities: indexmap! { "wind_hawt".into() => 52.5 },
            economics: Economics {
                total_capex_usd: 78750.0,
                annual_opex_usd: 1200.0,
                npv_opex_usd: 13509.3,
                total_npv_usd: 92259.3,
                lcoe_usd_per_mwh: Some(70.2),
            },
            operations: Operations {
                generation_kwh: indexmap! { "wind".to_string() => 321_000.0 },
                renewable_fraction_pct: 100.0,
            },
            emissions: Emissions {
                gas_tons_co2: 0.0,
                grid_tons_co2: 0.0,
                total_tons_co2: 0.0,
            },
        }
    }

    #[test]
    fn test_create_output_directory_refuses_non_empty() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        // Empty existing directory is fine
        assert!(!create_output_directory(&output_dir, false).unwrap());

        fs::write(output_dir.join("stale.txt"), "x").unwrap();
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(!output_dir.join("stale.txt").exists());
    }

    #[test]
    fn test_write_results() {
        let dir = tempdir().unwrap();
        let reports = vec![
            ScenarioReport {
                scenario_id: "s1_baseline".to_string(),
                scenario_name: "Baseline".to_string(),
                outcome: Outcome::Completed(completed_result()),
            },
            ScenarioReport {
                scenario_id: "s4_carbon_tax".to_string(),
                scenario_name: "Carbon tax".to_string(),
                outcome: Outcome::Failed(Failure {
                    kind: FailureKind::Infeasible,
                    details: vec!["water demand peaks at 5.0".to_string()],
                }),
            },
        ];

        write_results(dir.path(), &reports).unwrap();

        let summary =
            fs::read_to_string(dir.path().join("s1_baseline").join(SUMMARY_FILE_NAME)).unwrap();
        assert!(summary.contains("optimal_capacities.wind_hawt = 52.500"));
        assert!(summary.contains("economics.total_npv_usd = 92259.30"));

        let failed =
            fs::read_to_string(dir.path().join("s4_carbon_tax").join(SUMMARY_FILE_NAME)).unwrap();
        assert!(failed.contains("status = failed (infeasible)"));
        assert!(failed.contains("water demand"));

        let batch = fs::read_to_string(dir.path().join(SCENARIOS_FILE_NAME)).unwrap();
        assert!(batch.starts_with("scenario,name,status,"));
        assert_eq!(batch.lines().count(), 3);

        let capacities =
            fs::read_to_string(dir.path().join("s1_baseline").join(CAPACITIES_FILE_NAME)).unwrap();
        assert!(capacities.contains("wind_hawt,52.5"));
    }
}
