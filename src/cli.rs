//! The command line interface for the planner.
use crate::log;
use crate::model::Model;
use crate::orchestrator::run_batch;
use crate::output::{create_output_directory, get_output_dir, write_results};
use crate::scenario::Scenario;
use crate::settings::Settings;
use crate::solver::SolverConfig;
use ::log::{info, warn};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// The command line interface for the planner.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Commands,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Run only the named scenarios (repeatable); all scenarios if omitted
    #[arg(short, long = "scenario")]
    pub scenarios: Vec<String>,
    /// Solver wall-clock limit in seconds
    #[arg(long)]
    pub time_limit: Option<f64>,
    /// Relative MIP gap tolerance
    #[arg(long)]
    pub mip_rel_gap: Option<f64>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run all (or selected) scenarios of a model.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Load and validate a model without solving anything.
    Validate {
        /// Path to the model directory.
        model_dir: PathBuf,
    },
    /// List the scenarios a model defines.
    Scenarios {
        /// Path to the model directory.
        model_dir: PathBuf,
    },
}

impl Commands {
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts),
            Self::Validate { model_dir } => handle_validate_command(&model_dir),
            Self::Scenarios { model_dir } => handle_scenarios_command(&model_dir),
        }
    }
}

/// Parse CLI arguments and dispatch to the chosen command.
pub fn run_cli() -> Result<()> {
    Cli::parse().command.execute()
}

/// Handle the `run` command.
pub fn handle_run_command(model_dir: &Path, opts: &RunOpts) -> Result<()> {
    let settings = Settings::from_path(model_dir).context("Failed to load settings.")?;

    let pathbuf;
    let output_path = match opts.output_dir.as_deref() {
        Some(path) => path,
        None => {
            pathbuf = get_output_dir(model_dir)?;
            &pathbuf
        }
    };
    let overwritten = create_output_directory(output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    log::init(settings.log_level.as_deref(), Some(output_path))
        .context("Failed to initialise logging.")?;
    if overwritten {
        warn!("Existing output was overwritten");
    }

    let model = Model::from_path(model_dir).context("Failed to load model.")?;
    info!("Loaded model from {}", model_dir.display());
    info!("Output folder: {}", output_path.display());

    let scenarios = select_scenarios(&model, &opts.scenarios)?;
    let solver_config = SolverConfig {
        time_limit: opts.time_limit,
        mip_rel_gap: opts.mip_rel_gap,
        ..SolverConfig::default()
    };

    let reports = run_batch(&model, scenarios, solver_config);
    write_results(output_path, &reports).context("Failed to write results.")?;

    info!("Batch complete:");
    for report in &reports {
        info!("  {}", report.status_line());
    }

    Ok(())
}

/// The scenarios to run, in file order; all of them if no filter was given.
fn select_scenarios<'a>(model: &'a Model, filter: &[String]) -> Result<Vec<&'a Scenario>> {
    if filter.is_empty() {
        return Ok(model.scenarios.values().collect());
    }
    for id in filter {
        if !model.scenarios.contains_key(id.as_str()) {
            bail!("Unknown scenario `{id}`");
        }
    }
    Ok(model
        .scenarios
        .values()
        .filter(|scenario| filter.iter().any(|id| id.as_str() == &*scenario.id.0))
        .collect())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_dir: &Path) -> Result<()> {
    let settings = Settings::from_path(model_dir).context("Failed to load settings.")?;
    // No log files for a validation run
    log::init(settings.log_level.as_deref(), None).context("Failed to initialise logging.")?;

    let model = Model::from_path(model_dir).context("Failed to validate model.")?;
    // Assembling each scenario catches wiring problems a parse cannot see
    for scenario in model.scenarios.values() {
        crate::assembler::assemble(&model, scenario)
            .with_context(|| format!("Scenario `{}` cannot be assembled", scenario.id))?;
    }
    info!("Model validation successful!");

    Ok(())
}

/// Handle the `scenarios` command.
pub fn handle_scenarios_command(model_dir: &Path) -> Result<()> {
    let scenarios = crate::scenario::read_scenarios(model_dir)?;
    for scenario in scenarios.values() {
        match &scenario.description {
            Some(description) => println!("{}: {} - {description}", scenario.id, scenario.name),
            None => println!("{}: {}", scenario.id, scenario.name),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use rstest::rstest;

    #[rstest]
    fn test_select_scenarios(model: Model) {
        let all = select_scenarios(&model, &[]).unwrap();
        assert_eq!(all.len(), 1);

        let filtered = select_scenarios(&model, &["s1_baseline".to_string()]).unwrap();
        assert_eq!(filtered.len(), 1);

        assert!(select_scenarios(&model, &["nope".to_string()]).is_err());
    }
}
