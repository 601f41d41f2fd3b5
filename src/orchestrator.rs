//! Driving one scenario through assembly, solve and extraction.
//!
//! A [`ScenarioRun`] is scoped to exactly one scenario and walks the state
//! machine `Built -> Solved -> {Extracted | Failed}`. A non-optimal solver
//! status is data, not an error: it transitions the run to `Failed` with a
//! diagnosis, and a batch keeps going past it.
use crate::assembler::{Installation, assemble};
use crate::model::Model;
use crate::network::AssemblyError;
use crate::network::graph::supply_limit_summary;
use crate::optimisation::{Problem, formulate};
use crate::results::{ScenarioResult, extract_results};
use crate::scenario::Scenario;
use crate::solver::{Solution, SolverConfig, SolverStatus, solve};
use log::{error, info, warn};

/// Why a scenario run failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// The network could not be assembled from the inputs
    Assembly,
    /// The solver proved the constraints unsatisfiable
    Infeasible,
    /// The solver hit its time limit; retrying with a larger one may help
    TimedOut,
    /// The solver failed for another reason
    SolverError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureKind::Assembly => "assembly error",
            FailureKind::Infeasible => "infeasible",
            FailureKind::TimedOut => "timed out",
            FailureKind::SolverError => "solver error",
        };
        write!(f, "{label}")
    }
}

/// A structured failure reason, including any diagnosis lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    /// The failure category
    pub kind: FailureKind,
    /// Human-readable detail, e.g. the binding supply limits on infeasibility
    pub details: Vec<String>,
}

/// The current position of a run in its state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Assembled and formulated, not yet solved
    Built {
        /// The assembled installation
        installation: Installation,
        /// The formulated problem
        problem: Problem,
    },
    /// Solved, outcome not yet examined
    Solved {
        /// The assembled installation
        installation: Installation,
        /// The formulated problem
        problem: Problem,
        /// The solver's output
        solution: Solution,
    },
    /// Terminal: results extracted from an optimal solution
    Extracted(Box<ScenarioResult>),
    /// Terminal: no results for this scenario
    Failed(Failure),
}

/// One scenario's progress through the pipeline.
pub struct ScenarioRun<'a> {
    model: &'a Model,
    scenario: &'a Scenario,
    solver_config: SolverConfig,
    state: RunState,
}

impl<'a> ScenarioRun<'a> {
    /// Assemble and formulate, entering the `Built` state.
    pub fn build(
        model: &'a Model,
        scenario: &'a Scenario,
        solver_config: SolverConfig,
    ) -> Result<ScenarioRun<'a>, AssemblyError> {
        let installation = assemble(model, scenario)?;
        let problem = formulate(&installation.network);
        info!(
            "Scenario `{}`: formulated {} variables, {} constraints",
            scenario.id,
            problem.num_variables(),
            problem.constraints().len()
        );
        Ok(ScenarioRun {
            model,
            scenario,
            solver_config,
            state: RunState::Built {
                installation,
                problem,
            },
        })
    }

    /// The current state.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RunState::Extracted(_) | RunState::Failed(_))
    }

    /// Advance by one transition; terminal states are unchanged.
    pub fn step(mut self) -> ScenarioRun<'a> {
        self.state = match self.state {
            RunState::Built {
                installation,
                problem,
            } => {
                let solution = solve(&problem, &self.solver_config);
                RunState::Solved {
                    installation,
                    problem,
                    solution,
                }
            }
            RunState::Solved {
                installation,
                problem,
                solution,
            } => match solution.status {
                SolverStatus::Optimal => {
                    match extract_results(
                        &installation,
                        &problem,
                        &solution,
                        &self.model.config,
                        self.scenario,
                    ) {
                        Ok(result) => RunState::Extracted(Box::new(result)),
                        Err(err) => {
                            error!("Scenario `{}`: extraction failed: {err:#}", self.scenario.id);
                            RunState::Failed(Failure {
                                kind: FailureKind::SolverError,
                                details: vec![format!("{err:#}")],
                            })
                        }
                    }
                }
                status => {
                    let kind = match status {
                        SolverStatus::Infeasible => FailureKind::Infeasible,
                        SolverStatus::TimedOut => FailureKind::TimedOut,
                        _ => FailureKind::SolverError,
                    };
                    // A constraint-set summary makes an infeasible scenario
                    // diagnosable without rerunning anything
                    let details = if status == SolverStatus::Infeasible {
                        supply_limit_summary(&installation.network)
                    } else {
                        Vec::new()
                    };
                    warn!("Scenario `{}` failed: {status}", self.scenario.id);
                    RunState::Failed(Failure { kind, details })
                }
            },
            terminal => terminal,
        };
        self
    }

    /// Run the state machine to a terminal state and report.
    pub fn run_to_completion(mut self) -> ScenarioReport {
        while !self.is_terminal() {
            self = self.step();
        }
        let outcome = match self.state {
            RunState::Extracted(result) => Outcome::Completed(*result),
            RunState::Failed(failure) => Outcome::Failed(failure),
            _ => unreachable!("run is terminal"),
        };
        ScenarioReport {
            scenario_id: self.scenario.id.to_string(),
            scenario_name: self.scenario.name.clone(),
            outcome,
        }
    }
}

/// The terminal outcome of one scenario.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Results were extracted
    Completed(ScenarioResult),
    /// The run failed; no economics were computed
    Failed(Failure),
}

/// The per-scenario summary a batch returns.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    /// The scenario ID
    pub scenario_id: String,
    /// The scenario name
    pub scenario_name: String,
    /// What happened
    pub outcome: Outcome,
}

impl ScenarioReport {
    /// A one-line status for the end-of-batch summary.
    pub fn status_line(&self) -> String {
        match &self.outcome {
            Outcome::Completed(result) => format!(
                "{}: completed (total NPV {:.0} USD)",
                self.scenario_id, result.economics.total_npv_usd
            ),
            Outcome::Failed(failure) => {
                format!("{}: failed ({})", self.scenario_id, failure.kind)
            }
        }
    }
}

/// Run every given scenario in sequence, continuing past failures.
pub fn run_batch<'a>(
    model: &Model,
    scenarios: impl IntoIterator<Item = &'a Scenario>,
    solver_config: SolverConfig,
) -> Vec<ScenarioReport> {
    let mut reports = Vec::new();
    for scenario in scenarios {
        info!("Running scenario `{}` ({})", scenario.id, scenario.name);
        let report = match ScenarioRun::build(model, scenario, solver_config) {
            Ok(run) => run.run_to_completion(),
            Err(err) => {
                error!("Scenario `{}` could not be assembled: {err}", scenario.id);
                ScenarioReport {
                    scenario_id: scenario.id.to_string(),
                    scenario_name: scenario.name.clone(),
                    outcome: Outcome::Failed(Failure {
                        kind: FailureKind::Assembly,
                        details: vec![err.to_string()],
                    }),
                }
            }
        };
        reports.push(report);
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{baseline_scenario, model};
    use rstest::rstest;

    #[rstest]
    fn test_state_machine_reaches_extracted(model: Model, baseline_scenario: Scenario) {
        let run =
            ScenarioRun::build(&model, &baseline_scenario, SolverConfig::default()).unwrap();
        assert!(matches!(run.state(), RunState::Built { .. }));

        let run = run.step();
        assert!(matches!(run.state(), RunState::Solved { .. }));

        let run = run.step();
        assert!(matches!(run.state(), RunState::Extracted(_)));
        assert!(run.is_terminal());

        // Terminal states are fixed points
        let run = run.step();
        assert!(matches!(run.state(), RunState::Extracted(_)));
    }

    #[rstest]
    fn test_infeasible_scenario_fails_without_economics(
        model: Model,
        mut baseline_scenario: Scenario,
    ) {
        // Demand that nothing can serve: scale water demand far beyond the
        // pumping chain
        baseline_scenario.water_demand_multiplier = 1e6;

        let report = ScenarioRun::build(&model, &baseline_scenario, SolverConfig::default())
            .unwrap()
            .run_to_completion();
        let Outcome::Failed(failure) = &report.outcome else {
            panic!("expected a failed run");
        };
        assert_eq!(failure.kind, FailureKind::Infeasible);
        assert!(
            failure
                .details
                .iter()
                .any(|line| line.contains("water demand"))
        );
    }

    #[rstest]
    fn test_batch_continues_past_failures(model: Model, baseline_scenario: Scenario) {
        let mut broken = baseline_scenario.clone();
        broken.id = "broken".into();
        broken.water_demand_multiplier = 1e6;

        let reports = run_batch(
            &model,
            [&broken, &baseline_scenario],
            SolverConfig::default(),
        );
        assert_eq!(reports.len(), 2);
        assert!(matches!(reports[0].outcome, Outcome::Failed(_)));
        assert!(matches!(reports[1].outcome, Outcome::Completed(_)));
    }

    #[rstest]
    fn test_scenario_isolation(model: Model, baseline_scenario: Scenario) {
        let first = ScenarioRun::build(&model, &baseline_scenario, SolverConfig::default())
            .unwrap()
            .run_to_completion();

        let mut other = baseline_scenario.clone();
        other.id = "other".into();
        other.carbon_tax_per_ton = 100.0;
        let _ = ScenarioRun::build(&model, &other, SolverConfig::default())
            .unwrap()
            .run_to_completion();

        let again = ScenarioRun::build(&model, &baseline_scenario, SolverConfig::default())
            .unwrap()
            .run_to_completion();
        let (Outcome::Completed(first), Outcome::Completed(again)) =
            (&first.outcome, &again.outcome)
        else {
            panic!("expected completed runs");
        };
        assert_eq!(first.optimal_capacities, again.optimal_capacities);
    }
}
