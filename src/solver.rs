//! The solver adapter: the only backend-specific code in the crate.
//!
//! Infeasibility and timeouts are expected, analysable outcomes when sweeping
//! scenarios, so they come back as [`SolverStatus`] values; this module never
//! panics on a bad solve.
use crate::optimisation::Problem;
use highs::{HighsModelStatus, RowProblem, Sense};
use log::{debug, warn};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// The available solver backends.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
pub enum SolverKind {
    /// The HiGHS LP/MIP solver
    #[default]
    #[string = "highs"]
    Highs,
}

/// Options passed through to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverConfig {
    /// Which backend to use
    pub solver: SolverKind,
    /// Wall-clock limit in seconds; unlimited if unset
    pub time_limit: Option<f64>,
    /// Relative MIP gap tolerance; backend default if unset
    pub mip_rel_gap: Option<f64>,
}

/// The outcome category of a solve call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SolverStatus {
    /// An optimal solution was found
    #[strum(serialize = "optimal")]
    Optimal,
    /// The constraints cannot all be satisfied
    #[strum(serialize = "infeasible")]
    Infeasible,
    /// The time limit expired before optimality was proven
    #[strum(serialize = "timed_out")]
    TimedOut,
    /// Any other backend failure
    #[strum(serialize = "error")]
    Error,
}

/// The read-only result of one solve call.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// The outcome category
    pub status: SolverStatus,
    /// The objective value, present only on an optimal solve
    pub objective: Option<f64>,
    values: Option<Vec<f64>>,
}

impl Solution {
    /// A solution carrying only a failure status.
    pub fn failed(status: SolverStatus) -> Solution {
        Solution {
            status,
            objective: None,
            values: None,
        }
    }

    /// The column values in problem order, present only on an optimal solve.
    pub fn values(&self) -> Option<&[f64]> {
        self.values.as_deref()
    }
}

/// Solve an abstract problem with the configured backend.
///
/// The objective is recomputed from the problem's own coefficients rather
/// than read back from the backend, so it is reproducible independently of
/// solver internals.
pub fn solve(problem: &Problem, config: &SolverConfig) -> Solution {
    match config.solver {
        SolverKind::Highs => solve_highs(problem, config),
    }
}

fn solve_highs(problem: &Problem, config: &SolverConfig) -> Solution {
    let mut pb = RowProblem::default();

    let mut columns = Vec::with_capacity(problem.num_variables());
    for (_, definition) in problem.variables() {
        columns.push(pb.add_column(definition.objective, definition.min..=definition.max));
    }
    for constraint in problem.constraints() {
        let terms: Vec<_> = constraint
            .terms
            .iter()
            .map(|&(column, coefficient)| (columns[column], coefficient))
            .collect();
        pb.add_row(constraint.min..=constraint.max, terms);
    }

    let mut model = pb.optimise(Sense::Minimise);
    model.set_option("output_flag", false);
    if let Some(time_limit) = config.time_limit {
        model.set_option("time_limit", time_limit);
    }
    if let Some(gap) = config.mip_rel_gap {
        model.set_option("mip_rel_gap", gap);
    }

    let solved = model.solve();
    match solved.status() {
        HighsModelStatus::Optimal => {
            let values = solved.get_solution().columns().to_vec();
            let objective = problem.objective_value(&values);
            debug!("HiGHS solve optimal, objective {objective:.2}");
            Solution {
                status: SolverStatus::Optimal,
                objective: Some(objective),
                values: Some(values),
            }
        }
        HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
            warn!("HiGHS reports the problem is infeasible");
            Solution::failed(SolverStatus::Infeasible)
        }
        HighsModelStatus::ReachedTimeLimit => {
            warn!("HiGHS hit the time limit before proving optimality");
            Solution::failed(SolverStatus::TimedOut)
        }
        status => {
            warn!("HiGHS returned unexpected status {status:?}");
            Solution::failed(SolverStatus::Error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Carrier, Generator, Load, Network, Series};
    use crate::optimisation::{VariableKey, formulate};
    use crate::snapshots::Snapshots;
    use chrono::NaiveDate;
    use float_cmp::assert_approx_eq;

    fn sized_generator_network(demand: f64, max_capacity: f64) -> Network {
        let snapshots = Snapshots::new(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), 24).unwrap();
        let mut network = Network::new(snapshots);
        let bus = network.add_bus("electricity", Carrier::Electricity);
        network.add_generator(Generator {
            name: "generator".into(),
            bus,
            existing_capacity: 0.0,
            extendable: true,
            max_capacity,
            capacity_factor: Series::constant(1.0, &network.snapshots),
            capital_cost: 1000.0,
            overnight_cost: 1000.0,
            fixed_om_cost: 0.0,
            marginal_cost: 0.0,
            emission_factor: 0.0,
            renewable: false,
        });
        network.add_load(Load {
            name: "demand".into(),
            bus,
            demand: Series::constant(demand, &network.snapshots),
        });
        network
    }

    #[test]
    fn test_solve_sizes_generator_to_demand() {
        let network = sized_generator_network(50.0, 100.0);
        let problem = formulate(&network);
        let solution = solve(&problem, &SolverConfig::default());

        assert_eq!(solution.status, SolverStatus::Optimal);
        assert_approx_eq!(f64, solution.objective.unwrap(), 50_000.0, epsilon = 1e-4);

        let (id, _) = network.iter_generators().next().unwrap();
        let capacity = problem.index_of(&VariableKey::GeneratorCapacity(id)).unwrap();
        let values = solution.values().unwrap();
        assert_approx_eq!(f64, values[capacity], 50.0, epsilon = 1e-6);
    }

    #[test]
    fn test_infeasible_is_a_status_not_a_panic() {
        let network = sized_generator_network(1000.0, 10.0);
        let problem = formulate(&network);
        let solution = solve(&problem, &SolverConfig::default());

        assert_eq!(solution.status, SolverStatus::Infeasible);
        assert!(solution.objective.is_none());
        assert!(solution.values().is_none());
    }
}
