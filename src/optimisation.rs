//! The problem formulator: turning a network into a linear program.
//!
//! The output is an abstract [`Problem`]: variables with bounds and objective
//! coefficients plus sparse linear constraints, with no solver types in sight.
//! The solver adapter translates it into backend form; tests can inspect it
//! directly.
//!
//! Variable layout, in insertion order:
//!
//! * one capacity variable per extendable asset;
//! * one dispatch variable per generator per snapshot;
//! * one flow variable per link per snapshot, on the reference (input) side;
//! * charge, discharge and state variables per store per snapshot.
//!
//! Constraints:
//!
//! * carrier balance: per bus per snapshot, net injection equals demand;
//! * capacity coupling: dispatch/flow/state cannot exceed the (variable)
//!   capacity, scaled by the capacity factor where one applies;
//! * storage continuity between consecutive snapshots, wrapping around the
//!   horizon for cyclic stores or pinned to the configured initial state.
//!
//! Non-extendable assets get their bounds folded directly into the variable
//! bounds, so they contribute no coupling rows.
use crate::network::{
    GeneratorId, LinkId, Network, StoreBoundary, StoreId,
};
use indexmap::IndexMap;

/// A key identifying one decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKey {
    /// Total installed capacity of an extendable generator
    GeneratorCapacity(GeneratorId),
    /// Total installed capacity of an extendable link (reference flow)
    LinkCapacity(LinkId),
    /// Total installed energy capacity of an extendable store
    StoreCapacity(StoreId),
    /// Generator output at a snapshot
    Dispatch(GeneratorId, usize),
    /// Link reference flow at a snapshot
    Flow(LinkId, usize),
    /// Energy drawn from the bus into a store at a snapshot
    Charge(StoreId, usize),
    /// Energy withdrawn from a store at a snapshot, before losses
    Discharge(StoreId, usize),
    /// Store state at the end of a snapshot
    State(StoreId, usize),
}

/// Bounds and objective coefficient for one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    /// The variable's minimum value
    pub min: f64,
    /// The variable's maximum value
    pub max: f64,
    /// The coefficient of the variable in the objective
    pub objective: f64,
}

/// A linear constraint `min <= sum(coefficient * variable) <= max`.
///
/// Terms are sparse: variables are referenced by their column index in the
/// problem's insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// The constraint's lower bound
    pub min: f64,
    /// The constraint's upper bound
    pub max: f64,
    /// `(column, coefficient)` pairs
    pub terms: Vec<(usize, f64)>,
}

impl Constraint {
    fn equality(rhs: f64, terms: Vec<(usize, f64)>) -> Constraint {
        Constraint {
            min: rhs,
            max: rhs,
            terms,
        }
    }

    fn at_most(max: f64, terms: Vec<(usize, f64)>) -> Constraint {
        Constraint {
            min: f64::NEG_INFINITY,
            max,
            terms,
        }
    }
}

/// An abstract linear program, independent of any solver backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Problem {
    variables: IndexMap<VariableKey, VariableDefinition>,
    constraints: Vec<Constraint>,
}

impl Problem {
    fn add_variable(&mut self, key: VariableKey, definition: VariableDefinition) -> usize {
        let (index, previous) = self.variables.insert_full(key, definition);
        assert!(previous.is_none(), "Duplicate variable {key:?}");
        index
    }

    /// The column index of a variable, if it exists in this problem.
    pub fn index_of(&self, key: &VariableKey) -> Option<usize> {
        self.variables.get_index_of(key)
    }

    /// The number of variables.
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Variable definitions in column order.
    pub fn variables(&self) -> impl Iterator<Item = (&VariableKey, &VariableDefinition)> {
        self.variables.iter()
    }

    /// The constraints, in insertion order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Evaluate the objective at the given column values.
    ///
    /// Used instead of the backend's reported objective so the figure is
    /// reproducible from the problem itself.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .values()
            .zip(values)
            .map(|(definition, value)| definition.objective * value)
            .sum()
    }
}

/// Formulate the linear program for a network.
pub fn formulate(network: &Network) -> Problem {
    let mut problem = Problem::default();
    add_capacity_variables(&mut problem, network);
    add_dispatch_variables(&mut problem, network);
    add_capacity_coupling_constraints(&mut problem, network);
    add_balance_constraints(&mut problem, network);
    add_storage_continuity_constraints(&mut problem, network);
    problem
}

fn add_capacity_variables(problem: &mut Problem, network: &Network) {
    for (id, generator) in network.iter_generators() {
        if generator.extendable {
            problem.add_variable(
                VariableKey::GeneratorCapacity(id),
                VariableDefinition {
                    min: generator.existing_capacity,
                    max: generator.max_capacity,
                    objective: generator.capital_cost,
                },
            );
        }
    }
    for (id, link) in network.iter_links() {
        if link.extendable {
            problem.add_variable(
                VariableKey::LinkCapacity(id),
                VariableDefinition {
                    min: link.existing_capacity,
                    max: link.max_capacity,
                    objective: link.capital_cost,
                },
            );
        }
    }
    for (id, store) in network.iter_stores() {
        if store.extendable {
            problem.add_variable(
                VariableKey::StoreCapacity(id),
                VariableDefinition {
                    min: store.existing_capacity,
                    max: store.max_capacity,
                    objective: store.capital_cost,
                },
            );
        }
    }
}

fn add_dispatch_variables(problem: &mut Problem, network: &Network) {
    for (id, generator) in network.iter_generators() {
        for t in network.snapshots.iter() {
            // For a fixed generator the capacity bound goes straight onto the
            // variable; extendable generators get a coupling row instead
            let max = if generator.extendable {
                f64::INFINITY
            } else {
                generator.capacity_factor.get(t) * generator.existing_capacity
            };
            problem.add_variable(
                VariableKey::Dispatch(id, t),
                VariableDefinition {
                    min: 0.0,
                    max,
                    objective: generator.marginal_cost,
                },
            );
        }
    }
    for (id, link) in network.iter_links() {
        for t in network.snapshots.iter() {
            let mut max = if link.extendable {
                f64::INFINITY
            } else {
                link.existing_capacity
            };
            if let Some(limit) = &link.max_flow {
                max = max.min(limit.get(t));
            }
            problem.add_variable(
                VariableKey::Flow(id, t),
                VariableDefinition {
                    min: 0.0,
                    max,
                    objective: link.marginal_cost,
                },
            );
        }
    }
    for (id, store) in network.iter_stores() {
        for t in network.snapshots.iter() {
            problem.add_variable(
                VariableKey::Charge(id, t),
                VariableDefinition {
                    min: 0.0,
                    max: f64::INFINITY,
                    objective: 0.0,
                },
            );
            problem.add_variable(
                VariableKey::Discharge(id, t),
                VariableDefinition {
                    min: 0.0,
                    max: f64::INFINITY,
                    objective: store.marginal_cost,
                },
            );
            let max = if store.extendable {
                f64::INFINITY
            } else {
                store.existing_capacity
            };
            problem.add_variable(
                VariableKey::State(id, t),
                VariableDefinition {
                    min: 0.0,
                    max,
                    objective: 0.0,
                },
            );
        }
    }
}

/// Tie dispatch, flow and state to the capacity variables of extendable assets.
fn add_capacity_coupling_constraints(problem: &mut Problem, network: &Network) {
    for (id, generator) in network.iter_generators() {
        if !generator.extendable {
            continue;
        }
        let capacity = problem
            .index_of(&VariableKey::GeneratorCapacity(id))
            .unwrap();
        for t in network.snapshots.iter() {
            let dispatch = problem.index_of(&VariableKey::Dispatch(id, t)).unwrap();
            let constraint = Constraint::at_most(
                0.0,
                vec![(dispatch, 1.0), (capacity, -generator.capacity_factor.get(t))],
            );
            problem.constraints.push(constraint);
        }
    }
    for (id, link) in network.iter_links() {
        if !link.extendable {
            continue;
        }
        let capacity = problem.index_of(&VariableKey::LinkCapacity(id)).unwrap();
        for t in network.snapshots.iter() {
            let flow = problem.index_of(&VariableKey::Flow(id, t)).unwrap();
            let constraint = Constraint::at_most(0.0, vec![(flow, 1.0), (capacity, -1.0)]);
            problem.constraints.push(constraint);
        }
    }
    for (id, store) in network.iter_stores() {
        if !store.extendable {
            continue;
        }
        let capacity = problem.index_of(&VariableKey::StoreCapacity(id)).unwrap();
        for t in network.snapshots.iter() {
            let state = problem.index_of(&VariableKey::State(id, t)).unwrap();
            let constraint = Constraint::at_most(0.0, vec![(state, 1.0), (capacity, -1.0)]);
            problem.constraints.push(constraint);
        }
    }
}

/// One equality row per bus per snapshot: net injection equals demand.
fn add_balance_constraints(problem: &mut Problem, network: &Network) {
    for (bus_id, _) in network.iter_buses() {
        for t in network.snapshots.iter() {
            let mut terms = Vec::new();

            for (id, generator) in network.iter_generators() {
                if generator.bus == bus_id {
                    let column = problem.index_of(&VariableKey::Dispatch(id, t)).unwrap();
                    terms.push((column, 1.0));
                }
            }
            for (id, link) in network.iter_links() {
                let column = problem.index_of(&VariableKey::Flow(id, t)).unwrap();
                let mut coefficient = 0.0;
                if link.input == bus_id {
                    coefficient -= 1.0;
                }
                for output in &link.outputs {
                    if output.bus == bus_id {
                        coefficient += output.efficiency;
                    }
                }
                if coefficient != 0.0 {
                    terms.push((column, coefficient));
                }
            }
            for (id, store) in network.iter_stores() {
                if store.bus == bus_id {
                    let charge = problem.index_of(&VariableKey::Charge(id, t)).unwrap();
                    let discharge = problem.index_of(&VariableKey::Discharge(id, t)).unwrap();
                    terms.push((charge, -1.0));
                    terms.push((discharge, store.discharge_efficiency));
                }
            }

            let demand: f64 = network
                .iter_loads()
                .filter(|(_, load)| load.bus == bus_id)
                .map(|(_, load)| load.demand.get(t))
                .sum();

            if terms.is_empty() && demand == 0.0 {
                continue;
            }
            problem.constraints.push(Constraint::equality(demand, terms));
        }
    }
}

/// State evolution: `state[t] = (1 - loss) * state[t-1] + eff * charge[t] - discharge[t]`.
///
/// The `t = 0` row wraps to the final snapshot for cyclic stores, which makes
/// the state trajectory conserve energy over the whole horizon; for a fixed
/// initial condition the prior state is a constant on the right-hand side.
fn add_storage_continuity_constraints(problem: &mut Problem, network: &Network) {
    for (id, store) in network.iter_stores() {
        let carry_over = 1.0 - store.standing_loss;
        for t in network.snapshots.iter() {
            let state = problem.index_of(&VariableKey::State(id, t)).unwrap();
            let charge = problem.index_of(&VariableKey::Charge(id, t)).unwrap();
            let discharge = problem.index_of(&VariableKey::Discharge(id, t)).unwrap();
            let mut terms = vec![
                (state, 1.0),
                (charge, -store.charge_efficiency),
                (discharge, 1.0),
            ];

            let mut rhs = 0.0;
            if t > 0 {
                let previous = problem.index_of(&VariableKey::State(id, t - 1)).unwrap();
                terms.push((previous, -carry_over));
            } else {
                match store.boundary {
                    StoreBoundary::Cyclic => {
                        let last = network.snapshots.len() - 1;
                        if last > 0 {
                            let previous =
                                problem.index_of(&VariableKey::State(id, last)).unwrap();
                            terms.push((previous, -carry_over));
                        } else {
                            // Single-snapshot horizon: the store wraps onto itself
                            terms[0].1 -= carry_over;
                        }
                    }
                    StoreBoundary::Initial(initial) => {
                        rhs = carry_over * initial;
                    }
                }
            }
            problem.constraints.push(Constraint::equality(rhs, terms));
        }
    }
}
