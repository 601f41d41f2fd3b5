//! End-to-end checks of the formulate/solve pipeline on hand-built networks.
use chrono::NaiveDate;
use float_cmp::assert_approx_eq;
use nexusplan::network::{
    Carrier, Generator, Link, LinkOutput, Load, Network, Series, Store, StoreBoundary,
};
use nexusplan::optimisation::{Problem, VariableKey, formulate};
use nexusplan::snapshots::Snapshots;
use nexusplan::solver::{Solution, SolverConfig, SolverStatus, solve};

const TOLERANCE: f64 = 1e-6;

fn snapshots(len: usize) -> Snapshots {
    Snapshots::new(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), len).unwrap()
}

fn extendable_generator(bus: nexusplan::network::BusId, network: &Network) -> Generator {
    Generator {
        name: "generator".into(),
        bus,
        existing_capacity: 0.0,
        extendable: true,
        max_capacity: 100.0,
        capacity_factor: Series::constant(1.0, &network.snapshots),
        capital_cost: 1000.0,
        overnight_cost: 1000.0,
        fixed_om_cost: 0.0,
        marginal_cost: 0.0,
        emission_factor: 0.0,
        renewable: false,
    }
}

/// Every constraint of the problem must hold at the solution, within solver
/// tolerance. This covers the balance, capacity and continuity invariants in
/// one sweep.
fn assert_constraints_hold(problem: &Problem, solution: &Solution) {
    let values = solution.values().unwrap();
    for constraint in problem.constraints() {
        let activity: f64 = constraint
            .terms
            .iter()
            .map(|&(column, coefficient)| coefficient * values[column])
            .sum();
        assert!(
            activity >= constraint.min - TOLERANCE && activity <= constraint.max + TOLERANCE,
            "constraint violated: {} <= {activity} <= {}",
            constraint.min,
            constraint.max
        );
    }
}

#[test]
fn sizing_a_single_generator_to_flat_demand() {
    let mut network = Network::new(snapshots(24));
    let bus = network.add_bus("electricity", Carrier::Electricity);
    let generator = extendable_generator(bus, &network);
    let id = network.add_generator(generator);
    network.add_load(Load {
        name: "demand".into(),
        bus,
        demand: Series::constant(50.0, &network.snapshots),
    });

    let problem = formulate(&network);
    let solution = solve(&problem, &SolverConfig::default());
    assert_eq!(solution.status, SolverStatus::Optimal);
    assert_approx_eq!(f64, solution.objective.unwrap(), 50_000.0, epsilon = 1e-4);

    let values = solution.values().unwrap();
    let capacity = problem.index_of(&VariableKey::GeneratorCapacity(id)).unwrap();
    assert_approx_eq!(f64, values[capacity], 50.0, epsilon = TOLERANCE);
    assert_constraints_hold(&problem, &solution);
}

#[test]
fn storage_shaves_an_alternating_peak() {
    let mut network = Network::new(snapshots(24));
    let bus = network.add_bus("electricity", Carrier::Electricity);
    let generator = extendable_generator(bus, &network);
    let generator_id = network.add_generator(generator);
    let store_id = network.add_store(Store {
        name: "store".into(),
        bus,
        existing_capacity: 20.0,
        extendable: false,
        max_capacity: 20.0,
        charge_efficiency: 1.0,
        discharge_efficiency: 1.0,
        standing_loss: 0.0,
        boundary: StoreBoundary::Cyclic,
        capital_cost: 0.0,
        overnight_cost: 0.0,
        fixed_om_cost: 0.0,
        marginal_cost: 0.0,
    });
    let demand: Vec<f64> = (0..24).map(|t| if t % 2 == 0 { 80.0 } else { 20.0 }).collect();
    network.add_load(Load {
        name: "demand".into(),
        bus,
        demand: Series::checked("demand", demand, &network.snapshots).unwrap(),
    });

    let problem = formulate(&network);
    let solution = solve(&problem, &SolverConfig::default());
    assert_eq!(solution.status, SolverStatus::Optimal);

    // The store can shift its full 20 units each period, so the generator is
    // sized to 60 instead of the 80 peak
    let values = solution.values().unwrap();
    let capacity = problem
        .index_of(&VariableKey::GeneratorCapacity(generator_id))
        .unwrap();
    assert_approx_eq!(f64, values[capacity], 60.0, epsilon = TOLERANCE);
    assert_approx_eq!(f64, solution.objective.unwrap(), 60_000.0, epsilon = 1e-4);

    // Cyclic behaviour: the state never exceeds the fixed 20-unit capacity
    for t in network.snapshots.iter() {
        let state = problem.index_of(&VariableKey::State(store_id, t)).unwrap();
        assert!(values[state] <= 20.0 + TOLERANCE);
        assert!(values[state] >= -TOLERANCE);
    }
    assert_constraints_hold(&problem, &solution);
}

#[test]
fn conversion_link_halves_into_electricity() {
    let len = 24;
    let mut network = Network::new(snapshots(len));
    let gas = network.add_bus("gas", Carrier::Gas);
    let electricity = network.add_bus("electricity", Carrier::Electricity);

    let supply_id = network.add_generator(Generator {
        name: "gas supply".into(),
        bus: gas,
        existing_capacity: 1e6,
        extendable: false,
        max_capacity: 1e6,
        capacity_factor: Series::constant(1.0, &network.snapshots),
        capital_cost: 0.0,
        overnight_cost: 0.0,
        fixed_om_cost: 0.0,
        marginal_cost: 10.0,
        emission_factor: 0.0,
        renewable: false,
    });
    let link_id = network.add_link(Link {
        name: "gas generator".into(),
        input: gas,
        outputs: vec![LinkOutput {
            bus: electricity,
            efficiency: 0.5,
        }],
        existing_capacity: 0.0,
        extendable: true,
        max_capacity: 1000.0,
        max_flow: None,
        capital_cost: 0.0,
        overnight_cost: 0.0,
        fixed_om_cost: 0.0,
        marginal_cost: 0.0,
        renewable: false,
    });
    network.add_load(Load {
        name: "demand".into(),
        bus: electricity,
        demand: Series::constant(10.0, &network.snapshots),
    });

    let problem = formulate(&network);
    let solution = solve(&problem, &SolverConfig::default());
    assert_eq!(solution.status, SolverStatus::Optimal);

    // Serving 10 units of electricity through a 50% link takes 20 units of
    // gas at every snapshot
    let values = solution.values().unwrap();
    for t in network.snapshots.iter() {
        let dispatch = problem.index_of(&VariableKey::Dispatch(supply_id, t)).unwrap();
        let flow = problem.index_of(&VariableKey::Flow(link_id, t)).unwrap();
        assert_approx_eq!(f64, values[dispatch], 20.0, epsilon = TOLERANCE);
        assert_approx_eq!(f64, values[flow], 20.0, epsilon = TOLERANCE);
    }
    assert_approx_eq!(
        f64,
        solution.objective.unwrap(),
        20.0 * 10.0 * len as f64,
        epsilon = 1e-4
    );
    assert_constraints_hold(&problem, &solution);
}

#[test]
fn resolving_an_identical_problem_is_deterministic() {
    let build = || {
        let mut network = Network::new(snapshots(24));
        let bus = network.add_bus("electricity", Carrier::Electricity);
        let mut generator = extendable_generator(bus, &network);
        generator.marginal_cost = 1.5;
        network.add_generator(generator);
        network.add_load(Load {
            name: "demand".into(),
            bus,
            demand: Series::constant(42.0, &network.snapshots),
        });
        network
    };

    let first = build();
    let second = build();
    assert_eq!(first, second);

    let solve_once = |network: &Network| {
        let problem = formulate(network);
        solve(&problem, &SolverConfig::default())
    };
    let a = solve_once(&first);
    let b = solve_once(&second);
    assert_eq!(a.status, SolverStatus::Optimal);
    assert_eq!(a.values().unwrap(), b.values().unwrap());
}
