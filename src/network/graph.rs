//! Topology analysis of an assembled network.
//!
//! Two uses: rejecting a network whose loads can never be served, before any
//! solve attempt, and summarising the binding supply limits when a solve
//! comes back infeasible.
use super::{AssemblyError, BusId, Network};
use itertools::Itertools;
use petgraph::Directed;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{Graph, NodeIndex};

/// A graph of buses with an edge wherever flow can move between them
type BusGraph = Graph<BusId, (), Directed>;

/// Build the bus connectivity graph.
///
/// Nodes are buses, added in registry order so that `NodeIndex` and [`BusId`]
/// agree. Links contribute an edge from their input bus to every output bus;
/// stores contribute nothing, since a store cannot create supply.
fn build_bus_graph(network: &Network) -> BusGraph {
    let mut graph = BusGraph::new();
    for (id, _) in network.iter_buses() {
        graph.add_node(id);
    }
    for (_, link) in network.iter_links() {
        for output in &link.outputs {
            graph.add_edge(
                NodeIndex::new(link.input.0),
                NodeIndex::new(output.bus.0),
                (),
            );
        }
    }
    graph
}

/// Check that every load sits downstream of at least one generator.
///
/// A load on a bus that no generator feeds, directly or through a chain of
/// links, makes the whole problem trivially infeasible; failing here gives a
/// named error instead of an opaque solver status.
pub fn validate_loads_servable(network: &Network) -> Result<(), AssemblyError> {
    let graph = build_bus_graph(network);
    let source_buses: Vec<BusId> = network
        .iter_generators()
        .map(|(_, generator)| generator.bus)
        .unique()
        .collect();

    for (_, load) in network.iter_loads() {
        let servable = source_buses.iter().any(|&source| {
            has_path_connecting(
                &graph,
                NodeIndex::new(source.0),
                NodeIndex::new(load.bus.0),
                None,
            )
        });
        if !servable {
            return Err(AssemblyError::UnservableLoad {
                load: load.name.to_string(),
                bus: network.bus(load.bus).name.to_string(),
            });
        }
    }
    Ok(())
}

/// Summarise, per demand-carrying bus, how peak demand compares with the
/// largest deliverable supply.
///
/// This is a static bound, not a dispatch: it ignores competition between
/// buses for shared upstream capacity, so it can only ever understate how
/// tight the system is. It exists to give infeasible scenarios a readable
/// diagnosis (e.g. water demand against pumping capacity).
pub fn supply_limit_summary(network: &Network) -> Vec<String> {
    let mut lines = Vec::new();
    for (bus_id, bus) in network.iter_buses() {
        let peak_demand: f64 = network.snapshots.iter()
            .map(|t| {
                network
                    .iter_loads()
                    .filter(|(_, load)| load.bus == bus_id)
                    .map(|(_, load)| load.demand.get(t))
                    .sum()
            })
            .fold(0.0, f64::max);
        if peak_demand <= 0.0 {
            continue;
        }

        let generator_supply: f64 = network
            .iter_generators()
            .filter(|(_, generator)| generator.bus == bus_id)
            .map(|(_, generator)| generator.max_capacity * generator.capacity_factor.max())
            .sum();
        let link_supply: f64 = network
            .iter_links()
            .flat_map(|(_, link)| {
                link.outputs
                    .iter()
                    .filter(|output| output.bus == bus_id)
                    .map(|output| link.max_capacity * output.efficiency)
            })
            .sum();
        let max_supply = generator_supply + link_supply;

        if peak_demand > max_supply {
            lines.push(format!(
                "{} demand peaks at {peak_demand:.1} but at most {max_supply:.1} can be \
                 delivered to bus `{}`",
                bus.carrier, bus.name
            ));
        } else {
            lines.push(format!(
                "{} demand peaks at {peak_demand:.1} against a supply limit of {max_supply:.1} \
                 at bus `{}`",
                bus.carrier, bus.name
            ));
        }
    }
    lines
}
