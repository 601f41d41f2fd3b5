//! The typed registry of carriers, buses and assets.
//!
//! A [`Network`] is assembled once per scenario and treated as immutable
//! afterwards: the formulator and the result extractor only ever read it.
//! Assets reference buses through dense index handles rather than string
//! lookup, so a mis-wired asset is a compile-time or assembly-time error, not
//! a silent imbalance.
use crate::id::TechnologyID;
use crate::snapshots::Snapshots;
use std::rc::Rc;
use strum::Display;

pub mod graph;

/// An energy or mass commodity carried by a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Carrier {
    /// Electrical energy (kWh)
    Electricity,
    /// Thermal energy (kWh)
    Heat,
    /// Potable water (m3)
    Water,
    /// Natural gas, fuel-equivalent (kWh)
    Gas,
    /// Biogas, fuel-equivalent (kWh)
    Biogas,
    /// Carbon dioxide (kg)
    Carbon,
}

macro_rules! define_handle_type {
    ($name:ident) => {
        /// A dense index handle into the network's asset tables.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_handle_type! {BusId}
define_handle_type! {GeneratorId}
define_handle_type! {LoadId}
define_handle_type! {LinkId}
define_handle_type! {StoreId}

/// Errors raised while assembling a network, before any solve attempt.
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// A time series does not cover the snapshot horizon exactly.
    #[error("series `{name}` has {actual} entries but the horizon has {expected} snapshots")]
    LengthMismatch {
        /// Name of the offending series
        name: String,
        /// Number of snapshots in the horizon
        expected: usize,
        /// Number of entries in the series
        actual: usize,
    },
    /// The installation references a technology missing from the table.
    #[error("unknown technology `{0}`")]
    UnknownTechnology(TechnologyID),
    /// A load sits on a bus with no upstream supply path.
    #[error("load `{load}` on bus `{bus}` cannot be served by any source")]
    UnservableLoad {
        /// Name of the load
        load: String,
        /// Name of the bus the load is attached to
        bus: String,
    },
}

/// A per-snapshot series of values, validated against the horizon length.
#[derive(Debug, Clone, PartialEq)]
pub struct Series(Vec<f64>);

impl Series {
    /// Wrap a vector of values, checking it is aligned 1:1 with the snapshots.
    pub fn checked(
        name: &str,
        values: Vec<f64>,
        snapshots: &Snapshots,
    ) -> Result<Series, AssemblyError> {
        if values.len() != snapshots.len() {
            return Err(AssemblyError::LengthMismatch {
                name: name.to_string(),
                expected: snapshots.len(),
                actual: values.len(),
            });
        }
        Ok(Series(values))
    }

    /// A series holding the same value at every snapshot.
    pub fn constant(value: f64, snapshots: &Snapshots) -> Series {
        Series(vec![value; snapshots.len()])
    }

    /// The value at the given snapshot.
    pub fn get(&self, index: usize) -> f64 {
        self.0[index]
    }

    /// The largest value in the series.
    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// The sum of the series.
    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Iterate over the values in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }
}

/// A node of one carrier where flow must balance at every snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    /// Human-readable name, e.g. "electricity"
    pub name: Rc<str>,
    /// The commodity carried by this bus
    pub carrier: Carrier,
}

/// A unidirectional source attached to one bus.
///
/// Created during assembly and immutable thereafter; the solved capacity lives
/// in the [`Solution`](crate::solver::Solution), not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    /// Human-readable name, e.g. "wind"
    pub name: Rc<str>,
    /// The bus this generator injects into
    pub bus: BusId,
    /// Capacity already installed
    pub existing_capacity: f64,
    /// Whether the optimiser may build additional capacity
    pub extendable: bool,
    /// Upper bound on total capacity
    pub max_capacity: f64,
    /// Per-snapshot output ceiling as a fraction of capacity (0-1)
    pub capacity_factor: Series,
    /// Annualised capital cost per unit capacity (CRF already applied)
    pub capital_cost: f64,
    /// Overnight capital cost per unit capacity, for the economics report
    pub overnight_cost: f64,
    /// Annual fixed O&M cost per unit capacity, for the economics report
    pub fixed_om_cost: f64,
    /// Cost per unit of output
    pub marginal_cost: f64,
    /// Tons of CO2 emitted per unit of output (fuel supplies and grid imports)
    pub emission_factor: f64,
    /// Whether output counts towards the renewable fraction
    pub renewable: bool,
}

/// A fixed demand sink on one bus. Not a decision variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    /// Human-readable name, e.g. "electricity demand"
    pub name: Rc<str>,
    /// The bus this load draws from
    pub bus: BusId,
    /// Per-snapshot demand
    pub demand: Series,
}

/// One output endpoint of a [`Link`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinkOutput {
    /// The bus receiving this output
    pub bus: BusId,
    /// Units delivered to `bus` per unit of reference (input) flow
    pub efficiency: f64,
}

/// A directional converter with one input bus and one or more output buses.
///
/// The input flow is the reference flow: capacity, availability and costs all
/// apply to it, and every output is a fixed ratio of it. A link with three
/// outputs (e.g. gas to electricity, heat and CO2) therefore has a single flow
/// variable per snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Human-readable name, e.g. "gas turbine"
    pub name: Rc<str>,
    /// The bus the reference flow leaves
    pub input: BusId,
    /// Ordered outputs; at least one
    pub outputs: Vec<LinkOutput>,
    /// Capacity already installed, on the reference flow
    pub existing_capacity: f64,
    /// Whether the optimiser may build additional capacity
    pub extendable: bool,
    /// Upper bound on reference-flow capacity
    pub max_capacity: f64,
    /// Optional absolute per-snapshot ceiling on the reference flow, e.g. a
    /// resource extraction limit
    pub max_flow: Option<Series>,
    /// Annualised capital cost per unit of reference-flow capacity
    pub capital_cost: f64,
    /// Overnight capital cost per unit of reference-flow capacity
    pub overnight_cost: f64,
    /// Annual fixed O&M cost per unit of reference-flow capacity
    pub fixed_om_cost: f64,
    /// Cost per unit of reference-flow throughput
    pub marginal_cost: f64,
    /// Whether delivered output counts towards the renewable fraction
    pub renewable: bool,
}

/// How a store's state is pinned at the horizon boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreBoundary {
    /// State at the final snapshot must equal state at the first
    Cyclic,
    /// State before the first snapshot is fixed to the given value
    Initial(f64),
}

/// A stateful reservoir on one bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    /// Human-readable name, e.g. "battery"
    pub name: Rc<str>,
    /// The bus this store charges from and discharges into
    pub bus: BusId,
    /// Energy capacity already installed
    pub existing_capacity: f64,
    /// Whether the optimiser may build additional capacity
    pub extendable: bool,
    /// Upper bound on energy capacity
    pub max_capacity: f64,
    /// Fraction of drawn energy that reaches the reservoir
    pub charge_efficiency: f64,
    /// Fraction of withdrawn energy that reaches the bus
    pub discharge_efficiency: f64,
    /// Fraction of state lost per hour
    pub standing_loss: f64,
    /// Boundary condition on the state trajectory
    pub boundary: StoreBoundary,
    /// Annualised capital cost per unit of energy capacity
    pub capital_cost: f64,
    /// Overnight capital cost per unit of energy capacity
    pub overnight_cost: f64,
    /// Annual fixed O&M cost per unit of energy capacity
    pub fixed_om_cost: f64,
    /// Cost per unit of energy discharged
    pub marginal_cost: f64,
}

/// The assembled installation: buses, assets and the snapshot horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    /// The time horizon all series are aligned to
    pub snapshots: Snapshots,
    buses: Vec<Bus>,
    generators: Vec<Generator>,
    loads: Vec<Load>,
    links: Vec<Link>,
    stores: Vec<Store>,
}

impl Network {
    /// An empty network over the given horizon.
    pub fn new(snapshots: Snapshots) -> Network {
        Network {
            snapshots,
            buses: Vec::new(),
            generators: Vec::new(),
            loads: Vec::new(),
            links: Vec::new(),
            stores: Vec::new(),
        }
    }

    /// Add a bus, returning its handle.
    pub fn add_bus(&mut self, name: &str, carrier: Carrier) -> BusId {
        self.buses.push(Bus {
            name: name.into(),
            carrier,
        });
        BusId(self.buses.len() - 1)
    }

    /// Add a generator, returning its handle.
    pub fn add_generator(&mut self, generator: Generator) -> GeneratorId {
        self.generators.push(generator);
        GeneratorId(self.generators.len() - 1)
    }

    /// Add a load, returning its handle.
    pub fn add_load(&mut self, load: Load) -> LoadId {
        self.loads.push(load);
        LoadId(self.loads.len() - 1)
    }

    /// Add a link, returning its handle.
    ///
    /// # Panics
    ///
    /// If the link has no outputs. The assembler always supplies at least one.
    pub fn add_link(&mut self, link: Link) -> LinkId {
        assert!(!link.outputs.is_empty(), "A link must have at least one output");
        self.links.push(link);
        LinkId(self.links.len() - 1)
    }

    /// Add a store, returning its handle.
    pub fn add_store(&mut self, store: Store) -> StoreId {
        self.stores.push(store);
        StoreId(self.stores.len() - 1)
    }

    /// Look up a bus by handle.
    pub fn bus(&self, id: BusId) -> &Bus {
        &self.buses[id.0]
    }

    /// Look up a generator by handle.
    pub fn generator(&self, id: GeneratorId) -> &Generator {
        &self.generators[id.0]
    }

    /// Look up a load by handle.
    pub fn load(&self, id: LoadId) -> &Load {
        &self.loads[id.0]
    }

    /// Look up a link by handle.
    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    /// Look up a store by handle.
    pub fn store(&self, id: StoreId) -> &Store {
        &self.stores[id.0]
    }

    /// Iterate over buses with their handles.
    pub fn iter_buses(&self) -> impl Iterator<Item = (BusId, &Bus)> {
        self.buses.iter().enumerate().map(|(i, b)| (BusId(i), b))
    }

    /// Iterate over generators with their handles.
    pub fn iter_generators(&self) -> impl Iterator<Item = (GeneratorId, &Generator)> {
        self.generators
            .iter()
            .enumerate()
            .map(|(i, g)| (GeneratorId(i), g))
    }

    /// Iterate over loads with their handles.
    pub fn iter_loads(&self) -> impl Iterator<Item = (LoadId, &Load)> {
        self.loads.iter().enumerate().map(|(i, l)| (LoadId(i), l))
    }

    /// Iterate over links with their handles.
    pub fn iter_links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter().enumerate().map(|(i, l)| (LinkId(i), l))
    }

    /// Iterate over stores with their handles.
    pub fn iter_stores(&self) -> impl Iterator<Item = (StoreId, &Store)> {
        self.stores
            .iter()
            .enumerate()
            .map(|(i, s)| (StoreId(i), s))
    }

    /// The number of buses in the network.
    pub fn num_buses(&self) -> usize {
        self.buses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshots(len: usize) -> Snapshots {
        Snapshots::new(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), len).unwrap()
    }

    #[test]
    fn test_series_checked_rejects_misaligned_data() {
        let snapshots = snapshots(24);
        assert!(Series::checked("demand", vec![1.0; 24], &snapshots).is_ok());

        let err = Series::checked("demand", vec![1.0; 23], &snapshots).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::LengthMismatch {
                expected: 24,
                actual: 23,
                ..
            }
        ));
    }

    #[test]
    fn test_series_accessors() {
        let snapshots = snapshots(3);
        let series = Series::checked("x", vec![1.0, 5.0, 2.0], &snapshots).unwrap();
        assert_eq!(series.get(1), 5.0);
        assert_eq!(series.max(), 5.0);
        assert_eq!(series.sum(), 8.0);

        let constant = Series::constant(2.0, &snapshots);
        assert_eq!(constant.sum(), 6.0);
    }

    #[test]
    fn test_bus_handles_are_stable() {
        let mut network = Network::new(snapshots(1));
        let elec = network.add_bus("electricity", Carrier::Electricity);
        let heat = network.add_bus("heat", Carrier::Heat);
        assert_eq!(network.bus(elec).carrier, Carrier::Electricity);
        assert_eq!(network.bus(heat).carrier, Carrier::Heat);
        assert_eq!(network.num_buses(), 2);
    }
}
