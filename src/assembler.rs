//! Wiring the installation into a network, once per scenario.
//!
//! The assembler owns every technology-specific decision: which buses exist,
//! how each technology attaches to them, and how raw table parameters become
//! annualised costs and per-snapshot bounds. Downstream stages see only the
//! generic network types.
//!
//! Derived physical parameters (conversion efficiencies, the wind ramp, the
//! biogas yield) are fixed constants of the installation; the technology
//! table supplies costs and capacity bounds, and the scenario supplies
//! multipliers. A technology disabled by the scenario is omitted entirely
//! rather than capped at zero, so the solver never reports phantom near-zero
//! builds for it.
use crate::finance::annual_capital_cost;
use crate::id::TechnologyID;
use crate::model::Model;
use crate::network::graph::validate_loads_servable;
use crate::network::{
    AssemblyError, Carrier, Generator, GeneratorId, Link, LinkId, LinkOutput, Load, Network,
    Series, Store, StoreBoundary, StoreId,
};
use crate::scenario::Scenario;
use crate::technology::{Technology, TechnologyMap};
use crate::units::{Dimensionless, MoneyPerCapacity};
use indexmap::IndexMap;
use log::debug;

// Wind ramp: zero output below cut-in, full output at rated speed.
const WIND_CUT_IN_SPEED_MS: f64 = 3.0;
const WIND_RATED_SPEED_MS: f64 = 12.0;
// The paired bladeless units produce 40% of the horizontal-axis output; the
// installed fleet is half of each, so the blended capacity factor is 0.7x.
const BLADELESS_OUTPUT_RATIO: f64 = 0.4;

const BATTERY_CHARGE_EFFICIENCY: f64 = 0.90;
const BATTERY_DISCHARGE_EFFICIENCY: f64 = 0.90;
const BATTERY_STANDING_LOSS_PER_HOUR: f64 = 0.001;

const GAS_TURBINE_ELECTRIC_EFFICIENCY: f64 = 0.30;
const GAS_TURBINE_HEAT_EFFICIENCY: f64 = 0.50;
const GAS_BOILER_EFFICIENCY: f64 = 0.85;
const BIOGAS_ELECTRIC_EFFICIENCY: f64 = 0.35;

/// Fuel-equivalent energy recoverable per ton of biomass feedstock
const BIOGAS_YIELD_KWH_PER_TON: f64 = 100.0;

/// Headroom of the gas supply connection over the peak availability
const GAS_SUPPLY_CAPACITY_MARGIN: f64 = 1.2;

/// Fixed rating of the grid connection (kW)
const GRID_MAX_IMPORT_KW: f64 = 500.0;

/// Water delivered per unit of pumping electricity (m3 per kWh)
const WATER_PUMP_M3_PER_KWH: f64 = 0.75;

/// Capacity of the atmosphere sink on the carbon bus (kg); effectively
/// unbounded
const ATMOSPHERE_CAPACITY_KG: f64 = 1e15;

/// A handle to one sizable asset in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRef {
    /// A generator
    Generator(GeneratorId),
    /// A link; capacity refers to the reference (input) flow
    Link(LinkId),
    /// A store; capacity is energy capacity
    Store(StoreId),
}

/// Handles to the fuel supply generators, for emissions and fuel accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuelSupplies {
    /// Pipeline gas purchases (kWh fuel)
    pub gas: Option<GeneratorId>,
    /// Grid imports (kWh)
    pub grid: Option<GeneratorId>,
    /// Biogas production (kWh fuel-equivalent)
    pub biogas: Option<GeneratorId>,
}

/// The assembled network plus the handles the result extractor needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Installation {
    /// The wired network
    pub network: Network,
    /// Sizable assets keyed by technology, in assembly order
    pub capacity_assets: IndexMap<TechnologyID, AssetRef>,
    /// Fuel supply handles
    pub fuel_supplies: FuelSupplies,
}

fn technology<'a>(
    technologies: &'a TechnologyMap,
    id: &str,
) -> Result<&'a Technology, AssemblyError> {
    technologies
        .get(id)
        .ok_or_else(|| AssemblyError::UnknownTechnology(id.into()))
}

/// The capacity factor of the blended wind fleet at a given wind speed.
pub fn wind_capacity_factor(wind_speed: f64) -> f64 {
    let hawt = ((wind_speed - WIND_CUT_IN_SPEED_MS)
        / (WIND_RATED_SPEED_MS - WIND_CUT_IN_SPEED_MS))
        .clamp(0.0, 1.0);
    hawt * (1.0 + BLADELESS_OUTPUT_RATIO) / 2.0
}

/// Build the network and asset handles for one scenario.
///
/// The scenario is applied to a copy of the base dataset first; the model's
/// own inputs are never mutated.
pub fn assemble(model: &Model, scenario: &Scenario) -> Result<Installation, AssemblyError> {
    let snapshots = &model.snapshots;
    let dataset = scenario.apply_to_dataset(&model.dataset, snapshots);
    dataset.validate(snapshots)?;

    let config = &model.config;
    let horizon = config.model.planning_horizon_years;
    let discount_rate = config.model.discount_rate;
    let annualised = |capex: f64, lifetime: u32| {
        annual_capital_cost(
            MoneyPerCapacity(capex),
            lifetime,
            Dimensionless(discount_rate),
        )
        .0
    };

    // Emission intensities in tons per kWh; t/MWh is numerically kg/kWh, which
    // is what the carbon bus carries
    let gas_co2_per_kwh = config.emissions.gas_tons_co2_per_mwh / 1000.0;
    let grid_co2_per_kwh = config.emissions.grid_tons_co2_per_mwh / 1000.0;
    let carbon_tax = scenario.carbon_tax_per_ton;

    let mut network = Network::new(snapshots.clone());
    let mut capacity_assets = IndexMap::new();
    let mut fuel_supplies = FuelSupplies::default();

    let electricity = network.add_bus("electricity", Carrier::Electricity);
    let heat = network.add_bus("heat", Carrier::Heat);
    let water = network.add_bus("water", Carrier::Water);
    let gas = network.add_bus("gas", Carrier::Gas);
    let biogas = network.add_bus("biogas", Carrier::Biogas);
    let battery_bus = network.add_bus("battery", Carrier::Electricity);
    let carbon = network.add_bus("carbon", Carrier::Carbon);

    // Demands
    network.add_load(Load {
        name: "electricity demand".into(),
        bus: electricity,
        demand: Series::checked("electricity_demand", dataset.electricity_demand.clone(), snapshots)?,
    });
    network.add_load(Load {
        name: "heat demand".into(),
        bus: heat,
        demand: Series::checked("heat_demand", dataset.heat_demand.clone(), snapshots)?,
    });
    network.add_load(Load {
        name: "water demand".into(),
        bus: water,
        demand: Series::checked("water_demand", dataset.water_demand.clone(), snapshots)?,
    });

    // Wind fleet
    if scenario.is_enabled("wind_hawt") {
        let tech = technology(&model.technologies, "wind_hawt")?;
        let capex = tech.capex_per_unit * scenario.wind_capex_multiplier;
        let capacity_factor = dataset.wind_speed.iter().copied().map(wind_capacity_factor);
        let id = network.add_generator(Generator {
            name: "wind".into(),
            bus: electricity,
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            capacity_factor: Series::checked("wind_capacity_factor", capacity_factor.collect(), snapshots)?,
            capital_cost: annualised(capex, tech.lifetime_years) + tech.fixed_om_per_unit,
            overnight_cost: capex,
            fixed_om_cost: tech.fixed_om_per_unit,
            marginal_cost: tech.variable_om_per_unit,
            emission_factor: 0.0,
            renewable: true,
        });
        capacity_assets.insert(tech.technology.clone(), AssetRef::Generator(id));
    }

    // Battery: store on its own bus, charger and discharger links carry the
    // conversion losses
    if scenario.is_enabled("battery") {
        let tech = technology(&model.technologies, "battery")?;
        let capex = tech.capex_per_unit * scenario.battery_capex_multiplier;
        let id = network.add_store(Store {
            name: "battery".into(),
            bus: battery_bus,
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
            standing_loss: BATTERY_STANDING_LOSS_PER_HOUR,
            boundary: StoreBoundary::Cyclic,
            capital_cost: annualised(capex, tech.lifetime_years) + tech.fixed_om_per_unit,
            overnight_cost: capex,
            fixed_om_cost: tech.fixed_om_per_unit,
            marginal_cost: tech.variable_om_per_unit,
        });
        capacity_assets.insert(tech.technology.clone(), AssetRef::Store(id));

        network.add_link(Link {
            name: "battery charger".into(),
            input: electricity,
            outputs: vec![LinkOutput {
                bus: battery_bus,
                efficiency: BATTERY_CHARGE_EFFICIENCY,
            }],
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            max_flow: None,
            capital_cost: 0.0,
            overnight_cost: 0.0,
            fixed_om_cost: 0.0,
            marginal_cost: 0.0,
            renewable: false,
        });
        network.add_link(Link {
            name: "battery discharger".into(),
            input: battery_bus,
            outputs: vec![LinkOutput {
                bus: electricity,
                efficiency: BATTERY_DISCHARGE_EFFICIENCY,
            }],
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            max_flow: None,
            capital_cost: 0.0,
            overnight_cost: 0.0,
            fixed_om_cost: 0.0,
            marginal_cost: 0.0,
            renewable: false,
        });
    }

    // Gas supply and its consumers
    let gas_consumers =
        scenario.is_enabled("gas_turbine") || scenario.is_enabled("gas_boiler");
    let peak_gas = dataset.gas_availability.iter().copied().fold(0.0, f64::max);
    if gas_consumers && peak_gas > 0.0 {
        let capacity = peak_gas * GAS_SUPPLY_CAPACITY_MARGIN;
        let capacity_factor: Vec<f64> = dataset
            .gas_availability
            .iter()
            .map(|available| available / capacity)
            .collect();
        let gas_price = config.prices.escalated_gas_price(horizon) * scenario.gas_price_multiplier;
        let id = network.add_generator(Generator {
            name: "gas supply".into(),
            bus: gas,
            existing_capacity: capacity,
            extendable: false,
            max_capacity: capacity,
            capacity_factor: Series::checked("gas_availability", capacity_factor, snapshots)?,
            capital_cost: 0.0,
            overnight_cost: 0.0,
            fixed_om_cost: 0.0,
            marginal_cost: gas_price + carbon_tax * gas_co2_per_kwh,
            emission_factor: gas_co2_per_kwh,
            renewable: false,
        });
        fuel_supplies.gas = Some(id);
    }

    if scenario.is_enabled("gas_turbine") {
        let tech = technology(&model.technologies, "gas_turbine")?;
        let id = network.add_link(Link {
            name: "gas turbine".into(),
            input: gas,
            outputs: vec![
                LinkOutput {
                    bus: electricity,
                    efficiency: GAS_TURBINE_ELECTRIC_EFFICIENCY,
                },
                LinkOutput {
                    bus: heat,
                    efficiency: GAS_TURBINE_HEAT_EFFICIENCY,
                },
                LinkOutput {
                    bus: carbon,
                    efficiency: gas_co2_per_kwh * 1000.0,
                },
            ],
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            max_flow: None,
            capital_cost: annualised(tech.capex_per_unit, tech.lifetime_years)
                + tech.fixed_om_per_unit,
            overnight_cost: tech.capex_per_unit,
            fixed_om_cost: tech.fixed_om_per_unit,
            marginal_cost: tech.variable_om_per_unit,
            renewable: false,
        });
        capacity_assets.insert(tech.technology.clone(), AssetRef::Link(id));
    }

    if scenario.is_enabled("gas_boiler") {
        let tech = technology(&model.technologies, "gas_boiler")?;
        let id = network.add_link(Link {
            name: "gas boiler".into(),
            input: gas,
            outputs: vec![
                LinkOutput {
                    bus: heat,
                    efficiency: GAS_BOILER_EFFICIENCY,
                },
                LinkOutput {
                    bus: carbon,
                    efficiency: gas_co2_per_kwh * 1000.0,
                },
            ],
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            max_flow: None,
            capital_cost: annualised(tech.capex_per_unit, tech.lifetime_years)
                + tech.fixed_om_per_unit,
            overnight_cost: tech.capex_per_unit,
            fixed_om_cost: tech.fixed_om_per_unit,
            marginal_cost: tech.variable_om_per_unit,
            renewable: false,
        });
        capacity_assets.insert(tech.technology.clone(), AssetRef::Link(id));
    }

    // Biogas chain
    if scenario.is_enabled("biogas_generator") {
        let peak_biogas = dataset
            .biomass_availability
            .iter()
            .map(|tons| tons * BIOGAS_YIELD_KWH_PER_TON)
            .fold(0.0, f64::max);
        if peak_biogas > 0.0 {
            let capacity_factor: Vec<f64> = dataset
                .biomass_availability
                .iter()
                .map(|tons| tons * BIOGAS_YIELD_KWH_PER_TON / peak_biogas)
                .collect();
            let id = network.add_generator(Generator {
                name: "biogas supply".into(),
                bus: biogas,
                existing_capacity: peak_biogas,
                extendable: false,
                max_capacity: peak_biogas,
                capacity_factor: Series::checked("biomass_availability", capacity_factor, snapshots)?,
                capital_cost: 0.0,
                overnight_cost: 0.0,
                fixed_om_cost: 0.0,
                marginal_cost: config.prices.biogas_price_per_kwh,
                emission_factor: 0.0,
                renewable: true,
            });
            fuel_supplies.biogas = Some(id);
        }

        let tech = technology(&model.technologies, "biogas_generator")?;
        let id = network.add_link(Link {
            name: "biogas generator".into(),
            input: biogas,
            outputs: vec![LinkOutput {
                bus: electricity,
                efficiency: BIOGAS_ELECTRIC_EFFICIENCY,
            }],
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            max_flow: None,
            capital_cost: annualised(tech.capex_per_unit, tech.lifetime_years)
                + tech.fixed_om_per_unit,
            overnight_cost: tech.capex_per_unit,
            fixed_om_cost: tech.fixed_om_per_unit,
            marginal_cost: tech.variable_om_per_unit,
            renewable: true,
        });
        capacity_assets.insert(tech.technology.clone(), AssetRef::Link(id));
    }

    // Grid import
    if scenario.is_enabled("grid_import") {
        let grid_price =
            config.prices.escalated_grid_price(horizon) * scenario.grid_price_multiplier;
        let id = network.add_generator(Generator {
            name: "grid import".into(),
            bus: electricity,
            existing_capacity: GRID_MAX_IMPORT_KW,
            extendable: false,
            max_capacity: GRID_MAX_IMPORT_KW,
            capacity_factor: Series::checked(
                "grid_availability",
                scenario.grid_availability_series(snapshots),
                snapshots,
            )?,
            capital_cost: 0.0,
            overnight_cost: 0.0,
            fixed_om_cost: 0.0,
            marginal_cost: grid_price + carbon_tax * grid_co2_per_kwh,
            emission_factor: grid_co2_per_kwh,
            renewable: false,
        });
        fuel_supplies.grid = Some(id);
    }

    // Water chain: pump from groundwater into the water bus, tank for shifting
    if scenario.is_enabled("water_pump") {
        let tech = technology(&model.technologies, "water_pump")?;
        // The extraction limit is on delivered water; refer it to the
        // electrical input flow
        let max_flow: Vec<f64> = dataset
            .groundwater_availability
            .iter()
            .map(|limit| limit / WATER_PUMP_M3_PER_KWH)
            .collect();
        let id = network.add_link(Link {
            name: "water pump".into(),
            input: electricity,
            outputs: vec![LinkOutput {
                bus: water,
                efficiency: WATER_PUMP_M3_PER_KWH,
            }],
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            max_flow: Some(Series::checked("groundwater_availability", max_flow, snapshots)?),
            capital_cost: annualised(tech.capex_per_unit, tech.lifetime_years)
                + tech.fixed_om_per_unit,
            overnight_cost: tech.capex_per_unit,
            fixed_om_cost: tech.fixed_om_per_unit,
            marginal_cost: tech.variable_om_per_unit,
            renewable: false,
        });
        capacity_assets.insert(tech.technology.clone(), AssetRef::Link(id));
    }

    if scenario.is_enabled("water_tank") {
        let tech = technology(&model.technologies, "water_tank")?;
        let id = network.add_store(Store {
            name: "water tank".into(),
            bus: water,
            existing_capacity: 0.0,
            extendable: true,
            max_capacity: tech.max_capacity,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
            standing_loss: 0.0,
            boundary: StoreBoundary::Cyclic,
            capital_cost: annualised(tech.capex_per_unit, tech.lifetime_years)
                + tech.fixed_om_per_unit,
            overnight_cost: tech.capex_per_unit,
            fixed_om_cost: tech.fixed_om_per_unit,
            marginal_cost: tech.variable_om_per_unit,
        });
        capacity_assets.insert(tech.technology.clone(), AssetRef::Store(id));
    }

    // Atmosphere sink: absorbs whatever CO2 the combustion links emit
    network.add_store(Store {
        name: "atmosphere".into(),
        bus: carbon,
        existing_capacity: ATMOSPHERE_CAPACITY_KG,
        extendable: false,
        max_capacity: ATMOSPHERE_CAPACITY_KG,
        charge_efficiency: 1.0,
        discharge_efficiency: 1.0,
        standing_loss: 0.0,
        boundary: StoreBoundary::Initial(0.0),
        capital_cost: 0.0,
        overnight_cost: 0.0,
        fixed_om_cost: 0.0,
        marginal_cost: 0.0,
    });

    validate_loads_servable(&network)?;
    debug!(
        "Assembled network for scenario `{}`: {} buses, {} sizable assets",
        scenario.id,
        network.num_buses(),
        capacity_assets.len()
    );

    Ok(Installation {
        network,
        capacity_assets,
        fuel_supplies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{baseline_scenario, model};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(2.0, 0.0)] // below cut-in
    #[case(3.0, 0.0)]
    #[case(7.5, 0.35)] // midpoint of the ramp, blended down to 0.7
    #[case(12.0, 0.7)]
    #[case(20.0, 0.7)] // ramp saturates
    fn test_wind_capacity_factor(#[case] wind_speed: f64, #[case] expected: f64) {
        assert_approx_eq!(f64, wind_capacity_factor(wind_speed), expected, epsilon = 1e-12);
    }

    #[rstest]
    fn test_assemble_baseline(model: Model, baseline_scenario: Scenario) {
        let installation = assemble(&model, &baseline_scenario).unwrap();
        assert_eq!(installation.network.num_buses(), 7);
        assert_eq!(installation.capacity_assets.len(), 7);
        assert!(installation.fuel_supplies.gas.is_some());
        assert!(installation.fuel_supplies.grid.is_some());
        assert!(installation.fuel_supplies.biogas.is_some());

        // The gas turbine must emit into the carbon bus as its third output
        let AssetRef::Link(turbine) = installation.capacity_assets["gas_turbine"] else {
            panic!("gas turbine must be a link");
        };
        let turbine = installation.network.link(turbine);
        assert_eq!(turbine.outputs.len(), 3);
        assert_approx_eq!(
            f64,
            turbine.outputs[2].efficiency,
            model.config.emissions.gas_tons_co2_per_mwh,
            epsilon = 1e-12
        );
    }

    #[rstest]
    fn test_disabled_technology_is_omitted(model: Model, mut baseline_scenario: Scenario) {
        baseline_scenario.disabled_technologies = vec!["battery".to_string()];
        let installation = assemble(&model, &baseline_scenario).unwrap();
        assert!(!installation.capacity_assets.contains_key("battery"));
        assert!(
            installation
                .network
                .iter_links()
                .all(|(_, link)| !link.name.contains("battery"))
        );
    }

    #[rstest]
    fn test_unknown_technology_is_reported(mut model: Model, baseline_scenario: Scenario) {
        model.technologies.shift_remove("wind_hawt");
        let err = assemble(&model, &baseline_scenario).unwrap_err();
        assert!(matches!(err, AssemblyError::UnknownTechnology(id) if &*id.0 == "wind_hawt"));
    }

    #[rstest]
    fn test_carbon_tax_raises_fossil_marginals(model: Model, mut baseline_scenario: Scenario) {
        let untaxed = assemble(&model, &baseline_scenario).unwrap();
        baseline_scenario.carbon_tax_per_ton = 50.0;
        let taxed = assemble(&model, &baseline_scenario).unwrap();

        let gas_marginal = |installation: &Installation| {
            let id = installation.fuel_supplies.gas.unwrap();
            installation.network.generator(id).marginal_cost
        };
        let expected_rise = 50.0 * model.config.emissions.gas_tons_co2_per_mwh / 1000.0;
        assert_approx_eq!(
            f64,
            gas_marginal(&taxed) - gas_marginal(&untaxed),
            expected_rise,
            epsilon = 1e-12
        );
    }

    #[rstest]
    fn test_assembly_is_idempotent(model: Model, baseline_scenario: Scenario) {
        let first = assemble(&model, &baseline_scenario).unwrap();
        let second = assemble(&model, &baseline_scenario).unwrap();
        assert_eq!(first, second);
    }
}
