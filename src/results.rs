//! Turning a solved problem back into engineering and economic figures.
//!
//! Everything here is a pure function of the solution, the installation and
//! the model configuration; rerunning extraction on the same inputs gives the
//! same record.
//!
//! When the horizon is shorter than a full year, annual figures are scaled by
//! `8760 / T`. This assumes the modelled window is representative of the
//! whole year, which is an approximation, not a correct seasonal
//! annualisation; it is kept because the comparison across scenarios uses the
//! same window throughout.
use crate::assembler::{AssetRef, Installation};
use crate::finance::{levelised_cost, npv_of_annual_cost};
use crate::id::{ScenarioID, TechnologyID};
use crate::model::ModelConfig;
use crate::network::{Carrier, Network};
use crate::optimisation::{Problem, VariableKey};
use crate::scenario::Scenario;
use crate::solver::{Solution, SolverStatus};
use crate::units::{Dimensionless, Energy, Money};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;

const HOURS_PER_YEAR: f64 = 8760.0;

/// Economic figures for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Economics {
    /// Total overnight capital cost of the optimal build
    pub total_capex_usd: f64,
    /// Operating cost for one representative year, fixed O&M included
    pub annual_opex_usd: f64,
    /// Present value of the operating costs over the planning horizon
    pub npv_opex_usd: f64,
    /// Capital plus discounted operating costs
    pub total_npv_usd: f64,
    /// Levelised cost of delivered energy; `None` if no energy was served
    pub lcoe_usd_per_mwh: Option<f64>,
}

/// Operational figures for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Operations {
    /// Annual delivered energy per source (kWh)
    pub generation_kwh: IndexMap<String, f64>,
    /// Share of delivered energy from renewable sources (percent)
    pub renewable_fraction_pct: f64,
}

/// Annual CO2 emissions for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Emissions {
    /// From gas combustion (tons per year)
    pub gas_tons_co2: f64,
    /// Attributed to grid imports (tons per year)
    pub grid_tons_co2: f64,
    /// Total (tons per year)
    pub total_tons_co2: f64,
}

/// The complete result record for one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    /// The scenario this record belongs to
    pub scenario_id: ScenarioID,
    /// Human-readable scenario name
    pub scenario_name: String,
    /// Optimal installed capacity per technology
    pub optimal_capacities: IndexMap<TechnologyID, f64>,
    /// Cost figures
    pub economics: Economics,
    /// Generation and renewables figures
    pub operations: Operations,
    /// Emissions figures
    pub emissions: Emissions,
}

fn variable_value(problem: &Problem, values: &[f64], key: VariableKey) -> Result<f64> {
    let index = problem
        .index_of(&key)
        .with_context(|| format!("Variable {key:?} missing from the problem"))?;
    Ok(values[index])
}

fn asset_capacity(
    network: &Network,
    problem: &Problem,
    values: &[f64],
    asset: AssetRef,
) -> Result<f64> {
    match asset {
        AssetRef::Generator(id) => {
            let generator = network.generator(id);
            if generator.extendable {
                variable_value(problem, values, VariableKey::GeneratorCapacity(id))
            } else {
                Ok(generator.existing_capacity)
            }
        }
        AssetRef::Link(id) => {
            let link = network.link(id);
            if link.extendable {
                variable_value(problem, values, VariableKey::LinkCapacity(id))
            } else {
                Ok(link.existing_capacity)
            }
        }
        AssetRef::Store(id) => {
            let store = network.store(id);
            if store.extendable {
                variable_value(problem, values, VariableKey::StoreCapacity(id))
            } else {
                Ok(store.existing_capacity)
            }
        }
    }
}

/// Total dispatch of a generator over the horizon.
fn total_dispatch(
    network: &Network,
    problem: &Problem,
    values: &[f64],
    id: crate::network::GeneratorId,
) -> Result<f64> {
    network
        .snapshots
        .iter()
        .map(|t| variable_value(problem, values, VariableKey::Dispatch(id, t)))
        .sum()
}

/// Total delivered energy of a link into energy-carrier buses over the horizon.
fn total_delivered(
    network: &Network,
    problem: &Problem,
    values: &[f64],
    id: crate::network::LinkId,
) -> Result<f64> {
    let link = network.link(id);
    let energy_yield: f64 = link
        .outputs
        .iter()
        .filter(|output| {
            matches!(
                network.bus(output.bus).carrier,
                Carrier::Electricity | Carrier::Heat
            )
        })
        .map(|output| output.efficiency)
        .sum();
    let total_flow: f64 = network
        .snapshots
        .iter()
        .map(|t| variable_value(problem, values, VariableKey::Flow(id, t)))
        .sum::<Result<f64>>()?;
    Ok(total_flow * energy_yield)
}

/// Build the result record for an optimally-solved scenario.
///
/// Calling this with a non-optimal solution is a contract violation; the
/// orchestrator's state machine prevents it.
pub fn extract_results(
    installation: &Installation,
    problem: &Problem,
    solution: &Solution,
    config: &ModelConfig,
    scenario: &Scenario,
) -> Result<ScenarioResult> {
    ensure!(
        solution.status == SolverStatus::Optimal,
        "Results can only be extracted from an optimal solution (status was {})",
        solution.status
    );
    let values = solution
        .values()
        .context("Optimal solution is missing column values")?;
    let objective = solution
        .objective
        .context("Optimal solution is missing an objective value")?;

    let network = &installation.network;
    let years = config.model.planning_horizon_years;
    let discount_rate = Dimensionless(config.model.discount_rate);
    let annualisation = HOURS_PER_YEAR / network.snapshots.len() as f64;

    // Capacities, capital costs and the annual fixed O&M bill
    let mut optimal_capacities = IndexMap::new();
    let mut total_capex = 0.0;
    let mut annual_fixed_om = 0.0;
    for (technology, &asset) in &installation.capacity_assets {
        let capacity = asset_capacity(network, problem, values, asset)?;
        let (overnight, fixed_om) = match asset {
            AssetRef::Generator(id) => {
                let generator = network.generator(id);
                (generator.overnight_cost, generator.fixed_om_cost)
            }
            AssetRef::Link(id) => {
                let link = network.link(id);
                (link.overnight_cost, link.fixed_om_cost)
            }
            AssetRef::Store(id) => {
                let store = network.store(id);
                (store.overnight_cost, store.fixed_om_cost)
            }
        };
        total_capex += capacity * overnight;
        annual_fixed_om += capacity * fixed_om;
        optimal_capacities.insert(technology.clone(), capacity);
    }

    // The capacity columns carry annualised capex plus fixed O&M in their
    // objective coefficients. Both are annual figures, so they are stripped
    // before the window marginals are scaled up, and the fixed O&M bill is
    // then added back untouched
    let capital_term: f64 = problem
        .variables()
        .zip(values)
        .filter(|((key, _), _)| {
            matches!(
                key,
                VariableKey::GeneratorCapacity(_)
                    | VariableKey::LinkCapacity(_)
                    | VariableKey::StoreCapacity(_)
            )
        })
        .map(|((_, definition), value)| definition.objective * value)
        .sum();
    let annual_opex = (objective - capital_term) * annualisation + annual_fixed_om;
    let npv_opex = npv_of_annual_cost(Money(annual_opex), years, discount_rate).0;
    let total_npv = total_capex + npv_opex;

    // Delivered energy per source
    let mut generation_kwh = IndexMap::new();
    let mut renewable_kwh = 0.0;
    for &asset in installation.capacity_assets.values() {
        match asset {
            AssetRef::Generator(id) => {
                let generator = network.generator(id);
                let delivered = total_dispatch(network, problem, values, id)? * annualisation;
                if generator.renewable {
                    renewable_kwh += delivered;
                }
                generation_kwh.insert(generator.name.to_string(), delivered);
            }
            AssetRef::Link(id) => {
                let link = network.link(id);
                let delivered = total_delivered(network, problem, values, id)? * annualisation;
                if delivered == 0.0 && link.outputs.iter().all(|output| {
                    !matches!(
                        network.bus(output.bus).carrier,
                        Carrier::Electricity | Carrier::Heat
                    )
                }) {
                    continue;
                }
                if link.renewable {
                    renewable_kwh += delivered;
                }
                generation_kwh.insert(link.name.to_string(), delivered);
            }
            AssetRef::Store(_) => {}
        }
    }
    if let Some(id) = installation.fuel_supplies.grid {
        let delivered = total_dispatch(network, problem, values, id)? * annualisation;
        generation_kwh.insert(network.generator(id).name.to_string(), delivered);
    }
    let total_generation: f64 = generation_kwh.values().sum();
    let renewable_fraction_pct = if total_generation > 0.0 {
        100.0 * renewable_kwh / total_generation
    } else {
        0.0
    };

    // Emissions from fuel supplies
    let annual_emissions = |supply: Option<crate::network::GeneratorId>| -> Result<f64> {
        match supply {
            Some(id) => {
                let fuel = total_dispatch(network, problem, values, id)?;
                Ok(fuel * network.generator(id).emission_factor * annualisation)
            }
            None => Ok(0.0),
        }
    };
    let gas_tons_co2 = annual_emissions(installation.fuel_supplies.gas)?;
    let grid_tons_co2 = annual_emissions(installation.fuel_supplies.grid)?;

    // LCOE over the energy actually served to the energy-carrier loads
    let annual_energy_served: f64 = network
        .iter_loads()
        .filter(|(_, load)| {
            matches!(
                network.bus(load.bus).carrier,
                Carrier::Electricity | Carrier::Heat
            )
        })
        .map(|(_, load)| load.demand.sum())
        .sum::<f64>()
        * annualisation;
    let lcoe_usd_per_mwh =
        levelised_cost(Money(total_npv), Energy(annual_energy_served), years)
            .map(|per_kwh| per_kwh.0 * 1000.0);

    Ok(ScenarioResult {
        scenario_id: scenario.id.clone(),
        scenario_name: scenario.name.clone(),
        optimal_capacities,
        economics: Economics {
            total_capex_usd: total_capex,
            annual_opex_usd: annual_opex,
            npv_opex_usd: npv_opex,
            total_npv_usd: total_npv,
            lcoe_usd_per_mwh,
        },
        operations: Operations {
            generation_kwh,
            renewable_fraction_pct,
        },
        emissions: Emissions {
            gas_tons_co2,
            grid_tons_co2,
            total_tons_co2: gas_tons_co2 + grid_tons_co2,
        },
    })
}
