//! Scenario records and their application to the base inputs.
//!
//! A scenario never mutates shared state: applying it yields a fresh copy of
//! the dataset, and assembly reads the scenario's multipliers directly. Two
//! scenarios can therefore be run back to back without any cross-talk.
use crate::id::ScenarioID;
use crate::input::read_toml;
use crate::snapshots::{DustSeverity, Season, SeasonalFactors, Snapshots};
use crate::timeseries::Dataset;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const SCENARIOS_FILE_NAME: &str = "scenarios.toml";

/// A map of scenarios keyed by ID, in file order.
pub type ScenarioMap = IndexMap<ScenarioID, Scenario>;

fn default_multiplier() -> f64 {
    1.0
}

fn default_dust_severity() -> DustSeverity {
    DustSeverity::Moderate
}

/// An immutable bundle of parameter overrides for one policy case.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    /// Unique identifier, e.g. "s2_winter_gas_shortage"
    pub id: ScenarioID,
    /// Human-readable name for reports
    pub name: String,
    /// Optional longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Seasonal scaling of pipeline gas availability
    #[serde(default)]
    pub gas_availability: SeasonalFactors,
    /// Seasonal scaling of grid import availability
    #[serde(default)]
    pub grid_availability: SeasonalFactors,
    /// Hours of day (0-23) during which grid imports are unavailable
    #[serde(default)]
    pub blackout_hours: Vec<u32>,
    /// Electricity demand multiplier, applied in summer only
    #[serde(default = "default_multiplier")]
    pub electricity_demand_multiplier: f64,
    /// Heat demand multiplier, applied in winter only
    #[serde(default = "default_multiplier")]
    pub heat_demand_multiplier: f64,
    /// Water demand multiplier, applied year-round
    #[serde(default = "default_multiplier")]
    pub water_demand_multiplier: f64,
    /// Scaling of the groundwater extraction limit
    #[serde(default = "default_multiplier")]
    pub water_availability_factor: f64,
    /// Gas price multiplier
    #[serde(default = "default_multiplier")]
    pub gas_price_multiplier: f64,
    /// Grid import price multiplier
    #[serde(default = "default_multiplier")]
    pub grid_price_multiplier: f64,
    /// Carbon tax (USD per ton CO2), folded into fossil marginal costs
    #[serde(default)]
    pub carbon_tax_per_ton: f64,
    /// Wind capital cost multiplier
    #[serde(default = "default_multiplier")]
    pub wind_capex_multiplier: f64,
    /// Battery capital cost multiplier
    #[serde(default = "default_multiplier")]
    pub battery_capex_multiplier: f64,
    /// Dust conditions affecting wind output
    #[serde(default = "default_dust_severity")]
    pub dust_severity: DustSeverity,
    /// Wind speed scaling applied when dust severity is not `moderate`
    #[serde(default = "default_multiplier")]
    pub dust_wind_factor: f64,
    /// Technologies omitted from the network entirely
    #[serde(default)]
    pub disabled_technologies: Vec<String>,
}

impl Scenario {
    /// Whether the given technology should be built into the network.
    pub fn is_enabled(&self, technology: &str) -> bool {
        !self
            .disabled_technologies
            .iter()
            .any(|name| name == technology)
    }

    /// Produce the dataset this scenario sees, leaving the base untouched.
    ///
    /// Seasonal rules follow the reference policy cases: the heat multiplier
    /// bites in winter, the electricity multiplier in summer, the water
    /// multiplier year-round. Dust scales wind speed only when severity
    /// departs from `moderate`, which the base wind data already reflects.
    pub fn apply_to_dataset(&self, base: &Dataset, snapshots: &Snapshots) -> Dataset {
        let mut dataset = base.clone();

        for t in snapshots.iter() {
            let season = snapshots.season(t);
            dataset.gas_availability[t] *= self.gas_availability.get(season);
            dataset.groundwater_availability[t] *= self.water_availability_factor;
            dataset.water_demand[t] *= self.water_demand_multiplier;
            if season == Season::Winter {
                dataset.heat_demand[t] *= self.heat_demand_multiplier;
            }
            if season == Season::Summer {
                dataset.electricity_demand[t] *= self.electricity_demand_multiplier;
            }
            if self.dust_severity != DustSeverity::Moderate {
                dataset.wind_speed[t] *= self.dust_wind_factor;
            }
        }

        dataset
    }

    /// The per-snapshot grid availability fraction (0-1).
    ///
    /// Seasonal factors apply first; blackout hours then force the fraction to
    /// zero regardless of season.
    pub fn grid_availability_series(&self, snapshots: &Snapshots) -> Vec<f64> {
        snapshots
            .iter()
            .map(|t| {
                if self.blackout_hours.contains(&snapshots.hour_of_day(t)) {
                    0.0
                } else {
                    self.grid_availability.get(snapshots.season(t))
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    scenario: Vec<Scenario>,
}

/// Read the scenario definitions from `scenarios.toml` in the model directory.
pub fn read_scenarios(model_dir: &Path) -> Result<ScenarioMap> {
    let file_path = model_dir.join(SCENARIOS_FILE_NAME);
    let file: ScenarioFile = read_toml(&file_path)?;

    let mut map = ScenarioMap::new();
    for scenario in file.scenario {
        validate_scenario(&scenario)
            .with_context(|| format!("Invalid scenario `{}`", scenario.id))?;
        let id = scenario.id.clone();
        ensure!(
            map.insert(id.clone(), scenario).is_none(),
            "Duplicate scenario `{id}` in {}",
            file_path.display()
        );
    }

    Ok(map)
}

fn validate_scenario(scenario: &Scenario) -> Result<()> {
    ensure!(
        scenario.carbon_tax_per_ton >= 0.0,
        "carbon_tax_per_ton cannot be negative"
    );
    for multiplier in [
        scenario.electricity_demand_multiplier,
        scenario.heat_demand_multiplier,
        scenario.water_demand_multiplier,
        scenario.water_availability_factor,
        scenario.gas_price_multiplier,
        scenario.grid_price_multiplier,
        scenario.wind_capex_multiplier,
        scenario.battery_capex_multiplier,
        scenario.dust_wind_factor,
    ] {
        ensure!(multiplier >= 0.0, "Multipliers cannot be negative");
    }
    for hour in &scenario.blackout_hours {
        ensure!(*hour < 24, "Blackout hour {hour} is not a valid hour of day");
    }
    Ok(())
}
