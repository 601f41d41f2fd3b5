//! Fixtures for tests
use crate::model::{EmissionIntensities, FuelPrices, Model, ModelConfig, ModelParameters};
use crate::scenario::{Scenario, ScenarioMap};
use crate::snapshots::{DustSeverity, SeasonalFactors, Snapshots};
use crate::technology::{Technology, TechnologyMap};
use crate::timeseries::Dataset;
use chrono::NaiveDate;
use rstest::fixture;

/// A dataset holding the same value in every column at every snapshot.
pub fn constant_dataset(len: usize) -> Dataset {
    Dataset {
        wind_speed: vec![8.0; len],
        electricity_demand: vec![50.0; len],
        heat_demand: vec![30.0; len],
        water_demand: vec![5.0; len],
        gas_availability: vec![100.0; len],
        biomass_availability: vec![0.5; len],
        groundwater_availability: vec![10.0; len],
    }
}

#[fixture]
pub fn model_config() -> ModelConfig {
    ModelConfig {
        model: ModelParameters {
            planning_horizon_years: 30,
            discount_rate: 0.08,
            snapshots: 24,
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        },
        prices: FuelPrices {
            gas_price_per_kwh: 0.05,
            grid_price_per_kwh: 0.10,
            biogas_price_per_kwh: 0.01,
            gas_price_growth: 0.0,
            grid_price_growth: 0.0,
        },
        emissions: EmissionIntensities {
            gas_tons_co2_per_mwh: 0.20,
            grid_tons_co2_per_mwh: 0.60,
        },
    }
}

#[fixture]
pub fn baseline_scenario() -> Scenario {
    Scenario {
        id: "s1_baseline".into(),
        name: "Baseline".to_string(),
        description: None,
        gas_availability: SeasonalFactors::default(),
        grid_availability: SeasonalFactors::default(),
        blackout_hours: Vec::new(),
        electricity_demand_multiplier: 1.0,
        heat_demand_multiplier: 1.0,
        water_demand_multiplier: 1.0,
        water_availability_factor: 1.0,
        gas_price_multiplier: 1.0,
        grid_price_multiplier: 1.0,
        carbon_tax_per_ton: 0.0,
        wind_capex_multiplier: 1.0,
        battery_capex_multiplier: 1.0,
        dust_severity: DustSeverity::Moderate,
        dust_wind_factor: 1.0,
        disabled_technologies: Vec::new(),
    }
}

fn technology(
    name: &str,
    capex_per_unit: f64,
    lifetime_years: u32,
    fixed_om_per_unit: f64,
    variable_om_per_unit: f64,
    max_capacity: f64,
) -> Technology {
    Technology {
        technology: name.into(),
        capex_per_unit,
        lifetime_years,
        fixed_om_per_unit,
        variable_om_per_unit,
        max_capacity,
        max_annual_expansion: max_capacity,
    }
}

#[fixture]
pub fn technologies() -> TechnologyMap {
    [
        technology("wind_hawt", 1500.0, 25, 30.0, 0.0, 200.0),
        technology("battery", 500.0, 15, 10.0, 0.0, 1000.0),
        technology("gas_turbine", 800.0, 20, 20.0, 0.005, 150.0),
        technology("gas_boiler", 100.0, 20, 5.0, 0.001, 200.0),
        technology("biogas_generator", 1200.0, 15, 25.0, 0.02, 100.0),
        technology("water_pump", 300.0, 20, 5.0, 0.005, 50.0),
        technology("water_tank", 150.0, 30, 2.0, 0.0, 500.0),
    ]
    .into_iter()
    .map(|technology| (technology.technology.clone(), technology))
    .collect()
}

#[fixture]
pub fn model(
    model_config: ModelConfig,
    technologies: TechnologyMap,
    baseline_scenario: Scenario,
) -> Model {
    let snapshots = Snapshots::new(
        model_config.model.start_date,
        model_config.model.snapshots,
    )
    .unwrap();
    let dataset = constant_dataset(snapshots.len());
    let mut scenarios = ScenarioMap::new();
    scenarios.insert(baseline_scenario.id.clone(), baseline_scenario);

    Model {
        config: model_config,
        snapshots,
        technologies,
        scenarios,
        dataset,
    }
}
