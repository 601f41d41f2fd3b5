//! The model: everything read from a model directory.
//!
//! A model directory contains four files:
//!
//! * `model.toml` - horizon, economics, fuel prices and emission intensities
//! * `technologies.csv` - the technology table
//! * `scenarios.toml` - the policy cases to compare
//! * `timeseries.csv` - the per-snapshot input data
use crate::scenario::{ScenarioMap, read_scenarios};
use crate::snapshots::Snapshots;
use crate::technology::{TechnologyMap, read_technologies};
use crate::timeseries::Dataset;
use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

/// The model file name
pub const MODEL_FILE_NAME: &str = "model.toml";

/// Horizon and economic parameters from the `[model]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelParameters {
    /// Number of years over which capital is recovered and OPEX discounted
    pub planning_horizon_years: u32,
    /// Annual discount rate (0-1)
    pub discount_rate: f64,
    /// Number of hourly snapshots to optimise over
    pub snapshots: usize,
    /// Calendar date of the first snapshot (midnight)
    pub start_date: NaiveDate,
}

/// Fuel and import prices from the `[prices]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FuelPrices {
    /// Pipeline gas price (USD per kWh fuel)
    pub gas_price_per_kwh: f64,
    /// Grid import price (USD per kWh)
    pub grid_price_per_kwh: f64,
    /// Biogas feedstock cost (USD per kWh fuel-equivalent)
    pub biogas_price_per_kwh: f64,
    /// Annual gas price growth rate
    #[serde(default)]
    pub gas_price_growth: f64,
    /// Annual grid price growth rate
    #[serde(default)]
    pub grid_price_growth: f64,
}

impl FuelPrices {
    /// Gas price escalated to the representative operating year.
    pub fn escalated_gas_price(&self, horizon_years: u32) -> f64 {
        escalate(self.gas_price_per_kwh, self.gas_price_growth, horizon_years)
    }

    /// Grid price escalated to the representative operating year.
    pub fn escalated_grid_price(&self, horizon_years: u32) -> f64 {
        escalate(self.grid_price_per_kwh, self.grid_price_growth, horizon_years)
    }
}

fn escalate(base: f64, growth: f64, years: u32) -> f64 {
    base * (1.0 + growth).powi(years as i32)
}

/// Emission intensities from the `[emissions]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmissionIntensities {
    /// Tons of CO2 per MWh of gas burned
    pub gas_tons_co2_per_mwh: f64,
    /// Tons of CO2 per MWh imported from the grid
    pub grid_tons_co2_per_mwh: f64,
}

/// The parsed contents of `model.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelConfig {
    /// Horizon and economics
    pub model: ModelParameters,
    /// Fuel and import prices
    pub prices: FuelPrices,
    /// Emission intensities
    pub emissions: EmissionIntensities,
}

impl ModelConfig {
    /// Read and validate `model.toml` from the model directory.
    pub fn from_path(model_dir: &Path) -> Result<ModelConfig> {
        let config: ModelConfig = crate::input::read_toml(&model_dir.join(MODEL_FILE_NAME))?;
        config.validate().context("Invalid model configuration")?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..1.0).contains(&self.model.discount_rate),
            "discount_rate must be at least zero and less than one"
        );
        ensure!(
            self.model.planning_horizon_years > 0,
            "planning_horizon_years must be positive"
        );
        ensure!(
            (1..=8760).contains(&self.model.snapshots),
            "snapshots must be between 1 and 8760"
        );
        ensure!(
            self.prices.gas_price_per_kwh >= 0.0
                && self.prices.grid_price_per_kwh >= 0.0
                && self.prices.biogas_price_per_kwh >= 0.0,
            "Prices cannot be negative"
        );
        ensure!(
            self.emissions.gas_tons_co2_per_mwh >= 0.0
                && self.emissions.grid_tons_co2_per_mwh >= 0.0,
            "Emission intensities cannot be negative"
        );
        Ok(())
    }
}

/// A fully-loaded model, ready to assemble and solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Contents of `model.toml`
    pub config: ModelConfig,
    /// The snapshot calendar derived from the config
    pub snapshots: Snapshots,
    /// The technology table
    pub technologies: TechnologyMap,
    /// The policy cases to compare
    pub scenarios: ScenarioMap,
    /// The scenario-independent input series
    pub dataset: Dataset,
}

impl Model {
    /// Load a complete model from a model directory.
    pub fn from_path(model_dir: &Path) -> Result<Model> {
        let config = ModelConfig::from_path(model_dir)?;
        let snapshots = Snapshots::new(config.model.start_date, config.model.snapshots)?;
        let technologies = read_technologies(model_dir)?;
        let scenarios = read_scenarios(model_dir)?;
        let dataset = Dataset::from_path(model_dir, &snapshots)?;

        Ok(Model {
            config,
            snapshots,
            technologies,
            scenarios,
            dataset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model_config;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_validate_accepts_base_config(model_config: ModelConfig) {
        assert!(model_config.validate().is_ok());
    }

    #[rstest]
    fn test_validate_rejects_bad_values(mut model_config: ModelConfig) {
        model_config.model.discount_rate = 1.5;
        assert!(model_config.validate().is_err());

        model_config.model.discount_rate = 0.08;
        model_config.model.snapshots = 0;
        assert!(model_config.validate().is_err());
    }

    #[test]
    fn test_price_escalation() {
        let prices = FuelPrices {
            gas_price_per_kwh: 0.05,
            grid_price_per_kwh: 0.10,
            biogas_price_per_kwh: 0.02,
            gas_price_growth: 0.03,
            grid_price_growth: 0.0,
        };
        assert_approx_eq!(
            f64,
            prices.escalated_gas_price(30),
            0.05 * 1.03f64.powi(30),
            epsilon = 1e-12
        );
        assert_eq!(prices.escalated_grid_price(30), 0.10);
    }
}
