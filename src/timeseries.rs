//! The input time-series dataset.
//!
//! One column per resource, read from a single CSV file with one row per
//! snapshot. The dataset is the raw, scenario-independent input; scenario
//! rules transform a copy of it before assembly.
use crate::network::AssemblyError;
use crate::snapshots::Snapshots;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const TIMESERIES_FILE_NAME: &str = "timeseries.csv";

/// One row of the time-series input file.
#[derive(Debug, Deserialize)]
struct TimeSeriesRow {
    wind_speed_ms: f64,
    electricity_demand_kwh: f64,
    heat_demand_kwh: f64,
    water_demand_m3: f64,
    gas_availability_kwh: f64,
    biomass_availability_ton_h: f64,
    groundwater_availability_m3h: f64,
}

/// The full set of per-snapshot input series for one run.
///
/// All columns are guaranteed to have exactly one entry per snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Wind speed at hub height (m/s)
    pub wind_speed: Vec<f64>,
    /// Electricity demand (kWh per hour)
    pub electricity_demand: Vec<f64>,
    /// Heat demand (kWh per hour)
    pub heat_demand: Vec<f64>,
    /// Water demand (m3 per hour)
    pub water_demand: Vec<f64>,
    /// Pipeline gas available for purchase (kWh per hour)
    pub gas_availability: Vec<f64>,
    /// Biomass feedstock available to the digester (tons per hour)
    pub biomass_availability: Vec<f64>,
    /// Groundwater extraction limit (m3 per hour)
    pub groundwater_availability: Vec<f64>,
}

impl Dataset {
    /// Read the dataset from `timeseries.csv` in the model directory.
    pub fn from_path(model_dir: &Path, snapshots: &Snapshots) -> Result<Dataset> {
        let file_path = model_dir.join(TIMESERIES_FILE_NAME);
        let mut reader = csv::Reader::from_path(&file_path)
            .with_context(|| format!("Could not read time series from {}", file_path.display()))?;

        let mut dataset = Dataset {
            wind_speed: Vec::new(),
            electricity_demand: Vec::new(),
            heat_demand: Vec::new(),
            water_demand: Vec::new(),
            gas_availability: Vec::new(),
            biomass_availability: Vec::new(),
            groundwater_availability: Vec::new(),
        };
        for record in reader.deserialize() {
            let row: TimeSeriesRow = record
                .with_context(|| format!("Bad row in {}", file_path.display()))?;
            dataset.wind_speed.push(row.wind_speed_ms);
            dataset.electricity_demand.push(row.electricity_demand_kwh);
            dataset.heat_demand.push(row.heat_demand_kwh);
            dataset.water_demand.push(row.water_demand_m3);
            dataset.gas_availability.push(row.gas_availability_kwh);
            dataset.biomass_availability.push(row.biomass_availability_ton_h);
            dataset
                .groundwater_availability
                .push(row.groundwater_availability_m3h);
        }

        dataset.validate(snapshots)?;
        Ok(dataset)
    }

    /// Check every column against the snapshot count.
    pub fn validate(&self, snapshots: &Snapshots) -> Result<(), AssemblyError> {
        for (name, column) in self.columns() {
            if column.len() != snapshots.len() {
                return Err(AssemblyError::LengthMismatch {
                    name: name.to_string(),
                    expected: snapshots.len(),
                    actual: column.len(),
                });
            }
        }
        Ok(())
    }

    fn columns(&self) -> [(&'static str, &Vec<f64>); 7] {
        [
            ("wind_speed", &self.wind_speed),
            ("electricity_demand", &self.electricity_demand),
            ("heat_demand", &self.heat_demand),
            ("water_demand", &self.water_demand),
            ("gas_availability", &self.gas_availability),
            ("biomass_availability", &self.biomass_availability),
            ("groundwater_availability", &self.groundwater_availability),
        ]
    }
}
