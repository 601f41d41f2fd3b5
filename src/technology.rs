//! The technology table: cost and capacity parameters per technology.
use crate::id::TechnologyID;
use crate::input::read_csv;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const TECHNOLOGIES_FILE_NAME: &str = "technologies.csv";

/// A map of technologies keyed by ID, in file order.
pub type TechnologyMap = IndexMap<TechnologyID, Technology>;

/// Cost and capacity parameters for one technology.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Technology {
    /// Unique identifier
    pub technology: TechnologyID,
    /// Overnight capital cost per unit of capacity (USD/kW or USD/kWh or USD/m3)
    pub capex_per_unit: f64,
    /// Economic lifetime in years, used for annualisation
    pub lifetime_years: u32,
    /// Fixed operation and maintenance cost per unit of capacity per year
    pub fixed_om_per_unit: f64,
    /// Variable operation and maintenance cost per unit of output
    pub variable_om_per_unit: f64,
    /// Upper bound on installable capacity
    pub max_capacity: f64,
    /// Upper bound on capacity added per year; informational, not a constraint
    /// over the single-year horizon modelled here
    pub max_annual_expansion: f64,
}

/// Read the technology table from `technologies.csv` in the model directory.
pub fn read_technologies(model_dir: &Path) -> Result<TechnologyMap> {
    let file_path = model_dir.join(TECHNOLOGIES_FILE_NAME);
    let rows: Vec<Technology> = read_csv(&file_path)?;

    let mut map = TechnologyMap::new();
    for row in rows {
        validate_technology(&row)
            .with_context(|| format!("Invalid entry for technology `{}`", row.technology))?;
        let id = row.technology.clone();
        ensure!(
            map.insert(id.clone(), row).is_none(),
            "Duplicate technology `{id}` in {}",
            file_path.display()
        );
    }

    Ok(map)
}

fn validate_technology(technology: &Technology) -> Result<()> {
    ensure!(
        technology.capex_per_unit >= 0.0,
        "capex_per_unit cannot be negative"
    );
    ensure!(
        technology.max_capacity >= 0.0,
        "max_capacity cannot be negative"
    );
    ensure!(
        technology.fixed_om_per_unit >= 0.0 && technology.variable_om_per_unit >= 0.0,
        "O&M costs cannot be negative"
    );
    Ok(())
}
