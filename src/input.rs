//! Common routines for reading input files.
use anyhow::{Context, Result, ensure};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Parse a TOML file into the given type.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let contents = fs::read_to_string(file_path)
        .with_context(|| format!("Could not read file {}", file_path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("Could not parse file {}", file_path.display()))
}

/// Read a CSV file into a vector of rows of the given type.
///
/// An empty file is an error: every table in the model is required to have at
/// least one entry.
pub fn read_csv<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(file_path)
        .with_context(|| format!("Could not read file {}", file_path.display()))?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: T =
            record.with_context(|| format!("Bad row in {}", file_path.display()))?;
        rows.push(row);
    }
    ensure!(
        !rows.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(rows)
}
