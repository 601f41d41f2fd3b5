//! Capacity expansion and dispatch planning for a small multi-carrier
//! energy-water installation.
//!
//! The pipeline for one scenario is assemble, formulate, solve, extract:
//! the [`assembler`] wires buses and assets into a [`network::Network`], the
//! [`optimisation`] module turns it into a linear program, the [`solver`]
//! hands it to HiGHS, and [`results`] maps the optimum back into capacities,
//! costs and emissions. The [`orchestrator`] drives those stages per scenario
//! and keeps a batch going past individual failures.
#![warn(missing_docs)]
pub mod assembler;
pub mod cli;
pub mod finance;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod network;
pub mod optimisation;
pub mod orchestrator;
pub mod output;
pub mod results;
pub mod scenario;
pub mod settings;
pub mod snapshots;
pub mod solver;
pub mod technology;
pub mod timeseries;
pub mod units;

#[cfg(test)]
mod fixture;
