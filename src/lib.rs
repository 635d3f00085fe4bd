//! Common functionality for ehub, an energy hub design and retrofit optimisation tool.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod carrier;
pub mod cli;
pub mod error;
pub mod finance;
pub mod graph;
pub mod id;
pub mod input;
pub mod log;
pub mod model;
pub mod optimisation;
pub mod orchestrator;
pub mod output;
pub mod parameter_table;
pub mod profile;
pub mod retrofit;
pub mod settings;
pub mod technology;
pub mod time_step;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the config directory for ehub
pub fn get_ehub_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().expect("Could not get config directory for this platform");
    path.push("ehub");

    path
}
