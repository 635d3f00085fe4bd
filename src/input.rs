//! Common routines for handling input data.
use crate::error::HubError;
use crate::model::{Model, ModelParameters};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fmt::Display;
use std::fs;
use std::path::Path;

pub mod hub;
pub mod profiles;
pub mod typical_days;

/// The maximum number of items shown when listing offending entries in an error message
const MAX_ITEMS_IN_MESSAGE: usize = 10;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());
    Ok(vec.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::Reader::from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read an f64, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
    }

    Ok(value)
}

/// Read an f64, checking that it is greater than 0 and less than or equal to 1
pub fn deserialise_proportion_nonzero<'de, D>(deserialiser: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialise_proportion(deserialiser)?;
    if value == 0.0 {
        Err(serde::de::Error::custom("Value cannot be zero"))?;
    }

    Ok(value)
}

/// Unwrap a required category of the parameter table, raising [`HubError::MissingParameter`]
pub fn require<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| HubError::MissingParameter(key.to_string()).into())
}

/// Format a list of items, truncating it if it is too long
pub fn format_items_with_cap<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: Display,
{
    let items = items.into_iter().collect_vec();
    let shown = items.iter().take(MAX_ITEMS_IN_MESSAGE).join(", ");
    if items.len() > MAX_ITEMS_IN_MESSAGE {
        format!(
            "{shown} and {} more",
            items.len() - MAX_ITEMS_IN_MESSAGE
        )
    } else {
        shown
    }
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `parameters` - Run configuration, already read (and possibly overridden by the user)
///
/// # Returns
///
/// The validated [`Model`] or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P, parameters: ModelParameters) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let profiles = profiles::read_profiles(model_dir)?;
    let table = hub::read_parameter_table(model_dir, &profiles)?;
    let typical_days = typical_days::read_typical_days(model_dir)?;

    Model::new(parameters, table, typical_days.as_ref())
}
