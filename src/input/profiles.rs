//! Code for reading named hourly profiles from `profiles.csv`.
use super::input_err_msg;
use crate::profile::ProfileMap;
use crate::time_step::HOURS_PER_YEAR;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use std::path::Path;

const PROFILES_FILE_NAME: &str = "profiles.csv";

/// A column which may be included for readability and is otherwise ignored
const HOUR_COLUMN: &str = "hour";

/// Read hourly profiles from the specified directory.
///
/// The file is optional: if it is absent, all parameters must be given as constants. Otherwise it
/// must contain one row per hour of the year and one column per profile.
pub fn read_profiles(model_dir: &Path) -> Result<ProfileMap> {
    let file_path = model_dir.join(PROFILES_FILE_NAME);
    if !file_path.exists() {
        return Ok(ProfileMap::new());
    }

    read_profiles_from_file(&file_path).with_context(|| input_err_msg(&file_path))
}

fn read_profiles_from_file(file_path: &Path) -> Result<ProfileMap> {
    let mut reader = csv::Reader::from_path(file_path)?;
    let headers = reader.headers()?.clone();
    let names = headers.iter().map(str::trim).collect_vec();
    ensure!(
        names.iter().all_unique(),
        "Profile names must be unique"
    );

    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(HOURS_PER_YEAR); names.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for ((column, name), field) in columns.iter_mut().zip(&names).zip(record.iter()) {
            let value: f64 = field.trim().parse().with_context(|| {
                format!("Invalid value '{field}' for profile {name} in row {}", row + 1)
            })?;
            ensure!(
                value.is_finite(),
                "Value for profile {name} in row {} is not finite",
                row + 1
            );
            column.push(value);
        }
    }

    let mut profiles = ProfileMap::new();
    for (name, column) in names.into_iter().zip(columns) {
        if name == HOUR_COLUMN {
            continue;
        }
        ensure!(
            column.len() == HOURS_PER_YEAR,
            "Profile {name} has {} values, but {HOURS_PER_YEAR} are required",
            column.len()
        );
        profiles.insert(name.into(), column.into());
    }

    Ok(profiles)
}
