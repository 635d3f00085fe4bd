//! Code for reading the assignment of calendar days to typical days.
use super::{input_err_msg, read_csv};
use crate::error::HubError;
use crate::time_step::{DAYS_PER_YEAR, TypicalDays};
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;

const TYPICAL_DAYS_FILE_NAME: &str = "typical_days.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct TypicalDayRaw {
    /// Calendar day (0-based)
    day: usize,
    /// The calendar day which represents `day`
    representative_day: usize,
}

/// Read the typical-day assignment from the specified directory, if present.
///
/// # Returns
///
/// `None` if there is no `typical_days.csv`, else the validated assignment.
pub fn read_typical_days(model_dir: &Path) -> Result<Option<TypicalDays>> {
    let file_path = model_dir.join(TYPICAL_DAYS_FILE_NAME);
    if !file_path.exists() {
        return Ok(None);
    }

    let typical_days = read_typical_days_from_iter(read_csv(&file_path)?)
        .with_context(|| input_err_msg(&file_path))?;

    Ok(Some(typical_days))
}

fn read_typical_days_from_iter<I>(iter: I) -> Result<TypicalDays>
where
    I: Iterator<Item = TypicalDayRaw>,
{
    let mut representatives: Vec<Option<usize>> = vec![None; DAYS_PER_YEAR];
    for raw in iter {
        ensure!(
            raw.day < DAYS_PER_YEAR,
            HubError::Configuration(format!("Invalid calendar day {}", raw.day))
        );
        ensure!(
            representatives[raw.day].replace(raw.representative_day).is_none(),
            HubError::Configuration(format!("Day {} is assigned more than once", raw.day))
        );
    }

    let representatives = representatives
        .into_iter()
        .enumerate()
        .map(|(day, rep)| {
            rep.ok_or_else(|| HubError::Configuration(format!("Day {day} is not assigned")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TypicalDays::new(representatives)?)
}
