//! Annual hourly profiles and the parameters which may refer to them.
//!
//! Prices, carbon intensities, availabilities and demands can be given either as a single number
//! (constant throughout the year) or as the name of a column in `profiles.csv`.
use crate::error::HubError;
use crate::time_step::HOURS_PER_YEAR;
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::rc::Rc;

/// Named annual hourly series, as read from `profiles.csv`
pub type ProfileMap = IndexMap<Rc<str>, Rc<[f64]>>;

/// A parameter value as it appears in `hub.toml`: either a number or the name of a profile
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// The same value for every hour of the year
    Number(f64),
    /// The name of a column in `profiles.csv`
    Profile(String),
}

impl ParamValue {
    /// Look up the profile referred to by this value, if any
    pub fn resolve(&self, profiles: &ProfileMap) -> Result<HourlyValue> {
        match self {
            ParamValue::Number(value) => Ok(HourlyValue::Constant(*value)),
            ParamValue::Profile(name) => {
                let series = profiles
                    .get(name.as_str())
                    .ok_or_else(|| HubError::MissingParameter(format!("profiles.{name}")))?;
                Ok(HourlyValue::Series(Rc::clone(series)))
            }
        }
    }
}

/// A value for every hour of the year
#[derive(Debug, Clone, PartialEq)]
pub enum HourlyValue {
    /// The same value for every hour
    Constant(f64),
    /// One value per hour of the year
    Series(Rc<[f64]>),
}

impl HourlyValue {
    /// Get the value for the given hour of the year (0-based)
    pub fn at(&self, hour_of_year: usize) -> f64 {
        match self {
            HourlyValue::Constant(value) => *value,
            HourlyValue::Series(series) => series[hour_of_year],
        }
    }

    /// Iterate over the values for every hour of the year
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..HOURS_PER_YEAR).map(|hour| self.at(hour))
    }

    /// Check that every value is finite and lies within `[min, max]`
    pub fn check_range(&self, min: f64, max: f64) -> Result<()> {
        ensure!(
            self.iter().all(|value| value.is_finite() && (min..=max).contains(&value)),
            "Values must be finite and between {min} and {max}"
        );

        Ok(())
    }
}

impl Default for HourlyValue {
    fn default() -> Self {
        HourlyValue::Constant(0.0)
    }
}
