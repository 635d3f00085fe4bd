//! Code for representing the operating year as a set of weighted hourly time steps.
//!
//! The year is modelled either hour by hour (8760 steps) or as a handful of typical days, each
//! standing in for a cluster of calendar days. Which calendar days belong to which typical day is
//! decided elsewhere and read from `typical_days.csv`.
use crate::error::HubError;
use crate::profile::HourlyValue;
use anyhow::Result;
use itertools::Itertools;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::ops::Range;

/// Number of hours in a day
pub const HOURS_PER_DAY: usize = 24;
/// Number of calendar days in a (non-leap) year
pub const DAYS_PER_YEAR: usize = 365;
/// Number of hours in a (non-leap) year
pub const HOURS_PER_YEAR: usize = HOURS_PER_DAY * DAYS_PER_YEAR;

/// Duration of every time step, in hours
const STEP_DURATION: f64 = 1.0;

/// Weighted time steps must add up to a full year within this tolerance (in hours)
const YEAR_TOLERANCE: f64 = 1e-6;

/// How the operating year is represented in the optimisation problem
#[derive(
    PartialEq, Eq, Copy, Clone, Debug, Default, DeserializeLabeledStringEnum, strum::Display,
)]
pub enum TemporalResolution {
    /// Typical days, with storage levels wrapping around within each day
    #[string = "typical_days"]
    #[strum(serialize = "typical_days")]
    TypicalDays,
    /// All 8760 hours of the year, with storage levels wrapping around the year
    #[default]
    #[string = "full_year"]
    #[strum(serialize = "full_year")]
    FullYear,
    /// Typical days, with storage levels chained across calendar days
    #[string = "typical_days_continuous_storage"]
    #[strum(serialize = "typical_days_continuous_storage")]
    TypicalDaysContinuousStorage,
}

impl TemporalResolution {
    /// Whether this resolution is built from typical days
    pub fn uses_typical_days(self) -> bool {
        !matches!(self, TemporalResolution::FullYear)
    }
}

impl TryFrom<u32> for TemporalResolution {
    type Error = HubError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(TemporalResolution::TypicalDays),
            2 => Ok(TemporalResolution::FullYear),
            3 => Ok(TemporalResolution::TypicalDaysContinuousStorage),
            _ => Err(HubError::Configuration(format!(
                "Unsupported temporal resolution {code} (expected 1, 2 or 3)"
            ))),
        }
    }
}

/// The assignment of every calendar day to the calendar day which represents it
#[derive(Debug, Clone, PartialEq)]
pub struct TypicalDays(Vec<usize>);

impl TypicalDays {
    /// Create a new assignment from one representative calendar day per calendar day.
    ///
    /// Every representative day must represent itself.
    pub fn new(representatives: Vec<usize>) -> Result<Self, HubError> {
        if representatives.len() != DAYS_PER_YEAR {
            return Err(HubError::Configuration(format!(
                "Expected a typical day for each of the {DAYS_PER_YEAR} calendar days, got {}",
                representatives.len()
            )));
        }

        for (day, &rep) in representatives.iter().enumerate() {
            if rep >= DAYS_PER_YEAR {
                return Err(HubError::Configuration(format!(
                    "Day {day} is represented by {rep}, which is not a valid calendar day"
                )));
            }
            if representatives[rep] != rep {
                return Err(HubError::Configuration(format!(
                    "Day {rep} represents day {day} but does not represent itself"
                )));
            }
        }

        Ok(Self(representatives))
    }

    /// An assignment in which a single calendar day represents the whole year
    pub fn single(day: usize) -> Result<Self, HubError> {
        Self::new(vec![day; DAYS_PER_YEAR])
    }

    /// The representative calendar day for each calendar day
    pub fn representatives(&self) -> &[usize] {
        &self.0
    }
}

/// A day of the modelled horizon
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDay {
    /// The calendar day (0-based) whose hourly data is used for this day
    pub calendar_day: usize,
    /// The number of calendar days this day stands in for
    pub weight: f64,
}

/// A single step of the modelled horizon
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStep {
    /// Index of the modelled day
    pub day: usize,
    /// Hour of the day
    pub hour: usize,
    /// The calendar day whose hourly data is used for this step
    pub calendar_day: usize,
    /// Number of real days represented
    pub weight: f64,
    /// Duration in hours
    pub duration: f64,
}

impl TimeStep {
    /// The hour of the (representative) calendar year which this step samples
    pub fn hour_of_year(&self) -> usize {
        self.calendar_day * HOURS_PER_DAY + self.hour
    }

    /// Weight of the step when aggregating to annual quantities
    pub fn annual_factor(&self) -> f64 {
        self.weight * self.duration
    }
}

/// The ordered set of weighted time steps for one model instance
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStepInfo {
    /// The resolution this horizon was built for
    pub resolution: TemporalResolution,
    days: Vec<ModelDay>,
    day_sequence: Vec<usize>,
    steps: Vec<TimeStep>,
}

impl TimeStepInfo {
    /// Build the time steps for the given resolution.
    ///
    /// Typical-day resolutions need an assignment of calendar days to typical days.
    pub fn new(
        resolution: TemporalResolution,
        typical_days: Option<&TypicalDays>,
    ) -> Result<Self, HubError> {
        if !resolution.uses_typical_days() {
            let days = (0..DAYS_PER_YEAR)
                .map(|calendar_day| ModelDay {
                    calendar_day,
                    weight: 1.0,
                })
                .collect();
            return Self::from_days(resolution, days, (0..DAYS_PER_YEAR).collect());
        }

        let typical_days = typical_days.ok_or_else(|| {
            HubError::Configuration(format!(
                "Temporal resolution {resolution} requires an assignment of typical days"
            ))
        })?;
        let representatives = typical_days.representatives();
        let distinct = representatives.iter().copied().sorted().dedup().collect_vec();
        let days = distinct
            .iter()
            .map(|&calendar_day| ModelDay {
                calendar_day,
                weight: representatives
                    .iter()
                    .filter(|&&rep| rep == calendar_day)
                    .count() as f64,
            })
            .collect();
        let day_sequence = representatives
            .iter()
            .map(|rep| distinct.binary_search(rep).unwrap_or_default())
            .collect();

        Self::from_days(resolution, days, day_sequence)
    }

    /// Build the time steps from an explicit list of modelled days.
    ///
    /// `day_sequence` gives the modelled day used for each calendar day, in calendar order. It is
    /// only used for chaining storage levels across days.
    pub fn from_days(
        resolution: TemporalResolution,
        days: Vec<ModelDay>,
        day_sequence: Vec<usize>,
    ) -> Result<Self, HubError> {
        if days.is_empty() {
            return Err(HubError::Configuration(
                "At least one day must be modelled".into(),
            ));
        }

        let total_hours: f64 = days
            .iter()
            .map(|day| day.weight * HOURS_PER_DAY as f64 * STEP_DURATION)
            .sum();
        if (total_hours - HOURS_PER_YEAR as f64).abs() > YEAR_TOLERANCE {
            return Err(HubError::Configuration(format!(
                "Time step weights add up to {total_hours} h rather than {HOURS_PER_YEAR} h"
            )));
        }

        if let Some(bad) = day_sequence.iter().find(|&&day| day >= days.len()) {
            return Err(HubError::Configuration(format!(
                "Day sequence refers to day {bad}, but only {} days are modelled",
                days.len()
            )));
        }

        if resolution == TemporalResolution::TypicalDaysContinuousStorage {
            for (index, day) in days.iter().enumerate() {
                let occurrences = day_sequence.iter().filter(|&&d| d == index).count();
                if (occurrences as f64 - day.weight).abs() > YEAR_TOLERANCE {
                    return Err(HubError::Configuration(format!(
                        "Typical day {index} has weight {} but occurs {occurrences} times in the \
                        day sequence",
                        day.weight
                    )));
                }
            }
        }

        let steps = days
            .iter()
            .enumerate()
            .flat_map(|(index, day)| {
                (0..HOURS_PER_DAY).map(move |hour| TimeStep {
                    day: index,
                    hour,
                    calendar_day: day.calendar_day,
                    weight: day.weight,
                    duration: STEP_DURATION,
                })
            })
            .collect();

        Ok(Self {
            resolution,
            days,
            day_sequence,
            steps,
        })
    }

    /// Iterate over the time steps, in order
    pub fn iter(&self) -> impl Iterator<Item = &TimeStep> {
        self.steps.iter()
    }

    /// Get the time step at the given index
    pub fn get(&self, index: usize) -> &TimeStep {
        &self.steps[index]
    }

    /// The number of time steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there are no time steps (never true for a validated horizon)
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The modelled days
    pub fn days(&self) -> &[ModelDay] {
        &self.days
    }

    /// Indexes of the time steps belonging to the given modelled day
    pub fn steps_of_day(&self, day: usize) -> Range<usize> {
        day * HOURS_PER_DAY..(day + 1) * HOURS_PER_DAY
    }

    /// The modelled day used for each calendar day, in calendar order
    pub fn day_sequence(&self) -> &[usize] {
        &self.day_sequence
    }

    /// The index of the step preceding the given one for storage linking.
    ///
    /// Typical days wrap around within the day. The full year wraps from the last hour of the
    /// year to the first.
    pub fn previous(&self, index: usize) -> usize {
        match self.resolution {
            TemporalResolution::FullYear => (index + self.len() - 1) % self.len(),
            TemporalResolution::TypicalDays | TemporalResolution::TypicalDaysContinuousStorage => {
                let step = &self.steps[index];
                let start = step.day * HOURS_PER_DAY;
                start + (step.hour + HOURS_PER_DAY - 1) % HOURS_PER_DAY
            }
        }
    }

    /// Map an annual hourly series onto the time steps
    pub fn sample(&self, profile: &HourlyValue) -> Vec<f64> {
        self.steps
            .iter()
            .map(|step| profile.at(step.hour_of_year()))
            .collect()
    }

    /// The total number of hours represented by the time steps
    pub fn total_hours(&self) -> f64 {
        self.steps.iter().map(TimeStep::annual_factor).sum()
    }
}
