//! Helpers for writing small models to disk in integration tests.
// Each test file only uses some of these
#![allow(dead_code)]
use ehub::input::load_model;
use ehub::model::{Model, ModelParameters};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Hours in the calendar year
pub const HOURS: usize = 8760;

/// Get the path to a bundled demo model
pub fn demo_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("demos").join(name)
}

/// A model directory which lives as long as the returned value
pub struct ModelDir {
    dir: TempDir,
}

impl ModelDir {
    /// Write `model.toml` and `hub.toml` to a new temporary directory
    pub fn new(model_toml: &str, hub_toml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("model.toml"), model_toml).unwrap();
        fs::write(dir.path().join("hub.toml"), hub_toml).unwrap();

        Self { dir }
    }

    /// Add `profiles.csv` with one column per (name, function of hour of year)
    pub fn with_profiles(self, profiles: &[(&str, fn(usize) -> f64)]) -> Self {
        let mut contents = String::from("hour");
        for (name, _) in profiles {
            write!(contents, ",{name}").unwrap();
        }
        contents.push('\n');
        for hour in 0..HOURS {
            write!(contents, "{hour}").unwrap();
            for (_, profile) in profiles {
                write!(contents, ",{}", profile(hour)).unwrap();
            }
            contents.push('\n');
        }
        fs::write(self.dir.path().join("profiles.csv"), contents).unwrap();

        self
    }

    /// Add `typical_days.csv` in which calendar day 0 represents the whole year
    pub fn with_single_typical_day(self) -> Self {
        self.with_typical_days(|_| 0)
    }

    /// Add `typical_days.csv` giving the representative of each calendar day
    pub fn with_typical_days(self, representative: fn(usize) -> usize) -> Self {
        let mut contents = String::from("day,representative_day\n");
        for day in 0..365 {
            writeln!(contents, "{day},{}", representative(day)).unwrap();
        }
        fs::write(self.dir.path().join("typical_days.csv"), contents).unwrap();

        self
    }

    /// The path to the model directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Load the model with the parameters in `model.toml`
    pub fn load(&self) -> Model {
        let parameters = ModelParameters::from_path(self.path()).unwrap();
        load_model(self.path(), parameters).unwrap()
    }
}
