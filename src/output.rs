//! The module responsible for writing output data to disk.
use crate::carrier::CarrierID;
use crate::optimisation::HubSolution;
use crate::optimisation::solution::StorageSeries;
use crate::orchestrator::{RunOutcome, RunRecord, RunResults};
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "ehub_results";

/// The output file name for the per-instance summary
const SUMMARY_FILE_NAME: &str = "summary.csv";

/// The output file name for installed capacities
const CAPACITIES_FILE_NAME: &str = "capacities.csv";

/// The output file name for hourly dispatch
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// The output file name for selected retrofit options
const RETROFITS_FILE_NAME: &str = "retrofits.csv";

/// The output file name for constraint counts
const CONSTRAINTS_FILE_NAME: &str = "debug_constraints.csv";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory, optionally clearing out an existing one.
///
/// # Returns
///
/// Whether an existing directory was overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. \
            Please delete the folder or pass the --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// Represents a row in the summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SummaryRow {
    scenario: String,
    pareto_step: u32,
    epsilon: Option<f64>,
    status: String,
    objective_value: Option<f64>,
    total_cost: Option<f64>,
    investment_cost: Option<f64>,
    operating_cost: Option<f64>,
    certificate_cost: Option<f64>,
    total_emissions: Option<f64>,
    embodied_emissions: Option<f64>,
    operational_emissions: Option<f64>,
    certificates: Option<f64>,
    message: String,
}

impl SummaryRow {
    fn new(record: &RunRecord) -> Self {
        let solution = record.solution();
        let field = |f: fn(&HubSolution) -> f64| solution.map(f);
        let (status, message) = match &record.outcome {
            RunOutcome::Solved(_) => ("solved", String::new()),
            RunOutcome::Infeasible(reason) => ("infeasible", reason.clone()),
        };

        Self {
            scenario: record.scenario.clone(),
            pareto_step: record.pareto_step,
            epsilon: record.epsilon,
            status: status.into(),
            objective_value: field(|s| s.objective_value),
            total_cost: field(|s| s.costs.total.value()),
            investment_cost: field(|s| s.costs.investment.value()),
            operating_cost: field(|s| s.costs.operating.value()),
            certificate_cost: field(|s| s.costs.certificates.value()),
            total_emissions: field(|s| s.emissions.total.value()),
            embodied_emissions: field(|s| s.emissions.embodied.value()),
            operational_emissions: field(|s| s.emissions.operational.value()),
            certificates: field(|s| s.emissions.offset.value()),
            message,
        }
    }
}

/// Represents a row in the capacities CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CapacityRow {
    scenario: String,
    pareto_step: u32,
    kind: String,
    id: String,
    capacity: f64,
}

/// Represents a row in the dispatch CSV file.
///
/// `time_step` indexes the modelled time steps, except for the levels of continuous storage, which
/// are given for every hour of the year.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DispatchRow {
    scenario: String,
    pareto_step: u32,
    kind: String,
    id: String,
    carrier: String,
    time_step: usize,
    value: f64,
}

/// Represents a row in the retrofits CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct RetrofitRow {
    scenario: String,
    pareto_step: u32,
    building: String,
    option: String,
}

/// Represents a row in the debug constraints CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ConstraintCountRow {
    scenario: String,
    pareto_step: u32,
    constraint: String,
    count: usize,
}

/// An object for writing run results to file
pub struct DataWriter {
    summary_writer: csv::Writer<File>,
    capacities_writer: csv::Writer<File>,
    dispatch_writer: csv::Writer<File>,
    retrofits_writer: csv::Writer<File>,
    debug_writer: Option<csv::Writer<File>>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            Some(new_writer(CONSTRAINTS_FILE_NAME)?)
        } else {
            None
        };

        Ok(Self {
            summary_writer: new_writer(SUMMARY_FILE_NAME)?,
            capacities_writer: new_writer(CAPACITIES_FILE_NAME)?,
            dispatch_writer: new_writer(DISPATCH_FILE_NAME)?,
            retrofits_writer: new_writer(RETROFITS_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write every record of a run
    pub fn write_results(&mut self, results: &RunResults) -> Result<()> {
        for record in &results.records {
            self.write_record(record)?;
        }

        Ok(())
    }

    /// Write a single record.
    ///
    /// Infeasible records only appear in the summary.
    pub fn write_record(&mut self, record: &RunRecord) -> Result<()> {
        self.summary_writer.serialize(SummaryRow::new(record))?;

        let Some(solution) = record.solution() else {
            return Ok(());
        };
        self.write_capacities(record, solution)?;
        self.write_dispatch(record, solution)?;
        self.write_retrofits(record, solution)?;
        if let Some(wtr) = &mut self.debug_writer {
            for (tag, count) in &solution.row_counts {
                let row = ConstraintCountRow {
                    scenario: record.scenario.clone(),
                    pareto_step: record.pareto_step,
                    constraint: tag.to_string(),
                    count: *count,
                };
                wtr.serialize(row)?;
            }
        }

        Ok(())
    }

    fn write_capacities(&mut self, record: &RunRecord, solution: &HubSolution) -> Result<()> {
        let technologies = solution
            .technology_capacities
            .iter()
            .map(|(id, capacity)| ("technology", id.to_string(), *capacity));
        let storage = solution
            .storage_capacities
            .iter()
            .map(|(id, capacity)| ("storage", id.to_string(), *capacity));
        for (kind, id, capacity) in technologies.chain(storage) {
            let row = CapacityRow {
                scenario: record.scenario.clone(),
                pareto_step: record.pareto_step,
                kind: kind.into(),
                id,
                capacity: capacity.value(),
            };
            self.capacities_writer.serialize(row)?;
        }

        Ok(())
    }

    fn write_series(
        &mut self,
        record: &RunRecord,
        kind: &str,
        id: impl Display,
        carrier: &CarrierID,
        values: &[f64],
    ) -> Result<()> {
        let id = id.to_string();
        for (time_step, value) in values.iter().enumerate() {
            let row = DispatchRow {
                scenario: record.scenario.clone(),
                pareto_step: record.pareto_step,
                kind: kind.into(),
                id: id.clone(),
                carrier: carrier.to_string(),
                time_step,
                value: *value,
            };
            self.dispatch_writer.serialize(row)?;
        }

        Ok(())
    }

    fn write_dispatch(&mut self, record: &RunRecord, solution: &HubSolution) -> Result<()> {
        for ((technology_id, carrier_id), flows) in &solution.dispatch {
            self.write_series(record, "technology", technology_id, carrier_id, flows)?;
        }
        for (carrier_id, flows) in &solution.imports {
            self.write_series(record, "import", "grid", carrier_id, flows)?;
        }
        for (carrier_id, flows) in &solution.exports {
            self.write_series(record, "export", "grid", carrier_id, flows)?;
        }
        for (storage_id, series) in &solution.storage {
            let StorageSeries {
                carrier,
                charge,
                discharge,
                level,
            } = series;
            self.write_series(record, "storage_charge", storage_id, carrier, charge)?;
            self.write_series(record, "storage_discharge", storage_id, carrier, discharge)?;
            self.write_series(record, "storage_level", storage_id, carrier, level)?;
        }

        Ok(())
    }

    fn write_retrofits(&mut self, record: &RunRecord, solution: &HubSolution) -> Result<()> {
        for (building_id, option_id) in &solution.retrofits {
            let row = RetrofitRow {
                scenario: record.scenario.clone(),
                pareto_step: record.pareto_step,
                building: building_id.to_string(),
                option: option_id.to_string(),
            };
            self.retrofits_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.summary_writer.flush()?;
        self.capacities_writer.flush()?;
        self.dispatch_writer.flush()?;
        self.retrofits_writer.flush()?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}
