//! The model represents the static input data provided by the user.
use crate::input::load_model;
use crate::parameter_table::ParameterTable;
use crate::time_step::{TimeStepInfo, TypicalDays};
use anyhow::Result;
use std::path::Path;

pub mod parameters;
pub use parameters::{ModelParameters, ObjectiveMode, RetrofitStrategy, SolverOptions};

/// Model definition
#[derive(Debug)]
pub struct Model {
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Technologies, carriers, buildings and markets
    pub table: ParameterTable,
    /// The time steps over which the hub is operated
    pub time_step_info: TimeStepInfo,
}

impl Model {
    /// Create a new model from its components, checking that they fit together
    pub fn new(
        parameters: ModelParameters,
        table: ParameterTable,
        typical_days: Option<&TypicalDays>,
    ) -> Result<Self> {
        parameters.validate()?;
        let time_step_info = TimeStepInfo::new(parameters.temporal_resolution, typical_days)?;
        crate::graph::validate_carrier_graph(&table)?;

        Ok(Self {
            parameters,
            table,
            time_step_info,
        })
    }

    /// Read a model from the specified directory, using the parameters in its `model.toml`.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<Self> {
        let parameters = ModelParameters::from_path(&model_dir)?;
        load_model(model_dir, parameters)
    }
}
