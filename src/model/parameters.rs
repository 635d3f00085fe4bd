//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::error::HubError;
use crate::input::{input_err_msg, read_toml};
use crate::time_step::TemporalResolution;
use crate::units::Dimensionless;
use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::from($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_unit_param_default!(default_interest_rate, Dimensionless, 0.05);
define_param_default!(default_pareto_points, u32, 5);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// How the operating year is represented
    #[serde(default)]
    pub temporal_resolution: TemporalResolution,
    /// What to minimise
    #[serde(default)]
    pub objective: ObjectiveMode,
    /// Number of points on the cost-emissions frontier (multi-objective runs only)
    #[serde(default = "default_pareto_points")]
    pub pareto_points: u32,
    /// Whether retrofit scenarios are solved one by one or chosen by the optimiser
    #[serde(default)]
    pub retrofit_strategy: RetrofitStrategy,
    /// Interest rate used to annualise investment costs
    #[serde(default = "default_interest_rate")]
    pub interest_rate: Dimensionless,
    /// Options passed to the MILP solver
    #[serde(default)]
    pub solver: SolverOptions,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temporal_resolution: TemporalResolution::default(),
            objective: ObjectiveMode::default(),
            pareto_points: default_pareto_points(),
            retrofit_strategy: RetrofitStrategy::default(),
            interest_rate: default_interest_rate(),
            solver: SolverOptions::default(),
        }
    }
}

/// The quantity (or quantities) to minimise
#[derive(
    DeserializeLabeledStringEnum, strum::Display, Debug, PartialEq, Eq, Copy, Clone, Default,
)]
pub enum ObjectiveMode {
    /// Minimise total annualised cost
    #[default]
    #[string = "cost"]
    #[strum(serialize = "cost")]
    Cost,
    /// Minimise total annual emissions
    #[string = "emissions"]
    #[strum(serialize = "emissions")]
    Emissions,
    /// Trace the cost-emissions frontier with the epsilon-constraint method
    #[string = "multi_objective"]
    #[strum(serialize = "multi_objective")]
    MultiObjective,
}

impl TryFrom<u32> for ObjectiveMode {
    type Error = HubError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ObjectiveMode::Cost),
            2 => Ok(ObjectiveMode::Emissions),
            3 => Ok(ObjectiveMode::MultiObjective),
            _ => Err(HubError::Configuration(format!(
                "Unsupported objective {code} (expected 1, 2 or 3)"
            ))),
        }
    }
}

/// How the choice of building retrofits is handled
#[derive(
    DeserializeLabeledStringEnum, strum::Display, Debug, PartialEq, Eq, Copy, Clone, Default,
)]
pub enum RetrofitStrategy {
    /// Solve one model per combination of retrofit options
    #[default]
    #[string = "enumerate"]
    #[strum(serialize = "enumerate")]
    Enumerate,
    /// Let the optimiser pick the retrofit options with binary variables
    #[string = "co_optimise"]
    #[strum(serialize = "co_optimise")]
    CoOptimise,
}

/// Options passed to the MILP solver
#[derive(Debug, Deserialize, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct SolverOptions {
    /// Time limit per solve, in seconds
    pub time_limit: Option<f64>,
    /// Relative MIP gap at which to stop
    pub mip_rel_gap: Option<f64>,
    /// Seed for the solver's random number generator
    #[serde(default)]
    pub random_seed: u32,
}

/// Check that the `pareto_points` parameter is valid for the chosen objective
fn check_pareto_points(objective: ObjectiveMode, points: u32) -> Result<()> {
    if objective == ObjectiveMode::MultiObjective {
        ensure!(
            points >= 2,
            HubError::Configuration(format!(
                "pareto_points must be at least 2 for multi-objective runs, got {points}"
            ))
        );
    }

    Ok(())
}

/// Check that the `interest_rate` parameter is valid
fn check_interest_rate(value: Dimensionless) -> Result<()> {
    ensure!(
        value.value().is_finite() && value >= Dimensionless(0.0),
        "interest_rate must be a finite number greater than or equal to zero"
    );

    Ok(())
}

/// Check that the solver options are valid
fn check_solver_options(options: &SolverOptions) -> Result<()> {
    if let Some(time_limit) = options.time_limit {
        ensure!(
            time_limit.is_finite() && time_limit > 0.0,
            "solver.time_limit must be a finite number greater than zero"
        );
    }
    if let Some(gap) = options.mip_rel_gap {
        ensure!(
            (0.0..1.0).contains(&gap),
            "solver.mip_rel_gap must be between 0 and 1"
        );
    }

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file or applying overrides
    pub fn validate(&self) -> Result<()> {
        // pareto_points
        check_pareto_points(self.objective, self.pareto_points)?;

        // interest_rate
        check_interest_rate(self.interest_rate)?;

        // solver
        check_solver_options(&self.solver)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_hub_error;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_model_params_from_path_defaults() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();

        let model_params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(model_params, ModelParameters::default());
        assert_eq!(model_params.pareto_points, 5);
        assert_eq!(model_params.interest_rate, Dimensionless(0.05));
    }

    #[test]
    fn test_model_params_from_path() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(
                file,
                "temporal_resolution = \"typical_days_continuous_storage\"\n\
                objective = \"multi_objective\"\n\
                pareto_points = 3\n\
                retrofit_strategy = \"co_optimise\"\n\
                [solver]\n\
                time_limit = 60\n\
                random_seed = 42"
            )
            .unwrap();
        }

        let model_params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(
            model_params.temporal_resolution,
            TemporalResolution::TypicalDaysContinuousStorage
        );
        assert_eq!(model_params.objective, ObjectiveMode::MultiObjective);
        assert_eq!(model_params.pareto_points, 3);
        assert_eq!(model_params.retrofit_strategy, RetrofitStrategy::CoOptimise);
        assert_eq!(model_params.solver.time_limit, Some(60.0));
        assert_eq!(model_params.solver.random_seed, 42);
    }

    #[test]
    fn test_model_params_unknown_field() {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
            writeln!(file, "milestone_years = [2020]").unwrap();
        }

        assert!(ModelParameters::from_path(dir.path()).is_err());
    }

    #[rstest]
    #[case(ObjectiveMode::Cost, 0, true)]
    #[case(ObjectiveMode::MultiObjective, 2, true)]
    #[case(ObjectiveMode::MultiObjective, 1, false)]
    #[case(ObjectiveMode::MultiObjective, 0, false)]
    fn test_check_pareto_points(
        #[case] objective: ObjectiveMode,
        #[case] points: u32,
        #[case] expected_valid: bool,
    ) {
        let result = check_pareto_points(objective, points);
        assert_eq!(result.is_ok(), expected_valid);
        if let Err(err) = result {
            assert!(is_hub_error(&err, |e| matches!(e, HubError::Configuration(_))));
        }
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.05, true)]
    #[case(-0.01, false)]
    #[case(f64::NAN, false)]
    #[case(f64::INFINITY, false)]
    fn test_check_interest_rate(#[case] value: f64, #[case] expected_valid: bool) {
        assert_eq!(
            check_interest_rate(Dimensionless(value)).is_ok(),
            expected_valid
        );
    }

    #[rstest]
    #[case(Some(10.0), None, true)]
    #[case(Some(0.0), None, false)]
    #[case(None, Some(0.01), true)]
    #[case(None, Some(1.5), false)]
    fn test_check_solver_options(
        #[case] time_limit: Option<f64>,
        #[case] mip_rel_gap: Option<f64>,
        #[case] expected_valid: bool,
    ) {
        let options = SolverOptions {
            time_limit,
            mip_rel_gap,
            random_seed: 0,
        };
        assert_eq!(check_solver_options(&options).is_ok(), expected_valid);
    }

    #[rstest]
    #[case(1, ObjectiveMode::Cost)]
    #[case(2, ObjectiveMode::Emissions)]
    #[case(3, ObjectiveMode::MultiObjective)]
    fn test_objective_try_from(#[case] code: u32, #[case] expected: ObjectiveMode) {
        assert_eq!(ObjectiveMode::try_from(code).unwrap(), expected);
    }

    #[test]
    fn test_objective_try_from_bad() {
        assert!(matches!(
            ObjectiveMode::try_from(7),
            Err(HubError::Configuration(_))
        ));
    }
}
