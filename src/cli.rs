//! The command line interface for ehub.
use crate::input::load_model;
use crate::log;
use crate::model::{ModelParameters, ObjectiveMode};
use crate::optimisation::HighsSolver;
use crate::orchestrator;
use crate::output::metadata::write_metadata;
use crate::output::{DataWriter, create_output_directory, get_output_dir};
use crate::settings::Settings;
use crate::time_step::TemporalResolution;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod example;
use example::ExampleSubcommands;
pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for ehub.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options which override the contents of `model.toml`
#[derive(Args, Default)]
pub struct ModelOverrides {
    /// Temporal resolution (1: typical days, 2: full year, 3: typical days with continuous storage)
    #[arg(long, value_parser = parse_resolution)]
    pub resolution: Option<TemporalResolution>,
    /// Objective (1: cost, 2: emissions, 3: cost-emissions Pareto front)
    #[arg(long, value_parser = parse_objective)]
    pub objective: Option<ObjectiveMode>,
    /// Number of points on the Pareto front
    #[arg(long)]
    pub pareto_points: Option<u32>,
}

impl ModelOverrides {
    /// Apply the overrides to parameters read from file and check the result is still valid
    pub fn apply(&self, parameters: &mut ModelParameters) -> Result<()> {
        if let Some(resolution) = self.resolution {
            parameters.temporal_resolution = resolution;
        }
        if let Some(objective) = self.objective {
            parameters.objective = objective;
        }
        if let Some(points) = self.pareto_points {
            parameters.pareto_points = points;
        }

        parameters.validate()
    }
}

fn parse_resolution(code: &str) -> Result<TemporalResolution> {
    let code: u32 = code.parse()?;
    Ok(TemporalResolution::try_from(code)?)
}

fn parse_objective(code: &str) -> Result<ObjectiveMode> {
    let code: u32 = code.parse()?;
    Ok(ObjectiveMode::try_from(code)?)
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write the number of constraints of each kind to CSV files
    #[arg(long)]
    pub debug_model: bool,
    /// Overrides for the model parameters
    #[command(flatten)]
    pub overrides: ModelOverrides,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Optimise an energy hub model.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Manage example models.
    Example {
        /// The available subcommands for managing example models.
        #[command(subcommand)]
        subcommand: ExampleSubcommands,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
        /// Overrides for the model parameters
        #[command(flatten)]
        overrides: ModelOverrides,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Example { subcommand } => subcommand.execute(),
            Self::Validate {
                model_dir,
                overrides,
            } => handle_validate_command(&model_dir, &overrides, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start ehub
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ ehub --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Read the model parameters from file and apply any overrides
fn read_parameters(model_path: &Path, overrides: &ModelOverrides) -> Result<ModelParameters> {
    let mut parameters = ModelParameters::from_path(model_path)?;
    overrides
        .apply(&mut parameters)
        .context("Invalid command-line overrides.")?;

    Ok(parameters)
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let mut settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // These settings can be overridden by command-line arguments
    if opts.debug_model {
        settings.debug_model = true;
    }
    if opts.overwrite {
        settings.overwrite = true;
    }

    // Get path to output folder
    let pathbuf: PathBuf;
    let output_path = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(model_path)?;
        &pathbuf
    };

    let overwrite =
        create_output_directory(output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    // Initialise program logger
    log::init(Some(settings.log_level.as_str()), Some(output_path))
        .context("Failed to initialise logging.")?;

    // Load the model to run
    let parameters = read_parameters(model_path, &opts.overrides).context("Failed to load model.")?;
    let model = load_model(model_path, parameters).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let solver = HighsSolver::new(model.parameters.solver.clone());
    let results = orchestrator::run(&model, &solver).context("Failed to run model.")?;

    let mut writer = DataWriter::create(output_path, settings.debug_model)?;
    writer.write_results(&results)?;
    writer.flush()?;
    write_metadata(output_path, model_path, &model.parameters)
        .context("Failed to save metadata.")?;

    if let Some(record) = results.best() {
        info!(
            "Run complete! Lowest {} found for scenario {} (Pareto step {})",
            results.objective, record.scenario, record.pareto_step
        );
    }

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(
    model_path: &Path,
    overrides: &ModelOverrides,
    settings: Option<Settings>,
) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // Initialise program logger (we won't save log files when running the validate command)
    log::init(Some(settings.log_level.as_str()), None).context("Failed to initialise logging.")?;

    // Load/validate the model
    let parameters = read_parameters(model_path, overrides).context("Failed to validate model.")?;
    load_model(model_path, parameters).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
