//! Code for adding decision variables to a model instance.
use super::problem::{ConstraintSystem, RetrofitChoice, Variable};
use crate::carrier::CarrierID;
use crate::model::Model;
use crate::retrofit::{BuildingID, RetrofitID};
use crate::technology::{StorageID, StorageTechnology, Technology, TechnologyID};
use crate::time_step::{TemporalResolution, TimeStepInfo};
use anyhow::Result;
use indexmap::IndexMap;

/// Variables relating to a conversion technology
#[derive(Debug)]
pub struct TechnologyVariables {
    /// Installed capacity
    pub capacity: Variable,
    /// Binary install indicator, if needed
    pub install: Option<Variable>,
    /// Input flow for each time step
    pub input: Vec<Variable>,
    /// Output flows for each output (in declaration order), then for each time step
    pub outputs: Vec<Vec<Variable>>,
}

/// Variables relating to a storage technology
#[derive(Debug)]
pub struct StorageVariables {
    /// Installed capacity
    pub capacity: Variable,
    /// Binary install indicator, if needed
    pub install: Option<Variable>,
    /// Charging power for each time step
    pub charge: Vec<Variable>,
    /// Discharging power for each time step
    pub discharge: Vec<Variable>,
    /// Binary charging indicator for each time step
    pub charging: Vec<Variable>,
    /// Stored energy at the end of each time step.
    ///
    /// With continuous storage, this is instead the change in stored energy since the start of the
    /// typical day.
    pub level: Vec<Variable>,
    /// Stored energy at the start of each calendar day (continuous storage only)
    pub day_start: Vec<Variable>,
}

/// Variables relating to the grid connection of a carrier
#[derive(Debug)]
pub struct GridVariables {
    /// Imported power for each time step
    pub import: Vec<Variable>,
    /// Exported power for each time step
    pub export: Vec<Variable>,
}

/// A map for easy lookup of variables in the problem
#[derive(Debug)]
pub struct VariableMap {
    /// Variables for each conversion technology
    pub technologies: IndexMap<TechnologyID, TechnologyVariables>,
    /// Variables for each storage technology
    pub storage: IndexMap<StorageID, StorageVariables>,
    /// Variables for each carrier with a grid connection
    pub grid: IndexMap<CarrierID, GridVariables>,
    /// Binary selection variables per building and retrofit option (co-optimised retrofits only)
    pub retrofits: IndexMap<BuildingID, IndexMap<RetrofitID, Variable>>,
    /// Quantity of carbon certificates bought
    pub certificates: Variable,
    /// Annualised investment cost of technologies, storage and retrofits
    pub investment_cost: Variable,
    /// Annual operating cost (net of export revenue)
    pub operating_cost: Variable,
    /// Total annual cost
    pub total_cost: Variable,
    /// Annualised embodied emissions
    pub embodied_emissions: Variable,
    /// Annual emissions from imports
    pub operational_emissions: Variable,
    /// Net annual emissions
    pub total_emissions: Variable,
}

fn add_columns(
    system: &mut ConstraintSystem,
    count: usize,
    lower: f64,
    upper: f64,
) -> Vec<Variable> {
    (0..count).map(|_| system.add_column(lower..=upper)).collect()
}

fn add_technology_variables(
    system: &mut ConstraintSystem,
    technology: &Technology,
    time_step_info: &TimeStepInfo,
) -> Result<TechnologyVariables> {
    let install = if technology.needs_install_indicator() {
        technology.big_m()?;
        Some(system.add_binary())
    } else {
        None
    };
    let max_capacity = technology.max_capacity.map_or(f64::INFINITY, |cap| cap.value());
    let capacity = system.add_column(0.0..=max_capacity);
    let input = add_columns(system, time_step_info.len(), 0.0, f64::INFINITY);
    let outputs = technology
        .outputs
        .iter()
        .map(|_| add_columns(system, time_step_info.len(), 0.0, f64::INFINITY))
        .collect();

    Ok(TechnologyVariables {
        capacity,
        install,
        input,
        outputs,
    })
}

fn add_storage_variables(
    system: &mut ConstraintSystem,
    storage: &StorageTechnology,
    time_step_info: &TimeStepInfo,
) -> StorageVariables {
    let steps = time_step_info.len();
    let max_capacity = storage.max_capacity.value();
    let install = storage
        .needs_install_indicator()
        .then(|| system.add_binary());
    let capacity = system.add_column(0.0..=max_capacity);
    let charge = add_columns(system, steps, 0.0, storage.max_charge_power().value());
    let discharge = add_columns(system, steps, 0.0, storage.max_discharge_power().value());
    let charging = (0..steps).map(|_| system.add_binary()).collect();

    let (level, day_start) = match time_step_info.resolution {
        TemporalResolution::TypicalDaysContinuousStorage => (
            // Intraday changes can be negative
            add_columns(system, steps, -max_capacity, max_capacity),
            add_columns(
                system,
                time_step_info.day_sequence().len(),
                0.0,
                max_capacity,
            ),
        ),
        TemporalResolution::TypicalDays | TemporalResolution::FullYear => {
            (add_columns(system, steps, 0.0, max_capacity), Vec::new())
        }
    };

    StorageVariables {
        capacity,
        install,
        charge,
        discharge,
        charging,
        level,
        day_start,
    }
}

/// Add all variables for a model instance.
///
/// # Arguments
///
/// * `system` - The problem to add columns to
/// * `model` - The model
/// * `retrofit` - Whether retrofits are fixed or co-optimised
///
/// # Returns
///
/// A [`VariableMap`] with the problem's variables as values.
pub fn add_variables(
    system: &mut ConstraintSystem,
    model: &Model,
    retrofit: RetrofitChoice,
) -> Result<VariableMap> {
    let table = &model.table;
    let time_step_info = &model.time_step_info;

    let mut technologies = IndexMap::new();
    for technology in table.technologies.values() {
        let vars = add_technology_variables(system, technology, time_step_info)?;
        technologies.insert(technology.id.clone(), vars);
    }

    let storage = table
        .storage
        .values()
        .map(|storage| {
            (
                storage.id.clone(),
                add_storage_variables(system, storage, time_step_info),
            )
        })
        .collect();

    let grid = table
        .carriers
        .values()
        .filter_map(|carrier| carrier.grid.as_ref().map(|grid| (carrier, grid)))
        .map(|(carrier, grid)| {
            let max_import = grid.max_import.map_or(f64::INFINITY, |p| p.value());
            let vars = GridVariables {
                import: add_columns(system, time_step_info.len(), 0.0, max_import),
                export: add_columns(system, time_step_info.len(), 0.0, grid.max_export.value()),
            };
            (carrier.id.clone(), vars)
        })
        .collect();

    let retrofits = match retrofit {
        RetrofitChoice::Fixed(_) => IndexMap::new(),
        RetrofitChoice::CoOptimised => table
            .buildings
            .values()
            .map(|building| {
                let options = building
                    .retrofits
                    .keys()
                    .map(|id| (id.clone(), system.add_binary()))
                    .collect();
                (building.id.clone(), options)
            })
            .collect(),
    };

    let max_certificates = table
        .certificates
        .as_ref()
        .map_or(0.0, |certificates| certificates.max_quantity.value());

    Ok(VariableMap {
        technologies,
        storage,
        grid,
        retrofits,
        certificates: system.add_column(0.0..=max_certificates),
        investment_cost: system.add_column(0.0..),
        operating_cost: system.add_column(..),
        total_cost: system.add_column(..),
        embodied_emissions: system.add_column(0.0..),
        operational_emissions: system.add_column(0.0..),
        total_emissions: system.add_column(0.0..),
    })
}
