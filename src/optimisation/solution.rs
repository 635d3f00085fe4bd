//! The solution of a single model instance, in model terms.
use super::problem::{ConstraintTag, HubProblem, RetrofitChoice, Variable};
use super::solver::SolverOutput;
use super::variables::StorageVariables;
use crate::carrier::CarrierID;
use crate::model::Model;
use crate::retrofit::{BuildingID, RetrofitID};
use crate::technology::{StorageID, StorageTechnology, TechnologyID};
use crate::time_step::{TemporalResolution, TimeStepInfo};
use crate::units::{Emissions, Money, Power};
use indexmap::IndexMap;

/// Binary variables above this value are treated as set
const BINARY_THRESHOLD: f64 = 0.5;

/// Operating series of a storage technology
#[derive(Clone, Debug, PartialEq)]
pub struct StorageSeries {
    /// The carrier stored
    pub carrier: CarrierID,
    /// Charging power for each time step
    pub charge: Vec<f64>,
    /// Discharging power for each time step
    pub discharge: Vec<f64>,
    /// Stored energy at the end of each time step.
    ///
    /// With continuous storage there is one value per hour of the calendar year instead.
    pub level: Vec<f64>,
}

/// Breakdown of the total annual cost
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostBreakdown {
    /// Annualised investment in technologies, storage, retrofits and the thermal network
    pub investment: Money,
    /// Operating cost net of export revenue
    pub operating: Money,
    /// Spending on carbon certificates
    pub certificates: Money,
    /// Total annual cost
    pub total: Money,
}

/// Breakdown of the net annual emissions
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmissionsBreakdown {
    /// Annualised embodied emissions
    pub embodied: Emissions,
    /// Emissions from grid imports
    pub operational: Emissions,
    /// Emissions offset by certificates
    pub offset: Emissions,
    /// Net annual emissions
    pub total: Emissions,
}

/// The optimal design and operation of the hub for one model instance
#[derive(Clone, Debug, PartialEq)]
pub struct HubSolution {
    /// The value of the objective which was minimised
    pub objective_value: f64,
    /// Installed capacity of each conversion technology
    pub technology_capacities: IndexMap<TechnologyID, Power>,
    /// Installed capacity of each storage technology
    pub storage_capacities: IndexMap<StorageID, Power>,
    /// Flow series per technology and carrier. Inputs are negative and outputs positive.
    pub dispatch: IndexMap<(TechnologyID, CarrierID), Vec<f64>>,
    /// Import series per grid-connected carrier
    pub imports: IndexMap<CarrierID, Vec<f64>>,
    /// Export series per grid-connected carrier
    pub exports: IndexMap<CarrierID, Vec<f64>>,
    /// Operating series per storage technology
    pub storage: IndexMap<StorageID, StorageSeries>,
    /// Cost breakdown
    pub costs: CostBreakdown,
    /// Emissions breakdown
    pub emissions: EmissionsBreakdown,
    /// The option used for each building
    pub retrofits: IndexMap<BuildingID, RetrofitID>,
    /// The number of rows of each kind in the instance
    pub row_counts: IndexMap<ConstraintTag, usize>,
}

impl HubSolution {
    /// Interpret the raw solver output for a model instance.
    ///
    /// # Arguments
    ///
    /// * `problem` - The instance which was solved
    /// * `output` - The solver's column values and objective
    /// * `model` - The model
    /// * `retrofit` - Whether retrofits were fixed or co-optimised
    pub fn from_output(
        problem: &HubProblem,
        output: &SolverOutput,
        model: &Model,
        retrofit: RetrofitChoice,
    ) -> Self {
        let vars = &problem.variables;
        let value = |var: Variable| output.values[var.index()];
        let series = |columns: &[Variable]| -> Vec<f64> {
            columns.iter().map(|var| value(*var)).collect()
        };
        let table = &model.table;

        let mut technology_capacities = IndexMap::new();
        let mut dispatch = IndexMap::new();
        for technology in table.technologies.values() {
            let tech_vars = &vars.technologies[&technology.id];
            technology_capacities.insert(technology.id.clone(), Power(value(tech_vars.capacity)));

            let input = series(&tech_vars.input).into_iter().map(|flow| -flow).collect();
            dispatch.insert((technology.id.clone(), technology.input.id.clone()), input);
            for (tech_output, flows) in technology.outputs.iter().zip(&tech_vars.outputs) {
                dispatch.insert(
                    (technology.id.clone(), tech_output.carrier.id.clone()),
                    series(flows),
                );
            }
        }

        let mut storage_capacities = IndexMap::new();
        let mut storage = IndexMap::new();
        for technology in table.storage.values() {
            let storage_vars = &vars.storage[&technology.id];
            storage_capacities.insert(technology.id.clone(), Power(value(storage_vars.capacity)));
            let level = storage_level(
                storage_vars,
                technology,
                &model.time_step_info,
                &output.values,
            );
            storage.insert(
                technology.id.clone(),
                StorageSeries {
                    carrier: technology.carrier.id.clone(),
                    charge: series(&storage_vars.charge),
                    discharge: series(&storage_vars.discharge),
                    level,
                },
            );
        }

        let imports = vars
            .grid
            .iter()
            .map(|(id, grid)| (id.clone(), series(&grid.import)))
            .collect();
        let exports = vars
            .grid
            .iter()
            .map(|(id, grid)| (id.clone(), series(&grid.export)))
            .collect();

        let certificates = Emissions(value(vars.certificates));
        let costs = CostBreakdown {
            investment: Money(value(vars.investment_cost)),
            operating: Money(value(vars.operating_cost)),
            certificates: table.certificate_cost(certificates),
            total: Money(value(vars.total_cost)),
        };
        let emissions = EmissionsBreakdown {
            embodied: Emissions(value(vars.embodied_emissions)),
            operational: Emissions(value(vars.operational_emissions)),
            offset: certificates,
            total: Emissions(value(vars.total_emissions)),
        };

        let retrofits = match retrofit {
            RetrofitChoice::Fixed(scenario) => scenario
                .selections
                .iter()
                .map(|(building_id, option)| (building_id.clone(), option.id.clone()))
                .collect(),
            RetrofitChoice::CoOptimised => vars
                .retrofits
                .iter()
                .filter_map(|(building_id, options)| {
                    options
                        .iter()
                        .find(|(_, var)| value(**var) > BINARY_THRESHOLD)
                        .map(|(option_id, _)| (building_id.clone(), option_id.clone()))
                })
                .collect(),
        };

        Self {
            objective_value: output.objective_value,
            technology_capacities,
            storage_capacities,
            dispatch,
            imports,
            exports,
            storage,
            costs,
            emissions,
            retrofits,
            row_counts: problem.system.row_counts(),
        }
    }

    /// Total annual cost
    pub fn total_cost(&self) -> Money {
        self.costs.total
    }

    /// Net annual emissions
    pub fn total_emissions(&self) -> Emissions {
        self.emissions.total
    }
}

/// The stored energy series of a storage technology.
///
/// For continuous storage the absolute level is reconstructed for every hour of the year from the
/// level at the start of each calendar day and the intraday change of its typical day.
fn storage_level(
    vars: &StorageVariables,
    storage: &StorageTechnology,
    time_step_info: &TimeStepInfo,
    values: &[f64],
) -> Vec<f64> {
    match time_step_info.resolution {
        TemporalResolution::TypicalDaysContinuousStorage => time_step_info
            .day_sequence()
            .iter()
            .zip(&vars.day_start)
            .flat_map(|(&day, start)| {
                let start = values[start.index()];
                time_step_info
                    .steps_of_day(day)
                    .enumerate()
                    .map(move |(hour, t)| {
                        storage.retention(hour + 1) * start + values[vars.level[t].index()]
                    })
            })
            .collect(),
        TemporalResolution::TypicalDays | TemporalResolution::FullYear => vars
            .level
            .iter()
            .map(|var| values[var.index()])
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{battery, model, parameter_table};
    use crate::model::ModelParameters;
    use crate::parameter_table::ParameterTable;
    use crate::retrofit::enumerate_scenarios;
    use crate::time_step::TypicalDays;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;
    use std::rc::Rc;

    #[rstest]
    fn test_from_output_fixed(model: Model) {
        let scenarios = enumerate_scenarios(&model.table.buildings);
        let retrofit = RetrofitChoice::Fixed(&scenarios[1]);
        let problem = HubProblem::build(&model, retrofit).unwrap();
        let vars = &problem.variables;

        let mut values = vec![0.0; problem.system.num_columns()];
        values[vars.technologies["boiler"].capacity.index()] = 3.0;
        values[vars.technologies["boiler"].input[5].index()] = 2.0;
        values[vars.total_cost.index()] = 42.0;
        values[vars.total_emissions.index()] = 7.0;
        let output = SolverOutput {
            values,
            objective_value: 42.0,
        };

        let solution = HubSolution::from_output(&problem, &output, &model, retrofit);
        assert_eq!(solution.technology_capacities["boiler"], Power(3.0));
        let key = |carrier: &str| (TechnologyID::from("boiler"), CarrierID::from(carrier));
        assert_eq!(solution.dispatch[&key("gas")][5], -2.0);
        assert_eq!(solution.dispatch[&key("heat")].len(), 24);
        assert_eq!(solution.imports.len(), 2);
        assert_eq!(solution.total_cost(), Money(42.0));
        assert_eq!(solution.total_emissions(), Emissions(7.0));
        assert_eq!(solution.retrofits["house"], RetrofitID::from("deep"));
        assert_eq!(solution.row_counts[&ConstraintTag::Cost], 3);
    }

    #[rstest]
    fn test_from_output_co_optimised(model: Model) {
        let problem = HubProblem::build(&model, RetrofitChoice::CoOptimised).unwrap();
        let mut values = vec![0.0; problem.system.num_columns()];
        values[problem.variables.retrofits["house"]["deep"].index()] = 1.0;
        let output = SolverOutput {
            values,
            objective_value: 0.0,
        };

        let solution =
            HubSolution::from_output(&problem, &output, &model, RetrofitChoice::CoOptimised);
        assert_eq!(solution.retrofits["house"], RetrofitID::from("deep"));
    }

    #[rstest]
    fn test_continuous_storage_level(
        mut parameter_table: ParameterTable,
        battery: StorageTechnology,
    ) {
        parameter_table
            .storage
            .insert(battery.id.clone(), Rc::new(battery));
        let parameters = ModelParameters {
            temporal_resolution: TemporalResolution::TypicalDaysContinuousStorage,
            ..ModelParameters::default()
        };
        let model = Model::new(
            parameters,
            parameter_table,
            Some(&TypicalDays::single(0).unwrap()),
        )
        .unwrap();
        let problem = HubProblem::build(&model, RetrofitChoice::CoOptimised).unwrap();
        let battery_vars = &problem.variables.storage["battery"];

        let mut values = vec![0.0; problem.system.num_columns()];
        values[battery_vars.day_start[1].index()] = 10.0;
        values[battery_vars.level[0].index()] = 1.0;
        let output = SolverOutput {
            values,
            objective_value: 0.0,
        };

        let solution =
            HubSolution::from_output(&problem, &output, &model, RetrofitChoice::CoOptimised);
        let level = &solution.storage["battery"].level;
        assert_eq!(level.len(), 8760);
        assert_approx_eq!(f64, level[0], 1.0);
        assert_approx_eq!(f64, level[24], 0.99 * 10.0 + 1.0);
        assert_approx_eq!(f64, level[25], 0.99 * 0.99 * 10.0);
    }
}
