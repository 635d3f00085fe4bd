//! Code for adding constraints to a model instance.
use super::problem::{ConstraintSystem, ConstraintTag, RetrofitChoice, Variable};
use super::variables::{StorageVariables, VariableMap};
use crate::carrier::Carrier;
use crate::finance::{annualised_cost, annualised_emissions, capital_recovery_factor};
use crate::model::Model;
use crate::technology::StorageTechnology;
use crate::time_step::{HOURS_PER_DAY, TemporalResolution, TimeStepInfo};
use crate::units::{Money, Power};

/// Add all constraints for a model instance.
///
/// # Arguments
///
/// * `system` - The problem to add rows to
/// * `vars` - The variables in the problem
/// * `model` - The model
/// * `retrofit` - Whether retrofits are fixed or co-optimised
pub fn add_constraints(
    system: &mut ConstraintSystem,
    vars: &VariableMap,
    model: &Model,
    retrofit: RetrofitChoice,
) {
    for carrier in model.table.carriers.values() {
        if carrier.is_balanced() {
            add_carrier_balance_constraints(system, vars, model, retrofit, carrier);
        }
    }
    add_technology_constraints(system, vars, model);
    add_roof_area_constraint(system, vars, model);
    for storage in model.table.storage.values() {
        add_storage_constraints(
            system,
            &vars.storage[&storage.id],
            storage,
            &model.time_step_info,
        );
    }
    add_retrofit_selection_constraints(system, vars);
    add_emissions_constraints(system, vars, model, retrofit);
    add_cost_constraints(system, vars, model, retrofit);
}

/// Add one supply-demand balance per time step for the given carrier.
///
/// Building demand is grossed up by the carrier's network efficiency. With fixed retrofits the
/// demand is a constant on the right-hand side; with co-optimised retrofits each option's demand
/// is scaled by its selection variable.
fn add_carrier_balance_constraints(
    system: &mut ConstraintSystem,
    vars: &VariableMap,
    model: &Model,
    retrofit: RetrofitChoice,
    carrier: &Carrier,
) {
    let table = &model.table;
    let time_step_info = &model.time_step_info;
    let network_efficiency = carrier.network_efficiency.value();

    let mut fixed_demand = vec![0.0; time_step_info.len()];
    let mut selectable_demand: Vec<(Variable, Vec<f64>)> = Vec::new();
    match retrofit {
        RetrofitChoice::Fixed(scenario) => {
            for profile in scenario.demand_for(&carrier.id) {
                for (total, demand) in fixed_demand
                    .iter_mut()
                    .zip(time_step_info.sample(profile))
                {
                    *total += demand / network_efficiency;
                }
            }
        }
        RetrofitChoice::CoOptimised => {
            for (building_id, options) in &vars.retrofits {
                let building = &table.buildings[building_id];
                for (option_id, var) in options {
                    if let Some(profile) = building.retrofits[option_id].demand.get(&carrier.id) {
                        let demand = time_step_info
                            .sample(profile)
                            .into_iter()
                            .map(|demand| demand / network_efficiency)
                            .collect();
                        selectable_demand.push((*var, demand));
                    }
                }
            }
        }
    }

    for (t, demand) in fixed_demand.iter().enumerate() {
        let mut terms = Vec::new();
        for technology in table.technologies.values() {
            let tech_vars = &vars.technologies[&technology.id];
            for (output, flows) in technology.outputs.iter().zip(&tech_vars.outputs) {
                if output.carrier.id == carrier.id {
                    terms.push((flows[t], 1.0));
                }
            }
            if technology.input.id == carrier.id {
                terms.push((tech_vars.input[t], -1.0));
            }
        }

        if let Some(grid) = vars.grid.get(&carrier.id) {
            terms.push((grid.import[t], 1.0));
            terms.push((grid.export[t], -1.0));
        }

        for storage in table.storage.values() {
            if storage.carrier.id == carrier.id {
                let storage_vars = &vars.storage[&storage.id];
                terms.push((storage_vars.discharge[t], 1.0));
                terms.push((storage_vars.charge[t], -1.0));
            }
        }

        for (var, demand) in &selectable_demand {
            terms.push((*var, -demand[t]));
        }

        system.add_row(ConstraintTag::CarrierBalance, *demand..=*demand, terms);
    }
}

/// Add capacity, conversion and installation constraints for conversion technologies
fn add_technology_constraints(system: &mut ConstraintSystem, vars: &VariableMap, model: &Model) {
    let time_step_info = &model.time_step_info;
    for technology in model.table.technologies.values() {
        let tech_vars = &vars.technologies[&technology.id];
        let availability = time_step_info.sample(&technology.availability);

        for (t, availability) in availability.into_iter().enumerate() {
            // The primary output is the first
            system.add_row(
                ConstraintTag::Capacity,
                ..=0.0,
                [
                    (tech_vars.outputs[0][t], 1.0),
                    (tech_vars.capacity, -availability),
                ],
            );

            for (output, flows) in technology.outputs.iter().zip(&tech_vars.outputs) {
                system.add_row(
                    ConstraintTag::Conversion,
                    0.0..=0.0,
                    [
                        (flows[t], 1.0),
                        (tech_vars.input[t], -output.efficiency.value()),
                    ],
                );
            }
        }

        if let (Some(install), Some(max_capacity)) = (tech_vars.install, technology.max_capacity) {
            add_installation_constraints(
                system,
                tech_vars.capacity,
                install,
                technology.min_capacity,
                max_capacity,
            );
        }
    }
}

/// Roof-mounted technologies share the roof area of the site
fn add_roof_area_constraint(system: &mut ConstraintSystem, vars: &VariableMap, model: &Model) {
    let table = &model.table;
    let Some(roof_area) = table.site.roof_area else {
        return;
    };
    if !table.uses_roof_area() {
        return;
    }

    let terms = table
        .technologies
        .values()
        .filter(|technology| technology.roof_area_per_capacity.value() > 0.0)
        .map(|technology| {
            (
                vars.technologies[&technology.id].capacity,
                technology.roof_area_per_capacity.value(),
            )
        });
    system.add_row(ConstraintTag::RoofArea, ..=roof_area.value(), terms);
}

/// Link capacity to a binary install indicator: `min·y <= capacity <= max·y`
fn add_installation_constraints(
    system: &mut ConstraintSystem,
    capacity: Variable,
    install: Variable,
    min_capacity: Power,
    max_capacity: Power,
) {
    system.add_row(
        ConstraintTag::Installation,
        ..=0.0,
        [(capacity, 1.0), (install, -max_capacity.value())],
    );
    if min_capacity > Power(0.0) {
        system.add_row(
            ConstraintTag::Installation,
            0.0..,
            [(capacity, 1.0), (install, -min_capacity.value())],
        );
    }
}

/// Add the operating constraints of a storage technology
fn add_storage_constraints(
    system: &mut ConstraintSystem,
    vars: &StorageVariables,
    storage: &StorageTechnology,
    time_step_info: &TimeStepInfo,
) {
    let max_charge = storage.max_charge_power().value();
    let max_discharge = storage.max_discharge_power().value();
    for t in 0..time_step_info.len() {
        system.add_row(
            ConstraintTag::StorageRate,
            ..=0.0,
            [
                (vars.charge[t], 1.0),
                (vars.capacity, -storage.max_charge_rate.value()),
            ],
        );
        system.add_row(
            ConstraintTag::StorageRate,
            ..=0.0,
            [
                (vars.discharge[t], 1.0),
                (vars.capacity, -storage.max_discharge_rate.value()),
            ],
        );

        // Charging only if the indicator is set and discharging only if it is not
        system.add_row(
            ConstraintTag::MutualExclusion,
            ..=0.0,
            [(vars.charge[t], 1.0), (vars.charging[t], -max_charge)],
        );
        system.add_row(
            ConstraintTag::MutualExclusion,
            ..=max_discharge,
            [(vars.discharge[t], 1.0), (vars.charging[t], max_discharge)],
        );
    }

    match time_step_info.resolution {
        TemporalResolution::TypicalDaysContinuousStorage => {
            add_continuous_storage_constraints(system, vars, storage, time_step_info);
        }
        TemporalResolution::TypicalDays | TemporalResolution::FullYear => {
            add_cyclic_storage_constraints(system, vars, storage, time_step_info);
        }
    }

    if let Some(install) = vars.install {
        add_installation_constraints(
            system,
            vars.capacity,
            install,
            storage.min_capacity,
            storage.max_capacity,
        );
    }
}

/// The terms for energy entering the store during time step `t`
fn storage_flow_terms(
    vars: &StorageVariables,
    storage: &StorageTechnology,
    t: usize,
) -> [(Variable, f64); 2] {
    [
        (vars.charge[t], -storage.charge_efficiency.value()),
        (vars.discharge[t], 1.0 / storage.discharge_efficiency.value()),
    ]
}

/// Storage balance where each step follows on from its predecessor.
///
/// The predecessor of the first step of each typical day (or of the year) is the last one, so the
/// level is cyclic.
fn add_cyclic_storage_constraints(
    system: &mut ConstraintSystem,
    vars: &StorageVariables,
    storage: &StorageTechnology,
    time_step_info: &TimeStepInfo,
) {
    let retention = storage.retention(1);
    for t in 0..time_step_info.len() {
        let previous = time_step_info.previous(t);
        let mut terms = vec![(vars.level[t], 1.0), (vars.level[previous], -retention)];
        terms.extend(storage_flow_terms(vars, storage, t));
        system.add_row(ConstraintTag::StorageBalance, 0.0..=0.0, terms);

        system.add_row(
            ConstraintTag::StorageLevel,
            ..=0.0,
            [(vars.level[t], 1.0), (vars.capacity, -1.0)],
        );
    }
}

/// Storage balance for typical days with a level carried across the calendar year.
///
/// Within a typical day, `level` holds the change in stored energy since the start of the day.
/// The stored energy at the start of each calendar day is chained from the previous calendar day
/// using the change over its typical day. The chain wraps from the last calendar day to the first.
fn add_continuous_storage_constraints(
    system: &mut ConstraintSystem,
    vars: &StorageVariables,
    storage: &StorageTechnology,
    time_step_info: &TimeStepInfo,
) {
    let retention = storage.retention(1);
    for day in 0..time_step_info.days().len() {
        for t in time_step_info.steps_of_day(day) {
            let mut terms = vec![(vars.level[t], 1.0)];
            if time_step_info.get(t).hour > 0 {
                terms.push((vars.level[t - 1], -retention));
            }
            terms.extend(storage_flow_terms(vars, storage, t));
            system.add_row(ConstraintTag::StorageBalance, 0.0..=0.0, terms);
        }
    }

    let day_sequence = time_step_info.day_sequence();
    let daily_retention = storage.retention(HOURS_PER_DAY);
    for (calendar_day, &day) in day_sequence.iter().enumerate() {
        let steps = time_step_info.steps_of_day(day);
        let next_day = (calendar_day + 1) % day_sequence.len();
        system.add_row(
            ConstraintTag::StorageBalance,
            0.0..=0.0,
            [
                (vars.day_start[next_day], 1.0),
                (vars.day_start[calendar_day], -daily_retention),
                (vars.level[steps.end - 1], -1.0),
            ],
        );

        // The absolute level must lie within [0, capacity] for every hour of the year
        for (hour, t) in steps.enumerate() {
            let terms = [
                (vars.day_start[calendar_day], storage.retention(hour + 1)),
                (vars.level[t], 1.0),
            ];
            system.add_row(ConstraintTag::StorageLevel, 0.0.., terms);
            system.add_row(
                ConstraintTag::StorageLevel,
                ..=0.0,
                terms.into_iter().chain([(vars.capacity, -1.0)]),
            );
        }
    }
}

/// Exactly one option must be chosen for each building (co-optimised retrofits only)
fn add_retrofit_selection_constraints(system: &mut ConstraintSystem, vars: &VariableMap) {
    for options in vars.retrofits.values() {
        system.add_row(
            ConstraintTag::RetrofitSelection,
            1.0..=1.0,
            options.values().map(|var| (*var, 1.0)),
        );
    }
}

/// Define the embodied, operational and total emissions variables
fn add_emissions_constraints(
    system: &mut ConstraintSystem,
    vars: &VariableMap,
    model: &Model,
    retrofit: RetrofitChoice,
) {
    let table = &model.table;

    // Embodied emissions of installed capacity and retrofits, spread over their lifetimes
    let mut terms = vec![(vars.embodied_emissions, 1.0)];
    for technology in table.technologies.values() {
        let per_capacity =
            annualised_emissions(technology.embodied_emissions * Power(1.0), technology.lifetime);
        terms.push((vars.technologies[&technology.id].capacity, -per_capacity.value()));
    }
    for storage in table.storage.values() {
        let per_capacity =
            annualised_emissions(storage.embodied_emissions * Power(1.0), storage.lifetime);
        terms.push((vars.storage[&storage.id].capacity, -per_capacity.value()));
    }
    let mut fixed = 0.0;
    match retrofit {
        RetrofitChoice::Fixed(scenario) => {
            fixed = scenario
                .options()
                .map(|option| annualised_emissions(option.embodied_emissions, option.lifetime))
                .map(|emissions| emissions.value())
                .sum();
        }
        RetrofitChoice::CoOptimised => {
            for (building_id, options) in &vars.retrofits {
                let building = &table.buildings[building_id];
                for (option_id, var) in options {
                    let option = &building.retrofits[option_id];
                    let emissions =
                        annualised_emissions(option.embodied_emissions, option.lifetime);
                    terms.push((*var, -emissions.value()));
                }
            }
        }
    }
    system.add_row(ConstraintTag::Emissions, fixed..=fixed, terms);

    // Emissions from grid imports
    let mut terms = vec![(vars.operational_emissions, 1.0)];
    for (carrier_id, grid_vars) in &vars.grid {
        let Some(grid) = &table.carriers[carrier_id].grid else {
            continue;
        };
        let carbon_intensity = model.time_step_info.sample(&grid.carbon_intensity);
        for (step, (import, intensity)) in model
            .time_step_info
            .iter()
            .zip(grid_vars.import.iter().zip(carbon_intensity))
        {
            terms.push((*import, -step.annual_factor() * intensity));
        }
    }
    system.add_row(ConstraintTag::Emissions, 0.0..=0.0, terms);

    // Certificates offset emissions
    system.add_row(
        ConstraintTag::Emissions,
        0.0..=0.0,
        [
            (vars.total_emissions, 1.0),
            (vars.embodied_emissions, -1.0),
            (vars.operational_emissions, -1.0),
            (vars.certificates, 1.0),
        ],
    );
}

/// Define the investment, operating and total cost variables
fn add_cost_constraints(
    system: &mut ConstraintSystem,
    vars: &VariableMap,
    model: &Model,
    retrofit: RetrofitChoice,
) {
    let table = &model.table;
    let time_step_info = &model.time_step_info;
    let interest_rate = model.parameters.interest_rate;

    // Annualised investment in technologies, storage, retrofits and the thermal network
    let mut terms = vec![(vars.investment_cost, 1.0)];
    for technology in table.technologies.values() {
        let tech_vars = &vars.technologies[&technology.id];
        let crf = capital_recovery_factor(technology.lifetime, interest_rate);
        terms.push((
            tech_vars.capacity,
            -(crf * (technology.investment_cost * Power(1.0))).value(),
        ));
        if let Some(install) = tech_vars.install {
            terms.push((install, -(crf * technology.fixed_investment_cost).value()));
        }
    }
    for storage in table.storage.values() {
        let storage_vars = &vars.storage[&storage.id];
        let crf = capital_recovery_factor(storage.lifetime, interest_rate);
        terms.push((
            storage_vars.capacity,
            -(crf * (storage.investment_cost * Power(1.0))).value(),
        ));
        if let Some(install) = storage_vars.install {
            terms.push((install, -(crf * storage.fixed_investment_cost).value()));
        }
    }
    let mut fixed = table.site.network.as_ref().map_or(Money(0.0), |network| {
        annualised_cost(network.investment_cost(), network.lifetime, interest_rate)
    });
    match retrofit {
        RetrofitChoice::Fixed(scenario) => {
            fixed = fixed
                + scenario
                    .options()
                    .map(|option| {
                        annualised_cost(option.investment_cost, option.lifetime, interest_rate)
                    })
                    .sum::<Money>();
        }
        RetrofitChoice::CoOptimised => {
            for (building_id, options) in &vars.retrofits {
                let building = &table.buildings[building_id];
                for (option_id, var) in options {
                    let option = &building.retrofits[option_id];
                    let cost =
                        annualised_cost(option.investment_cost, option.lifetime, interest_rate);
                    terms.push((*var, -cost.value()));
                }
            }
        }
    }
    system.add_row(ConstraintTag::Cost, fixed.value()..=fixed.value(), terms);

    // Annual operating cost net of export revenue
    let mut terms = vec![(vars.operating_cost, 1.0)];
    for (carrier_id, grid_vars) in &vars.grid {
        let Some(grid) = &table.carriers[carrier_id].grid else {
            continue;
        };
        let import_price = time_step_info.sample(&grid.import_price);
        let export_price = time_step_info.sample(&grid.export_price);
        for (t, step) in time_step_info.iter().enumerate() {
            let factor = step.annual_factor();
            terms.push((grid_vars.import[t], -factor * import_price[t]));
            terms.push((grid_vars.export[t], factor * export_price[t]));
        }
    }
    for technology in table.technologies.values() {
        let operating_cost = technology.operating_cost.value();
        if operating_cost == 0.0 {
            continue;
        }

        let tech_vars = &vars.technologies[&technology.id];
        for (step, input) in time_step_info.iter().zip(&tech_vars.input) {
            terms.push((*input, -step.annual_factor() * operating_cost));
        }
    }
    system.add_row(ConstraintTag::Cost, 0.0..=0.0, terms);

    let certificate_price = table
        .certificates
        .as_ref()
        .map_or(0.0, |certificates| certificates.price.value());
    system.add_row(
        ConstraintTag::Cost,
        0.0..=0.0,
        [
            (vars.total_cost, 1.0),
            (vars.investment_cost, -1.0),
            (vars.operating_cost, -1.0),
            (vars.certificates, -certificate_price),
        ],
    );
}
