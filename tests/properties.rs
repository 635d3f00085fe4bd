//! Checks that solutions respect the physics of the hub for every temporal resolution.
mod common;
use common::ModelDir;
use ehub::model::Model;
use ehub::optimisation::{
    HighsSolver, HubProblem, HubSolution, Objective, ObjectiveKind, RetrofitChoice, Solver,
};
use ehub::orchestrator;
use ehub::retrofit::enumerate_scenarios;
use ehub::time_step::TemporalResolution;
use float_cmp::{approx_eq, assert_approx_eq};
use rstest::rstest;

const TOLERANCE: f64 = 1e-5;

const STORAGE_HUB: &str = r#"
[carriers.elec]
network_efficiency = 0.9
grid = {import_price = "price", carbon_intensity = 0.1}

[carriers.solar]
type = "resource"

[technologies.pv]
input = "solar"
outputs = [{carrier = "elec", efficiency = 1}]
availability = "sun"
max_capacity = 20
investment_cost = 50
lifetime = 20

[storage.battery]
carrier = "elec"
charge_efficiency = 0.9
discharge_efficiency = 0.9
self_discharge = 0.01
max_charge_rate = 0.5
max_discharge_rate = 0.5
max_capacity = 100
investment_cost = 1
lifetime = 10

[buildings.site.retrofits.base]
demand = {elec = "load"}
"#;

fn price(hour: usize) -> f64 {
    if hour % 24 < 6 { 0.1 } else { 0.5 }
}

/// The grid pays for energy to be taken off its hands
fn negative_price(_hour: usize) -> f64 {
    -0.2
}

fn sun(hour: usize) -> f64 {
    let hour = (hour % 24) as f64;
    (std::f64::consts::PI * (hour - 6.0) / 12.0).sin().max(0.0)
}

fn load(hour: usize) -> f64 {
    5.0 + 3.0 * (std::f64::consts::PI * (hour % 24) as f64 / 12.0).cos()
}

/// Lower, flat demand at weekends
fn weekly_load(hour: usize) -> f64 {
    if is_weekend(hour / 24) { 2.0 } else { load(hour) }
}

fn is_weekend(day: usize) -> bool {
    day % 7 >= 5
}

fn model_toml(resolution: TemporalResolution) -> String {
    format!("temporal_resolution = \"{resolution}\"\n[solver]\nrandom_seed = 7")
}

fn storage_model(resolution: TemporalResolution) -> ModelDir {
    ModelDir::new(&model_toml(resolution), STORAGE_HUB)
        .with_profiles(&[("price", price), ("sun", sun), ("load", load)])
        .with_single_typical_day()
}

fn solve(model: &Model) -> HubSolution {
    let results = orchestrator::run(model, &HighsSolver::new(model.parameters.solver.clone()))
        .unwrap();
    results.records[0].solution().unwrap().clone()
}

fn check_carrier_balance(model: &Model, solution: &HubSolution) {
    let demand = &model.table.buildings["site"].retrofits["base"].demand["elec"];
    let demand = model.time_step_info.sample(demand);
    let battery = &solution.storage["battery"];
    for (t, demand) in demand.iter().enumerate() {
        let conversion: f64 = solution
            .dispatch
            .iter()
            .filter(|((_, carrier), _)| carrier.to_string() == "elec")
            .map(|(_, flows)| flows[t])
            .sum();
        let supply = conversion + solution.imports["elec"][t] - solution.exports["elec"][t]
            + battery.discharge[t]
            - battery.charge[t];
        assert_approx_eq!(f64, supply, demand / 0.9, epsilon = TOLERANCE);
    }
}

fn check_storage(model: &Model, solution: &HubSolution) {
    let battery = &solution.storage["battery"];
    let capacity = solution.storage_capacities["battery"].value();

    for (charge, discharge) in battery.charge.iter().zip(&battery.discharge) {
        assert!(
            charge.min(*discharge) <= TOLERANCE,
            "Charging {charge} and discharging {discharge} at once"
        );
        assert!(*charge <= 0.5 * capacity + TOLERANCE);
        assert!(*discharge <= 0.5 * capacity + TOLERANCE);
    }
    for level in &battery.level {
        assert!(*level >= -TOLERANCE && *level <= capacity + TOLERANCE);
    }

    // Each level follows from the previous one. Continuous levels run through the calendar year
    // and wrap from its last hour to its first; other levels wrap within their own day or year.
    let time_step_info = &model.time_step_info;
    let hours = battery.level.len();
    let continuous = time_step_info.resolution == TemporalResolution::TypicalDaysContinuousStorage;
    for hour in 0..hours {
        let (t, previous) = if continuous {
            let day = time_step_info.day_sequence()[hour / 24];
            (day * 24 + hour % 24, (hour + hours - 1) % hours)
        } else {
            (hour, time_step_info.previous(hour))
        };
        let expected =
            0.99 * battery.level[previous] + 0.9 * battery.charge[t] - battery.discharge[t] / 0.9;
        assert_approx_eq!(f64, battery.level[hour], expected, epsilon = TOLERANCE);
    }
}

#[rstest]
#[case(TemporalResolution::TypicalDays, 24)]
#[case(TemporalResolution::TypicalDaysContinuousStorage, 8760)]
#[case(TemporalResolution::FullYear, 8760)]
fn test_solution_properties(#[case] resolution: TemporalResolution, #[case] levels: usize) {
    let dir = storage_model(resolution);
    let model = dir.load();
    let solution = solve(&model);
    assert_eq!(solution.storage["battery"].level.len(), levels);

    check_carrier_balance(&model, &solution);
    check_storage(&model, &solution);
}

/// Cycling the battery burns off paid-for imports, so only the binaries stop it doing both at once
#[rstest]
#[case(TemporalResolution::TypicalDays)]
#[case(TemporalResolution::TypicalDaysContinuousStorage)]
fn test_no_simultaneous_charge_and_discharge(#[case] resolution: TemporalResolution) {
    let dir = ModelDir::new(&model_toml(resolution), STORAGE_HUB)
        .with_profiles(&[("price", negative_price), ("sun", sun), ("load", load)])
        .with_single_typical_day();
    let model = dir.load();
    let solution = solve(&model);

    let battery = &solution.storage["battery"];
    assert!(battery.charge.iter().sum::<f64>() > 1.0);
    assert!(battery.discharge.iter().sum::<f64>() > 1.0);
    for (charge, discharge) in battery.charge.iter().zip(&battery.discharge) {
        assert!(charge.min(*discharge) <= TOLERANCE);
    }
    check_carrier_balance(&model, &solution);
    check_storage(&model, &solution);
}

/// Weekdays and weekends are separate typical days which alternate through the calendar year
#[test]
fn test_continuous_storage_across_typical_days() {
    let resolution = TemporalResolution::TypicalDaysContinuousStorage;
    let dir = ModelDir::new(&model_toml(resolution), STORAGE_HUB)
        .with_profiles(&[("price", price), ("sun", sun), ("load", weekly_load)])
        .with_typical_days(|day| if is_weekend(day) { 5 } else { 0 });
    let model = dir.load();
    let time_step_info = &model.time_step_info;
    assert_eq!(time_step_info.days().len(), 2);
    assert_eq!(time_step_info.days()[0].weight, 261.0);
    assert_eq!(time_step_info.days()[1].weight, 104.0);
    assert_eq!(time_step_info.day_sequence()[..8], [0, 0, 0, 0, 0, 1, 1, 0]);
    assert_eq!(time_step_info.day_sequence()[364], 0);

    let solution = solve(&model);
    let battery = &solution.storage["battery"];
    assert_eq!(battery.level.len(), 8760);
    assert_eq!(battery.charge.len(), 48);

    // Levels chain from each calendar day into the next and from the last day back to the first
    check_carrier_balance(&model, &solution);
    check_storage(&model, &solution);
}

#[rstest]
#[case(TemporalResolution::TypicalDays)]
#[case(TemporalResolution::TypicalDaysContinuousStorage)]
fn test_solution_satisfies_constraints(#[case] resolution: TemporalResolution) {
    let dir = storage_model(resolution);
    let model = dir.load();
    let scenarios = enumerate_scenarios(&model.table.buildings);
    let problem = HubProblem::build(&model, RetrofitChoice::Fixed(&scenarios[0])).unwrap();
    let objective = Objective::new(ObjectiveKind::Cost, &problem.variables);
    let output = HighsSolver::default()
        .solve(&problem.system, &objective)
        .unwrap();
    assert!(problem.system.is_satisfied_by(&output.values, TOLERANCE));
}

#[test]
fn test_determinism() {
    let dir = storage_model(TemporalResolution::TypicalDays);
    let model = dir.load();
    let first = solve(&model);
    let second = solve(&model);
    assert!(approx_eq!(
        f64,
        first.objective_value,
        second.objective_value,
        epsilon = 1e-9
    ));
    assert_eq!(first.technology_capacities, second.technology_capacities);
}
