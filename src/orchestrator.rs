//! Runs the model instances for every retrofit scenario and Pareto step.
//!
//! Each instance is built from scratch, solved and interpreted, with nothing carried over from
//! previous instances. Instances which turn out to be infeasible are recorded and skipped, unless
//! no instance at all is feasible; any other error aborts the run.
use crate::error::HubError;
use crate::model::{Model, ObjectiveMode, RetrofitStrategy};
use crate::optimisation::objective::epsilon_values;
use crate::optimisation::{
    HubProblem, HubSolution, Objective, ObjectiveKind, RetrofitChoice, Solver, add_cost_bound,
    add_emissions_bound,
};
use crate::retrofit::enumerate_scenarios;
use anyhow::Result;
use log::{debug, info, warn};

/// Label used for the scenario when retrofits are chosen by the optimiser
pub const CO_OPTIMISED_LABEL: &str = "co_optimised";

/// The lifecycle of a single model instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum RunState {
    /// Nothing done yet
    Init,
    /// Creating variables and constraints
    Building,
    /// Waiting for the solver
    Solving,
    /// Interpreting the solver's output
    Collecting,
    /// Finished, whether or not a feasible solution was found
    Done,
    /// Aborted by an unrecoverable error
    Failed,
}

/// The result of one model instance
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    /// An optimal solution was found
    Solved(Box<HubSolution>),
    /// No feasible solution exists. The payload explains why.
    Infeasible(String),
}

/// The record of one model instance
#[derive(Clone, Debug, PartialEq)]
pub struct RunRecord {
    /// Label of the retrofit scenario
    pub scenario: String,
    /// Position on the Pareto front (always zero for single-objective runs)
    pub pareto_step: u32,
    /// Upper bound on total emissions, for multi-objective runs
    pub epsilon: Option<f64>,
    /// What happened
    pub outcome: RunOutcome,
}

impl RunRecord {
    /// The solution, if one was found
    pub fn solution(&self) -> Option<&HubSolution> {
        match &self.outcome {
            RunOutcome::Solved(solution) => Some(solution.as_ref()),
            RunOutcome::Infeasible(_) => None,
        }
    }
}

/// The records of every instance in a run, in the order they were solved
#[derive(Clone, Debug, PartialEq)]
pub struct RunResults {
    /// The objective that was minimised
    pub objective: ObjectiveKind,
    /// One record per scenario and Pareto step
    pub records: Vec<RunRecord>,
}

impl RunResults {
    /// The solved record with the lowest objective value.
    ///
    /// Ties are resolved in favour of the earliest record.
    pub fn best(&self) -> Option<&RunRecord> {
        self.records
            .iter()
            .filter_map(|record| record.solution().map(|solution| (record, solution)))
            .reduce(|best, candidate| {
                if candidate.1.objective_value < best.1.objective_value {
                    candidate
                } else {
                    best
                }
            })
            .map(|(record, _)| record)
    }

    /// Iterate over the records for which a solution was found
    pub fn solved(&self) -> impl Iterator<Item = (&RunRecord, &HubSolution)> {
        self.records
            .iter()
            .filter_map(|record| record.solution().map(|solution| (record, solution)))
    }
}

/// A single model instance moving through its lifecycle
struct Instance<'a> {
    model: &'a Model,
    retrofit: RetrofitChoice<'a>,
    label: &'a str,
    cost_cap: Option<f64>,
    state: RunState,
}

impl<'a> Instance<'a> {
    fn new(model: &'a Model, retrofit: RetrofitChoice<'a>, label: &'a str) -> Self {
        Self {
            model,
            retrofit,
            label,
            cost_cap: None,
            state: RunState::Init,
        }
    }

    /// Keep total cost at or below `cost`
    fn with_cost_cap(self, cost: f64) -> Self {
        Self {
            cost_cap: Some(cost),
            ..self
        }
    }

    fn transition(&mut self, state: RunState) {
        debug!("Instance {}: {} -> {state}", self.label, self.state);
        self.state = state;
    }

    /// Build, solve and interpret the instance.
    ///
    /// Returns `Ok(Err(reason))` if the instance is infeasible.
    fn run(
        mut self,
        solver: &dyn Solver,
        kind: ObjectiveKind,
        epsilon: Option<f64>,
    ) -> Result<Result<HubSolution, String>> {
        self.transition(RunState::Building);
        let mut problem = match HubProblem::build(self.model, self.retrofit) {
            Ok(problem) => problem,
            Err(err) => {
                self.transition(RunState::Failed);
                return Err(err);
            }
        };
        if let Some(epsilon) = epsilon {
            add_emissions_bound(&mut problem.system, &problem.variables, epsilon);
        }
        if let Some(cost) = self.cost_cap {
            add_cost_bound(&mut problem.system, &problem.variables, cost);
        }
        let objective = Objective::new(kind, &problem.variables);

        self.transition(RunState::Solving);
        let output = match solver.solve(&problem.system, &objective) {
            Ok(output) => output,
            Err(err) if err.is_recoverable() => {
                self.transition(RunState::Done);
                return Ok(Err(err.to_string()));
            }
            Err(err) => {
                self.transition(RunState::Failed);
                return Err(err.into());
            }
        };

        self.transition(RunState::Collecting);
        let solution = HubSolution::from_output(&problem, &output, self.model, self.retrofit);
        self.transition(RunState::Done);

        Ok(Ok(solution))
    }
}

/// Convert the result of an instance into a record
fn make_record(
    label: &str,
    pareto_step: u32,
    epsilon: Option<f64>,
    result: Result<HubSolution, String>,
) -> RunRecord {
    let outcome = match result {
        Ok(solution) => {
            info!(
                "{label} (step {pareto_step}): cost {:.2}, emissions {:.2}",
                solution.total_cost().value(),
                solution.total_emissions().value()
            );
            RunOutcome::Solved(Box::new(solution))
        }
        Err(reason) => {
            warn!("{label} (step {pareto_step}): {reason}");
            RunOutcome::Infeasible(reason)
        }
    };

    RunRecord {
        scenario: label.to_string(),
        pareto_step,
        epsilon,
        outcome,
    }
}

/// Solve one retrofit choice with a single objective
fn run_single(
    model: &Model,
    solver: &dyn Solver,
    retrofit: RetrofitChoice,
    label: &str,
    kind: ObjectiveKind,
) -> Result<RunRecord> {
    let result = Instance::new(model, retrofit, label).run(solver, kind, None)?;
    Ok(make_record(label, 0, None, result))
}

/// Among the designs which reach the cost optimum, find the one with the lowest emissions.
///
/// Falls back to the cost optimum itself if the second solve fails to find a solution.
fn cleanest_cost_optimum(
    model: &Model,
    solver: &dyn Solver,
    retrofit: RetrofitChoice,
    label: &str,
    cost_optimum: HubSolution,
) -> Result<HubSolution> {
    let cost = cost_optimum.total_cost().value();
    let result = Instance::new(model, retrofit, label)
        .with_cost_cap(cost)
        .run(solver, ObjectiveKind::Emissions, None)?;

    match result {
        Ok(mut solution) => {
            debug!(
                "{label}: emissions at the cost optimum reduced from {} to {}",
                cost_optimum.total_emissions().value(),
                solution.total_emissions().value()
            );
            // This point belongs to a cost-minimising sweep
            solution.objective_value = solution.total_cost().value();
            Ok(solution)
        }
        Err(reason) => {
            warn!("{label}: could not break the tie at the cost optimum ({reason})");
            Ok(cost_optimum)
        }
    }
}

/// Trace the cost-emissions frontier for one retrofit choice with the epsilon-constraint method.
///
/// Step 0 is the cost-optimal solution with the lowest emissions. Each further step minimises cost
/// with total emissions bounded by the next epsilon, down to the minimum achievable emissions.
fn run_pareto_sweep(
    model: &Model,
    solver: &dyn Solver,
    retrofit: RetrofitChoice,
    label: &str,
) -> Result<Vec<RunRecord>> {
    let points = model.parameters.pareto_points;
    let cost_optimum =
        Instance::new(model, retrofit, label).run(solver, ObjectiveKind::Cost, None)?;
    let cost_optimum = match cost_optimum {
        Ok(solution) => solution,
        Err(reason) => {
            // Without a feasible cost optimum there is no frontier
            warn!("{label}: cost minimisation failed; skipping Pareto sweep");
            return Ok((0..points)
                .map(|step| make_record(label, step, None, Err(reason.clone())))
                .collect());
        }
    };

    let cost_optimum = cleanest_cost_optimum(model, solver, retrofit, label, cost_optimum)?;
    let max_emissions = cost_optimum.total_emissions().value();
    let min_emissions = match Instance::new(model, retrofit, label).run(
        solver,
        ObjectiveKind::Emissions,
        None,
    )? {
        Ok(solution) => solution.total_emissions().value(),
        Err(reason) => {
            warn!("{label}: emissions minimisation failed ({reason})");
            max_emissions
        }
    };
    debug!("{label}: emissions range from {min_emissions} to {max_emissions}");

    let epsilons = epsilon_values(max_emissions, min_emissions, points);
    let mut records = vec![make_record(label, 0, Some(epsilons[0]), Ok(cost_optimum))];
    for (step, epsilon) in (1..).zip(epsilons.into_iter().skip(1)) {
        let result = Instance::new(model, retrofit, label).run(
            solver,
            ObjectiveKind::Cost,
            Some(epsilon),
        )?;
        records.push(make_record(label, step, Some(epsilon), result));
    }

    Ok(records)
}

/// Solve one retrofit choice according to the objective mode
fn run_choice(
    model: &Model,
    solver: &dyn Solver,
    retrofit: RetrofitChoice,
    label: &str,
) -> Result<Vec<RunRecord>> {
    match model.parameters.objective {
        ObjectiveMode::MultiObjective => run_pareto_sweep(model, solver, retrofit, label),
        mode => Ok(vec![run_single(
            model,
            solver,
            retrofit,
            label,
            mode.into(),
        )?]),
    }
}

/// Run every model instance required by the model parameters.
///
/// # Arguments
///
/// * `model` - The model to run
/// * `solver` - The MILP solver to use
///
/// # Returns
///
/// The record of every instance. Fails with [`HubError::InfeasibleModel`] if no instance was
/// feasible (including a run with a single instance), or with any other error an instance raised.
pub fn run(model: &Model, solver: &dyn Solver) -> Result<RunResults> {
    let parameters = &model.parameters;
    info!(
        "Objective: {}; temporal resolution: {}; retrofit strategy: {}",
        parameters.objective, parameters.temporal_resolution, parameters.retrofit_strategy
    );

    let mut records = Vec::new();
    match parameters.retrofit_strategy {
        RetrofitStrategy::Enumerate => {
            let scenarios = enumerate_scenarios(&model.table.buildings);
            info!("Solving {} retrofit scenario(s)", scenarios.len());
            for scenario in &scenarios {
                let label = scenario.label();
                records.extend(run_choice(
                    model,
                    solver,
                    RetrofitChoice::Fixed(scenario),
                    &label,
                )?);
            }
        }
        RetrofitStrategy::CoOptimise => {
            records.extend(run_choice(
                model,
                solver,
                RetrofitChoice::CoOptimised,
                CO_OPTIMISED_LABEL,
            )?);
        }
    }

    let results = RunResults {
        objective: parameters.objective.into(),
        records,
    };
    let Some(best) = results.best() else {
        // There is nothing to report if no instance was feasible
        warn!(
            "None of the {} model instance(s) was feasible",
            results.records.len()
        );
        return Err(HubError::InfeasibleModel.into());
    };
    info!("Best solution: {} (step {})", best.scenario, best.pareto_step);

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HubError, is_hub_error};
    use crate::fixture::model;
    use crate::optimisation::{ConstraintSystem, ConstraintTag, HighsSolver, SolverOutput};
    use rstest::rstest;
    use std::cell::RefCell;

    /// A solver which always fails in the same way
    struct FailingSolver(HubError);

    impl Solver for FailingSolver {
        fn solve(
            &self,
            _system: &ConstraintSystem,
            _objective: &Objective,
        ) -> Result<SolverOutput, HubError> {
            Err(self.0.clone())
        }
    }

    /// Solves with HiGHS, but treats any problem with an emissions bound as infeasible
    struct NoEpsilonSolver;

    impl Solver for NoEpsilonSolver {
        fn solve(
            &self,
            system: &ConstraintSystem,
            objective: &Objective,
        ) -> Result<SolverOutput, HubError> {
            if system.row_counts()[&ConstraintTag::EpsilonBound] > 0 {
                return Err(HubError::InfeasibleModel);
            }
            HighsSolver::default().solve(system, objective)
        }
    }

    /// Solves with HiGHS and remembers what each problem asked for
    #[derive(Default)]
    struct RecordingSolver {
        calls: RefCell<Vec<(ObjectiveKind, usize, usize)>>,
    }

    impl Solver for RecordingSolver {
        fn solve(
            &self,
            system: &ConstraintSystem,
            objective: &Objective,
        ) -> Result<SolverOutput, HubError> {
            let counts = system.row_counts();
            self.calls.borrow_mut().push((
                objective.kind,
                counts[&ConstraintTag::CostBound],
                counts[&ConstraintTag::EpsilonBound],
            ));
            HighsSolver::default().solve(system, objective)
        }
    }

    #[rstest]
    fn test_run_enumerate(model: Model) {
        let results = run(&model, &HighsSolver::default()).unwrap();
        assert_eq!(results.objective, ObjectiveKind::Cost);
        let labels: Vec<_> = results.records.iter().map(|r| r.scenario.as_str()).collect();
        assert_eq!(labels, ["house=basic", "house=deep"]);
        assert!(results.records.iter().all(|r| r.pareto_step == 0));

        let best = results.best().unwrap().solution().unwrap();
        for (_, solution) in results.solved() {
            assert!(best.objective_value <= solution.objective_value);
        }
    }

    #[rstest]
    fn test_run_co_optimise_matches_enumerate(mut model: Model) {
        let enumerated = run(&model, &HighsSolver::default()).unwrap();
        model.parameters.retrofit_strategy = RetrofitStrategy::CoOptimise;
        let co_optimised = run(&model, &HighsSolver::default()).unwrap();

        assert_eq!(co_optimised.records.len(), 1);
        assert_eq!(co_optimised.records[0].scenario, CO_OPTIMISED_LABEL);
        let best_enumerated = enumerated.best().unwrap().solution().unwrap();
        let best_co_optimised = co_optimised.best().unwrap().solution().unwrap();
        assert!(
            (best_enumerated.objective_value - best_co_optimised.objective_value).abs()
                <= 1e-6 * best_enumerated.objective_value.abs().max(1.0)
        );
        assert_eq!(best_enumerated.retrofits, best_co_optimised.retrofits);
    }

    #[rstest]
    fn test_run_pareto(mut model: Model) {
        model.parameters.objective = ObjectiveMode::MultiObjective;
        model.parameters.pareto_points = 3;
        model.parameters.retrofit_strategy = RetrofitStrategy::CoOptimise;
        let results = run(&model, &HighsSolver::default()).unwrap();

        let steps: Vec<_> = results.records.iter().map(|r| r.pareto_step).collect();
        assert_eq!(steps, [0, 1, 2]);
        assert!(results.records.iter().all(|r| r.epsilon.is_some()));
        assert_eq!(results.solved().count(), 3);
    }

    #[rstest]
    fn test_run_pareto_cost_optimum_tie_break(mut model: Model) {
        model.parameters.objective = ObjectiveMode::MultiObjective;
        model.parameters.pareto_points = 3;
        model.parameters.retrofit_strategy = RetrofitStrategy::CoOptimise;
        let solver = RecordingSolver::default();
        let results = run(&model, &solver).unwrap();

        // Cost, then emissions capped at that cost, then plain emissions, then two bounded steps
        assert_eq!(
            *solver.calls.borrow(),
            [
                (ObjectiveKind::Cost, 0, 0),
                (ObjectiveKind::Emissions, 1, 0),
                (ObjectiveKind::Emissions, 0, 0),
                (ObjectiveKind::Cost, 0, 1),
                (ObjectiveKind::Cost, 0, 1),
            ]
        );

        // Step 0 is still reported against cost
        let step_0 = results.records[0].solution().unwrap();
        assert_eq!(step_0.objective_value, step_0.total_cost().value());
        assert_eq!(
            results.records[0].epsilon,
            Some(step_0.total_emissions().value())
        );
    }

    #[rstest]
    fn test_run_infeasible_steps_recorded(mut model: Model) {
        model.parameters.objective = ObjectiveMode::MultiObjective;
        model.parameters.pareto_points = 4;
        let results = run(&model, &NoEpsilonSolver).unwrap();

        // Two scenarios, four steps each, of which only the unbounded step 0 is solved
        assert_eq!(results.records.len(), 8);
        for record in &results.records {
            assert_eq!(
                matches!(record.outcome, RunOutcome::Solved(_)),
                record.pareto_step == 0
            );
        }
        assert_eq!(results.best().unwrap().pareto_step, 0);
    }

    #[rstest]
    fn test_run_all_infeasible_fails(mut model: Model) {
        model.parameters.objective = ObjectiveMode::MultiObjective;
        model.parameters.pareto_points = 4;
        let err = run(&model, &FailingSolver(HubError::InfeasibleModel)).unwrap_err();
        assert!(is_hub_error(&err, |err| *err == HubError::InfeasibleModel));
    }

    #[rstest]
    fn test_run_single_instance_infeasible_fails(mut model: Model) {
        model.parameters.objective = ObjectiveMode::Cost;
        model.parameters.retrofit_strategy = RetrofitStrategy::CoOptimise;
        let err = run(&model, &FailingSolver(HubError::InfeasibleModel)).unwrap_err();
        assert!(is_hub_error(&err, |err| *err == HubError::InfeasibleModel));
    }

    #[rstest]
    fn test_run_unbounded_fails(model: Model) {
        let err = run(&model, &FailingSolver(HubError::UnboundedModel)).unwrap_err();
        assert!(is_hub_error(&err, |err| *err == HubError::UnboundedModel));
    }
}
