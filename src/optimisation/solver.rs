//! The interface to MILP solvers and its implementation for HiGHS.
use super::objective::Objective;
use super::problem::ConstraintSystem;
use crate::error::HubError;
use crate::model::SolverOptions;
use highs::{HighsModelStatus, RowProblem as Problem, Sense};
use log::debug;

/// The raw result of a successful solve
#[derive(Clone, Debug, PartialEq)]
pub struct SolverOutput {
    /// The value of each column, in column order
    pub values: Vec<f64>,
    /// The optimal objective value
    pub objective_value: f64,
}

/// Something which can minimise an objective over a [`ConstraintSystem`]
pub trait Solver {
    /// Solve the problem to optimality.
    ///
    /// Infeasible and unbounded problems give [`HubError::InfeasibleModel`] and
    /// [`HubError::UnboundedModel`] respectively. Anything else which prevents an optimal solution
    /// being found gives [`HubError::Solver`].
    fn solve(
        &self,
        system: &ConstraintSystem,
        objective: &Objective,
    ) -> Result<SolverOutput, HubError>;
}

/// Solves problems with the HiGHS MILP solver
#[derive(Debug, Clone, Default)]
pub struct HighsSolver {
    options: SolverOptions,
}

impl HighsSolver {
    /// Create a new solver with the given options
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    fn apply_options(&self, model: &mut highs::Model) {
        model.set_option("output_flag", false);

        // A fixed seed gives the same solution for the same problem
        let seed = i32::try_from(self.options.random_seed).unwrap_or(i32::MAX);
        model.set_option("random_seed", seed);

        if let Some(time_limit) = self.options.time_limit {
            model.set_option("time_limit", time_limit);
        }
        if let Some(gap) = self.options.mip_rel_gap {
            model.set_option("mip_rel_gap", gap);
        }
    }
}

impl Solver for HighsSolver {
    fn solve(
        &self,
        system: &ConstraintSystem,
        objective: &Objective,
    ) -> Result<SolverOutput, HubError> {
        let mut costs = vec![0.0; system.num_columns()];
        for (var, coeff) in &objective.coefficients {
            costs[var.index()] += coeff;
        }

        let mut problem = Problem::default();
        let cols: Vec<_> = system
            .columns()
            .iter()
            .zip(costs)
            .map(|(column, cost)| {
                let bounds = column.lower..=column.upper;
                if column.integer {
                    problem.add_integer_column(cost, bounds)
                } else {
                    problem.add_column(cost, bounds)
                }
            })
            .collect();
        for row in system.rows() {
            problem.add_row(
                row.lower..=row.upper,
                row.terms.iter().map(|(var, coeff)| (cols[var.index()], *coeff)),
            );
        }

        let mut model = problem.optimise(Sense::Minimise);
        self.apply_options(&mut model);

        let solved = model
            .try_solve()
            .map_err(|status| HubError::Solver(format!("Incoherent model: {status:?}")))?;
        let status = solved.status();
        debug!("HiGHS finished with status {status:?}");

        match status {
            HighsModelStatus::Optimal => Ok(SolverOutput {
                values: solved.get_solution().columns().to_vec(),
                objective_value: solved.objective_value(),
            }),
            HighsModelStatus::Infeasible | HighsModelStatus::UnboundedOrInfeasible => {
                Err(HubError::InfeasibleModel)
            }
            HighsModelStatus::Unbounded => Err(HubError::UnboundedModel),
            status => Err(HubError::Solver(format!("Could not solve: {status:?}"))),
        }
    }
}
