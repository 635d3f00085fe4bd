//! Code for formulating and solving the energy hub MILP.
//!
//! A model instance is built as a solver-agnostic [`ConstraintSystem`] for one retrofit scenario
//! (or with retrofits chosen by the optimiser) and then handed to a [`Solver`] together with an
//! [`Objective`]. The solver's raw column values are turned back into a [`HubSolution`].
pub mod constraints;
pub mod objective;
pub mod problem;
pub mod solution;
pub mod solver;
pub mod variables;

pub use objective::{Objective, ObjectiveKind, add_cost_bound, add_emissions_bound};
pub use problem::{ConstraintSystem, ConstraintTag, HubProblem, RetrofitChoice, Variable};
pub use solution::HubSolution;
pub use solver::{HighsSolver, Solver, SolverOutput};
pub use variables::VariableMap;
