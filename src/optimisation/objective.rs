//! Code for attaching objectives and Pareto bounds to a model instance.
use super::problem::{ConstraintSystem, ConstraintTag, Variable};
use super::variables::VariableMap;
use crate::model::ObjectiveMode;

/// Relative tolerance on an epsilon bound, so that the emissions minimum itself remains feasible
const EPSILON_TOLERANCE: f64 = 1e-6;

/// Relative tolerance on the cost cap. Any slack here can be traded for lower emissions, so it is
/// much tighter than [`EPSILON_TOLERANCE`].
const COST_CAP_TOLERANCE: f64 = 1e-9;

fn relaxed(bound: f64, tolerance: f64) -> f64 {
    bound + tolerance * bound.abs().max(1.0)
}

/// The quantity being minimised
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum ObjectiveKind {
    /// Total annual cost
    Cost,
    /// Net annual emissions
    Emissions,
}

impl From<ObjectiveMode> for ObjectiveKind {
    /// The primary objective for a mode. Pareto sweeps minimise cost under emissions bounds.
    fn from(mode: ObjectiveMode) -> Self {
        match mode {
            ObjectiveMode::Cost | ObjectiveMode::MultiObjective => ObjectiveKind::Cost,
            ObjectiveMode::Emissions => ObjectiveKind::Emissions,
        }
    }
}

/// A linear objective to be minimised
#[derive(Clone, Debug, PartialEq)]
pub struct Objective {
    /// What is being minimised
    pub kind: ObjectiveKind,
    /// Objective coefficients. Columns which are absent have a coefficient of zero.
    pub coefficients: Vec<(Variable, f64)>,
}

impl Objective {
    /// Create an objective minimising the given quantity
    pub fn new(kind: ObjectiveKind, vars: &VariableMap) -> Self {
        let var = match kind {
            ObjectiveKind::Cost => vars.total_cost,
            ObjectiveKind::Emissions => vars.total_emissions,
        };

        Self {
            kind,
            coefficients: vec![(var, 1.0)],
        }
    }
}

/// Bound total emissions from above for one step of a Pareto sweep.
///
/// A small tolerance is added so that a bound equal to the emissions minimum is not made
/// infeasible by solver round-off.
pub fn add_emissions_bound(system: &mut ConstraintSystem, vars: &VariableMap, epsilon: f64) {
    system.add_row(
        ConstraintTag::EpsilonBound,
        ..=relaxed(epsilon, EPSILON_TOLERANCE),
        [(vars.total_emissions, 1.0)],
    );
}

/// Bound total cost from above by the cost optimum.
///
/// Minimising emissions under this bound picks the cleanest of several cost-optimal designs.
pub fn add_cost_bound(system: &mut ConstraintSystem, vars: &VariableMap, cost: f64) {
    system.add_row(
        ConstraintTag::CostBound,
        ..=relaxed(cost, COST_CAP_TOLERANCE),
        [(vars.total_cost, 1.0)],
    );
}

/// The emissions bounds for a Pareto sweep, from the cost-optimal emissions down to the minimum.
///
/// # Arguments
///
/// * `max_emissions` - Emissions of the cost-optimal solution
/// * `min_emissions` - Emissions of the emissions-optimal solution
/// * `points` - Number of Pareto points (at least two)
pub fn epsilon_values(max_emissions: f64, min_emissions: f64, points: u32) -> Vec<f64> {
    let intervals = f64::from(points.saturating_sub(1).max(1));
    let step = (max_emissions - min_emissions) / intervals;

    (0..points)
        .map(|k| {
            if k + 1 == points {
                min_emissions
            } else {
                max_emissions - f64::from(k) * step
            }
        })
        .collect()
}
