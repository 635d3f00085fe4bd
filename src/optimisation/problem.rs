//! The solver-agnostic representation of a MILP and the entry point for building one.
use super::constraints::add_constraints;
use super::variables::{VariableMap, add_variables};
use crate::model::Model;
use crate::retrofit::RetrofitScenario;
use anyhow::Result;
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use std::ops::{Bound, RangeBounds};
use strum::IntoEnumIterator;

/// A decision variable in the optimisation.
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);

impl Variable {
    /// The index of the column for this variable
    pub fn index(self) -> usize {
        self.0
    }
}

/// A column of the problem
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Whether the variable must take an integer value
    pub integer: bool,
}

/// The family a constraint belongs to
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumIter,
)]
pub enum ConstraintTag {
    /// Supply equals demand for a carrier at a time step
    CarrierBalance,
    /// Primary output limited by capacity and availability
    Capacity,
    /// Roof-mounted capacity within the available roof area
    RoofArea,
    /// Capacity linked to a binary install indicator
    Installation,
    /// Outputs proportional to input
    Conversion,
    /// Storage level carried from one step (or day) to the next
    StorageBalance,
    /// Storage level within installed capacity
    StorageLevel,
    /// Charge and discharge power within rated limits
    StorageRate,
    /// No simultaneous charging and discharging
    MutualExclusion,
    /// Exactly one retrofit option per building
    RetrofitSelection,
    /// Definition of the emissions accounting variables
    Emissions,
    /// Definition of the cost accounting variables
    Cost,
    /// Upper bound on total emissions for a Pareto step
    EpsilonBound,
    /// Upper bound on total cost while emissions are minimised at the cost optimum
    CostBound,
}

/// A row of the problem: `lower <= Σ coefficient × variable <= upper`
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// What kind of constraint this is
    pub tag: ConstraintTag,
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Sparse coefficients
    pub terms: Vec<(Variable, f64)>,
}

impl Row {
    /// Evaluate the left-hand side for the given column values
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values[var.index()])
            .sum()
    }
}

/// Convert a range into a pair of lower and upper bounds
fn to_bounds(range: impl RangeBounds<f64>) -> (f64, f64) {
    let lower = match range.start_bound() {
        Bound::Included(&x) | Bound::Excluded(&x) => x,
        Bound::Unbounded => f64::NEG_INFINITY,
    };
    let upper = match range.end_bound() {
        Bound::Included(&x) | Bound::Excluded(&x) => x,
        Bound::Unbounded => f64::INFINITY,
    };

    (lower, upper)
}

/// A MILP in row form, independent of any particular solver
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstraintSystem {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl ConstraintSystem {
    /// Add a continuous variable with the given bounds
    pub fn add_column(&mut self, bounds: impl RangeBounds<f64>) -> Variable {
        let (lower, upper) = to_bounds(bounds);
        self.push_column(lower, upper, false)
    }

    /// Add a binary variable
    pub fn add_binary(&mut self) -> Variable {
        self.push_column(0.0, 1.0, true)
    }

    fn push_column(&mut self, lower: f64, upper: f64, integer: bool) -> Variable {
        self.columns.push(Column {
            lower,
            upper,
            integer,
        });
        Variable(self.columns.len() - 1)
    }

    /// Add a constraint
    pub fn add_row<I>(&mut self, tag: ConstraintTag, bounds: impl RangeBounds<f64>, terms: I)
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        let (lower, upper) = to_bounds(bounds);

        // Merge repeated variables and drop zero coefficients
        let terms = terms
            .into_iter()
            .sorted_by_key(|(var, _)| *var)
            .coalesce(|(var1, coeff1), (var2, coeff2)| {
                if var1 == var2 {
                    Ok((var1, coeff1 + coeff2))
                } else {
                    Err(((var1, coeff1), (var2, coeff2)))
                }
            })
            .filter(|(_, coeff)| *coeff != 0.0)
            .collect();

        self.rows.push(Row {
            tag,
            lower,
            upper,
            terms,
        });
    }

    /// The columns of the problem, in the order they were added
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The rows of the problem, in the order they were added
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// The number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// The number of binary columns
    pub fn num_binaries(&self) -> usize {
        self.columns.iter().filter(|col| col.integer).count()
    }

    /// The number of rows with each tag (including tags with no rows)
    pub fn row_counts(&self) -> IndexMap<ConstraintTag, usize> {
        ConstraintTag::iter()
            .map(|tag| (tag, self.rows.iter().filter(|row| row.tag == tag).count()))
            .collect()
    }

    /// Whether the given column values satisfy every bound and constraint within `tolerance`
    pub fn is_satisfied_by(&self, values: &[f64], tolerance: f64) -> bool {
        let columns_ok = self.columns.iter().zip(values).all(|(col, &value)| {
            value >= col.lower - tolerance
                && value <= col.upper + tolerance
                && (!col.integer || (value - value.round()).abs() <= tolerance)
        });
        let rows_ok = self.rows.iter().all(|row| {
            let activity = row.activity(values);
            activity >= row.lower - tolerance && activity <= row.upper + tolerance
        });

        values.len() == self.columns.len() && columns_ok && rows_ok
    }
}

/// How retrofit options enter a model instance
#[derive(Clone, Copy, Debug)]
pub enum RetrofitChoice<'a> {
    /// The retrofit options are fixed in advance
    Fixed(&'a RetrofitScenario),
    /// The optimiser picks one option per building with binary variables
    CoOptimised,
}

/// A fully built model instance, ready for an objective to be attached
#[derive(Debug)]
pub struct HubProblem {
    /// Columns and rows
    pub system: ConstraintSystem,
    /// Lookup from model quantities to columns
    pub variables: VariableMap,
}

impl HubProblem {
    /// Build the variables and constraints for one model instance.
    ///
    /// # Arguments
    ///
    /// * `model` - The model
    /// * `retrofit` - Whether retrofits are fixed or co-optimised
    pub fn build(model: &Model, retrofit: RetrofitChoice) -> Result<Self> {
        let mut system = ConstraintSystem::default();
        let variables = add_variables(&mut system, model, retrofit)?;
        add_constraints(&mut system, &variables, model, retrofit);
        debug!(
            "Built problem with {} columns ({} binary) and {} rows",
            system.num_columns(),
            system.num_binaries(),
            system.num_rows()
        );

        Ok(Self { system, variables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_system() {
        let mut system = ConstraintSystem::default();
        let x = system.add_column(0.0..);
        let y = system.add_binary();
        system.add_row(ConstraintTag::Capacity, ..=0.0, [(x, 1.0), (y, -10.0)]);
        system.add_row(ConstraintTag::Cost, 1.0..=1.0, [(y, 0.5), (x, 0.0), (y, 0.5)]);

        assert_eq!(system.num_columns(), 2);
        assert_eq!(system.num_binaries(), 1);
        assert_eq!(system.columns()[0].upper, f64::INFINITY);
        assert_eq!(system.rows()[0].lower, f64::NEG_INFINITY);

        // Repeated variables are merged and zero coefficients dropped
        assert_eq!(system.rows()[1].terms, [(y, 1.0)]);

        let counts = system.row_counts();
        assert_eq!(counts[&ConstraintTag::Capacity], 1);
        assert_eq!(counts[&ConstraintTag::Cost], 1);
        assert_eq!(counts[&ConstraintTag::CarrierBalance], 0);

        assert!(system.is_satisfied_by(&[5.0, 1.0], 1e-9));
        assert!(!system.is_satisfied_by(&[11.0, 1.0], 1e-9));
        assert!(!system.is_satisfied_by(&[0.0, 0.5], 1e-9));
    }
}
