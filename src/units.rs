//! This module defines various unit types and their conversions.
//!
//! Quantities in input files are assumed to use consistent units (e.g. kW for power, kWh for
//! energy, kg CO₂ for emissions, m² for area, m for length and a single currency for money).
use float_cmp::{ApproxEq, F64Margin};
use serde::{Deserialize, Serialize};

/// Represents a dimensionless quantity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Default,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
pub struct Dimensionless(pub f64);

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

impl std::ops::Div for Dimensionless {
    type Output = Dimensionless;

    fn div(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 / rhs.0)
    }
}

impl Dimensionless {
    /// Raise to an integer power
    pub fn powi(self, rhs: i32) -> Self {
        Dimensionless(self.0.powi(rhs))
    }

    /// Returns the value as a f64.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Dimensionless {
    fn from(val: f64) -> Self {
        Self(val)
    }
}

impl ApproxEq for Dimensionless {
    type Margin = F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        self.0.approx_eq(other.0, margin)
    }
}

macro_rules! unit_struct {
    ($name:ident) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Mul<$name> for Dimensionless {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                $name(iter.map(|x| x.0).sum())
            }
        }

        impl ApproxEq for $name {
            type Margin = F64Margin;

            fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
                self.0.approx_eq(other.0, margin)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

// Base quantities
unit_struct!(Money);
unit_struct!(Energy);
unit_struct!(Power);
unit_struct!(Emissions);
unit_struct!(Area);
unit_struct!(Length);

// Derived quantities
unit_struct!(MoneyPerEnergy);
unit_struct!(MoneyPerPower);
unit_struct!(MoneyPerEmissions);
unit_struct!(MoneyPerLength);
unit_struct!(EmissionsPerPower);
unit_struct!(AreaPerPower);

// Division rules
impl_div!(Money, Energy, MoneyPerEnergy);
impl_div!(Money, Power, MoneyPerPower);
impl_div!(Money, Emissions, MoneyPerEmissions);
impl_div!(Money, Length, MoneyPerLength);
impl_div!(Emissions, Power, EmissionsPerPower);
impl_div!(Area, Power, AreaPerPower);

// Multiplication rules
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(MoneyPerPower, Power, Money);
impl_mul!(MoneyPerEmissions, Emissions, Money);
impl_mul!(MoneyPerLength, Length, Money);
impl_mul!(EmissionsPerPower, Power, Emissions);
impl_mul!(AreaPerPower, Power, Area);

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_mul_and_div() {
        let cost = MoneyPerPower(800.0) * Power(5.0);
        assert_approx_eq!(Money, cost, Money(4000.0));
        assert_approx_eq!(MoneyPerPower, cost / Power(5.0), MoneyPerPower(800.0));

        let area = Power(100.0) * AreaPerPower(6.5);
        assert_approx_eq!(Area, area, Area(650.0));

        let network = MoneyPerLength(250.0) * Length(400.0);
        assert_approx_eq!(Money, network, Money(100000.0));
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money(1.0), Money(2.5)].into_iter().sum();
        assert_eq!(total, Money(3.5));
    }
}
