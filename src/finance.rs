//! General functions related to finance.
use crate::units::{Dimensionless, Emissions, Money};

/// Calculates the capital recovery factor (CRF) for a given lifetime and interest rate.
///
/// The CRF is used to annualise capital costs over the lifetime of a technology or retrofit.
pub fn capital_recovery_factor(lifetime: u32, interest_rate: Dimensionless) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if interest_rate == Dimensionless(0.0) {
        return Dimensionless(1.0) / Dimensionless(lifetime as f64);
    }
    let exponent = i32::try_from(lifetime).unwrap_or(i32::MAX);
    let factor = (Dimensionless(1.0) + interest_rate).powi(exponent);
    (interest_rate * factor) / (factor - Dimensionless(1.0))
}

/// Annualise a one-off investment cost
pub fn annualised_cost(cost: Money, lifetime: u32, interest_rate: Dimensionless) -> Money {
    cost * capital_recovery_factor(lifetime, interest_rate)
}

/// Spread embodied emissions evenly over the lifetime of whatever caused them
pub fn annualised_emissions(emissions: Emissions, lifetime: u32) -> Emissions {
    if lifetime == 0 {
        return Emissions(0.0);
    }

    emissions / Dimensionless(lifetime as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.05, 0.0)] // Edge case: lifetime==0
    #[case(10, 0.0, 0.1)] // Other edge case: interest_rate==0
    #[case(10, 0.05, 0.1295045749654567)]
    #[case(5, 0.03, 0.2183545714005762)]
    fn test_capital_recovery_factor(
        #[case] lifetime: u32,
        #[case] interest_rate: f64,
        #[case] expected: f64,
    ) {
        let result = capital_recovery_factor(lifetime, Dimensionless(interest_rate));
        assert_approx_eq!(f64, result.0, expected, epsilon = 1e-10);
    }

    #[rstest]
    #[case(1000.0, 10, 0.05, 129.5045749654567)]
    #[case(500.0, 5, 0.03, 109.17728570028798)]
    #[case(1000.0, 0, 0.05, 0.0)] // Zero lifetime
    #[case(2000.0, 20, 0.0, 100.0)] // Zero interest rate
    fn test_annualised_cost(
        #[case] cost: f64,
        #[case] lifetime: u32,
        #[case] interest_rate: f64,
        #[case] expected: f64,
    ) {
        let result = annualised_cost(Money(cost), lifetime, Dimensionless(interest_rate));
        assert_approx_eq!(Money, result, Money(expected), epsilon = 1e-8);
    }

    #[rstest]
    #[case(500.0, 25, 20.0)]
    #[case(500.0, 0, 0.0)]
    fn test_annualised_emissions(
        #[case] emissions: f64,
        #[case] lifetime: u32,
        #[case] expected: f64,
    ) {
        assert_approx_eq!(
            Emissions,
            annualised_emissions(Emissions(emissions), lifetime),
            Emissions(expected)
        );
    }
}
