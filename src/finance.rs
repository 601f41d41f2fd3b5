//! General functions related to finance.
//!
//! All functions here are pure: every economic figure in the results can be
//! reproduced from the logged inputs.
use crate::units::{Dimensionless, Energy, Money, MoneyPerCapacity, MoneyPerEnergy};

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is used to annualise capital costs over the lifetime of an asset:
///
/// `CRF(r, n) = r(1+r)^n / ((1+r)^n - 1)`
///
/// For a zero discount rate this reduces to `1/n`.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Dimensionless) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if discount_rate == Dimensionless(0.0) {
        return Dimensionless(1.0) / Dimensionless(lifetime as f64);
    }
    let factor = (Dimensionless(1.0) + discount_rate).powi(lifetime as i32);
    (discount_rate * factor) / (factor - Dimensionless(1.0))
}

/// Calculates the annualised capital cost per unit of capacity.
pub fn annual_capital_cost(
    capital_cost: MoneyPerCapacity,
    lifetime: u32,
    discount_rate: Dimensionless,
) -> MoneyPerCapacity {
    let crf = capital_recovery_factor(lifetime, discount_rate);
    capital_cost * crf
}

/// Calculates the net present value of a constant annual operating cost.
///
/// `NPV = opex · (1 - (1+r)^-years) / r`, or `opex · years` for `r = 0`.
pub fn npv_of_annual_cost(annual_cost: Money, years: u32, discount_rate: Dimensionless) -> Money {
    if discount_rate == Dimensionless(0.0) {
        return annual_cost * Dimensionless(years as f64);
    }
    let annuity = (Dimensionless(1.0)
        - (Dimensionless(1.0) + discount_rate).powi(-(years as i32)))
        / discount_rate;
    annual_cost * annuity
}

/// Calculates the levelised cost of energy over the planning horizon.
///
/// Returns `None` when no energy was served, so callers cannot divide by zero
/// unnoticed.
pub fn levelised_cost(
    total_npv: Money,
    annual_energy_served: Energy,
    years: u32,
) -> Option<MoneyPerEnergy> {
    if annual_energy_served.value() <= 0.0 {
        return None;
    }
    Some(total_npv / (annual_energy_served * Dimensionless(years as f64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.05, 0.0)] // Edge case: lifetime==0
    #[case(10, 0.0, 0.1)] // Other edge case: discount_rate==0
    #[case(20, 0.08, 0.10185221)] // Reference value for the base configuration
    #[case(25, 0.08, 0.09367878)]
    #[case(15, 0.08, 0.11682954)]
    fn test_capital_recovery_factor(
        #[case] lifetime: u32,
        #[case] discount_rate: f64,
        #[case] expected: f64,
    ) {
        let result = capital_recovery_factor(lifetime, Dimensionless(discount_rate));
        assert_approx_eq!(f64, result.0, expected, epsilon = 1e-7);
    }

    #[test]
    fn test_crf_round_trips_against_annuity() {
        // CRF(r, n) multiplied by the annuity factor must equal one
        let r = Dimensionless(0.08);
        let crf = capital_recovery_factor(20, r);
        let annuity = npv_of_annual_cost(Money(1.0), 20, r);
        assert_approx_eq!(f64, crf.0 * annuity.0, 1.0, epsilon = 1e-10);
    }

    #[rstest]
    #[case(1500.0, 25, 0.08, 140.51817356)] // wind turbine base parameters
    #[case(2000.0, 20, 0.0, 100.0)] // Zero discount rate
    #[case(1000.0, 0, 0.05, 0.0)] // Zero lifetime
    fn test_annual_capital_cost(
        #[case] capital_cost: f64,
        #[case] lifetime: u32,
        #[case] discount_rate: f64,
        #[case] expected: f64,
    ) {
        let result = annual_capital_cost(
            MoneyPerCapacity(capital_cost),
            lifetime,
            Dimensionless(discount_rate),
        );
        assert_approx_eq!(f64, result.0, expected, epsilon = 1e-8);
    }

    #[rstest]
    #[case(10000.0, 30, 0.08, 112577.833)]
    #[case(10000.0, 30, 0.0, 300000.0)]
    fn test_npv_of_annual_cost(
        #[case] annual: f64,
        #[case] years: u32,
        #[case] rate: f64,
        #[case] expected: f64,
    ) {
        let result = npv_of_annual_cost(Money(annual), years, Dimensionless(rate));
        assert_approx_eq!(f64, result.0, expected, epsilon = 1e-2);
    }

    #[test]
    fn test_npv_monotonic_in_years_and_opex() {
        let r = Dimensionless(0.08);
        let mut prev = Money(0.0);
        for years in 1..=50 {
            let npv = npv_of_annual_cost(Money(1000.0), years, r);
            assert!(npv > prev);
            prev = npv;
        }
        assert!(
            npv_of_annual_cost(Money(2000.0), 30, r) > npv_of_annual_cost(Money(1000.0), 30, r)
        );
    }

    #[test]
    fn test_levelised_cost() {
        let lcoe = levelised_cost(Money(3_000_000.0), Energy(1000.0), 30).unwrap();
        assert_approx_eq!(f64, lcoe.0, 100.0);

        assert!(levelised_cost(Money(1.0), Energy(0.0), 30).is_none());
    }
}
