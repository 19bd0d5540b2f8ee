//! Billing arithmetic.
//!
//! CRITICAL: Never use floating-point for money calculations. Amounts are
//! `rust_decimal::Decimal` throughout, fixed to 2 decimal places with
//! round-half-up at the point each amount is derived (gross, then tax, then
//! net) rather than only at the final aggregate.

use rust_decimal::{Decimal, RoundingStrategy};

use super::types::{ClientSubtotal, ClosureTotals};

/// Rounds a monetary amount to 2 decimal places, half-up.
#[must_use]
pub fn round_half_up_2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Gross, tax, and net amounts billed for a block of hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BilledAmounts {
    /// Hours × rate, rounded.
    pub gross: Decimal,
    /// Gross × percentage / 100, rounded.
    pub tax: Decimal,
    /// Gross − tax.
    pub net: Decimal,
}

/// Computes the billed amounts for `total_hours` at `hourly_rate` with
/// `tax_percentage` withheld.
///
/// Each amount is rounded as it is derived, so the net is always exactly
/// gross minus tax at 2 decimal places.
#[must_use]
pub fn bill(total_hours: Decimal, hourly_rate: Decimal, tax_percentage: Decimal) -> BilledAmounts {
    let gross = round_half_up_2(total_hours * hourly_rate);
    let tax = round_half_up_2(gross * tax_percentage / Decimal::ONE_HUNDRED);
    let net = gross - tax;

    BilledAmounts { gross, tax, net }
}

/// Derives read-time aggregates from a closure's snapshot rows.
#[must_use]
pub fn totals(clients: &[ClientSubtotal], expense_amounts: &[Decimal]) -> ClosureTotals {
    let total_hours = clients.iter().map(|c| c.total_hours).sum();
    let gross_amount = clients.iter().map(|c| c.gross_amount).sum();
    let tax_amount = clients.iter().map(|c| c.tax_amount).sum();
    let net_amount: Decimal = clients.iter().map(|c| c.net_amount).sum();
    let total_expenses: Decimal = expense_amounts.iter().copied().sum();

    ClosureTotals {
        total_hours,
        gross_amount,
        tax_amount,
        net_amount,
        total_expenses,
        final_amount: net_amount - total_expenses,
    }
}


/// Property-based tests for billing arithmetic.
#[cfg(test)]
mod props {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for hour counts: 0 to 500 hours in quarter-hour steps.
    fn hours_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=2000).prop_map(|n| Decimal::new(n * 25, 2))
    }

    /// Strategy for hourly rates: 0.01 to 1000.00.
    fn rate_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100_000).prop_map(|n| Decimal::new(n, 2))
    }

    /// Strategy for tax percentages: 0.00 to 100.00.
    fn tax_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=10_000).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Net is always exactly gross minus tax.
        #[test]
        fn prop_net_is_gross_minus_tax(
            hours in hours_strategy(),
            rate in rate_strategy(),
            tax in tax_strategy(),
        ) {
            let billed = bill(hours, rate, tax);
            prop_assert_eq!(billed.net, billed.gross - billed.tax);
        }

        /// Tax never exceeds gross and is never negative for 0..=100 percent.
        #[test]
        fn prop_tax_within_gross(
            hours in hours_strategy(),
            rate in rate_strategy(),
            tax in tax_strategy(),
        ) {
            let billed = bill(hours, rate, tax);
            prop_assert!(billed.tax >= Decimal::ZERO);
            prop_assert!(billed.tax <= billed.gross);
        }

        /// All derived amounts carry at most 2 decimal places.
        #[test]
        fn prop_amounts_have_two_decimals(
            hours in hours_strategy(),
            rate in rate_strategy(),
            tax in tax_strategy(),
        ) {
            let billed = bill(hours, rate, tax);
            prop_assert_eq!(billed.gross, round_half_up_2(billed.gross));
            prop_assert_eq!(billed.tax, round_half_up_2(billed.tax));
            prop_assert_eq!(billed.net, round_half_up_2(billed.net));
        }

        /// Billing is deterministic: identical input yields identical output.
        #[test]
        fn prop_bill_is_deterministic(
            hours in hours_strategy(),
            rate in rate_strategy(),
            tax in tax_strategy(),
        ) {
            prop_assert_eq!(bill(hours, rate, tax), bill(hours, rate, tax));
        }
    }
}
