//! Invoice money arithmetic.
//!
//! Amounts are summed and rounded as `Decimal` and only converted to `f64`
//! when a [`Totals`] value is built, so every reported amount is a whole
//! number of cents.

use rust_decimal::prelude::*;
use serde::Serialize;

/// Flat tax rate applied to every invoice (16%).
pub const TAX_RATE: Decimal = Decimal::from_parts(16, 0, 0, false, 2);

/// Currency amounts are kept to two decimals, rounding half away from zero.
const DECIMAL_PLACES: u32 = 2;

/// Subtotal, tax and grand total of a set of lines.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl Totals {
    /// Derives tax and total from an already summed subtotal.
    fn from_subtotal(subtotal: Decimal) -> Self {
        let subtotal = round_cents(subtotal);
        let tax = round_cents(subtotal * TAX_RATE);
        Self {
            subtotal: to_f64(subtotal),
            tax: to_f64(tax),
            total: to_f64(subtotal + tax),
        }
    }

    /// Sums `(quantity, unit_price)` pairs.
    pub fn from_lines<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (u32, f64)>,
    {
        let subtotal = lines
            .into_iter()
            .map(|(quantity, unit_price)| Decimal::from(quantity) * to_decimal(unit_price))
            .sum();
        Self::from_subtotal(subtotal)
    }

    pub fn for_line(quantity: u32, unit_price: f64) -> Self {
        Self::from_lines([(quantity, unit_price)])
    }
}

/// Converts a stored price to `Decimal`; non-finite values count as zero.
fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}
