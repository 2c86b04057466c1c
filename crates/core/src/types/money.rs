//! Money helpers using decimal arithmetic.
//!
//! All amounts are Peruvian soles (PEN) stored as `NUMERIC(12, 2)`. Amounts
//! are kept as [`Decimal`] end to end; floats never touch a price.

use rust_decimal::{Decimal, RoundingStrategy};

/// IGV (Impuesto General a las Ventas) rate applied on top of the subtotal.
pub const IGV_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

/// Currency symbol used when formatting amounts.
pub const CURRENCY_SYMBOL: &str = "S/";

/// Round an amount to cents, midpoint away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount for display, e.g. `S/ 1,234.50`.
///
/// ```
/// use rust_decimal::Decimal;
/// use tienda_core::format_soles;
///
/// assert_eq!(format_soles(Decimal::new(123_450, 2)), "S/ 1,234.50");
/// assert_eq!(format_soles(Decimal::new(-5, 1)), "-S/ 0.50");
/// ```
#[must_use]
pub fn format_soles(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{CURRENCY_SYMBOL} {grouped}.{frac_part}")
}
