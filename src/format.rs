//! Human-readable rendering of prices, counts and USD amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt::Display;

const PRICE_DECIMALS: u32 = 9;
const USD_DECIMALS: u32 = 2;

/// Round to exactly `dp` decimals, padding with zeros when needed.
pub fn to_fixed(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}

/// Token price with 9 fixed decimals, e.g. `0.000000001`.
pub fn format_price(rate: Decimal) -> String {
    to_fixed(rate, PRICE_DECIMALS).to_string()
}

/// Group the integer digits in runs of three. The fractional part is left alone.
pub fn format_with_commas(number: impl Display) -> String {
    let text = number.to_string();
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = match unsigned.find('.') {
        Some(pos) => unsigned.split_at(pos),
        None => (unsigned, ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}{}", sign, grouped, frac_part)
}

/// Dollar amount with two fixed decimals and grouping, e.g. `$1,234.50`.
pub fn format_usd(value: Decimal) -> String {
    format!("${}", format_with_commas(to_fixed(value, USD_DECIMALS)))
}
