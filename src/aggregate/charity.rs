use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{AggregationError, AggregationResult};
use crate::format::{format_usd, to_fixed};

/// Everything a charity progress report is derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInputs {
    pub eth_balance: Decimal,
    pub eth_usd_rate: Decimal,
    /// Token price as reported, before rounding to the token's precision
    pub token_usd_rate: Decimal,
    pub token_decimals: u32,
    /// Live token balance in whole tokens
    pub token_balance: Decimal,
    pub token_last_updated: i64,
    pub doge_balance: Decimal,
    pub doge_usd_rate: Decimal,
    pub ltc_balance: Decimal,
    pub ltc_usd_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletSnapshot {
    pub confirmed_balance: Decimal,
    pub usd_rate: Decimal,
    pub usd_value: Decimal,
}

impl WalletSnapshot {
    fn new(
        what: &'static str,
        confirmed_balance: Decimal,
        usd_rate: Decimal,
    ) -> AggregationResult<Self> {
        let usd_value = confirmed_balance
            .checked_mul(usd_rate)
            .ok_or(AggregationError::Overflow(what))?;
        Ok(Self {
            confirmed_balance,
            usd_rate,
            usd_value,
        })
    }
}

/// Sum of USD values, failing instead of panicking on overflow.
fn total(what: &'static str, values: &[Decimal]) -> AggregationResult<Decimal> {
    values.iter().try_fold(Decimal::ZERO, |sum, value| {
        sum.checked_add(*value).ok_or(AggregationError::Overflow(what))
    })
}

/// Unrounded derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct CharityFigures {
    pub eth: WalletSnapshot,
    pub token: WalletSnapshot,
    /// Token holdings minus the excluded hoard
    pub token_adjusted: WalletSnapshot,
    pub doge: WalletSnapshot,
    pub ltc: WalletSnapshot,
    pub total_usd: Decimal,
    pub total_usd_adjusted: Decimal,
    pub last_updated: i64,
}

impl CharityFigures {
    /// Extreme upstream values fail with `Overflow` instead of panicking.
    pub fn derive(inputs: &ProgressInputs, excluded_tokens: Decimal) -> AggregationResult<Self> {
        let token_rate = inputs.token_usd_rate.round_dp_with_strategy(
            inputs.token_decimals,
            RoundingStrategy::MidpointAwayFromZero,
        );
        let adjusted_balance = inputs
            .token_balance
            .checked_sub(excluded_tokens)
            .ok_or(AggregationError::Overflow("token balance without excluded tokens"))?;

        let eth = WalletSnapshot::new("ETH USD value", inputs.eth_balance, inputs.eth_usd_rate)?;
        let token = WalletSnapshot::new("token USD value", inputs.token_balance, token_rate)?;
        let token_adjusted =
            WalletSnapshot::new("adjusted token USD value", adjusted_balance, token_rate)?;
        let doge =
            WalletSnapshot::new("DOGE USD value", inputs.doge_balance, inputs.doge_usd_rate)?;
        let ltc = WalletSnapshot::new("LTC USD value", inputs.ltc_balance, inputs.ltc_usd_rate)?;

        let total_usd = total(
            "total USD value",
            &[eth.usd_value, token.usd_value, doge.usd_value, ltc.usd_value],
        )?;
        let total_usd_adjusted = total(
            "adjusted total USD value",
            &[eth.usd_value, token_adjusted.usd_value, doge.usd_value, ltc.usd_value],
        )?;

        Ok(Self {
            eth,
            token,
            token_adjusted,
            doge,
            ltc,
            total_usd,
            total_usd_adjusted,
            last_updated: inputs.token_last_updated,
        })
    }
}

/// The `/charity-progress` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharityProgress {
    #[serde(rename = "ethBalance", with = "rust_decimal::serde::float")]
    pub eth_balance: Decimal,
    #[serde(rename = "ethUsdValue", with = "rust_decimal::serde::float")]
    pub eth_usd_value: Decimal,
    #[serde(rename = "ethUsdValueFormatted")]
    pub eth_usd_value_formatted: String,

    #[serde(rename = "grumpyBalance", with = "rust_decimal::serde::float")]
    pub grumpy_balance: Decimal,
    #[serde(rename = "grumpyUsdValue", with = "rust_decimal::serde::float")]
    pub grumpy_usd_value: Decimal,
    #[serde(rename = "grumpyUsdValueFormatted")]
    pub grumpy_usd_value_formatted: String,

    #[serde(rename = "grumpyBalanceWithout1T", with = "rust_decimal::serde::float")]
    pub grumpy_balance_without_1t: Decimal,
    #[serde(rename = "grumpyUsdValueWithout1T", with = "rust_decimal::serde::float")]
    pub grumpy_usd_value_without_1t: Decimal,
    #[serde(rename = "grumpyUsdValueWithout1TFormatted")]
    pub grumpy_usd_value_without_1t_formatted: String,

    #[serde(rename = "dogeBalance", with = "rust_decimal::serde::float")]
    pub doge_balance: Decimal,
    #[serde(rename = "dogeUsdValue", with = "rust_decimal::serde::float")]
    pub doge_usd_value: Decimal,
    #[serde(rename = "dogeUsdValueFormatted")]
    pub doge_usd_value_formatted: String,

    #[serde(rename = "ltcBalance", with = "rust_decimal::serde::float")]
    pub ltc_balance: Decimal,
    #[serde(rename = "ltcUsdValue", with = "rust_decimal::serde::float")]
    pub ltc_usd_value: Decimal,
    #[serde(rename = "ltcUsdValueFormatted")]
    pub ltc_usd_value_formatted: String,

    #[serde(rename = "totalUsdValue", with = "rust_decimal::serde::float")]
    pub total_usd_value: Decimal,
    #[serde(rename = "totalUsdValueFormatted")]
    pub total_usd_value_formatted: String,
    #[serde(rename = "totalUsdValueWithout1TGrumpy", with = "rust_decimal::serde::float")]
    pub total_usd_value_without_1t: Decimal,
    #[serde(rename = "totalUsdValueWithout1TGrumpyFormatted")]
    pub total_usd_value_without_1t_formatted: String,

    /// Unix seconds; the token provider lags the most, so its timestamp bounds freshness
    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
}

fn cents(value: Decimal) -> Decimal {
    to_fixed(value, 2)
}

impl From<&CharityFigures> for CharityProgress {
    fn from(figures: &CharityFigures) -> Self {
        Self {
            eth_balance: figures.eth.confirmed_balance,
            eth_usd_value: cents(figures.eth.usd_value),
            eth_usd_value_formatted: format_usd(figures.eth.usd_value),
            grumpy_balance: figures.token.confirmed_balance,
            grumpy_usd_value: cents(figures.token.usd_value),
            grumpy_usd_value_formatted: format_usd(figures.token.usd_value),
            grumpy_balance_without_1t: figures.token_adjusted.confirmed_balance,
            grumpy_usd_value_without_1t: cents(figures.token_adjusted.usd_value),
            grumpy_usd_value_without_1t_formatted: format_usd(figures.token_adjusted.usd_value),
            doge_balance: figures.doge.confirmed_balance,
            doge_usd_value: cents(figures.doge.usd_value),
            doge_usd_value_formatted: format_usd(figures.doge.usd_value),
            ltc_balance: figures.ltc.confirmed_balance,
            ltc_usd_value: cents(figures.ltc.usd_value),
            ltc_usd_value_formatted: format_usd(figures.ltc.usd_value),
            total_usd_value: cents(figures.total_usd),
            total_usd_value_formatted: format_usd(figures.total_usd),
            total_usd_value_without_1t: cents(figures.total_usd_adjusted),
            total_usd_value_without_1t_formatted: format_usd(figures.total_usd_adjusted),
            last_updated: figures.last_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn excluded() -> Decimal {
        Decimal::from(1_000_000_000_000i64)
    }

    fn sample_inputs() -> ProgressInputs {
        ProgressInputs {
            eth_balance: dec("2.0"),
            eth_usd_rate: dec("2000"),
            token_usd_rate: dec("0.000000005"),
            token_decimals: 9,
            token_balance: dec("1000000001000"),
            token_last_updated: 1_700_000_000,
            doge_balance: dec("500"),
            doge_usd_rate: dec("0.08"),
            ltc_balance: dec("3"),
            ltc_usd_rate: dec("70"),
        }
    }

    #[test]
    fn test_derived_values() {
        let figures = CharityFigures::derive(&sample_inputs(), excluded()).unwrap();

        assert_eq!(figures.eth.usd_value, dec("4000.00"));
        assert_eq!(figures.doge.usd_value, dec("40.00"));
        assert_eq!(figures.ltc.usd_value, dec("210.00"));
        assert_eq!(figures.token.usd_value, dec("5000.000005"));
        assert_eq!(figures.token_adjusted.confirmed_balance, dec("1000"));
        assert_eq!(figures.token_adjusted.usd_value, dec("0.000005"));
        assert_eq!(figures.last_updated, 1_700_000_000);
    }

    #[test]
    fn test_adjusted_value_differs_by_excluded_hoard() {
        let inputs = sample_inputs();
        let figures = CharityFigures::derive(&inputs, excluded()).unwrap();
        assert_eq!(
            figures.token.usd_value - figures.token_adjusted.usd_value,
            excluded() * inputs.token_usd_rate
        );
    }

    #[test]
    fn test_totals_are_exact_sums() {
        let figures = CharityFigures::derive(&sample_inputs(), excluded()).unwrap();
        assert_eq!(
            figures.total_usd,
            figures.eth.usd_value
                + figures.token.usd_value
                + figures.doge.usd_value
                + figures.ltc.usd_value
        );
        assert_eq!(figures.total_usd, dec("9250.000005"));
        assert_eq!(
            figures.total_usd_adjusted,
            figures.eth.usd_value
                + figures.token_adjusted.usd_value
                + figures.doge.usd_value
                + figures.ltc.usd_value
        );
        assert_eq!(figures.total_usd_adjusted, dec("4250.000005"));
    }

    #[test]
    fn test_token_rate_rounds_to_declared_precision() {
        let mut inputs = sample_inputs();
        inputs.token_usd_rate = dec("0.0000000012345");
        inputs.token_balance = dec("1000000000");
        let figures = CharityFigures::derive(&inputs, excluded()).unwrap();
        assert_eq!(figures.token.usd_rate, dec("0.000000001"));
        assert_eq!(figures.token.usd_value, dec("1"));
    }

    #[test]
    fn test_overflowing_product_is_an_error() {
        let mut inputs = sample_inputs();
        inputs.doge_balance = Decimal::MAX;
        inputs.doge_usd_rate = dec("2");
        let err = CharityFigures::derive(&inputs, excluded()).unwrap_err();
        assert!(matches!(err, AggregationError::Overflow("DOGE USD value")));
    }

    #[test]
    fn test_overflowing_total_is_an_error() {
        let mut inputs = sample_inputs();
        inputs.eth_balance = Decimal::MAX;
        inputs.eth_usd_rate = Decimal::ONE;
        let err = CharityFigures::derive(&inputs, excluded()).unwrap_err();
        assert!(matches!(err, AggregationError::Overflow("total USD value")));
    }

    #[test]
    fn test_overflowing_adjustment_is_an_error() {
        let mut inputs = sample_inputs();
        inputs.token_balance = Decimal::MIN;
        let err = CharityFigures::derive(&inputs, excluded()).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::Overflow("token balance without excluded tokens")
        ));
    }

    #[test]
    fn test_progress_document() {
        let figures = CharityFigures::derive(&sample_inputs(), excluded()).unwrap();
        let progress = CharityProgress::from(&figures);

        assert_eq!(progress.eth_usd_value_formatted, "$4,000.00");
        assert_eq!(progress.grumpy_usd_value, dec("5000.00"));
        assert_eq!(progress.grumpy_usd_value_formatted, "$5,000.00");
        assert_eq!(progress.grumpy_usd_value_without_1t_formatted, "$0.00");
        assert_eq!(progress.doge_usd_value_formatted, "$40.00");
        assert_eq!(progress.ltc_usd_value_formatted, "$210.00");
        assert_eq!(progress.total_usd_value_formatted, "$9,250.00");
        assert_eq!(progress.total_usd_value_without_1t_formatted, "$4,250.00");
    }

    #[test]
    fn test_progress_json_shape() {
        let figures = CharityFigures::derive(&sample_inputs(), excluded()).unwrap();
        let json = serde_json::to_value(CharityProgress::from(&figures)).unwrap();

        assert_eq!(json["ethBalance"], serde_json::json!(2.0));
        assert_eq!(json["ethUsdValue"], serde_json::json!(4000.0));
        assert_eq!(json["ltcUsdValue"], serde_json::json!(210.0));
        assert_eq!(json["grumpyBalanceWithout1T"], serde_json::json!(1000.0));
        assert_eq!(json["totalUsdValueWithout1TGrumpyFormatted"], "$4,250.00");
        assert_eq!(json["lastUpdated"], 1_700_000_000);
        assert_eq!(json.as_object().unwrap().len(), 20);
    }
}
