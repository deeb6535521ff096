use rust_decimal::prelude::*;
use thousands::Separable;

/// Amounts above this magnitude are rounded and displayed with
/// [`COARSE_DECIMALS`], everything else with [`FINE_DECIMALS`].
pub const COARSE_PRECISION_THRESHOLD: f64 = 1000.0;
pub const COARSE_DECIMALS: u32 = 2;
pub const FINE_DECIMALS: u32 = 5;

pub const USD_PREVIEW_PREFIX: &str = "≈ $ ";

pub fn precision_for(amount: f64) -> u32 {
    if amount.abs() > COARSE_PRECISION_THRESHOLD {
        COARSE_DECIMALS
    } else {
        FINE_DECIMALS
    }
}

// Rounds the exact binary value: 1001.005 is stored just below the midpoint
// and goes down to 1001.0.
fn to_rounded_decimal(amount: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(amount).map(|value| {
        value.round_dp_with_strategy(
            precision_for(amount),
            RoundingStrategy::MidpointAwayFromZero,
        )
    })
}

/// Rounds a derived amount to the precision its magnitude calls for.
///
/// Values a `Decimal` cannot hold (non-finite, or beyond ~7.9e28) come back
/// unchanged; validation is responsible for rejecting them.
pub fn round_derived_amount(amount: f64) -> f64 {
    to_rounded_decimal(amount)
        .and_then(|rounded| rounded.to_f64())
        .unwrap_or(amount)
}

/// Formats `amount` with thousands separators and the magnitude-dependent
/// number of decimals, e.g. `format_currency(3934023.54, "")` gives
/// `"3,934,023.54"` and `format_currency(0.0333, "")` gives `"0.03330"`.
pub fn format_currency(amount: f64, prefix: &str) -> String {
    let Some(rounded) = to_rounded_decimal(amount) else {
        return format!("{prefix}{amount}");
    };
    let precision = precision_for(amount) as usize;
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let digits = format!("{:.precision$}", rounded.abs());
    let (integer, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
    let integer = integer.separate_with_commas();
    if fraction.is_empty() {
        format!("{sign}{prefix}{integer}")
    } else {
        format!("{sign}{prefix}{integer}.{fraction}")
    }
}

pub fn format_usd_preview(amount: f64) -> String {
    format_currency(amount, USD_PREVIEW_PREFIX)
}

/// `1 FROM = <rate> TO`
pub fn format_exchange_rate(from_token: &str, to_token: &str, rate: f64) -> String {
    format!("1 {from_token} = {} {to_token}", format_currency(rate, ""))
}
