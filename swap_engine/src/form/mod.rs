//! The two-sided swap form.
//!
//! Only `from.amount` is ever entered; `to.amount` is always derived from it,
//! the exchange rate and the fee. Every mutation below leaves the form
//! consistent in a single step.

use crate::amount::round_derived_amount;
use crate::catalog::{exchange_rate, PriceMap};
use crate::config::{TokenPair, WalletBalances};
use thiserror::Error;

pub mod validation;

pub use validation::{validate, FieldPath, ValidationIssue, ValidationOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("'{0}' is not a valid amount")]
    InvalidAmount(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TokenAmount {
    pub token: String,
    pub amount: Option<f64>,
}

impl TokenAmount {
    fn empty(token: &str) -> Self {
        Self {
            token: token.to_string(),
            amount: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwapForm {
    available_amount: f64,
    from: TokenAmount,
    to: TokenAmount,
    exchange_rate: f64,
}

impl SwapForm {
    /// Empty form for `pair`, with the rate derived from `prices` (`1` while
    /// they are not loaded).
    pub fn new(pair: &TokenPair, wallet: &WalletBalances, prices: Option<&PriceMap>) -> Self {
        Self {
            available_amount: wallet.balance_of(&pair.from),
            from: TokenAmount::empty(&pair.from),
            to: TokenAmount::empty(&pair.to),
            exchange_rate: exchange_rate(prices, &pair.from, &pair.to),
        }
    }

    pub fn available_amount(&self) -> f64 {
        self.available_amount
    }

    pub fn from(&self) -> &TokenAmount {
        &self.from
    }

    pub fn to(&self) -> &TokenAmount {
        &self.to
    }

    pub fn exchange_rate(&self) -> f64 {
        self.exchange_rate
    }

    /// Parses raw input. Blank input clears the amount.
    pub fn edit_from_amount(&mut self, input: &str, fee: f64) -> Result<(), FormError> {
        let input = input.trim();
        let amount = if input.is_empty() {
            None
        } else {
            match input.parse::<f64>() {
                Ok(amount) if amount.is_finite() => Some(amount),
                _ => return Err(FormError::InvalidAmount(input.to_string())),
            }
        };
        self.set_from_amount(amount, fee);
        Ok(())
    }

    pub fn set_from_amount(&mut self, amount: Option<f64>, fee: f64) {
        self.from.amount = amount;
        self.to.amount = derive_to_amount(amount, self.exchange_rate, fee);
    }

    /// Switches the `from` currency. The rate is re-derived and both amounts
    /// are cleared.
    pub fn select_from_token(
        &mut self,
        token: &str,
        wallet: &WalletBalances,
        prices: Option<&PriceMap>,
    ) {
        self.available_amount = wallet.balance_of(token);
        self.from = TokenAmount::empty(token);
        self.to.amount = None;
        self.exchange_rate = exchange_rate(prices, &self.from.token, &self.to.token);
    }

    pub fn select_to_token(&mut self, token: &str, prices: Option<&PriceMap>) {
        self.to = TokenAmount::empty(token);
        self.from.amount = None;
        self.exchange_rate = exchange_rate(prices, &self.from.token, &self.to.token);
    }

    /// Swaps both sides, token and amount together, and inverts the rate.
    pub fn toggle_direction(&mut self, wallet: &WalletBalances) {
        std::mem::swap(&mut self.from, &mut self.to);
        self.exchange_rate = 1.0 / self.exchange_rate;
        self.available_amount = wallet.balance_of(&self.from.token);
    }

    /// Re-derives the rate for the current pair after the prices changed.
    /// An entered amount is kept and its counterpart recomputed.
    pub fn refresh_rate(&mut self, prices: Option<&PriceMap>, fee: f64) {
        self.exchange_rate = exchange_rate(prices, &self.from.token, &self.to.token);
        self.to.amount = derive_to_amount(self.from.amount, self.exchange_rate, fee);
    }
}

/// `amount * rate * (1 - fee)`, rounded. Nothing is derived from an empty
/// or zero amount.
pub fn derive_to_amount(from_amount: Option<f64>, exchange_rate: f64, fee: f64) -> Option<f64> {
    from_amount
        .filter(|amount| *amount != 0.0)
        .map(|amount| round_derived_amount(amount * exchange_rate * (1.0 - fee)))
}
