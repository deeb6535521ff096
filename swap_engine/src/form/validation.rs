use super::SwapForm;
use crate::config::TradeLimits;
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::{Display, EnumIter};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum FieldPath {
    #[strum(serialize = "from.token")]
    FromToken,
    #[strum(serialize = "from.amount")]
    FromAmount,
    #[strum(serialize = "to.token")]
    ToToken,
    #[strum(serialize = "to.amount")]
    ToAmount,
    #[strum(serialize = "exchangeRate")]
    ExchangeRate,
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("Token is required")]
    TokenRequired,
    #[error("Amount must be a number")]
    NotANumber,
    #[error("Amount must be at least {0}")]
    BelowMinimum(f64),
    #[error("Amount must not exceed {0}")]
    AboveMaximum(f64),
    #[error("Amount must be greater than zero")]
    NotPositive,
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Exchange rate must be a non-negative number")]
    InvalidExchangeRate,
}

/// Issues per field. Empty means the form can be submitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationOutcome(BTreeMap<FieldPath, Vec<ValidationIssue>>);

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn issues(&self, path: FieldPath) -> &[ValidationIssue] {
        self.0.get(&path).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_issue(&self, path: FieldPath, issue: &ValidationIssue) -> bool {
        self.issues(path).contains(issue)
    }

    /// Total number of issues over all fields.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.is_valid()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldPath, &ValidationIssue)> {
        self.0
            .iter()
            .flat_map(|(path, issues)| issues.iter().map(move |issue| (*path, issue)))
    }

    fn add(&mut self, path: FieldPath, issue: ValidationIssue) {
        self.0.entry(path).or_default().push(issue);
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (path, issue)) in self.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{path}: {issue}")?;
        }
        Ok(())
    }
}

/// Checks every rule against the form. Rules are independent of each other
/// and all of them run on every call.
pub fn validate(form: &SwapForm, limits: &TradeLimits) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    check_tokens(form, &mut outcome);
    check_from_amount_bounds(form, limits, &mut outcome);
    check_to_amount(form, &mut outcome);
    check_funds(form, &mut outcome);
    check_some_amount(form, limits, &mut outcome);
    check_exchange_rate(form, &mut outcome);
    outcome
}

fn check_tokens(form: &SwapForm, outcome: &mut ValidationOutcome) {
    if form.from().token.trim().is_empty() {
        outcome.add(FieldPath::FromToken, ValidationIssue::TokenRequired);
    }
    if form.to().token.trim().is_empty() {
        outcome.add(FieldPath::ToToken, ValidationIssue::TokenRequired);
    }
}

fn check_from_amount_bounds(form: &SwapForm, limits: &TradeLimits, outcome: &mut ValidationOutcome) {
    let Some(amount) = form.from().amount else {
        return;
    };
    if !amount.is_finite() {
        outcome.add(FieldPath::FromAmount, ValidationIssue::NotANumber);
    } else if amount <= 0.0 || amount < limits.min_trade_amount {
        outcome.add(
            FieldPath::FromAmount,
            ValidationIssue::BelowMinimum(limits.min_trade_amount),
        );
    } else if amount > limits.max_trade_amount {
        outcome.add(
            FieldPath::FromAmount,
            ValidationIssue::AboveMaximum(limits.max_trade_amount),
        );
    }
}

// No upper bound: the amount is derived, not entered.
fn check_to_amount(form: &SwapForm, outcome: &mut ValidationOutcome) {
    match form.to().amount {
        Some(amount) if !amount.is_finite() => {
            outcome.add(FieldPath::ToAmount, ValidationIssue::NotANumber)
        }
        Some(amount) if amount <= 0.0 => {
            outcome.add(FieldPath::ToAmount, ValidationIssue::NotPositive)
        }
        _ => {}
    }
}

fn check_funds(form: &SwapForm, outcome: &mut ValidationOutcome) {
    if let Some(amount) = form.from().amount {
        if amount > form.available_amount() {
            outcome.add(FieldPath::FromAmount, ValidationIssue::InsufficientFunds);
        }
    }
}

fn check_some_amount(form: &SwapForm, limits: &TradeLimits, outcome: &mut ValidationOutcome) {
    if form.from().amount.is_none() && form.to().amount.is_none() {
        outcome.add(
            FieldPath::FromAmount,
            ValidationIssue::BelowMinimum(limits.min_trade_amount),
        );
    }
}

fn check_exchange_rate(form: &SwapForm, outcome: &mut ValidationOutcome) {
    let rate = form.exchange_rate();
    if !(rate.is_finite() && rate >= 0.0) {
        outcome.add(FieldPath::ExchangeRate, ValidationIssue::InvalidExchangeRate);
    }
}
