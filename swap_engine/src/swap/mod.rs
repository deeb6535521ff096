//! Confirm/execute state machine for a single swap.
//!
//! ```text
//! Idle --submit--> PendingConfirmation --begin--> Submitting --success--> Idle
//!                        |    ^                        |
//!                        |    +----failure/rejected----+
//!                        +--cancel--> Idle
//! ```

use crate::amount::{format_currency, format_usd_preview};
use crate::catalog::{usd_value, PriceMap};
use crate::config::TradeLimits;
use crate::form::{validate, SwapForm, ValidationOutcome};
use crate::logs::INFO;
use crate::log;
use std::fmt;
use swap_api_client::{SwapRequest, SwapResponse, TransportError};
use thiserror::Error;

pub mod progress;

pub use progress::TransferProgress;

pub const SWAP_SUCCEEDED_MESSAGE: &str = "Currency swapped successfully";

/// Immutable copy of the trade parameters, taken at submit time.
#[derive(Clone, Debug, PartialEq)]
pub struct SwapSnapshot {
    pub from_token: String,
    pub to_token: String,
    pub from_amount: f64,
    /// Only used for the confirmation preview, never sent.
    pub to_amount: f64,
    pub exchange_rate: f64,
}

impl SwapSnapshot {
    pub fn capture(form: &SwapForm) -> Self {
        Self {
            from_token: form.from().token.clone(),
            to_token: form.to().token.clone(),
            from_amount: form.from().amount.unwrap_or(0.0),
            to_amount: form.to().amount.unwrap_or(0.0),
            exchange_rate: form.exchange_rate(),
        }
    }

    pub fn to_request(&self) -> SwapRequest {
        SwapRequest {
            from_token: self.from_token.clone(),
            to_token: self.to_token.clone(),
            from_amount: self.from_amount,
            exchange_rate: self.exchange_rate,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PreviewLine {
    pub token: String,
    pub amount: f64,
    pub usd_value: f64,
}

impl fmt::Display for PreviewLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            format_currency(self.amount, ""),
            self.token,
            format_usd_preview(self.usd_value)
        )
    }
}

/// Read-only review of a pending swap.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmationPreview {
    pub from: PreviewLine,
    /// What the user receives at minimum.
    pub to: PreviewLine,
    pub fee_percentage: f64,
    /// `from_amount * exchange_rate * fee`, labelled in the `from` token.
    pub provider_fees: PreviewLine,
}

impl ConfirmationPreview {
    pub fn new(
        snapshot: &SwapSnapshot,
        prices: Option<&PriceMap>,
        usd_anchor: &str,
        fee: f64,
    ) -> Self {
        let line = |token: &str, amount: f64| PreviewLine {
            token: token.to_string(),
            amount,
            usd_value: usd_value(prices, usd_anchor, token, amount),
        };
        let provider_fees = snapshot.from_amount * snapshot.exchange_rate * fee;
        Self {
            from: line(&snapshot.from_token, snapshot.from_amount),
            to: line(&snapshot.to_token, snapshot.to_amount),
            fee_percentage: fee * 100.0,
            provider_fees: line(&snapshot.from_token, provider_fees),
        }
    }
}

impl fmt::Display for ConfirmationPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Swap:            {}", self.from)?;
        writeln!(f, "Minimum receive: {}", self.to)?;
        writeln!(f, "Fees:            {}%", self.fee_percentage)?;
        write!(f, "Provider fees:   {}", self.provider_fees)
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum SwapError {
    #[error("a swap is already awaiting confirmation")]
    NotIdle,
    #[error("no swap is awaiting confirmation")]
    NoPendingConfirmation,
    #[error("the swap is already being submitted")]
    AlreadySubmitting,
    #[error("no swap is being submitted")]
    NotSubmitting,
    #[error("the form is invalid: {0}")]
    ValidationFailed(ValidationOutcome),
    #[error("the swap was rejected")]
    Rejected,
    #[error("the swap could not be executed: {0}")]
    Transport(#[from] TransportError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    SwapSucceeded { from_token: String, to_token: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::SwapSucceeded { .. } => write!(f, "{SWAP_SUCCEEDED_MESSAGE}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum ConfirmationState {
    #[default]
    Idle,
    PendingConfirmation(SwapSnapshot),
    Submitting(SwapSnapshot),
}

impl ConfirmationState {
    pub fn snapshot(&self) -> Option<&SwapSnapshot> {
        match self {
            ConfirmationState::Idle => None,
            ConfirmationState::PendingConfirmation(snapshot)
            | ConfirmationState::Submitting(snapshot) => Some(snapshot),
        }
    }

    /// The confirm control is only enabled while waiting for confirmation.
    pub fn can_confirm(&self) -> bool {
        matches!(self, ConfirmationState::PendingConfirmation(_))
    }
}

#[derive(Debug, Default)]
pub struct ConfirmationMachine {
    state: ConfirmationState,
}

impl ConfirmationMachine {
    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    /// Validates the form and captures its snapshot for review.
    pub fn submit(
        &mut self,
        form: &SwapForm,
        limits: &TradeLimits,
    ) -> Result<SwapSnapshot, SwapError> {
        if !matches!(self.state, ConfirmationState::Idle) {
            return Err(SwapError::NotIdle);
        }
        let outcome = validate(form, limits);
        if !outcome.is_valid() {
            return Err(SwapError::ValidationFailed(outcome));
        }
        let snapshot = SwapSnapshot::capture(form);
        log!(INFO, "[swap]: Awaiting confirmation of {snapshot:?}");
        self.state = ConfirmationState::PendingConfirmation(snapshot.clone());
        Ok(snapshot)
    }

    /// Closes the review without side effects.
    pub fn cancel(&mut self) -> Result<SwapSnapshot, SwapError> {
        match std::mem::take(&mut self.state) {
            ConfirmationState::PendingConfirmation(snapshot) => {
                log!(INFO, "[swap]: Cancelled {snapshot:?}");
                Ok(snapshot)
            }
            other => {
                let error = match other {
                    ConfirmationState::Submitting(_) => SwapError::AlreadySubmitting,
                    _ => SwapError::NoPendingConfirmation,
                };
                self.state = other;
                Err(error)
            }
        }
    }

    /// Moves to `Submitting` and hands out the snapshot to execute.
    pub fn begin_execution(&mut self) -> Result<SwapSnapshot, SwapError> {
        match &self.state {
            ConfirmationState::PendingConfirmation(snapshot) => {
                let snapshot = snapshot.clone();
                self.state = ConfirmationState::Submitting(snapshot.clone());
                log!(INFO, "[swap]: Submitting {snapshot:?}");
                Ok(snapshot)
            }
            ConfirmationState::Submitting(_) => Err(SwapError::AlreadySubmitting),
            ConfirmationState::Idle => Err(SwapError::NoPendingConfirmation),
        }
    }

    /// Applies the execution result. Success returns to `Idle`; a rejection
    /// or a transport failure goes back to `PendingConfirmation` with the
    /// same snapshot.
    pub fn finish_execution(
        &mut self,
        outcome: Result<SwapResponse, TransportError>,
    ) -> Result<SwapSnapshot, SwapError> {
        let snapshot = match &self.state {
            ConfirmationState::Submitting(snapshot) => snapshot.clone(),
            _ => return Err(SwapError::NotSubmitting),
        };
        match outcome {
            Ok(SwapResponse { success: true }) => {
                log!(INFO, "[swap]: Executed {snapshot:?}");
                self.state = ConfirmationState::Idle;
                Ok(snapshot)
            }
            Ok(SwapResponse { success: false }) => {
                log!(INFO, "[swap]: Rejected {snapshot:?}");
                self.state = ConfirmationState::PendingConfirmation(snapshot);
                Err(SwapError::Rejected)
            }
            Err(e) => {
                log!(INFO, "[swap]: Failed to execute {snapshot:?}: {e}");
                self.state = ConfirmationState::PendingConfirmation(snapshot);
                Err(SwapError::Transport(e))
            }
        }
    }
}

#[cfg(test)]
mod tests;
