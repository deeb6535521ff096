//! One trading session: the form, its confirmation flow and the catalog it
//! reads rates from.

use crate::amount::format_exchange_rate;
use crate::catalog::{CatalogView, PriceCatalog, PriceMap};
use crate::config::{EngineConfig, TokenPair, TradeLimits, WalletBalances};
use crate::form::{validate, FormError, SwapForm, ValidationOutcome};
use crate::logs::INFO;
use crate::swap::{
    ConfirmationMachine, ConfirmationPreview, ConfirmationState, Notification, SwapError,
    SwapSnapshot, TransferProgress,
};
use crate::log;
use std::sync::Arc;
use swap_api_client::{PriceApi, SwapResponse, TransportError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct TradingSession {
    api: Arc<dyn PriceApi>,
    catalog: PriceCatalog,
    // Keeps the catalog observed, so an invalidation refetches right away.
    subscription: watch::Receiver<CatalogView>,
    limits: TradeLimits,
    default_pair: TokenPair,
    wallet: WalletBalances,
    usd_anchor: String,
    form: SwapForm,
    machine: ConfirmationMachine,
    progress: TransferProgress,
    // The submitted request, kept across dropped `confirm` calls.
    execution: Option<JoinHandle<Result<SwapResponse, TransportError>>>,
    notifications: Vec<Notification>,
}

impl TradingSession {
    pub fn new(api: Arc<dyn PriceApi>, catalog: PriceCatalog, config: &EngineConfig) -> Self {
        let mut subscription = catalog.subscribe();
        let prices = subscription.borrow_and_update().prices.clone();
        let form = SwapForm::new(&config.default_pair, &config.wallet, prices.as_deref());
        Self {
            api,
            catalog,
            subscription,
            limits: config.trade_limits,
            default_pair: config.default_pair.clone(),
            wallet: config.wallet.clone(),
            usd_anchor: config.usd_anchor.clone(),
            form,
            machine: ConfirmationMachine::default(),
            progress: TransferProgress::new(),
            execution: None,
            notifications: vec![],
        }
    }

    /// Waits for the catalog and refreshes the form's rate from it.
    pub async fn load(&mut self) -> Result<Arc<PriceMap>, TransportError> {
        let prices = self.catalog.prices().await?;
        self.sync_catalog();
        Ok(prices)
    }

    /// Picks up catalog changes (fetches, pushes, invalidations) since the
    /// last call. Returns whether anything changed.
    pub fn sync_catalog(&mut self) -> bool {
        if !self.subscription.has_changed().unwrap_or(false) {
            return false;
        }
        let prices = self.subscription.borrow_and_update().prices.clone();
        self.form.refresh_rate(prices.as_deref(), self.limits.fee);
        true
    }

    pub fn catalog(&self) -> &PriceCatalog {
        &self.catalog
    }

    pub fn form(&self) -> &SwapForm {
        &self.form
    }

    pub fn limits(&self) -> &TradeLimits {
        &self.limits
    }

    pub fn wallet(&self) -> &WalletBalances {
        &self.wallet
    }

    pub fn validation(&self) -> ValidationOutcome {
        validate(&self.form, &self.limits)
    }

    /// `1 FROM = <rate> TO` for the current pair.
    pub fn exchange_rate_label(&self) -> String {
        format_exchange_rate(
            &self.form.from().token,
            &self.form.to().token,
            self.form.exchange_rate(),
        )
    }

    pub fn edit_from_amount(&mut self, input: &str) -> Result<ValidationOutcome, FormError> {
        self.form.edit_from_amount(input, self.limits.fee)?;
        Ok(self.validation())
    }

    pub fn set_from_amount(&mut self, amount: Option<f64>) -> ValidationOutcome {
        self.form.set_from_amount(amount, self.limits.fee);
        self.validation()
    }

    pub fn select_from_token(&mut self, token: &str) -> ValidationOutcome {
        let prices = self.catalog.snapshot();
        self.form
            .select_from_token(token, &self.wallet, prices.as_deref());
        self.validation()
    }

    pub fn select_to_token(&mut self, token: &str) -> ValidationOutcome {
        let prices = self.catalog.snapshot();
        self.form.select_to_token(token, prices.as_deref());
        self.validation()
    }

    pub fn toggle_direction(&mut self) -> ValidationOutcome {
        self.form.toggle_direction(&self.wallet);
        self.validation()
    }

    pub fn state(&self) -> &ConfirmationState {
        self.machine.state()
    }

    pub fn progress(&self) -> &TransferProgress {
        &self.progress
    }

    /// Validates the form and opens the review of its snapshot.
    pub fn submit(&mut self) -> Result<ConfirmationPreview, SwapError> {
        let snapshot = self.machine.submit(&self.form, &self.limits)?;
        Ok(self.preview_of(&snapshot))
    }

    /// Review of the snapshot awaiting confirmation or being submitted.
    pub fn preview(&self) -> Option<ConfirmationPreview> {
        self.machine
            .state()
            .snapshot()
            .map(|snapshot| self.preview_of(snapshot))
    }

    pub fn cancel(&mut self) -> Result<(), SwapError> {
        self.machine.cancel().map(|_| ())
    }

    /// Executes the pending snapshot. Once started, execution cannot be
    /// cancelled: the request runs in its own task and the machine stays
    /// `Submitting` until it reports back. Dropping the returned future
    /// leaves that task running; calling `confirm` again resumes waiting on
    /// it instead of sending another request.
    pub async fn confirm(&mut self) -> Result<SwapSnapshot, SwapError> {
        if self.execution.is_none() {
            let request = self.begin_confirm()?.to_request();
            let api = self.api.clone();
            self.execution = Some(tokio::spawn(async move { api.swap(request).await }));
        }
        let outcome = match self.execution.as_mut() {
            Some(execution) => self.progress.track(execution).await,
            None => return Err(SwapError::NotSubmitting),
        };
        self.execution = None;
        let outcome = outcome.unwrap_or_else(|e| {
            log!(INFO, "[swap]: Execution task failed: {e}");
            Err(TransportError::unknown())
        });
        self.complete_confirm(outcome)
    }

    /// First half of [`TradingSession::confirm`], for callers that execute
    /// the request themselves.
    pub fn begin_confirm(&mut self) -> Result<SwapSnapshot, SwapError> {
        self.machine.begin_execution()
    }

    pub fn complete_confirm(
        &mut self,
        outcome: Result<SwapResponse, TransportError>,
    ) -> Result<SwapSnapshot, SwapError> {
        let outcome = self.machine.finish_execution(outcome);
        self.after_execution(outcome)
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn preview_of(&self, snapshot: &SwapSnapshot) -> ConfirmationPreview {
        let prices = self.catalog.snapshot();
        ConfirmationPreview::new(
            snapshot,
            prices.as_deref(),
            &self.usd_anchor,
            self.limits.fee,
        )
    }

    fn after_execution(
        &mut self,
        outcome: Result<SwapSnapshot, SwapError>,
    ) -> Result<SwapSnapshot, SwapError> {
        if let Ok(snapshot) = &outcome {
            self.catalog.invalidate();
            let prices = self.catalog.snapshot();
            self.form = SwapForm::new(&self.default_pair, &self.wallet, prices.as_deref());
            self.subscription.mark_unchanged();
            log!(
                INFO,
                "[swap]: Swapped {} {} to {}, form reset",
                snapshot.from_amount,
                snapshot.from_token,
                snapshot.to_token
            );
            self.notifications.push(Notification::SwapSucceeded {
                from_token: snapshot.from_token.clone(),
                to_token: snapshot.to_token.clone(),
            });
        }
        outcome
    }
}
