use crate::catalog::{ingest_price_rows, PriceCatalog, PriceMap};
use crate::config::{EngineConfig, WalletBalances};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swap_api_client::{PriceApi, SwapRequest, SwapResponse, TokenPriceResponse, TransportError};

pub const PRICE_DATE: &str = "2023-08-29T07:10:52.000Z";

pub fn price_row(currency: &str, price: f64, date: &str) -> TokenPriceResponse {
    TokenPriceResponse {
        currency: currency.to_string(),
        date: date.to_string(),
        price,
    }
}

pub fn price_rows(prices: BTreeMap<&str, f64>) -> Vec<TokenPriceResponse> {
    prices
        .into_iter()
        .map(|(currency, price)| price_row(currency, price, PRICE_DATE))
        .collect()
}

pub fn price_map(prices: BTreeMap<&str, f64>) -> PriceMap {
    ingest_price_rows(price_rows(prices))
}

pub fn config_with_wallet(wallet: BTreeMap<&str, f64>) -> EngineConfig {
    EngineConfig {
        wallet: WalletBalances::new(
            wallet
                .into_iter()
                .map(|(currency, amount)| (currency.to_string(), amount))
                .collect(),
        ),
        ..EngineConfig::default()
    }
}

/// In-memory backend with call counters, optional latency and scripted swap
/// outcomes. Swaps succeed unless an outcome was queued.
pub struct FixturePriceApi {
    rows: Mutex<Vec<TokenPriceResponse>>,
    fetch_errors: Mutex<VecDeque<TransportError>>,
    swap_outcomes: Mutex<VecDeque<Result<SwapResponse, TransportError>>>,
    swap_requests: Mutex<Vec<SwapRequest>>,
    price_calls: AtomicUsize,
    fetch_latency: Duration,
    swap_latency: Duration,
}

impl FixturePriceApi {
    pub fn new(prices: BTreeMap<&str, f64>) -> Self {
        Self::with_rows(price_rows(prices))
    }

    pub fn with_rows(rows: Vec<TokenPriceResponse>) -> Self {
        Self {
            rows: Mutex::new(rows),
            fetch_errors: Mutex::default(),
            swap_outcomes: Mutex::default(),
            swap_requests: Mutex::default(),
            price_calls: AtomicUsize::new(0),
            fetch_latency: Duration::ZERO,
            swap_latency: Duration::ZERO,
        }
    }

    pub fn with_fetch_latency(mut self, latency: Duration) -> Self {
        self.fetch_latency = latency;
        self
    }

    pub fn with_swap_latency(mut self, latency: Duration) -> Self {
        self.swap_latency = latency;
        self
    }

    pub fn set_prices(&self, prices: BTreeMap<&str, f64>) {
        *self.rows.lock().unwrap() = price_rows(prices);
    }

    pub fn fail_next_fetch(&self, error: TransportError) {
        self.fetch_errors.lock().unwrap().push_back(error);
    }

    pub fn push_swap_outcome(&self, outcome: Result<SwapResponse, TransportError>) {
        self.swap_outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    pub fn swap_requests(&self) -> Vec<SwapRequest> {
        self.swap_requests.lock().unwrap().clone()
    }

    /// Catalog backed by this fixture, plus the fixture itself for assertions.
    pub fn into_catalog(self) -> (Arc<Self>, PriceCatalog) {
        let api = Arc::new(self);
        let catalog = PriceCatalog::new(api.clone());
        (api, catalog)
    }
}

#[async_trait]
impl PriceApi for FixturePriceApi {
    async fn get_prices(&self) -> Result<Vec<TokenPriceResponse>, TransportError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.fetch_latency).await;
        if let Some(error) = self.fetch_errors.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn swap(&self, request: SwapRequest) -> Result<SwapResponse, TransportError> {
        self.swap_requests.lock().unwrap().push(request);
        tokio::time::sleep(self.swap_latency).await;
        self.swap_outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(SwapResponse { success: true }))
    }
}
