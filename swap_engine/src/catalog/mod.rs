//! Shared cache of the latest known price per currency.
//!
//! The catalog is an explicit handle passed to whoever needs prices. Cloning
//! it is cheap and every clone observes the same data.

use crate::logs::{DEBUG, INFO};
use futures::future::{BoxFuture, FutureExt, Shared};
use crate::log;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use swap_api_client::{PriceApi, TokenPriceResponse, TransportError};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::watch;

pub mod rate;

pub use rate::{exchange_rate, usd_value};


#[derive(Clone, Debug, PartialEq)]
pub struct TokenPrice {
    pub currency: String,
    pub price: f64,
    pub as_of: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvalidPriceRow {
    #[error("currency cannot be blank")]
    BlankCurrency,
    #[error("price of {currency} must be a positive number, got {price}")]
    InvalidPrice { currency: String, price: String },
    #[error("date of {currency} is not RFC 3339: {date}")]
    InvalidDate { currency: String, date: String },
}

impl TryFrom<TokenPriceResponse> for TokenPrice {
    type Error = InvalidPriceRow;

    fn try_from(row: TokenPriceResponse) -> Result<Self, Self::Error> {
        let currency = row.currency.trim().to_string();
        if currency.is_empty() {
            return Err(InvalidPriceRow::BlankCurrency);
        }
        if !(row.price.is_finite() && row.price > 0.0) {
            return Err(InvalidPriceRow::InvalidPrice {
                currency,
                price: row.price.to_string(),
            });
        }
        let as_of = OffsetDateTime::parse(&row.date, &Rfc3339).map_err(|_| {
            InvalidPriceRow::InvalidDate {
                currency: currency.clone(),
                date: row.date.clone(),
            }
        })?;
        Ok(TokenPrice {
            currency,
            price: row.price,
            as_of,
        })
    }
}

/// Currency to price, keys unique.
pub type PriceMap = BTreeMap<String, TokenPrice>;

/// Builds a mapping from a `GET /prices` response.
///
/// The response may list a currency several times: the newest `date` wins and
/// on equal dates the later row wins. Invalid rows are skipped.
pub fn ingest_price_rows(rows: Vec<TokenPriceResponse>) -> PriceMap {
    let mut prices = PriceMap::new();
    for row in rows {
        let price = match TokenPrice::try_from(row) {
            Ok(price) => price,
            Err(e) => {
                log!(DEBUG, "[price_catalog]: Skipping price row: {e}");
                continue;
            }
        };
        match prices.get(&price.currency) {
            Some(existing) if existing.as_of > price.as_of => {}
            _ => {
                prices.insert(price.currency.clone(), price);
            }
        }
    }
    prices
}

/// What subscribers observe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogView {
    /// `None` until the first successful fetch, or after an invalidation
    /// nobody was watching.
    pub prices: Option<Arc<PriceMap>>,
    /// Set by [`PriceCatalog::invalidate`], cleared by the next fetch started
    /// after it.
    pub stale: bool,
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<PriceMap>, TransportError>>>;

struct Inner {
    api: Arc<dyn PriceApi>,
    view: watch::Sender<CatalogView>,
    // Bumped by every invalidation. A fetch only publishes if it started in
    // the current generation.
    generation: AtomicU64,
    in_flight: Mutex<Option<(u64, SharedFetch)>>,
}

#[derive(Clone)]
pub struct PriceCatalog {
    inner: Arc<Inner>,
}

impl PriceCatalog {
    pub fn new(api: Arc<dyn PriceApi>) -> Self {
        let (view, _) = watch::channel(CatalogView::default());
        Self {
            inner: Arc::new(Inner {
                api,
                view,
                generation: AtomicU64::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Fetches the full mapping and replaces the cached one.
    ///
    /// Concurrent calls share a single request. A request started before the
    /// latest [`PriceCatalog::invalidate`] is not shared: its response goes to
    /// the callers that awaited it but never replaces the cached mapping. A
    /// failed fetch leaves the cached mapping as it was.
    pub async fn fetch(&self) -> Result<Arc<PriceMap>, TransportError> {
        let fetch = {
            let mut in_flight = lock(&self.inner.in_flight);
            let generation = self.inner.generation.load(Ordering::SeqCst);
            match in_flight.as_ref() {
                Some((started_in, fetch)) if *started_in == generation => fetch.clone(),
                _ => {
                    let fetch = do_fetch(self.inner.clone(), generation).boxed().shared();
                    *in_flight = Some((generation, fetch.clone()));
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Cached mapping when fresh. A stale mapping is served as is while a
    /// refetch runs in the background; without any mapping this waits for a
    /// fetch.
    pub async fn prices(&self) -> Result<Arc<PriceMap>, TransportError> {
        let view = self.view();
        match view.prices {
            Some(prices) if !view.stale => Ok(prices),
            Some(prices) => {
                self.spawn_refetch();
                Ok(prices)
            }
            None => self.fetch().await,
        }
    }

    /// Marks the cached mapping as stale. A fetch already in flight can no
    /// longer clear the flag.
    ///
    /// With at least one subscriber the stale mapping stays visible and a
    /// refetch is scheduled; otherwise the mapping is dropped and the next
    /// [`PriceCatalog::prices`] call fetches again.
    pub fn invalidate(&self) {
        let watched = self.inner.view.receiver_count() > 0;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.view.send_modify(|view| {
            view.stale = true;
            if !watched {
                view.prices = None;
            }
        });
        if watched {
            log!(INFO, "[price_catalog]: Invalidated, refetching for subscribers");
            self.spawn_refetch();
        } else {
            log!(INFO, "[price_catalog]: Invalidated, cached prices dropped");
        }
    }

    /// Replaces a single currency entry.
    ///
    /// Pushes are applied in arrival order, regardless of the price date.
    /// Returns `false` when there is no mapping yet to patch: the pending
    /// fetch will bring a complete one.
    pub fn apply_push(&self, update: TokenPrice) -> bool {
        let mut applied = false;
        self.inner.view.send_if_modified(|view| match view.prices.as_mut() {
            Some(prices) => {
                Arc::make_mut(prices).insert(update.currency.clone(), update.clone());
                applied = true;
                true
            }
            None => false,
        });
        if applied {
            log!(
                DEBUG,
                "[price_catalog]: Patched {} to {}",
                update.currency,
                update.price
            );
        } else {
            log!(
                DEBUG,
                "[price_catalog]: Dropped push for {}, no prices loaded yet",
                update.currency
            );
        }
        applied
    }

    pub fn subscribe(&self) -> watch::Receiver<CatalogView> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> CatalogView {
        self.inner.view.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<PriceMap>> {
        self.inner.view.borrow().prices.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.view.borrow().prices.is_some()
    }

    pub fn is_stale(&self) -> bool {
        self.inner.view.borrow().stale
    }

    /// Sorted currency codes of the current mapping; empty while pending.
    pub fn currencies(&self) -> Vec<String> {
        self.inner
            .view
            .borrow()
            .prices
            .as_ref()
            .map(|prices| prices.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn spawn_refetch(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log!(
                DEBUG,
                "[price_catalog]: No runtime to refetch on, waiting for the next read"
            );
            return;
        };
        let catalog = self.clone();
        runtime.spawn(async move {
            if let Err(e) = catalog.fetch().await {
                log!(INFO, "[price_catalog]: Background refetch failed: {e}");
            }
        });
    }
}

async fn do_fetch(inner: Arc<Inner>, generation: u64) -> Result<Arc<PriceMap>, TransportError> {
    // Cleared however the fetch ends, including when every waiter drops it,
    // unless a newer fetch took the slot.
    let _in_flight = scopeguard::guard(inner.clone(), |inner| {
        let mut in_flight = lock(&inner.in_flight);
        if matches!(in_flight.as_ref(), Some((started_in, _)) if *started_in == generation) {
            *in_flight = None;
        }
    });

    let rows = inner.api.get_prices().await.map_err(|e| {
        log!(INFO, "[price_catalog]: Failed to fetch prices: {e}");
        e
    })?;
    let row_count = rows.len();
    let prices = Arc::new(ingest_price_rows(rows));
    log!(
        INFO,
        "[price_catalog]: Loaded {} currencies from {row_count} rows",
        prices.len()
    );
    let published = inner.view.send_if_modified(|view| {
        if inner.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        view.prices = Some(prices.clone());
        view.stale = false;
        true
    });
    if !published {
        log!(
            DEBUG,
            "[price_catalog]: Discarded prices requested before the last invalidation"
        );
    }
    Ok(prices)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
