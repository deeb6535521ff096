use std::time::Duration;

pub mod amount;
pub mod catalog;
pub mod config;
pub mod form;
pub mod logs;
pub mod session;
pub mod stream;
pub mod swap;

#[cfg(test)]
pub mod test_fixtures;


// The streaming channel retries forever with a fixed delay, no backoff.
pub const STREAM_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const TRANSFER_PROGRESS_TICK: Duration = Duration::from_millis(400);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fraction deducted from every derived `to` amount (0.1%).
pub const TRADING_FEE: f64 = 0.001;
pub const MIN_TRADE_AMOUNT: f64 = 0.00002;
pub const MAX_TRADE_AMOUNT: f64 = 1000.0;

pub const DEFAULT_API_BASE_URL: &str = "https://interview.switcheo.com";
pub const DEFAULT_FROM_TOKEN: &str = "USD";
pub const DEFAULT_TO_TOKEN: &str = "ETH";
pub const USD_ANCHOR: &str = "USD";
