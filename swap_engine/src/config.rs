use crate::{
    DEFAULT_API_BASE_URL, DEFAULT_FROM_TOKEN, DEFAULT_TO_TOKEN, MAX_TRADE_AMOUNT,
    MIN_TRADE_AMOUNT, STREAM_RECONNECT_DELAY, TRADING_FEE, USD_ANCHOR,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const API_BASE_URL_ENV: &str = "SWAP_API_BASE_URL";
pub const STREAM_URL_ENV: &str = "SWAP_STREAM_URL";
pub const CONFIG_PATH_ENV: &str = "SWAP_CONFIG";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvalidConfigError {
    #[error("invalid api_base_url: {0}")]
    InvalidApiBaseUrl(String),
    #[error("invalid stream_url: {0}")]
    InvalidStreamUrl(String),
    #[error("invalid trade limits: {0}")]
    InvalidTradeLimits(String),
    #[error("invalid fee: {0}")]
    InvalidFee(String),
    #[error("invalid default pair: {0}")]
    InvalidDefaultPair(String),
    #[error("invalid wallet balance: {0}")]
    InvalidWalletBalance(String),
    #[error("failed to read configuration: {0}")]
    Unreadable(String),
}

/// Bounds applied to the user-entered `from` amount and the fee deducted
/// from the derived `to` amount.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeLimits {
    pub min_trade_amount: f64,
    pub max_trade_amount: f64,
    pub fee: f64,
}

impl Default for TradeLimits {
    fn default() -> Self {
        Self {
            min_trade_amount: MIN_TRADE_AMOUNT,
            max_trade_amount: MAX_TRADE_AMOUNT,
            fee: TRADING_FEE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub from: String,
    pub to: String,
}

impl Default for TokenPair {
    fn default() -> Self {
        Self {
            from: DEFAULT_FROM_TOKEN.to_string(),
            to: DEFAULT_TO_TOKEN.to_string(),
        }
    }
}

/// Amount held per currency. Currencies without an entry hold nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletBalances(BTreeMap<String, f64>);

impl WalletBalances {
    pub fn new(balances: BTreeMap<String, f64>) -> Self {
        Self(balances)
    }

    pub fn balance_of(&self, currency: &str) -> f64 {
        self.0.get(currency).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }
}

impl Default for WalletBalances {
    fn default() -> Self {
        Self(BTreeMap::from([
            ("USD".to_string(), 3_934_023.54),
            ("WBTC".to_string(), 234.3434234),
            ("ETH".to_string(), 3546.23),
        ]))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub api_base_url: String,
    pub stream_url: Option<String>,
    pub request_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    pub trade_limits: TradeLimits,
    pub default_pair: TokenPair,
    pub usd_anchor: String,
    pub wallet: WalletBalances,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            stream_url: None,
            request_timeout_secs: crate::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            reconnect_delay_secs: STREAM_RECONNECT_DELAY.as_secs(),
            trade_limits: TradeLimits::default(),
            default_pair: TokenPair::default(),
            usd_anchor: USD_ANCHOR.to_string(),
            wallet: WalletBalances::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults, then the YAML file named by `SWAP_CONFIG` if set, then the
    /// endpoint variables on top.
    pub fn from_env() -> Result<Self, InvalidConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, InvalidConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        if let Some(url) = lookup(API_BASE_URL_ENV) {
            config.api_base_url = url;
        }
        if let Some(url) = lookup(STREAM_URL_ENV) {
            config.stream_url = Some(url);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, InvalidConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            InvalidConfigError::Unreadable(format!("{}: {e}", path.display()))
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, InvalidConfigError> {
        serde_yaml::from_str(contents).map_err(|e| InvalidConfigError::Unreadable(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn validate(&self) -> Result<(), InvalidConfigError> {
        let api = Url::parse(&self.api_base_url)
            .map_err(|e| InvalidConfigError::InvalidApiBaseUrl(format!("{e}")))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(InvalidConfigError::InvalidApiBaseUrl(format!(
                "scheme must be http or https, got '{}'",
                api.scheme()
            )));
        }
        if let Some(stream_url) = &self.stream_url {
            let stream = Url::parse(stream_url)
                .map_err(|e| InvalidConfigError::InvalidStreamUrl(format!("{e}")))?;
            if !matches!(stream.scheme(), "ws" | "wss") {
                return Err(InvalidConfigError::InvalidStreamUrl(format!(
                    "scheme must be ws or wss, got '{}'",
                    stream.scheme()
                )));
            }
        }

        let TradeLimits {
            min_trade_amount,
            max_trade_amount,
            fee,
        } = self.trade_limits;
        if !(min_trade_amount.is_finite() && min_trade_amount > 0.0) {
            return Err(InvalidConfigError::InvalidTradeLimits(
                "min_trade_amount must be positive".to_string(),
            ));
        }
        if !(max_trade_amount.is_finite() && max_trade_amount >= min_trade_amount) {
            return Err(InvalidConfigError::InvalidTradeLimits(
                "max_trade_amount must not be below min_trade_amount".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&fee) {
            return Err(InvalidConfigError::InvalidFee(format!(
                "fee must be in [0, 1), got {fee}"
            )));
        }

        if self.default_pair.from.trim().is_empty() || self.default_pair.to.trim().is_empty() {
            return Err(InvalidConfigError::InvalidDefaultPair(
                "default tokens cannot be blank".to_string(),
            ));
        }
        if self.usd_anchor.trim().is_empty() {
            return Err(InvalidConfigError::InvalidDefaultPair(
                "usd_anchor cannot be blank".to_string(),
            ));
        }
        if let Some((currency, balance)) = self
            .wallet
            .iter()
            .find(|(_, balance)| !(balance.is_finite() && **balance >= 0.0))
        {
            return Err(InvalidConfigError::InvalidWalletBalance(format!(
                "{currency} balance must be a non-negative number, got {balance}"
            )));
        }
        Ok(())
    }
}
