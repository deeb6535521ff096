use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Debug, Display, Formatter};
use thiserror::Error;

pub const PRICES_ROUTE: &str = "prices";
pub const SWAP_ROUTE: &str = "swap";

/// Status reported when a failure carries no recognizable error body.
pub const UNKNOWN_ERROR_STATUS: u16 = 400;
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown";

/// One row of the `GET /prices` response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenPriceResponse {
    pub currency: String,
    /// ISO-8601 timestamp of the quote.
    pub date: String,
    pub price: f64,
}

/// Body of `POST /swap`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub from_token: String,
    pub to_token: String,
    pub from_amount: f64,
    pub exchange_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResponse {
    pub success: bool,
}

/// Failure of a fetch or execution call.
///
/// Non-2xx responses whose body carries a string `message` keep that message,
/// the response status and the body's `data` field. Anything else collapses
/// into [`TransportError::unknown`].
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{message} (status: {status})")]
pub struct TransportError {
    pub message: String,
    pub status: u16,
    pub data: Option<Value>,
}

impl TransportError {
    pub fn new(message: impl Into<String>, status: u16, data: Option<Value>) -> Self {
        Self {
            message: message.into(),
            status,
            data,
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ERROR_MESSAGE, UNKNOWN_ERROR_STATUS, None)
    }

    pub fn is_unknown(&self) -> bool {
        self.message == UNKNOWN_ERROR_MESSAGE && self.data.is_none()
    }
}

/// Error body shape produced by the REST backend on failure.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Value,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Errors raised while building a client, before any request is sent.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Invalid base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl Debug for HttpHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<HttpHeader>,
    pub body: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
