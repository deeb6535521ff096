use crate::api_types::{HttpRequest, HttpResponse, TransportError};
use async_trait::async_trait;

pub mod constants;
pub mod http;
pub mod util;

/// Sends a single request and hands back the raw status and body.
///
/// Implementations must not interpret the status code: mapping a non-2xx
/// response to a [`TransportError`] is the client's job. An `Err` means no
/// response was received at all (connection refused, timeout, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
