#[cfg(test)]
mod tests;

use async_trait::async_trait;
use ic_canister_log::Sink;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use url::Url;

pub mod api_types;
pub mod logs;
pub mod native_http;

pub use api_types::{
    ApiError, HttpHeader, HttpMethod, HttpRequest, HttpResponse, SwapRequest, SwapResponse,
    TokenPriceResponse, TransportError, PRICES_ROUTE, SWAP_ROUTE,
};

use crate::native_http::{
    constants::DEFAULT_REQUEST_TIMEOUT,
    http::{json_request, ReqwestTransport},
    util::{decode_json_response, normalize_base_url, route_url},
    HttpTransport,
};

/// The two REST operations the swap engine depends on.
///
/// Errors are never retried here; retrying is a caller policy.
#[async_trait]
pub trait PriceApi: Send + Sync {
    async fn get_prices(&self) -> Result<Vec<TokenPriceResponse>, TransportError>;

    async fn swap(&self, request: SwapRequest) -> Result<SwapResponse, TransportError>;
}

// Client for the REST price and swap endpoints
pub struct SwapApiClient<L: Sink, T: HttpTransport = ReqwestTransport> {
    transport: T,
    logger: L,
    base_url: Url,
    headers: Vec<HttpHeader>,
}

impl<L: Sink> SwapApiClient<L> {
    pub fn builder(base_url: &str, logger: L) -> SwapApiClientBuilder<L> {
        SwapApiClientBuilder::new(base_url, logger)
    }
}

impl<L: Sink, T: HttpTransport> SwapApiClient<L, T> {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn call_internal<P, Out>(
        &self,
        method: HttpMethod,
        route: &str,
        payload: Option<&P>,
    ) -> Result<Out, TransportError>
    where
        P: Serialize + Debug + Sync,
        Out: DeserializeOwned + Debug,
    {
        let url = route_url(&self.base_url, route)?;
        log!(
            self.logger,
            "[{}]: Calling {} {} with payload '{:?}'",
            self.base_url,
            method,
            route,
            payload
        );
        let request = json_request(method, url.to_string(), self.headers.clone(), payload)?;
        let result = match self.transport.execute(request).await {
            Ok(response) => decode_json_response::<Out>(&response),
            Err(err) => Err(err),
        };
        log!(
            self.logger,
            "[{}]: Response to {} {}: {:?}",
            self.base_url,
            method,
            route,
            result
        );
        result
    }
}

#[async_trait]
impl<L, T> PriceApi for SwapApiClient<L, T>
where
    L: Sink + Send + Sync,
    T: HttpTransport,
{
    async fn get_prices(&self) -> Result<Vec<TokenPriceResponse>, TransportError> {
        self.call_internal::<(), _>(HttpMethod::Get, PRICES_ROUTE, None)
            .await
    }

    async fn swap(&self, request: SwapRequest) -> Result<SwapResponse, TransportError> {
        self.call_internal(HttpMethod::Post, SWAP_ROUTE, Some(&request))
            .await
    }
}

pub struct SwapApiClientBuilder<L: Sink, T: HttpTransport = ReqwestTransport> {
    base_url: String,
    logger: L,
    transport: T,
    headers: Vec<HttpHeader>,
}

impl<L: Sink> SwapApiClientBuilder<L> {
    pub fn new(base_url: &str, logger: L) -> Self {
        Self {
            base_url: base_url.to_string(),
            logger,
            transport: ReqwestTransport::new(DEFAULT_REQUEST_TIMEOUT),
            headers: vec![],
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport = ReqwestTransport::new(timeout);
        self
    }
}

impl<L: Sink, T: HttpTransport> SwapApiClientBuilder<L, T> {
    pub fn with_transport<OtherTransport: HttpTransport>(
        self,
        transport: OtherTransport,
    ) -> SwapApiClientBuilder<L, OtherTransport> {
        SwapApiClientBuilder {
            base_url: self.base_url,
            logger: self.logger,
            transport,
            headers: self.headers,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push(HttpHeader {
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn build(self) -> Result<SwapApiClient<L, T>, ApiError> {
        Ok(SwapApiClient {
            transport: self.transport,
            logger: self.logger,
            base_url: normalize_base_url(&self.base_url)?,
            headers: self.headers,
        })
    }
}
