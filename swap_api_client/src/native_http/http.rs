use crate::api_types::{HttpHeader, HttpMethod, HttpRequest, HttpResponse, TransportError};
use crate::log;
use crate::logs::DEBUG;
use crate::native_http::{
    constants::{CONTENT_TYPE_HEADER_LOWERCASE, CONTENT_TYPE_VALUE},
    HttpTransport,
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// [`HttpTransport`] backed by a shared `reqwest` connection pool.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        }
        .timeout(self.timeout);
        for header in &request.headers {
            builder = builder.header(header.name.as_str(), header.value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            log!(
                DEBUG,
                "[http]: {} {} failed before a response was received: {e}",
                request.method,
                request.url
            );
            TransportError::unknown()
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            log!(
                DEBUG,
                "[http]: {} {} failed reading the response body: {e}",
                request.method,
                request.url
            );
            TransportError::unknown()
        })?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Builds a JSON request, adding the `content-type` header unless the caller
/// already supplied one.
pub fn json_request<P: Serialize>(
    method: HttpMethod,
    url: String,
    mut headers: Vec<HttpHeader>,
    payload: Option<&P>,
) -> Result<HttpRequest, TransportError> {
    if !headers
        .iter()
        .any(|header| header.name.to_lowercase() == CONTENT_TYPE_HEADER_LOWERCASE)
    {
        headers.push(HttpHeader {
            name: CONTENT_TYPE_HEADER_LOWERCASE.to_string(),
            value: CONTENT_TYPE_VALUE.to_string(),
        });
    }
    let body = payload
        .map(serde_json::to_vec)
        .transpose()
        .map_err(|e| {
            TransportError::new(
                format!("Failed to encode request body: {e}"),
                crate::api_types::UNKNOWN_ERROR_STATUS,
                None,
            )
        })?;
    Ok(HttpRequest {
        method,
        url,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::SwapRequest;

    #[test]
    fn should_add_json_content_type_once() {
        let request = json_request::<()>(
            HttpMethod::Get,
            "https://example.com/prices".to_string(),
            vec![],
            None,
        )
        .unwrap();
        assert_eq!(
            request.headers,
            vec![HttpHeader {
                name: "content-type".to_string(),
                value: "application/json".to_string(),
            }]
        );
        assert_eq!(request.body, None);

        let request = json_request::<()>(
            HttpMethod::Get,
            "https://example.com/prices".to_string(),
            vec![HttpHeader {
                name: "Content-Type".to_string(),
                value: "text/plain".to_string(),
            }],
            None,
        )
        .unwrap();
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.headers[0].value, "text/plain");
    }

    #[test]
    fn should_encode_swap_request_in_camel_case() {
        let payload = SwapRequest {
            from_token: "USD".to_string(),
            to_token: "ETH".to_string(),
            from_amount: 100.0,
            exchange_rate: 0.5,
        };
        let request = json_request(
            HttpMethod::Post,
            "https://example.com/swap".to_string(),
            vec![],
            Some(&payload),
        )
        .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "fromToken": "USD",
                "toToken": "ETH",
                "fromAmount": 100.0,
                "exchangeRate": 0.5
            })
        );
    }
}
