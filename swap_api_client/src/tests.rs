use crate::api_types::{HttpMethod, HttpResponse, SwapRequest, SwapResponse, TransportError};
use crate::logs::{PrintProxySink, DEBUG};
use crate::native_http::MockHttpTransport;
use crate::{PriceApi, SwapApiClient, SwapApiClientBuilder};
use assert_matches::assert_matches;

const BASE_URL: &str = "https://interview.switcheo.com";

fn client_with(transport: MockHttpTransport) -> SwapApiClient<PrintProxySink, MockHttpTransport> {
    SwapApiClientBuilder::new(BASE_URL, DEBUG)
        .with_transport(transport)
        .with_header("x-client", "swap-engine")
        .build()
        .expect("valid base url")
}

fn json_response(status: u16, body: serde_json::Value) -> HttpResponse {
    HttpResponse {
        status,
        body: serde_json::to_vec(&body).unwrap(),
    }
}

#[tokio::test]
async fn should_get_prices() {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_execute()
        .withf(|request| {
            request.method == HttpMethod::Get
                && request.url == "https://interview.switcheo.com/prices"
                && request.body.is_none()
                && request
                    .headers
                    .iter()
                    .any(|h| h.name == "x-client" && h.value == "swap-engine")
        })
        .times(1)
        .returning(|_| {
            Ok(json_response(
                200,
                serde_json::json!([
                    {"currency": "ETH", "date": "2023-08-29T07:10:52.000Z", "price": 1645.9337373737374},
                    {"currency": "USD", "date": "2023-08-29T07:10:30.000Z", "price": 1}
                ]),
            ))
        });

    let prices = client_with(transport).get_prices().await.unwrap();

    assert_eq!(prices.len(), 2);
    assert_eq!(prices[0].currency, "ETH");
    assert_eq!(prices[1].price, 1.0);
}

#[tokio::test]
async fn should_post_swap_request() {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_execute()
        .withf(|request| {
            let body: serde_json::Value =
                serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap();
            request.method == HttpMethod::Post
                && request.url == "https://interview.switcheo.com/swap"
                && body
                    == serde_json::json!({
                        "fromToken": "USD",
                        "toToken": "ETH",
                        "fromAmount": 100.0,
                        "exchangeRate": 0.5
                    })
        })
        .times(1)
        .returning(|_| Ok(json_response(200, serde_json::json!({"success": true}))));

    let response = client_with(transport)
        .swap(SwapRequest {
            from_token: "USD".to_string(),
            to_token: "ETH".to_string(),
            from_amount: 100.0,
            exchange_rate: 0.5,
        })
        .await
        .unwrap();

    assert_eq!(response, SwapResponse { success: true });
}

#[tokio::test]
async fn should_keep_structured_error_from_backend() {
    let mut transport = MockHttpTransport::new();
    transport.expect_execute().times(1).returning(|_| {
        Ok(json_response(
            503,
            serde_json::json!({"message": "prices unavailable", "data": {"retryAfter": 5}}),
        ))
    });

    let error = client_with(transport).get_prices().await.unwrap_err();

    assert_eq!(
        error,
        TransportError::new(
            "prices unavailable",
            503,
            Some(serde_json::json!({"retryAfter": 5}))
        )
    );
}

#[tokio::test]
async fn should_collapse_unstructured_error_to_unknown() {
    let mut transport = MockHttpTransport::new();
    transport.expect_execute().times(1).returning(|_| {
        Ok(HttpResponse {
            status: 502,
            body: b"<html>Bad Gateway</html>".to_vec(),
        })
    });

    let error = client_with(transport).get_prices().await.unwrap_err();

    assert!(error.is_unknown());
    assert_eq!(error.status, 400);
}

#[tokio::test]
async fn should_forward_transport_failure() {
    let mut transport = MockHttpTransport::new();
    transport
        .expect_execute()
        .times(1)
        .returning(|_| Err(TransportError::unknown()));

    assert_matches!(
        client_with(transport)
            .swap(SwapRequest {
                from_token: "ETH".to_string(),
                to_token: "USD".to_string(),
                from_amount: 1.0,
                exchange_rate: 1645.93,
            })
            .await,
        Err(e) if e.is_unknown()
    );
}

#[test]
fn should_reject_invalid_base_url() {
    let result = SwapApiClientBuilder::new("ftp://prices.example.com", DEBUG)
        .with_transport(MockHttpTransport::new())
        .build()
        .err();
    assert_matches!(result, Some(crate::ApiError::InvalidBaseUrl { .. }));
}
