use crate::api_types::{ApiError, ErrorBody, HttpResponse, TransportError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Parses the REST base url and makes sure relative routes are appended to it
/// rather than replacing its last path segment.
pub fn normalize_base_url(base_url: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };
    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub fn route_url(base_url: &Url, route: &str) -> Result<Url, TransportError> {
    base_url
        .join(route.trim_start_matches('/'))
        .map_err(|e| TransportError::new(format!("Invalid route {route}: {e}"), 400, None))
}

/// Maps a non-2xx response to a [`TransportError`].
///
/// Only a JSON body with a string `message` is trusted; every other shape
/// becomes the generic unknown error.
pub fn transport_error_from_response(response: &HttpResponse) -> TransportError {
    match serde_json::from_slice::<ErrorBody>(&response.body) {
        Ok(ErrorBody {
            message: Value::String(message),
            data,
        }) => TransportError::new(message, response.status, data),
        _ => TransportError::unknown(),
    }
}

pub fn decode_json_response<T: DeserializeOwned>(
    response: &HttpResponse,
) -> Result<T, TransportError> {
    if !response.is_success() {
        return Err(transport_error_from_response(response));
    }
    serde_json::from_slice(&response.body).map_err(|e| {
        TransportError::new(
            format!("Invalid response body: {e}"),
            response.status,
            Some(Value::String(
                String::from_utf8_lossy(&response.body).into_owned(),
            )),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::TokenPriceResponse;
    use assert_matches::assert_matches;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn should_append_routes_to_base_path() {
        let base = normalize_base_url("https://interview.switcheo.com").unwrap();
        assert_eq!(
            route_url(&base, "prices").unwrap().as_str(),
            "https://interview.switcheo.com/prices"
        );

        let base = normalize_base_url("https://api.example.com/v1").unwrap();
        assert_eq!(
            route_url(&base, "/swap").unwrap().as_str(),
            "https://api.example.com/v1/swap"
        );
    }

    #[test]
    fn should_reject_non_http_base_url() {
        assert_matches!(
            normalize_base_url("wss://stream.example.com"),
            Err(ApiError::InvalidBaseUrl { .. })
        );
        assert_matches!(
            normalize_base_url("not a url"),
            Err(ApiError::InvalidBaseUrl { .. })
        );
    }

    #[test]
    fn should_keep_structured_error_message() {
        let error = transport_error_from_response(&response(
            422,
            r#"{"message":"pair not supported","data":{"pair":"USD/XYZ"}}"#,
        ));
        assert_eq!(error.message, "pair not supported");
        assert_eq!(error.status, 422);
        assert_eq!(error.data, Some(serde_json::json!({"pair": "USD/XYZ"})));
    }

    #[test]
    fn should_collapse_unrecognized_errors_to_unknown() {
        for body in ["", "<html>bad gateway</html>", r#"{"message":42}"#, r#"{"error":"x"}"#] {
            let error = transport_error_from_response(&response(502, body));
            assert_eq!(error, TransportError::unknown());
            assert_eq!(error.status, 400);
        }
    }

    #[test]
    fn should_decode_price_rows() {
        let rows: Vec<TokenPriceResponse> = decode_json_response(&response(
            200,
            r#"[{"currency":"ETH","date":"2023-08-29T07:10:52.000Z","price":1645.93}]"#,
        ))
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].currency, "ETH");
        assert_eq!(rows[0].price, 1645.93);
    }

    #[test]
    fn should_report_undecodable_success_body() {
        let result: Result<Vec<TokenPriceResponse>, _> =
            decode_json_response(&response(200, "{not json"));
        let error = result.unwrap_err();
        assert_eq!(error.status, 200);
        assert!(error.message.starts_with("Invalid response body"));
    }
}
