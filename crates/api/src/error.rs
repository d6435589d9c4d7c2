use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::{AdapterError, AdapterErrorKind, UnknownBroker, ValidationError};

/// Everything a handler can fail with. This is the single place any
/// outcome — adapter failure or caller error — becomes an HTTP response;
/// nothing below it touches status codes.
#[derive(Debug)]
pub enum ApiError {
    /// The path named a broker the gateway does not serve.
    UnsupportedBroker(String),
    /// The request body failed validation before any adapter ran.
    Validation(String),
    /// A dispatched broker call failed.
    Adapter(AdapterError),
}

impl From<UnknownBroker> for ApiError {
    fn from(err: UnknownBroker) -> Self {
        Self::UnsupportedBroker(err.0)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.0)
    }
}

impl From<AdapterError> for ApiError {
    fn from(err: AdapterError) -> Self {
        Self::Adapter(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::UnsupportedBroker(name) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": format!("unsupported broker: {name}"),
                })),
            )
                .into_response(),
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            ApiError::Adapter(err) => {
                let status = match err.kind() {
                    AdapterErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                    AdapterErrorKind::BrokerRejected => StatusCode::UNPROCESSABLE_ENTITY,
                    AdapterErrorKind::SubprocessFailure
                    | AdapterErrorKind::ParseFailure
                    | AdapterErrorKind::NetworkFailure => StatusCode::BAD_GATEWAY,
                };
                // The message is the wire contract; kind and retryability
                // ride along so clients can decide what to retry.
                (
                    status,
                    Json(serde_json::json!({
                        "error": err.to_string(),
                        "kind": err.kind(),
                        "retryable": err.is_retryable(),
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_by_kind() {
        let cases = [
            (
                ApiError::Adapter(AdapterError::Timeout(Duration::from_secs(30))),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ApiError::Adapter(AdapterError::Rejected("no".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Adapter(AdapterError::Network("reset".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::UnsupportedBroker("robinhood".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Validation("quantity must be strictly positive".into()),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
