//! Canonical response envelope
//!
//! Every JSON endpoint wraps its payload as
//! `{ data?, error?: { code, message, details? }, metadata: { timestamp, durationMs? } }`.
//! Raw-style endpoints (view export) bypass the envelope.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use archihub_core_types::HubError;
use serde::Serialize;
use serde_json::{Value, json};

/// Successful envelope around `data`
pub fn ok<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "data": data,
        "metadata": { "timestamp": chrono::Utc::now() },
    }))
}

/// Successful envelope with the handler's measured duration
pub fn ok_timed<T: Serialize>(data: T, started: std::time::Instant) -> Json<Value> {
    Json(json!({
        "data": data,
        "metadata": {
            "timestamp": chrono::Utc::now(),
            "durationMs": started.elapsed().as_millis() as u64,
        },
    }))
}

/// Error wrapper translating `HubError` into status + envelope
pub struct ApiError(pub HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": {
                "code": err.code(),
                "message": err.to_string(),
                "details": err.details(),
            },
            "metadata": { "timestamp": chrono::Utc::now() },
        }));
        let mut response = (status, body).into_response();
        if let HubError::RateLimited { retry_after_secs } = &err {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type ApiResult = Result<Json<Value>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_response_carries_retry_after() {
        let response = ApiError(HubError::RateLimited { retry_after_secs: 7 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("7")
        );
    }

    #[test]
    fn validation_maps_to_400() {
        let response =
            ApiError(HubError::validation(3, "createElement", "bad type")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
