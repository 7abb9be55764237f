// Maps the pipeline error taxonomy onto HTTP status codes

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use mailguard_core::MailGuardError;

/// Wrapper so pipeline errors can flow out of handlers with `?`
pub struct ApiError(pub MailGuardError);

impl From<MailGuardError> for ApiError {
    fn from(err: MailGuardError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MailGuardError::Validation(_) => StatusCode::BAD_REQUEST,
            MailGuardError::NotFound(_) => StatusCode::NOT_FOUND,
            MailGuardError::DatabaseUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MailGuardError::Delivery(_) | MailGuardError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (MailGuardError::validation("bad"), StatusCode::BAD_REQUEST),
            (MailGuardError::not_found("gone"), StatusCode::NOT_FOUND),
            (
                MailGuardError::unavailable("pool"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                MailGuardError::delivery("smtp"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                MailGuardError::Internal(anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
