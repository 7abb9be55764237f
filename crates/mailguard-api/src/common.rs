// Common DTOs and response helpers shared across API modules

use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use mailguard_core::CacheLookup;

/// Response wrapper for list endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Build a JSON response from a cache lookup, attaching the informative
/// cache-status headers. The headers are not part of the data contract.
pub fn cached_response(lookup: CacheLookup) -> Response {
    let expires = lookup.expires_at.to_rfc3339();
    let mut response = Json(lookup.value).into_response();
    let headers = response.headers_mut();
    headers.insert("x-cache", HeaderValue::from_static(lookup.status.as_str()));
    if let Ok(value) = HeaderValue::from_str(&expires) {
        headers.insert("x-cache-expires", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mailguard_core::CacheStatus;
    use serde_json::json;

    #[test]
    fn cache_headers_are_attached() {
        let response = cached_response(CacheLookup {
            value: json!({"ok": true}),
            status: CacheStatus::Hit,
            expires_at: Utc::now(),
        });

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers().get("x-cache").unwrap(), "HIT");
        assert!(response.headers().contains_key("x-cache-expires"));
    }
}
