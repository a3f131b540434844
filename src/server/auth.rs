//! Bearer-token authentication middleware.
//!
//! Resolves the `Authorization` header through the identity provider and
//! adds the caller's [`AuthUser`](crate::domain::AuthUser) to request
//! extensions. Requests without a valid token are rejected with 401 before
//! reaching the handler.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::error::ApiError;
use super::AppState;
use crate::adapters::AdapterError;

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return ApiError::unauthorized("No token provided").into_response();
    };

    match state.identity.user_for_token(token).await {
        Ok(user) => {
            debug!(user_id = %user.user_id, "Authenticated request");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e @ AdapterError::Upstream(_)) => ApiError::from(e).into_response(),
        Err(e) => {
            debug!(error = %e, "Rejected token");
            ApiError::unauthorized("Invalid or expired token").into_response()
        }
    }
}

/// Token from `Authorization: Bearer <token>`
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
