//! API token authentication middleware.
//!
//! Checks for `Authorization: Bearer <token>` headers and, if valid,
//! attaches the token's [`Principal`] to the request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::error::BlogError;
use crate::models::{Principal, hash_token};
use crate::state::AppState;

/// Middleware that authenticates via Bearer token.
///
/// - Valid token -> the principal is inserted into the request extensions
/// - Unknown or expired token -> 401 JSON error
/// - No header -> passes through; handlers that need a principal reject the request
pub async fn authenticate_api_token(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let raw_token = match bearer_token(&request) {
        Some(token) => token.to_string(),
        None => return next.run(request).await,
    };

    let principal: Principal = match state
        .store()
        .principal_for_token(&hash_token(&raw_token), Utc::now())
        .await
    {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::debug!("rejected unknown or expired API token");
            return BlogError::Unauthorized.into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to look up API token");
            return e.into_response();
        }
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn request(auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/admin/blogs");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&request(Some("Bearer abc123"))), Some("abc123"));
    }

    #[test]
    fn ignores_other_schemes() {
        assert_eq!(bearer_token(&request(Some("Basic dXNlcg=="))), None);
        assert_eq!(bearer_token(&request(Some("Bearer "))), None);
        assert_eq!(bearer_token(&request(None)), None);
    }
}
