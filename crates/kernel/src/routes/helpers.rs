//! Shared route helpers: request extractors and query parameters.

use axum::extract::FromRequestParts;
use axum::http::header::HOST;
use axum::http::request::Parts;
use serde::Deserialize;

use crate::access::AccessScope;
use crate::error::BlogError;
use crate::models::Principal;
use crate::state::AppState;

/// The site a request is addressed to: the `Host` header without its port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDomain(pub String);

impl SiteDomain {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercased host name without a trailing `:port`.
pub fn site_from_host(host: &str) -> Option<String> {
    let host = host.trim();
    let name = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    if name.is_empty() {
        None
    } else {
        Some(name.to_ascii_lowercase())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SiteDomain {
    type Rejection = BlogError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(site_from_host)
            .map(SiteDomain)
            .ok_or_else(|| BlogError::Validation("missing Host header".into()))
    }
}

/// An authenticated editor and the blogs they may touch.
///
/// Requires [`authenticate_api_token`](crate::middleware::authenticate_api_token)
/// to have run; rejects with 401 when no principal is attached.
#[derive(Debug, Clone)]
pub struct Editor {
    pub principal: Principal,
    pub scope: AccessScope,
}

impl FromRequestParts<AppState> for Editor {
    type Rejection = BlogError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(BlogError::Unauthorized)?;
        let scope = state.access().scope_for(&principal).await?;
        Ok(Self { principal, scope })
    }
}

/// `?page=N`, one-based. Missing or zero means the first page.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn host_port_is_stripped() {
        assert_eq!(site_from_host("Example.com:8080").unwrap(), "example.com");
        assert_eq!(site_from_host("example.com").unwrap(), "example.com");
    }

    #[test]
    fn empty_host_is_rejected() {
        assert!(site_from_host("").is_none());
        assert!(site_from_host(":80").is_none());
    }

    #[test]
    fn page_defaults_to_first() {
        assert_eq!(PageQuery::default().page(), 1);
        assert_eq!(PageQuery { page: Some(0) }.page(), 1);
        assert_eq!(PageQuery { page: Some(3) }.page(), 3);
    }
}
