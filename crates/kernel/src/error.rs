//! Blog module error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the category tree, access controller, and blog services.
///
/// Validation-time errors (`DuplicatePath`, `AccessDenied`, `InvalidParent`,
/// `Validation`) are returned to the caller for correction and are never
/// auto-corrected.
#[derive(Debug, Error)]
pub enum BlogError {
    /// Category long slug collides with another category in the same site and blog.
    #[error("the path '{long_slug}' already exists in this blog, please choose another slug")]
    DuplicatePath { long_slug: String },

    /// The principal may not view or change the target blog.
    #[error("access denied")]
    AccessDenied,

    /// No principal was attached to the request.
    #[error("authentication required")]
    Unauthorized,

    /// The profile extension referenced by configuration cannot be located.
    #[error("improperly configured: {0}")]
    MisconfiguredProfile(String),

    /// A blog, category, or post lookup by slug or id found nothing.
    #[error("not found")]
    NotFound,

    /// The requested parent would break the two-level category tree.
    #[error("invalid parent: {0}")]
    InvalidParent(String),

    /// Field-level validation failure (slug format, duplicate blog slug, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage error")]
    Storage(#[from] anyhow::Error),
}

impl BlogError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicatePath { .. } => StatusCode::CONFLICT,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidParent(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MisconfiguredProfile(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for BlogError {
    fn into_response(self) -> Response {
        let status = self.status();

        let error = match &self {
            Self::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                "internal server error".to_string()
            }
            Self::MisconfiguredProfile(detail) => {
                tracing::error!(detail = %detail, "blog profile misconfigured");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

/// Result type alias using BlogError.
pub type BlogResult<T> = Result<T, BlogError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_path_names_the_slug() {
        let err = BlogError::DuplicatePath {
            long_slug: "news/ai".to_string(),
        };
        assert!(err.to_string().contains("news/ai"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(BlogError::AccessDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(BlogError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(BlogError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            BlogError::InvalidParent("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BlogError::MisconfiguredProfile("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_errors_hide_details() {
        let response = BlogError::Storage(anyhow::anyhow!("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
