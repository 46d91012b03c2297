//! Blog data models.

pub mod blog;
pub mod category;
pub mod link;
pub mod post;
pub mod principal;

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::{BlogError, BlogResult};

pub use blog::{
    Blog, BlogChannelRelated, BlogProfile, BlogRelated, BlogType, CreateBlog, LayoutMode,
    UpdateBlog,
};
pub use category::{Category, CreateCategory, UpdateCategory};
pub use link::{BlogLink, CreateLink, UpdateLink};
pub use post::{BlogPost, CreatePost, MediaKind, PostMedia, PostRelated, UpdatePost};
pub use principal::{ApiToken, Principal, generate_token, hash_token};

/// Slug field format: letters, digits, underscores, hyphens.
#[allow(clippy::expect_used)]
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid regex literal"));

/// Publish window and site scoping shared by every blog entity.
pub trait Publishable {
    fn site_domain(&self) -> &str;
    fn published(&self) -> bool;
    fn date_available(&self) -> DateTime<Utc>;

    /// Published and inside its availability window at `now`.
    fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.published() && self.date_available() <= now
    }
}

/// Reject slugs containing anything but letters, digits, hyphens, and underscores.
pub fn validate_slug(slug: &str) -> BlogResult<()> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(BlogError::Validation(format!(
            "'{slug}' is not a valid slug: use letters, numbers, underscores or hyphens"
        )))
    }
}

/// Reject blank names.
pub(crate) fn validate_name(field: &str, value: &str) -> BlogResult<()> {
    if value.trim().is_empty() {
        return Err(BlogError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Deserialize a nullable field so that an explicit `null` becomes `Some(None)`.
///
/// Combined with `#[serde(default)]`, an absent field stays `None`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn slug_format() {
        assert!(validate_slug("news").is_ok());
        assert!(validate_slug("rust-2024_notes").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("news/ai").is_err());
        assert!(validate_slug("with space").is_err());
        assert!(matches!(
            validate_slug("ação"),
            Err(BlogError::Validation(_))
        ));
    }

    #[test]
    fn blank_names_rejected() {
        assert!(validate_name("name", "  ").is_err());
        assert!(validate_name("name", "Tech").is_ok());
    }
}
