//! External links listed on a blog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Publishable, validate_name};
use crate::error::{BlogError, BlogResult};

/// A named external link scoped to one blog.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogLink {
    pub id: Uuid,
    pub site_domain: String,
    pub blog_id: Uuid,
    pub name: String,
    pub link: String,
    pub published: bool,
    pub date_available: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
}

impl Publishable for BlogLink {
    fn site_domain(&self) -> &str {
        &self.site_domain
    }

    fn published(&self) -> bool {
        self.published
    }

    fn date_available(&self) -> DateTime<Utc> {
        self.date_available
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLink {
    pub blog_id: Uuid,
    pub name: String,
    pub link: String,
    #[serde(default)]
    pub published: bool,
    pub date_available: Option<DateTime<Utc>>,
}

impl CreateLink {
    pub fn validate(&self) -> BlogResult<()> {
        validate_name("name", &self.name)?;
        validate_link(&self.link)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLink {
    pub blog_id: Option<Uuid>,
    pub name: Option<String>,
    pub link: Option<String>,
    pub published: Option<bool>,
    pub date_available: Option<DateTime<Utc>>,
}

impl UpdateLink {
    pub fn validate(&self) -> BlogResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(link) = &self.link {
            validate_link(link)?;
        }
        Ok(())
    }

    pub fn apply(&self, link: &mut BlogLink) {
        if let Some(blog_id) = self.blog_id {
            link.blog_id = blog_id;
        }
        if let Some(name) = &self.name {
            link.name.clone_from(name);
        }
        if let Some(url) = &self.link {
            link.link.clone_from(url);
        }
        if let Some(published) = self.published {
            link.published = published;
        }
        if let Some(date_available) = self.date_available {
            link.date_available = date_available;
        }
    }
}

/// Links must be absolute http(s) URLs.
fn validate_link(link: &str) -> BlogResult<()> {
    let parsed =
        url::Url::parse(link).map_err(|e| BlogError::Validation(format!("invalid link: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(BlogError::Validation(format!(
            "unsupported link scheme '{other}'"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn link_validation() {
        assert!(validate_link("https://example.com/feed").is_ok());
        assert!(validate_link("not a url").is_err());
        assert!(validate_link("javascript:alert(1)").is_err());
    }
}
