//! Blog model: a named, publishable container for categories, posts, and links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Publishable, validate_name, validate_slug};
use crate::error::BlogResult;

/// Kind of content a blog carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BlogType {
    #[default]
    Blog,
    Vlog,
}

impl BlogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blog => "blog",
            Self::Vlog => "vlog",
        }
    }

    /// Parse a type name as used in `/{channel}/?type=vlog` listings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blog" => Some(Self::Blog),
            "vlog" => Some(Self::Vlog),
            _ => None,
        }
    }
}

/// Rendering style hint for the blog's listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Default,
    Resumed,
    Mix,
}

/// Blog record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Blog {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    /// Site the blog belongs to.
    pub site_domain: String,

    pub name: String,

    /// URL slug, unique per site.
    pub slug: String,

    pub description: String,

    #[serde(rename = "type")]
    pub blog_type: BlogType,

    pub layout_mode: LayoutMode,

    pub main_image: Option<String>,

    /// Blog content lives on another system; only listed here.
    pub external: bool,

    pub published: bool,
    pub date_available: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
}

impl Publishable for Blog {
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

/// Ordered link from one blog to another.
///
/// Either side may have been nulled by a delete; consumers skip such rows.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogRelated {
    pub id: Uuid,
    pub blog_id: Option<Uuid>,
    pub related_id: Option<Uuid>,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
}

/// Title-only profile stored for the bundled `basic` profile kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogProfile {
    pub blog_id: Uuid,
    pub title: String,
    pub created: DateTime<Utc>,
}

/// Ordered link from a blog to a channel of the host site.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogChannelRelated {
    pub id: Uuid,
    pub blog_id: Option<Uuid>,
    pub channel_id: Option<Uuid>,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
}

/// Input for creating a blog.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBlog {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub blog_type: BlogType,
    #[serde(default)]
    pub layout_mode: LayoutMode,
    pub main_image: Option<String>,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub published: bool,
    pub date_available: Option<DateTime<Utc>>,
    /// Users allowed to edit the blog.
    #[serde(default)]
    pub users: Vec<Uuid>,
}

impl CreateBlog {
    pub fn validate(&self) -> BlogResult<()> {
        validate_name("name", &self.name)?;
        validate_slug(&self.slug)
    }
}

/// Input for updating a blog. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlog {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub blog_type: Option<BlogType>,
    pub layout_mode: Option<LayoutMode>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub main_image: Option<Option<String>>,
    pub external: Option<bool>,
    pub published: Option<bool>,
    pub date_available: Option<DateTime<Utc>>,
    /// Replaces the assigned user set when present.
    pub users: Option<Vec<Uuid>>,
}

impl UpdateBlog {
    pub fn validate(&self) -> BlogResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        Ok(())
    }

    /// Apply the present fields onto `blog`.
    pub fn apply(&self, blog: &mut Blog) {
        if let Some(name) = &self.name {
            blog.name.clone_from(name);
        }
        if let Some(slug) = &self.slug {
            blog.slug.clone_from(slug);
        }
        if let Some(description) = &self.description {
            blog.description.clone_from(description);
        }
        if let Some(blog_type) = self.blog_type {
            blog.blog_type = blog_type;
        }
        if let Some(layout_mode) = self.layout_mode {
            blog.layout_mode = layout_mode;
        }
        if let Some(main_image) = &self.main_image {
            blog.main_image.clone_from(main_image);
        }
        if let Some(external) = self.external {
            blog.external = external;
        }
        if let Some(published) = self.published {
            blog.published = published;
        }
        if let Some(date_available) = self.date_available {
            blog.date_available = date_available;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn blog_type_names() {
        assert_eq!(BlogType::parse("vlog"), Some(BlogType::Vlog));
        assert_eq!(BlogType::parse("podcast"), None);
        assert_eq!(BlogType::Blog.as_str(), "blog");
    }

    #[test]
    fn create_blog_defaults_from_json() {
        let input: CreateBlog =
            serde_json::from_str(r#"{"name": "Tech", "slug": "tech"}"#).unwrap();
        assert_eq!(input.blog_type, BlogType::Blog);
        assert_eq!(input.layout_mode, LayoutMode::Default);
        assert!(!input.published);
        assert!(input.users.is_empty());
        assert!(input.validate().is_ok());
    }

    #[test]
    fn create_blog_rejects_bad_slug() {
        let input: CreateBlog =
            serde_json::from_str(r#"{"name": "Tech", "slug": "te ch"}"#).unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn update_clears_main_image_with_null() {
        let update: UpdateBlog = serde_json::from_str(r#"{"main_image": null}"#).unwrap();
        assert_eq!(update.main_image, Some(None));

        let update: UpdateBlog = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(update.main_image, None);
    }
}
