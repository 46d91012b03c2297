//! Blog post model and its related-content join rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Publishable, validate_name, validate_slug};
use crate::error::BlogResult;

/// A blog post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogPost {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub site_domain: String,

    /// Owning blog.
    pub blog_id: Uuid,

    /// Optional category within the owning blog.
    pub category_id: Option<Uuid>,

    /// Channel the post is mounted under, stamped on save.
    pub channel: String,

    pub title: String,

    /// URL slug, unique per (site, blog).
    pub slug: String,

    pub headline: Option<String>,

    /// Rich-text body.
    pub content: String,

    pub main_image: Option<String>,

    /// Tag names attached to the post.
    pub tags: Vec<String>,

    pub source: Option<String>,

    pub accept_comments: bool,

    pub published: bool,
    pub date_available: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
}

impl Publishable for BlogPost {
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

/// Ordered, self-referential post relation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostRelated {
    pub id: Uuid,
    pub post_id: Option<Uuid>,
    pub related_id: Option<Uuid>,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
}

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Album,
    Video,
    Audio,
}

/// Album, video, or audio attached to a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostMedia {
    pub id: Uuid,
    pub post_id: Option<Uuid>,
    pub media_id: Option<Uuid>,
    pub kind: MediaKind,
}

/// Input for creating a post.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePost {
    pub blog_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub slug: String,
    pub headline: Option<String>,
    #[serde(default)]
    pub content: String,
    pub main_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source: Option<String>,
    #[serde(default = "default_accept_comments")]
    pub accept_comments: bool,
    #[serde(default)]
    pub published: bool,
    pub date_available: Option<DateTime<Utc>>,
}

fn default_accept_comments() -> bool {
    true
}

impl CreatePost {
    pub fn validate(&self) -> BlogResult<()> {
        validate_name("title", &self.title)?;
        validate_slug(&self.slug)
    }
}

/// Input for updating a post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePost {
    pub blog_id: Option<Uuid>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub category_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub headline: Option<Option<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub main_image: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub source: Option<Option<String>>,
    pub accept_comments: Option<bool>,
    pub published: Option<bool>,
    pub date_available: Option<DateTime<Utc>>,
}

impl UpdatePost {
    pub fn validate(&self) -> BlogResult<()> {
        if let Some(title) = &self.title {
            validate_name("title", title)?;
        }
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        Ok(())
    }

    pub fn apply(&self, post: &mut BlogPost) {
        if let Some(blog_id) = self.blog_id {
            post.blog_id = blog_id;
        }
        if let Some(category_id) = self.category_id {
            post.category_id = category_id;
        }
        if let Some(title) = &self.title {
            post.title.clone_from(title);
        }
        if let Some(slug) = &self.slug {
            post.slug.clone_from(slug);
        }
        if let Some(headline) = &self.headline {
            post.headline.clone_from(headline);
        }
        if let Some(content) = &self.content {
            post.content.clone_from(content);
        }
        if let Some(main_image) = &self.main_image {
            post.main_image.clone_from(main_image);
        }
        if let Some(tags) = &self.tags {
            post.tags.clone_from(tags);
        }
        if let Some(source) = &self.source {
            post.source.clone_from(source);
        }
        if let Some(accept_comments) = self.accept_comments {
            post.accept_comments = accept_comments;
        }
        if let Some(published) = self.published {
            post.published = published;
        }
        if let Some(date_available) = self.date_available {
            post.date_available = date_available;
        }
    }
}
