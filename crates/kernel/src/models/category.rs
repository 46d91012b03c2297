//! Category model: per-blog, two-level tree with a materialized path.
//!
//! A category's `long_slug` is derived from its own slug and its parent's
//! slug on every save (see [`crate::tree`]). Callers never supply it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Publishable, validate_name, validate_slug};
use crate::error::BlogResult;

/// A blog category.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    /// Unique identifier (UUIDv7).
    pub id: Uuid,

    pub site_domain: String,

    /// Owning blog.
    pub blog_id: Uuid,

    /// Parent category. Only root categories may be parents.
    pub parent_id: Option<Uuid>,

    pub name: String,

    /// Path segment for this category alone.
    pub slug: String,

    /// Full path: `parent.slug/slug`, or `slug` for root categories.
    /// Unique per (site, blog).
    pub long_slug: String,

    /// Listed in the blog's navigation menu.
    pub show_in_menu: bool,

    /// Acts as a grouping heading rather than a post container.
    #[sqlx(rename = "is_group")]
    pub group: bool,

    /// Sort position among siblings; ties broken by name.
    #[sqlx(rename = "sort_order")]
    pub order: i32,

    pub published: bool,
    pub date_available: DateTime<Utc>,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
}

impl Category {
    /// Whether this category sits at the top of its blog's tree.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Publishable for Category {
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

/// Input for creating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub blog_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub show_in_menu: bool,
    #[serde(default)]
    pub group: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub published: bool,
    pub date_available: Option<DateTime<Utc>>,
}

impl CreateCategory {
    pub fn validate(&self) -> BlogResult<()> {
        validate_name("name", &self.name)?;
        validate_slug(&self.slug)
    }
}

/// Input for updating a category.
///
/// `parent_id` distinguishes "leave unchanged" (absent) from "make root"
/// (explicit `null`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategory {
    pub blog_id: Option<Uuid>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub slug: Option<String>,
    pub show_in_menu: Option<bool>,
    pub group: Option<bool>,
    pub order: Option<i32>,
    pub published: Option<bool>,
    pub date_available: Option<DateTime<Utc>>,
}

impl UpdateCategory {
    pub fn validate(&self) -> BlogResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        if let Some(slug) = &self.slug {
            validate_slug(slug)?;
        }
        Ok(())
    }

    /// Apply the present fields onto `category`. `long_slug` is left for the
    /// tree to recompute.
    pub fn apply(&self, category: &mut Category) {
        if let Some(blog_id) = self.blog_id {
            category.blog_id = blog_id;
        }
        if let Some(parent_id) = self.parent_id {
            category.parent_id = parent_id;
        }
        if let Some(name) = &self.name {
            category.name.clone_from(name);
        }
        if let Some(slug) = &self.slug {
            category.slug.clone_from(slug);
        }
        if let Some(show_in_menu) = self.show_in_menu {
            category.show_in_menu = show_in_menu;
        }
        if let Some(group) = self.group {
            category.group = group;
        }
        if let Some(order) = self.order {
            category.order = order;
        }
        if let Some(published) = self.published {
            category.published = published;
        }
        if let Some(date_available) = self.date_available {
            category.date_available = date_available;
        }
    }
}
