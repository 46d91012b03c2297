//! Category tree: long slug computation, path uniqueness, and resolution.
//!
//! Categories form a two-level tree per blog. Every save recomputes the
//! category's `long_slug` from its parent, then checks it against the other
//! categories of the same site and blog. The storage layer's unique index on
//! `(site_domain, blog_id, long_slug)` backs the check up under concurrency.
//!
//! Renaming or moving a root category recomputes its children's paths in the
//! same transaction.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::access::{AccessScope, EntityKind};
use crate::addressing::NO_CATEGORY;
use crate::error::{BlogError, BlogResult};
use crate::models::{Blog, Category, CreateCategory, UpdateCategory};
use crate::store::{BlogStore, CategoryFilter};

/// `parent.slug/slug` when there is a parent, else `slug`.
pub fn compute_long_slug(parent: Option<&Category>, slug: &str) -> String {
    match parent {
        Some(parent) => format!("{}/{}", parent.slug, slug),
        None => slug.to_string(),
    }
}

/// Outcome of resolving a URL path inside a blog.
#[derive(Debug, Clone)]
pub enum ResolvedCategory {
    Category(Category),
    /// The reserved token: posts without a category.
    Uncategorized,
}

impl ResolvedCategory {
    pub fn category(&self) -> Option<&Category> {
        match self {
            Self::Category(c) => Some(c),
            Self::Uncategorized => None,
        }
    }
}

/// Category operations over a [`BlogStore`].
pub struct CategoryTree {
    store: Arc<dyn BlogStore>,
}

impl CategoryTree {
    pub fn new(store: Arc<dyn BlogStore>) -> Self {
        Self { store }
    }

    // ----- Validation -----

    /// Fail with `DuplicatePath` when another category in the same site and
    /// blog already uses `category.long_slug`.
    pub async fn validate_uniqueness(&self, category: &Category) -> BlogResult<()> {
        let filter = CategoryFilter::new()
            .site(category.site_domain.clone())
            .blog(category.blog_id)
            .long_slug(category.long_slug.clone())
            .excluding(category.id);
        let clashes = self.store.list_categories(&filter).await?;
        if clashes.is_empty() {
            Ok(())
        } else {
            tracing::info!(
                blog_id = %category.blog_id,
                long_slug = %category.long_slug,
                "duplicate category path rejected"
            );
            Err(BlogError::DuplicatePath {
                long_slug: category.long_slug.clone(),
            })
        }
    }

    /// Root categories may not take the reserved `no-category` path, which
    /// public URLs use for posts without a category.
    fn ensure_not_reserved(category: &Category) -> BlogResult<()> {
        if category.long_slug == NO_CATEGORY {
            return Err(BlogError::Validation(format!(
                "'{NO_CATEGORY}' is reserved and cannot be a top-level category slug"
            )));
        }
        Ok(())
    }

    /// Load and check a prospective parent: it must exist, belong to
    /// `blog_id`, be a root, and not be the category itself.
    async fn assign_parent(
        &self,
        parent_id: Option<Uuid>,
        blog_id: Uuid,
        own_id: Option<Uuid>,
    ) -> BlogResult<Option<Category>> {
        let Some(parent_id) = parent_id else {
            return Ok(None);
        };
        if own_id == Some(parent_id) {
            return Err(BlogError::InvalidParent(
                "a category cannot be its own parent".into(),
            ));
        }
        let parent = self
            .store
            .get_category(parent_id)
            .await?
            .ok_or_else(|| BlogError::InvalidParent("parent category does not exist".into()))?;
        if parent.blog_id != blog_id {
            return Err(BlogError::InvalidParent(
                "parent category belongs to another blog".into(),
            ));
        }
        if !parent.is_root() {
            return Err(BlogError::InvalidParent(format!(
                "'{}' is a sub-category and cannot have children",
                parent.long_slug
            )));
        }
        Ok(Some(parent))
    }

    async fn load_blog(&self, blog_id: Uuid) -> BlogResult<Blog> {
        self.store
            .get_blog(blog_id)
            .await?
            .ok_or_else(|| BlogError::Validation("blog does not exist".into()))
    }

    // ----- Mutations -----

    /// Create a category. Access is checked before anything else.
    pub async fn create(&self, scope: &AccessScope, input: CreateCategory) -> BlogResult<Category> {
        scope.ensure_can_create(EntityKind::Category)?;
        scope.ensure_writable(input.blog_id)?;
        input.validate()?;

        let blog = self.load_blog(input.blog_id).await?;
        let parent = self.assign_parent(input.parent_id, blog.id, None).await?;

        let now = Utc::now();
        let category = Category {
            id: Uuid::now_v7(),
            site_domain: blog.site_domain.clone(),
            blog_id: blog.id,
            parent_id: parent.as_ref().map(|p| p.id),
            long_slug: compute_long_slug(parent.as_ref(), &input.slug),
            name: input.name,
            slug: input.slug,
            show_in_menu: input.show_in_menu,
            group: input.group,
            order: input.order,
            published: input.published,
            date_available: input.date_available.unwrap_or(now),
            created: now,
            changed: now,
        };

        Self::ensure_not_reserved(&category)?;
        self.validate_uniqueness(&category).await?;
        let created = self.store.insert_category(&category).await?;

        tracing::info!(
            blog = %blog.slug,
            long_slug = %created.long_slug,
            "category created"
        );
        Ok(created)
    }

    /// Update a category, recomputing its path and its children's paths.
    pub async fn update(
        &self,
        scope: &AccessScope,
        id: Uuid,
        input: UpdateCategory,
    ) -> BlogResult<Category> {
        let existing = self
            .store
            .get_category(id)
            .await?
            .ok_or(BlogError::NotFound)?;
        scope.ensure_writable(existing.blog_id)?;
        if let Some(blog_id) = input.blog_id {
            scope.ensure_writable(blog_id)?;
        }
        input.validate()?;

        let mut category = existing.clone();
        input.apply(&mut category);

        let children = self
            .store
            .list_categories(&CategoryFilter::new().children_of(id))
            .await?;

        if category.blog_id != existing.blog_id {
            if !children.is_empty() {
                return Err(BlogError::Validation(
                    "move the sub-categories before moving this category to another blog".into(),
                ));
            }
            category.site_domain = self.load_blog(category.blog_id).await?.site_domain;
        }

        let parent = self
            .assign_parent(category.parent_id, category.blog_id, Some(id))
            .await?;
        if parent.is_some() && !children.is_empty() {
            return Err(BlogError::InvalidParent(
                "a category with sub-categories must stay at the top level".into(),
            ));
        }

        let now = Utc::now();
        category.long_slug = compute_long_slug(parent.as_ref(), &category.slug);
        category.changed = now;
        Self::ensure_not_reserved(&category)?;
        self.validate_uniqueness(&category).await?;

        let mut cascaded = Vec::new();
        for mut child in children {
            let long_slug = compute_long_slug(Some(&category), &child.slug);
            if long_slug != child.long_slug {
                child.long_slug = long_slug;
                child.changed = now;
                self.validate_uniqueness(&child).await?;
                cascaded.push(child);
            }
        }

        let updated = self
            .store
            .update_category_tree(&category, &cascaded)
            .await?;

        tracing::info!(
            category_id = %id,
            long_slug = %updated.long_slug,
            cascaded = cascaded.len(),
            "category updated"
        );
        Ok(updated)
    }

    /// Delete a category and its sub-categories. Their posts become uncategorized.
    pub async fn delete(&self, scope: &AccessScope, id: Uuid) -> BlogResult<()> {
        let existing = self
            .store
            .get_category(id)
            .await?
            .ok_or(BlogError::NotFound)?;
        scope.ensure_writable(existing.blog_id)?;

        if !self.store.delete_category(id).await? {
            return Err(BlogError::NotFound);
        }
        tracing::info!(long_slug = %existing.long_slug, "category deleted");
        Ok(())
    }

    // ----- Queries -----

    /// Scoped category listing.
    pub async fn list(
        &self,
        scope: &AccessScope,
        filter: CategoryFilter,
    ) -> BlogResult<Vec<Category>> {
        self.store.list_categories(&scope.filter(filter)).await
    }

    /// Scoped single-category lookup. Out-of-scope rows read as missing.
    pub async fn get(&self, scope: &AccessScope, id: Uuid) -> BlogResult<Category> {
        match self.store.get_category(id).await? {
            Some(c) if scope.permits(c.blog_id) => Ok(c),
            _ => Err(BlogError::NotFound),
        }
    }

    /// Categories that may be chosen as a parent: the roots of `blog_id`,
    /// within the scope.
    pub async fn parent_choices(
        &self,
        scope: &AccessScope,
        blog_id: Uuid,
    ) -> BlogResult<Vec<Category>> {
        self.list(scope, CategoryFilter::new().blog(blog_id).roots())
            .await
    }

    /// Top-most ancestor of `category`, itself when it is a root.
    pub async fn root(&self, category: &Category) -> BlogResult<Category> {
        match category.parent_id {
            None => Ok(category.clone()),
            Some(parent_id) => self
                .store
                .get_category(parent_id)
                .await?
                .ok_or(BlogError::NotFound),
        }
    }

    /// Resolve URL path segments inside `blog` to a category.
    ///
    /// The single segment `no-category` resolves to [`ResolvedCategory::Uncategorized`].
    /// Anything that is not a full long slug of the blog is `NotFound`.
    pub async fn resolve(
        &self,
        site: &str,
        blog: &Blog,
        segments: &[&str],
    ) -> BlogResult<ResolvedCategory> {
        if let [token] = segments
            && *token == NO_CATEGORY
        {
            return Ok(ResolvedCategory::Uncategorized);
        }
        if segments.is_empty() || segments.len() > 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(BlogError::NotFound);
        }

        let long_slug = segments.join("/");
        let filter = CategoryFilter::new()
            .site(site)
            .blog(blog.id)
            .long_slug(long_slug);
        self.store
            .list_categories(&filter)
            .await?
            .into_iter()
            .next()
            .map(ResolvedCategory::Category)
            .ok_or(BlogError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn category(slug: &str, parent_id: Option<Uuid>) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::now_v7(),
            site_domain: "example.com".into(),
            blog_id: Uuid::now_v7(),
            parent_id,
            name: slug.into(),
            slug: slug.into(),
            long_slug: slug.into(),
            show_in_menu: false,
            group: false,
            order: 0,
            published: true,
            date_available: now,
            created: now,
            changed: now,
        }
    }

    #[test]
    fn root_long_slug_is_slug() {
        assert_eq!(compute_long_slug(None, "news"), "news");
    }

    #[test]
    fn child_long_slug_prefixes_parent_slug() {
        let parent = category("news", None);
        assert_eq!(compute_long_slug(Some(&parent), "ai"), "news/ai");
    }

    #[test]
    fn resolved_category_accessor() {
        let c = category("news", None);
        assert_eq!(
            ResolvedCategory::Category(c.clone()).category().unwrap().id,
            c.id
        );
        assert!(ResolvedCategory::Uncategorized.category().is_none());
    }

    #[test]
    fn reserved_path_only_blocks_roots() {
        let root = category(NO_CATEGORY, None);
        assert!(matches!(
            CategoryTree::ensure_not_reserved(&root),
            Err(BlogError::Validation(_))
        ));

        let mut child = category(NO_CATEGORY, Some(Uuid::now_v7()));
        child.long_slug = format!("news/{NO_CATEGORY}");
        assert!(CategoryTree::ensure_not_reserved(&child).is_ok());
    }
}
