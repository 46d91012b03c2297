//! Blog service: blog and link editing plus the blog-level read helpers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::access::{AccessScope, EntityKind};
use crate::error::{BlogError, BlogResult};
use crate::models::{
    Blog, BlogChannelRelated, BlogLink, BlogPost, BlogRelated, BlogType, Category, CreateBlog,
    CreateLink, Principal, UpdateBlog, UpdateLink,
};
use crate::profile::ProfileRegistry;
use crate::store::{BlogFilter, BlogStore, CategoryFilter, LinkFilter, PostFilter};

/// An option in a blog-selection field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogChoice {
    pub id: Uuid,
    pub name: String,
}

/// Blog operations.
pub struct BlogService {
    store: Arc<dyn BlogStore>,
    profiles: Arc<ProfileRegistry>,
}

impl BlogService {
    pub fn new(store: Arc<dyn BlogStore>, profiles: Arc<ProfileRegistry>) -> Self {
        Self { store, profiles }
    }

    // ----- Blog editing -----

    /// Create a blog on `site`. Superusers only.
    pub async fn create(
        &self,
        scope: &AccessScope,
        site: &str,
        input: CreateBlog,
    ) -> BlogResult<Blog> {
        scope.ensure_can_create(EntityKind::Blog)?;
        input.validate()?;

        let now = Utc::now();
        let blog = Blog {
            id: Uuid::now_v7(),
            site_domain: site.to_string(),
            name: input.name,
            slug: input.slug,
            description: input.description,
            blog_type: input.blog_type,
            layout_mode: input.layout_mode,
            main_image: input.main_image,
            external: input.external,
            published: input.published,
            date_available: input.date_available.unwrap_or(now),
            created: now,
            changed: now,
        };

        self.ensure_slug_free(&blog).await?;
        let created = self.store.insert_blog(&blog, &input.users).await?;
        // The blog is already stored; a failed profile leaves it without one.
        if let Err(err) = self.profiles.on_blog_created(&created).await {
            tracing::error!(blog = %created.slug, error = %err, "failed to create blog profile");
        }

        tracing::info!(site = %site, blog = %created.slug, "blog created");
        Ok(created)
    }

    /// Update a blog. Assigned editors may edit it; only superusers may
    /// change who is assigned.
    pub async fn update(&self, scope: &AccessScope, id: Uuid, input: UpdateBlog) -> BlogResult<Blog> {
        scope.ensure_writable(id)?;
        if input.users.is_some() && !scope.is_unrestricted() {
            tracing::warn!(blog_id = %id, "editor attempted to change blog assignment");
            return Err(BlogError::AccessDenied);
        }
        input.validate()?;

        let mut blog = self.store.get_blog(id).await?.ok_or(BlogError::NotFound)?;
        input.apply(&mut blog);
        blog.changed = Utc::now();

        self.ensure_slug_free(&blog).await?;
        let updated = self
            .store
            .update_blog(&blog, input.users.as_deref())
            .await?;

        tracing::info!(blog = %updated.slug, "blog updated");
        Ok(updated)
    }

    async fn ensure_slug_free(&self, blog: &Blog) -> BlogResult<()> {
        let filter = BlogFilter::new()
            .site(blog.site_domain.clone())
            .slug(blog.slug.clone());
        let taken = self
            .store
            .list_blogs(&filter)
            .await?
            .iter()
            .any(|b| b.id != blog.id);
        if taken {
            return Err(BlogError::Validation(format!(
                "a blog with slug '{}' already exists on this site",
                blog.slug
            )));
        }
        Ok(())
    }

    /// Scoped blog listing.
    pub async fn list(&self, scope: &AccessScope, filter: BlogFilter) -> BlogResult<Vec<Blog>> {
        self.store.list_blogs(&scope.filter(filter)).await
    }

    /// Scoped single-blog lookup. Out-of-scope blogs read as missing.
    pub async fn get(&self, scope: &AccessScope, id: Uuid) -> BlogResult<Blog> {
        if !scope.permits(id) {
            return Err(BlogError::NotFound);
        }
        self.store.get_blog(id).await?.ok_or(BlogError::NotFound)
    }

    /// Blog-selection options for an editing form, narrowed to the scope.
    pub async fn choices(&self, scope: &AccessScope, site: &str) -> BlogResult<Vec<BlogChoice>> {
        let blogs = self.store.list_blogs(&BlogFilter::new().site(site)).await?;
        let options = blogs
            .into_iter()
            .map(|b| BlogChoice {
                id: b.id,
                name: b.name,
            })
            .collect();
        Ok(scope.restrict_choices(options, |c| c.id))
    }

    /// Users assigned to a blog the scope can see.
    pub async fn assigned_users(&self, scope: &AccessScope, id: Uuid) -> BlogResult<Vec<Principal>> {
        let blog = self.get(scope, id).await?;
        self.store.blog_users(blog.id).await
    }

    /// Profile of a blog through the configured extension.
    pub async fn profile(&self, scope: &AccessScope, id: Uuid) -> BlogResult<Option<serde_json::Value>> {
        let blog = self.get(scope, id).await?;
        self.profiles.profile_for(&blog).await
    }

    /// Append a related blog. Both blogs must be in scope.
    pub async fn relate_blog(
        &self,
        scope: &AccessScope,
        blog_id: Uuid,
        related_id: Uuid,
        order: i32,
    ) -> BlogResult<()> {
        scope.ensure_writable(blog_id)?;
        self.get(scope, related_id).await?;
        self.store
            .insert_blog_related(&BlogRelated {
                id: Uuid::now_v7(),
                blog_id: Some(blog_id),
                related_id: Some(related_id),
                order,
            })
            .await
    }

    /// Append a related channel of the host site.
    pub async fn relate_channel(
        &self,
        scope: &AccessScope,
        blog_id: Uuid,
        channel_id: Uuid,
        order: i32,
    ) -> BlogResult<()> {
        scope.ensure_writable(blog_id)?;
        self.store
            .insert_channel_related(&BlogChannelRelated {
                id: Uuid::now_v7(),
                blog_id: Some(blog_id),
                channel_id: Some(channel_id),
                order,
            })
            .await
    }

    // ----- Link editing -----

    pub async fn create_link(&self, scope: &AccessScope, input: CreateLink) -> BlogResult<BlogLink> {
        scope.ensure_can_create(EntityKind::Link)?;
        scope.ensure_writable(input.blog_id)?;
        input.validate()?;

        let blog = self
            .store
            .get_blog(input.blog_id)
            .await?
            .ok_or_else(|| BlogError::Validation("blog does not exist".into()))?;

        let now = Utc::now();
        let link = BlogLink {
            id: Uuid::now_v7(),
            site_domain: blog.site_domain,
            blog_id: blog.id,
            name: input.name,
            link: input.link,
            published: input.published,
            date_available: input.date_available.unwrap_or(now),
            created: now,
            changed: now,
        };
        let created = self.store.insert_link(&link).await?;
        tracing::info!(blog = %blog.slug, link = %created.link, "link created");
        Ok(created)
    }

    pub async fn update_link(
        &self,
        scope: &AccessScope,
        id: Uuid,
        input: UpdateLink,
    ) -> BlogResult<BlogLink> {
        let mut link = self.store.get_link(id).await?.ok_or(BlogError::NotFound)?;
        scope.ensure_writable(link.blog_id)?;
        if let Some(blog_id) = input.blog_id {
            scope.ensure_writable(blog_id)?;
        }
        input.validate()?;

        input.apply(&mut link);
        if input.blog_id.is_some() {
            link.site_domain = self
                .store
                .get_blog(link.blog_id)
                .await?
                .ok_or_else(|| BlogError::Validation("blog does not exist".into()))?
                .site_domain;
        }
        link.changed = Utc::now();
        self.store.update_link(&link).await
    }

    pub async fn delete_link(&self, scope: &AccessScope, id: Uuid) -> BlogResult<()> {
        let link = self.store.get_link(id).await?.ok_or(BlogError::NotFound)?;
        scope.ensure_writable(link.blog_id)?;
        self.store.delete_link(id).await?;
        Ok(())
    }

    pub async fn list_links(&self, scope: &AccessScope, filter: LinkFilter) -> BlogResult<Vec<BlogLink>> {
        self.store.list_links(&scope.filter(filter)).await
    }

    // ----- Public helpers -----

    /// Published, available blogs of `site` with the given type.
    pub async fn blogs_of_type(
        &self,
        site: &str,
        blog_type: BlogType,
        now: DateTime<Utc>,
    ) -> BlogResult<Vec<Blog>> {
        let filter = BlogFilter::new().site(site).of_type(blog_type).visible_at(now);
        self.store.list_blogs(&filter).await
    }

    /// Most recently available published post of `blog`.
    pub async fn latest(&self, blog: &Blog, now: DateTime<Utc>) -> BlogResult<Option<BlogPost>> {
        let filter = PostFilter::new()
            .site(blog.site_domain.clone())
            .blog(blog.id)
            .visible_at(now)
            .paginate(1, 0);
        Ok(self.store.list_posts(&filter).await?.into_iter().next())
    }

    /// Published links of `blog`, whatever their availability date.
    pub async fn links(&self, blog: &Blog) -> BlogResult<Vec<BlogLink>> {
        self.store
            .list_links(&LinkFilter::new().blog(blog.id).published())
            .await
    }

    /// Published categories of `blog`, by (order, name).
    pub async fn categories(&self, blog: &Blog) -> BlogResult<Vec<Category>> {
        self.store
            .list_categories(&CategoryFilter::new().blog(blog.id).published())
            .await
    }

    /// Published categories of `blog` flagged for the menu.
    pub async fn menu_categories(&self, blog: &Blog) -> BlogResult<Vec<Category>> {
        self.store
            .list_categories(&CategoryFilter::new().blog(blog.id).in_menu().published())
            .await
    }

    /// Related blogs in order, skipping rows whose target is gone.
    pub async fn related_blogs(&self, blog: &Blog) -> BlogResult<Vec<Blog>> {
        let mut related = Vec::new();
        for row in self.store.blog_related(blog.id).await? {
            let Some(related_id) = row.related_id else {
                continue;
            };
            if let Some(b) = self.store.get_blog(related_id).await? {
                related.push(b);
            }
        }
        Ok(related)
    }

    /// Related channel ids in order, skipping nulled rows.
    pub async fn related_channels(&self, blog: &Blog) -> BlogResult<Vec<Uuid>> {
        Ok(self
            .store
            .channel_related(blog.id)
            .await?
            .into_iter()
            .filter_map(|row| row.channel_id)
            .collect())
    }

    /// Users assigned to `blog`, by name.
    pub async fn authors(&self, blog: &Blog) -> BlogResult<Vec<Principal>> {
        self.store.blog_users(blog.id).await
    }
}
