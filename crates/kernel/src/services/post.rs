//! Post editing and post-level relations.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::access::{AccessScope, EntityKind};
use crate::error::{BlogError, BlogResult};
use crate::models::{
    Blog, BlogPost, CreatePost, MediaKind, PostMedia, PostRelated, UpdatePost,
};
use crate::store::{BlogStore, PostFilter};

/// Post operations. Saved posts are stamped with the configured channel.
pub struct PostService {
    store: Arc<dyn BlogStore>,
    channel: String,
}

impl PostService {
    pub fn new(store: Arc<dyn BlogStore>, channel: impl Into<String>) -> Self {
        Self {
            store,
            channel: channel.into(),
        }
    }

    async fn load_blog(&self, blog_id: Uuid) -> BlogResult<Blog> {
        self.store
            .get_blog(blog_id)
            .await?
            .ok_or_else(|| BlogError::Validation("blog does not exist".into()))
    }

    /// The category must exist and belong to the post's blog.
    async fn check_category(&self, blog_id: Uuid, category_id: Option<Uuid>) -> BlogResult<()> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        match self.store.get_category(category_id).await? {
            Some(c) if c.blog_id == blog_id => Ok(()),
            Some(_) => Err(BlogError::Validation(
                "category belongs to another blog".into(),
            )),
            None => Err(BlogError::Validation("category does not exist".into())),
        }
    }

    pub async fn create(&self, scope: &AccessScope, input: CreatePost) -> BlogResult<BlogPost> {
        scope.ensure_can_create(EntityKind::Post)?;
        scope.ensure_writable(input.blog_id)?;
        input.validate()?;

        let blog = self.load_blog(input.blog_id).await?;
        self.check_category(blog.id, input.category_id).await?;

        let now = Utc::now();
        let post = BlogPost {
            id: Uuid::now_v7(),
            site_domain: blog.site_domain.clone(),
            blog_id: blog.id,
            category_id: input.category_id,
            channel: self.channel.clone(),
            title: input.title,
            slug: input.slug,
            headline: input.headline,
            content: input.content,
            main_image: input.main_image,
            tags: input.tags,
            source: input.source,
            accept_comments: input.accept_comments,
            published: input.published,
            date_available: input.date_available.unwrap_or(now),
            created: now,
            changed: now,
        };
        let created = self.store.insert_post(&post).await?;

        tracing::info!(blog = %blog.slug, post = %created.slug, "post created");
        Ok(created)
    }

    pub async fn update(
        &self,
        scope: &AccessScope,
        id: Uuid,
        input: UpdatePost,
    ) -> BlogResult<BlogPost> {
        let mut post = self.store.get_post(id).await?.ok_or(BlogError::NotFound)?;
        scope.ensure_writable(post.blog_id)?;
        if let Some(blog_id) = input.blog_id {
            scope.ensure_writable(blog_id)?;
        }
        input.validate()?;

        input.apply(&mut post);
        if input.blog_id.is_some() {
            post.site_domain = self.load_blog(post.blog_id).await?.site_domain;
        }
        self.check_category(post.blog_id, post.category_id).await?;
        post.channel.clone_from(&self.channel);
        post.changed = Utc::now();

        let updated = self.store.update_post(&post).await?;
        tracing::info!(post = %updated.slug, "post updated");
        Ok(updated)
    }

    pub async fn delete(&self, scope: &AccessScope, id: Uuid) -> BlogResult<()> {
        let post = self.store.get_post(id).await?.ok_or(BlogError::NotFound)?;
        scope.ensure_writable(post.blog_id)?;
        self.store.delete_post(id).await?;
        tracing::info!(post = %post.slug, "post deleted");
        Ok(())
    }

    /// Scoped post listing.
    pub async fn list(&self, scope: &AccessScope, filter: PostFilter) -> BlogResult<Vec<BlogPost>> {
        self.store.list_posts(&scope.filter(filter)).await
    }

    /// Scoped single-post lookup. Out-of-scope posts read as missing.
    pub async fn get(&self, scope: &AccessScope, id: Uuid) -> BlogResult<BlogPost> {
        match self.store.get_post(id).await? {
            Some(p) if scope.permits(p.blog_id) => Ok(p),
            _ => Err(BlogError::NotFound),
        }
    }

    /// Append a related post. The target must be visible to the scope too.
    pub async fn relate(
        &self,
        scope: &AccessScope,
        post_id: Uuid,
        related_id: Uuid,
        order: i32,
    ) -> BlogResult<()> {
        let post = self.store.get_post(post_id).await?.ok_or(BlogError::NotFound)?;
        scope.ensure_writable(post.blog_id)?;
        if post_id == related_id {
            return Err(BlogError::Validation(
                "a post cannot be related to itself".into(),
            ));
        }
        self.get(scope, related_id).await?;
        self.store
            .insert_post_related(&PostRelated {
                id: Uuid::now_v7(),
                post_id: Some(post_id),
                related_id: Some(related_id),
                order,
            })
            .await
    }

    /// Attach an album, video, or audio from the media library.
    pub async fn attach_media(
        &self,
        scope: &AccessScope,
        post_id: Uuid,
        media_id: Uuid,
        kind: MediaKind,
    ) -> BlogResult<()> {
        let post = self.store.get_post(post_id).await?.ok_or(BlogError::NotFound)?;
        scope.ensure_writable(post.blog_id)?;
        self.store
            .insert_post_media(&PostMedia {
                id: Uuid::now_v7(),
                post_id: Some(post_id),
                media_id: Some(media_id),
                kind,
            })
            .await
    }

    /// Related posts in order, skipping rows whose target was deleted.
    pub async fn related_posts(&self, post: &BlogPost) -> BlogResult<Vec<BlogPost>> {
        let mut related = Vec::new();
        for row in self.store.post_related(post.id).await? {
            let Some(related_id) = row.related_id else {
                continue;
            };
            if let Some(p) = self.store.get_post(related_id).await? {
                related.push(p);
            }
        }
        Ok(related)
    }

    /// Media ids of `kind` attached to `post`, skipping nulled rows.
    pub async fn media(&self, post: &BlogPost, kind: MediaKind) -> BlogResult<Vec<Uuid>> {
        Ok(self
            .store
            .post_media(post.id, kind)
            .await?
            .into_iter()
            .filter_map(|m| m.media_id)
            .collect())
    }
}
