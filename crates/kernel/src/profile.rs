//! Optional per-blog profile extension.
//!
//! The host registers profile factories by kind at startup, and
//! `BLOGS_PROFILE` selects which kind is active. When a blog is created the
//! active factory (if any) creates its profile. Reading a profile without a
//! usable configuration is a [`BlogError::MisconfiguredProfile`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{BlogError, BlogResult};
use crate::models::{Blog, BlogProfile};
use crate::store::BlogStore;

/// Creates and loads the profile attached to a blog.
#[async_trait]
pub trait ProfileFactory: Send + Sync {
    /// Called once when `blog` is created.
    async fn create_profile(&self, blog: &Blog) -> anyhow::Result<()>;

    /// The profile of `blog`, if one was created.
    async fn load_profile(&self, blog: &Blog) -> anyhow::Result<Option<serde_json::Value>>;
}

/// Registered profile factories plus the configured kind.
pub struct ProfileRegistry {
    configured: Option<String>,
    factories: HashMap<String, Arc<dyn ProfileFactory>>,
}

impl ProfileRegistry {
    pub fn new(configured: Option<String>) -> Self {
        Self {
            configured,
            factories: HashMap::new(),
        }
    }

    /// Register `factory` under `kind`. Later registrations replace earlier ones.
    pub fn register(&mut self, kind: impl Into<String>, factory: Arc<dyn ProfileFactory>) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn configured_kind(&self) -> Option<&str> {
        self.configured.as_deref()
    }

    fn active(&self) -> Option<&Arc<dyn ProfileFactory>> {
        self.configured
            .as_deref()
            .and_then(|kind| self.factories.get(kind))
    }

    /// Blog-created hook: run the active factory, or do nothing.
    pub async fn on_blog_created(&self, blog: &Blog) -> BlogResult<()> {
        let Some(factory) = self.active() else {
            tracing::debug!(blog = %blog.slug, "no blog profile factory active");
            return Ok(());
        };
        factory
            .create_profile(blog)
            .await
            .map_err(BlogError::Storage)?;
        tracing::info!(
            blog = %blog.slug,
            kind = self.configured.as_deref().unwrap_or_default(),
            "blog profile created"
        );
        Ok(())
    }

    /// Profile of `blog` through the configured factory.
    pub async fn profile_for(&self, blog: &Blog) -> BlogResult<Option<serde_json::Value>> {
        let kind = self.configured.as_deref().ok_or_else(|| {
            BlogError::MisconfiguredProfile("BLOGS_PROFILE is not set".to_string())
        })?;
        let factory = self.factories.get(kind).ok_or_else(|| {
            BlogError::MisconfiguredProfile(format!("no profile factory registered for '{kind}'"))
        })?;
        factory.load_profile(blog).await.map_err(BlogError::Storage)
    }
}

/// Profile kind shipped with the module.
pub const BASIC_PROFILE: &str = "basic";

/// Keeps a title-only profile per blog in the blog store.
pub struct BasicProfileFactory {
    store: Arc<dyn BlogStore>,
}

impl BasicProfileFactory {
    pub fn new(store: Arc<dyn BlogStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProfileFactory for BasicProfileFactory {
    async fn create_profile(&self, blog: &Blog) -> anyhow::Result<()> {
        self.store
            .insert_blog_profile(&BlogProfile {
                blog_id: blog.id,
                title: blog.name.clone(),
                created: Utc::now(),
            })
            .await?;
        Ok(())
    }

    async fn load_profile(&self, blog: &Blog) -> anyhow::Result<Option<serde_json::Value>> {
        let profile = self.store.get_blog_profile(blog.id).await?;
        profile
            .map(serde_json::to_value)
            .transpose()
            .map_err(Into::into)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::{BlogType, LayoutMode};
    use crate::store::MemoryBlogStore;

    fn blog() -> Blog {
        let now = Utc::now();
        Blog {
            id: Uuid::now_v7(),
            site_domain: "example.com".into(),
            name: "Tech".into(),
            slug: "tech".into(),
            description: String::new(),
            blog_type: BlogType::Blog,
            layout_mode: LayoutMode::Default,
            main_image: None,
            external: false,
            published: true,
            date_available: now,
            created: now,
            changed: now,
        }
    }

    #[tokio::test]
    async fn unconfigured_creation_is_noop() {
        let registry = ProfileRegistry::new(None);
        registry.on_blog_created(&blog()).await.unwrap();
    }

    #[tokio::test]
    async fn unconfigured_lookup_is_misconfigured() {
        let registry = ProfileRegistry::new(None);
        let err = registry.profile_for(&blog()).await.unwrap_err();
        assert!(matches!(err, BlogError::MisconfiguredProfile(_)));
    }

    #[tokio::test]
    async fn unknown_kind_is_misconfigured() {
        let registry = ProfileRegistry::new(Some("gallery".into()));
        // Creation stays a no-op.
        registry.on_blog_created(&blog()).await.unwrap();
        let err = registry.profile_for(&blog()).await.unwrap_err();
        assert!(
            matches!(err, BlogError::MisconfiguredProfile(ref m) if m.contains("gallery")),
            "{err}"
        );
    }

    #[tokio::test]
    async fn registered_factory_runs_on_creation() {
        let store = Arc::new(MemoryBlogStore::new());
        let mut registry = ProfileRegistry::new(Some(BASIC_PROFILE.into()));
        registry.register(BASIC_PROFILE, Arc::new(BasicProfileFactory::new(store)));

        let blog = blog();
        assert_eq!(registry.profile_for(&blog).await.unwrap(), None);

        registry.on_blog_created(&blog).await.unwrap();
        let profile = registry.profile_for(&blog).await.unwrap().unwrap();
        assert_eq!(profile["title"], "Tech");
    }

    #[tokio::test]
    async fn basic_profiles_outlive_the_registry() {
        let store: Arc<dyn BlogStore> = Arc::new(MemoryBlogStore::new());
        let blog = blog();

        let mut first = ProfileRegistry::new(Some(BASIC_PROFILE.into()));
        first.register(BASIC_PROFILE, Arc::new(BasicProfileFactory::new(store.clone())));
        first.on_blog_created(&blog).await.unwrap();
        drop(first);

        let mut second = ProfileRegistry::new(Some(BASIC_PROFILE.into()));
        second.register(BASIC_PROFILE, Arc::new(BasicProfileFactory::new(store.clone())));
        let profile = second.profile_for(&blog).await.unwrap().unwrap();
        assert_eq!(profile["blog_id"], blog.id.to_string());
        assert_eq!(profile["title"], "Tech");

        let stored = store.get_blog_profile(blog.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Tech");
    }
}
