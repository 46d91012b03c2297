//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::access::AccessController;
use crate::addressing::UrlBuilder;
use crate::config::Config;
use crate::db;
use crate::profile::{BASIC_PROFILE, BasicProfileFactory, ProfileRegistry};
use crate::services::{BlogService, ListingService, PostService};
use crate::store::{BlogStore, PgBlogStore};
use crate::tree::CategoryTree;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// PostgreSQL pool, absent when running on the in-memory store.
    db: Option<PgPool>,

    store: Arc<dyn BlogStore>,
    access: AccessController,
    tree: Arc<CategoryTree>,
    blogs: Arc<BlogService>,
    posts: Arc<PostService>,
    listings: ListingService,
    profiles: Arc<ProfileRegistry>,
}

impl AppState {
    /// Connect to PostgreSQL, apply migrations, and wire the services.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        let store: Arc<dyn BlogStore> = Arc::new(PgBlogStore::new(db.clone()));
        let profiles = default_profiles(config, store.clone());

        info!(channel = %config.channel, "blog state initialized");
        Ok(Self::build(config.clone(), Some(db), store, profiles))
    }

    /// Wire the services over an existing store, without a database pool.
    pub fn with_store(config: Config, store: Arc<dyn BlogStore>, profiles: ProfileRegistry) -> Self {
        Self::build(config, None, store, profiles)
    }

    fn build(
        config: Config,
        db: Option<PgPool>,
        store: Arc<dyn BlogStore>,
        profiles: ProfileRegistry,
    ) -> Self {
        let profiles = Arc::new(profiles);
        let urls = UrlBuilder::new(&config.channel);
        let tree = Arc::new(CategoryTree::new(store.clone()));
        let blogs = Arc::new(BlogService::new(store.clone(), profiles.clone()));
        let posts = Arc::new(PostService::new(store.clone(), config.channel.clone()));
        let listings = ListingService::new(
            store.clone(),
            tree.clone(),
            blogs.clone(),
            posts.clone(),
            urls,
            config.posts_per_page,
            config.feed_limit,
        );

        Self {
            inner: Arc::new(AppStateInner {
                access: AccessController::new(store.clone()),
                config,
                db,
                store,
                tree,
                blogs,
                posts,
                listings,
                profiles,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn BlogStore> {
        &self.inner.store
    }

    pub fn access(&self) -> &AccessController {
        &self.inner.access
    }

    pub fn tree(&self) -> &Arc<CategoryTree> {
        &self.inner.tree
    }

    pub fn blogs(&self) -> &Arc<BlogService> {
        &self.inner.blogs
    }

    pub fn posts(&self) -> &Arc<PostService> {
        &self.inner.posts
    }

    pub fn listings(&self) -> &ListingService {
        &self.inner.listings
    }

    pub fn profiles(&self) -> &Arc<ProfileRegistry> {
        &self.inner.profiles
    }

    pub fn store_kind(&self) -> &'static str {
        if self.inner.db.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }

    /// Check if the backing store is reachable.
    pub async fn store_healthy(&self) -> bool {
        match &self.inner.db {
            Some(pool) => db::check_health(pool).await,
            None => true,
        }
    }
}

/// Profile registry with the bundled factories registered over `store`.
pub fn default_profiles(config: &Config, store: Arc<dyn BlogStore>) -> ProfileRegistry {
    let mut profiles = ProfileRegistry::new(config.profile.clone());
    profiles.register(BASIC_PROFILE, Arc::new(BasicProfileFactory::new(store)));
    profiles
}
