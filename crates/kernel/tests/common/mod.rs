#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every [`TestApp`] runs the real services and routes over a fresh
//! [`MemoryBlogStore`], so tests are isolated and need no database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, header};
use axum::response::Response;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use multiblog_kernel::access::AccessScope;
use multiblog_kernel::config::Config;
use multiblog_kernel::models::{
    ApiToken, Blog, BlogPost, Category, CreateBlog, CreateCategory, CreatePost, Principal,
    generate_token, hash_token,
};
use multiblog_kernel::profile::ProfileRegistry;
use multiblog_kernel::routes;
use multiblog_kernel::state::{AppState, default_profiles};
use multiblog_kernel::store::{BlogStore, MemoryBlogStore};

/// Site every fixture is created on.
pub const SITE: &str = "example.com";

/// A user with an API token.
pub struct TestUser {
    pub principal: Principal,
    pub token: String,
}

/// Test application wrapper using the real kernel routes and state.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryBlogStore>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryBlogStore::new());
        let profiles = default_profiles(&config, store.clone());
        Self::assemble(config, store, profiles)
    }

    pub fn with_profiles(config: Config, profiles: ProfileRegistry) -> Self {
        Self::assemble(config, Arc::new(MemoryBlogStore::new()), profiles)
    }

    fn assemble(config: Config, store: Arc<MemoryBlogStore>, profiles: ProfileRegistry) -> Self {
        let state = AppState::with_store(config, store.clone(), profiles);
        let router = routes::app(state.clone());
        Self {
            router,
            store,
            state,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// GET `path` on [`SITE`], with a bearer token if given.
    pub async fn get(&self, path: &str, token: Option<&str>) -> Response {
        self.request(build_request(Method::GET, path, token, None))
            .await
    }

    /// Send a JSON body to `path` on [`SITE`].
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Response {
        self.request(build_request(method, path, Some(token), Some(body)))
            .await
    }

    /// Create a user with a fresh, non-expiring API token.
    pub async fn create_user(&self, name: &str, superuser: bool) -> TestUser {
        let principal = Principal {
            user_id: Uuid::now_v7(),
            name: name.to_string(),
            is_superuser: superuser,
        };
        self.store.insert_principal(&principal).await.unwrap();

        let token = generate_token();
        self.store
            .insert_api_token(&ApiToken {
                id: Uuid::now_v7(),
                user_id: principal.user_id,
                name: "test".to_string(),
                token_hash: hash_token(&token),
                created: Utc::now(),
                expires_at: None,
            })
            .await
            .unwrap();

        TestUser { principal, token }
    }

    /// Create a published blog on [`SITE`] assigned to `users`.
    pub async fn create_blog(&self, slug: &str, users: &[&TestUser]) -> Blog {
        self.create_blog_on(SITE, slug, users).await
    }

    pub async fn create_blog_on(&self, site: &str, slug: &str, users: &[&TestUser]) -> Blog {
        self.state
            .blogs()
            .create(
                &AccessScope::Unrestricted,
                site,
                CreateBlog {
                    name: slug.to_uppercase(),
                    slug: slug.to_string(),
                    description: format!("{slug} blog"),
                    blog_type: Default::default(),
                    layout_mode: Default::default(),
                    main_image: None,
                    external: false,
                    published: true,
                    date_available: Some(past()),
                    users: users.iter().map(|u| u.principal.user_id).collect(),
                },
            )
            .await
            .unwrap()
    }

    /// Create a published category.
    pub async fn create_category(
        &self,
        blog: &Blog,
        slug: &str,
        parent: Option<&Category>,
    ) -> Category {
        self.state
            .tree()
            .create(&AccessScope::Unrestricted, category_input(blog, slug, parent))
            .await
            .unwrap()
    }

    /// Create a published post available since yesterday.
    pub async fn create_post(
        &self,
        blog: &Blog,
        category: Option<&Category>,
        slug: &str,
    ) -> BlogPost {
        self.state
            .posts()
            .create(&AccessScope::Unrestricted, post_input(blog, category, slug))
            .await
            .unwrap()
    }
}

/// Config with small pages so pagination is easy to exercise.
pub fn test_config() -> Config {
    Config {
        posts_per_page: 2,
        feed_limit: 3,
        ..Config::default()
    }
}

pub fn past() -> chrono::DateTime<Utc> {
    Utc::now() - Duration::days(1)
}

pub fn future() -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(1)
}

pub fn category_input(blog: &Blog, slug: &str, parent: Option<&Category>) -> CreateCategory {
    CreateCategory {
        blog_id: blog.id,
        parent_id: parent.map(|p| p.id),
        name: slug.to_uppercase(),
        slug: slug.to_string(),
        show_in_menu: false,
        group: false,
        order: 0,
        published: true,
        date_available: Some(past()),
    }
}

pub fn post_input(blog: &Blog, category: Option<&Category>, slug: &str) -> CreatePost {
    CreatePost {
        blog_id: blog.id,
        category_id: category.map(|c| c.id),
        title: slug.replace('-', " "),
        slug: slug.to_string(),
        headline: Some(format!("About {slug}")),
        content: String::new(),
        main_image: None,
        tags: Vec::new(),
        source: None,
        accept_comments: true,
        published: true,
        date_available: Some(past()),
    }
}

fn build_request(
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, format!("{SITE}:3000"));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}
