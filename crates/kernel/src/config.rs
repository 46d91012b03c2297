//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Channel slug the blogs are mounted under (default: "blog").
    pub channel: String,

    /// Posts per page on blog listings (default: 15).
    pub posts_per_page: u32,

    /// Number of posts in a blog feed (default: 40).
    pub feed_limit: u32,

    /// Profile extension kind to create for each new blog, if any.
    pub profile: Option<String>,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Public site URL.
    pub site_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: String::new(),
            database_max_connections: 10,
            channel: "blog".to_string(),
            posts_per_page: 15,
            feed_limit: 40,
            profile: None,
            cors_allowed_origins: vec!["*".to_string()],
            site_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let channel = env::var("BLOGS_CHANNEL")
            .map(|c| c.trim_matches('/').to_string())
            .unwrap_or_else(|_| "blog".to_string());
        if channel.is_empty() || channel.contains('/') {
            anyhow::bail!("BLOGS_CHANNEL must be a single path segment, got '{channel}'");
        }

        let posts_per_page = env::var("BLOGS_POST_PAGINATE_BY")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .context("BLOGS_POST_PAGINATE_BY must be a valid u32")?;

        let feed_limit = env::var("BLOGS_FEED_LIMIT")
            .unwrap_or_else(|_| "40".to_string())
            .parse()
            .context("BLOGS_FEED_LIMIT must be a valid u32")?;

        let profile = env::var("BLOGS_PROFILE")
            .ok()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let site_url = env::var("SITE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            channel,
            posts_per_page,
            feed_limit,
            profile,
            cors_allowed_origins,
            site_url,
        })
    }
}
