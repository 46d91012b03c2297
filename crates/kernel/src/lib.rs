//! Multi-blog kernel library.
//!
//! Blogs, a two-level category tree per blog, posts and links, scoped
//! editor access, and the public URL scheme under a configured channel.
//! The `multiblog` binary serves the HTTP API over PostgreSQL.

pub mod access;
pub mod addressing;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod profile;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod tree;

pub use error::{BlogError, BlogResult};
