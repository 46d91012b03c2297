//! Public blog routes under the configured channel.
//!
//! - `/{channel}/` lists the site's blogs
//! - `/{channel}/{blog}/` lists a blog's posts
//! - `/{channel}/{blog}/authors/`, `/rss/`, `/tag/{tag}`, `/{yyyy}/{mm}/`
//! - `/{channel}/{blog}/{category path}/` lists a category
//! - `/{channel}/{blog}/{category path | no-category}/{post}.html` shows a post

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::error::{BlogError, BlogResult};
use crate::models::BlogType;
use crate::routes::helpers::{PageQuery, SiteDomain};
use crate::services::{Author, BlogEntry, BlogFront, Feed, PostDetail, PostListing};
use crate::state::AppState;

/// What the part of a public URL after the blog slug addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlogRoute {
    Authors,
    Feed,
    Tag(String),
    Month { year: i32, month: u32 },
    Category(Vec<String>),
    Post { segments: Vec<String>, slug: String },
}

impl BlogRoute {
    /// Parse the remainder of a path after `/{channel}/{blog}/`.
    pub fn parse(rest: &str) -> Option<Self> {
        let trimmed = rest.trim_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        match segments.as_slice() {
            ["authors"] => return Some(Self::Authors),
            ["rss"] => return Some(Self::Feed),
            ["tag", tag] => return Some(Self::Tag((*tag).to_string())),
            [year, month] if is_year(year) && is_number(month) => {
                return Some(Self::Month {
                    year: year.parse().ok()?,
                    month: month.parse().ok()?,
                });
            }
            _ => {}
        }

        if let Some((last, path)) = segments.split_last()
            && let Some(slug) = last.strip_suffix(".html")
        {
            if path.is_empty() || slug.is_empty() || rest.ends_with('/') {
                return None;
            }
            return Some(Self::Post {
                segments: path.iter().map(|s| (*s).to_string()).collect(),
                slug: slug.to_string(),
            });
        }

        Some(Self::Category(
            segments.iter().map(|s| (*s).to_string()).collect(),
        ))
    }
}

fn is_year(s: &str) -> bool {
    s.len() == 4 && is_number(s)
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Default, Deserialize)]
struct BlogListQuery {
    #[serde(rename = "type")]
    blog_type: Option<String>,
}

/// GET /{channel}/
async fn list_blogs(
    State(state): State<AppState>,
    site: SiteDomain,
    Query(query): Query<BlogListQuery>,
) -> BlogResult<Json<Vec<BlogEntry>>> {
    let blog_type = match query.blog_type.as_deref() {
        None | Some("") => None,
        Some(t) => Some(
            BlogType::parse(t)
                .ok_or_else(|| BlogError::Validation(format!("unknown blog type '{t}'")))?,
        ),
    };
    let blogs = state
        .listings()
        .blogs(site.as_str(), blog_type, Utc::now())
        .await?;
    Ok(Json(blogs))
}

/// GET /{channel}/{blog}/
async fn blog_posts(
    State(state): State<AppState>,
    site: SiteDomain,
    Path(blog): Path<String>,
    Query(page): Query<PageQuery>,
) -> BlogResult<Json<BlogFront>> {
    let front = state
        .listings()
        .blog_front(site.as_str(), &blog, page.page(), Utc::now())
        .await?;
    Ok(Json(front))
}

/// Everything below a blog, dispatched on [`BlogRoute`].
async fn blog_subpath(
    State(state): State<AppState>,
    site: SiteDomain,
    Path((blog, rest)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> BlogResult<axum::response::Response> {
    use axum::response::IntoResponse;

    let route = BlogRoute::parse(&rest).ok_or(BlogError::NotFound)?;
    let listings = state.listings();
    let site = site.as_str();
    let now = Utc::now();

    tracing::debug!(blog = %blog, route = ?route, "public blog request");

    let response = match route {
        BlogRoute::Authors => {
            let authors: Vec<Author> = listings.authors(site, &blog, now).await?;
            Json(authors).into_response()
        }
        BlogRoute::Feed => {
            let feed: Feed = listings.feed(site, &blog, now).await?;
            Json(feed).into_response()
        }
        BlogRoute::Tag(tag) => {
            let listing = listings
                .tag_posts(site, &blog, &tag, page.page(), now)
                .await?;
            Json(listing).into_response()
        }
        BlogRoute::Month { year, month } => {
            let listing = listings
                .month_posts(site, &blog, year, month, page.page(), now)
                .await?;
            Json(listing).into_response()
        }
        BlogRoute::Category(segments) => {
            let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
            let listing: PostListing = listings
                .category_posts(site, &blog, &segments, page.page(), now)
                .await?;
            Json(listing).into_response()
        }
        BlogRoute::Post { segments, slug } => {
            let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
            let detail: PostDetail = listings
                .post_detail(site, &blog, &segments, &slug, now)
                .await?;
            Json(detail).into_response()
        }
    };
    Ok(response)
}

/// Create the public router mounted under `channel`.
pub fn router(channel: &str) -> Router<AppState> {
    let base = format!("/{}", channel.trim_matches('/'));
    Router::new()
        .route(&base, get(list_blogs))
        .route(&format!("{base}/"), get(list_blogs))
        .route(&format!("{base}/{{blog}}"), get(blog_posts))
        .route(&format!("{base}/{{blog}}/"), get(blog_posts))
        .route(&format!("{base}/{{blog}}/{{*rest}}"), get(blog_subpath))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_pages() {
        assert_eq!(BlogRoute::parse("authors/"), Some(BlogRoute::Authors));
        assert_eq!(BlogRoute::parse("authors"), Some(BlogRoute::Authors));
        assert_eq!(BlogRoute::parse("rss/"), Some(BlogRoute::Feed));
        assert_eq!(
            BlogRoute::parse("tag/rust"),
            Some(BlogRoute::Tag("rust".into()))
        );
    }

    #[test]
    fn parses_month_archive() {
        assert_eq!(
            BlogRoute::parse("2026/03/"),
            Some(BlogRoute::Month {
                year: 2026,
                month: 3
            })
        );
    }

    #[test]
    fn parses_category_paths() {
        assert_eq!(
            BlogRoute::parse("news/"),
            Some(BlogRoute::Category(vec!["news".into()]))
        );
        assert_eq!(
            BlogRoute::parse("news/ai/"),
            Some(BlogRoute::Category(vec!["news".into(), "ai".into()]))
        );
    }

    #[test]
    fn parses_post_paths() {
        assert_eq!(
            BlogRoute::parse("news/ai/launch.html"),
            Some(BlogRoute::Post {
                segments: vec!["news".into(), "ai".into()],
                slug: "launch".into()
            })
        );
        assert_eq!(
            BlogRoute::parse("no-category/launch.html"),
            Some(BlogRoute::Post {
                segments: vec!["no-category".into()],
                slug: "launch".into()
            })
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!(BlogRoute::parse(""), None);
        assert_eq!(BlogRoute::parse("launch.html"), None);
        assert_eq!(BlogRoute::parse("news//ai/"), None);
        assert_eq!(BlogRoute::parse("news/.html"), None);
    }
}
