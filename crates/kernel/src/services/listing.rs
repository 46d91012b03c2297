//! Public listings: blogs, posts by blog, category, tag, and month, post
//! detail, authors, and feeds.
//!
//! Everything here is restricted to the request's site and to published
//! content whose `date_available` has passed. Month archives only require
//! `published`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::addressing::{NO_CATEGORY, UrlBuilder, absolute_url, enclosure_url};
use crate::error::{BlogError, BlogResult};
use crate::models::{Blog, BlogLink, BlogPost, BlogType, Category, MediaKind, Publishable};
use crate::services::{BlogService, PostService};
use crate::store::{BlogFilter, BlogStore, CategoryFilter, CategoryMatch, PostFilter};
use crate::tree::{CategoryTree, ResolvedCategory};

/// One page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub num_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogEntry {
    #[serde(flatten)]
    pub blog: Blog,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryEntry {
    #[serde(flatten)]
    pub category: Category,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostEntry {
    #[serde(flatten)]
    pub post: BlogPost,
    pub url: String,
    pub category_name: Option<String>,
}

/// A page of posts within a blog.
#[derive(Debug, Clone, Serialize)]
pub struct PostListing {
    pub blog: BlogEntry,
    pub category: Option<CategoryEntry>,
    pub tag: Option<String>,
    pub posts: Page<PostEntry>,
}

/// A blog's front page: its newest posts plus navigation.
#[derive(Debug, Clone, Serialize)]
pub struct BlogFront {
    #[serde(flatten)]
    pub listing: PostListing,
    pub latest: Option<PostEntry>,
    pub links: Vec<BlogLink>,
    pub categories: Vec<CategoryEntry>,
    pub menu: Vec<CategoryEntry>,
    pub related_blogs: Vec<BlogEntry>,
    pub related_channels: Vec<Uuid>,
}

/// A single post with its relations.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub blog: BlogEntry,
    pub category: Option<CategoryEntry>,
    pub post: PostEntry,
    pub related: Vec<PostEntry>,
    pub albums: Vec<Uuid>,
    pub videos: Vec<Uuid>,
    pub audios: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
}

/// Feed content for a blog; serialization to XML is the host's concern.
#[derive(Debug, Clone, Serialize)]
pub struct Feed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub pub_date: DateTime<Utc>,
    pub enclosure: Option<String>,
}

/// Public read side of the blogs.
pub struct ListingService {
    store: Arc<dyn BlogStore>,
    tree: Arc<CategoryTree>,
    blogs: Arc<BlogService>,
    posts: Arc<PostService>,
    urls: UrlBuilder,
    per_page: u32,
    feed_limit: u32,
}

impl ListingService {
    pub fn new(
        store: Arc<dyn BlogStore>,
        tree: Arc<CategoryTree>,
        blogs: Arc<BlogService>,
        posts: Arc<PostService>,
        urls: UrlBuilder,
        per_page: u32,
        feed_limit: u32,
    ) -> Self {
        Self {
            store,
            tree,
            blogs,
            posts,
            urls,
            per_page: per_page.max(1),
            feed_limit,
        }
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    fn blog_entry(&self, blog: Blog) -> BlogEntry {
        BlogEntry {
            url: self.urls.blog_url(&blog),
            blog,
        }
    }

    fn category_entry(&self, blog: &Blog, category: Category) -> CategoryEntry {
        CategoryEntry {
            url: self.urls.category_url(blog, &category),
            category,
        }
    }

    fn post_entry(
        &self,
        blog: &Blog,
        categories: &HashMap<Uuid, Category>,
        post: BlogPost,
    ) -> PostEntry {
        let category = post.category_id.and_then(|id| categories.get(&id));
        PostEntry {
            url: self.urls.post_url(blog, category, &post),
            category_name: category.map(|c| c.name.clone()),
            post,
        }
    }

    /// All categories of `blog` keyed by id, for building post URLs.
    async fn category_index(&self, blog: &Blog) -> BlogResult<HashMap<Uuid, Category>> {
        Ok(self
            .store
            .list_categories(&CategoryFilter::new().blog(blog.id))
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect())
    }

    /// Published, available blog of `site` with `slug`.
    pub async fn find_blog(&self, site: &str, slug: &str, now: DateTime<Utc>) -> BlogResult<Blog> {
        let filter = BlogFilter::new().site(site).slug(slug).visible_at(now);
        self.store
            .list_blogs(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or(BlogError::NotFound)
    }

    async fn paginate(
        &self,
        blog: &Blog,
        filter: PostFilter,
        page: u32,
    ) -> BlogResult<Page<PostEntry>> {
        let page = page.max(1);
        let total = self.store.count_posts(&filter).await?;
        let per_page = u64::from(self.per_page);
        let num_pages = u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX).max(1);
        if page > num_pages {
            return Err(BlogError::NotFound);
        }

        let offset = u64::from(page - 1) * per_page;
        let posts = self
            .store
            .list_posts(&filter.paginate(per_page, offset))
            .await?;
        let categories = self.category_index(blog).await?;

        Ok(Page {
            items: posts
                .into_iter()
                .map(|p| self.post_entry(blog, &categories, p))
                .collect(),
            page,
            per_page: self.per_page,
            total,
            num_pages,
            has_next: page < num_pages,
            has_previous: page > 1,
        })
    }

    fn blog_posts(blog: &Blog) -> PostFilter {
        PostFilter::new().site(blog.site_domain.clone()).blog(blog.id)
    }

    // ----- Listings -----

    /// Published blogs of `site`, optionally of one type.
    pub async fn blogs(
        &self,
        site: &str,
        blog_type: Option<BlogType>,
        now: DateTime<Utc>,
    ) -> BlogResult<Vec<BlogEntry>> {
        let blogs = match blog_type {
            Some(t) => self.blogs.blogs_of_type(site, t, now).await?,
            None => {
                self.store
                    .list_blogs(&BlogFilter::new().site(site).visible_at(now))
                    .await?
            }
        };
        Ok(blogs.into_iter().map(|b| self.blog_entry(b)).collect())
    }

    /// A blog's front page: its newest posts.
    pub async fn blog_posts_page(
        &self,
        site: &str,
        blog_slug: &str,
        page: u32,
        now: DateTime<Utc>,
    ) -> BlogResult<PostListing> {
        let blog = self.find_blog(site, blog_slug, now).await?;
        let posts = self
            .paginate(&blog, Self::blog_posts(&blog).visible_at(now), page)
            .await?;
        Ok(PostListing {
            blog: self.blog_entry(blog),
            category: None,
            tag: None,
            posts,
        })
    }

    /// [`Self::blog_posts_page`] with the blog's links, categories, menu,
    /// and relations.
    pub async fn blog_front(
        &self,
        site: &str,
        blog_slug: &str,
        page: u32,
        now: DateTime<Utc>,
    ) -> BlogResult<BlogFront> {
        let listing = self.blog_posts_page(site, blog_slug, page, now).await?;
        let blog = &listing.blog.blog;

        let categories = self.category_index(blog).await?;
        let latest = self
            .blogs
            .latest(blog, now)
            .await?
            .map(|p| self.post_entry(blog, &categories, p));
        let links = self.blogs.links(blog).await?;
        let all = self
            .blogs
            .categories(blog)
            .await?
            .into_iter()
            .map(|c| self.category_entry(blog, c))
            .collect();
        let menu = self
            .blogs
            .menu_categories(blog)
            .await?
            .into_iter()
            .map(|c| self.category_entry(blog, c))
            .collect();
        let related_blogs = self
            .blogs
            .related_blogs(blog)
            .await?
            .into_iter()
            .map(|b| self.blog_entry(b))
            .collect();
        let related_channels = self.blogs.related_channels(blog).await?;

        Ok(BlogFront {
            listing,
            latest,
            links,
            categories: all,
            menu,
            related_blogs,
            related_channels,
        })
    }

    /// Posts of the category at `segments`, or uncategorized posts for the
    /// reserved token.
    pub async fn category_posts(
        &self,
        site: &str,
        blog_slug: &str,
        segments: &[&str],
        page: u32,
        now: DateTime<Utc>,
    ) -> BlogResult<PostListing> {
        let blog = self.find_blog(site, blog_slug, now).await?;
        let resolved = self.tree.resolve(site, &blog, segments).await?;

        let (category, matcher) = match resolved {
            ResolvedCategory::Category(c) => {
                if !c.is_available_at(now) {
                    return Err(BlogError::NotFound);
                }
                let id = c.id;
                (Some(c), CategoryMatch::Id(id))
            }
            ResolvedCategory::Uncategorized => (None, CategoryMatch::Uncategorized),
        };

        let filter = Self::blog_posts(&blog).category(matcher).visible_at(now);
        let posts = self.paginate(&blog, filter, page).await?;
        Ok(PostListing {
            category: category.map(|c| self.category_entry(&blog, c)),
            blog: self.blog_entry(blog),
            tag: None,
            posts,
        })
    }

    /// Posts of a blog carrying any tag name registered under `tag_slug`.
    pub async fn tag_posts(
        &self,
        site: &str,
        blog_slug: &str,
        tag_slug: &str,
        page: u32,
        now: DateTime<Utc>,
    ) -> BlogResult<PostListing> {
        let blog = self.find_blog(site, blog_slug, now).await?;
        let names = self.store.tag_names(tag_slug).await?;

        let posts = if names.is_empty() {
            Page {
                items: Vec::new(),
                page: 1,
                per_page: self.per_page,
                total: 0,
                num_pages: 1,
                has_next: false,
                has_previous: false,
            }
        } else {
            let filter = Self::blog_posts(&blog).tagged_any(names).visible_at(now);
            self.paginate(&blog, filter, page).await?
        };

        Ok(PostListing {
            blog: self.blog_entry(blog),
            category: None,
            tag: Some(tag_slug.to_string()),
            posts,
        })
    }

    /// Published posts of a blog dated within `year`/`month`.
    pub async fn month_posts(
        &self,
        site: &str,
        blog_slug: &str,
        year: i32,
        month: u32,
        page: u32,
        now: DateTime<Utc>,
    ) -> BlogResult<PostListing> {
        let (start, end) = month_bounds(year, month).ok_or(BlogError::NotFound)?;
        let blog = self.find_blog(site, blog_slug, now).await?;
        let filter = Self::blog_posts(&blog).published().between(start, end);
        let posts = self.paginate(&blog, filter, page).await?;
        Ok(PostListing {
            blog: self.blog_entry(blog),
            category: None,
            tag: None,
            posts,
        })
    }

    /// A post addressed by blog, category path, and slug.
    ///
    /// The reserved `no-category` segment matches the post whatever its category.
    pub async fn post_detail(
        &self,
        site: &str,
        blog_slug: &str,
        segments: &[&str],
        post_slug: &str,
        now: DateTime<Utc>,
    ) -> BlogResult<PostDetail> {
        let blog = self.find_blog(site, blog_slug, now).await?;

        let mut filter = Self::blog_posts(&blog).slug(post_slug).visible_at(now);
        if segments != [NO_CATEGORY] {
            let resolved = self.tree.resolve(site, &blog, segments).await?;
            if let ResolvedCategory::Category(c) = resolved {
                filter = filter.category(CategoryMatch::Id(c.id));
            }
        }

        let post = self
            .store
            .list_posts(&filter.paginate(1, 0))
            .await?
            .into_iter()
            .next()
            .ok_or(BlogError::NotFound)?;

        let categories = self.category_index(&blog).await?;
        let mut related_entries = Vec::new();
        for p in self.posts.related_posts(&post).await? {
            if !p.is_available_at(now) {
                continue;
            }
            if p.blog_id == blog.id {
                related_entries.push(self.post_entry(&blog, &categories, p));
                continue;
            }
            // Related posts may live in another blog of the site.
            let Some(other) = self.store.get_blog(p.blog_id).await? else {
                continue;
            };
            let other_categories = self.category_index(&other).await?;
            related_entries.push(self.post_entry(&other, &other_categories, p));
        }

        let albums = self.posts.media(&post, MediaKind::Album).await?;
        let videos = self.posts.media(&post, MediaKind::Video).await?;
        let audios = self.posts.media(&post, MediaKind::Audio).await?;

        let category = post
            .category_id
            .and_then(|id| categories.get(&id).cloned())
            .map(|c| self.category_entry(&blog, c));
        let post = self.post_entry(&blog, &categories, post);

        Ok(PostDetail {
            blog: self.blog_entry(blog),
            category,
            post,
            related: related_entries,
            albums,
            videos,
            audios,
        })
    }

    /// Users assigned to a published blog. Unknown blogs yield an empty list.
    pub async fn authors(
        &self,
        site: &str,
        blog_slug: &str,
        now: DateTime<Utc>,
    ) -> BlogResult<Vec<Author>> {
        let blog = match self.find_blog(site, blog_slug, now).await {
            Ok(blog) => blog,
            Err(BlogError::NotFound) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(self
            .blogs
            .authors(&blog)
            .await?
            .into_iter()
            .map(|p| Author {
                id: p.user_id,
                name: p.name,
            })
            .collect())
    }

    /// The newest posts of a blog as feed items with absolute links.
    pub async fn feed(&self, site: &str, blog_slug: &str, now: DateTime<Utc>) -> BlogResult<Feed> {
        let blog = self.find_blog(site, blog_slug, now).await?;
        let filter = Self::blog_posts(&blog)
            .visible_at(now)
            .paginate(u64::from(self.feed_limit), 0);
        let posts = self.store.list_posts(&filter).await?;
        let categories = self.category_index(&blog).await?;

        let items = posts
            .into_iter()
            .map(|post| {
                let category = post.category_id.and_then(|id| categories.get(&id));
                let path = self.urls.post_url(&blog, category, &post);
                FeedItem {
                    link: absolute_url(site, &path),
                    enclosure: post.main_image.as_deref().map(|img| enclosure_url(site, img)),
                    description: post.headline,
                    title: post.title,
                    pub_date: post.date_available,
                }
            })
            .collect();

        Ok(Feed {
            title: blog.name.clone(),
            link: absolute_url(site, &self.urls.blog_url(&blog)),
            description: blog.description.clone(),
            items,
        })
    }
}

/// `[first instant of month, first instant of next month)` in UTC.
pub fn month_bounds(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let (next_year, next_month) = if start.month() == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()?;
    Some((start, end))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_regular() {
        let (start, end) = month_bounds(2026, 3).unwrap();
        assert_eq!(start.to_rfc3339(), "2026-03-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-04-01T00:00:00+00:00");
    }

    #[test]
    fn month_bounds_december_rolls_over() {
        let (_, end) = month_bounds(2025, 12).unwrap();
        assert_eq!(end.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn month_bounds_rejects_invalid_month() {
        assert!(month_bounds(2026, 0).is_none());
        assert!(month_bounds(2026, 13).is_none());
    }
}
