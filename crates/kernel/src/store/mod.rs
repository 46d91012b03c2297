//! Storage abstraction for blogs, categories, posts, and links.
//!
//! All persistence goes through [`BlogStore`]. The PostgreSQL implementation
//! is used by the server; the in-memory implementation enforces the same
//! unique constraints and is used where no database is available.
//!
//! Listing queries are described by filter values (`BlogFilter`,
//! `CategoryFilter`, `PostFilter`, `LinkFilter`). Each filter can be narrowed
//! to a set of blogs with [`ScopedQuery::restrict_to_blogs`], which is how the
//! access layer turns a base query into a scoped one.

mod memory;
mod postgres;
pub mod query;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryBlogStore;
pub use postgres::PgBlogStore;

use crate::error::BlogResult;
use crate::models::{
    ApiToken, Blog, BlogChannelRelated, BlogLink, BlogPost, BlogProfile, BlogRelated, BlogType,
    Category, MediaKind, PostMedia, PostRelated, Principal,
};

/// Name of the unique constraint on category paths.
pub const CATEGORY_PATH_CONSTRAINT: &str = "category_site_blog_long_slug_key";

/// Name of the unique constraint on blog slugs.
pub const BLOG_SLUG_CONSTRAINT: &str = "blog_site_slug_key";

/// Name of the unique constraint on post slugs.
pub const POST_SLUG_CONSTRAINT: &str = "blog_post_site_blog_slug_key";

/// A listing query that can be narrowed to a set of blogs.
pub trait ScopedQuery {
    /// Intersect the query's blog restriction with `blogs`.
    fn restrict_to_blogs(&mut self, blogs: &BTreeSet<Uuid>);
}

fn intersect(current: &mut Option<BTreeSet<Uuid>>, blogs: &BTreeSet<Uuid>) {
    *current = Some(match current.take() {
        Some(existing) => existing.intersection(blogs).copied().collect(),
        None => blogs.clone(),
    });
}

fn visible(published: bool, date_available: DateTime<Utc>, at: Option<DateTime<Utc>>) -> bool {
    at.is_none_or(|now| published && date_available <= now)
}

// -------------------------------------------------------------------------
// Filters
// -------------------------------------------------------------------------

/// Blog listing filter. Results are ordered by name.
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    pub site_domain: Option<String>,
    pub slug: Option<String>,
    pub blog_type: Option<BlogType>,
    /// Restrict to these blog ids (`None` = all).
    pub ids: Option<BTreeSet<Uuid>>,
    /// Only published blogs available at this instant.
    pub visible_at: Option<DateTime<Utc>>,
}

impl BlogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn site(mut self, site_domain: impl Into<String>) -> Self {
        self.site_domain = Some(site_domain.into());
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn of_type(mut self, blog_type: BlogType) -> Self {
        self.blog_type = Some(blog_type);
        self
    }

    pub fn visible_at(mut self, now: DateTime<Utc>) -> Self {
        self.visible_at = Some(now);
        self
    }

    pub fn matches(&self, blog: &Blog) -> bool {
        self.site_domain
            .as_deref()
            .is_none_or(|s| blog.site_domain == s)
            && self.slug.as_deref().is_none_or(|s| blog.slug == s)
            && self.blog_type.is_none_or(|t| blog.blog_type == t)
            && self.ids.as_ref().is_none_or(|ids| ids.contains(&blog.id))
            && visible(blog.published, blog.date_available, self.visible_at)
    }
}

impl ScopedQuery for BlogFilter {
    fn restrict_to_blogs(&mut self, blogs: &BTreeSet<Uuid>) {
        intersect(&mut self.ids, blogs);
    }
}

/// Parent constraint for category listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentMatch {
    /// Root categories only.
    Root,
    /// Direct children of the given category.
    ChildOf(Uuid),
}

/// Category listing filter. Results are ordered by (order, name).
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    pub site_domain: Option<String>,
    pub blog_id: Option<Uuid>,
    pub blog_in: Option<BTreeSet<Uuid>>,
    pub parent: Option<ParentMatch>,
    pub long_slug: Option<String>,
    /// Leave this category out (the row being updated).
    pub exclude_id: Option<Uuid>,
    pub show_in_menu: Option<bool>,
    pub published_only: bool,
    pub visible_at: Option<DateTime<Utc>>,
}

impl CategoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn site(mut self, site_domain: impl Into<String>) -> Self {
        self.site_domain = Some(site_domain.into());
        self
    }

    pub fn blog(mut self, blog_id: Uuid) -> Self {
        self.blog_id = Some(blog_id);
        self
    }

    pub fn roots(mut self) -> Self {
        self.parent = Some(ParentMatch::Root);
        self
    }

    pub fn children_of(mut self, parent_id: Uuid) -> Self {
        self.parent = Some(ParentMatch::ChildOf(parent_id));
        self
    }

    pub fn long_slug(mut self, long_slug: impl Into<String>) -> Self {
        self.long_slug = Some(long_slug.into());
        self
    }

    pub fn excluding(mut self, id: Uuid) -> Self {
        self.exclude_id = Some(id);
        self
    }

    pub fn in_menu(mut self) -> Self {
        self.show_in_menu = Some(true);
        self
    }

    /// Published rows, whatever their availability date.
    pub fn published(mut self) -> Self {
        self.published_only = true;
        self
    }

    pub fn visible_at(mut self, now: DateTime<Utc>) -> Self {
        self.visible_at = Some(now);
        self
    }

    pub fn matches(&self, category: &Category) -> bool {
        self.site_domain
            .as_deref()
            .is_none_or(|s| category.site_domain == s)
            && self.blog_id.is_none_or(|b| category.blog_id == b)
            && self
                .blog_in
                .as_ref()
                .is_none_or(|ids| ids.contains(&category.blog_id))
            && self.parent.is_none_or(|p| match p {
                ParentMatch::Root => category.parent_id.is_none(),
                ParentMatch::ChildOf(id) => category.parent_id == Some(id),
            })
            && self
                .long_slug
                .as_deref()
                .is_none_or(|s| category.long_slug == s)
            && self.exclude_id.is_none_or(|id| category.id != id)
            && self.show_in_menu.is_none_or(|m| category.show_in_menu == m)
            && (!self.published_only || category.published)
            && visible(category.published, category.date_available, self.visible_at)
    }
}

impl ScopedQuery for CategoryFilter {
    fn restrict_to_blogs(&mut self, blogs: &BTreeSet<Uuid>) {
        intersect(&mut self.blog_in, blogs);
    }
}

/// Category constraint for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMatch {
    Id(Uuid),
    /// Posts with no category assigned.
    Uncategorized,
}

/// Post listing filter. Results are ordered by `date_available` descending.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub site_domain: Option<String>,
    pub blog_id: Option<Uuid>,
    pub blog_in: Option<BTreeSet<Uuid>>,
    pub category: Option<CategoryMatch>,
    pub slug: Option<String>,
    /// Match posts carrying any of these tag names. Empty = no constraint.
    pub tags_any: Vec<String>,
    pub published_only: bool,
    pub visible_at: Option<DateTime<Utc>>,
    /// Half-open `[start, end)` range on `date_available`.
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl PostFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn site(mut self, site_domain: impl Into<String>) -> Self {
        self.site_domain = Some(site_domain.into());
        self
    }

    pub fn blog(mut self, blog_id: Uuid) -> Self {
        self.blog_id = Some(blog_id);
        self
    }

    pub fn category(mut self, category: CategoryMatch) -> Self {
        self.category = Some(category);
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn tagged_any(mut self, names: Vec<String>) -> Self {
        self.tags_any = names;
        self
    }

    pub fn published(mut self) -> Self {
        self.published_only = true;
        self
    }

    pub fn visible_at(mut self, now: DateTime<Utc>) -> Self {
        self.visible_at = Some(now);
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn paginate(mut self, limit: u64, offset: u64) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }

    /// Row predicate, ignoring `limit` and `offset`.
    pub fn matches(&self, post: &BlogPost) -> bool {
        self.site_domain
            .as_deref()
            .is_none_or(|s| post.site_domain == s)
            && self.blog_id.is_none_or(|b| post.blog_id == b)
            && self
                .blog_in
                .as_ref()
                .is_none_or(|ids| ids.contains(&post.blog_id))
            && self.category.is_none_or(|c| match c {
                CategoryMatch::Id(id) => post.category_id == Some(id),
                CategoryMatch::Uncategorized => post.category_id.is_none(),
            })
            && self.slug.as_deref().is_none_or(|s| post.slug == s)
            && (self.tags_any.is_empty() || post.tags.iter().any(|t| self.tags_any.contains(t)))
            && (!self.published_only || post.published)
            && visible(post.published, post.date_available, self.visible_at)
            && self
                .date_range
                .is_none_or(|(start, end)| post.date_available >= start && post.date_available < end)
    }
}

impl ScopedQuery for PostFilter {
    fn restrict_to_blogs(&mut self, blogs: &BTreeSet<Uuid>) {
        intersect(&mut self.blog_in, blogs);
    }
}

/// Link listing filter. Results are ordered by name.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pub site_domain: Option<String>,
    pub blog_id: Option<Uuid>,
    pub blog_in: Option<BTreeSet<Uuid>>,
    pub published_only: bool,
    pub visible_at: Option<DateTime<Utc>>,
}

impl LinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn site(mut self, site_domain: impl Into<String>) -> Self {
        self.site_domain = Some(site_domain.into());
        self
    }

    pub fn blog(mut self, blog_id: Uuid) -> Self {
        self.blog_id = Some(blog_id);
        self
    }

    pub fn published(mut self) -> Self {
        self.published_only = true;
        self
    }

    pub fn visible_at(mut self, now: DateTime<Utc>) -> Self {
        self.visible_at = Some(now);
        self
    }

    pub fn matches(&self, link: &BlogLink) -> bool {
        self.site_domain
            .as_deref()
            .is_none_or(|s| link.site_domain == s)
            && self.blog_id.is_none_or(|b| link.blog_id == b)
            && self
                .blog_in
                .as_ref()
                .is_none_or(|ids| ids.contains(&link.blog_id))
            && (!self.published_only || link.published)
            && visible(link.published, link.date_available, self.visible_at)
    }
}

impl ScopedQuery for LinkFilter {
    fn restrict_to_blogs(&mut self, blogs: &BTreeSet<Uuid>) {
        intersect(&mut self.blog_in, blogs);
    }
}

// -------------------------------------------------------------------------
// Storage trait
// -------------------------------------------------------------------------

/// Persistence for the blog module.
///
/// Implementations must enforce uniqueness of `(site_domain, blog_id,
/// long_slug)` for categories, reporting a violation as
/// [`BlogError::DuplicatePath`](crate::error::BlogError::DuplicatePath)
/// even when the service-level pre-check passed.
#[async_trait]
pub trait BlogStore: Send + Sync {
    // ----- Principals -----

    /// Resolve an API token hash to its principal, ignoring expired tokens.
    async fn principal_for_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> BlogResult<Option<Principal>>;

    async fn insert_principal(&self, principal: &Principal) -> BlogResult<()>;

    async fn find_principal_by_name(&self, name: &str) -> BlogResult<Option<Principal>>;

    async fn insert_api_token(&self, token: &ApiToken) -> BlogResult<()>;

    // ----- Blogs -----

    async fn get_blog(&self, id: Uuid) -> BlogResult<Option<Blog>>;

    async fn list_blogs(&self, filter: &BlogFilter) -> BlogResult<Vec<Blog>>;

    /// Insert a blog and its assigned users.
    async fn insert_blog(&self, blog: &Blog, users: &[Uuid]) -> BlogResult<Blog>;

    /// Update a blog; replaces the assigned users when `users` is given.
    async fn update_blog(&self, blog: &Blog, users: Option<&[Uuid]>) -> BlogResult<Blog>;

    /// Ids of the blogs a user is assigned to.
    async fn blog_ids_for_user(&self, user_id: Uuid) -> BlogResult<BTreeSet<Uuid>>;

    /// Users assigned to a blog, ordered by name.
    async fn blog_users(&self, blog_id: Uuid) -> BlogResult<Vec<Principal>>;

    async fn insert_blog_related(&self, row: &BlogRelated) -> BlogResult<()>;

    /// Related-blog rows for `blog_id`, by order. May include nulled rows.
    async fn blog_related(&self, blog_id: Uuid) -> BlogResult<Vec<BlogRelated>>;

    async fn insert_channel_related(&self, row: &BlogChannelRelated) -> BlogResult<()>;

    async fn channel_related(&self, blog_id: Uuid) -> BlogResult<Vec<BlogChannelRelated>>;

    /// Store the basic profile of a blog. An existing profile is kept.
    async fn insert_blog_profile(&self, profile: &BlogProfile) -> BlogResult<()>;

    async fn get_blog_profile(&self, blog_id: Uuid) -> BlogResult<Option<BlogProfile>>;

    // ----- Categories -----

    async fn get_category(&self, id: Uuid) -> BlogResult<Option<Category>>;

    async fn list_categories(&self, filter: &CategoryFilter) -> BlogResult<Vec<Category>>;

    async fn insert_category(&self, category: &Category) -> BlogResult<Category>;

    /// Save `category` and the recomputed `children` atomically.
    async fn update_category_tree(
        &self,
        category: &Category,
        children: &[Category],
    ) -> BlogResult<Category>;

    /// Delete a category; its children go with it and its posts lose their category.
    async fn delete_category(&self, id: Uuid) -> BlogResult<bool>;

    // ----- Posts -----

    async fn get_post(&self, id: Uuid) -> BlogResult<Option<BlogPost>>;

    async fn list_posts(&self, filter: &PostFilter) -> BlogResult<Vec<BlogPost>>;

    /// Count rows matching `filter`, ignoring its pagination.
    async fn count_posts(&self, filter: &PostFilter) -> BlogResult<u64>;

    async fn insert_post(&self, post: &BlogPost) -> BlogResult<BlogPost>;

    async fn update_post(&self, post: &BlogPost) -> BlogResult<BlogPost>;

    /// Delete a post; relation and media rows referencing it are nulled.
    async fn delete_post(&self, id: Uuid) -> BlogResult<bool>;

    async fn insert_post_related(&self, row: &PostRelated) -> BlogResult<()>;

    /// Related-post rows for `post_id`, by order. May include nulled rows.
    async fn post_related(&self, post_id: Uuid) -> BlogResult<Vec<PostRelated>>;

    async fn insert_post_media(&self, row: &PostMedia) -> BlogResult<()>;

    async fn post_media(&self, post_id: Uuid, kind: MediaKind) -> BlogResult<Vec<PostMedia>>;

    // ----- Links -----

    async fn get_link(&self, id: Uuid) -> BlogResult<Option<BlogLink>>;

    async fn list_links(&self, filter: &LinkFilter) -> BlogResult<Vec<BlogLink>>;

    async fn insert_link(&self, link: &BlogLink) -> BlogResult<BlogLink>;

    async fn update_link(&self, link: &BlogLink) -> BlogResult<BlogLink>;

    async fn delete_link(&self, id: Uuid) -> BlogResult<bool>;

    // ----- Tags -----

    /// Tag names registered under `slug`.
    async fn tag_names(&self, slug: &str) -> BlogResult<Vec<String>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn restriction_intersects() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let mut filter = PostFilter::new();
        filter.restrict_to_blogs(&BTreeSet::from([a, b]));
        filter.restrict_to_blogs(&BTreeSet::from([b]));
        assert_eq!(filter.blog_in, Some(BTreeSet::from([b])));
    }

    #[test]
    fn empty_restriction_matches_nothing() {
        let mut filter = CategoryFilter::new();
        filter.restrict_to_blogs(&BTreeSet::new());
        assert_eq!(filter.blog_in, Some(BTreeSet::new()));
    }
}
