//! In-process implementation of BlogStore.
//!
//! Mirrors the PostgreSQL schema's unique constraints and null-on-delete
//! relations. Used by the test suites and for running without a database.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{BlogFilter, BlogStore, CategoryFilter, LinkFilter, PostFilter};
use crate::error::{BlogError, BlogResult};
use crate::models::{
    ApiToken, Blog, BlogChannelRelated, BlogLink, BlogPost, BlogProfile, BlogRelated, Category,
    MediaKind, PostMedia, PostRelated, Principal,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, Principal>,
    tokens: HashMap<String, ApiToken>,
    blogs: HashMap<Uuid, Blog>,
    /// (blog_id, user_id)
    blog_users: BTreeSet<(Uuid, Uuid)>,
    blog_related: Vec<BlogRelated>,
    channel_related: Vec<BlogChannelRelated>,
    profiles: HashMap<Uuid, BlogProfile>,
    categories: HashMap<Uuid, Category>,
    posts: HashMap<Uuid, BlogPost>,
    post_related: Vec<PostRelated>,
    post_media: Vec<PostMedia>,
    links: HashMap<Uuid, BlogLink>,
    /// (slug, name)
    tags: BTreeSet<(String, String)>,
}

impl Tables {
    fn check_blog_slug(&self, blog: &Blog) -> BlogResult<()> {
        let taken = self.blogs.values().any(|b| {
            b.id != blog.id && b.site_domain == blog.site_domain && b.slug == blog.slug
        });
        if taken {
            return Err(BlogError::Validation(format!(
                "a blog with slug '{}' already exists on this site",
                blog.slug
            )));
        }
        Ok(())
    }

    /// Unique (site_domain, blog_id, long_slug), ignoring the rows in `skip`.
    fn check_category_path(&self, category: &Category, skip: &BTreeSet<Uuid>) -> BlogResult<()> {
        let taken = self.categories.values().any(|c| {
            !skip.contains(&c.id)
                && c.site_domain == category.site_domain
                && c.blog_id == category.blog_id
                && c.long_slug == category.long_slug
        });
        if taken {
            return Err(BlogError::DuplicatePath {
                long_slug: category.long_slug.clone(),
            });
        }
        Ok(())
    }

    fn check_post_slug(&self, post: &BlogPost) -> BlogResult<()> {
        let taken = self.posts.values().any(|p| {
            p.id != post.id
                && p.site_domain == post.site_domain
                && p.blog_id == post.blog_id
                && p.slug == post.slug
        });
        if taken {
            return Err(BlogError::Validation(format!(
                "a post with slug '{}' already exists in this blog",
                post.slug
            )));
        }
        Ok(())
    }

    fn assign_users(&mut self, blog_id: Uuid, users: &[Uuid]) {
        self.blog_users.retain(|(b, _)| *b != blog_id);
        for user_id in users {
            self.blog_users.insert((blog_id, *user_id));
        }
    }
}

/// Store backed by process memory.
#[derive(Default)]
pub struct MemoryBlogStore {
    tables: RwLock<Tables>,
}

impl MemoryBlogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tag name under a slug.
    pub fn add_tag(&self, slug: &str, name: &str) {
        self.tables
            .write()
            .tags
            .insert((slug.to_string(), name.to_string()));
    }

    /// Delete a blog outright, nulling relation rows that pointed at it.
    pub fn purge_blog(&self, id: Uuid) {
        let mut tables = self.tables.write();
        tables.blogs.remove(&id);
        tables.blog_users.retain(|(b, _)| *b != id);
        tables.profiles.remove(&id);
        for row in &mut tables.blog_related {
            if row.blog_id == Some(id) {
                row.blog_id = None;
            }
            if row.related_id == Some(id) {
                row.related_id = None;
            }
        }
        for row in &mut tables.channel_related {
            if row.blog_id == Some(id) {
                row.blog_id = None;
            }
        }
    }
}

/// Relation rows selected by `keep`, sorted by their (order, id) key.
fn sorted_by_order<T: Clone>(
    rows: &[T],
    keep: impl Fn(&T) -> bool,
    order: impl Fn(&T) -> (i32, Uuid),
) -> Vec<T> {
    let mut out: Vec<T> = rows.iter().filter(|r| keep(r)).cloned().collect();
    out.sort_by_key(|r| order(r));
    out
}

#[async_trait]
impl BlogStore for MemoryBlogStore {
    // ----- Principals -----

    async fn principal_for_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> BlogResult<Option<Principal>> {
        let tables = self.tables.read();
        Ok(tables
            .tokens
            .get(token_hash)
            .filter(|t| !t.is_expired_at(now))
            .and_then(|t| tables.users.get(&t.user_id))
            .cloned())
    }

    async fn insert_principal(&self, principal: &Principal) -> BlogResult<()> {
        let mut tables = self.tables.write();
        if tables.users.values().any(|u| u.name == principal.name) {
            return Err(BlogError::Validation(format!(
                "user '{}' already exists",
                principal.name
            )));
        }
        tables.users.insert(principal.user_id, principal.clone());
        Ok(())
    }

    async fn find_principal_by_name(&self, name: &str) -> BlogResult<Option<Principal>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.name == name)
            .cloned())
    }

    async fn insert_api_token(&self, token: &ApiToken) -> BlogResult<()> {
        self.tables
            .write()
            .tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    // ----- Blogs -----

    async fn get_blog(&self, id: Uuid) -> BlogResult<Option<Blog>> {
        Ok(self.tables.read().blogs.get(&id).cloned())
    }

    async fn list_blogs(&self, filter: &BlogFilter) -> BlogResult<Vec<Blog>> {
        let mut blogs: Vec<Blog> = self
            .tables
            .read()
            .blogs
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        blogs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blogs)
    }

    async fn insert_blog(&self, blog: &Blog, users: &[Uuid]) -> BlogResult<Blog> {
        let mut tables = self.tables.write();
        tables.check_blog_slug(blog)?;
        tables.blogs.insert(blog.id, blog.clone());
        tables.assign_users(blog.id, users);
        Ok(blog.clone())
    }

    async fn update_blog(&self, blog: &Blog, users: Option<&[Uuid]>) -> BlogResult<Blog> {
        let mut tables = self.tables.write();
        if !tables.blogs.contains_key(&blog.id) {
            return Err(BlogError::NotFound);
        }
        tables.check_blog_slug(blog)?;
        tables.blogs.insert(blog.id, blog.clone());
        if let Some(users) = users {
            tables.assign_users(blog.id, users);
        }
        Ok(blog.clone())
    }

    async fn blog_ids_for_user(&self, user_id: Uuid) -> BlogResult<BTreeSet<Uuid>> {
        Ok(self
            .tables
            .read()
            .blog_users
            .iter()
            .filter(|(_, u)| *u == user_id)
            .map(|(b, _)| *b)
            .collect())
    }

    async fn blog_users(&self, blog_id: Uuid) -> BlogResult<Vec<Principal>> {
        let tables = self.tables.read();
        let mut users: Vec<Principal> = tables
            .blog_users
            .iter()
            .filter(|(b, _)| *b == blog_id)
            .filter_map(|(_, u)| tables.users.get(u).cloned())
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn insert_blog_related(&self, row: &BlogRelated) -> BlogResult<()> {
        self.tables.write().blog_related.push(row.clone());
        Ok(())
    }

    async fn blog_related(&self, blog_id: Uuid) -> BlogResult<Vec<BlogRelated>> {
        Ok(sorted_by_order(
            &self.tables.read().blog_related,
            |r| r.blog_id == Some(blog_id),
            |r| (r.order, r.id),
        ))
    }

    async fn insert_channel_related(&self, row: &BlogChannelRelated) -> BlogResult<()> {
        self.tables.write().channel_related.push(row.clone());
        Ok(())
    }

    async fn channel_related(&self, blog_id: Uuid) -> BlogResult<Vec<BlogChannelRelated>> {
        Ok(sorted_by_order(
            &self.tables.read().channel_related,
            |r| r.blog_id == Some(blog_id),
            |r| (r.order, r.id),
        ))
    }

    async fn insert_blog_profile(&self, profile: &BlogProfile) -> BlogResult<()> {
        self.tables
            .write()
            .profiles
            .entry(profile.blog_id)
            .or_insert_with(|| profile.clone());
        Ok(())
    }

    async fn get_blog_profile(&self, blog_id: Uuid) -> BlogResult<Option<BlogProfile>> {
        Ok(self.tables.read().profiles.get(&blog_id).cloned())
    }

    // ----- Categories -----

    async fn get_category(&self, id: Uuid) -> BlogResult<Option<Category>> {
        Ok(self.tables.read().categories.get(&id).cloned())
    }

    async fn list_categories(&self, filter: &CategoryFilter) -> BlogResult<Vec<Category>> {
        let mut categories: Vec<Category> = self
            .tables
            .read()
            .categories
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));
        Ok(categories)
    }

    async fn insert_category(&self, category: &Category) -> BlogResult<Category> {
        let mut tables = self.tables.write();
        tables.check_category_path(category, &BTreeSet::new())?;
        tables.categories.insert(category.id, category.clone());
        Ok(category.clone())
    }

    async fn update_category_tree(
        &self,
        category: &Category,
        children: &[Category],
    ) -> BlogResult<Category> {
        let mut tables = self.tables.write();
        let rows: Vec<&Category> = std::iter::once(category).chain(children).collect();
        if rows.iter().any(|r| !tables.categories.contains_key(&r.id)) {
            return Err(BlogError::NotFound);
        }

        // All rows are checked against the table minus themselves, then
        // against each other, before anything is written.
        let skip: BTreeSet<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut seen = BTreeSet::new();
        for row in &rows {
            tables.check_category_path(row, &skip)?;
            if !seen.insert((row.site_domain.as_str(), row.blog_id, row.long_slug.as_str())) {
                return Err(BlogError::DuplicatePath {
                    long_slug: row.long_slug.clone(),
                });
            }
        }

        for row in rows {
            tables.categories.insert(row.id, row.clone());
        }
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> BlogResult<bool> {
        let mut tables = self.tables.write();
        if tables.categories.remove(&id).is_none() {
            return Ok(false);
        }
        let children: Vec<Uuid> = tables
            .categories
            .values()
            .filter(|c| c.parent_id == Some(id))
            .map(|c| c.id)
            .collect();
        for child in &children {
            tables.categories.remove(child);
        }
        for post in tables.posts.values_mut() {
            if post
                .category_id
                .is_some_and(|c| c == id || children.contains(&c))
            {
                post.category_id = None;
            }
        }
        Ok(true)
    }

    // ----- Posts -----

    async fn get_post(&self, id: Uuid) -> BlogResult<Option<BlogPost>> {
        Ok(self.tables.read().posts.get(&id).cloned())
    }

    async fn list_posts(&self, filter: &PostFilter) -> BlogResult<Vec<BlogPost>> {
        let mut posts: Vec<BlogPost> = self
            .tables
            .read()
            .posts
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        posts.sort_by(|a, b| {
            b.date_available
                .cmp(&a.date_available)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = usize::try_from(filter.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = filter
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(posts.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_posts(&self, filter: &PostFilter) -> BlogResult<u64> {
        let count = self
            .tables
            .read()
            .posts
            .values()
            .filter(|p| filter.matches(p))
            .count();
        Ok(count as u64)
    }

    async fn insert_post(&self, post: &BlogPost) -> BlogResult<BlogPost> {
        let mut tables = self.tables.write();
        tables.check_post_slug(post)?;
        tables.posts.insert(post.id, post.clone());
        Ok(post.clone())
    }

    async fn update_post(&self, post: &BlogPost) -> BlogResult<BlogPost> {
        let mut tables = self.tables.write();
        if !tables.posts.contains_key(&post.id) {
            return Err(BlogError::NotFound);
        }
        tables.check_post_slug(post)?;
        tables.posts.insert(post.id, post.clone());
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> BlogResult<bool> {
        let mut tables = self.tables.write();
        if tables.posts.remove(&id).is_none() {
            return Ok(false);
        }
        for row in &mut tables.post_related {
            if row.post_id == Some(id) {
                row.post_id = None;
            }
            if row.related_id == Some(id) {
                row.related_id = None;
            }
        }
        for row in &mut tables.post_media {
            if row.post_id == Some(id) {
                row.post_id = None;
            }
        }
        Ok(true)
    }

    async fn insert_post_related(&self, row: &PostRelated) -> BlogResult<()> {
        self.tables.write().post_related.push(row.clone());
        Ok(())
    }

    async fn post_related(&self, post_id: Uuid) -> BlogResult<Vec<PostRelated>> {
        Ok(sorted_by_order(
            &self.tables.read().post_related,
            |r| r.post_id == Some(post_id),
            |r| (r.order, r.id),
        ))
    }

    async fn insert_post_media(&self, row: &PostMedia) -> BlogResult<()> {
        self.tables.write().post_media.push(row.clone());
        Ok(())
    }

    async fn post_media(&self, post_id: Uuid, kind: MediaKind) -> BlogResult<Vec<PostMedia>> {
        let mut rows: Vec<PostMedia> = self
            .tables
            .read()
            .post_media
            .iter()
            .filter(|m| m.post_id == Some(post_id) && m.kind == kind)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.id);
        Ok(rows)
    }

    // ----- Links -----

    async fn get_link(&self, id: Uuid) -> BlogResult<Option<BlogLink>> {
        Ok(self.tables.read().links.get(&id).cloned())
    }

    async fn list_links(&self, filter: &LinkFilter) -> BlogResult<Vec<BlogLink>> {
        let mut links: Vec<BlogLink> = self
            .tables
            .read()
            .links
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        links.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(links)
    }

    async fn insert_link(&self, link: &BlogLink) -> BlogResult<BlogLink> {
        self.tables.write().links.insert(link.id, link.clone());
        Ok(link.clone())
    }

    async fn update_link(&self, link: &BlogLink) -> BlogResult<BlogLink> {
        let mut tables = self.tables.write();
        if !tables.links.contains_key(&link.id) {
            return Err(BlogError::NotFound);
        }
        tables.links.insert(link.id, link.clone());
        Ok(link.clone())
    }

    async fn delete_link(&self, id: Uuid) -> BlogResult<bool> {
        Ok(self.tables.write().links.remove(&id).is_some())
    }

    // ----- Tags -----

    async fn tag_names(&self, slug: &str) -> BlogResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .tags
            .iter()
            .filter(|(s, _)| s == slug)
            .map(|(_, name)| name.clone())
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn category(blog_id: Uuid, slug: &str, long_slug: &str) -> Category {
        let now = Utc::now();
        Category {
            id: Uuid::now_v7(),
            site_domain: "example.com".into(),
            blog_id,
            parent_id: None,
            name: slug.into(),
            slug: slug.into(),
            long_slug: long_slug.into(),
            show_in_menu: false,
            group: false,
            order: 0,
            published: true,
            date_available: now,
            created: now,
            changed: now,
        }
    }

    #[tokio::test]
    async fn category_path_constraint_is_enforced() {
        let store = MemoryBlogStore::new();
        let blog = Uuid::now_v7();
        store
            .insert_category(&category(blog, "ai", "news/ai"))
            .await
            .unwrap();

        let err = store
            .insert_category(&category(blog, "ai", "news/ai"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlogError::DuplicatePath { ref long_slug } if long_slug == "news/ai"));

        // Same path in another blog is fine.
        store
            .insert_category(&category(Uuid::now_v7(), "ai", "news/ai"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tree_update_checks_rows_against_each_other() {
        let store = MemoryBlogStore::new();
        let blog = Uuid::now_v7();
        let mut a = store
            .insert_category(&category(blog, "a", "x/a"))
            .await
            .unwrap();
        let mut b = store
            .insert_category(&category(blog, "b", "x/b"))
            .await
            .unwrap();
        a.long_slug = "y/same".into();
        b.long_slug = "y/same".into();

        let err = store.update_category_tree(&a, &[b]).await.unwrap_err();
        assert!(matches!(err, BlogError::DuplicatePath { .. }));
        // Nothing was written.
        let stored = store.get_category(a.id).await.unwrap().unwrap();
        assert_eq!(stored.long_slug, "x/a");
    }

    #[tokio::test]
    async fn deleted_post_nulls_relations() {
        let store = MemoryBlogStore::new();
        let post = Uuid::now_v7();
        let other = Uuid::now_v7();
        store
            .insert_post_related(&PostRelated {
                id: Uuid::now_v7(),
                post_id: Some(other),
                related_id: Some(post),
                order: 0,
            })
            .await
            .unwrap();
        let now = Utc::now();
        store
            .insert_post(&BlogPost {
                id: post,
                site_domain: "example.com".into(),
                blog_id: Uuid::now_v7(),
                category_id: None,
                channel: "blog".into(),
                title: "T".into(),
                slug: "t".into(),
                headline: None,
                content: String::new(),
                main_image: None,
                tags: vec![],
                source: None,
                accept_comments: true,
                published: true,
                date_available: now,
                created: now,
                changed: now,
            })
            .await
            .unwrap();

        assert!(store.delete_post(post).await.unwrap());
        let rows = store.post_related(other).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].related_id, None);
    }
}
