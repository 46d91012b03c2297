//! PostgreSQL implementation of BlogStore.

use std::collections::BTreeSet;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    BLOG_SLUG_CONSTRAINT, BlogFilter, BlogStore, CATEGORY_PATH_CONSTRAINT, CategoryFilter,
    LinkFilter, POST_SLUG_CONSTRAINT, PostFilter, query,
};
use crate::error::{BlogError, BlogResult};
use crate::models::{
    ApiToken, Blog, BlogChannelRelated, BlogLink, BlogPost, BlogProfile, BlogRelated, Category,
    MediaKind, PostMedia, PostRelated, Principal,
};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgBlogStore {
    pool: PgPool,
}

impl PgBlogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Name of the unique constraint a database error violated, if any.
fn violated_constraint(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            db.constraint().map(str::to_string)
        }
        _ => None,
    }
}

/// Map unique violations to domain errors; everything else is a storage error.
fn map_write_error(
    err: sqlx::Error,
    context: &'static str,
    slug: &str,
    long_slug: &str,
) -> BlogError {
    match violated_constraint(&err).as_deref() {
        Some(CATEGORY_PATH_CONSTRAINT) => BlogError::DuplicatePath {
            long_slug: long_slug.to_string(),
        },
        Some(BLOG_SLUG_CONSTRAINT) => {
            BlogError::Validation(format!("a blog with slug '{slug}' already exists on this site"))
        }
        Some(POST_SLUG_CONSTRAINT) => {
            BlogError::Validation(format!("a post with slug '{slug}' already exists in this blog"))
        }
        _ => BlogError::Storage(anyhow::Error::new(err).context(context)),
    }
}

const INSERT_CATEGORY: &str = r#"
    INSERT INTO blog_category (id, site_domain, blog_id, parent_id, name, slug, long_slug,
        show_in_menu, is_group, sort_order, published, date_available, created, changed)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
    RETURNING *
"#;

const UPDATE_CATEGORY: &str = r#"
    UPDATE blog_category SET
        blog_id = $2, parent_id = $3, name = $4, slug = $5, long_slug = $6,
        show_in_menu = $7, is_group = $8, sort_order = $9, published = $10,
        date_available = $11, changed = $12, site_domain = $13
    WHERE id = $1
    RETURNING *
"#;

const UPDATE_POST: &str = r#"
    UPDATE blog_post SET
        blog_id = $2, category_id = $3, channel = $4, title = $5, slug = $6,
        headline = $7, content = $8, main_image = $9, source = $10, tags = $11,
        accept_comments = $12, published = $13, date_available = $14, changed = $15,
        site_domain = $16
    WHERE id = $1
    RETURNING *
"#;

const UPDATE_LINK: &str = r#"
    UPDATE blog_link SET
        blog_id = $2, name = $3, link = $4, published = $5, date_available = $6,
        changed = $7, site_domain = $8
    WHERE id = $1
    RETURNING *
"#;

async fn save_category(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    row: &Category,
) -> BlogResult<Category> {
    sqlx::query_as::<_, Category>(UPDATE_CATEGORY)
        .bind(row.id)
        .bind(row.blog_id)
        .bind(row.parent_id)
        .bind(&row.name)
        .bind(&row.slug)
        .bind(&row.long_slug)
        .bind(row.show_in_menu)
        .bind(row.group)
        .bind(row.order)
        .bind(row.published)
        .bind(row.date_available)
        .bind(row.changed)
        .bind(&row.site_domain)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_write_error(e, "failed to update category", &row.slug, &row.long_slug))?
        .ok_or(BlogError::NotFound)
}

#[async_trait]
impl BlogStore for PgBlogStore {
    // ----- Principals -----

    async fn principal_for_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> BlogResult<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT u.id, u.name, u.is_superuser
            FROM api_tokens t
            INNER JOIN users u ON u.id = t.user_id
            WHERE t.token_hash = $1
              AND (t.expires_at IS NULL OR t.expires_at > $2)
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("failed to resolve API token")?;

        Ok(principal)
    }

    async fn insert_principal(&self, principal: &Principal) -> BlogResult<()> {
        sqlx::query("INSERT INTO users (id, name, is_superuser) VALUES ($1, $2, $3)")
            .bind(principal.user_id)
            .bind(&principal.name)
            .bind(principal.is_superuser)
            .execute(&self.pool)
            .await
            .context("failed to create user")?;
        Ok(())
    }

    async fn find_principal_by_name(&self, name: &str) -> BlogResult<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>(
            "SELECT id, name, is_superuser FROM users WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch user by name")?;

        Ok(principal)
    }

    async fn insert_api_token(&self, token: &ApiToken) -> BlogResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_tokens (id, user_id, name, token_hash, created, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.name)
        .bind(&token.token_hash)
        .bind(token.created)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await
        .context("failed to create API token")?;
        Ok(())
    }

    // ----- Blogs -----

    async fn get_blog(&self, id: Uuid) -> BlogResult<Option<Blog>> {
        let blog = sqlx::query_as::<_, Blog>("SELECT * FROM blog WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch blog")?;

        Ok(blog)
    }

    async fn list_blogs(&self, filter: &BlogFilter) -> BlogResult<Vec<Blog>> {
        let sql = query::select_blogs(filter);
        let blogs = sqlx::query_as::<_, Blog>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to list blogs")?;

        Ok(blogs)
    }

    async fn insert_blog(&self, blog: &Blog, users: &[Uuid]) -> BlogResult<Blog> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let created = sqlx::query_as::<_, Blog>(
            r#"
            INSERT INTO blog (id, site_domain, name, slug, description, blog_type, layout_mode,
                main_image, external, published, date_available, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(blog.id)
        .bind(&blog.site_domain)
        .bind(&blog.name)
        .bind(&blog.slug)
        .bind(&blog.description)
        .bind(blog.blog_type)
        .bind(blog.layout_mode)
        .bind(&blog.main_image)
        .bind(blog.external)
        .bind(blog.published)
        .bind(blog.date_available)
        .bind(blog.created)
        .bind(blog.changed)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "failed to create blog", &blog.slug, ""))?;

        for user_id in users {
            sqlx::query("INSERT INTO blog_users (blog_id, user_id) VALUES ($1, $2)")
                .bind(created.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .context("failed to assign blog user")?;
        }

        tx.commit().await.context("failed to commit blog")?;
        Ok(created)
    }

    async fn update_blog(&self, blog: &Blog, users: Option<&[Uuid]>) -> BlogResult<Blog> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let updated = sqlx::query_as::<_, Blog>(
            r#"
            UPDATE blog SET
                name = $2, slug = $3, description = $4, blog_type = $5, layout_mode = $6,
                main_image = $7, external = $8, published = $9, date_available = $10,
                changed = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(blog.id)
        .bind(&blog.name)
        .bind(&blog.slug)
        .bind(&blog.description)
        .bind(blog.blog_type)
        .bind(blog.layout_mode)
        .bind(&blog.main_image)
        .bind(blog.external)
        .bind(blog.published)
        .bind(blog.date_available)
        .bind(blog.changed)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, "failed to update blog", &blog.slug, ""))?
        .ok_or(BlogError::NotFound)?;

        if let Some(users) = users {
            sqlx::query("DELETE FROM blog_users WHERE blog_id = $1")
                .bind(blog.id)
                .execute(&mut *tx)
                .await
                .context("failed to clear blog users")?;
            for user_id in users {
                sqlx::query("INSERT INTO blog_users (blog_id, user_id) VALUES ($1, $2)")
                    .bind(blog.id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await
                    .context("failed to assign blog user")?;
            }
        }

        tx.commit().await.context("failed to commit blog")?;
        Ok(updated)
    }

    async fn blog_ids_for_user(&self, user_id: Uuid) -> BlogResult<BTreeSet<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT blog_id FROM blog_users WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("failed to list user blogs")?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn blog_users(&self, blog_id: Uuid) -> BlogResult<Vec<Principal>> {
        let users = sqlx::query_as::<_, Principal>(
            r#"
            SELECT u.id, u.name, u.is_superuser
            FROM users u
            INNER JOIN blog_users bu ON bu.user_id = u.id
            WHERE bu.blog_id = $1
            ORDER BY u.name
            "#,
        )
        .bind(blog_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list blog users")?;

        Ok(users)
    }

    async fn insert_blog_related(&self, row: &BlogRelated) -> BlogResult<()> {
        sqlx::query(
            "INSERT INTO blog_related (id, blog_id, related_id, sort_order) VALUES ($1, $2, $3, $4)",
        )
        .bind(row.id)
        .bind(row.blog_id)
        .bind(row.related_id)
        .bind(row.order)
        .execute(&self.pool)
        .await
        .context("failed to relate blogs")?;
        Ok(())
    }

    async fn blog_related(&self, blog_id: Uuid) -> BlogResult<Vec<BlogRelated>> {
        let rows = sqlx::query_as::<_, BlogRelated>(
            "SELECT * FROM blog_related WHERE blog_id = $1 ORDER BY sort_order, id",
        )
        .bind(blog_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list related blogs")?;

        Ok(rows)
    }

    async fn insert_channel_related(&self, row: &BlogChannelRelated) -> BlogResult<()> {
        sqlx::query(
            "INSERT INTO blog_channel_related (id, blog_id, channel_id, sort_order) VALUES ($1, $2, $3, $4)",
        )
        .bind(row.id)
        .bind(row.blog_id)
        .bind(row.channel_id)
        .bind(row.order)
        .execute(&self.pool)
        .await
        .context("failed to relate channel")?;
        Ok(())
    }

    async fn channel_related(&self, blog_id: Uuid) -> BlogResult<Vec<BlogChannelRelated>> {
        let rows = sqlx::query_as::<_, BlogChannelRelated>(
            "SELECT * FROM blog_channel_related WHERE blog_id = $1 ORDER BY sort_order, id",
        )
        .bind(blog_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list related channels")?;

        Ok(rows)
    }

    async fn insert_blog_profile(&self, profile: &BlogProfile) -> BlogResult<()> {
        sqlx::query(
            "INSERT INTO blog_profile (blog_id, title, created) VALUES ($1, $2, $3) \
             ON CONFLICT (blog_id) DO NOTHING",
        )
        .bind(profile.blog_id)
        .bind(&profile.title)
        .bind(profile.created)
        .execute(&self.pool)
        .await
        .context("failed to create blog profile")?;
        Ok(())
    }

    async fn get_blog_profile(&self, blog_id: Uuid) -> BlogResult<Option<BlogProfile>> {
        let profile =
            sqlx::query_as::<_, BlogProfile>("SELECT * FROM blog_profile WHERE blog_id = $1")
                .bind(blog_id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to fetch blog profile")?;

        Ok(profile)
    }

    // ----- Categories -----

    async fn get_category(&self, id: Uuid) -> BlogResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM blog_category WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch category")?;

        Ok(category)
    }

    async fn list_categories(&self, filter: &CategoryFilter) -> BlogResult<Vec<Category>> {
        let sql = query::select_categories(filter);
        let categories = sqlx::query_as::<_, Category>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to list categories")?;

        Ok(categories)
    }

    async fn insert_category(&self, category: &Category) -> BlogResult<Category> {
        let created = sqlx::query_as::<_, Category>(INSERT_CATEGORY)
            .bind(category.id)
            .bind(&category.site_domain)
            .bind(category.blog_id)
            .bind(category.parent_id)
            .bind(&category.name)
            .bind(&category.slug)
            .bind(&category.long_slug)
            .bind(category.show_in_menu)
            .bind(category.group)
            .bind(category.order)
            .bind(category.published)
            .bind(category.date_available)
            .bind(category.created)
            .bind(category.changed)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                map_write_error(e, "failed to create category", &category.slug, &category.long_slug)
            })?;

        Ok(created)
    }

    async fn update_category_tree(
        &self,
        category: &Category,
        children: &[Category],
    ) -> BlogResult<Category> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let updated = save_category(&mut tx, category).await?;
        for child in children {
            save_category(&mut tx, child).await?;
        }

        tx.commit().await.context("failed to commit category update")?;
        Ok(updated)
    }

    async fn delete_category(&self, id: Uuid) -> BlogResult<bool> {
        let result = sqlx::query("DELETE FROM blog_category WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete category")?;

        Ok(result.rows_affected() > 0)
    }

    // ----- Posts -----

    async fn get_post(&self, id: Uuid) -> BlogResult<Option<BlogPost>> {
        let post = sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_post WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch post")?;

        Ok(post)
    }

    async fn list_posts(&self, filter: &PostFilter) -> BlogResult<Vec<BlogPost>> {
        let sql = query::select_posts(filter);
        let posts = sqlx::query_as::<_, BlogPost>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to list posts")?;

        Ok(posts)
    }

    async fn count_posts(&self, filter: &PostFilter) -> BlogResult<u64> {
        let sql = query::count_posts(filter);
        let row: (i64,) = sqlx::query_as(&sql)
            .fetch_one(&self.pool)
            .await
            .context("failed to count posts")?;

        Ok(u64::try_from(row.0).unwrap_or(0))
    }

    async fn insert_post(&self, post: &BlogPost) -> BlogResult<BlogPost> {
        let created = sqlx::query_as::<_, BlogPost>(
            r#"
            INSERT INTO blog_post (id, site_domain, blog_id, category_id, channel, title, slug,
                headline, content, main_image, source, tags, accept_comments, published,
                date_available, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(post.id)
        .bind(&post.site_domain)
        .bind(post.blog_id)
        .bind(post.category_id)
        .bind(&post.channel)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.headline)
        .bind(&post.content)
        .bind(&post.main_image)
        .bind(&post.source)
        .bind(&post.tags)
        .bind(post.accept_comments)
        .bind(post.published)
        .bind(post.date_available)
        .bind(post.created)
        .bind(post.changed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "failed to create post", &post.slug, ""))?;

        Ok(created)
    }

    async fn update_post(&self, post: &BlogPost) -> BlogResult<BlogPost> {
        let updated = sqlx::query_as::<_, BlogPost>(UPDATE_POST)
            .bind(post.id)
            .bind(post.blog_id)
            .bind(post.category_id)
            .bind(&post.channel)
            .bind(&post.title)
            .bind(&post.slug)
            .bind(&post.headline)
            .bind(&post.content)
            .bind(&post.main_image)
            .bind(&post.source)
            .bind(&post.tags)
            .bind(post.accept_comments)
            .bind(post.published)
            .bind(post.date_available)
            .bind(post.changed)
            .bind(&post.site_domain)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "failed to update post", &post.slug, ""))?
            .ok_or(BlogError::NotFound)?;

        Ok(updated)
    }

    async fn delete_post(&self, id: Uuid) -> BlogResult<bool> {
        let result = sqlx::query("DELETE FROM blog_post WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete post")?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_post_related(&self, row: &PostRelated) -> BlogResult<()> {
        sqlx::query(
            "INSERT INTO blog_post_related (id, post_id, related_id, sort_order) VALUES ($1, $2, $3, $4)",
        )
        .bind(row.id)
        .bind(row.post_id)
        .bind(row.related_id)
        .bind(row.order)
        .execute(&self.pool)
        .await
        .context("failed to relate posts")?;
        Ok(())
    }

    async fn post_related(&self, post_id: Uuid) -> BlogResult<Vec<PostRelated>> {
        let rows = sqlx::query_as::<_, PostRelated>(
            "SELECT * FROM blog_post_related WHERE post_id = $1 ORDER BY sort_order, id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list related posts")?;

        Ok(rows)
    }

    async fn insert_post_media(&self, row: &PostMedia) -> BlogResult<()> {
        sqlx::query("INSERT INTO blog_post_media (id, post_id, media_id, kind) VALUES ($1, $2, $3, $4)")
            .bind(row.id)
            .bind(row.post_id)
            .bind(row.media_id)
            .bind(row.kind)
            .execute(&self.pool)
            .await
            .context("failed to attach post media")?;
        Ok(())
    }

    async fn post_media(&self, post_id: Uuid, kind: MediaKind) -> BlogResult<Vec<PostMedia>> {
        let rows = sqlx::query_as::<_, PostMedia>(
            "SELECT * FROM blog_post_media WHERE post_id = $1 AND kind = $2 ORDER BY id",
        )
        .bind(post_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await
        .context("failed to list post media")?;

        Ok(rows)
    }

    // ----- Links -----

    async fn get_link(&self, id: Uuid) -> BlogResult<Option<BlogLink>> {
        let link = sqlx::query_as::<_, BlogLink>("SELECT * FROM blog_link WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch link")?;

        Ok(link)
    }

    async fn list_links(&self, filter: &LinkFilter) -> BlogResult<Vec<BlogLink>> {
        let sql = query::select_links(filter);
        let links = sqlx::query_as::<_, BlogLink>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to list links")?;

        Ok(links)
    }

    async fn insert_link(&self, link: &BlogLink) -> BlogResult<BlogLink> {
        let created = sqlx::query_as::<_, BlogLink>(
            r#"
            INSERT INTO blog_link (id, site_domain, blog_id, name, link, published,
                date_available, created, changed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(link.id)
        .bind(&link.site_domain)
        .bind(link.blog_id)
        .bind(&link.name)
        .bind(&link.link)
        .bind(link.published)
        .bind(link.date_available)
        .bind(link.created)
        .bind(link.changed)
        .fetch_one(&self.pool)
        .await
        .context("failed to create link")?;

        Ok(created)
    }

    async fn update_link(&self, link: &BlogLink) -> BlogResult<BlogLink> {
        let updated = sqlx::query_as::<_, BlogLink>(UPDATE_LINK)
            .bind(link.id)
            .bind(link.blog_id)
            .bind(&link.name)
            .bind(&link.link)
            .bind(link.published)
            .bind(link.date_available)
            .bind(link.changed)
            .bind(&link.site_domain)
            .fetch_optional(&self.pool)
            .await
            .context("failed to update link")?
            .ok_or(BlogError::NotFound)?;

        Ok(updated)
    }

    async fn delete_link(&self, id: Uuid) -> BlogResult<bool> {
        let result = sqlx::query("DELETE FROM blog_link WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to delete link")?;

        Ok(result.rows_affected() > 0)
    }

    // ----- Tags -----

    async fn tag_names(&self, slug: &str) -> BlogResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM tag WHERE slug = $1")
            .bind(slug)
            .fetch_all(&self.pool)
            .await
            .context("failed to look up tag")?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_storage_errors() {
        let err = map_write_error(sqlx::Error::RowNotFound, "failed", "ai", "news/ai");
        assert!(matches!(err, BlogError::Storage(_)));
    }

    #[test]
    fn updates_rewrite_site_domain() {
        for sql in [UPDATE_CATEGORY, UPDATE_POST, UPDATE_LINK] {
            assert!(sql.contains("site_domain = $"), "{sql}");
        }
    }
}
