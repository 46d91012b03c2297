//! Listing queries built with SeaQuery.
//!
//! Each builder renders a filter into a PostgreSQL SELECT. Values are inlined
//! by the query builder's escaping, so the resulting string is executed
//! without further binds.

use std::collections::BTreeSet;

use sea_query::{
    Alias, Asterisk, Cond, Expr, Order, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr,
};
use uuid::Uuid;

use super::{BlogFilter, CategoryFilter, CategoryMatch, LinkFilter, ParentMatch, PostFilter};

const BLOG: &str = "blog";
const CATEGORY: &str = "blog_category";
const POST: &str = "blog_post";
const LINK: &str = "blog_link";

fn col(table: &str, column: &str) -> Expr {
    Expr::col((Alias::new(table), Alias::new(column)))
}

/// `column IN (ids)`, or FALSE when the set is empty.
fn in_set(table: &str, column: &str, ids: &BTreeSet<Uuid>) -> SimpleExpr {
    if ids.is_empty() {
        return Expr::cust("FALSE");
    }
    col(table, column).is_in(ids.iter().copied())
}

fn add_visibility(query: &mut SelectStatement, table: &str, at: Option<chrono::DateTime<chrono::Utc>>) {
    if let Some(now) = at {
        query.and_where(col(table, "published").eq(true));
        query.and_where(col(table, "date_available").lte(now));
    }
}

/// SELECT for blogs matching `filter`, ordered by name.
pub fn select_blogs(filter: &BlogFilter) -> String {
    let mut query = Query::select();
    query.column(Asterisk).from(Alias::new(BLOG));

    if let Some(ref site) = filter.site_domain {
        query.and_where(col(BLOG, "site_domain").eq(site.as_str()));
    }
    if let Some(ref slug) = filter.slug {
        query.and_where(col(BLOG, "slug").eq(slug.as_str()));
    }
    if let Some(blog_type) = filter.blog_type {
        query.and_where(col(BLOG, "blog_type").eq(blog_type.as_str()));
    }
    if let Some(ref ids) = filter.ids {
        query.and_where(in_set(BLOG, "id", ids));
    }
    add_visibility(&mut query, BLOG, filter.visible_at);

    query.order_by((Alias::new(BLOG), Alias::new("name")), Order::Asc);
    query.to_string(PostgresQueryBuilder)
}

/// SELECT for categories matching `filter`, ordered by (sort_order, name).
pub fn select_categories(filter: &CategoryFilter) -> String {
    let mut query = Query::select();
    query.column(Asterisk).from(Alias::new(CATEGORY));

    if let Some(ref site) = filter.site_domain {
        query.and_where(col(CATEGORY, "site_domain").eq(site.as_str()));
    }
    if let Some(blog_id) = filter.blog_id {
        query.and_where(col(CATEGORY, "blog_id").eq(blog_id));
    }
    if let Some(ref ids) = filter.blog_in {
        query.and_where(in_set(CATEGORY, "blog_id", ids));
    }
    match filter.parent {
        Some(ParentMatch::Root) => {
            query.and_where(col(CATEGORY, "parent_id").is_null());
        }
        Some(ParentMatch::ChildOf(id)) => {
            query.and_where(col(CATEGORY, "parent_id").eq(id));
        }
        None => {}
    }
    if let Some(ref long_slug) = filter.long_slug {
        query.and_where(col(CATEGORY, "long_slug").eq(long_slug.as_str()));
    }
    if let Some(id) = filter.exclude_id {
        query.and_where(col(CATEGORY, "id").ne(id));
    }
    if let Some(show_in_menu) = filter.show_in_menu {
        query.and_where(col(CATEGORY, "show_in_menu").eq(show_in_menu));
    }
    if filter.published_only {
        query.and_where(col(CATEGORY, "published").eq(true));
    }
    add_visibility(&mut query, CATEGORY, filter.visible_at);

    query
        .order_by((Alias::new(CATEGORY), Alias::new("sort_order")), Order::Asc)
        .order_by((Alias::new(CATEGORY), Alias::new("name")), Order::Asc);
    query.to_string(PostgresQueryBuilder)
}

fn post_conditions(query: &mut SelectStatement, filter: &PostFilter) {
    if let Some(ref site) = filter.site_domain {
        query.and_where(col(POST, "site_domain").eq(site.as_str()));
    }
    if let Some(blog_id) = filter.blog_id {
        query.and_where(col(POST, "blog_id").eq(blog_id));
    }
    if let Some(ref ids) = filter.blog_in {
        query.and_where(in_set(POST, "blog_id", ids));
    }
    match filter.category {
        Some(CategoryMatch::Id(id)) => {
            query.and_where(col(POST, "category_id").eq(id));
        }
        Some(CategoryMatch::Uncategorized) => {
            query.and_where(col(POST, "category_id").is_null());
        }
        None => {}
    }
    if let Some(ref slug) = filter.slug {
        query.and_where(col(POST, "slug").eq(slug.as_str()));
    }
    if !filter.tags_any.is_empty() {
        let mut any = Cond::any();
        for name in &filter.tags_any {
            any = any.add(Expr::cust_with_values(
                format!("$1 = ANY({POST}.tags)"),
                [name.clone()],
            ));
        }
        query.cond_where(any);
    }
    if filter.published_only {
        query.and_where(col(POST, "published").eq(true));
    }
    add_visibility(query, POST, filter.visible_at);
    if let Some((start, end)) = filter.date_range {
        query.and_where(col(POST, "date_available").gte(start));
        query.and_where(col(POST, "date_available").lt(end));
    }
}

/// SELECT for posts matching `filter`, newest first, with pagination.
pub fn select_posts(filter: &PostFilter) -> String {
    let mut query = Query::select();
    query.column(Asterisk).from(Alias::new(POST));
    post_conditions(&mut query, filter);

    query
        .order_by((Alias::new(POST), Alias::new("date_available")), Order::Desc)
        .order_by((Alias::new(POST), Alias::new("id")), Order::Desc);
    if let Some(limit) = filter.limit {
        query.limit(limit);
    }
    if let Some(offset) = filter.offset {
        query.offset(offset);
    }
    query.to_string(PostgresQueryBuilder)
}

/// COUNT(*) for posts matching `filter`; pagination is ignored.
pub fn count_posts(filter: &PostFilter) -> String {
    let mut query = Query::select();
    query.expr(Expr::col(Asterisk).count()).from(Alias::new(POST));
    post_conditions(&mut query, filter);
    query.to_string(PostgresQueryBuilder)
}

/// SELECT for links matching `filter`, ordered by name.
pub fn select_links(filter: &LinkFilter) -> String {
    let mut query = Query::select();
    query.column(Asterisk).from(Alias::new(LINK));

    if let Some(ref site) = filter.site_domain {
        query.and_where(col(LINK, "site_domain").eq(site.as_str()));
    }
    if let Some(blog_id) = filter.blog_id {
        query.and_where(col(LINK, "blog_id").eq(blog_id));
    }
    if let Some(ref ids) = filter.blog_in {
        query.and_where(in_set(LINK, "blog_id", ids));
    }
    if filter.published_only {
        query.and_where(col(LINK, "published").eq(true));
    }
    add_visibility(&mut query, LINK, filter.visible_at);

    query.order_by((Alias::new(LINK), Alias::new("name")), Order::Asc);
    query.to_string(PostgresQueryBuilder)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::ScopedQuery;

    #[test]
    fn unscoped_post_query_has_no_blog_restriction() {
        let sql = select_posts(&PostFilter::new().site("example.com"));
        assert!(sql.contains(r#""blog_post"."site_domain" = 'example.com'"#), "{sql}");
        assert!(!sql.contains("IN ("), "{sql}");
        assert!(sql.contains("ORDER BY"), "{sql}");
        assert!(sql.contains("DESC"), "{sql}");
    }

    #[test]
    fn scoped_post_query_restricts_blog_ids() {
        let blog = Uuid::now_v7();
        let mut filter = PostFilter::new();
        filter.restrict_to_blogs(&BTreeSet::from([blog]));
        let sql = select_posts(&filter);
        assert!(sql.contains(r#""blog_post"."blog_id" IN ("#), "{sql}");
        assert!(sql.contains(&blog.to_string()), "{sql}");
    }

    #[test]
    fn empty_scope_selects_nothing() {
        let mut filter = CategoryFilter::new().site("example.com");
        filter.restrict_to_blogs(&BTreeSet::new());
        let sql = select_categories(&filter);
        assert!(sql.contains("FALSE"), "{sql}");
    }

    #[test]
    fn categories_ordered_by_order_then_name() {
        let sql = select_categories(&CategoryFilter::new().roots());
        assert!(sql.contains(r#""blog_category"."parent_id" IS NULL"#), "{sql}");
        let order_pos = sql.find("sort_order").unwrap();
        let name_pos = sql.rfind("name").unwrap();
        assert!(order_pos < name_pos, "{sql}");
    }

    #[test]
    fn uncategorized_posts_filter_on_null() {
        let sql = select_posts(&PostFilter::new().category(CategoryMatch::Uncategorized));
        assert!(sql.contains(r#""blog_post"."category_id" IS NULL"#), "{sql}");
    }

    #[test]
    fn tag_filter_is_escaped() {
        let sql = select_posts(&PostFilter::new().tagged_any(vec!["it's".to_string()]));
        assert!(sql.contains("ANY(blog_post.tags)"), "{sql}");
        assert!(sql.contains("'it''s'") || sql.contains(r"E'it\'s'"), "{sql}");
    }

    #[test]
    fn pagination_applies_to_select_not_count() {
        let filter = PostFilter::new().published().paginate(15, 30);
        let select = select_posts(&filter);
        assert!(select.contains("LIMIT 15"), "{select}");
        assert!(select.contains("OFFSET 30"), "{select}");

        let count = count_posts(&filter);
        assert!(count.contains("COUNT(*)"), "{count}");
        assert!(!count.contains("LIMIT"), "{count}");
    }

    #[test]
    fn visibility_adds_publish_window() {
        let sql = select_links(&LinkFilter::new().visible_at(chrono::Utc::now()));
        assert!(sql.contains(r#""blog_link"."published" = TRUE"#), "{sql}");
        assert!(sql.contains(r#""blog_link"."date_available" <="#), "{sql}");
    }

    #[test]
    fn published_only_has_no_date_window() {
        let sql = select_categories(&CategoryFilter::new().in_menu().published());
        assert!(sql.contains(r#""blog_category"."published" = TRUE"#), "{sql}");
        assert!(!sql.contains("date_available"), "{sql}");
    }
}
