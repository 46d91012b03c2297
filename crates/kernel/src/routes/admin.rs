//! Scoped editing API under `/admin/blogs`.
//!
//! Every handler takes an [`Editor`], so requests without a valid API token
//! are rejected with 401. Listings are restricted to the request's site and
//! to the editor's blogs; writes outside the editor's blogs are 403.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{BlogError, BlogResult};
use crate::models::{
    Blog, BlogLink, BlogPost, BlogType, Category, CreateBlog, CreateCategory, CreateLink,
    CreatePost, MediaKind, Principal, UpdateBlog, UpdateCategory, UpdateLink, UpdatePost,
};
use crate::routes::helpers::{Editor, SiteDomain};
use crate::services::BlogChoice;
use crate::state::AppState;
use crate::store::{BlogFilter, CategoryFilter, CategoryMatch, LinkFilter, PostFilter};

#[derive(Debug, Default, Deserialize)]
struct BlogListQuery {
    #[serde(rename = "type")]
    blog_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CategoryListQuery {
    blog: Option<Uuid>,
    parent: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
struct PostListQuery {
    blog: Option<Uuid>,
    category: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
struct LinkListQuery {
    blog: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct ParentsQuery {
    blog: Uuid,
}

#[derive(Debug, Deserialize)]
struct RelateRequest {
    related_id: Uuid,
    #[serde(default)]
    order: i32,
}

#[derive(Debug, Deserialize)]
struct RelateChannelRequest {
    channel_id: Uuid,
    #[serde(default)]
    order: i32,
}

#[derive(Debug, Deserialize)]
struct AttachMediaRequest {
    media_id: Uuid,
    kind: MediaKind,
}

// =============================================================================
// Blogs
// =============================================================================

/// GET /admin/blogs
async fn list_blogs(
    State(state): State<AppState>,
    editor: Editor,
    site: SiteDomain,
    Query(query): Query<BlogListQuery>,
) -> BlogResult<Json<Vec<Blog>>> {
    let mut filter = BlogFilter::new().site(site.0);
    if let Some(t) = query.blog_type.as_deref() {
        let blog_type = BlogType::parse(t)
            .ok_or_else(|| BlogError::Validation(format!("unknown blog type '{t}'")))?;
        filter = filter.of_type(blog_type);
    }
    Ok(Json(state.blogs().list(&editor.scope, filter).await?))
}

/// POST /admin/blogs
async fn create_blog(
    State(state): State<AppState>,
    editor: Editor,
    site: SiteDomain,
    Json(input): Json<CreateBlog>,
) -> BlogResult<(StatusCode, Json<Blog>)> {
    let blog = state
        .blogs()
        .create(&editor.scope, site.as_str(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(blog)))
}

/// GET /admin/blogs/{id}
async fn get_blog(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
) -> BlogResult<Json<Blog>> {
    Ok(Json(state.blogs().get(&editor.scope, id).await?))
}

/// PUT /admin/blogs/{id}
async fn update_blog(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateBlog>,
) -> BlogResult<Json<Blog>> {
    Ok(Json(state.blogs().update(&editor.scope, id, input).await?))
}

/// GET /admin/blogs/choices
async fn blog_choices(
    State(state): State<AppState>,
    editor: Editor,
    site: SiteDomain,
) -> BlogResult<Json<Vec<BlogChoice>>> {
    Ok(Json(
        state.blogs().choices(&editor.scope, site.as_str()).await?,
    ))
}

/// GET /admin/blogs/{id}/users
async fn blog_users(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
) -> BlogResult<Json<Vec<Principal>>> {
    Ok(Json(state.blogs().assigned_users(&editor.scope, id).await?))
}

/// GET /admin/blogs/{id}/profile
async fn blog_profile(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
) -> BlogResult<Json<serde_json::Value>> {
    let profile = state.blogs().profile(&editor.scope, id).await?;
    profile.map(Json).ok_or(BlogError::NotFound)
}

/// POST /admin/blogs/{id}/related
async fn relate_blog(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
    Json(body): Json<RelateRequest>,
) -> BlogResult<StatusCode> {
    state
        .blogs()
        .relate_blog(&editor.scope, id, body.related_id, body.order)
        .await?;
    Ok(StatusCode::CREATED)
}

/// POST /admin/blogs/{id}/channels
async fn relate_channel(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
    Json(body): Json<RelateChannelRequest>,
) -> BlogResult<StatusCode> {
    state
        .blogs()
        .relate_channel(&editor.scope, id, body.channel_id, body.order)
        .await?;
    Ok(StatusCode::CREATED)
}

// =============================================================================
// Categories
// =============================================================================

/// GET /admin/blogs/categories
async fn list_categories(
    State(state): State<AppState>,
    editor: Editor,
    site: SiteDomain,
    Query(query): Query<CategoryListQuery>,
) -> BlogResult<Json<Vec<Category>>> {
    let mut filter = CategoryFilter::new().site(site.0);
    if let Some(blog_id) = query.blog {
        filter = filter.blog(blog_id);
    }
    if let Some(parent_id) = query.parent {
        filter = filter.children_of(parent_id);
    }
    Ok(Json(state.tree().list(&editor.scope, filter).await?))
}

/// POST /admin/blogs/categories
async fn create_category(
    State(state): State<AppState>,
    editor: Editor,
    Json(input): Json<CreateCategory>,
) -> BlogResult<(StatusCode, Json<Category>)> {
    let category = state.tree().create(&editor.scope, input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /admin/blogs/categories/parents?blog={id}
async fn category_parents(
    State(state): State<AppState>,
    editor: Editor,
    Query(query): Query<ParentsQuery>,
) -> BlogResult<Json<Vec<Category>>> {
    Ok(Json(
        state
            .tree()
            .parent_choices(&editor.scope, query.blog)
            .await?,
    ))
}

/// GET /admin/blogs/categories/{id}
async fn get_category(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
) -> BlogResult<Json<Category>> {
    Ok(Json(state.tree().get(&editor.scope, id).await?))
}

/// PUT /admin/blogs/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateCategory>,
) -> BlogResult<Json<Category>> {
    Ok(Json(state.tree().update(&editor.scope, id, input).await?))
}

/// DELETE /admin/blogs/categories/{id}
async fn delete_category(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
) -> BlogResult<StatusCode> {
    state.tree().delete(&editor.scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Posts
// =============================================================================

/// GET /admin/blogs/posts
async fn list_posts(
    State(state): State<AppState>,
    editor: Editor,
    site: SiteDomain,
    Query(query): Query<PostListQuery>,
) -> BlogResult<Json<Vec<BlogPost>>> {
    let mut filter = PostFilter::new().site(site.0);
    if let Some(blog_id) = query.blog {
        filter = filter.blog(blog_id);
    }
    if let Some(category_id) = query.category {
        filter = filter.category(CategoryMatch::Id(category_id));
    }
    Ok(Json(state.posts().list(&editor.scope, filter).await?))
}

/// POST /admin/blogs/posts
async fn create_post(
    State(state): State<AppState>,
    editor: Editor,
    Json(input): Json<CreatePost>,
) -> BlogResult<(StatusCode, Json<BlogPost>)> {
    let post = state.posts().create(&editor.scope, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /admin/blogs/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
) -> BlogResult<Json<BlogPost>> {
    Ok(Json(state.posts().get(&editor.scope, id).await?))
}

/// PUT /admin/blogs/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePost>,
) -> BlogResult<Json<BlogPost>> {
    Ok(Json(state.posts().update(&editor.scope, id, input).await?))
}

/// DELETE /admin/blogs/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
) -> BlogResult<StatusCode> {
    state.posts().delete(&editor.scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/blogs/posts/{id}/related
async fn relate_post(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
    Json(body): Json<RelateRequest>,
) -> BlogResult<StatusCode> {
    state
        .posts()
        .relate(&editor.scope, id, body.related_id, body.order)
        .await?;
    Ok(StatusCode::CREATED)
}

/// POST /admin/blogs/posts/{id}/media
async fn attach_media(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
    Json(body): Json<AttachMediaRequest>,
) -> BlogResult<StatusCode> {
    state
        .posts()
        .attach_media(&editor.scope, id, body.media_id, body.kind)
        .await?;
    Ok(StatusCode::CREATED)
}

// =============================================================================
// Links
// =============================================================================

/// GET /admin/blogs/links
async fn list_links(
    State(state): State<AppState>,
    editor: Editor,
    site: SiteDomain,
    Query(query): Query<LinkListQuery>,
) -> BlogResult<Json<Vec<BlogLink>>> {
    let mut filter = LinkFilter::new().site(site.0);
    if let Some(blog_id) = query.blog {
        filter = filter.blog(blog_id);
    }
    Ok(Json(state.blogs().list_links(&editor.scope, filter).await?))
}

/// POST /admin/blogs/links
async fn create_link(
    State(state): State<AppState>,
    editor: Editor,
    Json(input): Json<CreateLink>,
) -> BlogResult<(StatusCode, Json<BlogLink>)> {
    let link = state.blogs().create_link(&editor.scope, input).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// PUT /admin/blogs/links/{id}
async fn update_link(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateLink>,
) -> BlogResult<Json<BlogLink>> {
    Ok(Json(
        state.blogs().update_link(&editor.scope, id, input).await?,
    ))
}

/// DELETE /admin/blogs/links/{id}
async fn delete_link(
    State(state): State<AppState>,
    editor: Editor,
    Path(id): Path<Uuid>,
) -> BlogResult<StatusCode> {
    state.blogs().delete_link(&editor.scope, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/blogs", get(list_blogs).post(create_blog))
        .route("/admin/blogs/choices", get(blog_choices))
        .route("/admin/blogs/{id}", get(get_blog).put(update_blog))
        .route("/admin/blogs/{id}/users", get(blog_users))
        .route("/admin/blogs/{id}/profile", get(blog_profile))
        .route("/admin/blogs/{id}/related", post(relate_blog))
        .route("/admin/blogs/{id}/channels", post(relate_channel))
        .route(
            "/admin/blogs/categories",
            get(list_categories).post(create_category),
        )
        .route("/admin/blogs/categories/parents", get(category_parents))
        .route(
            "/admin/blogs/categories/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .route("/admin/blogs/posts", get(list_posts).post(create_post))
        .route(
            "/admin/blogs/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/admin/blogs/posts/{id}/related", post(relate_post))
        .route("/admin/blogs/posts/{id}/media", post(attach_media))
        .route("/admin/blogs/links", get(list_links).post(create_link))
        .route(
            "/admin/blogs/links/{id}",
            axum::routing::put(update_link).delete(delete_link),
        )
}
