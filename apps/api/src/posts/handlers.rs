use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::extractors::AdminUser;
use crate::errors::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::models::post::{resolve_published_at, Post, PostStatus};
use crate::posts::input::{PostFields, PostInput};
use crate::posts::repository::{self, PostFilter, PostOrder, PostStats};
use crate::query::{parse_filter, search_pattern, PageParams, Pagination};
use crate::response::{self, ApiJson, Empty};
use crate::slug::creation_slug;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PublicPostQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminPostQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct PostList {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct PostPayload {
    pub post: Post,
}

#[derive(Serialize)]
pub struct StatsPayload {
    pub stats: PostStats,
}

async fn respond_with_list(
    state: &AppState,
    filter: PostFilter,
    order: PostOrder,
    page: PageParams,
) -> Result<ApiJson<PostList>, AppError> {
    let (posts, total) = repository::list(&state.db, &filter, order, page).await?;
    Ok(response::ok(PostList {
        posts,
        pagination: Pagination::new(page, total),
    }))
}

/// GET /api/posts
pub async fn list_posts(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<PublicPostQuery>,
) -> Result<ApiJson<PostList>, AppError> {
    let filter = PostFilter {
        status: Some(PostStatus::Published),
        category: parse_filter(&q.category, "category")?,
        search: search_pattern(&q.search),
    };
    let page = PageParams::new(q.page, q.limit);
    respond_with_list(&state, filter, PostOrder::Published, page).await
}

/// GET /api/posts/admin
pub async fn list_admin_posts(
    State(state): State<AppState>,
    _admin: AdminUser,
    QueryParams(q): QueryParams<AdminPostQuery>,
) -> Result<ApiJson<PostList>, AppError> {
    let filter = PostFilter {
        status: parse_filter(&q.status, "status")?,
        category: parse_filter(&q.category, "category")?,
        search: search_pattern(&q.search),
    };
    let page = PageParams::new(q.page, q.limit);
    respond_with_list(&state, filter, PostOrder::Created, page).await
}

/// GET /api/posts/stats
pub async fn post_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<ApiJson<StatsPayload>, AppError> {
    let stats = repository::stats(&state.db).await?;
    Ok(response::ok(StatsPayload { stats }))
}

/// GET /api/posts/:slug
pub async fn get_post(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
) -> Result<ApiJson<PostPayload>, AppError> {
    let post = repository::view_published_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".into()))?;
    Ok(response::ok(PostPayload { post }))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(input): JsonBody<PostInput>,
) -> Result<(StatusCode, ApiJson<PostPayload>), AppError> {
    let mut fields = PostFields::default();
    input.apply(&mut fields);
    let fields = fields.validate()?;

    let now = Utc::now();
    let slug = creation_slug(&fields.title, now);
    let published_at = resolve_published_at(None, fields.status, now);
    let post = repository::create(&state.db, &fields, &slug, published_at, admin.id).await?;

    info!(post_id = %post.id, slug = %post.slug, admin_id = %admin.id, "Post created");
    Ok((
        StatusCode::CREATED,
        response::ok_with_message("Post created successfully", PostPayload { post }),
    ))
}

/// PUT /api/posts/:id
pub async fn update_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<PostInput>,
) -> Result<ApiJson<PostPayload>, AppError> {
    let existing = repository::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".into()))?;

    let mut fields = PostFields::from(&existing);
    input.apply(&mut fields);
    let fields = fields.validate()?;

    let published_at = resolve_published_at(existing.published_at, fields.status, Utc::now());
    let post = repository::update(&state.db, id, &fields, published_at)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".into()))?;

    info!(post_id = %id, admin_id = %admin.id, status = %post.status, "Post updated");
    Ok(response::ok_with_message("Post updated successfully", PostPayload { post }))
}

/// DELETE /api/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<ApiJson<Empty>, AppError> {
    if !repository::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Post not found".into()));
    }
    info!(post_id = %id, admin_id = %admin.id, "Post deleted");
    Ok(response::message("Post deleted successfully"))
}
