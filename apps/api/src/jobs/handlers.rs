use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::extractors::AdminUser;
use crate::errors::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::jobs::input::{JobFields, JobInput};
use crate::jobs::repository::{self, JobFilter, JobStats};
use crate::models::job::JobResponse;
use crate::query::{parse_bool_filter, parse_filter, search_pattern, PageParams, Pagination};
use crate::response::{self, ApiJson, Empty};
use crate::slug::creation_slug;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PublicJobQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub department: Option<String>,
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    pub remote: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminJobQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub department: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct JobList {
    pub jobs: Vec<JobResponse>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct JobPayload {
    pub job: JobResponse,
}

#[derive(Serialize)]
pub struct StatsPayload {
    pub stats: JobStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPayload {
    pub contact_email: String,
}

async fn respond_with_list(
    state: &AppState,
    filter: JobFilter,
    page: PageParams,
) -> Result<ApiJson<JobList>, AppError> {
    let (jobs, total) = repository::list(&state.db, &filter, page).await?;
    Ok(response::ok(JobList {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        pagination: Pagination::new(page, total),
    }))
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<PublicJobQuery>,
) -> Result<ApiJson<JobList>, AppError> {
    let filter = JobFilter {
        open_only: true,
        department: parse_filter(&q.department, "department")?,
        job_type: parse_filter(&q.job_type, "type")?,
        remote: parse_bool_filter(&q.remote, "remote")?,
        search: search_pattern(&q.search),
        ..JobFilter::default()
    };
    respond_with_list(&state, filter, PageParams::new(q.page, q.limit)).await
}

/// GET /api/jobs/admin
pub async fn list_admin_jobs(
    State(state): State<AppState>,
    _admin: AdminUser,
    QueryParams(q): QueryParams<AdminJobQuery>,
) -> Result<ApiJson<JobList>, AppError> {
    let filter = JobFilter {
        status: parse_filter(&q.status, "status")?,
        department: parse_filter(&q.department, "department")?,
        search: search_pattern(&q.search),
        ..JobFilter::default()
    };
    respond_with_list(&state, filter, PageParams::new(q.page, q.limit)).await
}

/// GET /api/jobs/stats
pub async fn job_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<ApiJson<StatsPayload>, AppError> {
    let stats = repository::stats(&state.db).await?;
    Ok(response::ok(StatsPayload { stats }))
}

/// GET /api/jobs/:slug
pub async fn get_job(
    State(state): State<AppState>,
    PathParam(slug): PathParam<String>,
) -> Result<ApiJson<JobPayload>, AppError> {
    let job = repository::view_open_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Job not found or no longer accepting applications".into())
        })?;
    Ok(response::ok(JobPayload { job: job.into() }))
}

/// POST /api/jobs
pub async fn create_job(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(input): JsonBody<JobInput>,
) -> Result<(StatusCode, ApiJson<JobPayload>), AppError> {
    let mut fields = JobFields::default();
    input.apply(&mut fields);
    let job = fields.validate()?;

    let slug = creation_slug(&job.title, Utc::now());
    let job = repository::create(&state.db, &job, &slug, Some(admin.id)).await?;

    info!(job_id = %job.id, slug = %job.slug, admin_id = %admin.id, "Job posting created");
    Ok((
        StatusCode::CREATED,
        response::ok_with_message("Job posting created successfully", JobPayload { job: job.into() }),
    ))
}

/// PUT /api/jobs/:id
pub async fn update_job(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(input): JsonBody<JobInput>,
) -> Result<ApiJson<JobPayload>, AppError> {
    let existing = repository::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".into()))?;

    let mut fields = JobFields::from(&existing);
    input.apply(&mut fields);
    let job = fields.validate()?;

    let job = repository::update(&state.db, id, &job)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".into()))?;

    info!(job_id = %id, admin_id = %admin.id, status = %job.status, "Job posting updated");
    Ok(response::ok_with_message(
        "Job posting updated successfully",
        JobPayload { job: job.into() },
    ))
}

/// DELETE /api/jobs/:id
pub async fn delete_job(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<ApiJson<Empty>, AppError> {
    if !repository::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Job not found".into()));
    }
    info!(job_id = %id, admin_id = %admin.id, "Job posting deleted");
    Ok(response::message("Job posting deleted successfully"))
}

/// POST /api/jobs/:id/apply
///
/// Counts an application made outside the site (the candidate gets the contact
/// email and writes in directly).
pub async fn apply_to_job(
    State(state): State<AppState>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ApiJson<ApplyPayload>, AppError> {
    let Some(contact_email) = repository::count_application(&state.db, id).await? else {
        return Err(repository::closed_or_missing(&state.db, id).await);
    };
    info!(job_id = %id, "Application counted");
    Ok(response::ok_with_message(
        "Application submitted successfully",
        ApplyPayload { contact_email },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_query_reads_type_param() {
        let uri: axum::http::Uri = "/api/jobs?type=full-time&remote=true&page=2".parse().unwrap();
        let axum::extract::Query(q) = axum::extract::Query::<PublicJobQuery>::try_from_uri(&uri).unwrap();
        assert_eq!(q.job_type.as_deref(), Some("full-time"));
        assert_eq!(q.page, Some(2));
    }
}
