use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::applications::form::{StatusUpdate, Submission};
use crate::applications::repository::{self, ApplicationStats, NewApplication};
use crate::applications::status::{check_transition, ApplicationStatus};
use crate::auth::extractors::{AdminUser, AuthUser};
use crate::errors::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::jobs::repository as jobs;
use crate::models::application::{Application, DocumentRef, Documents};
use crate::query::{parse_filter, PageParams, Pagination};
use crate::response::{self, ApiJson};
use crate::state::AppState;
use crate::uploads::multipart::MultipartForm;
use crate::uploads::storage::StoredFile;
use crate::uploads::UploadPurpose;
use crate::validation::Problems;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct JobApplicationsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct ApplicationList {
    pub applications: Vec<Application>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct ApplicationPayload {
    pub application: Application,
}

/// Detail view for reviewers, with the statuses the application may move to next.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    pub application: Application,
    pub next_statuses: Vec<ApplicationStatus>,
}

#[derive(Serialize)]
pub struct StatsPayload {
    pub stats: ApplicationStats,
}

fn document_ref(stored: StoredFile) -> DocumentRef {
    DocumentRef {
        filename: stored.filename,
        original_name: stored.original_name,
        path: stored.url,
        size: stored.size,
        uploaded_at: Utc::now(),
    }
}

/// POST /api/applications
pub async fn submit_application(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, ApiJson<ApplicationPayload>), AppError> {
    let form = MultipartForm::collect(
        &mut multipart,
        &[UploadPurpose::Cv, UploadPurpose::CoverLetter],
        &state.config.upload_limits,
    )
    .await?;
    let submission = Submission::from_form(form)?;

    let job = jobs::find_by_id(&state.db, submission.job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".into()))?;
    if !job.is_accepting_applications(Utc::now()) {
        return Err(AppError::JobClosed);
    }
    if repository::already_applied(&state.db, job.id, user.id).await? {
        return Err(AppError::Duplicate("You have already applied for this job".into()));
    }

    let cv = state.storage.save(&submission.cv, Some(user.id)).await?;
    let cover_letter = match &submission.cover_letter {
        Some(file) => match state.storage.save(file, Some(user.id)).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                state.storage.remove_best_effort(&cv.url, UploadPurpose::Cv, user.id).await;
                return Err(e.into());
            }
        },
        None => None,
    };
    let saved: Vec<(String, UploadPurpose)> = std::iter::once((cv.url.clone(), UploadPurpose::Cv))
        .chain(cover_letter.as_ref().map(|f| (f.url.clone(), UploadPurpose::CoverLetter)))
        .collect();

    let new = NewApplication {
        job_id: job.id,
        applicant_id: user.id,
        personal_info: submission.personal_info,
        professional_info: submission.professional_info,
        links: submission.links,
        documents: Documents {
            cv: Some(document_ref(cv)),
            cover_letter: cover_letter.map(document_ref),
        },
        message: submission.message,
    };

    match repository::submit(&state.db, new).await {
        Ok(application) => Ok((
            StatusCode::CREATED,
            response::ok_with_message(
                "Application submitted successfully",
                ApplicationPayload { application },
            ),
        )),
        Err(e) => {
            warn!(user_id = %user.id, job_id = %job.id, "Application not stored, removing its uploads");
            for (url, purpose) in &saved {
                state.storage.remove_best_effort(url, *purpose, user.id).await;
            }
            Err(e)
        }
    }
}

/// GET /api/applications/my
pub async fn my_applications(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    QueryParams(q): QueryParams<PageQuery>,
) -> Result<ApiJson<ApplicationList>, AppError> {
    let page = PageParams::new(q.page, q.limit);
    let (applications, total) = repository::list_for_applicant(&state.db, user.id, page).await?;
    Ok(response::ok(ApplicationList {
        applications,
        pagination: Pagination::new(page, total),
    }))
}

/// GET /api/applications/job/:jobId
pub async fn job_applications(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(job_id): PathParam<Uuid>,
    QueryParams(q): QueryParams<JobApplicationsQuery>,
) -> Result<ApiJson<ApplicationList>, AppError> {
    let status = parse_filter(&q.status, "status")?;
    let page = PageParams::new(q.page, q.limit);
    let (applications, total) = repository::list_for_job(&state.db, job_id, status, page).await?;
    Ok(response::ok(ApplicationList {
        applications,
        pagination: Pagination::new(page, total),
    }))
}

/// GET /api/applications/:id
pub async fn get_application(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<ApiJson<ApplicationDetail>, AppError> {
    let application = repository::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".into()))?;
    let next_statuses = application.status.next_statuses();
    Ok(response::ok(ApplicationDetail {
        application,
        next_statuses,
    }))
}

/// PUT /api/applications/:id/status
pub async fn update_application_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(update): JsonBody<StatusUpdate>,
) -> Result<ApiJson<ApplicationPayload>, AppError> {
    let mut problems = Problems::new();
    problems.check(&update);
    problems.into_result()?;

    let not_found = || AppError::NotFound("Application not found".into());
    let current = repository::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
    check_transition(current.status, update.status)?;

    let notes = update.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let application = match repository::set_status(
        &state.db,
        id,
        current.status,
        update.status,
        admin.id,
        notes,
    )
    .await?
    {
        Some(application) => application,
        None => {
            // Someone else moved it in the meantime; judge the request against the new state.
            let latest = repository::find_by_id(&state.db, id).await?.ok_or_else(not_found)?;
            return Err(AppError::InvalidTransition {
                from: latest.status,
                to: update.status,
            });
        }
    };

    info!(
        application_id = %id,
        admin_id = %admin.id,
        from = %current.status,
        to = %update.status,
        "Application status updated"
    );
    Ok(response::ok_with_message(
        "Application status updated successfully",
        ApplicationPayload { application },
    ))
}

/// GET /api/applications/stats/overview
pub async fn application_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<ApiJson<StatsPayload>, AppError> {
    let stats = repository::stats(&state.db).await?;
    Ok(response::ok(StatsPayload { stats }))
}
