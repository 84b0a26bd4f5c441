use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::applications::status::ApplicationStatus;
use crate::errors::{is_unique_violation, AppError};
use crate::jobs::repository as jobs;
use crate::models::application::{Application, Documents, Links, PersonalInfo, ProfessionalInfo};
use crate::query::PageParams;

/// Application rows (`a`) with the job summary and the people involved embedded.
const APPLICATION_SELECT: &str = "SELECT a.id, a.job_id, a.applicant_id, \
     CASE WHEN j.id IS NULL THEN NULL ELSE json_build_object(\
        'id', j.id, 'title', j.title, 'department', j.department, 'location', j.location, \
        'status', j.status, 'applicationDeadline', j.application_deadline) END AS job, \
     CASE WHEN ap.id IS NULL THEN NULL \
          ELSE json_build_object('id', ap.id, 'username', ap.username, 'email', ap.email) END AS applicant, \
     a.personal_info, a.professional_info, a.links, a.documents, a.message, a.status, a.admin_notes, \
     CASE WHEN r.id IS NULL THEN NULL \
          ELSE json_build_object('id', r.id, 'username', r.username, 'email', r.email) END AS reviewed_by, \
     a.reviewed_at, a.created_at, a.updated_at \
     FROM job_applications a \
     LEFT JOIN jobs j ON j.id = a.job_id \
     LEFT JOIN users ap ON ap.id = a.applicant_id \
     LEFT JOIN users r ON r.id = a.reviewed_by";

pub struct NewApplication {
    pub job_id: Uuid,
    pub applicant_id: Uuid,
    pub personal_info: PersonalInfo,
    pub professional_info: ProfessionalInfo,
    pub links: Links,
    pub documents: Documents,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub total: i64,
    pub pending: i64,
    pub reviewing: i64,
    pub shortlisted: i64,
    pub interview: i64,
    pub hired: i64,
    pub rejected: i64,
    /// Submitted in the last 30 days.
    pub recent: i64,
    pub status_breakdown: BTreeMap<String, i64>,
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Application>, sqlx::Error> {
    sqlx::query_as(&format!("{APPLICATION_SELECT} WHERE a.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn already_applied(pool: &PgPool, job_id: Uuid, applicant_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM job_applications WHERE job_id = $1 AND applicant_id = $2)",
    )
    .bind(job_id)
    .bind(applicant_id)
    .fetch_one(pool)
    .await
}

/// Uploaded documents of every application by this applicant, read before the
/// account (and its applications with it) is deleted.
pub async fn documents_for_applicant(pool: &PgPool, applicant_id: Uuid) -> Result<Vec<Documents>, sqlx::Error> {
    let rows: Vec<Json<Documents>> =
        sqlx::query_scalar("SELECT documents FROM job_applications WHERE applicant_id = $1")
            .bind(applicant_id)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|Json(documents)| documents).collect())
}

/// Stores the application and counts it against the job in one transaction.
///
/// The job must still be open when the transaction runs; a second application from
/// the same person trips the `(job_id, applicant_id)` unique index.
pub async fn submit(pool: &PgPool, new: NewApplication) -> Result<Application, AppError> {
    let mut tx = pool.begin().await?;

    if jobs::count_application(&mut *tx, new.job_id).await?.is_none() {
        return Err(jobs::closed_or_missing(&mut *tx, new.job_id).await);
    }

    let inserted: Result<Uuid, sqlx::Error> = sqlx::query_scalar(
        "INSERT INTO job_applications \
            (job_id, applicant_id, personal_info, professional_info, links, documents, message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(new.job_id)
    .bind(new.applicant_id)
    .bind(Json(&new.personal_info))
    .bind(Json(&new.professional_info))
    .bind(Json(&new.links))
    .bind(Json(&new.documents))
    .bind(&new.message)
    .fetch_one(&mut *tx)
    .await;

    let id = match inserted {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Duplicate("You have already applied for this job".into()))
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;

    info!(application_id = %id, job_id = %new.job_id, applicant_id = %new.applicant_id, "Application submitted");
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".into()))
}

async fn page_of(
    pool: &PgPool,
    mut count: QueryBuilder<'_, Postgres>,
    mut select: QueryBuilder<'_, Postgres>,
    page: PageParams,
) -> Result<(Vec<Application>, i64), sqlx::Error> {
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;
    select
        .push(" ORDER BY a.created_at DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = select.build_query_as::<Application>().fetch_all(pool).await?;
    Ok((rows, total))
}

pub async fn list_for_applicant(
    pool: &PgPool,
    applicant_id: Uuid,
    page: PageParams,
) -> Result<(Vec<Application>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM job_applications a WHERE a.applicant_id = ");
    count.push_bind(applicant_id);
    let mut select = QueryBuilder::new(format!("{APPLICATION_SELECT} WHERE a.applicant_id = "));
    select.push_bind(applicant_id);
    page_of(pool, count, select, page).await
}

pub async fn list_for_job(
    pool: &PgPool,
    job_id: Uuid,
    status: Option<ApplicationStatus>,
    page: PageParams,
) -> Result<(Vec<Application>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM job_applications a WHERE a.job_id = ");
    count.push_bind(job_id);
    let mut select = QueryBuilder::new(format!("{APPLICATION_SELECT} WHERE a.job_id = "));
    select.push_bind(job_id);
    if let Some(status) = status {
        count.push(" AND a.status = ").push_bind(status.as_str());
        select.push(" AND a.status = ").push_bind(status.as_str());
    }
    page_of(pool, count, select, page).await
}

/// Moves an application on, provided it is still in `from`. Returns `None` when the row
/// is gone or another reviewer changed its status first.
pub async fn set_status(
    pool: &PgPool,
    id: Uuid,
    from: ApplicationStatus,
    to: ApplicationStatus,
    reviewer_id: Uuid,
    notes: Option<&str>,
) -> Result<Option<Application>, sqlx::Error> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        "UPDATE job_applications SET status = $3, reviewed_by = $4, reviewed_at = now(), \
            admin_notes = COALESCE($5, admin_notes), updated_at = now() \
         WHERE id = $1 AND status = $2 RETURNING id",
    )
    .bind(id)
    .bind(from.as_str())
    .bind(to.as_str())
    .bind(reviewer_id)
    .bind(notes)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(id) => find_by_id(pool, id).await,
        None => Ok(None),
    }
}

pub async fn stats(pool: &PgPool) -> Result<ApplicationStats, sqlx::Error> {
    let breakdown: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM job_applications GROUP BY status")
            .fetch_all(pool)
            .await?;
    let recent: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM job_applications WHERE created_at >= now() - interval '30 days'",
    )
    .fetch_one(pool)
    .await?;

    let status_breakdown: BTreeMap<String, i64> = breakdown.into_iter().collect();
    let count = |status: ApplicationStatus| status_breakdown.get(status.as_str()).copied().unwrap_or(0);

    Ok(ApplicationStats {
        total: status_breakdown.values().sum(),
        pending: count(ApplicationStatus::Pending),
        reviewing: count(ApplicationStatus::Reviewing),
        shortlisted: count(ApplicationStatus::Shortlisted),
        interview: count(ApplicationStatus::Interview),
        hired: count(ApplicationStatus::Hired),
        rejected: count(ApplicationStatus::Rejected),
        recent,
        status_breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::input::ValidJob;
    use crate::models::job::{Department, ExperienceRange, JobStatus, JobType, SalaryRange};
    use crate::models::user::{Profile, Role};
    use crate::users::repository::{self as users, NewUser};
    use chrono::{Duration, Utc};

    async fn applicant(pool: &PgPool, name: &'static str) -> Uuid {
        users::create(
            pool,
            NewUser {
                username: name,
                email: &format!("{name}@example.com"),
                password_hash: "x",
                role: Role::User,
                profile: Profile::default(),
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn open_job(pool: &PgPool) -> Uuid {
        let job = ValidJob {
            title: "QA Engineer".into(),
            description: "Break things".into(),
            requirements: vec!["Patience".into()],
            responsibilities: vec!["Testing".into()],
            skills: vec!["Playwright".into()],
            benefits: vec![],
            department: Department::Qa,
            job_type: JobType::FullTime,
            location: "Berlin".into(),
            remote: false,
            experience: ExperienceRange { min: 1, max: 3 },
            salary: SalaryRange::default(),
            application_deadline: Utc::now() + Duration::days(10),
            contact_email: "qa@example.com".into(),
            status: JobStatus::Active,
        };
        jobs::create(pool, &job, "qa-engineer-1", None).await.unwrap().id
    }

    fn application(job_id: Uuid, applicant_id: Uuid) -> NewApplication {
        NewApplication {
            job_id,
            applicant_id,
            personal_info: PersonalInfo {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                phone: "123".into(),
            },
            professional_info: ProfessionalInfo {
                current_position: "Engineer".into(),
                experience: 3.0,
                expected_salary: None,
                available_start_date: Some(Utc::now()),
            },
            links: Links::default(),
            documents: Documents::default(),
            message: String::new(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_second_application_is_a_duplicate(pool: PgPool) {
        let job_id = open_job(&pool).await;
        let user_id = applicant(&pool, "ada").await;

        let first = submit(&pool, application(job_id, user_id)).await.unwrap();
        assert_eq!(first.status, ApplicationStatus::Pending);
        assert_eq!(first.job.as_ref().map(|j| j.title.as_str()), Some("QA Engineer"));

        let err = submit(&pool, application(job_id, user_id)).await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));

        // The rejected attempt rolled back its counter bump.
        let job = jobs::find_by_id(&pool, job_id).await.unwrap().unwrap();
        assert_eq!(job.applications, 1);
        assert!(already_applied(&pool, job_id, user_id).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_status_update_is_guarded_by_current_status(pool: PgPool) {
        let job_id = open_job(&pool).await;
        let user_id = applicant(&pool, "grace").await;
        let reviewer = applicant(&pool, "reviewer").await;
        let app = submit(&pool, application(job_id, user_id)).await.unwrap();

        let moved = set_status(
            &pool,
            app.id,
            ApplicationStatus::Pending,
            ApplicationStatus::Reviewing,
            reviewer,
            Some("Strong CV"),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(moved.status, ApplicationStatus::Reviewing);
        assert_eq!(moved.admin_notes.as_deref(), Some("Strong CV"));
        assert!(moved.reviewed_at.is_some());
        assert_eq!(moved.reviewed_by.as_ref().map(|r| r.id), Some(reviewer));

        // Stale `from` no longer matches.
        let stale = set_status(
            &pool,
            app.id,
            ApplicationStatus::Pending,
            ApplicationStatus::Rejected,
            reviewer,
            None,
        )
        .await
        .unwrap();
        assert!(stale.is_none());

        let stats = stats(&pool).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.reviewing, 1);
        assert_eq!(stats.recent, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_documents_for_applicant(pool: PgPool) {
        let job_id = open_job(&pool).await;
        let user_id = applicant(&pool, "linus").await;
        let other = applicant(&pool, "other").await;

        let mut new = application(job_id, user_id);
        new.documents.cv = Some(crate::models::application::DocumentRef {
            filename: format!("cv-{user_id}-1-2.pdf"),
            original_name: "cv.pdf".into(),
            path: format!("/uploads/documents/cv-{user_id}-1-2.pdf"),
            size: 10,
            uploaded_at: Utc::now(),
        });
        submit(&pool, new).await.unwrap();
        submit(&pool, application(job_id, other)).await.unwrap();

        let documents = documents_for_applicant(&pool, user_id).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents[0].cv.as_ref().map(|d| d.path.clone()),
            Some(format!("/uploads/documents/cv-{user_id}-1-2.pdf"))
        );
        assert!(documents_for_applicant(&pool, Uuid::new_v4()).await.unwrap().is_empty());
    }
}
