use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::AppError;
use crate::jobs::input::ValidJob;
use crate::models::job::{Department, Job, JobStatus, JobType};
use crate::query::PageParams;

/// Column list for [`Job`], read from a row source aliased `j` joined to its poster `u`.
const JOB_COLUMNS: &str = "j.id, j.title, j.description, j.requirements, j.responsibilities, \
     j.skills, j.benefits, j.department, j.job_type, j.location, j.remote, j.experience, j.salary, \
     j.application_deadline, j.contact_email, \
     CASE WHEN u.id IS NULL THEN NULL \
          ELSE json_build_object('id', u.id, 'username', u.username, 'email', u.email) END AS posted_by, \
     j.status, j.applications, j.views, j.slug, j.created_at, j.updated_at";

/// Only active postings whose deadline is still ahead.
const OPEN_CONDITION: &str = "status = 'active' AND application_deadline > now()";

fn select_from(source: &str) -> String {
    format!("SELECT {JOB_COLUMNS} FROM {source} j LEFT JOIN users u ON u.id = j.posted_by")
}

#[derive(Debug, Default)]
pub struct JobFilter {
    /// Restrict to postings open for applications.
    pub open_only: bool,
    pub status: Option<JobStatus>,
    pub department: Option<Department>,
    pub job_type: Option<JobType>,
    pub remote: Option<bool>,
    /// Escaped `ILIKE` pattern matched against title, description and skills.
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: i64,
    pub active: i64,
    pub draft: i64,
    pub closed: i64,
    pub paused: i64,
    pub total_applications: i64,
    pub total_views: i64,
    pub departments: BTreeMap<String, i64>,
    pub types: BTreeMap<String, i64>,
}

#[derive(sqlx::FromRow)]
struct JobTotals {
    total: i64,
    active: i64,
    draft: i64,
    closed: i64,
    paused: i64,
    total_applications: i64,
    total_views: i64,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
    qb.push(" WHERE TRUE");
    if filter.open_only {
        qb.push(" AND j.status = 'active' AND j.application_deadline > now()");
    }
    if let Some(status) = filter.status {
        qb.push(" AND j.status = ").push_bind(status.as_str());
    }
    if let Some(department) = filter.department {
        qb.push(" AND j.department = ").push_bind(department.as_str());
    }
    if let Some(job_type) = filter.job_type {
        qb.push(" AND j.job_type = ").push_bind(job_type.as_str());
    }
    if let Some(remote) = filter.remote {
        qb.push(" AND j.remote = ").push_bind(remote);
    }
    if let Some(pattern) = &filter.search {
        qb.push(" AND (j.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR j.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR EXISTS (SELECT 1 FROM unnest(j.skills) AS s(skill) WHERE s.skill ILIKE ")
            .push_bind(pattern.clone())
            .push("))");
    }
}

/// Newest postings first.
pub async fn list(
    pool: &PgPool,
    filter: &JobFilter,
    page: PageParams,
) -> Result<(Vec<Job>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM jobs j");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::new(select_from("jobs"));
    push_filters(&mut select, filter);
    select
        .push(" ORDER BY j.created_at DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let jobs = select.build_query_as::<Job>().fetch_all(pool).await?;

    Ok((jobs, total))
}

pub async fn stats(pool: &PgPool) -> Result<JobStats, sqlx::Error> {
    let totals: JobTotals = sqlx::query_as(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE status = 'active') AS active, \
                COUNT(*) FILTER (WHERE status = 'draft') AS draft, \
                COUNT(*) FILTER (WHERE status = 'closed') AS closed, \
                COUNT(*) FILTER (WHERE status = 'paused') AS paused, \
                COALESCE(SUM(applications), 0)::bigint AS total_applications, \
                COALESCE(SUM(views), 0)::bigint AS total_views \
         FROM jobs",
    )
    .fetch_one(pool)
    .await?;

    let departments: Vec<(String, i64)> =
        sqlx::query_as("SELECT department, COUNT(*) FROM jobs GROUP BY department")
            .fetch_all(pool)
            .await?;
    let types: Vec<(String, i64)> =
        sqlx::query_as("SELECT job_type, COUNT(*) FROM jobs GROUP BY job_type")
            .fetch_all(pool)
            .await?;

    Ok(JobStats {
        total: totals.total,
        active: totals.active,
        draft: totals.draft,
        closed: totals.closed,
        paused: totals.paused,
        total_applications: totals.total_applications,
        total_views: totals.total_views,
        departments: departments.into_iter().collect(),
        types: types.into_iter().collect(),
    })
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    sqlx::query_as(&format!("{} WHERE j.id = $1", select_from("jobs")))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Returns an open posting and counts the view in the same statement.
pub async fn view_open_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Job>, sqlx::Error> {
    let sql = format!(
        "WITH viewed AS (UPDATE jobs SET views = views + 1 \
                         WHERE slug = $1 AND {OPEN_CONDITION} RETURNING *) {}",
        select_from("viewed")
    );
    sqlx::query_as(&sql).bind(slug).fetch_optional(pool).await
}

pub async fn create(
    pool: &PgPool,
    job: &ValidJob,
    slug: &str,
    posted_by: Option<Uuid>,
) -> Result<Job, sqlx::Error> {
    let sql = format!(
        "WITH inserted AS (\
            INSERT INTO jobs (title, description, requirements, responsibilities, skills, benefits, \
                department, job_type, location, remote, experience, salary, application_deadline, \
                contact_email, status, slug, posted_by) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
            RETURNING *) {}",
        select_from("inserted")
    );
    sqlx::query_as(&sql)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.requirements)
        .bind(&job.responsibilities)
        .bind(&job.skills)
        .bind(&job.benefits)
        .bind(job.department.as_str())
        .bind(job.job_type.as_str())
        .bind(&job.location)
        .bind(job.remote)
        .bind(Json(job.experience))
        .bind(Json(&job.salary))
        .bind(job.application_deadline)
        .bind(&job.contact_email)
        .bind(job.status.as_str())
        .bind(slug)
        .bind(posted_by)
        .fetch_one(pool)
        .await
}

/// Rewrites every editable column. The slug is left alone.
pub async fn update(pool: &PgPool, id: Uuid, job: &ValidJob) -> Result<Option<Job>, sqlx::Error> {
    let sql = format!(
        "WITH updated AS (\
            UPDATE jobs SET title = $2, description = $3, requirements = $4, responsibilities = $5, \
                skills = $6, benefits = $7, department = $8, job_type = $9, location = $10, \
                remote = $11, experience = $12, salary = $13, application_deadline = $14, \
                contact_email = $15, status = $16, updated_at = now() \
            WHERE id = $1 RETURNING *) {}",
        select_from("updated")
    );
    sqlx::query_as(&sql)
        .bind(id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.requirements)
        .bind(&job.responsibilities)
        .bind(&job.skills)
        .bind(&job.benefits)
        .bind(job.department.as_str())
        .bind(job.job_type.as_str())
        .bind(&job.location)
        .bind(job.remote)
        .bind(Json(job.experience))
        .bind(Json(&job.salary))
        .bind(job.application_deadline)
        .bind(&job.contact_email)
        .bind(job.status.as_str())
        .fetch_optional(pool)
        .await
}

/// Deletes the posting; its applications go with it.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Counts one application against an open posting and returns its contact email.
///
/// `None` means the job is missing or no longer open; see [`closed_or_missing`].
pub async fn count_application<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(&format!(
        "UPDATE jobs SET applications = applications + 1 \
         WHERE id = $1 AND {OPEN_CONDITION} RETURNING contact_email"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Tells a missing job apart from one that stopped accepting applications.
pub async fn closed_or_missing<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> AppError {
    let exists: Result<bool, sqlx::Error> =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM jobs WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await;
    match exists {
        Ok(true) => AppError::JobClosed,
        Ok(false) => AppError::NotFound("Job not found".into()),
        Err(e) => AppError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::{ExperienceRange, SalaryRange};
    use chrono::{Duration, Utc};

    fn posting(status: JobStatus, days_left: i64) -> ValidJob {
        ValidJob {
            title: "Platform Engineer".into(),
            description: "Keep the lights on".into(),
            requirements: vec!["Linux".into()],
            responsibilities: vec!["On-call".into()],
            skills: vec!["Rust".into(), "Postgres".into()],
            benefits: vec![],
            department: Department::Devops,
            job_type: JobType::FullTime,
            location: "Remote".into(),
            remote: true,
            experience: ExperienceRange { min: 2, max: 5 },
            salary: SalaryRange::default(),
            application_deadline: Utc::now() + Duration::days(days_left),
            contact_email: "jobs@example.com".into(),
            status,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_views_are_all_counted(pool: PgPool) {
        let job = create(&pool, &posting(JobStatus::Active, 7), "platform-engineer-1", None)
            .await
            .unwrap();

        let tasks: Vec<_> = (0..25)
            .map(|_| {
                let pool = pool.clone();
                let slug = job.slug.clone();
                tokio::spawn(async move { view_open_by_slug(&pool, &slug).await.unwrap() })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }

        let after = find_by_id(&pool, job.id).await.unwrap().unwrap();
        assert_eq!(after.views, 25);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_past_deadline_is_hidden_and_closed(pool: PgPool) {
        let open = create(&pool, &posting(JobStatus::Active, 7), "open-1", None)
            .await
            .unwrap();
        let expired = create(&pool, &posting(JobStatus::Active, -1), "expired-1", None)
            .await
            .unwrap();
        create(&pool, &posting(JobStatus::Draft, 7), "draft-1", None)
            .await
            .unwrap();

        let filter = JobFilter {
            open_only: true,
            ..JobFilter::default()
        };
        let (jobs, total) = list(&pool, &filter, PageParams::new(None, None)).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(jobs[0].id, open.id);

        assert!(view_open_by_slug(&pool, &expired.slug).await.unwrap().is_none());
        assert!(count_application(&pool, expired.id).await.unwrap().is_none());
        assert!(matches!(closed_or_missing(&pool, expired.id).await, AppError::JobClosed));
        assert!(matches!(
            closed_or_missing(&pool, Uuid::new_v4()).await,
            AppError::NotFound(_)
        ));

        let email = count_application(&pool, open.id).await.unwrap();
        assert_eq!(email.as_deref(), Some("jobs@example.com"));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_search_matches_skills_literally(pool: PgPool) {
        create(&pool, &posting(JobStatus::Active, 7), "p-1", None)
            .await
            .unwrap();
        let page = PageParams::new(None, None);

        let filter = JobFilter {
            search: crate::query::search_pattern(&Some("postgres".into())),
            ..JobFilter::default()
        };
        assert_eq!(list(&pool, &filter, page).await.unwrap().1, 1);

        let filter = JobFilter {
            search: crate::query::search_pattern(&Some("%".into())),
            ..JobFilter::default()
        };
        assert_eq!(list(&pool, &filter, page).await.unwrap().1, 0);

        let stats = stats(&pool).await.unwrap();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.departments.get("devops"), Some(&1));
    }
}
