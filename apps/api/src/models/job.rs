use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{text_enum, UserRef};

text_enum! {
    pub enum JobStatus {
        Draft => "draft",
        Active => "active",
        Paused => "paused",
        Closed => "closed",
    }
}

text_enum! {
    pub enum Department {
        Frontend => "frontend",
        Backend => "backend",
        Fullstack => "fullstack",
        Mobile => "mobile",
        Devops => "devops",
        UiUx => "ui-ux",
        Qa => "qa",
        ProjectManagement => "project-management",
    }
}

text_enum! {
    pub enum JobType {
        FullTime => "full-time",
        PartTime => "part-time",
        Contract => "contract",
        Freelance => "freelance",
        Internship => "internship",
    }
}

text_enum! {
    pub enum Currency {
        Usd => "USD",
        Eur => "EUR",
        Gbp => "GBP",
        Ngn => "NGN",
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Draft
    }
}

impl Default for JobType {
    fn default() -> Self {
        JobType::FullTime
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Usd
    }
}

/// Years of experience asked for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperienceRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalaryRange {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub currency: Currency,
}

impl SalaryRange {
    /// Human-readable range shown on job cards, e.g. `85K - 120K USD`.
    pub fn display(&self) -> String {
        let min = self.min.filter(|v| *v > 0);
        let max = self.max.filter(|v| *v > 0);
        let currency = self.currency;
        match (min, max) {
            (Some(lo), Some(hi)) => {
                format!("{} - {} {currency}", compact_amount(lo), compact_amount(hi))
            }
            (Some(lo), None) => format!("From {} {currency}", compact_amount(lo)),
            (None, Some(hi)) => format!("Up to {} {currency}", compact_amount(hi)),
            (None, None) => "Competitive".to_string(),
        }
    }
}

fn compact_amount(amount: i64) -> String {
    if amount >= 1_000_000 {
        format!("{:.1}M", amount as f64 / 1_000_000.0)
    } else if amount >= 1_000 {
        format!("{:.0}K", amount as f64 / 1_000.0)
    } else {
        amount.to_string()
    }
}

/// Open for applications: active and the deadline has not passed.
pub fn accepts_applications(status: JobStatus, deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    status == JobStatus::Active && deadline > now
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub skills: Vec<String>,
    pub benefits: Vec<String>,
    #[sqlx(try_from = "String")]
    pub department: Department,
    #[sqlx(try_from = "String")]
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub location: String,
    pub remote: bool,
    pub experience: Json<ExperienceRange>,
    pub salary: Json<SalaryRange>,
    pub application_deadline: DateTime<Utc>,
    pub contact_email: String,
    pub posted_by: Option<Json<UserRef>>,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub applications: i32,
    pub views: i32,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_accepting_applications(&self, now: DateTime<Utc>) -> bool {
        accepts_applications(self.status, self.application_deadline, now)
    }
}

/// Job as returned by the API, with the derived fields the job board displays.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    #[serde(flatten)]
    pub job: Job,
    pub salary_range: String,
    pub is_accepting_applications: bool,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        let salary_range = job.salary.display();
        let is_accepting_applications = job.is_accepting_applications(Utc::now());
        Self {
            job,
            salary_range,
            is_accepting_applications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_accepting_requires_active_and_future_deadline() {
        let now = Utc::now();
        let future = now + Duration::days(3);
        let past = now - Duration::days(3);

        assert!(accepts_applications(JobStatus::Active, future, now));
        assert!(!accepts_applications(JobStatus::Active, past, now));
        assert!(!accepts_applications(JobStatus::Active, now, now));
        for status in [JobStatus::Draft, JobStatus::Paused, JobStatus::Closed] {
            assert!(!accepts_applications(status, future, now));
        }
    }

    #[test]
    fn test_salary_display() {
        let both = SalaryRange {
            min: Some(85_000),
            max: Some(120_000),
            currency: Currency::Usd,
        };
        assert_eq!(both.display(), "85K - 120K USD");

        let from = SalaryRange {
            min: Some(1_200_000),
            max: None,
            currency: Currency::Ngn,
        };
        assert_eq!(from.display(), "From 1.2M NGN");

        let up_to = SalaryRange {
            min: None,
            max: Some(900),
            currency: Currency::Eur,
        };
        assert_eq!(up_to.display(), "Up to 900 EUR");

        assert_eq!(SalaryRange::default().display(), "Competitive");
    }

    #[test]
    fn test_zero_salary_counts_as_unset() {
        let zero = SalaryRange {
            min: Some(0),
            max: Some(0),
            currency: Currency::Gbp,
        };
        assert_eq!(zero.display(), "Competitive");
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            "project-management".parse::<Department>().unwrap(),
            Department::ProjectManagement
        );
        assert_eq!(JobType::default().as_str(), "full-time");
        assert_eq!(JobStatus::default(), JobStatus::Draft);
        let salary: SalaryRange = serde_json::from_str(r#"{"min": 10}"#).unwrap();
        assert_eq!(salary.currency, Currency::Usd);
    }
}
