use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::applications::status::ApplicationStatus;
use crate::models::de::opt_flexible_datetime;
use crate::models::job::{Department, JobStatus};
use crate::models::UserRef;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone: String,
}

impl PersonalInfo {
    pub fn normalized(mut self) -> Self {
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.phone = self.phone.trim().to_string();
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfessionalInfo {
    #[validate(length(min = 1, message = "Current position is required"))]
    pub current_position: String,
    /// Years of experience.
    #[validate(range(min = 0.0, message = "Years of experience cannot be negative"))]
    pub experience: f64,
    #[validate(range(min = 0.0, message = "Expected salary cannot be negative"))]
    pub expected_salary: Option<f64>,
    #[serde(deserialize_with = "opt_flexible_datetime")]
    pub available_start_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Links {
    pub linkedin: Option<String>,
    pub portfolio: Option<String>,
    pub github: Option<String>,
}

/// Stored upload referenced by an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    pub filename: String,
    pub original_name: String,
    /// Public URL path under `/uploads/documents/`.
    pub path: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Documents {
    pub cv: Option<DocumentRef>,
    pub cover_letter: Option<DocumentRef>,
}

/// The slice of a job embedded in application listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: Uuid,
    pub title: String,
    pub department: Department,
    pub location: String,
    pub status: JobStatus,
    pub application_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub applicant_id: Uuid,
    pub job: Option<Json<JobSummary>>,
    pub applicant: Option<Json<UserRef>>,
    pub personal_info: Json<PersonalInfo>,
    pub professional_info: Json<ProfessionalInfo>,
    pub links: Json<Links>,
    pub documents: Json<Documents>,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Json<UserRef>>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personal_info_normalization() {
        let info = PersonalInfo {
            first_name: " Ada ".into(),
            last_name: "Lovelace".into(),
            email: " Ada@Example.COM ".into(),
            phone: "+44 20 0000".into(),
        }
        .normalized();
        assert_eq!(info.email, "ada@example.com");
        assert_eq!(info.full_name(), "Ada Lovelace");
    }

    #[test]
    fn test_professional_info_accepts_date_only() {
        let info: ProfessionalInfo = serde_json::from_str(
            r#"{"currentPosition": "Engineer", "experience": 4, "availableStartDate": "2031-03-01"}"#,
        )
        .unwrap();
        assert_eq!(info.experience, 4.0);
        assert!(info.available_start_date.is_some());
        assert!(info.expected_salary.is_none());
    }

    #[test]
    fn test_job_summary_from_json_object() {
        let raw = serde_json::json!({
            "id": Uuid::nil(),
            "title": "Backend Engineer",
            "department": "backend",
            "location": "Lagos",
            "status": "active",
            "applicationDeadline": "2031-01-01T00:00:00+00:00"
        });
        let job: JobSummary = serde_json::from_value(raw).unwrap();
        assert_eq!(job.department, Department::Backend);
        assert_eq!(job.status, JobStatus::Active);
    }
}
