//! Job create/update payloads.
//!
//! Both endpoints take the same partial document. Creation starts from empty
//! [`JobFields`]; an update starts from the stored job. The merged result is then
//! validated as a whole, so an update can never leave a job in a state creation
//! would refuse.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::de::{opt_flexible_datetime, opt_one_or_many};
use crate::models::job::{
    Department, ExperienceRange, Job, JobStatus, JobType, SalaryRange,
};
use crate::validation::{is_valid_email, Problems};

const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ExperienceInput {
    pub min: Option<i32>,
    pub max: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "opt_one_or_many")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_one_or_many")]
    pub responsibilities: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_one_or_many")]
    pub skills: Option<Vec<String>>,
    #[serde(default, deserialize_with = "opt_one_or_many")]
    pub benefits: Option<Vec<String>>,
    pub department: Option<Department>,
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub experience: Option<ExperienceInput>,
    pub salary: Option<SalaryRange>,
    #[serde(default, deserialize_with = "opt_flexible_datetime")]
    pub application_deadline: Option<DateTime<Utc>>,
    pub contact_email: Option<String>,
    pub status: Option<JobStatus>,
}

/// Every writable column of a job, before it is stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFields {
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub skills: Vec<String>,
    pub benefits: Vec<String>,
    pub department: Option<Department>,
    pub job_type: JobType,
    pub location: String,
    pub remote: bool,
    pub experience_min: Option<i32>,
    pub experience_max: Option<i32>,
    pub salary: SalaryRange,
    pub application_deadline: Option<DateTime<Utc>>,
    pub contact_email: String,
    pub status: JobStatus,
}

/// Validated fields ready for `INSERT`/`UPDATE`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidJob {
    pub title: String,
    pub description: String,
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub skills: Vec<String>,
    pub benefits: Vec<String>,
    pub department: Department,
    pub job_type: JobType,
    pub location: String,
    pub remote: bool,
    pub experience: ExperienceRange,
    pub salary: SalaryRange,
    pub application_deadline: DateTime<Utc>,
    pub contact_email: String,
    pub status: JobStatus,
}

impl From<&Job> for JobFields {
    fn from(job: &Job) -> Self {
        Self {
            title: job.title.clone(),
            description: job.description.clone(),
            requirements: job.requirements.clone(),
            responsibilities: job.responsibilities.clone(),
            skills: job.skills.clone(),
            benefits: job.benefits.clone(),
            department: Some(job.department),
            job_type: job.job_type,
            location: job.location.clone(),
            remote: job.remote,
            experience_min: Some(job.experience.min),
            experience_max: Some(job.experience.max),
            salary: job.salary.0.clone(),
            application_deadline: Some(job.application_deadline),
            contact_email: job.contact_email.clone(),
            status: job.status,
        }
    }
}

impl JobInput {
    /// Overwrites every field present in the payload.
    pub fn apply(self, fields: &mut JobFields) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }

        set(&mut fields.title, self.title.map(|t| t.trim().to_string()));
        set(&mut fields.description, self.description.map(|d| d.trim().to_string()));
        set(&mut fields.requirements, self.requirements);
        set(&mut fields.responsibilities, self.responsibilities);
        set(&mut fields.skills, self.skills);
        set(&mut fields.benefits, self.benefits);
        if self.department.is_some() {
            fields.department = self.department;
        }
        set(&mut fields.job_type, self.job_type);
        set(&mut fields.location, self.location.map(|l| l.trim().to_string()));
        set(&mut fields.remote, self.remote);
        if let Some(exp) = self.experience {
            fields.experience_min = exp.min;
            fields.experience_max = exp.max;
        }
        set(&mut fields.salary, self.salary);
        if self.application_deadline.is_some() {
            fields.application_deadline = self.application_deadline;
        }
        set(
            &mut fields.contact_email,
            self.contact_email.map(|e| e.trim().to_lowercase()),
        );
        set(&mut fields.status, self.status);
    }
}

impl JobFields {
    pub fn validate(self) -> Result<ValidJob, AppError> {
        let mut problems = Problems::new();

        if self.title.is_empty() {
            problems.push("Job title is required");
        } else if self.title.chars().count() > MAX_TITLE_CHARS {
            problems.push("Title cannot exceed 200 characters");
        }
        if self.description.is_empty() {
            problems.push("Job description is required");
        }
        if self.requirements.is_empty() {
            problems.push("At least one requirement is required");
        }
        if self.responsibilities.is_empty() {
            problems.push("At least one responsibility is required");
        }
        if self.skills.is_empty() {
            problems.push("At least one skill is required");
        }
        if self.department.is_none() {
            problems.push("Department is required");
        }
        if self.location.is_empty() {
            problems.push("Location is required");
        }
        if self.application_deadline.is_none() {
            problems.push("Application deadline is required");
        }
        if self.contact_email.is_empty() {
            problems.push("Contact email is required");
        } else if !is_valid_email(&self.contact_email) {
            problems.push("Please enter a valid email");
        }

        match (self.experience_min, self.experience_max) {
            (Some(min), Some(max)) if min < 0 || max < 0 => {
                problems.push("Experience cannot be negative")
            }
            (Some(min), Some(max)) if min > max => {
                problems.push("Minimum experience cannot exceed maximum experience")
            }
            (Some(_), Some(_)) => {}
            _ => problems.push("Experience range (min and max) is required"),
        }

        let salary = &self.salary;
        if salary.min.is_some_and(|v| v < 0) || salary.max.is_some_and(|v| v < 0) {
            problems.push("Salary cannot be negative");
        }
        if let (Some(min), Some(max)) = (salary.min, salary.max) {
            if min > max {
                problems.push("Minimum salary cannot exceed maximum salary");
            }
        }

        problems.into_result()?;

        let (Some(department), Some(application_deadline), Some(min), Some(max)) = (
            self.department,
            self.application_deadline,
            self.experience_min,
            self.experience_max,
        ) else {
            return Err(AppError::Validation("Incomplete job posting".into()));
        };

        Ok(ValidJob {
            title: self.title,
            description: self.description,
            requirements: self.requirements,
            responsibilities: self.responsibilities,
            skills: self.skills,
            benefits: self.benefits,
            department,
            job_type: self.job_type,
            location: self.location,
            remote: self.remote,
            experience: ExperienceRange { min, max },
            salary: self.salary,
            application_deadline,
            contact_email: self.contact_email,
            status: self.status,
        })
    }
}
