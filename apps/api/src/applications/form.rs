//! Reading an application out of its multipart submission.
//!
//! The SPA posts `personalInfo`, `professionalInfo` and `links` as JSON strings next to
//! the `cv` and optional `coverLetter` files.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::applications::status::ApplicationStatus;
use crate::errors::AppError;
use crate::models::application::{Links, PersonalInfo, ProfessionalInfo};
use crate::uploads::multipart::MultipartForm;
use crate::uploads::storage::IncomingFile;
use crate::uploads::UploadPurpose;
use crate::validation::{is_valid_email, Problems};

pub const MAX_MESSAGE_CHARS: usize = 1000;

static LINKEDIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(www\.)?linkedin\.com/.*").expect("valid linkedin regex"));
static GITHUB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(www\.)?github\.com/.*").expect("valid github regex"));
static HTTP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.*").expect("valid url regex"));

/// Everything needed to store an application, validated.
#[derive(Debug)]
pub struct Submission {
    pub job_id: Uuid,
    pub personal_info: PersonalInfo,
    pub professional_info: ProfessionalInfo,
    pub links: Links,
    pub message: String,
    pub cv: IncomingFile,
    pub cover_letter: Option<IncomingFile>,
}

/// `PUT /api/applications/:id/status` body.
#[derive(Debug, Deserialize, Validate)]
pub struct StatusUpdate {
    pub status: ApplicationStatus,
    #[validate(length(max = 2000, message = "Admin notes cannot exceed 2000 characters"))]
    pub notes: Option<String>,
}

fn json_field<T: DeserializeOwned>(form: &MultipartForm, name: &str) -> Result<Option<T>, AppError> {
    match form.text(name).map(str::trim).filter(|raw| !raw.is_empty()) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| AppError::Validation(format!("Invalid {name}: {e}"))),
    }
}

/// Empty strings count as "not given".
fn normalize_links(links: Links) -> Links {
    let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Links {
        linkedin: clean(links.linkedin),
        portfolio: clean(links.portfolio),
        github: clean(links.github),
    }
}

fn check_links(links: &Links, problems: &mut Problems) {
    let rules: [(&Option<String>, &Regex, &str); 3] = [
        (&links.linkedin, &LINKEDIN_RE, "Please enter a valid LinkedIn URL"),
        (&links.portfolio, &HTTP_RE, "Please enter a valid portfolio URL"),
        (&links.github, &GITHUB_RE, "Please enter a valid GitHub URL"),
    ];
    for (value, re, message) in rules {
        if let Some(url) = value {
            if !re.is_match(url) {
                problems.push(message);
            }
        }
    }
}

impl Submission {
    pub fn from_form(mut form: MultipartForm) -> Result<Self, AppError> {
        let job_id = form.text("jobId").map(str::trim).filter(|v| !v.is_empty());
        let personal: Option<PersonalInfo> = json_field(&form, "personalInfo")?;
        let professional: Option<ProfessionalInfo> = json_field(&form, "professionalInfo")?;

        let (Some(job_id), Some(personal), Some(professional)) = (job_id, personal, professional)
        else {
            return Err(AppError::Validation(
                "Job ID, personal info, and professional info are required".into(),
            ));
        };
        let job_id = Uuid::parse_str(job_id)
            .map_err(|_| AppError::Validation("Invalid job ID".into()))?;

        let personal_info = personal.normalized();
        let links = normalize_links(json_field::<Links>(&form, "links")?.unwrap_or_default());
        let message = form.text("message").unwrap_or_default().trim().to_string();

        let mut problems = Problems::new();
        problems.check(&personal_info);
        if !personal_info.email.is_empty() && !is_valid_email(&personal_info.email) {
            problems.push("Please enter a valid email");
        }
        problems.check(&professional);
        problems.require(&professional.available_start_date, "Available start date is required");
        check_links(&links, &mut problems);
        if message.chars().count() > MAX_MESSAGE_CHARS {
            problems.push("Message cannot exceed 1000 characters");
        }
        problems.into_result()?;

        let cv = form
            .take_file(UploadPurpose::Cv)
            .ok_or_else(|| AppError::Validation("CV file is required".into()))?;
        let cover_letter = form.take_file(UploadPurpose::CoverLetter);

        Ok(Submission {
            job_id,
            personal_info,
            professional_info: professional,
            links,
            message,
            cv,
            cover_letter,
        })
    }
}
