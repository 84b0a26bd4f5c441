//! File uploads: which multipart fields accept which files, and how large they may be.

pub mod multipart;
pub mod storage;

use crate::errors::AppError;

pub const DEFAULT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 5;

const DOCUMENT_MIMES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_file_bytes: usize,
    pub max_files: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

impl UploadLimits {
    /// Whole-request ceiling handed to `DefaultBodyLimit`, with room for text fields.
    pub fn request_body_limit(&self) -> usize {
        self.max_file_bytes * self.max_files + 1024 * 1024
    }

    pub fn too_large_message(&self) -> String {
        let mb = self.max_file_bytes as f64 / (1024.0 * 1024.0);
        format!("File size too large. Maximum size is {mb}MB.")
    }
}

/// Directory an upload is written to, also the second segment of its public URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Profiles,
    Documents,
}

impl Folder {
    pub fn as_str(self) -> &'static str {
        match self {
            Folder::Profiles => "profiles",
            Folder::Documents => "documents",
        }
    }
}

/// Multipart file field names and what they may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPurpose {
    ProfileImage,
    CoverImage,
    Cv,
    CoverLetter,
}

impl UploadPurpose {
    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "profileImage" => Some(UploadPurpose::ProfileImage),
            "coverImage" => Some(UploadPurpose::CoverImage),
            "cv" => Some(UploadPurpose::Cv),
            "coverLetter" => Some(UploadPurpose::CoverLetter),
            _ => None,
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            UploadPurpose::ProfileImage => "profileImage",
            UploadPurpose::CoverImage => "coverImage",
            UploadPurpose::Cv => "cv",
            UploadPurpose::CoverLetter => "coverLetter",
        }
    }

    /// Leading segment of generated filenames.
    pub fn prefix(self) -> &'static str {
        match self {
            UploadPurpose::ProfileImage => "profile",
            UploadPurpose::CoverImage => "cover",
            UploadPurpose::Cv => "cv",
            UploadPurpose::CoverLetter => "coverletter",
        }
    }

    pub fn folder(self) -> Folder {
        match self {
            UploadPurpose::ProfileImage | UploadPurpose::CoverImage => Folder::Profiles,
            UploadPurpose::Cv | UploadPurpose::CoverLetter => Folder::Documents,
        }
    }

    pub fn check_mime(self, mime: &str) -> Result<(), AppError> {
        let mime = mime.trim().to_ascii_lowercase();
        match self.folder() {
            Folder::Profiles if mime.starts_with("image/") => Ok(()),
            Folder::Profiles => Err(AppError::Upload(
                "Only image files are allowed for profile/cover images.".to_string(),
            )),
            Folder::Documents if DOCUMENT_MIMES.contains(&mime.as_str()) => Ok(()),
            Folder::Documents => Err(AppError::Upload(
                "Only PDF and Word documents are allowed for CV/cover letter.".to_string(),
            )),
        }
    }
}
