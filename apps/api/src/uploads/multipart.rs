use std::collections::HashMap;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::BytesMut;

use super::storage::IncomingFile;
use super::{UploadLimits, UploadPurpose};
use crate::errors::AppError;

/// A parsed multipart request: text fields plus the accepted files, all in memory.
///
/// Every rule (field name, type, size, count) is checked before anything touches
/// the disk, so a rejected request leaves no files behind.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: Vec<IncomingFile>,
}

impl MultipartForm {
    pub async fn collect(
        multipart: &mut Multipart,
        allowed: &[UploadPurpose],
        limits: &UploadLimits,
    ) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limits))?
        {
            let name = field.name().unwrap_or_default().to_string();

            if field.file_name().is_none() {
                let value = field.text().await.map_err(|e| multipart_error(e, limits))?;
                form.fields.insert(name, value);
                continue;
            }

            let purpose = UploadPurpose::from_field(&name)
                .filter(|p| allowed.contains(p))
                .ok_or_else(|| AppError::Upload("Invalid file field.".to_string()))?;

            let original_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();

            // Browsers send an empty part for an untouched file input.
            if original_name.is_empty() {
                read_limited(field, limits).await?;
                continue;
            }

            if form.files.len() >= limits.max_files
                || form.files.iter().any(|f| f.purpose == purpose)
            {
                return Err(AppError::Upload("Too many files uploaded.".to_string()));
            }
            purpose.check_mime(&content_type)?;

            let bytes = read_limited(field, limits).await?;
            form.files.push(IncomingFile {
                purpose,
                original_name,
                content_type,
                bytes: bytes.freeze(),
            });
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, purpose: UploadPurpose) -> Option<IncomingFile> {
        let idx = self.files.iter().position(|f| f.purpose == purpose)?;
        Some(self.files.remove(idx))
    }
}

/// Streams a field into memory, failing as soon as it crosses the per-file ceiling.
async fn read_limited(mut field: Field<'_>, limits: &UploadLimits) -> Result<BytesMut, AppError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limits))? {
        if buf.len() + chunk.len() > limits.max_file_bytes {
            return Err(AppError::Upload(limits.too_large_message()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn multipart_error(err: MultipartError, limits: &UploadLimits) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Upload(limits.too_large_message())
    } else {
        AppError::Upload(format!("Upload error: {}", err.body_text()))
    }
}
