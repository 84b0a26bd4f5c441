//! Removing an account together with the files it uploaded.

use tracing::info;
use uuid::Uuid;

use crate::applications::repository as applications;
use crate::errors::AppError;
use crate::models::application::Documents;
use crate::models::user::User;
use crate::state::AppState;
use crate::uploads::UploadPurpose;
use crate::users::repository;

/// Every stored upload referenced by the account: profile images and the documents of
/// its applications.
pub fn uploaded_files(user: &User, documents: &[Documents]) -> Vec<(String, UploadPurpose)> {
    let profile = &user.profile.0;
    let images = [
        (&profile.profile_image, UploadPurpose::ProfileImage),
        (&profile.cover_image, UploadPurpose::CoverImage),
    ]
    .into_iter()
    .filter_map(|(url, purpose)| url.clone().map(|url| (url, purpose)));

    let docs = documents.iter().flat_map(|d| {
        [
            d.cv.as_ref().map(|f| (f.path.clone(), UploadPurpose::Cv)),
            d.cover_letter.as_ref().map(|f| (f.path.clone(), UploadPurpose::CoverLetter)),
        ]
        .into_iter()
        .flatten()
    });

    images.chain(docs).collect()
}

/// Deletes the account; its applications go with it. Files are removed afterwards,
/// best-effort, so a storage failure never keeps the account alive.
pub async fn delete_with_uploads(state: &AppState, id: Uuid) -> Result<Option<User>, AppError> {
    let documents = applications::documents_for_applicant(&state.db, id).await?;
    let Some(user) = repository::delete(&state.db, id).await? else {
        return Ok(None);
    };

    let files = uploaded_files(&user, &documents);
    for (url, purpose) in &files {
        state.storage.remove_best_effort(url, *purpose, user.id).await;
    }
    info!(user_id = %user.id, files = files.len(), "Account removed with its uploads");
    Ok(Some(user))
}
