use axum::extract::{Multipart, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::extractors::AuthUser;
use crate::errors::AppError;
use crate::extract::JsonBody;
use crate::models::user::{Preferences, Profile, User, UserResponse, UserStats};
use crate::profile::settings::{merge_preferences, merge_profile};
use crate::response::{self, ApiJson, Empty};
use crate::state::AppState;
use crate::uploads::multipart::MultipartForm;
use crate::uploads::storage::{is_local_url, is_owned_by};
use crate::uploads::UploadPurpose;
use crate::users::account;
use crate::users::repository::{self, ActivityCounter};

#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub profile: Option<Value>,
    pub preferences: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUrlRequest {
    pub profile_image: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IncrementRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Serialize)]
pub struct ProfilePayload {
    pub profile: UserResponse,
}

#[derive(Serialize)]
pub struct PreferencesPayload {
    pub preferences: Preferences,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    #[serde(flatten)]
    pub counters: UserStats,
    pub member_since: DateTime<Utc>,
    pub days_since_member: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub account_age: String,
}

#[derive(Serialize)]
pub struct StatsPayload {
    pub stats: ProfileStats,
}

/// Which of the two profile images a request targets.
#[derive(Debug, Clone, Copy)]
enum ProfileImage {
    Avatar,
    Cover,
}

impl ProfileImage {
    fn purpose(self) -> UploadPurpose {
        match self {
            ProfileImage::Avatar => UploadPurpose::ProfileImage,
            ProfileImage::Cover => UploadPurpose::CoverImage,
        }
    }

    /// Key inside the profile document.
    fn key(self) -> &'static str {
        self.purpose().field_name()
    }

    const ALL: [ProfileImage; 2] = [ProfileImage::Avatar, ProfileImage::Cover];

    fn current(self, user: &User) -> Option<&str> {
        self.in_profile(&user.profile.0)
    }

    fn in_profile(self, profile: &Profile) -> Option<&str> {
        match self {
            ProfileImage::Avatar => profile.profile_image.as_deref(),
            ProfileImage::Cover => profile.cover_image.as_deref(),
        }
    }

    fn payload(self, url: String) -> ImagePayload {
        match self {
            ProfileImage::Avatar => ImagePayload {
                profile_image: Some(url),
                cover_image: None,
            },
            ProfileImage::Cover => ImagePayload {
                profile_image: None,
                cover_image: Some(url),
            },
        }
    }

    fn label(self) -> &'static str {
        match self {
            ProfileImage::Avatar => "Profile image",
            ProfileImage::Cover => "Cover image",
        }
    }
}

/// URLs under the upload mount are accepted only for a file the caller stored for
/// this image slot; external URLs are taken as given.
fn check_image_url(url: &str, image: ProfileImage, owner: Uuid) -> Result<(), AppError> {
    if is_local_url(url) && !is_owned_by(url, image.purpose(), owner) {
        return Err(AppError::Validation(format!(
            "Invalid {} URL",
            image.label().to_lowercase()
        )));
    }
    Ok(())
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".into())
}

/// Whole years and remaining 30-day months, e.g. `"1 years, 2 months"`.
pub fn account_age(days: i64) -> String {
    let days = days.max(0);
    format!("{} years, {} months", days / 365, (days % 365) / 30)
}

pub fn parse_counter(raw: Option<&str>) -> Result<ActivityCounter, AppError> {
    match raw {
        Some("postViewed") => Ok(ActivityCounter::PostsViewed),
        Some("jobViewed") => Ok(ActivityCounter::JobsViewed),
        Some("profileView") => Ok(ActivityCounter::ProfileViews),
        _ => Err(AppError::Validation("Invalid stat type".into())),
    }
}

/// GET /api/profile
pub async fn get_profile(AuthUser(user): AuthUser) -> Result<ApiJson<ProfilePayload>, AppError> {
    Ok(response::ok(ProfilePayload {
        profile: user.into(),
    }))
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(update): JsonBody<SettingsUpdate>,
) -> Result<ApiJson<ProfilePayload>, AppError> {
    let profile = match &update.profile {
        Some(changes) => merge_profile(&user.profile.0, changes)?,
        None => user.profile.0.clone(),
    };
    let replaced: Vec<ProfileImage> = ProfileImage::ALL
        .into_iter()
        .filter(|image| image.in_profile(&profile) != image.current(&user))
        .collect();
    for image in &replaced {
        if let Some(url) = image.in_profile(&profile) {
            check_image_url(url, *image, user.id)?;
        }
    }
    let preferences = match &update.preferences {
        Some(changes) => merge_preferences(&user.preferences.0, changes)?,
        None => user.preferences.0.clone(),
    };

    let updated = repository::save_settings(&state.db, user.id, &profile, &preferences)
        .await?
        .ok_or_else(user_not_found)?;
    for image in replaced {
        if let Some(old) = image.current(&user) {
            state.storage.remove_best_effort(old, image.purpose(), user.id).await;
        }
    }
    Ok(response::ok_with_message(
        "Profile updated successfully",
        ProfilePayload {
            profile: updated.into(),
        },
    ))
}

/// PUT /api/profile/preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(changes): JsonBody<Value>,
) -> Result<ApiJson<PreferencesPayload>, AppError> {
    let preferences = merge_preferences(&user.preferences.0, &changes)?;
    let updated = repository::save_settings(&state.db, user.id, &user.profile.0, &preferences)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(response::ok_with_message(
        "Preferences updated successfully",
        PreferencesPayload {
            preferences: updated.preferences.0,
        },
    ))
}

async fn upload_image(
    state: &AppState,
    user: &User,
    multipart: &mut Multipart,
    image: ProfileImage,
) -> Result<String, AppError> {
    let purpose = image.purpose();
    let mut form = MultipartForm::collect(multipart, &[purpose], &state.config.upload_limits).await?;
    let file = form
        .take_file(purpose)
        .ok_or_else(|| AppError::Validation("No image file provided".into()))?;

    let stored = state.storage.save(&file, Some(user.id)).await?;
    match repository::set_profile_image(&state.db, user.id, image.key(), Some(&stored.url)).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            state.storage.remove_best_effort(&stored.url, purpose, user.id).await;
            return Err(user_not_found());
        }
        Err(e) => {
            state.storage.remove_best_effort(&stored.url, purpose, user.id).await;
            return Err(e.into());
        }
    }

    if let Some(old) = image.current(user) {
        state.storage.remove_best_effort(old, purpose, user.id).await;
    }
    info!(user_id = %user.id, field = image.key(), url = %stored.url, "Profile image stored");
    Ok(stored.url)
}

async fn set_image_url(
    state: &AppState,
    user: &User,
    url: Option<String>,
    image: ProfileImage,
) -> Result<String, AppError> {
    let url = url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} URL is required", image.label())))?;
    check_image_url(&url, image, user.id)?;

    repository::set_profile_image(&state.db, user.id, image.key(), Some(&url))
        .await?
        .ok_or_else(user_not_found)?;
    if let Some(old) = image.current(user).filter(|old| *old != url) {
        state.storage.remove_best_effort(old, image.purpose(), user.id).await;
    }
    Ok(url)
}

/// POST /api/profile/avatar
pub async fn upload_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<ApiJson<ImagePayload>, AppError> {
    let image = ProfileImage::Avatar;
    let url = upload_image(&state, &user, &mut multipart, image).await?;
    Ok(response::ok_with_message(
        "Profile picture uploaded successfully",
        image.payload(url),
    ))
}

/// PUT /api/profile/avatar
pub async fn set_avatar_url(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<ImageUrlRequest>,
) -> Result<ApiJson<ImagePayload>, AppError> {
    let image = ProfileImage::Avatar;
    let url = set_image_url(&state, &user, body.profile_image, image).await?;
    Ok(response::ok_with_message(
        "Profile picture updated successfully",
        image.payload(url),
    ))
}

/// DELETE /api/profile/avatar
pub async fn remove_avatar(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<ApiJson<Empty>, AppError> {
    let image = ProfileImage::Avatar;
    repository::set_profile_image(&state.db, user.id, image.key(), None)
        .await?
        .ok_or_else(user_not_found)?;
    if let Some(old) = image.current(&user) {
        state.storage.remove_best_effort(old, image.purpose(), user.id).await;
    }
    Ok(response::message("Profile picture removed successfully"))
}

/// POST /api/profile/cover
pub async fn upload_cover(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<ApiJson<ImagePayload>, AppError> {
    let image = ProfileImage::Cover;
    let url = upload_image(&state, &user, &mut multipart, image).await?;
    Ok(response::ok_with_message(
        "Cover image uploaded successfully",
        image.payload(url),
    ))
}

/// PUT /api/profile/cover
pub async fn set_cover_url(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<ImageUrlRequest>,
) -> Result<ApiJson<ImagePayload>, AppError> {
    let image = ProfileImage::Cover;
    let url = set_image_url(&state, &user, body.cover_image, image).await?;
    Ok(response::ok_with_message(
        "Cover image updated successfully",
        image.payload(url),
    ))
}

/// GET /api/profile/stats
pub async fn profile_stats(AuthUser(user): AuthUser) -> Result<ApiJson<StatsPayload>, AppError> {
    let days_since_member = (Utc::now() - user.created_at).num_days();
    Ok(response::ok(StatsPayload {
        stats: ProfileStats {
            counters: user.stats(),
            member_since: user.created_at,
            days_since_member,
            last_login: user.last_login,
            account_age: account_age(days_since_member),
        },
    }))
}

/// PUT /api/profile/stats/increment
pub async fn increment_stat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<IncrementRequest>,
) -> Result<ApiJson<Empty>, AppError> {
    let counter = parse_counter(body.kind.as_deref())?;
    repository::increment_counter(&state.db, user.id, counter)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(response::message("Stat updated successfully"))
}

/// DELETE /api/profile/delete
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<ApiJson<Empty>, AppError> {
    let deleted = account::delete_with_uploads(&state, user.id)
        .await?
        .ok_or_else(user_not_found)?;
    info!(user_id = %deleted.id, "Account deleted by its owner");
    Ok(response::message("Account deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{fixtures, Role};

    #[test]
    fn test_account_age() {
        assert_eq!(account_age(0), "0 years, 0 months");
        assert_eq!(account_age(29), "0 years, 0 months");
        assert_eq!(account_age(45), "0 years, 1 months");
        assert_eq!(account_age(365 + 61), "1 years, 2 months");
        assert_eq!(account_age(-3), "0 years, 0 months");
    }

    #[test]
    fn test_parse_counter() {
        assert_eq!(parse_counter(Some("postViewed")).unwrap(), ActivityCounter::PostsViewed);
        assert_eq!(parse_counter(Some("jobViewed")).unwrap(), ActivityCounter::JobsViewed);
        assert_eq!(parse_counter(Some("profileView")).unwrap(), ActivityCounter::ProfileViews);
        assert!(matches!(parse_counter(Some("likes")), Err(AppError::Validation(_))));
        assert!(parse_counter(None).is_err());
    }

    #[test]
    fn test_image_keys_and_payloads() {
        assert_eq!(ProfileImage::Avatar.key(), "profileImage");
        assert_eq!(ProfileImage::Cover.key(), "coverImage");

        let value = serde_json::to_value(ProfileImage::Cover.payload("/uploads/profiles/c.png".into())).unwrap();
        assert_eq!(value, serde_json::json!({ "coverImage": "/uploads/profiles/c.png" }));
    }

    #[test]
    fn test_image_url_must_be_own_upload() {
        let owner = Uuid::new_v4();
        let applicant = Uuid::new_v4();

        let own = format!("/uploads/profiles/profile-{owner}-1-2.png");
        assert!(check_image_url(&own, ProfileImage::Avatar, owner).is_ok());
        assert!(check_image_url("https://cdn.example.com/me.png", ProfileImage::Avatar, owner).is_ok());

        let someone_elses_cv = format!("/uploads/documents/cv-{applicant}-1-2.pdf");
        let err = check_image_url(&someone_elses_cv, ProfileImage::Avatar, owner).unwrap_err();
        let AppError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "Invalid profile image URL");

        let own_cv = format!("/uploads/documents/cv-{owner}-1-2.pdf");
        assert!(check_image_url(&own_cv, ProfileImage::Cover, owner).is_err());
        assert!(check_image_url(&own, ProfileImage::Cover, owner).is_err());
        assert!(check_image_url("/uploads/profiles/../documents/x", ProfileImage::Avatar, owner).is_err());
    }

    #[test]
    fn test_current_image() {
        let mut user = fixtures::user(Role::User);
        assert_eq!(ProfileImage::Avatar.current(&user), None);
        user.profile.0.profile_image = Some("/uploads/profiles/a.png".into());
        assert_eq!(ProfileImage::Avatar.current(&user), Some("/uploads/profiles/a.png"));
        assert_eq!(ProfileImage::Cover.current(&user), None);
    }

    #[test]
    fn test_stats_shape() {
        let stats = ProfileStats {
            counters: fixtures::user(Role::User).stats(),
            member_since: Utc::now(),
            days_since_member: 400,
            last_login: None,
            account_age: account_age(400),
        };
        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(value["loginCount"], 0);
        assert_eq!(value["daysSinceMember"], 400);
        assert_eq!(value["accountAge"], "1 years, 1 months");
    }
}
