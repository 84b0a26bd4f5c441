use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::de::opt_flexible_datetime;
use crate::models::text_enum;

text_enum! {
    pub enum Role {
        User => "user",
        Admin => "admin",
    }
}

text_enum! {
    pub enum ProfileVisibility {
        Public => "public",
        Private => "private",
        Friends => "friends",
    }
}

text_enum! {
    pub enum Theme {
        Light => "light",
        Dark => "dark",
        Auto => "auto",
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLinks {
    pub linkedin: String,
    pub twitter: String,
    pub github: String,
    pub portfolio: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    #[validate(length(max = 500, message = "Bio cannot exceed 500 characters"))]
    pub bio: String,
    pub location: String,
    pub website: String,
    pub phone: String,
    #[serde(deserialize_with = "opt_flexible_datetime")]
    pub date_of_birth: Option<DateTime<Utc>>,
    pub profile_image: Option<String>,
    pub cover_image: Option<String>,
    pub social_links: SocialLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailNotifications {
    pub new_posts: bool,
    pub new_jobs: bool,
    pub comments: bool,
    pub mentions: bool,
    pub newsletter: bool,
}

impl Default for EmailNotifications {
    fn default() -> Self {
        Self {
            new_posts: true,
            new_jobs: true,
            comments: true,
            mentions: false,
            newsletter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Privacy {
    pub profile_visibility: ProfileVisibility,
    pub show_email: bool,
    pub show_social_links: bool,
    pub allow_messaging: bool,
}

impl Default for Privacy {
    fn default() -> Self {
        Self {
            profile_visibility: ProfileVisibility::Public,
            show_email: false,
            show_social_links: true,
            allow_messaging: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Appearance {
    pub theme: Theme,
    pub language: String,
    pub timezone: String,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            language: "en".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountSettings {
    pub two_factor_enabled: bool,
    /// Minutes of inactivity before the dashboard signs out.
    pub session_timeout: u32,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            two_factor_enabled: false,
            session_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub email_notifications: EmailNotifications,
    pub privacy: Privacy,
    pub appearance: Appearance,
    pub account: AccountSettings,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub profile: Json<Profile>,
    pub preferences: Json<Preferences>,
    pub login_count: i32,
    pub posts_viewed: i32,
    pub jobs_viewed: i32,
    pub profile_views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn full_name(&self) -> String {
        let profile = &self.profile.0;
        if !profile.first_name.is_empty() && !profile.last_name.is_empty() {
            format!("{} {}", profile.first_name, profile.last_name)
        } else {
            self.username.clone()
        }
    }

    pub fn stats(&self) -> UserStats {
        UserStats {
            login_count: self.login_count,
            posts_viewed: self.posts_viewed,
            jobs_viewed: self.jobs_viewed,
            profile_views: self.profile_views,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub login_count: i32,
    pub posts_viewed: i32,
    pub jobs_viewed: i32,
    pub profile_views: i32,
}

/// Public shape of an account. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub full_name: String,
    pub profile: Profile,
    pub preferences: Preferences,
    pub stats: UserStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let full_name = user.full_name();
        let stats = user.stats();
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            last_login: user.last_login,
            full_name,
            profile: user.profile.0,
            preferences: user.preferences.0,
            stats,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            role,
            is_active: true,
            last_login: None,
            profile: Json(Profile::default()),
            preferences: Json(Preferences::default()),
            login_count: 0,
            posts_viewed: 0,
            jobs_viewed: 0,
            profile_views: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_falls_back_to_username() {
        let mut user = fixtures::user(Role::User);
        assert_eq!(user.full_name(), "jdoe");
        user.profile.0.first_name = "Jane".into();
        assert_eq!(user.full_name(), "jdoe");
        user.profile.0.last_name = "Doe".into();
        assert_eq!(user.full_name(), "Jane Doe");
    }

    #[test]
    fn test_response_omits_password() {
        let response = UserResponse::from(fixtures::user(Role::Admin));
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["role"], "admin");
        assert_eq!(value["stats"]["loginCount"], 0);
        assert_eq!(value["preferences"]["appearance"]["theme"], "light");
    }

    #[test]
    fn test_preference_defaults() {
        let prefs: Preferences = serde_json::from_str("{}").unwrap();
        assert!(prefs.email_notifications.new_posts);
        assert!(!prefs.email_notifications.mentions);
        assert_eq!(prefs.privacy.profile_visibility, ProfileVisibility::Public);
        assert_eq!(prefs.account.session_timeout, 30);
    }
}
