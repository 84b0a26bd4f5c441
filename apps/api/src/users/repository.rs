use serde::Serialize;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::config::AdminSeed;
use crate::errors::{is_unique_violation, AppError};
use crate::models::user::{Preferences, Profile, Role, User};
use crate::query::PageParams;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_active, last_login, \
     profile, preferences, login_count, posts_viewed, jobs_viewed, profile_views, created_at, updated_at";

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
    pub profile: Profile,
}

#[derive(Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub active: Option<bool>,
    /// Already an escaped `ILIKE` pattern.
    pub search: Option<String>,
}

/// Admin edits. `None` leaves the column untouched.
#[derive(Debug, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub admins: i64,
    pub users: i64,
}

/// Per-account activity counters bumped from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityCounter {
    PostsViewed,
    JobsViewed,
    ProfileViews,
}

impl ActivityCounter {
    fn column(self) -> &'static str {
        match self {
            ActivityCounter::PostsViewed => "posts_viewed",
            ActivityCounter::JobsViewed => "jobs_viewed",
            ActivityCounter::ProfileViews => "profile_views",
        }
    }
}

fn duplicate_account() -> AppError {
    AppError::Duplicate("User with this email or username already exists".into())
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Login lookup: email (case-insensitive) or exact username.
pub async fn find_by_identifier(pool: &PgPool, identifier: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = lower($1) OR username = $1 LIMIT 1"
    ))
    .bind(identifier.trim())
    .fetch_optional(pool)
    .await
}

/// True when another account already uses the username or email.
pub async fn is_taken(
    pool: &PgPool,
    username: Option<&str>,
    email: Option<&str>,
    exclude: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM users \
         WHERE (username = $1 OR email = lower($2)) AND ($3::uuid IS NULL OR id <> $3))",
    )
    .bind(username)
    .bind(email)
    .bind(exclude)
    .fetch_one(pool)
    .await
}

pub async fn create(pool: &PgPool, new: NewUser<'_>) -> Result<User, AppError> {
    let result = sqlx::query_as(&format!(
        "INSERT INTO users (username, email, password_hash, role, profile) \
         VALUES ($1, lower($2), $3, $4, $5) RETURNING {USER_COLUMNS}"
    ))
    .bind(new.username.trim())
    .bind(new.email.trim())
    .bind(new.password_hash)
    .bind(new.role.as_str())
    .bind(Json(&new.profile))
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(e) if is_unique_violation(&e) => Err(duplicate_account()),
        Err(e) => Err(e.into()),
    }
}

/// Stamps `last_login` and bumps `login_count` in one statement.
pub async fn record_login(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!(
        "UPDATE users SET last_login = now(), login_count = login_count + 1, updated_at = now() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn increment_counter(
    pool: &PgPool,
    id: Uuid,
    counter: ActivityCounter,
) -> Result<Option<User>, sqlx::Error> {
    let column = counter.column();
    sqlx::query_as(&format!(
        "UPDATE users SET {column} = {column} + 1 WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    qb.push(" WHERE TRUE");
    if let Some(role) = filter.role {
        qb.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(active) = filter.active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(pattern) = &filter.search {
        qb.push(" AND (username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(")");
    }
}

/// Newest accounts first.
pub async fn list(
    pool: &PgPool,
    filter: &UserFilter,
    page: PageParams,
) -> Result<(Vec<User>, i64), sqlx::Error> {
    let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut select = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
    push_filters(&mut select, filter);
    select
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());
    let users = select.build_query_as::<User>().fetch_all(pool).await?;

    Ok((users, total))
}

pub async fn counts(pool: &PgPool) -> Result<UserCounts, sqlx::Error> {
    sqlx::query_as(
        "SELECT COUNT(*) AS total, \
                COUNT(*) FILTER (WHERE is_active) AS active, \
                COUNT(*) FILTER (WHERE NOT is_active) AS inactive, \
                COUNT(*) FILTER (WHERE role = 'admin') AS admins, \
                COUNT(*) FILTER (WHERE role = 'user') AS users \
         FROM users",
    )
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: Uuid, changes: UserChanges) -> Result<Option<User>, AppError> {
    let result = sqlx::query_as(&format!(
        "UPDATE users SET \
            username = COALESCE($2, username), \
            email = COALESCE(lower($3), email), \
            role = COALESCE($4, role), \
            is_active = COALESCE($5, is_active), \
            updated_at = now() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(changes.username)
    .bind(changes.email)
    .bind(changes.role.map(Role::as_str))
    .bind(changes.is_active)
    .fetch_optional(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(e) if is_unique_violation(&e) => Err(duplicate_account()),
        Err(e) => Err(e.into()),
    }
}

pub async fn toggle_active(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!(
        "UPDATE users SET is_active = NOT is_active, updated_at = now() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn save_settings(
    pool: &PgPool,
    id: Uuid,
    profile: &Profile,
    preferences: &Preferences,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!(
        "UPDATE users SET profile = $2, preferences = $3, updated_at = now() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(Json(profile))
    .bind(Json(preferences))
    .fetch_optional(pool)
    .await
}

/// Sets (or clears, with `None`) one image URL inside the profile document.
pub async fn set_profile_image(
    pool: &PgPool,
    id: Uuid,
    key: &str,
    url: Option<&str>,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!(
        "UPDATE users SET profile = jsonb_set(profile, ARRAY[$2::text], $3::jsonb, true), \
         updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(key)
    .bind(Json(url))
    .fetch_optional(pool)
    .await
}

/// Removes the account. Applications cascade; authored jobs and posts keep a null author.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Creates the configured administrator unless that username or email is already taken.
pub async fn seed_admin(pool: &PgPool, seed: &AdminSeed) -> anyhow::Result<()> {
    if is_taken(pool, Some(&seed.username), Some(&seed.email), None).await? {
        info!("Admin account '{}' already present", seed.username);
        return Ok(());
    }

    let password_hash = crate::auth::password::hash_password(&seed.password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;
    create(
        pool,
        NewUser {
            username: &seed.username,
            email: &seed.email,
            password_hash: &password_hash,
            role: Role::Admin,
            profile: Profile::default(),
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to create admin account: {e}"))?;

    info!("Created admin account '{}'", seed.username);
    Ok(())
}
