use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::auth::extractors::AdminUser;
use crate::errors::AppError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::models::user::{Role, UserResponse};
use crate::query::{filter_value, parse_filter, search_pattern, PageParams, Pagination};
use crate::response::{self, ApiJson, Empty};
use crate::state::AppState;
use crate::users::account;
use crate::users::repository::{self, UserChanges, UserCounts, UserFilter};
use crate::validation::{is_valid_email, Problems};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub role: Option<String>,
    /// `active` or `inactive`.
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 30, message = "Username must be between 3 and 30 characters"))]
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Serialize)]
pub struct UserList {
    pub users: Vec<UserResponse>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct UserPayload {
    pub user: UserResponse,
}

#[derive(Serialize)]
pub struct StatsPayload {
    pub stats: UserCounts,
}

fn parse_status_filter(raw: &Option<String>) -> Result<Option<bool>, AppError> {
    match filter_value(raw) {
        None => Ok(None),
        Some("active") => Ok(Some(true)),
        Some("inactive") => Ok(Some(false)),
        Some(other) => Err(AppError::Validation(format!("Invalid status filter '{other}'"))),
    }
}

/// Guards an admin acting on their own account.
fn forbid_self(admin_id: Uuid, target: Uuid, action: &str) -> Result<(), AppError> {
    if admin_id == target {
        return Err(AppError::Forbidden(format!("You cannot {action} your own account")));
    }
    Ok(())
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    QueryParams(q): QueryParams<UserListQuery>,
) -> Result<ApiJson<UserList>, AppError> {
    let page = PageParams::new(q.page, q.limit);
    let filter = UserFilter {
        role: parse_filter(&q.role, "role")?,
        active: parse_status_filter(&q.status)?,
        search: search_pattern(&q.search),
    };

    let (users, total) = repository::list(&state.db, &filter, page).await?;
    Ok(response::ok(UserList {
        users: users.into_iter().map(UserResponse::from).collect(),
        pagination: Pagination::new(page, total),
    }))
}

/// GET /api/users/stats
pub async fn user_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<ApiJson<StatsPayload>, AppError> {
    let stats = repository::counts(&state.db).await?;
    Ok(response::ok(StatsPayload { stats }))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<ApiJson<UserPayload>, AppError> {
    let user = repository::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(response::ok(UserPayload { user: user.into() }))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<ApiJson<UserPayload>, AppError> {
    let mut problems = Problems::new();
    problems.check(&req);
    if let Some(email) = &req.email {
        if !is_valid_email(email) {
            problems.push("Please enter a valid email");
        }
    }
    problems.into_result()?;

    if req.role == Some(Role::User) {
        forbid_self(admin.id, id, "demote")?;
    }
    if req.is_active == Some(false) {
        forbid_self(admin.id, id, "deactivate")?;
    }

    let username = req.username.map(|u| u.trim().to_string());
    let email = req.email.map(|e| e.trim().to_string());
    if repository::is_taken(&state.db, username.as_deref(), email.as_deref(), Some(id)).await? {
        return Err(AppError::Duplicate(
            "User with this email or username already exists".into(),
        ));
    }

    let changes = UserChanges {
        username,
        email,
        role: req.role,
        is_active: req.is_active,
    };
    let user = repository::update(&state.db, id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(user_id = %id, admin_id = %admin.id, "User updated");
    Ok(response::ok_with_message(
        "User updated successfully",
        UserPayload { user: user.into() },
    ))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<ApiJson<Empty>, AppError> {
    forbid_self(admin.id, id, "delete")?;

    account::delete_with_uploads(&state, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(user_id = %id, admin_id = %admin.id, "User deleted");
    Ok(response::message("User deleted successfully"))
}

/// PUT /api/users/:id/toggle-status
pub async fn toggle_user_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> Result<ApiJson<UserPayload>, AppError> {
    forbid_self(admin.id, id, "deactivate")?;

    let user = repository::toggle_active(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let message = if user.is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    info!(user_id = %id, is_active = user.is_active, "User status toggled");
    Ok(response::ok_with_message(message, UserPayload { user: user.into() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter() {
        assert_eq!(parse_status_filter(&Some("active".into())).unwrap(), Some(true));
        assert_eq!(parse_status_filter(&Some("inactive".into())).unwrap(), Some(false));
        assert_eq!(parse_status_filter(&Some("all".into())).unwrap(), None);
        assert!(parse_status_filter(&Some("banned".into())).is_err());
    }

    #[test]
    fn test_admin_cannot_target_self() {
        let id = Uuid::new_v4();
        let err = forbid_self(id, id, "delete").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(msg) if msg == "You cannot delete your own account"));
        assert!(forbid_self(id, Uuid::new_v4(), "delete").is_ok());
    }

    #[test]
    fn test_update_request_rules() {
        let req: UpdateUserRequest =
            serde_json::from_value(serde_json::json!({ "username": "ab", "role": "admin" })).unwrap();
        assert!(req.validate().is_err());
        assert_eq!(req.role, Some(Role::Admin));

        let bad_role = serde_json::from_value::<UpdateUserRequest>(serde_json::json!({ "role": "owner" }));
        assert!(bad_role.is_err());
    }
}
