use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::auth::extractors::AuthUser;
use crate::auth::jwt::generate_token;
use crate::auth::password::{hash_password, validate_password_strength, verify_password};
use crate::errors::AppError;
use crate::extract::JsonBody;
use crate::models::user::{Profile, Role, User, UserResponse};
use crate::response::{self, ApiJson, Empty};
use crate::state::AppState;
use crate::users::repository::{self, NewUser};
use crate::validation::{is_valid_email, Problems};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 30, message = "Username must be between 3 and 30 characters"))]
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// `identifier` may be an email or a username; `email` and `username` are accepted
/// as aliases for older clients.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identifier: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    fn identifier(&self) -> Option<&str> {
        [&self.identifier, &self.email, &self.username]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Serialize)]
pub struct UserPayload {
    pub user: UserResponse,
}

fn issue(state: &AppState, user: User) -> Result<AuthPayload, AppError> {
    let token = generate_token(user.id, user.role, &state.config.jwt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {e}")))?;
    Ok(AuthPayload {
        token,
        user: user.into(),
    })
}

fn check_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let mut problems = Problems::new();
    problems.check(req);
    if !is_valid_email(&req.email) {
        problems.push("Please enter a valid email");
    }
    if let Err(msg) = validate_password_strength(&req.password) {
        problems.push(msg);
    }
    problems.into_result()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, ApiJson<AuthPayload>), AppError> {
    check_registration(&req)?;

    let username = req.username.trim();
    let email = req.email.trim();
    if repository::is_taken(&state.db, Some(username), Some(email), None).await? {
        return Err(AppError::Duplicate(
            "User with this email or username already exists".into(),
        ));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {e}")))?;
    let profile = Profile {
        first_name: req.first_name.unwrap_or_default().trim().to_string(),
        last_name: req.last_name.unwrap_or_default().trim().to_string(),
        ..Profile::default()
    };

    let user = repository::create(
        &state.db,
        NewUser {
            username,
            email,
            password_hash: &password_hash,
            role: Role::User,
            profile,
        },
    )
    .await?;

    info!(user_id = %user.id, "User registered");
    let payload = issue(&state, user)?;
    Ok((
        StatusCode::CREATED,
        response::ok_with_message("User registered successfully", payload),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<ApiJson<AuthPayload>, AppError> {
    let (Some(identifier), Some(password)) = (req.identifier(), req.password.as_deref()) else {
        return Err(AppError::Validation(
            "Please provide email/username and password".into(),
        ));
    };

    let invalid = || AppError::Unauthorized("Invalid credentials".into());
    let user = repository::find_by_identifier(&state.db, identifier)
        .await?
        .ok_or_else(invalid)?;

    let matches = verify_password(password, &user.password_hash).unwrap_or_else(|e| {
        warn!(user_id = %user.id, "Stored password hash is unreadable: {e}");
        false
    });
    if !matches {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(AppError::Unauthorized("Account is deactivated".into()));
    }

    let user = repository::record_login(&state.db, user.id)
        .await?
        .ok_or_else(invalid)?;

    info!(user_id = %user.id, "User logged in");
    Ok(response::ok_with_message("Login successful", issue(&state, user)?))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> ApiJson<UserPayload> {
    response::ok(UserPayload { user: user.into() })
}

/// POST /api/auth/logout
///
/// Tokens are stateless; the client drops its copy.
pub async fn logout(AuthUser(user): AuthUser) -> ApiJson<Empty> {
    info!(user_id = %user.id, "User logged out");
    response::message("Logged out successfully")
}

/// POST /api/forgot-password
///
/// Always answers the same way for a present email so accounts cannot be probed.
/// No reset email is sent.
pub async fn forgot_password(
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<ApiJson<Empty>, AppError> {
    if req.email.as_deref().map_or(true, |e| e.trim().is_empty()) {
        return Err(AppError::Validation("Email is required.".into()));
    }
    Ok(response::message(
        "If an account with that email exists, a reset link has been sent.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_registration_rules() {
        assert!(check_registration(&register_req("jane", "jane@example.com", "secret1")).is_ok());

        let AppError::Validation(msg) =
            check_registration(&register_req("j", "nope", "123")).unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(msg.contains("Username must be between 3 and 30 characters"));
        assert!(msg.contains("Please enter a valid email"));
        assert!(msg.contains("Password must be at least 6 characters long"));
    }

    #[test]
    fn test_login_identifier_aliases() {
        let req: LoginRequest =
            serde_json::from_value(serde_json::json!({ "email": "a@b.com", "password": "x" })).unwrap();
        assert_eq!(req.identifier(), Some("a@b.com"));

        let req: LoginRequest = serde_json::from_value(
            serde_json::json!({ "identifier": " ", "username": "admin", "password": "x" }),
        )
        .unwrap();
        assert_eq!(req.identifier(), Some("admin"));

        let req: LoginRequest = serde_json::from_value(serde_json::json!({ "password": "x" })).unwrap();
        assert_eq!(req.identifier(), None);
    }

    #[tokio::test]
    async fn test_forgot_password_requires_email() {
        let err = forgot_password(JsonBody(ForgotPasswordRequest { email: None }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Email is required."));

        let axum::Json(body) = forgot_password(JsonBody(ForgotPasswordRequest {
            email: Some("someone@example.com".into()),
        }))
        .await
        .unwrap();
        assert!(body.success);
    }
}
