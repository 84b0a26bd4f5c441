pub mod health;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::services::ServeDir;

use crate::errors::AppError;
use crate::state::AppState;
use crate::uploads::storage::PUBLIC_PREFIX;
use crate::{applications, auth, jobs, posts, profile, users};

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found".into())
}

fn auth_routes() -> Router<AppState> {
    use auth::handlers::*;

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

fn user_routes() -> Router<AppState> {
    use users::handlers::*;

    Router::new()
        .route("/", get(list_users))
        .route("/stats", get(user_stats))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/toggle-status", put(toggle_user_status))
}

/// `/:id` serves the public slug lookup on GET and the admin edits on PUT and DELETE.
fn job_routes() -> Router<AppState> {
    use jobs::handlers::*;

    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/admin", get(list_admin_jobs))
        .route("/stats", get(job_stats))
        .route("/:id", get(get_job).put(update_job).delete(delete_job))
        .route("/:id/apply", post(apply_to_job))
}

fn post_routes() -> Router<AppState> {
    use posts::handlers::*;

    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/admin", get(list_admin_posts))
        .route("/stats", get(post_stats))
        .route("/:id", get(get_post).put(update_post).delete(delete_post))
}

fn application_routes(upload_limit: usize) -> Router<AppState> {
    use applications::handlers::*;

    Router::new()
        .route(
            "/",
            post(submit_application).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/my", get(my_applications))
        .route("/stats/overview", get(application_stats))
        .route("/job/:job_id", get(job_applications))
        .route("/:id", get(get_application))
        .route("/:id/status", put(update_application_status))
}

fn profile_routes(upload_limit: usize) -> Router<AppState> {
    use profile::handlers::*;

    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/preferences", put(update_preferences))
        .route(
            "/avatar",
            post(upload_avatar)
                .layer(DefaultBodyLimit::max(upload_limit))
                .put(set_avatar_url)
                .delete(remove_avatar),
        )
        .route(
            "/cover",
            post(upload_cover)
                .layer(DefaultBodyLimit::max(upload_limit))
                .put(set_cover_url),
        )
        .route("/stats", get(profile_stats))
        .route("/stats/increment", put(increment_stat))
        .route("/delete", axum::routing::delete(delete_account))
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.upload_limits.request_body_limit();
    let uploads = ServeDir::new(state.storage.root());

    Router::new()
        .route("/api/health", get(health::health_handler))
        .nest("/api/auth", auth_routes())
        .route("/api/forgot-password", post(auth::handlers::forgot_password))
        .nest("/api/users", user_routes())
        .nest("/api/jobs", job_routes())
        .nest("/api/posts", post_routes())
        .nest("/api/applications", application_routes(upload_limit))
        .nest("/api/profile", profile_routes(upload_limit))
        .nest_service(PUBLIC_PREFIX, uploads)
        .fallback(route_not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::jwt::JwtConfig;
    use crate::config::Config;
    use crate::uploads::storage::FileStorage;
    use crate::uploads::UploadLimits;

    /// State whose pool never connects; only routes that answer before touching
    /// the database are exercised here.
    fn test_state(upload_dir: &std::path::Path) -> AppState {
        let config = Config {
            database_url: "postgres://localhost/unused".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                expiry_hours: 1,
            },
            port: 0,
            rust_log: "info".into(),
            upload_dir: upload_dir.to_path_buf(),
            upload_limits: UploadLimits::default(),
            admin_seed: None,
        };
        AppState {
            db: PgPoolOptions::new()
                .connect_lazy(&config.database_url)
                .unwrap(),
            storage: FileStorage::new(upload_dir),
            config: Arc::new(config),
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        let (status, body) = send(build_router(test_state(dir.path())), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_routes_need_token() {
        let dir = tempfile::tempdir().unwrap();
        for (method, uri) in [
            ("GET", "/api/auth/me"),
            ("GET", "/api/profile"),
            ("GET", "/api/jobs/admin"),
            ("GET", "/api/applications/stats/overview"),
            ("DELETE", "/api/users/5f0c6b8e-0000-4000-8000-000000000000"),
        ] {
            let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
            let (status, body) = send(build_router(test_state(dir.path())), request).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], "No token, authorization denied");
            assert_eq!(body["code"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn test_malformed_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::get("/api/profile")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(build_router(test_state(dir.path())), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Token is not valid");
    }

    #[tokio::test]
    async fn test_forgot_password() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Request::post("/api/forgot-password")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, body) = send(build_router(test_state(dir.path())), missing).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email is required.");

        let present = Request::post("/api/forgot-password")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"someone@example.com"}"#))
            .unwrap();
        let (status, body) = send(build_router(test_state(dir.path())), present).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            "If an account with that email exists, a reset link has been sent."
        );
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::get("/api/nothing-here").body(Body::empty()).unwrap();
        let (status, body) = send(build_router(test_state(dir.path())), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Route not found");
    }

    #[tokio::test]
    async fn test_uploaded_files_are_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("documents")).unwrap();
        std::fs::write(dir.path().join("documents/cv-test.pdf"), b"%PDF-1.4").unwrap();

        let request = Request::get("/uploads/documents/cv-test.pdf").body(Body::empty()).unwrap();
        let response = build_router(test_state(dir.path())).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4");
    }
}
