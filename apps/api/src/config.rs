use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::auth::jwt::JwtConfig;
use crate::uploads::UploadLimits;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub port: u16,
    pub rust_log: String,
    /// Root holding `profiles/` and `documents/`.
    pub upload_dir: PathBuf,
    pub upload_limits: UploadLimits,
    pub admin_seed: Option<AdminSeed>,
}

/// First administrator created at startup when no account with that username exists.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let jwt_secret = require_env("JWT_SECRET")?;
        anyhow::ensure!(!jwt_secret.is_empty(), "JWT_SECRET must not be empty");

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            jwt: JwtConfig {
                secret: jwt_secret,
                expiry_hours: parse_env("JWT_EXPIRY_HOURS", 168)?,
            },
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            upload_dir: PathBuf::from(
                std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            upload_limits: UploadLimits {
                max_file_bytes: parse_env("MAX_UPLOAD_BYTES", UploadLimits::default().max_file_bytes)?,
                max_files: parse_env("MAX_UPLOAD_FILES", UploadLimits::default().max_files)?,
            },
            admin_seed: admin_seed_from_env(),
        })
    }
}

fn admin_seed_from_env() -> Option<AdminSeed> {
    let password = std::env::var("ADMIN_PASSWORD").ok()?;
    Some(AdminSeed {
        username: std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
        email: std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@company.com".to_string()),
        password,
    })
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid value, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
