use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::uploads::storage::FileStorage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    /// Upload directories. Handlers never build upload paths themselves.
    pub storage: FileStorage,
}
