use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::codegen::CodeDeriver;
use crate::config::Config;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
    /// Code deriver built from `config.codes`
    pub deriver: Arc<CodeDeriver>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let deriver = config.codes.deriver();

        Self {
            db,
            config: Arc::new(config),
            deriver: Arc::new(deriver),
        }
    }
}
