use crate::config::AppConfig;
use crate::services::DatabaseService;
use std::sync::Arc;

#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub database: Arc<DatabaseService>,
}
