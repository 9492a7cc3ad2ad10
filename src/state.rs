use std::sync::Arc;

use sqlx::SqlitePool;
use tower_sessions::SqliteStore;

use crate::config::Config;
use crate::models::{SnippetModel, UserModel};

/// Dependencies shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub snippets: SnippetModel,
    pub users: UserModel,
    pub sessions: SqliteStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self {
            snippets: SnippetModel::new(pool.clone()),
            users: UserModel::new(pool.clone()),
            sessions: SqliteStore::new(pool),
            config: Arc::new(config),
        }
    }
}
