//! Environment-driven store configuration.

use std::path::PathBuf;

use crate::error::Result;
use crate::sqlite::SqliteStore;

/// Where the persistent store lives. Values come from the environment
/// (a `.env` file is honored), with working defaults for development.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        // Load .env if present
        let _ = dotenvy::dotenv();

        let db_path = std::env::var("VAULTCHAT_DB_PATH").unwrap_or_else(|_| "vaultchat.db".into());
        Self {
            db_path: PathBuf::from(db_path),
        }
    }

    pub fn open(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path)
    }
}
