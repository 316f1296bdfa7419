//! Backend bootstrap
//!
//! Brings up logging, the database and configuration for a data directory.

use std::path::{Path, PathBuf};

use pipeline_core::config::BoardConfig;
use tracing::info;

use crate::db::{init_db, DbState};
use crate::error::StoreResult;
use crate::preferences::SqlitePreferences;
use crate::provider::SqliteProvider;

pub const DB_FILE: &str = "pipeline.db";
pub const CONFIG_FILE: &str = "board.json";
pub const LOG_DIR: &str = "logs";
pub const APP_NAME: &str = "PipelineBoard";

/// Everything a host needs to serve the board
pub struct Backend {
    pub db: DbState,
    pub provider: SqliteProvider,
    pub preferences: SqlitePreferences,
    pub config: BoardConfig,
    pub db_path: PathBuf,
}

pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILE)
}

/// Initialize logging, open the database and load `board.json`.
///
/// A logger that is already installed is left alone.
pub async fn init_backend(data_dir: &Path) -> StoreResult<Backend> {
    std::fs::create_dir_all(data_dir)?;
    if let Err(e) = rolling_logger::init_logger(data_dir.join(LOG_DIR), APP_NAME) {
        tracing::debug!("Logger not installed: {}", e);
    }

    let db_path = db_path(data_dir);
    let db = init_db(&db_path).await?;
    let provider = SqliteProvider::new(db.connection());
    let preferences = SqlitePreferences::open(&db_path)?;
    let config = BoardConfig::load_or_default(&data_dir.join(CONFIG_FILE));

    info!("Backend ready in {}", data_dir.display());
    let _ = rolling_logger::info("Backend init success");

    Ok(Backend {
        db,
        provider,
        preferences,
        config,
        db_path,
    })
}
