//! SQLite-backed column preferences
//!
//! The preference port is synchronous, so this keeps its own blocking
//! connection next to the async one used by the data provider.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use pipeline_core::preferences::{PreferenceError, PreferencePort};

use crate::db::run_migrations;
use crate::error::StoreResult;

pub struct SqlitePreferences {
    conn: Mutex<Connection>,
}

impl SqlitePreferences {
    pub fn open(db_path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T, PreferenceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| PreferenceError::Unavailable("preference connection poisoned".to_string()))?;
        f(&conn).map_err(|e| PreferenceError::Unavailable(e.to_string()))
    }
}

impl PreferencePort for SqlitePreferences {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM preferences WHERE key = ?1", [key], |row| row.get(0))
                .optional()
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO preferences (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
        })
        .map(|_| ())
        .map_err(|e| PreferenceError::Write(e.to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        self.with_conn(|conn| conn.execute("DELETE FROM preferences WHERE key = ?1", [key]))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::domain::Stage;
    use pipeline_core::preferences::{ColumnPreferences, COLLAPSED_STAGES_KEY};

    #[test]
    fn test_collapsed_stages_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.db");

        {
            let store = SqlitePreferences::open(&path).unwrap();
            let mut prefs = ColumnPreferences::load(&store);
            prefs.toggle_collapse(Stage::ClosedLost);
            assert!(!prefs.is_degraded());
        }

        let store = SqlitePreferences::open(&path).unwrap();
        let prefs = ColumnPreferences::load(&store);
        assert!(prefs.is_collapsed(Stage::ClosedLost));
        assert!(!prefs.is_collapsed(Stage::NewLead));
        assert_eq!(store.get(COLLAPSED_STAGES_KEY).unwrap().as_deref(), Some(r#"["closed_lost"]"#));
    }

    #[test]
    fn test_remove_clears_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqlitePreferences::open(&dir.path().join("prefs.db")).unwrap();
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }
}
