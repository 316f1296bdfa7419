//! Database Connection and Setup
//!
//! Opens the SQLite database and brings its schema up to date.

use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreResult;

/// Shared handle to the board database
#[derive(Clone)]
pub struct DbState {
    conn: Arc<Mutex<Connection>>,
}

impl DbState {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

/// Open (or create) the database at `db_path` and run migrations.
/// `:memory:` gives a throwaway database for tests.
pub async fn init_db(db_path: &Path) -> StoreResult<DbState> {
    let conn = Connection::open(db_path)?;
    run_migrations(&conn)?;
    info!("Database ready at {}", db_path.display());
    Ok(DbState::new(conn))
}

/// Check if a column exists in a table
pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    let query = format!("PRAGMA table_info({})", table);
    let Ok(mut stmt) = conn.prepare(&query) else {
        return false;
    };
    let Ok(names) = stmt.query_map([], |row| row.get::<_, String>(1)) else {
        return false;
    };
    let found = names.flatten().any(|name| name == column);
    found
}

fn add_column_if_missing(conn: &Connection, table: &str, column: &str, decl: &str) -> StoreResult<()> {
    if !column_exists(conn, table, column) {
        debug!("Adding column {}.{}", table, column);
        conn.execute(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, decl), [])?;
    }
    Ok(())
}

/// Run database migrations. Safe to run on every start.
pub(crate) fn run_migrations(conn: &Connection) -> StoreResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS opportunities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            stage TEXT NOT NULL DEFAULT 'new_lead',
            status TEXT NOT NULL DEFAULT 'active',
            priority TEXT NOT NULL DEFAULT 'medium',
            customer_organization_id INTEGER NOT NULL,
            principal_organization_id INTEGER NOT NULL,
            distributor_organization_id INTEGER,
            contact_ids TEXT NOT NULL DEFAULT '[]',
            estimated_close_date TEXT,
            days_in_stage INTEGER NOT NULL DEFAULT 0,
            days_since_last_activity INTEGER,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    // Close reasons and soft delete arrived after the first schema
    add_column_if_missing(conn, "opportunities", "win_reason", "TEXT")?;
    add_column_if_missing(conn, "opportunities", "loss_reason", "TEXT")?;
    add_column_if_missing(conn, "opportunities", "close_reason_notes", "TEXT")?;
    add_column_if_missing(conn, "opportunities", "deleted_at", "TEXT")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_opportunities_orgs
            ON opportunities(principal_organization_id, customer_organization_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS opportunity_products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            opportunity_id INTEGER NOT NULL,
            product_id INTEGER NOT NULL,
            notes TEXT,
            created_at TEXT,
            deleted_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_opportunity_products_opp
            ON opportunity_products(opportunity_id, product_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            activity_type TEXT NOT NULL,
            \"type\" TEXT NOT NULL,
            subject TEXT NOT NULL,
            activity_date TEXT NOT NULL,
            opportunity_id INTEGER,
            organization_id INTEGER,
            created_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS preferences (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}
