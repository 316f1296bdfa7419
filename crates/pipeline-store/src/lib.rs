//! Pipeline Store
//!
//! SQLite persistence for the pipeline board: the data provider the board
//! writes through and durable column preferences.

pub mod bootstrap;
pub mod commands;
pub mod db;
pub mod error;
pub mod preferences;
pub mod provider;
pub mod table;


pub use bootstrap::{init_backend, Backend};
pub use commands::handle_command;
pub use db::{init_db, DbState};
pub use error::{StoreError, StoreResult};
pub use preferences::SqlitePreferences;
pub use provider::SqliteProvider;
