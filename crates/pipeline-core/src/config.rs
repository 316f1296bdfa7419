//! Board Configuration
//!
//! Tunables for the board, read from an optional JSON file. Missing keys
//! take their defaults; a missing file means all defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duplicate::DEFAULT_CANDIDATE_PAGE_SIZE;
use crate::preferences::{COLLAPSED_STAGES_KEY, VISIBLE_STAGES_KEY};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Pointer travel in px before a press becomes a drag
    pub drag_activation_distance: u32,
    pub notification_duration_ms: u32,
    pub audit_warning_duration_ms: u32,
    pub duplicate_page_size: u32,
    pub collapsed_stages_key: String,
    pub visible_stages_key: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            drag_activation_distance: 8,
            notification_duration_ms: 4000,
            audit_warning_duration_ms: 10000,
            duplicate_page_size: DEFAULT_CANDIDATE_PAGE_SIZE,
            collapsed_stages_key: COLLAPSED_STAGES_KEY.to_string(),
            visible_stages_key: VISIBLE_STAGES_KEY.to_string(),
        }
    }
}

impl BoardConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Load, logging and falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("config load failed, using defaults: {e}");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BoardConfig::load(&dir.path().join("board.json")).unwrap();
        assert_eq!(config, BoardConfig::default());
        assert_eq!(config.drag_activation_distance, 8);
    }

    #[test]
    fn test_partial_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"drag_activation_distance": 12}}"#).unwrap();
        let config = BoardConfig::load(file.path()).unwrap();
        assert_eq!(config.drag_activation_distance, 12);
        assert_eq!(config.notification_duration_ms, 4000);
    }

    #[test]
    fn test_notes_limit_key_is_ignored() {
        // The close-notes limit is a data rule shared with the gate
        let config = BoardConfig::from_json(r#"{"close_notes_max_len": 2000}"#).unwrap();
        assert_eq!(config, BoardConfig::default());
    }

    #[test]
    fn test_malformed_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ nope").unwrap();
        assert!(matches!(BoardConfig::load(file.path()), Err(ConfigError::Parse { .. })));
        assert_eq!(BoardConfig::load_or_default(file.path()), BoardConfig::default());
    }
}
