//! Column Preferences
//!
//! Per-user collapsed/visible column sets, persisted through an injected
//! key-value port. Reads and writes are synchronous. A failing port never
//! breaks the board: loads fall back to defaults and writes keep the
//! in-memory value for the rest of the session.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::Stage;

pub const COLLAPSED_STAGES_KEY: &str = "opportunity.kanban.collapsed_stages";
pub const VISIBLE_STAGES_KEY: &str = "opportunity.kanban.visible_stages";

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Preference storage unavailable: {0}")]
    Unavailable(String),
    #[error("Preference write failed: {0}")]
    Write(String),
}

/// Key-value storage behind the preferences
pub trait PreferencePort {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
    fn remove(&self, key: &str) -> Result<(), PreferenceError>;
}

/// In-memory port used by tests and as a fallback when no storage exists
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferencePort for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}

impl<P: PreferencePort + ?Sized> PreferencePort for &P {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        (**self).remove(key)
    }
}

pub struct ColumnPreferences<P: PreferencePort> {
    port: P,
    collapsed_key: String,
    visible_key: String,
    collapsed: BTreeSet<Stage>,
    visible: BTreeSet<Stage>,
    degraded: bool,
}

impl<P: PreferencePort> ColumnPreferences<P> {
    /// Load both sets from the port under the default keys
    pub fn load(port: P) -> Self {
        Self::load_with_keys(port, COLLAPSED_STAGES_KEY, VISIBLE_STAGES_KEY)
    }

    /// Load both sets; anything unreadable becomes a default
    pub fn load_with_keys(port: P, collapsed_key: &str, visible_key: &str) -> Self {
        let mut degraded = false;
        let collapsed = read_set(&port, collapsed_key, &mut degraded).unwrap_or_default();
        let visible = read_set(&port, visible_key, &mut degraded)
            .unwrap_or_else(|| Stage::ALL.into_iter().collect());

        Self {
            port,
            collapsed_key: collapsed_key.to_string(),
            visible_key: visible_key.to_string(),
            collapsed,
            visible,
            degraded,
        }
    }

    pub fn collapsed(&self) -> &BTreeSet<Stage> {
        &self.collapsed
    }

    pub fn visible(&self) -> &BTreeSet<Stage> {
        &self.visible
    }

    pub fn is_collapsed(&self, stage: Stage) -> bool {
        self.collapsed.contains(&stage)
    }

    pub fn is_visible(&self, stage: Stage) -> bool {
        self.visible.contains(&stage)
    }

    /// True once any read or write against the port has failed
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn toggle_collapse(&mut self, stage: Stage) {
        if !self.collapsed.remove(&stage) {
            self.collapsed.insert(stage);
        }
        self.persist_collapsed();
    }

    pub fn toggle_visibility(&mut self, stage: Stage) {
        if !self.visible.remove(&stage) {
            self.visible.insert(stage);
        }
        self.persist_visible();
    }

    pub fn collapse_all(&mut self) {
        self.collapsed = Stage::ALL.into_iter().collect();
        self.persist_collapsed();
    }

    pub fn expand_all(&mut self) {
        self.collapsed.clear();
        self.persist_collapsed();
    }

    /// All visible, none collapsed
    pub fn reset(&mut self) {
        self.collapsed.clear();
        self.visible = Stage::ALL.into_iter().collect();
        for key in [&self.collapsed_key, &self.visible_key] {
            if let Err(e) = self.port.remove(key) {
                warn!("Failed to clear preference {}: {}", key, e);
                self.degraded = true;
            }
        }
    }

    /// Columns to render, in board order.
    ///
    /// With a stage filter active, only stages both visible and filtered in
    /// are shown.
    pub fn visible_columns(&self, filter: Option<&[Stage]>) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| self.visible.contains(s))
            .filter(|s| filter.map(|f| f.contains(s)).unwrap_or(true))
            .collect()
    }

    fn persist_collapsed(&mut self) {
        let value = encode(&self.collapsed);
        let ok = write(&self.port, &self.collapsed_key, &value);
        self.degraded |= !ok;
    }

    fn persist_visible(&mut self) {
        let value = encode(&self.visible);
        let ok = write(&self.port, &self.visible_key, &value);
        self.degraded |= !ok;
    }
}

fn write(port: &impl PreferencePort, key: &str, value: &str) -> bool {
    match port.set(key, value) {
        Ok(()) => {
            debug!("Saved preference {} = {}", key, value);
            true
        }
        Err(e) => {
            warn!("Failed to save preference {}: {}", key, e);
            false
        }
    }
}

fn encode(stages: &BTreeSet<Stage>) -> String {
    let ids: Vec<&str> = stages.iter().map(|s| s.as_str()).collect();
    serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
}

/// Unknown stage ids are skipped; unparsable JSON counts as absent
fn read_set(port: &impl PreferencePort, key: &str, degraded: &mut bool) -> Option<BTreeSet<Stage>> {
    let raw = match port.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to load preference {}: {}", key, e);
            *degraded = true;
            return None;
        }
    };

    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(ids) => Some(ids.iter().filter_map(|id| Stage::parse(id)).collect()),
        Err(e) => {
            warn!("Ignoring malformed preference {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPort;

    impl PreferencePort for BrokenPort {
        fn get(&self, _key: &str) -> Result<Option<String>, PreferenceError> {
            Err(PreferenceError::Unavailable("quota".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), PreferenceError> {
            Err(PreferenceError::Write("quota".to_string()))
        }
        fn remove(&self, _key: &str) -> Result<(), PreferenceError> {
            Err(PreferenceError::Write("quota".to_string()))
        }
    }

    #[test]
    fn test_defaults() {
        let prefs = ColumnPreferences::load(MemoryPreferences::new());
        assert!(prefs.collapsed().is_empty());
        assert_eq!(prefs.visible().len(), 7);
        assert!(!prefs.is_degraded());
    }

    #[test]
    fn test_toggle_persists_json_array() {
        let port = MemoryPreferences::new();
        {
            let mut prefs = ColumnPreferences::load(&port);
            prefs.toggle_collapse(Stage::FeedbackLogged);
            prefs.toggle_collapse(Stage::NewLead);
        }
        assert_eq!(
            port.get(COLLAPSED_STAGES_KEY).unwrap().as_deref(),
            Some(r#"["new_lead","feedback_logged"]"#)
        );

        let mut prefs = ColumnPreferences::load(&port);
        assert!(prefs.is_collapsed(Stage::NewLead));
        prefs.toggle_collapse(Stage::NewLead);
        assert!(!prefs.is_collapsed(Stage::NewLead));
    }

    #[test]
    fn test_collapse_expand_reset() {
        let port = MemoryPreferences::new();
        let mut prefs = ColumnPreferences::load(&port);
        prefs.collapse_all();
        assert_eq!(prefs.collapsed().len(), 7);
        prefs.expand_all();
        assert!(prefs.collapsed().is_empty());

        prefs.toggle_visibility(Stage::ClosedLost);
        assert!(!prefs.is_visible(Stage::ClosedLost));
        prefs.reset();
        assert!(prefs.is_visible(Stage::ClosedLost));
        assert_eq!(port.get(VISIBLE_STAGES_KEY).unwrap(), None);
    }

    #[test]
    fn test_visible_columns_respect_filter() {
        let mut prefs = ColumnPreferences::load(MemoryPreferences::new());
        prefs.toggle_visibility(Stage::InitialOutreach);

        let filter = [Stage::ClosedWon, Stage::InitialOutreach, Stage::NewLead];
        assert_eq!(
            prefs.visible_columns(Some(&filter)),
            vec![Stage::NewLead, Stage::ClosedWon]
        );
        assert_eq!(prefs.visible_columns(None).len(), 6);
    }

    #[test]
    fn test_malformed_value_falls_back() {
        let port = MemoryPreferences::new();
        port.set(VISIBLE_STAGES_KEY, "not json").unwrap();
        port.set(COLLAPSED_STAGES_KEY, r#"["demo_scheduled","awaiting_response"]"#).unwrap();
        let prefs = ColumnPreferences::load(&port);
        assert_eq!(prefs.visible().len(), 7);
        assert_eq!(prefs.collapsed().len(), 1);
    }

    #[test]
    fn test_broken_port_is_not_fatal() {
        let mut prefs = ColumnPreferences::load(BrokenPort);
        assert!(prefs.is_degraded());
        assert_eq!(prefs.visible().len(), 7);

        prefs.toggle_collapse(Stage::DemoScheduled);
        assert!(prefs.is_collapsed(Stage::DemoScheduled));
    }

    #[test]
    fn test_custom_keys() {
        let port = MemoryPreferences::new();
        let mut prefs = ColumnPreferences::load_with_keys(&port, "board.collapsed", "board.visible");
        prefs.toggle_collapse(Stage::ClosedWon);
        assert_eq!(port.get("board.collapsed").unwrap().as_deref(), Some(r#"["closed_won"]"#));
        assert_eq!(port.get(COLLAPSED_STAGES_KEY).unwrap(), None);
    }
}
