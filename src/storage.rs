//! Browser-backed preference storage

use pipeline_core::preferences::{PreferenceError, PreferencePort};

/// `window.localStorage`, looked up on every call
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStoragePreferences;

fn storage() -> Result<web_sys::Storage, PreferenceError> {
    web_sys::window()
        .ok_or_else(|| PreferenceError::Unavailable("no window".to_string()))?
        .local_storage()
        .map_err(|e| PreferenceError::Unavailable(format!("{:?}", e)))?
        .ok_or_else(|| PreferenceError::Unavailable("localStorage disabled".to_string()))
}

impl PreferencePort for LocalStoragePreferences {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        storage()?
            .get_item(key)
            .map_err(|e| PreferenceError::Unavailable(format!("{:?}", e)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        // Quota errors land here
        storage()?
            .set_item(key, value)
            .map_err(|e| PreferenceError::Write(format!("{:?}", e)))
    }

    fn remove(&self, key: &str) -> Result<(), PreferenceError> {
        storage()?
            .remove_item(key)
            .map_err(|e| PreferenceError::Write(format!("{:?}", e)))
    }
}
