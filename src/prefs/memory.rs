use crate::prefs::{PreferenceStore, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// An in-memory preference store.
///
/// Useful for testing and development.
#[derive(Debug, Default, Clone)]
pub struct MemoryPrefs {
    entries: Arc<DashMap<String, String>>,
}

#[async_trait]
impl PreferenceStore for MemoryPrefs {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
