use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::prefs::{PreferenceStore, Result};

/// A preference store backed by a small JSON file.
///
/// The whole map is rewritten on every `set`; preferences are a handful of
/// short strings, so this stays cheap and keeps the file human-editable.
#[derive(Debug, Clone)]
pub struct FilePrefs {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Arc<Mutex<()>>,
}

impl FilePrefs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn read_map(path: &Path) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl PreferenceStore for FilePrefs {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let map = Self::read_map(&self.path).await?;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = Self::read_map(&self.path).await?;
        map.insert(key.to_owned(), value.to_owned());
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&map)?).await?;
        Ok(())
    }
}
