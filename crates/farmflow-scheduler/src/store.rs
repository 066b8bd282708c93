//! Keyed JSON document stores.
//! Each key is one pretty-printed JSON file: human-readable, easy to edit by hand.
//! Reads and writes only happen when a flow or plan changes, never on a tick.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::ConfigStore;

/// File-backed document store: `<dir>/<key>.json`.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(FarmflowError::Config(format!("invalid document key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ConfigStore for JsonFileStore {
    fn load_config(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let file = self.path_for(key)?;
        if !file.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&file)?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| FarmflowError::malformed(key, e))
    }

    fn save_config(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let file = self.path_for(key)?;
        let json = serde_json::to_string_pretty(value)?;
        // Write-then-rename so a crash never leaves half a document behind.
        let tmp = file.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &file)?;
        tracing::debug!("💾 Saved '{key}' to {}", file.display());
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryStore {
    fn load_config(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs.get(key).cloned())
    }

    fn save_config(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let mut docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        docs.insert(key.to_string(), value.clone());
        Ok(())
    }
}
