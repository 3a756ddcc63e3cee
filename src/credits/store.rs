//! Key-value backends for credit records.

use crate::error::{MonospaceError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// File name of the default on-disk store.
const DEFAULT_FILE_NAME: &str = "credits.json";

/// A string key-value store, the shape of browser local storage.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-process store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A JSON object on disk mapping keys to values.
///
/// The file is re-read on every access, so several processes sharing it see
/// each other's writes; concurrent writers race and the last one wins.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Uses the file at `path`. It is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses `credits.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_FILE_NAME))
    }

    /// Uses `<platform data dir>/monospace/credits.json`.
    pub fn open_default() -> Result<Self> {
        Self::default_path().map(Self::new).ok_or_else(|| {
            MonospaceError::InvalidRequest(
                "could not determine a data directory; pass one explicitly".into(),
            )
        })
    }

    /// Default location of the credit file, if the platform has a data dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("monospace").join(DEFAULT_FILE_NAME))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => Ok(entries),
                Err(e) => self.recover(&text, e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Moves an unreadable file aside and keeps whatever leading JSON object
    /// still parses, so one bad write cannot erase every identity's record.
    fn recover(
        &self,
        text: &str,
        error: serde_json::Error,
    ) -> Result<BTreeMap<String, String>> {
        let backup = self.backup_path();
        std::fs::rename(&self.path, &backup)?;

        let salvaged: BTreeMap<String, String> = serde_json::Deserializer::from_str(text)
            .into_iter::<BTreeMap<String, String>>()
            .next()
            .and_then(|first| first.ok())
            .unwrap_or_default();
        tracing::warn!(
            path = %self.path.display(),
            backup = %backup.display(),
            salvaged = salvaged.len(),
            "credit store is not valid JSON, moved it aside: {error}"
        );

        self.write_entries(&salvaged)?;
        Ok(salvaged)
    }

    /// `credits.json.corrupt-<timestamp>` next to the store file.
    fn backup_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        let stamp = chrono::Local::now().format("%Y%m%dT%H%M%S%.3f");
        self.path.with_file_name(format!("{name}.corrupt-{stamp}"))
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.read_entries()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_entries(&entries)
    }
}
