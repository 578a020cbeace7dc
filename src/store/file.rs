//! Flat-File Store
//!
//! One JSON document per store at `<root>/<name>.json`. The file is loaded
//! once on open and rewritten on every mutation (temp file + rename). A
//! mutation reaches the in-memory mirror only after the file write succeeds,
//! so a failed call leaves both unchanged.

use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed key-value store
pub struct FileStore {
    name: String,
    path: PathBuf,
    entries: RwLock<IndexMap<String, Value>>,
}

impl FileStore {
    /// Open (or create) the store `name` under `root`
    pub fn open(root: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(Error::Configuration(format!("invalid store name: {:?}", name)));
        }

        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let path = root.join(format!("{}.json", name));

        let entries = if path.exists() {
            let raw = fs::read(&path)?;
            if raw.is_empty() {
                IndexMap::new()
            } else {
                serde_json::from_slice::<IndexMap<String, Value>>(&raw).map_err(|e| {
                    Error::Store(format!("cannot load {}: {}", path.display(), e))
                })?
            }
        } else {
            IndexMap::new()
        };

        debug!(
            store = %name,
            path = %path.display(),
            entries = entries.len(),
            "Opened file store"
        );

        Ok(Self {
            name,
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &IndexMap<String, Value>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(entries)?;
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.shift_remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn all(&self) -> Result<Vec<(String, Value)>> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.entries.write();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        entries.clear();
        Ok(())
    }
}
