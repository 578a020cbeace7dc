//! Key-Value Store Backends
//!
//! The registries are written against [`KeyValueStore`], a synchronous
//! associative store keyed by string. Two implementations are provided: an
//! in-process map and a flat JSON file per store name.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;

// =============================================================================
// KeyValueStore Trait
// =============================================================================

/// Associative store consumed by the registries
///
/// Every call is independent; nothing is atomic across calls. `keys` returns
/// keys in the store's own order, which both provided implementations keep as
/// insertion order.
pub trait KeyValueStore: Send + Sync {
    /// Name of this store (e.g. `node_geosub`)
    fn name(&self) -> &str;

    /// Get a value by key
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or replace a value
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a value; absent keys are not an error
    fn delete(&self, key: &str) -> Result<()>;

    /// All keys in store order
    fn keys(&self) -> Result<Vec<String>>;

    /// All entries in store order
    fn all(&self) -> Result<Vec<(String, Value)>> {
        let mut entries = Vec::new();
        for key in self.keys()? {
            if let Some(value) = self.get(&key)? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    /// Remove every entry
    fn clear(&self) -> Result<()>;
}

/// Type alias for a shared store handle
pub type SharedStore = Arc<dyn KeyValueStore>;
