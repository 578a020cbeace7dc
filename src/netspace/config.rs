//! Netspace Configuration
//!
//! Where the two stores live and whether the testing-only capabilities
//! (reset, address rewrite, root seeding) are enabled. Passed explicitly to
//! [`Netspace::open`](super::Netspace::open); there is no global config.

use crate::error::{Error, Result};
use crate::store::{FileStore, MemoryStore, SharedStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Store name for GSN entries
pub const GSN_STORE_NAME: &str = "node_geosub";

/// Store name for GTN entries
pub const GTN_STORE_NAME: &str = "node_geotop";

/// Backend holding the registry stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process maps, lost on drop
    InMemory,
    /// One JSON file per store under `root_path`
    FileSystem { root_path: PathBuf },
}

/// Whether this netspace is a live deployment or a test environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryMode {
    #[default]
    Live,
    Testing,
}

/// Configuration for a netspace
#[derive(Debug, Clone)]
pub struct NetspaceConfig {
    pub store: StoreBackend,
    pub mode: RegistryMode,
}

impl Default for NetspaceConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::FileSystem {
                root_path: PathBuf::from("/var/lib/netspace/live"),
            },
            mode: RegistryMode::Live,
        }
    }
}

impl NetspaceConfig {
    /// Live file-backed stores under `root_path`
    pub fn live(root_path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreBackend::FileSystem {
                root_path: root_path.into(),
            },
            mode: RegistryMode::Live,
        }
    }

    /// Testing-mode file-backed stores under `root_path`
    pub fn testing(root_path: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreBackend::FileSystem {
                root_path: root_path.into(),
            },
            mode: RegistryMode::Testing,
        }
    }

    /// Testing-mode in-memory stores
    pub fn in_memory() -> Self {
        Self {
            store: StoreBackend::InMemory,
            mode: RegistryMode::Testing,
        }
    }

    pub fn is_testing(&self) -> bool {
        self.mode == RegistryMode::Testing
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let StoreBackend::FileSystem { root_path } = &self.store {
            if root_path.as_os_str().is_empty() {
                return Err(Error::Configuration("store root path is empty".into()));
            }
        }
        Ok(())
    }

    /// Build the GSN and GTN stores for this configuration
    pub fn open_stores(&self) -> Result<(SharedStore, SharedStore)> {
        self.validate()?;
        match &self.store {
            StoreBackend::InMemory => Ok((
                Arc::new(MemoryStore::new(GSN_STORE_NAME)),
                Arc::new(MemoryStore::new(GTN_STORE_NAME)),
            )),
            StoreBackend::FileSystem { root_path } => Ok((
                Arc::new(FileStore::open(root_path, GSN_STORE_NAME)?),
                Arc::new(FileStore::open(root_path, GTN_STORE_NAME)?),
            )),
        }
    }
}
