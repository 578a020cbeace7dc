//! Netspace Registry
//!
//! The directory of nodes in a distributed node network: which machines
//! exist, how to reach them, what they offer, and what state they are in.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 Callers (CLI, web, tests)                  │
//! ├───────────────────────────────────────────────────────────┤
//! │                        Netspace                            │
//! │  ┌─────────────────────────┐  ┌─────────────────────────┐ │
//! │  │      GSN Registry       │  │      GTN Registry       │ │
//! │  │  (local peer nodes)     │  │  (geosub root nodes)    │ │
//! │  └───────────┬─────────────┘  └───────────┬─────────────┘ │
//! ├──────────────┼────────────────────────────┼───────────────┤
//! │              │      KeyValueStore         │               │
//! │  ┌───────────┴─────────────┐  ┌───────────┴─────────────┐ │
//! │  │      node_geosub        │  │      node_geotop        │ │
//! │  │  (memory / JSON file)   │  │  (memory / JSON file)   │ │
//! │  └─────────────────────────┘  └─────────────────────────┘ │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`domain`]: Node records and their service/state/role domains
//! - [`store`]: The key-value store trait and its backends
//! - [`netspace`]: GSN and GTN registries, events, configuration
//! - [`error`]: Error types and handling

pub mod domain;
pub mod error;
pub mod netspace;
pub mod store;

// Re-export commonly used types
pub use domain::{NodeRecord, NodeRole, NodeService, NodeState};

pub use error::{Error, ErrorKind, Result};

pub use netspace::{
    GsnRegistry, GtnRegistry, Netspace, NetspaceConfig, NetspaceEvent, RegistryMode,
    RootRegistration, StoreBackend,
};

pub use store::{FileStore, KeyValueStore, MemoryStore, SharedStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
