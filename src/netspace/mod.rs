//! Netspace Module
//!
//! The two registries (GSN, GTN) plus the [`Netspace`] facade that opens
//! their stores from a [`NetspaceConfig`] and carries the testing-only
//! capabilities.

pub mod config;
pub mod events;
pub mod gsn;
pub mod gtn;

pub use config::*;
pub use events::*;
pub use gsn::*;
pub use gtn::*;

use crate::domain::{NodeRecord, NodeService};
use crate::error::{Error, Result};
use crate::store::SharedStore;
use chrono::Utc;
use tracing::{info, warn};

/// Both registries of one node's view of the network
#[derive(Debug)]
pub struct Netspace {
    config: NetspaceConfig,
    gsn: GsnRegistry,
    gtn: GtnRegistry,
    events: EventBus,
}

impl Netspace {
    /// Open the stores described by `config`
    pub fn open(config: NetspaceConfig) -> Result<Self> {
        let (gsn_store, gtn_store) = config.open_stores()?;
        info!(store = ?config.store, mode = ?config.mode, "Opened netspace");
        Ok(Self::with_stores(config, gsn_store, gtn_store))
    }

    /// Build a netspace over caller-supplied stores
    pub fn with_stores(
        config: NetspaceConfig,
        gsn_store: SharedStore,
        gtn_store: SharedStore,
    ) -> Self {
        Self {
            gsn: GsnRegistry::new(gsn_store, config.mode),
            gtn: GtnRegistry::new(gtn_store),
            events: EventBus::new(),
            config,
        }
    }

    pub fn gsn(&self) -> &GsnRegistry {
        &self.gsn
    }

    pub fn gtn(&self) -> &GtnRegistry {
        &self.gtn
    }

    pub fn config(&self) -> &NetspaceConfig {
        &self.config
    }

    /// Receiver for netspace-wide events (currently resets)
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<NetspaceEvent> {
        self.events.subscribe()
    }

    /// Parse a textual node description and register it in the GSN
    pub fn register_from_str(&self, text: &str) -> Result<bool> {
        let node: NodeRecord = text.parse()?;
        self.gsn.register(&node)
    }

    // =========================================================================
    // Testing-mode capabilities
    // =========================================================================

    /// Wipe both stores; refused outside testing mode
    pub fn reset_for_testing(&self) -> Result<bool> {
        if !self.config.is_testing() {
            warn!("Reset refused outside testing mode");
            return Ok(false);
        }

        self.gsn.clear()?;
        self.gtn.clear()?;

        info!("Reset netspace stores");
        self.events.publish(NetspaceEvent::Reset { at: Utc::now() });
        Ok(true)
    }

    /// Rewrite the address of a registered node from its textual form
    pub fn update_address_for_testing(&self, text: &str) -> Result<bool> {
        let node: NodeRecord = text.parse()?;
        self.gsn.update_address(&node)
    }

    /// Register a root from `<node description>,<geosub>`
    ///
    /// The service of the registered root is always `Dvsp`.
    pub fn register_root_from_str(&self, text: &str) -> Result<bool> {
        if !self.config.is_testing() {
            warn!("Root seeding refused outside testing mode");
            return Ok(false);
        }

        let (node_text, geosub) = text
            .trim()
            .rsplit_once(',')
            .ok_or_else(|| Error::Validation("root description has no geosub field".into()))?;
        let geosub = geosub.trim();
        if geosub.is_empty() {
            return Ok(false);
        }

        let node = node_text.parse::<NodeRecord>()?.with_service(NodeService::Dvsp);
        self.gtn.register_root(&node, geosub)
    }
}
