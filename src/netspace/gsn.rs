//! GSN Registry
//!
//! Directory of the peer nodes in the local geo-subnetwork, keyed by node
//! identity. There are no secondary indices: address, hostname, role and state
//! queries scan every stored key in store order.

use crate::domain::{NodeRecord, NodeRole, NodeService, NodeState};
use crate::error::{Error, Result};
use crate::netspace::config::RegistryMode;
use crate::netspace::events::{EventBus, NetspaceEvent};
use crate::store::SharedStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

// =============================================================================
// Stored Entry
// =============================================================================

/// Fields persisted for a GSN node; the identity is the store key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GsnEntry {
    host: String,
    address: String,
    service: NodeService,
    state: NodeState,
    role: NodeRole,
    key: String,
}

impl GsnEntry {
    fn from_node(node: &NodeRecord) -> Self {
        Self {
            host: node.host.clone(),
            address: node.address.clone(),
            service: node.service,
            state: node.state,
            role: node.role,
            key: node.key.clone(),
        }
    }

    fn into_node(self, identity: &str) -> NodeRecord {
        NodeRecord {
            identity: identity.to_string(),
            host: self.host,
            address: self.address,
            service: self.service,
            state: self.state,
            role: self.role,
            key: self.key,
        }
    }
}

// =============================================================================
// GSN Registry
// =============================================================================

/// Local node directory
pub struct GsnRegistry {
    store: SharedStore,
    events: EventBus,
    mode: RegistryMode,
}

impl GsnRegistry {
    pub fn new(store: SharedStore, mode: RegistryMode) -> Self {
        Self {
            store,
            events: EventBus::new(),
            mode,
        }
    }

    /// Get an event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<NetspaceEvent> {
        self.events.subscribe()
    }

    fn decode(&self, identity: &str, value: Value) -> Result<GsnEntry> {
        serde_json::from_value(value).map_err(|e| Error::corrupt(self.store.name(), identity, e))
    }

    fn load(&self, identity: &str) -> Result<Option<GsnEntry>> {
        match self.store.get(identity)? {
            Some(value) => self.decode(identity, value).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, identity: &str, entry: &GsnEntry) -> Result<()> {
        self.store.set(identity, serde_json::to_value(entry)?)
    }

    fn scan(
        &self,
        mut matches: impl FnMut(&GsnEntry) -> bool,
        first_only: bool,
    ) -> Result<Vec<NodeRecord>> {
        let mut found = Vec::new();
        for (identity, value) in self.store.all()? {
            let entry = self.decode(&identity, value)?;
            if matches(&entry) {
                found.push(entry.into_node(&identity));
                if first_only {
                    break;
                }
            }
        }
        Ok(found)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// First node whose address matches
    pub fn find_by_address(&self, address: &str) -> Result<Option<NodeRecord>> {
        Ok(self.scan(|e| e.address == address, true)?.pop())
    }

    /// First node whose hostname matches
    pub fn find_by_hostname(&self, host: &str) -> Result<Option<NodeRecord>> {
        Ok(self.scan(|e| e.host == host, true)?.pop())
    }

    /// Point lookup by identity
    pub fn find_by_identity(&self, identity: &str) -> Result<Option<NodeRecord>> {
        Ok(self.load(identity)?.map(|e| e.into_node(identity)))
    }

    /// All nodes holding any role in `mask`
    pub fn find_by_role(&self, mask: NodeRole) -> Result<Vec<NodeRecord>> {
        self.scan(|e| e.role.intersects(mask), false)
    }

    /// All nodes in exactly `state`
    pub fn find_by_state(&self, state: NodeState) -> Result<Vec<NodeRecord>> {
        self.scan(|e| e.state == state, false)
    }

    /// Every node in store order
    pub fn list_all(&self) -> Result<Vec<NodeRecord>> {
        self.scan(|_| true, false)
    }

    /// Number of registered nodes
    pub fn len(&self) -> Result<usize> {
        Ok(self.store.keys()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Register a new node
    ///
    /// Rejected if the identity is taken or any node already uses the
    /// hostname. The stored state is always `Disabled`.
    pub fn register(&self, node: &NodeRecord) -> Result<bool> {
        if self.store.get(&node.identity)?.is_some() {
            debug!(identity = %node.identity, "Register rejected: identity exists");
            return Ok(false);
        }
        if self.find_by_hostname(&node.host)?.is_some() {
            debug!(
                identity = %node.identity,
                host = %node.host,
                "Register rejected: hostname in use"
            );
            return Ok(false);
        }

        let mut entry = GsnEntry::from_node(node);
        entry.state = NodeState::Disabled;
        self.save(&node.identity, &entry)?;

        info!(identity = %node.identity, host = %node.host, "Registered GSN node");
        self.events.publish(NetspaceEvent::NodeRegistered {
            identity: node.identity.clone(),
            host: node.host.clone(),
            at: Utc::now(),
        });
        Ok(true)
    }

    /// Unregister a node
    ///
    /// Requires the identity to be present and some node (not necessarily
    /// this one) to be registered at `node.host`.
    pub fn unregister(&self, node: &NodeRecord) -> Result<bool> {
        if self.store.get(&node.identity)?.is_none() {
            debug!(identity = %node.identity, "Unregister rejected: unknown identity");
            return Ok(false);
        }
        if self.find_by_hostname(&node.host)?.is_none() {
            debug!(
                identity = %node.identity,
                host = %node.host,
                "Unregister rejected: unknown hostname"
            );
            return Ok(false);
        }

        self.store.delete(&node.identity)?;

        info!(identity = %node.identity, "Unregistered GSN node");
        self.events.publish(NetspaceEvent::NodeUnregistered {
            identity: node.identity.clone(),
            at: Utc::now(),
        });
        Ok(true)
    }

    /// Replace the stored state with `node.state`; other fields are untouched
    pub fn update(&self, node: &NodeRecord) -> Result<bool> {
        let Some(mut entry) = self.load(&node.identity)? else {
            debug!(identity = %node.identity, "Update rejected: unknown identity");
            return Ok(false);
        };

        entry.state = node.state;
        self.save(&node.identity, &entry)?;

        info!(identity = %node.identity, state = %node.state, "Updated GSN node state");
        self.events.publish(NetspaceEvent::NodeStateChanged {
            identity: node.identity.clone(),
            state: node.state,
            at: Utc::now(),
        });
        Ok(true)
    }

    /// Replace the stored address with `node.address` (testing mode only)
    pub fn update_address(&self, node: &NodeRecord) -> Result<bool> {
        if self.mode != RegistryMode::Testing {
            warn!(identity = %node.identity, "Address rewrite refused outside testing mode");
            return Ok(false);
        }
        let Some(mut entry) = self.load(&node.identity)? else {
            debug!(identity = %node.identity, "Address rewrite rejected: unknown identity");
            return Ok(false);
        };

        entry.address = node.address.clone();
        self.save(&node.identity, &entry)?;

        info!(identity = %node.identity, address = %node.address, "Rewrote GSN node address");
        self.events.publish(NetspaceEvent::NodeAddressChanged {
            identity: node.identity.clone(),
            address: node.address.clone(),
            at: Utc::now(),
        });
        Ok(true)
    }

    pub(crate) fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}

impl std::fmt::Debug for GsnRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GsnRegistry")
            .field("store", &self.store.name())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> GsnRegistry {
        GsnRegistry::new(Arc::new(MemoryStore::new("node_geosub")), RegistryMode::Testing)
    }

    fn node(identity: &str, host: &str, address: &str, role: NodeRole) -> NodeRecord {
        NodeRecord::new(
            identity,
            host,
            address,
            NodeService::Dvsp,
            NodeState::Enabled,
            role,
            format!("key-{}", identity),
        )
    }

    #[test]
    fn test_register_forces_disabled() {
        let gsn = registry();
        let alpha = node("alpha", "alpha.example", "10.0.0.1", NodeRole::HUB);

        assert!(gsn.register(&alpha).unwrap());

        let stored = gsn.find_by_identity("alpha").unwrap().unwrap();
        assert_eq!(stored.state, NodeState::Disabled);
        assert_eq!(stored, alpha.clone().with_state(NodeState::Disabled));
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let gsn = registry();
        assert!(gsn.register(&node("alpha", "alpha.example", "10.0.0.1", NodeRole::HUB)).unwrap());

        // Same identity, different host
        assert!(!gsn.register(&node("alpha", "other.example", "10.0.0.2", NodeRole::HUB)).unwrap());
        // Same host, different identity
        assert!(!gsn.register(&node("beta", "alpha.example", "10.0.0.3", NodeRole::ORG)).unwrap());

        assert_eq!(gsn.len().unwrap(), 1);
    }

    #[test]
    fn test_unregister() {
        let gsn = registry();
        let alpha = node("alpha", "alpha.example", "10.0.0.1", NodeRole::HUB);

        assert!(!gsn.unregister(&alpha).unwrap());

        gsn.register(&alpha).unwrap();
        assert!(gsn.unregister(&alpha).unwrap());
        assert_eq!(gsn.find_by_identity("alpha").unwrap(), None);
        assert!(gsn.is_empty().unwrap());
    }

    #[test]
    fn test_unregister_hostname_check_uses_any_entry() {
        let gsn = registry();
        gsn.register(&node("alpha", "alpha.example", "10.0.0.1", NodeRole::HUB)).unwrap();
        gsn.register(&node("beta", "beta.example", "10.0.0.2", NodeRole::HUB)).unwrap();

        // Unknown hostname blocks unregistration
        let stray = node("alpha", "nowhere.example", "10.0.0.1", NodeRole::HUB);
        assert!(!gsn.unregister(&stray).unwrap());

        // Another node's hostname is enough
        let borrowed = node("alpha", "beta.example", "10.0.0.1", NodeRole::HUB);
        assert!(gsn.unregister(&borrowed).unwrap());
        assert_eq!(gsn.find_by_identity("alpha").unwrap(), None);
        assert!(gsn.find_by_identity("beta").unwrap().is_some());
    }

    #[test]
    fn test_update_changes_only_state() {
        let gsn = registry();
        let alpha = node("alpha", "alpha.example", "10.0.0.1", NodeRole::HYBRID);
        assert!(!gsn.update(&alpha).unwrap());

        gsn.register(&alpha).unwrap();

        let mut change = NodeRecord::new(
            "alpha",
            "ignored.example",
            "0.0.0.0",
            NodeService::Http,
            NodeState::Elevated,
            NodeRole::UNKNOWN,
            "ignored",
        );
        assert!(gsn.update(&change).unwrap());

        let stored = gsn.find_by_identity("alpha").unwrap().unwrap();
        assert_eq!(stored, alpha.clone().with_state(NodeState::Elevated));

        change.state = NodeState::Enabled;
        gsn.update(&change).unwrap();
        assert_eq!(
            gsn.find_by_identity("alpha").unwrap().unwrap().state,
            NodeState::Enabled
        );
    }

    #[test]
    fn test_find_by_role() {
        let gsn = registry();
        gsn.register(&node("a", "a.example", "10.0.0.1", NodeRole::HUB)).unwrap();
        gsn.register(&node("b", "b.example", "10.0.0.2", NodeRole::ORG)).unwrap();
        gsn.register(&node("ab", "ab.example", "10.0.0.3", NodeRole::HYBRID)).unwrap();
        gsn.register(&node("none", "none.example", "10.0.0.4", NodeRole::UNKNOWN)).unwrap();

        let ids = |nodes: Vec<NodeRecord>| {
            nodes.into_iter().map(|n| n.identity).collect::<Vec<_>>()
        };

        assert_eq!(ids(gsn.find_by_role(NodeRole::HUB).unwrap()), vec!["a", "ab"]);
        assert_eq!(ids(gsn.find_by_role(NodeRole::ORG).unwrap()), vec!["b", "ab"]);
        assert_eq!(ids(gsn.find_by_role(NodeRole::HYBRID).unwrap()), vec!["a", "b", "ab"]);
        assert!(gsn.find_by_role(NodeRole::UNKNOWN).unwrap().is_empty());
    }

    #[test]
    fn test_find_by_address_and_hostname_return_first() {
        let gsn = registry();
        gsn.register(&node("one", "one.example", "10.0.0.9", NodeRole::HUB)).unwrap();
        gsn.register(&node("two", "two.example", "10.0.0.9", NodeRole::HUB)).unwrap();

        assert_eq!(gsn.find_by_address("10.0.0.9").unwrap().unwrap().identity, "one");
        assert_eq!(gsn.find_by_hostname("two.example").unwrap().unwrap().identity, "two");
        assert_eq!(gsn.find_by_address("10.9.9.9").unwrap(), None);
        assert_eq!(gsn.find_by_hostname("missing.example").unwrap(), None);
    }

    #[test]
    fn test_find_by_state_and_list_all() {
        let gsn = registry();
        gsn.register(&node("a", "a.example", "10.0.0.1", NodeRole::HUB)).unwrap();
        gsn.register(&node("b", "b.example", "10.0.0.2", NodeRole::HUB)).unwrap();
        gsn.update(&node("b", "b.example", "10.0.0.2", NodeRole::HUB)).unwrap();

        let disabled = gsn.find_by_state(NodeState::Disabled).unwrap();
        assert_eq!(disabled.len(), 1);
        assert_eq!(disabled[0].identity, "a");

        let enabled = gsn.find_by_state(NodeState::Enabled).unwrap();
        assert_eq!(enabled[0].identity, "b");

        let all: Vec<_> = gsn.list_all().unwrap().into_iter().map(|n| n.identity).collect();
        assert_eq!(all, vec!["a", "b"]);
    }

    #[test]
    fn test_update_address_requires_testing_mode() {
        let store = Arc::new(MemoryStore::new("node_geosub"));
        let live = GsnRegistry::new(store.clone(), RegistryMode::Live);
        let alpha = node("alpha", "alpha.example", "10.0.0.1", NodeRole::HUB);
        live.register(&alpha).unwrap();

        let moved = alpha.clone().with_address("10.1.1.1");
        assert!(!live.update_address(&moved).unwrap());

        let testing = GsnRegistry::new(store, RegistryMode::Testing);
        assert!(testing.update_address(&moved).unwrap());
        let stored = testing.find_by_identity("alpha").unwrap().unwrap();
        assert_eq!(stored.address, "10.1.1.1");
        assert_eq!(stored.state, NodeState::Disabled);
    }

    #[test]
    fn test_corrupt_entry_is_fatal() {
        let store = Arc::new(MemoryStore::new("node_geosub"));
        store.set("broken", json!({"host": "x"})).unwrap();
        let gsn = GsnRegistry::new(store, RegistryMode::Testing);

        let err = gsn.list_all().unwrap_err();
        assert!(err.is_fatal());
        assert_matches!(err, Error::CorruptEntry { key, .. } if key == "broken");
    }

    #[test]
    fn test_events_only_on_success() {
        let gsn = registry();
        let mut rx = gsn.subscribe();
        let alpha = node("alpha", "alpha.example", "10.0.0.1", NodeRole::HUB);

        gsn.register(&alpha).unwrap();
        gsn.register(&alpha).unwrap();
        gsn.unregister(&alpha).unwrap();

        assert_matches!(rx.try_recv(), Ok(NetspaceEvent::NodeRegistered { .. }));
        assert_matches!(rx.try_recv(), Ok(NetspaceEvent::NodeUnregistered { .. }));
        assert!(rx.try_recv().is_err());
    }
}
