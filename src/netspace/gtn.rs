//! GTN Registry
//!
//! Directory of root nodes in the geo-topology network. Each entry records
//! that one node is a root of one geosub, keyed by `identity + "__" + geosub`.
//!
//! Root entries keep no state or role, so every record reconstructed from the
//! GTN reads `NodeState::Unspecified` and `NodeRole::UNKNOWN`.

use crate::domain::{NodeRecord, NodeRole, NodeService, NodeState};
use crate::error::{Error, Result};
use crate::netspace::events::{EventBus, NetspaceEvent};
use crate::store::SharedStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Separator between identity and geosub in a composite key
pub const COMPOSITE_KEY_SEPARATOR: &str = "__";

/// Build the GTN key for a (node, geosub) pair
pub fn composite_key(identity: &str, geosub: &str) -> String {
    format!("{}{}{}", identity, COMPOSITE_KEY_SEPARATOR, geosub)
}

/// Recover the node identity from a composite key and the geosub it ends with
///
/// Stripping the known suffix keeps identities ending in `_` intact; a key
/// without that suffix falls back to the text before the first separator.
pub fn identity_from_key<'a>(key: &'a str, geosub: &str) -> &'a str {
    key.strip_suffix(geosub)
        .and_then(|rest| rest.strip_suffix(COMPOSITE_KEY_SEPARATOR))
        .unwrap_or_else(|| key.split(COMPOSITE_KEY_SEPARATOR).next().unwrap_or(key))
}

// =============================================================================
// Root Registration
// =============================================================================

/// Fields persisted for a GTN root entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRegistration {
    pub host: String,
    pub address: String,
    pub service: NodeService,
    pub priority: NodeState,
    pub geosub: String,
    pub key: String,
}

impl RootRegistration {
    fn new(node: &NodeRecord, geosub: &str) -> Self {
        Self {
            host: node.host.clone(),
            address: node.address.clone(),
            service: node.service,
            priority: NodeState::Disabled,
            geosub: geosub.to_string(),
            key: node.key.clone(),
        }
    }

    /// Rebuild a node record; state and role are fixed defaults
    pub fn to_node(&self, identity: &str) -> NodeRecord {
        NodeRecord {
            identity: identity.to_string(),
            host: self.host.clone(),
            address: self.address.clone(),
            service: self.service,
            state: NodeState::Unspecified,
            role: NodeRole::UNKNOWN,
            key: self.key.clone(),
        }
    }
}

// =============================================================================
// GTN Registry
// =============================================================================

/// Root-node directory
pub struct GtnRegistry {
    store: SharedStore,
    events: EventBus,
}

impl GtnRegistry {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            events: EventBus::new(),
        }
    }

    /// Get an event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<NetspaceEvent> {
        self.events.subscribe()
    }

    fn decode(&self, key: &str, value: Value) -> Result<RootRegistration> {
        serde_json::from_value(value).map_err(|e| Error::corrupt(self.store.name(), key, e))
    }

    fn entries(&self) -> Result<Vec<(String, RootRegistration)>> {
        self.store
            .all()?
            .into_iter()
            .map(|(key, value)| {
                let entry = self.decode(&key, value)?;
                Ok((key, entry))
            })
            .collect()
    }

    fn validate(identity: &str, geosub: &str) -> Result<()> {
        if geosub.is_empty() {
            return Err(Error::Validation("geosub name is empty".into()));
        }
        if geosub.contains(COMPOSITE_KEY_SEPARATOR) {
            return Err(Error::Validation(format!(
                "geosub name {:?} contains {:?}",
                geosub, COMPOSITE_KEY_SEPARATOR
            )));
        }
        // ("a_", "g") and ("a", "_g") would share the key "a___g"
        if geosub.starts_with('_') {
            return Err(Error::Validation(format!("geosub name {:?} starts with '_'", geosub)));
        }
        if identity.contains(COMPOSITE_KEY_SEPARATOR) {
            return Err(Error::Validation(format!(
                "identity {:?} contains {:?}",
                identity, COMPOSITE_KEY_SEPARATOR
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Register `node` as a root of `geosub`
    pub fn register_root(&self, node: &NodeRecord, geosub: &str) -> Result<bool> {
        Self::validate(&node.identity, geosub)?;

        let key = composite_key(&node.identity, geosub);
        if self.store.get(&key)?.is_some() {
            debug!(identity = %node.identity, geosub, "Root register rejected: already a root");
            return Ok(false);
        }

        let entry = RootRegistration::new(node, geosub);
        self.store.set(&key, serde_json::to_value(&entry)?)?;

        info!(identity = %node.identity, geosub, "Registered GTN root");
        self.events.publish(NetspaceEvent::RootRegistered {
            identity: node.identity.clone(),
            geosub: geosub.to_string(),
            at: Utc::now(),
        });
        Ok(true)
    }

    /// Remove `node` as a root of `geosub`
    pub fn unregister_root(&self, node: &NodeRecord, geosub: &str) -> Result<bool> {
        let key = composite_key(&node.identity, geosub);
        if self.store.get(&key)?.is_none() {
            debug!(identity = %node.identity, geosub, "Root unregister rejected: not a root");
            return Ok(false);
        }

        self.store.delete(&key)?;

        info!(identity = %node.identity, geosub, "Unregistered GTN root");
        self.events.publish(NetspaceEvent::RootUnregistered {
            identity: node.identity.clone(),
            geosub: geosub.to_string(),
            at: Utc::now(),
        });
        Ok(true)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Roots registered against `geosub`, in store order
    pub fn roots_of(&self, geosub: &str) -> Result<Vec<NodeRecord>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|(_, entry)| entry.geosub == geosub)
            .map(|(key, entry)| entry.to_node(identity_from_key(&key, &entry.geosub)))
            .collect())
    }

    /// Point lookup of one root entry
    pub fn root_by_identity(&self, identity: &str, geosub: &str) -> Result<Option<NodeRecord>> {
        let key = composite_key(identity, geosub);
        match self.store.get(&key)? {
            Some(value) => Ok(Some(self.decode(&key, value)?.to_node(identity))),
            None => Ok(None),
        }
    }

    /// Raw root entry including priority and geosub
    pub fn registration(&self, identity: &str, geosub: &str) -> Result<Option<RootRegistration>> {
        let key = composite_key(identity, geosub);
        match self.store.get(&key)? {
            Some(value) => self.decode(&key, value).map(Some),
            None => Ok(None),
        }
    }

    /// Every root entry across all geosubs
    pub fn root_nodes(&self) -> Result<Vec<NodeRecord>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|(key, entry)| entry.to_node(identity_from_key(&key, &entry.geosub)))
            .collect())
    }

    /// Distinct geosub names in first-seen order
    pub fn geosubs(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for (_, entry) in self.entries()? {
            if !names.contains(&entry.geosub) {
                names.push(entry.geosub);
            }
        }
        Ok(names)
    }

    pub(crate) fn clear(&self) -> Result<()> {
        self.store.clear()
    }
}

impl std::fmt::Debug for GtnRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GtnRegistry")
            .field("store", &self.store.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn registry() -> GtnRegistry {
        GtnRegistry::new(Arc::new(MemoryStore::new("node_geotop")))
    }

    fn node(identity: &str) -> NodeRecord {
        NodeRecord::new(
            identity,
            format!("{}.example", identity),
            "10.0.0.1",
            NodeService::Dvsp,
            NodeState::Enabled,
            NodeRole::HYBRID,
            "secret",
        )
    }

    #[test]
    fn test_composite_key() {
        assert_eq!(composite_key("alpha", "esusx"), "alpha__esusx");
        assert_eq!(identity_from_key("alpha__esusx", "esusx"), "alpha");
        assert_eq!(identity_from_key("alpha___esusx", "esusx"), "alpha_");
        assert_eq!(identity_from_key("plain", "esusx"), "plain");
    }

    #[test]
    fn test_register_same_node_in_two_geosubs() {
        let gtn = registry();
        let alpha = node("alpha");

        assert!(gtn.register_root(&alpha, "g1").unwrap());
        assert!(gtn.register_root(&alpha, "g2").unwrap());
        assert!(!gtn.register_root(&alpha, "g1").unwrap());

        let roots = gtn.roots_of("g1").unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].identity, "alpha");
        assert_eq!(roots[0].state, NodeState::Unspecified);
        assert_eq!(roots[0].role, NodeRole::UNKNOWN);
        assert_eq!(roots[0].host, "alpha.example");
        assert_eq!(roots[0].key, "secret");
    }

    #[test]
    fn test_registration_defaults_priority() {
        let gtn = registry();
        gtn.register_root(&node("alpha"), "g1").unwrap();

        let entry = gtn.registration("alpha", "g1").unwrap().unwrap();
        assert_eq!(entry.priority, NodeState::Disabled);
        assert_eq!(entry.geosub, "g1");
        assert_eq!(entry.service, NodeService::Dvsp);
    }

    #[test]
    fn test_unregister_root() {
        let gtn = registry();
        let alpha = node("alpha");

        assert!(!gtn.unregister_root(&alpha, "g1").unwrap());

        gtn.register_root(&alpha, "g1").unwrap();
        gtn.register_root(&alpha, "g2").unwrap();
        assert!(gtn.unregister_root(&alpha, "g1").unwrap());

        assert_eq!(gtn.root_by_identity("alpha", "g1").unwrap(), None);
        assert!(gtn.root_by_identity("alpha", "g2").unwrap().is_some());
    }

    #[test]
    fn test_root_by_identity() {
        let gtn = registry();
        gtn.register_root(&node("alpha"), "g1").unwrap();

        let root = gtn.root_by_identity("alpha", "g1").unwrap().unwrap();
        assert_eq!(root.identity, "alpha");
        assert_eq!(root.state, NodeState::Unspecified);
        assert_eq!(gtn.root_by_identity("alpha", "g2").unwrap(), None);
        assert_eq!(gtn.root_by_identity("beta", "g1").unwrap(), None);
    }

    #[test]
    fn test_geosubs_and_root_nodes() {
        let gtn = registry();
        gtn.register_root(&node("alpha"), "g1").unwrap();
        gtn.register_root(&node("beta"), "g2").unwrap();
        gtn.register_root(&node("gamma"), "g1").unwrap();

        assert_eq!(gtn.geosubs().unwrap(), vec!["g1", "g2"]);

        let ids: Vec<_> = gtn.root_nodes().unwrap().into_iter().map(|n| n.identity).collect();
        assert_eq!(ids, vec!["alpha", "beta", "gamma"]);

        let g1: Vec<_> = gtn.roots_of("g1").unwrap().into_iter().map(|n| n.identity).collect();
        assert_eq!(g1, vec!["alpha", "gamma"]);
    }

    #[test]
    fn test_identity_ending_in_underscore() {
        let gtn = registry();
        gtn.register_root(&node("alpha_"), "g1").unwrap();
        gtn.register_root(&node("beta__"), "g2").unwrap_err();
        gtn.register_root(&node("gamma"), "g3").unwrap();

        let direct = gtn.root_by_identity("alpha_", "g1").unwrap().unwrap();
        let listed = gtn.roots_of("g1").unwrap();
        assert_eq!(listed, vec![direct]);
        assert_eq!(listed[0].identity, "alpha_");

        let ids: Vec<_> = gtn.root_nodes().unwrap().into_iter().map(|n| n.identity).collect();
        assert_eq!(ids, vec!["alpha_", "gamma"]);
        assert_eq!(gtn.roots_of("g3").unwrap()[0].identity, "gamma");

        // Would collide with alpha_ under g1
        assert_matches!(gtn.register_root(&node("alpha"), "_g1"), Err(Error::Validation(_)));
    }

    #[test]
    fn test_rejects_ambiguous_keys() {
        let gtn = registry();

        assert_matches!(gtn.register_root(&node("alpha"), "bad__name"), Err(Error::Validation(_)));
        assert_matches!(gtn.register_root(&node("al__pha"), "g1"), Err(Error::Validation(_)));
        assert_matches!(gtn.register_root(&node("alpha"), ""), Err(Error::Validation(_)));
        assert!(gtn.root_nodes().unwrap().is_empty());
    }

    #[test]
    fn test_root_events() {
        let gtn = registry();
        let mut rx = gtn.subscribe();
        gtn.register_root(&node("alpha"), "g1").unwrap();

        let event = rx.try_recv().unwrap();
        assert!(event.is_root_event());
        assert_eq!(event.geosub(), Some("g1"));
    }
}
