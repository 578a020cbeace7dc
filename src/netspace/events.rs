//! Netspace Events
//!
//! Events emitted by the registries for external consumers to react to
//! netspace changes. Only successful mutations produce an event.

use crate::domain::NodeState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of each registry's event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the netspace registries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NetspaceEvent {
    /// A node joined the GSN
    NodeRegistered {
        identity: String,
        host: String,
        at: DateTime<Utc>,
    },

    /// A node left the GSN
    NodeUnregistered { identity: String, at: DateTime<Utc> },

    /// A node's state was replaced
    NodeStateChanged {
        identity: String,
        state: NodeState,
        at: DateTime<Utc>,
    },

    /// A node's address was replaced (testing mode)
    NodeAddressChanged {
        identity: String,
        address: String,
        at: DateTime<Utc>,
    },

    /// A node became a root of a geosub
    RootRegistered {
        identity: String,
        geosub: String,
        at: DateTime<Utc>,
    },

    /// A node stopped being a root of a geosub
    RootUnregistered {
        identity: String,
        geosub: String,
        at: DateTime<Utc>,
    },

    /// Both stores were wiped (testing mode)
    Reset { at: DateTime<Utc> },
}

impl NetspaceEvent {
    /// Identity of the node this event concerns, if any
    pub fn identity(&self) -> Option<&str> {
        match self {
            NetspaceEvent::NodeRegistered { identity, .. }
            | NetspaceEvent::NodeUnregistered { identity, .. }
            | NetspaceEvent::NodeStateChanged { identity, .. }
            | NetspaceEvent::NodeAddressChanged { identity, .. }
            | NetspaceEvent::RootRegistered { identity, .. }
            | NetspaceEvent::RootUnregistered { identity, .. } => Some(identity),
            NetspaceEvent::Reset { .. } => None,
        }
    }

    /// Check if this event came from the GTN
    pub fn is_root_event(&self) -> bool {
        matches!(
            self,
            NetspaceEvent::RootRegistered { .. } | NetspaceEvent::RootUnregistered { .. }
        )
    }

    /// Geosub name for root events
    pub fn geosub(&self) -> Option<&str> {
        match self {
            NetspaceEvent::RootRegistered { geosub, .. }
            | NetspaceEvent::RootUnregistered { geosub, .. } => Some(geosub),
            _ => None,
        }
    }
}

/// Broadcast sender shared by a registry and its subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NetspaceEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetspaceEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: NetspaceEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
