//! Node Record
//!
//! The value type describing one netspace participant, the enum domains for
//! its service/state/role attributes, and the flattened textual form used by
//! bulk registration workflows.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

/// Number of comma-separated fields in a textual node description
pub const NODE_TEXT_FIELDS: usize = 7;

// =============================================================================
// Node Service
// =============================================================================

/// Protocol/service a node exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeService {
    #[default]
    Unspecified,
    Dvsp,
    Http,
}

impl NodeService {
    /// Ordinal used in the textual form
    pub fn ordinal(self) -> u8 {
        match self {
            NodeService::Unspecified => 0,
            NodeService::Dvsp => 1,
            NodeService::Http => 2,
        }
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeService::Unspecified),
            1 => Some(NodeService::Dvsp),
            2 => Some(NodeService::Http),
            _ => None,
        }
    }
}

impl fmt::Display for NodeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeService::Unspecified => write!(f, "unspecified"),
            NodeService::Dvsp => write!(f, "dvsp"),
            NodeService::Http => write!(f, "http"),
        }
    }
}

impl FromStr for NodeService {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Self::from_ordinal(n)
                .ok_or_else(|| Error::Validation(format!("unknown service ordinal: {}", n)));
        }
        match s.to_ascii_lowercase().as_str() {
            "unspecified" => Ok(NodeService::Unspecified),
            "dvsp" => Ok(NodeService::Dvsp),
            "http" => Ok(NodeService::Http),
            other => Err(Error::Validation(format!("unknown service: {}", other))),
        }
    }
}

// =============================================================================
// Node State
// =============================================================================

/// Operational status of a node; also the priority domain of root entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    #[default]
    Unspecified,
    Disabled,
    Enabled,
    Elevated,
    Unresponsive,
}

impl NodeState {
    /// Ordinal used in the textual form
    pub fn ordinal(self) -> u8 {
        match self {
            NodeState::Unspecified => 0,
            NodeState::Disabled => 1,
            NodeState::Enabled => 2,
            NodeState::Elevated => 3,
            NodeState::Unresponsive => 4,
        }
    }

    pub fn from_ordinal(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeState::Unspecified),
            1 => Some(NodeState::Disabled),
            2 => Some(NodeState::Enabled),
            3 => Some(NodeState::Elevated),
            4 => Some(NodeState::Unresponsive),
            _ => None,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Unspecified => write!(f, "unspecified"),
            NodeState::Disabled => write!(f, "disabled"),
            NodeState::Enabled => write!(f, "enabled"),
            NodeState::Elevated => write!(f, "elevated"),
            NodeState::Unresponsive => write!(f, "unresponsive"),
        }
    }
}

impl FromStr for NodeState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Self::from_ordinal(n)
                .ok_or_else(|| Error::Validation(format!("unknown state ordinal: {}", n)));
        }
        match s.to_ascii_lowercase().as_str() {
            "unspecified" => Ok(NodeState::Unspecified),
            "disabled" => Ok(NodeState::Disabled),
            "enabled" => Ok(NodeState::Enabled),
            "elevated" => Ok(NodeState::Elevated),
            "unresponsive" => Ok(NodeState::Unresponsive),
            other => Err(Error::Validation(format!("unknown state: {}", other))),
        }
    }
}

// =============================================================================
// Node Role
// =============================================================================

/// Capability bitfield; a node may hold several roles at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRole(u32);

impl NodeRole {
    pub const UNKNOWN: NodeRole = NodeRole(0);
    pub const HUB: NodeRole = NodeRole(1);
    pub const ORG: NodeRole = NodeRole(1 << 1);
    pub const HYBRID: NodeRole = NodeRole(Self::HUB.0 | Self::ORG.0);

    const NAMED: [(&'static str, NodeRole); 2] = [("hub", Self::HUB), ("org", Self::ORG)];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if any bit of `mask` is held
    #[inline]
    pub fn intersects(self, mask: NodeRole) -> bool {
        self.0 & mask.0 != 0
    }

    /// True if every bit of `other` is held
    #[inline]
    pub fn contains(self, other: NodeRole) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_unknown(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for NodeRole {
    type Output = NodeRole;

    fn bitor(self, rhs: NodeRole) -> NodeRole {
        NodeRole(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeRole {
    fn bitor_assign(&mut self, rhs: NodeRole) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for NodeRole {
    type Output = NodeRole;

    fn bitand(self, rhs: NodeRole) -> NodeRole {
        NodeRole(self.0 & rhs.0)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return write!(f, "unknown");
        }
        let mut rest = self.0;
        let mut first = true;
        for (name, role) in Self::NAMED {
            if self.contains(role) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                rest &= !role.0;
                first = false;
            }
        }
        if rest != 0 {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{:#x}", rest)?;
        }
        Ok(())
    }
}

impl FromStr for NodeRole {
    type Err = Error;

    /// Accepts an integer bitmask or names joined by `|`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(bits) = s.parse::<u32>() {
            return Ok(NodeRole(bits));
        }
        let mut role = NodeRole::UNKNOWN;
        for part in s.split('|') {
            match part.trim().to_ascii_lowercase().as_str() {
                "unknown" => {}
                "hub" => role |= NodeRole::HUB,
                "org" => role |= NodeRole::ORG,
                "hybrid" => role |= NodeRole::HYBRID,
                other => return Err(Error::Validation(format!("unknown role: {}", other))),
            }
        }
        Ok(role)
    }
}

// =============================================================================
// Node Record
// =============================================================================

/// One network participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Globally unique springname
    pub identity: String,
    pub host: String,
    pub address: String,
    pub service: NodeService,
    pub state: NodeState,
    pub role: NodeRole,
    /// Opaque credential
    pub key: String,
}

impl NodeRecord {
    pub fn new(
        identity: impl Into<String>,
        host: impl Into<String>,
        address: impl Into<String>,
        service: NodeService,
        state: NodeState,
        role: NodeRole,
        key: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            host: host.into(),
            address: address.into(),
            service,
            state,
            role,
            key: key.into(),
        }
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    pub fn with_service(mut self, service: NodeService) -> Self {
        self.service = service;
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }
}

/// Canonical textual form: `identity,host,address,service,state,role,key`
impl fmt::Display for NodeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{}",
            self.identity,
            self.host,
            self.address,
            self.service.ordinal(),
            self.state.ordinal(),
            self.role.bits(),
            self.key
        )
    }
}

/// Parse a canonical decimal field: digits only, no sign, no leading zero
fn canonical_number(field: &str, what: &str) -> Result<u32> {
    let canonical = !field.is_empty()
        && field.bytes().all(|b| b.is_ascii_digit())
        && (field == "0" || !field.starts_with('0'));
    if !canonical {
        return Err(Error::Validation(format!("{} must be a plain integer: {:?}", what, field)));
    }
    field
        .parse::<u32>()
        .map_err(|e| Error::Validation(format!("{} out of range: {:?} ({})", what, field, e)))
}

fn canonical_ordinal(field: &str, what: &str) -> Result<u8> {
    let n = canonical_number(field, what)?;
    u8::try_from(n).map_err(|_| Error::Validation(format!("unknown {} ordinal: {}", what, n)))
}

/// Accepts exactly the form written by `Display`, so every accepted
/// description serialises back to itself. Enum names are not accepted here;
/// use the `FromStr` impls of the individual enums for those.
impl FromStr for NodeRecord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let fields: Vec<&str> = s.split(',').collect();
        if fields.len() != NODE_TEXT_FIELDS {
            return Err(Error::Validation(format!(
                "node description needs {} fields, got {}",
                NODE_TEXT_FIELDS,
                fields.len()
            )));
        }

        if fields[0].is_empty() {
            return Err(Error::Validation("node identity is empty".into()));
        }

        let service = canonical_ordinal(fields[3], "service")?;
        let state = canonical_ordinal(fields[4], "state")?;

        Ok(NodeRecord {
            identity: fields[0].to_string(),
            host: fields[1].to_string(),
            address: fields[2].to_string(),
            service: NodeService::from_ordinal(service)
                .ok_or_else(|| Error::Validation(format!("unknown service ordinal: {}", service)))?,
            state: NodeState::from_ordinal(state)
                .ok_or_else(|| Error::Validation(format!("unknown state ordinal: {}", state)))?,
            role: NodeRole::from_bits(canonical_number(fields[5], "role")?),
            key: fields[6].to_string(),
        })
    }
}
