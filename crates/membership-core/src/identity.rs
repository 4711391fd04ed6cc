//! NodeIdentity: Unique identifier for a node in the membership group.
//!
//! A node's identity is derived once from its 6-byte network address
//! (4-byte id + 2-byte port) and never changes afterwards. Displays as
//! `id:port` for logs and parses from the same form.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid node identity format: expected \"id:port\"")]
    InvalidFormat,
    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),
}

/// Size of an [`Address`] in bytes.
pub const ADDRESS_LEN: usize = 6;

/// A raw network address as the transport sees it.
///
/// Bytes 0..4 hold the node id and bytes 4..6 the port, both little-endian.
/// Conversion to and from [`NodeIdentity`] is lossless, so a gossip target's
/// address can always be rebuilt from its table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Build the address for a given id and port.
    pub fn new(id: u32, port: u16) -> Self {
        NodeIdentity::new(id, port).address()
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// The identity this address belongs to.
    pub fn identity(&self) -> NodeIdentity {
        let [a, b, c, d, p0, p1] = self.0;
        NodeIdentity {
            id: u32::from_le_bytes([a, b, c, d]),
            port: u16::from_le_bytes([p0, p1]),
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.identity(), f)
    }
}

impl From<NodeIdentity> for Address {
    fn from(identity: NodeIdentity) -> Self {
        identity.address()
    }
}

/// The key of a membership table entry.
///
/// # Examples
/// ```
/// use membership_core::NodeIdentity;
///
/// let identity = NodeIdentity::new(2, 0);
/// assert_eq!(identity.to_string(), "2:0");
///
/// let parsed: NodeIdentity = "2:0".parse().unwrap();
/// assert_eq!(parsed, identity);
/// assert_eq!(parsed.address().identity(), identity);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdentity {
    id: u32,
    port: u16,
}

impl NodeIdentity {
    pub const fn new(id: u32, port: u16) -> Self {
        Self { id, port }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Rebuild the network address this identity was derived from.
    pub fn address(&self) -> Address {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[..4].copy_from_slice(&self.id.to_le_bytes());
        bytes[4..].copy_from_slice(&self.port.to_le_bytes());
        Address(bytes)
    }
}

impl Display for NodeIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.port)
    }
}

impl FromStr for NodeIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, port) = s.split_once(':').ok_or(IdentityError::InvalidFormat)?;
        if id.is_empty() || port.is_empty() {
            return Err(IdentityError::InvalidFormat);
        }
        Ok(Self {
            id: id.parse()?,
            port: port.parse()?,
        })
    }
}

impl From<Address> for NodeIdentity {
    fn from(address: Address) -> Self {
        address.identity()
    }
}

// Serialize as "id:port" for consistency in logs and JSON reports
impl serde::Serialize for NodeIdentity {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for NodeIdentity {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
