//! Membership protocol message types.

use super::codec::{self, DecodeError};
use crate::NodeIdentity;

/// Message kind, stored in the first byte of every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    JoinRequest = 0,
    JoinResponse = 1,
    Heartbeat = 2,
}

impl MessageKind {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::JoinRequest),
            1 => Some(Self::JoinResponse),
            2 => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// One `(identity, heartbeat)` record carried in a message.
///
/// Timestamps never travel on the wire; the receiver stamps its own
/// logical time when it accepts a newer heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireEntry {
    pub identity: NodeIdentity,
    pub heartbeat: i64,
}

impl WireEntry {
    pub fn new(identity: NodeIdentity, heartbeat: i64) -> Self {
        Self {
            identity,
            heartbeat,
        }
    }
}

/// Membership protocol messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Sent by a node that wants to join, carrying only its own heartbeat.
    JoinRequest {
        sender: NodeIdentity,
        heartbeat: i64,
    },

    /// Reply to a join request with the responder's live table.
    JoinResponse {
        sender: NodeIdentity,
        entries: Vec<WireEntry>,
    },

    /// Periodic gossip with the sender's live table.
    Heartbeat {
        sender: NodeIdentity,
        entries: Vec<WireEntry>,
    },
}

impl Message {
    pub fn join_request(sender: NodeIdentity, heartbeat: i64) -> Self {
        Self::JoinRequest { sender, heartbeat }
    }

    pub fn join_response(sender: NodeIdentity, entries: Vec<WireEntry>) -> Self {
        Self::JoinResponse { sender, entries }
    }

    pub fn heartbeat(sender: NodeIdentity, entries: Vec<WireEntry>) -> Self {
        Self::Heartbeat { sender, entries }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::JoinRequest { .. } => MessageKind::JoinRequest,
            Self::JoinResponse { .. } => MessageKind::JoinResponse,
            Self::Heartbeat { .. } => MessageKind::Heartbeat,
        }
    }

    pub fn sender(&self) -> NodeIdentity {
        match self {
            Self::JoinRequest { sender, .. }
            | Self::JoinResponse { sender, .. }
            | Self::Heartbeat { sender, .. } => *sender,
        }
    }

    /// Table entries carried by this message (empty for join requests).
    pub fn entries(&self) -> &[WireEntry] {
        match self {
            Self::JoinResponse { entries, .. } | Self::Heartbeat { entries, .. } => entries,
            Self::JoinRequest { .. } => &[],
        }
    }

    /// Encode to the fixed binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// Decode from the fixed binary layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        codec::decode(data)
    }
}
