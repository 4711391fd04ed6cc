//! membership-core: Gossip-based group membership protocol engine.
//!
//! This crate provides the core functionality for:
//! - Joining a group through an introducer node
//! - Tracking peer liveness with heartbeats and two-stage timeouts
//! - Disseminating the membership table by random single-peer gossip
//! - Encoding membership messages to a fixed binary layout
//!
//! The engine is single-threaded and tick-driven. It never blocks and never
//! opens sockets: packets go through the [`Transport`] trait and table
//! changes are reported through the [`Diagnostics`] trait.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod identity;
pub mod membership;
pub mod node;
pub mod protocol;
pub mod transport;

pub use config::{ConfigError, ProtocolConfig};
pub use events::{Diagnostics, EventBus, MembershipEvent, Subscription};
pub use identity::{Address, IdentityError, NodeIdentity};
pub use membership::{
    JoinState, MembershipEntry, MembershipTable, MergeOutcome, PeerSelector, RandomSelector,
};
pub use node::MembershipNode;
pub use protocol::{DecodeError, Message, MessageKind, WireEntry};
pub use transport::{MemoryNetwork, MemoryTransport, Transport, TransportError};
