//! Heartbeat-based gossip membership.
//!
//! Each node keeps a table of every node it has heard of, with the highest
//! heartbeat seen and the local time it arrived.
//!
//! # Protocol Overview
//!
//! **Joining:**
//! 1. The introducer bootstraps the group on its own
//! 2. Every other node sends the introducer a join request
//! 3. The introducer merges the requester and answers with its live table
//!
//! **Failure Detection:**
//! - Every round a node bumps its own heartbeat
//! - A peer whose heartbeat has not advanced for `fail_timeout` ticks is
//!   suspected: it stays in the table but is no longer gossiped to or about
//! - After `remove_timeout` ticks it is evicted
//!
//! **Gossip Dissemination:**
//! - Every round, send the live table to one random live peer
//! - Receivers keep the higher heartbeat for each entry

pub mod gossip;
pub mod join;
pub mod table;

pub use gossip::{Disseminator, GossipRound, PeerSelector, RandomSelector};
pub use join::{JoinAction, JoinProtocol, JoinReply, JoinState};
pub use table::{MembershipEntry, MembershipTable, MergeOutcome};
