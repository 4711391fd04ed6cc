//! Membership table for tracking known nodes.
//!
//! The table is the core data structure of the protocol. It tracks:
//! - Every node this node has heard of, keyed by identity
//! - The highest heartbeat seen for each node
//! - The local logical time at which that heartbeat was accepted
//!
//! The owning node's own entry is stored apart from its peers, so it can
//! never be overwritten by a remote merge or evicted by a sweep.

use crate::NodeIdentity;
use crate::protocol::WireEntry;
use std::collections::HashMap;

/// An entry in the membership table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipEntry {
    pub identity: NodeIdentity,
    /// Highest heartbeat seen for this node
    pub heartbeat: i64,
    /// Local logical time at which `heartbeat` was accepted
    pub last_updated: i64,
}

impl MembershipEntry {
    pub fn new(identity: NodeIdentity, heartbeat: i64, now: i64) -> Self {
        Self {
            identity,
            heartbeat,
            last_updated: now,
        }
    }

    /// Ticks since the last accepted heartbeat.
    pub fn age(&self, now: i64) -> i64 {
        now.saturating_sub(self.last_updated)
    }

    /// Whether this entry has gone `fail_timeout` ticks without news.
    pub fn is_suspected(&self, now: i64, fail_timeout: i64) -> bool {
        self.age(now) >= fail_timeout
    }

    /// Whether this entry has outlived `remove_timeout`.
    pub fn is_expired(&self, now: i64, remove_timeout: i64) -> bool {
        self.age(now) > remove_timeout
    }

    pub fn to_wire(&self) -> WireEntry {
        WireEntry::new(self.identity, self.heartbeat)
    }
}

/// Result of merging a remote heartbeat into the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First sight of this node
    Inserted,
    /// Heartbeat advanced
    Updated,
    /// Stale, duplicate, or about ourselves
    Unchanged,
}

impl MergeOutcome {
    pub fn is_inserted(self) -> bool {
        self == Self::Inserted
    }
}

/// Membership table owned by a single node.
#[derive(Debug, Clone)]
pub struct MembershipTable {
    /// Our own entry, exempt from merges and sweeps
    local: MembershipEntry,
    /// Every other known node
    peers: HashMap<NodeIdentity, MembershipEntry>,
}

impl MembershipTable {
    /// Create a table holding only the owning node, at heartbeat 0.
    pub fn new(local: NodeIdentity, now: i64) -> Self {
        Self {
            local: MembershipEntry::new(local, 0, now),
            peers: HashMap::new(),
        }
    }

    pub fn local_identity(&self) -> NodeIdentity {
        self.local.identity
    }

    pub fn self_entry(&self) -> &MembershipEntry {
        &self.local
    }

    /// Get an entry by identity (including our own).
    pub fn get(&self, identity: &NodeIdentity) -> Option<&MembershipEntry> {
        if *identity == self.local.identity {
            Some(&self.local)
        } else {
            self.peers.get(identity)
        }
    }

    pub fn contains(&self, identity: &NodeIdentity) -> bool {
        self.get(identity).is_some()
    }

    /// Number of entries, ourselves included. Never zero.
    pub fn len(&self) -> usize {
        self.peers.len() + 1
    }

    /// Always false: the table holds at least our own entry.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// All entries, ourselves first, peers in unspecified order.
    pub fn entries(&self) -> impl Iterator<Item = &MembershipEntry> {
        std::iter::once(&self.local).chain(self.peers.values())
    }

    /// All peer entries (excluding ourselves).
    pub fn peers(&self) -> impl Iterator<Item = &MembershipEntry> {
        self.peers.values()
    }

    /// Identities of every entry, sorted.
    pub fn identities(&self) -> Vec<NodeIdentity> {
        let mut ids: Vec<_> = self.entries().map(|e| e.identity).collect();
        ids.sort();
        ids
    }

    /// Whether `identity` is a peer that has gone quiet for `fail_timeout` ticks.
    pub fn is_suspected(&self, identity: &NodeIdentity, now: i64, fail_timeout: i64) -> bool {
        self.peers
            .get(identity)
            .map(|e| e.is_suspected(now, fail_timeout))
            .unwrap_or(false)
    }

    /// Merge a heartbeat heard from the network.
    ///
    /// Inserts unknown nodes, advances known ones only on a strictly greater
    /// heartbeat, and ignores anything about ourselves.
    pub fn merge_entry(&mut self, identity: NodeIdentity, heartbeat: i64, now: i64) -> MergeOutcome {
        if identity == self.local.identity {
            return MergeOutcome::Unchanged;
        }

        match self.peers.get_mut(&identity) {
            Some(existing) if heartbeat > existing.heartbeat => {
                existing.heartbeat = heartbeat;
                existing.last_updated = now;
                MergeOutcome::Updated
            }
            Some(_) => MergeOutcome::Unchanged,
            None => {
                self.peers
                    .insert(identity, MembershipEntry::new(identity, heartbeat, now));
                MergeOutcome::Inserted
            }
        }
    }

    /// Merge every entry of a received table.
    ///
    /// Returns the identities that were seen for the first time.
    pub fn merge_entries(&mut self, entries: &[WireEntry], now: i64) -> Vec<NodeIdentity> {
        entries
            .iter()
            .filter(|e| self.merge_entry(e.identity, e.heartbeat, now).is_inserted())
            .map(|e| e.identity)
            .collect()
    }

    /// Bump our own heartbeat by one.
    pub fn increment_self(&mut self, now: i64) {
        self.local.heartbeat = self.local.heartbeat.saturating_add(1);
        self.local.last_updated = now;
    }

    /// Evict peers older than `remove_timeout`.
    ///
    /// Peers at least `fail_timeout` old but not yet expired stay in the table
    /// as suspected. Returns the evicted identities.
    pub fn sweep(&mut self, now: i64, fail_timeout: i64, remove_timeout: i64) -> Vec<NodeIdentity> {
        debug_assert!(remove_timeout > fail_timeout);

        let mut removed: Vec<_> = self
            .peers
            .values()
            .filter(|e| e.is_expired(now, remove_timeout))
            .map(|e| e.identity)
            .collect();
        removed.sort();

        for identity in &removed {
            self.peers.remove(identity);
        }
        removed
    }

    /// Entries fit for an outbound message: ourselves plus every
    /// non-suspected peer. Order is unspecified.
    pub fn snapshot_live_entries(&self, now: i64, fail_timeout: i64) -> Vec<WireEntry> {
        std::iter::once(&self.local)
            .chain(self.peers.values().filter(|e| !e.is_suspected(now, fail_timeout)))
            .map(MembershipEntry::to_wire)
            .collect()
    }

    /// Non-suspected peers, sorted by identity so selection is reproducible.
    pub fn live_peers(&self, now: i64, fail_timeout: i64) -> Vec<&MembershipEntry> {
        let mut live: Vec<_> = self
            .peers
            .values()
            .filter(|e| !e.is_suspected(now, fail_timeout))
            .collect();
        live.sort_by_key(|e| e.identity);
        live
    }
}
