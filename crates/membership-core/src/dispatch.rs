//! Inbound message dispatch.
//!
//! Decodes a raw buffer and routes it by kind. Malformed input is dropped:
//! transports are unreliable and a bad buffer must never take a node down.

use crate::membership::PeerSelector;
use crate::node::MembershipNode;
use crate::protocol::{Message, WireEntry, codec};
use crate::transport::Transport;
use crate::NodeIdentity;
use tracing::{debug, info};

impl<T: Transport, S: PeerSelector> MembershipNode<T, S> {
    /// Handle one inbound buffer at the current logical time.
    ///
    /// Returns false if the buffer was dropped (malformed, or a join request
    /// we cannot answer yet).
    pub fn dispatch(&mut self, data: &[u8]) -> bool {
        let message = match codec::decode(data) {
            Ok(message) => message,
            Err(e) => {
                debug!(node = %self.identity, error = %e, len = data.len(), "Dropping malformed message");
                return false;
            }
        };

        match message {
            Message::JoinRequest { sender, heartbeat } => self.on_join_request(sender, heartbeat),
            Message::JoinResponse { sender, entries } => self.on_join_response(sender, &entries),
            Message::Heartbeat { sender, entries } => self.on_heartbeat(sender, &entries),
        }
    }

    fn on_join_request(&mut self, requester: NodeIdentity, heartbeat: i64) -> bool {
        let Some(reply) = self.join.on_request(
            &mut self.table,
            requester,
            heartbeat,
            self.now,
            self.config.fail_timeout,
        ) else {
            debug!(node = %self.identity, requester = %requester, "Not in group, ignoring join request");
            return false;
        };

        if reply.outcome.is_inserted() {
            info!(node = %self.identity, joined = %requester, "Node joined");
            self.notify_added(requester);
        }
        self.send(&reply.to, &reply.message);
        true
    }

    fn on_join_response(&mut self, sender: NodeIdentity, entries: &[WireEntry]) -> bool {
        let was_in_group = self.join.is_in_group();
        let inserted = self.join.on_response(&mut self.table, entries, self.now);

        if !was_in_group {
            info!(node = %self.identity, introducer = %sender, members = self.table.len(), "Joined group");
        }
        self.report_inserted(&inserted);
        true
    }

    fn on_heartbeat(&mut self, sender: NodeIdentity, entries: &[WireEntry]) -> bool {
        let inserted = self.table.merge_entries(entries, self.now);
        debug!(node = %self.identity, from = %sender, entries = entries.len(), new = inserted.len(), "Merged heartbeat");
        self.report_inserted(&inserted);
        true
    }

    fn report_inserted(&self, inserted: &[NodeIdentity]) {
        for node in inserted {
            self.notify_added(*node);
        }
    }
}
