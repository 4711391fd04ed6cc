//! Protocol driver for a single node.
//!
//! [`MembershipNode`] wires the table, join protocol, and disseminator to a
//! transport. The outer loop calls [`start`](MembershipNode::start) once and
//! then [`tick`](MembershipNode::tick) once per logical time unit. Each tick
//! drains every queued inbound message before gossiping, so the table a round
//! gossips already reflects everything that arrived before the tick.

use crate::events::Diagnostics;
use crate::membership::{
    Disseminator, JoinAction, JoinProtocol, JoinState, MembershipTable, PeerSelector,
    RandomSelector,
};
use crate::protocol::Message;
use crate::transport::Transport;
use crate::{Address, ConfigError, NodeIdentity, ProtocolConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A single member of the group.
pub struct MembershipNode<T, S = RandomSelector> {
    pub(crate) identity: NodeIdentity,
    pub(crate) config: ProtocolConfig,
    pub(crate) table: MembershipTable,
    pub(crate) join: JoinProtocol,
    pub(crate) disseminator: Disseminator<S>,
    pub(crate) transport: T,
    pub(crate) diagnostics: Option<Arc<dyn Diagnostics>>,
    /// Logical time of the current (or last) tick
    pub(crate) now: i64,
    /// Crash-stopped: ignores every tick
    failed: bool,
}

impl<T: Transport> MembershipNode<T> {
    /// Create a node whose identity is derived from the transport's address.
    pub fn new(config: ProtocolConfig, transport: T) -> Result<Self, ConfigError> {
        Self::with_selector(config, transport, RandomSelector::new())
    }
}

impl<T: Transport, S: PeerSelector> MembershipNode<T, S> {
    /// Create a node with an explicit gossip target selector.
    pub fn with_selector(
        config: ProtocolConfig,
        transport: T,
        selector: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let identity = transport.address().identity();

        Ok(Self {
            identity,
            config,
            table: MembershipTable::new(identity, 0),
            join: JoinProtocol::new(),
            disseminator: Disseminator::new(selector),
            transport,
            diagnostics: None,
            now: 0,
            failed: false,
        })
    }

    /// Report table changes to `diagnostics`.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn identity(&self) -> NodeIdentity {
        self.identity
    }

    pub fn address(&self) -> Address {
        self.identity.address()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn table(&self) -> &MembershipTable {
        &self.table
    }

    pub fn join_state(&self) -> JoinState {
        self.join.state()
    }

    pub fn is_in_group(&self) -> bool {
        self.join.is_in_group()
    }

    /// Logical time of the most recent tick.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Join the group through `introducer`.
    ///
    /// If `introducer` is this node, it bootstraps the group immediately.
    /// Otherwise a join request is sent and the node waits for a response.
    pub fn start(&mut self, introducer: Address) {
        match self.join.start(&self.table, introducer) {
            JoinAction::Bootstrapped => {
                info!(node = %self.identity, "Starting up group");
            }
            JoinAction::Request { to, message } => {
                info!(node = %self.identity, introducer = %to, "Trying to join");
                self.send(&to, &message);
            }
        }
    }

    /// Resend the join request if no response has arrived yet.
    ///
    /// Returns true if a request was sent.
    pub fn retry_join(&mut self) -> bool {
        match self.join.retry(&self.table) {
            Some((to, message)) => {
                debug!(node = %self.identity, introducer = %to, "Retrying join");
                self.send(&to, &message);
                true
            }
            None => false,
        }
    }

    /// Advance the protocol to logical time `now`.
    pub fn tick(&mut self, now: i64) {
        if self.failed {
            return;
        }
        self.now = now;

        while let Some(data) = self.transport.try_recv() {
            self.dispatch(&data);
        }

        if !self.join.is_in_group() {
            return;
        }

        let round = self.disseminator.run(&mut self.table, &self.config, now);
        for node in &round.removed {
            info!(node = %self.identity, removed = %node, "Removed failed node");
            self.notify_removed(*node);
        }
        if let Some((to, message)) = round.outbound {
            self.send(&to, &message);
        }
    }

    /// Heartbeat message carrying our current live entries.
    pub fn gossip_message(&self) -> Message {
        Message::heartbeat(
            self.identity,
            self.table
                .snapshot_live_entries(self.now, self.config.fail_timeout),
        )
    }

    /// Crash-stop this node. Every later tick is ignored.
    pub fn fail(&mut self) {
        warn!(node = %self.identity, "Node failed");
        self.failed = true;
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Fire-and-forget send; failures are logged and dropped.
    pub(crate) fn send(&mut self, to: &Address, message: &Message) {
        let data = message.to_bytes();
        if let Err(e) = self.transport.send(to, &data) {
            warn!(node = %self.identity, to = %to, error = %e, "Send failed");
        }
    }

    pub(crate) fn notify_added(&self, node: NodeIdentity) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.node_added(self.identity, node);
        }
    }

    pub(crate) fn notify_removed(&self, node: NodeIdentity) {
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.node_removed(self.identity, node);
        }
    }
}
