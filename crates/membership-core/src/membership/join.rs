//! Join protocol.
//!
//! A node either bootstraps the group (it is its own introducer) or sends a
//! join request to the introducer and waits for a join response:
//!
//! ```text
//! NotInGroup --(start, self is introducer)--> InGroup
//! NotInGroup --(JoinResponse received)------> InGroup
//! ```
//!
//! `InGroup` is terminal. There is no leave transition, and nothing here
//! retries a lost request on its own; see [`JoinProtocol::retry`].

use super::table::{MembershipTable, MergeOutcome};
use crate::protocol::{Message, WireEntry};
use crate::{Address, NodeIdentity};

/// Whether this node has joined the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinState {
    #[default]
    NotInGroup,
    InGroup,
}

/// What the caller must do after [`JoinProtocol::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinAction {
    /// This node is the introducer and now forms the group alone.
    Bootstrapped,
    /// Send `message` to the introducer at `to`.
    Request { to: Address, message: Message },
}

/// Reply to a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReply {
    /// How the requester's entry merged into our table
    pub outcome: MergeOutcome,
    pub to: Address,
    pub message: Message,
}

/// Join state machine for one node.
#[derive(Debug, Clone, Default)]
pub struct JoinProtocol {
    state: JoinState,
    introducer: Option<Address>,
}

impl JoinProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn is_in_group(&self) -> bool {
        self.state == JoinState::InGroup
    }

    /// Begin joining through `introducer`.
    pub fn start(&mut self, table: &MembershipTable, introducer: Address) -> JoinAction {
        self.introducer = Some(introducer);

        if introducer.identity() == table.local_identity() {
            self.state = JoinState::InGroup;
            return JoinAction::Bootstrapped;
        }

        JoinAction::Request {
            to: introducer,
            message: Self::request(table),
        }
    }

    /// Rebuild the join request while still waiting for a response.
    ///
    /// Returns `None` once in the group, or if `start` was never called.
    pub fn retry(&self, table: &MembershipTable) -> Option<(Address, Message)> {
        if self.is_in_group() {
            return None;
        }
        self.introducer.map(|to| (to, Self::request(table)))
    }

    fn request(table: &MembershipTable) -> Message {
        let local = table.self_entry();
        Message::join_request(local.identity, local.heartbeat)
    }

    /// Handle a join request from `requester`.
    ///
    /// Merges the requester into the table and builds a response carrying our
    /// live entries. Returns `None` if we are not in the group ourselves.
    pub fn on_request(
        &self,
        table: &mut MembershipTable,
        requester: NodeIdentity,
        heartbeat: i64,
        now: i64,
        fail_timeout: i64,
    ) -> Option<JoinReply> {
        if !self.is_in_group() {
            return None;
        }

        let outcome = table.merge_entry(requester, heartbeat, now);
        let message = Message::join_response(
            table.local_identity(),
            table.snapshot_live_entries(now, fail_timeout),
        );
        Some(JoinReply {
            outcome,
            to: requester.address(),
            message,
        })
    }

    /// Handle a join response.
    ///
    /// Merges every entry (never clearing what we already know) and enters
    /// the group if we were waiting. Returns newly inserted identities.
    pub fn on_response(
        &mut self,
        table: &mut MembershipTable,
        entries: &[WireEntry],
        now: i64,
    ) -> Vec<NodeIdentity> {
        let inserted = table.merge_entries(entries, now);
        self.state = JoinState::InGroup;
        inserted
    }
}
