//! Transport trait for sending and receiving membership messages.
//!
//! The protocol only needs fire-and-forget sends and a non-blocking inbound
//! queue; it never opens sockets or manages connections itself.
//!
//! Implementations:
//! - `MemoryTransport` - Lossless in-process delivery, for testing
//! - `NetHandle` (in membership-sim) - Emulated lossy network

use crate::Address;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer not found: {0}")]
    PeerNotFound(Address),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Packet transport used by a single node.
///
/// A transport handle is bound to the owning node's address, so `send`
/// does not take a source address.
pub trait Transport {
    /// Address of the node this handle belongs to.
    fn address(&self) -> Address;

    /// Queue `data` for delivery to `to`. Delivery is not guaranteed.
    fn send(&mut self, to: &Address, data: &[u8]) -> Result<()>;

    /// Pop the next inbound message, if any. Never blocks.
    fn try_recv(&mut self) -> Option<Vec<u8>>;
}

type Inboxes = HashMap<Address, VecDeque<Vec<u8>>>;

/// Shared in-memory network with one inbox per registered address.
///
/// Delivers every message, in order. Clone to share between handles.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inboxes: Arc<Mutex<Inboxes>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address and return its transport handle.
    pub fn connect(&self, address: Address) -> MemoryTransport {
        self.lock().entry(address).or_default();
        MemoryTransport {
            address,
            network: self.clone(),
        }
    }

    /// Number of messages waiting for `address`.
    pub fn pending(&self, address: &Address) -> usize {
        self.lock().get(address).map(VecDeque::len).unwrap_or(0)
    }

    /// Push raw bytes into an inbox, bypassing any sender.
    pub fn inject(&self, to: &Address, data: Vec<u8>) -> Result<()> {
        self.lock()
            .get_mut(to)
            .ok_or(TransportError::PeerNotFound(*to))?
            .push_back(data);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inboxes> {
        self.inboxes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle onto a [`MemoryNetwork`] for one address.
pub struct MemoryTransport {
    address: Address,
    network: MemoryNetwork,
}

impl Transport for MemoryTransport {
    fn address(&self) -> Address {
        self.address
    }

    fn send(&mut self, to: &Address, data: &[u8]) -> Result<()> {
        self.network.inject(to, data.to_vec())
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.network.lock().get_mut(&self.address)?.pop_front()
    }
}
