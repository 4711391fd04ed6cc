//! Emulated network.
//!
//! An in-memory packet network shared by every node of a simulation. Each
//! registered address gets an inbox; sends land in the target's inbox unless
//! the loss policy drops them. Traffic is counted per node per direction.

use membership_core::transport::{Result, TransportError};
use membership_core::{Address, Transport};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Largest message the network will carry, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Most messages that may sit undelivered across all inboxes.
pub const DEFAULT_MAX_BUFFERED: usize = 30_000;

/// Random message loss during a window of logical time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossPolicy {
    /// Probability that a send inside the window is dropped
    pub probability: f64,
    /// First tick of the window (inclusive)
    pub start: i64,
    /// Last tick of the window (exclusive)
    pub end: i64,
}

impl LossPolicy {
    pub fn applies_at(&self, tick: i64) -> bool {
        tick >= self.start && tick < self.end
    }
}

/// Per-node traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficStats {
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
}

struct EmulNet {
    inboxes: HashMap<Address, VecDeque<Vec<u8>>>,
    stats: HashMap<Address, TrafficStats>,
    buffered: usize,
    max_buffered: usize,
    loss: Option<LossPolicy>,
    rng: StdRng,
    tick: i64,
}

impl EmulNet {
    fn should_drop(&mut self) -> bool {
        match self.loss {
            Some(loss) if loss.applies_at(self.tick) => self.rng.random_bool(loss.probability),
            _ => false,
        }
    }
}

/// Shared handle to the emulated network. Clone to share.
#[derive(Clone)]
pub struct Network {
    inner: Arc<Mutex<EmulNet>>,
}

impl Network {
    /// Lossless network with a fixed seed for loss decisions.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EmulNet {
                inboxes: HashMap::new(),
                stats: HashMap::new(),
                buffered: 0,
                max_buffered: DEFAULT_MAX_BUFFERED,
                loss: None,
                rng: StdRng::seed_from_u64(seed),
                tick: 0,
            })),
        }
    }

    /// Drop messages according to `loss`.
    pub fn with_loss(self, loss: LossPolicy) -> Self {
        self.lock().loss = Some(loss);
        self
    }

    /// Cap the number of undelivered messages.
    pub fn with_max_buffered(self, max_buffered: usize) -> Self {
        self.lock().max_buffered = max_buffered;
        self
    }

    /// Advance the network's notion of logical time (for the loss window).
    pub fn set_tick(&self, tick: i64) {
        self.lock().tick = tick;
    }

    /// Register an address and return its transport handle.
    pub fn attach(&self, address: Address) -> NetHandle {
        let mut net = self.lock();
        net.inboxes.entry(address).or_default();
        net.stats.entry(address).or_default();
        NetHandle {
            address,
            network: self.clone(),
        }
    }

    /// Traffic counters for one address.
    pub fn stats(&self, address: &Address) -> TrafficStats {
        self.lock().stats.get(address).copied().unwrap_or_default()
    }

    /// Traffic counters for every address, keyed by `id:port`.
    pub fn all_stats(&self) -> BTreeMap<String, TrafficStats> {
        let net = self.lock();
        let mut addresses: Vec<_> = net.stats.keys().copied().collect();
        addresses.sort();
        addresses
            .into_iter()
            .map(|a| (a.to_string(), net.stats[&a]))
            .collect()
    }

    /// Sum of the counters over every address.
    pub fn totals(&self) -> TrafficStats {
        self.lock()
            .stats
            .values()
            .fold(TrafficStats::default(), |acc, s| TrafficStats {
                sent: acc.sent + s.sent,
                received: acc.received + s.received,
                dropped: acc.dropped + s.dropped,
            })
    }

    /// Messages waiting in all inboxes.
    pub fn buffered(&self) -> usize {
        self.lock().buffered
    }

    fn lock(&self) -> MutexGuard<'_, EmulNet> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn send(&self, from: Address, to: &Address, data: &[u8]) -> Result<()> {
        if data.len() > MAX_MESSAGE_SIZE {
            return Err(TransportError::MessageTooLarge {
                size: data.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let mut net = self.lock();
        if !net.inboxes.contains_key(to) {
            return Err(TransportError::PeerNotFound(*to));
        }
        if net.buffered >= net.max_buffered {
            return Err(TransportError::SendFailed(format!(
                "network buffer full ({} messages)",
                net.max_buffered
            )));
        }

        let dropped = net.should_drop();
        let stats = net.stats.entry(from).or_default();
        stats.sent += 1;
        if dropped {
            // Lost in transit: the sender cannot tell
            stats.dropped += 1;
            return Ok(());
        }

        if let Some(inbox) = net.inboxes.get_mut(to) {
            inbox.push_back(data.to_vec());
        }
        net.buffered += 1;
        Ok(())
    }

    fn recv(&self, address: &Address) -> Option<Vec<u8>> {
        let mut net = self.lock();
        let data = net.inboxes.get_mut(address)?.pop_front()?;
        net.buffered -= 1;
        net.stats.entry(*address).or_default().received += 1;
        Some(data)
    }
}

/// One node's view of the emulated network.
pub struct NetHandle {
    address: Address,
    network: Network,
}

impl Transport for NetHandle {
    fn address(&self) -> Address {
        self.address
    }

    fn send(&mut self, to: &Address, data: &[u8]) -> Result<()> {
        self.network.send(self.address, to, data)
    }

    fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.network.recv(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: u32) -> Address {
        Address::new(id, 0)
    }

    #[test]
    fn test_lossless_delivery_and_counters() {
        let net = Network::new(1);
        let mut a = net.attach(addr(1));
        let mut b = net.attach(addr(2));

        a.send(&addr(2), b"one").unwrap();
        a.send(&addr(2), b"two").unwrap();
        assert_eq!(net.buffered(), 2);

        assert_eq!(b.try_recv(), Some(b"one".to_vec()));
        assert_eq!(b.try_recv(), Some(b"two".to_vec()));
        assert_eq!(b.try_recv(), None);
        assert_eq!(net.buffered(), 0);

        assert_eq!(
            net.stats(&addr(1)),
            TrafficStats {
                sent: 2,
                received: 0,
                dropped: 0,
            }
        );
        assert_eq!(net.stats(&addr(2)).received, 2);
        assert_eq!(net.totals().sent, 2);
    }

    #[test]
    fn test_unknown_target() {
        let net = Network::new(1);
        let mut a = net.attach(addr(1));
        assert!(matches!(
            a.send(&addr(5), b"x"),
            Err(TransportError::PeerNotFound(_))
        ));
    }

    #[test]
    fn test_total_loss_inside_window_only() {
        let net = Network::new(1).with_loss(LossPolicy {
            probability: 1.0,
            start: 10,
            end: 20,
        });
        let mut a = net.attach(addr(1));
        let mut b = net.attach(addr(2));

        net.set_tick(10);
        a.send(&addr(2), b"lost").unwrap();
        assert_eq!(b.try_recv(), None);
        assert_eq!(net.stats(&addr(1)).dropped, 1);

        net.set_tick(20);
        a.send(&addr(2), b"kept").unwrap();
        assert_eq!(b.try_recv(), Some(b"kept".to_vec()));

        net.set_tick(9);
        a.send(&addr(2), b"early").unwrap();
        assert_eq!(b.try_recv(), Some(b"early".to_vec()));
    }

    #[test]
    fn test_zero_probability_never_drops() {
        let net = Network::new(1).with_loss(LossPolicy {
            probability: 0.0,
            start: 0,
            end: i64::MAX,
        });
        let mut a = net.attach(addr(1));
        let _b = net.attach(addr(2));

        for _ in 0..100 {
            a.send(&addr(2), b"x").unwrap();
        }
        assert_eq!(net.buffered(), 100);
        assert_eq!(net.stats(&addr(1)).dropped, 0);
    }

    #[test]
    fn test_buffer_limit() {
        let net = Network::new(1).with_max_buffered(2);
        let mut a = net.attach(addr(1));
        let mut b = net.attach(addr(2));

        a.send(&addr(2), b"1").unwrap();
        a.send(&addr(2), b"2").unwrap();
        assert!(matches!(
            a.send(&addr(2), b"3"),
            Err(TransportError::SendFailed(_))
        ));

        b.try_recv();
        assert!(a.send(&addr(2), b"3").is_ok());
    }

    #[test]
    fn test_oversized_message_rejected() {
        let net = Network::new(1);
        let mut a = net.attach(addr(1));
        let _b = net.attach(addr(2));

        let big = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            a.send(&addr(2), &big),
            Err(TransportError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_all_stats_keyed_by_identity() {
        let net = Network::new(1);
        let mut a = net.attach(addr(2));
        let _b = net.attach(addr(1));
        a.send(&addr(1), b"x").unwrap();

        let stats = net.all_stats();
        let keys: Vec<_> = stats.keys().cloned().collect();
        assert_eq!(keys, vec!["1:0".to_string(), "2:0".to_string()]);
        assert_eq!(stats["2:0"].sent, 1);
    }
}
