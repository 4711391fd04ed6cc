//! Gossip dissemination.
//!
//! Runs once per tick while the node is in the group:
//! 1. Sweep expired peers out of the table
//! 2. Past warm-up, with at least one peer known, bump our own heartbeat
//! 3. Pick one random non-suspected peer
//! 4. Send it a heartbeat carrying our live entries
//!
//! One target per round with full-table payloads spreads every heartbeat to
//! every live node in O(log N) expected rounds.

use super::table::MembershipTable;
use crate::protocol::Message;
use crate::{Address, NodeIdentity, ProtocolConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of randomness for gossip target selection.
pub trait PeerSelector {
    /// Pick an index in `0..candidates`, or `None` if `candidates == 0`.
    fn select(&mut self, candidates: usize) -> Option<usize>;
}

/// Uniform random selection backed by a seedable PRNG.
#[derive(Debug, Clone)]
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    /// Seed from the thread-local generator.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Deterministic selector for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerSelector for RandomSelector {
    fn select(&mut self, candidates: usize) -> Option<usize> {
        if candidates == 0 {
            return None;
        }
        Some(self.rng.random_range(0..candidates))
    }
}

/// Outcome of one gossip round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GossipRound {
    /// Peers evicted by the sweep
    pub removed: Vec<NodeIdentity>,
    /// Whether our own heartbeat was bumped
    pub incremented: bool,
    /// Heartbeat to send, and where
    pub outbound: Option<(Address, Message)>,
}

/// Periodic gossip driver.
#[derive(Debug, Clone)]
pub struct Disseminator<S> {
    selector: S,
}

impl<S: PeerSelector> Disseminator<S> {
    pub fn new(selector: S) -> Self {
        Self { selector }
    }

    /// Run one round at logical time `now`.
    pub fn run(
        &mut self,
        table: &mut MembershipTable,
        config: &ProtocolConfig,
        now: i64,
    ) -> GossipRound {
        let removed = table.sweep(now, config.fail_timeout, config.remove_timeout);

        // A lone node has nobody to gossip with
        if table.len() < 2 || !config.is_warmed_up(now) {
            return GossipRound {
                removed,
                ..GossipRound::default()
            };
        }

        table.increment_self(now);

        let target = {
            let live = table.live_peers(now, config.fail_timeout);
            self.selector
                .select(live.len())
                .and_then(|i| live.get(i).map(|e| e.identity))
        };

        let outbound = target.map(|target| {
            let message = Message::heartbeat(
                table.local_identity(),
                table.snapshot_live_entries(now, config.fail_timeout),
            );
            (target.address(), message)
        });

        GossipRound {
            removed,
            incremented: true,
            outbound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WireEntry;

    /// Always picks the first candidate.
    struct FirstSelector;

    impl PeerSelector for FirstSelector {
        fn select(&mut self, candidates: usize) -> Option<usize> {
            (candidates > 0).then_some(0)
        }
    }

    fn node(id: u32) -> NodeIdentity {
        NodeIdentity::new(id, 0)
    }

    fn config() -> ProtocolConfig {
        ProtocolConfig::default()
    }

    #[test]
    fn test_lone_node_stays_quiet() {
        let mut table = MembershipTable::new(node(1), 0);
        let mut gossip = Disseminator::new(FirstSelector);

        let round = gossip.run(&mut table, &config(), 10);

        assert_eq!(round, GossipRound::default());
        assert_eq!(table.self_entry().heartbeat, 0);
    }

    #[test]
    fn test_no_gossip_during_warmup() {
        let mut table = MembershipTable::new(node(1), 0);
        table.merge_entry(node(2), 0, 1);
        let mut gossip = Disseminator::new(FirstSelector);

        let round = gossip.run(&mut table, &config(), config().warmup_ticks);

        assert!(!round.incremented);
        assert!(round.outbound.is_none());
        assert_eq!(table.self_entry().heartbeat, 0);
    }

    #[test]
    fn test_round_increments_and_targets_live_peer() {
        let mut table = MembershipTable::new(node(1), 0);
        table.merge_entry(node(2), 3, 4);
        let mut gossip = Disseminator::new(FirstSelector);

        let round = gossip.run(&mut table, &config(), 5);

        assert!(round.incremented);
        assert_eq!(table.self_entry().heartbeat, 1);
        let (to, message) = round.outbound.unwrap();
        assert_eq!(to, node(2).address());

        let mut entries = message.entries().to_vec();
        entries.sort_by_key(|e| e.identity);
        assert_eq!(
            entries,
            vec![WireEntry::new(node(1), 1), WireEntry::new(node(2), 3)]
        );
    }

    #[test]
    fn test_suspected_peers_never_targeted() {
        let mut table = MembershipTable::new(node(1), 0);
        table.merge_entry(node(2), 0, 0); // suspected at now=10
        table.merge_entry(node(3), 0, 9);
        let mut gossip = Disseminator::new(FirstSelector);

        let round = gossip.run(&mut table, &config(), 10);

        let (to, message) = round.outbound.unwrap();
        assert_eq!(to, node(3).address());
        assert!(message.entries().iter().all(|e| e.identity != node(2)));
    }

    #[test]
    fn test_all_peers_suspected_skips_send() {
        let mut table = MembershipTable::new(node(1), 0);
        table.merge_entry(node(2), 0, 0);
        let mut gossip = Disseminator::new(FirstSelector);

        let round = gossip.run(&mut table, &config(), 10);

        // Still counts as a round with peers, so we keep beating
        assert!(round.incremented);
        assert!(round.outbound.is_none());
        assert!(table.contains(&node(2)));
    }

    #[test]
    fn test_sweep_runs_before_selection() {
        let mut table = MembershipTable::new(node(1), 0);
        table.merge_entry(node(2), 0, 0);
        let mut gossip = Disseminator::new(FirstSelector);

        let round = gossip.run(&mut table, &config(), 21);

        assert_eq!(round.removed, vec![node(2)]);
        assert!(!round.incremented);
        assert!(round.outbound.is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_random_selector_bounds() {
        let mut selector = RandomSelector::seeded(7);
        assert_eq!(selector.select(0), None);
        for _ in 0..100 {
            assert!(selector.select(3).unwrap() < 3);
        }
        assert_eq!(selector.select(1), Some(0));
    }

    #[test]
    fn test_seeded_selectors_agree() {
        let mut a = RandomSelector::seeded(42);
        let mut b = RandomSelector::seeded(42);
        let picks_a: Vec<_> = (0..20).map(|_| a.select(10)).collect();
        let picks_b: Vec<_> = (0..20).map(|_| b.select(10)).collect();
        assert_eq!(picks_a, picks_b);
    }
}
