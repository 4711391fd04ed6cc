//! Tick-driven simulation of a whole group.
//!
//! Every node lives in this process and talks over the emulated [`Network`].
//! Node 1 bootstraps the group and introduces everyone else. Nodes start
//! `join_interval` ticks apart, crash according to the scenario's failure
//! mode, and report table changes into a shared [`EventLog`].

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use membership_core::{
    EventBus, MembershipEvent, MembershipNode, NodeIdentity, RandomSelector, Subscription,
};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::log::EventLog;
use crate::network::{LossPolicy, NetHandle, Network, TrafficStats};
use crate::scenario::{FailureMode, Scenario};

/// Every node uses the same port; identities differ by id alone.
pub const NODE_PORT: u16 = 0;

type SimNode = MembershipNode<NetHandle>;

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Seed the run used (replay with `--seed`)
    pub seed: u64,
    /// Last tick executed
    pub ticks: i64,
    pub failed: Vec<NodeIdentity>,
    /// Final table of every surviving node, keyed by `id:port`
    pub views: BTreeMap<String, Vec<NodeIdentity>>,
    /// Every survivor lists every other survivor
    pub complete: bool,
    /// No survivor still lists a failed node
    pub accurate: bool,
    /// Survivors that know nobody but themselves while others are running
    pub isolated: Vec<NodeIdentity>,
    pub joins: usize,
    pub removals: usize,
    pub traffic: TrafficStats,
    pub per_node: BTreeMap<String, TrafficStats>,
}

pub struct Simulation {
    scenario: Scenario,
    seed: u64,
    network: Network,
    nodes: Vec<SimNode>,
    log: Arc<EventLog>,
    rng: StdRng,
    failed: Vec<NodeIdentity>,
    now: i64,
    _subscription: Subscription,
}

fn identity(n: u32) -> NodeIdentity {
    NodeIdentity::new(n, NODE_PORT)
}

impl Simulation {
    pub fn new(scenario: Scenario) -> Result<Self> {
        scenario.validate()?;
        let seed = scenario.seed.unwrap_or_else(|| rand::rng().random());

        let mut network = Network::new(seed);
        if scenario.drop_messages {
            network = network.with_loss(LossPolicy {
                probability: scenario.drop_probability,
                start: scenario.drop_window.start,
                end: scenario.drop_window.end,
            });
        }

        let log = Arc::new(EventLog::new());
        let bus = Arc::new(EventBus::new());
        let sink = Arc::clone(&log);
        let subscription = bus.subscribe(move |event| sink.record(event));

        let nodes = (1..=scenario.nodes)
            .map(|n| {
                let handle = network.attach(identity(n).address());
                let selector = RandomSelector::seeded(seed.wrapping_add(u64::from(n)));
                MembershipNode::with_selector(scenario.protocol, handle, selector)
                    .map(|node| node.with_diagnostics(bus.clone()))
                    .with_context(|| format!("Failed to create node {}", identity(n)))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(nodes = scenario.nodes, seed, "Simulation ready");

        Ok(Self {
            rng: StdRng::seed_from_u64(seed ^ 0x5eed),
            scenario,
            seed,
            network,
            nodes,
            log,
            failed: Vec::new(),
            now: -1,
            _subscription: subscription,
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Last tick executed, or -1 before the first step.
    pub fn now(&self) -> i64 {
        self.now
    }

    /// Node `n` (1-based).
    pub fn node(&self, n: u32) -> Option<&SimNode> {
        let index = usize::try_from(n).ok()?.checked_sub(1)?;
        self.nodes.get(index)
    }

    pub fn failed(&self) -> &[NodeIdentity] {
        &self.failed
    }

    /// True once every tick of the scenario has run.
    pub fn is_finished(&self) -> bool {
        self.now + 1 >= self.scenario.total_ticks
    }

    /// Run one tick.
    pub fn step(&mut self) {
        self.now += 1;
        let now = self.now;
        self.network.set_tick(now);
        self.log.set_tick(now);

        if now == self.scenario.failure_tick {
            self.inject_failure();
        }

        let introducer = identity(1).address();
        let retry = self.scenario.join_retry_ticks;
        for (n, node) in (1u32..).zip(self.nodes.iter_mut()) {
            let start = self.scenario.start_tick(n);
            // A node that crashed before its start tick never comes up
            if now < start || node.is_failed() {
                continue;
            }
            if now == start {
                node.start(introducer);
            } else if let Some(every) = retry {
                if (now - start) % every == 0 {
                    node.retry_join();
                }
            }
            node.tick(now);
        }
    }

    /// Run every remaining tick and report.
    pub fn run(&mut self) -> SimulationReport {
        while !self.is_finished() {
            self.step();
        }
        self.report()
    }

    /// Report on the current state of the group.
    pub fn report(&self) -> SimulationReport {
        let survivors: Vec<NodeIdentity> = self
            .nodes
            .iter()
            .filter(|node| {
                !node.is_failed() && self.now >= self.scenario.start_tick(node.identity().id())
            })
            .map(|node| node.identity())
            .collect();

        let views: BTreeMap<String, Vec<NodeIdentity>> = self
            .nodes
            .iter()
            .filter(|node| survivors.contains(&node.identity()))
            .map(|node| (node.identity().to_string(), node.table().identities()))
            .collect();

        let complete = views.values().all(|view| view == &survivors);
        let isolated = if survivors.len() > 1 {
            self.nodes
                .iter()
                .filter(|node| survivors.contains(&node.identity()) && node.table().len() == 1)
                .map(|node| node.identity())
                .collect()
        } else {
            Vec::new()
        };
        let accurate = views
            .values()
            .all(|view| view.iter().all(|id| !self.failed.contains(id)));

        let records = self.log.records();
        let removals = records
            .iter()
            .filter(|r| matches!(r.event, MembershipEvent::NodeRemoved { .. }))
            .count();

        SimulationReport {
            seed: self.seed,
            ticks: self.now,
            failed: self.failed.clone(),
            views,
            complete,
            accurate,
            isolated,
            joins: records.len() - removals,
            removals,
            traffic: self.network.totals(),
            per_node: self.network.all_stats(),
        }
    }

    /// Crash victims among the nodes that are already running.
    fn inject_failure(&mut self) {
        let candidates: Vec<NodeIdentity> = self
            .nodes
            .iter()
            .filter(|node| {
                !node.is_failed() && self.scenario.start_tick(node.identity().id()) <= self.now
            })
            .map(|node| node.identity())
            .collect();

        let count = match self.scenario.failure {
            FailureMode::None => 0,
            FailureMode::Single => 1,
            FailureMode::Multi => candidates.len() / 2,
        };
        let mut victims: Vec<NodeIdentity> = candidates
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();
        victims.sort();

        for victim in &victims {
            if let Some(node) = self.nodes.iter_mut().find(|node| node.identity() == *victim) {
                node.fail();
            }
        }
        if !victims.is_empty() {
            info!(tick = self.now, failed = ?victims, "Injected failure");
        } else {
            debug!(tick = self.now, "No failure injected");
        }
        self.failed.extend(victims);
    }
}
