//! End-to-end simulation runs.
//!
//! Each test drives a full group over the emulated network with a fixed seed
//! and checks the surviving membership tables.

use membership_core::{MembershipEvent, NodeIdentity};
use membership_sim::{DropWindow, FailureMode, Scenario, Simulation};

fn scenario(failure: FailureMode) -> Scenario {
    Scenario {
        nodes: 10,
        total_ticks: 250,
        failure,
        failure_tick: 100,
        seed: Some(7),
        ..Scenario::default()
    }
}

#[test]
fn test_everyone_joins_without_failures() {
    let mut sim = Simulation::new(scenario(FailureMode::None)).unwrap();
    let report = sim.run();

    assert!(report.failed.is_empty());
    assert_eq!(report.views.len(), 10);
    assert!(report.complete, "{:?}", report.views);
    assert_eq!(report.removals, 0);
    // Every node adds every other node at least once
    assert!(report.joins >= 10 * 9);
}

#[test]
fn test_single_failure_detected_everywhere() {
    let mut sim = Simulation::new(scenario(FailureMode::Single)).unwrap();
    let report = sim.run();

    assert_eq!(report.failed.len(), 1);
    let failed = report.failed[0];
    assert!(report.complete, "{:?}", report.views);
    assert!(report.accurate, "{:?}", report.views);

    assert!(report.isolated.is_empty());

    // Every survivor logged the removal, none before the failure
    let mut observers = sim.log().removals_of(failed);
    observers.sort();
    observers.dedup();
    assert_eq!(observers.len(), 9);
    assert!(!observers.contains(&failed));

    for record in sim.log().records() {
        if let MembershipEvent::NodeRemoved { node, .. } = record.event {
            if node == failed {
                assert!(record.tick > 100, "removed before it failed: {}", record.tick);
            }
        }
    }
}

#[test]
fn test_single_failure_across_seeds() {
    let mut incomplete = Vec::new();
    for seed in 0..50 {
        let mut sim = Simulation::new(Scenario {
            failure: FailureMode::Single,
            seed: Some(seed),
            ..Scenario::default()
        })
        .unwrap();
        let report = sim.run();

        assert_eq!(report.failed.len(), 1, "seed {seed}");
        // The crashed node never lingers in a survivor's table
        assert!(report.accurate, "seed {seed}: {:?}", report.views);
        if !report.complete {
            incomplete.push((seed, report.isolated));
        }
    }

    // A node that hears nothing for fail_timeout ticks suspects every peer,
    // stops gossiping, and is dropped by everyone. This is rare at N = 10.
    assert!(incomplete.len() <= 10, "incomplete runs: {incomplete:?}");
}

#[test]
fn test_multi_failure_detected_everywhere() {
    let mut sim = Simulation::new(scenario(FailureMode::Multi)).unwrap();
    let report = sim.run();

    assert_eq!(report.failed.len(), 5);
    assert_eq!(report.views.len(), 5);
    assert!(report.complete, "{:?}", report.views);
    assert!(report.accurate, "{:?}", report.views);
}

#[test]
fn test_lossy_network_recovers() {
    let mut sim = Simulation::new(Scenario {
        total_ticks: 400,
        drop_messages: true,
        drop_probability: 0.1,
        drop_window: DropWindow { start: 50, end: 300 },
        ..scenario(FailureMode::None)
    })
    .unwrap();
    let report = sim.run();

    assert!(report.traffic.dropped > 0);
    assert!(report.complete, "{:?}", report.views);
}

#[test]
fn test_zero_drop_probability_loses_nothing() {
    let mut sim = Simulation::new(Scenario {
        drop_messages: true,
        drop_probability: 0.0,
        ..scenario(FailureMode::None)
    })
    .unwrap();
    let report = sim.run();

    assert_eq!(report.traffic.dropped, 0);
    // Whatever was sent in the last tick may still be queued
    let buffered = sim.network().buffered() as u64;
    assert_eq!(report.traffic.sent, report.traffic.received + buffered);
    assert!(report.complete);
}

#[test]
fn test_lost_join_request_retried() {
    // Everything sent during the first ticks is lost, including join requests
    let mut sim = Simulation::new(Scenario {
        nodes: 4,
        total_ticks: 120,
        drop_messages: true,
        drop_probability: 1.0,
        drop_window: DropWindow { start: 0, end: 5 },
        join_retry_ticks: Some(10),
        ..scenario(FailureMode::None)
    })
    .unwrap();
    let report = sim.run();

    assert!(report.traffic.dropped >= 3);
    assert!(report.complete, "{:?}", report.views);
}

#[test]
fn test_lost_join_request_without_retry_stays_out() {
    let mut sim = Simulation::new(Scenario {
        nodes: 4,
        total_ticks: 120,
        drop_messages: true,
        drop_probability: 1.0,
        drop_window: DropWindow { start: 0, end: 5 },
        ..scenario(FailureMode::None)
    })
    .unwrap();
    let report = sim.run();

    for n in 2..=4 {
        assert!(!sim.node(n).unwrap().is_in_group());
    }
    assert_eq!(report.views["1:0"], vec![NodeIdentity::new(1, 0)]);
    assert!(!report.complete);
    assert_eq!(report.isolated.len(), 4);
}

#[test]
fn test_scenario_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.json");
    std::fs::write(
        &path,
        r#"{ "nodes": 3, "total_ticks": 60, "failure": "none", "seed": 3 }"#,
    )
    .unwrap();

    let loaded = Scenario::load(&path).unwrap();
    assert_eq!(loaded.nodes, 3);
    assert_eq!(loaded.failure, FailureMode::None);

    let report = Simulation::new(loaded).unwrap().run();
    assert_eq!(report.seed, 3);
    assert_eq!(report.ticks, 59);
    assert!(report.complete);
}

#[test]
fn test_invalid_scenario_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.json");

    std::fs::write(&path, r#"{ "nodes": "many" }"#).unwrap();
    assert!(Scenario::load(&path).is_err());

    std::fs::write(&path, r#"{ "drop_probability": 2.0 }"#).unwrap();
    assert!(Scenario::load(&path).is_err());

    assert!(Scenario::load(&dir.path().join("missing.json")).is_err());
}

#[test]
fn test_event_log_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("membership.log");

    let mut sim = Simulation::new(Scenario {
        nodes: 3,
        total_ticks: 30,
        ..scenario(FailureMode::None)
    })
    .unwrap();
    sim.run();
    sim.log().write_to(&path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), sim.log().len());
    // Node 2 asks at tick 1 and node 1 answers at tick 2
    assert!(content.contains("1:0 [2] Node 2:0 joined at time 2"));
    assert!(content.contains("2:0 [2] Node 1:0 joined at time 2"));
}
