//! Simulation scenario loading and validation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use membership_core::ProtocolConfig;
use serde::{Deserialize, Serialize};

/// Which nodes crash during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Nobody fails
    None,
    /// One random node fails
    #[default]
    Single,
    /// Half the nodes, chosen at random, fail at once
    Multi,
}

/// Ticks during which the network drops messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropWindow {
    /// First lossy tick (inclusive)
    pub start: i64,
    /// First lossless tick after the window
    pub end: i64,
}

impl Default for DropWindow {
    fn default() -> Self {
        Self { start: 50, end: 300 }
    }
}

/// A complete description of one simulated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Number of nodes; node 1 is the introducer (default: 10)
    #[serde(default = "default_nodes")]
    pub nodes: u32,

    /// Length of the run in ticks (default: 700)
    #[serde(default = "default_total_ticks")]
    pub total_ticks: i64,

    /// Ticks between successive node starts (default: 1)
    #[serde(default = "default_join_interval")]
    pub join_interval: i64,

    #[serde(default)]
    pub failure: FailureMode,

    /// Tick at which the failure happens (default: 100)
    #[serde(default = "default_failure_tick")]
    pub failure_tick: i64,

    /// Drop messages during `drop_window`
    #[serde(default)]
    pub drop_messages: bool,

    /// Chance each message in the window is dropped (default: 0.1)
    #[serde(default = "default_drop_probability")]
    pub drop_probability: f64,

    #[serde(default)]
    pub drop_window: DropWindow,

    /// Resend unanswered join requests this often. Unset means never.
    pub join_retry_ticks: Option<i64>,

    /// Seed for every random choice in the run. Unset means random.
    pub seed: Option<u64>,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Where to write the event log, if anywhere
    pub log_path: Option<String>,
}

fn default_nodes() -> u32 {
    10
}

fn default_total_ticks() -> i64 {
    700
}

fn default_join_interval() -> i64 {
    1
}

fn default_failure_tick() -> i64 {
    100
}

fn default_drop_probability() -> f64 {
    0.1
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            total_ticks: default_total_ticks(),
            join_interval: default_join_interval(),
            failure: FailureMode::default(),
            failure_tick: default_failure_tick(),
            drop_messages: false,
            drop_probability: default_drop_probability(),
            drop_window: DropWindow::default(),
            join_retry_ticks: None,
            seed: None,
            protocol: ProtocolConfig::default(),
            log_path: None,
        }
    }
}

impl Scenario {
    /// Load a scenario from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {:?}", path))?;
        let scenario: Scenario = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse scenario file: {:?}", path))?;
        scenario.validate()?;
        tracing::info!("Loaded scenario from {:?}", path);
        Ok(scenario)
    }

    /// Reject scenarios that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.nodes == 0 {
            bail!("nodes must be at least 1");
        }
        if self.total_ticks <= 0 {
            bail!("total_ticks must be positive, got {}", self.total_ticks);
        }
        if self.join_interval < 0 {
            bail!("join_interval must not be negative, got {}", self.join_interval);
        }
        if i64::from(self.nodes - 1)
            .checked_mul(self.join_interval)
            .is_none()
        {
            bail!(
                "join_interval {} is too large for {} nodes",
                self.join_interval,
                self.nodes
            );
        }
        if !(0.0..=1.0).contains(&self.drop_probability) {
            bail!(
                "drop_probability must be within [0, 1], got {}",
                self.drop_probability
            );
        }
        if self.drop_window.end < self.drop_window.start {
            bail!(
                "drop_window ends ({}) before it starts ({})",
                self.drop_window.end,
                self.drop_window.start
            );
        }
        if let Some(retry) = self.join_retry_ticks {
            if retry <= 0 {
                bail!("join_retry_ticks must be positive, got {}", retry);
            }
        }
        self.protocol.validate().context("Invalid protocol config")?;
        Ok(())
    }

    /// Tick at which node `n` (1-based) starts.
    pub fn start_tick(&self, n: u32) -> i64 {
        i64::from(n.saturating_sub(1)).saturating_mul(self.join_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let scenario = Scenario::default();
        assert_eq!(scenario.nodes, 10);
        assert_eq!(scenario.total_ticks, 700);
        assert_eq!(scenario.failure, FailureMode::Single);
        assert_eq!(scenario.failure_tick, 100);
        assert!(!scenario.drop_messages);
        assert_eq!(scenario.drop_window, DropWindow { start: 50, end: 300 });
        assert!(scenario.validate().is_ok());
    }

    #[test]
    fn test_empty_json_takes_defaults() {
        let scenario: Scenario = serde_json::from_str("{}").unwrap();
        assert_eq!(scenario.nodes, 10);
        assert_eq!(scenario.protocol, ProtocolConfig::default());
        assert_eq!(scenario.join_retry_ticks, None);
    }

    #[test]
    fn test_partial_json() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "nodes": 4,
                "failure": "multi",
                "drop_messages": true,
                "drop_window": { "start": 10, "end": 20 },
                "protocol": { "fail_timeout": 8 }
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.nodes, 4);
        assert_eq!(scenario.failure, FailureMode::Multi);
        assert!(scenario.drop_messages);
        assert_eq!(scenario.drop_window, DropWindow { start: 10, end: 20 });
        assert_eq!(scenario.protocol.fail_timeout, 8);
        assert_eq!(scenario.protocol.remove_timeout, 20);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            Scenario {
                nodes: 0,
                ..Scenario::default()
            },
            Scenario {
                total_ticks: 0,
                ..Scenario::default()
            },
            Scenario {
                drop_probability: 1.5,
                ..Scenario::default()
            },
            Scenario {
                drop_window: DropWindow { start: 10, end: 5 },
                ..Scenario::default()
            },
            Scenario {
                join_retry_ticks: Some(0),
                ..Scenario::default()
            },
            Scenario {
                protocol: ProtocolConfig {
                    fail_timeout: 5,
                    remove_timeout: 5,
                    warmup_ticks: 4,
                },
                ..Scenario::default()
            },
        ];
        for scenario in bad {
            assert!(scenario.validate().is_err(), "{scenario:?}");
        }
    }

    #[test]
    fn test_join_interval_overflow_rejected() {
        let scenario = Scenario {
            nodes: 3,
            join_interval: i64::MAX / 2 + 1,
            ..Scenario::default()
        };
        assert!(scenario.validate().is_err());
        // Still answers without panicking
        assert_eq!(scenario.start_tick(3), i64::MAX);

        let scenario = Scenario {
            nodes: 3,
            join_interval: i64::MAX / 2,
            ..Scenario::default()
        };
        assert!(scenario.validate().is_ok());
        assert_eq!(scenario.start_tick(3), i64::MAX - 1);
    }

    #[test]
    fn test_start_ticks_are_staggered() {
        let scenario = Scenario {
            join_interval: 3,
            ..Scenario::default()
        };
        assert_eq!(scenario.start_tick(1), 0);
        assert_eq!(scenario.start_tick(2), 3);
        assert_eq!(scenario.start_tick(5), 12);
    }
}
