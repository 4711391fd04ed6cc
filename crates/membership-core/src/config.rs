//! Protocol constants.
//!
//! All timeouts are measured in logical ticks, not wall-clock time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("fail_timeout must be positive, got {0}")]
    NonPositiveFailTimeout(i64),

    #[error("remove_timeout ({remove_timeout}) must be greater than fail_timeout ({fail_timeout})")]
    RemoveNotAfterFail {
        fail_timeout: i64,
        remove_timeout: i64,
    },

    #[error("warmup_ticks must not be negative, got {0}")]
    NegativeWarmup(i64),
}

/// Configuration for the membership protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Age after which a peer is suspected failed (default: 5 ticks).
    ///
    /// Suspected peers stay in the table but are never gossiped to
    /// and never copied into outbound messages.
    #[serde(default = "default_fail_timeout")]
    pub fail_timeout: i64,

    /// Age after which a peer is evicted from the table (default: 20 ticks)
    #[serde(default = "default_remove_timeout")]
    pub remove_timeout: i64,

    /// Gossip starts once logical time exceeds this (default: 4 ticks)
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: i64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            fail_timeout: default_fail_timeout(),
            remove_timeout: default_remove_timeout(),
            warmup_ticks: default_warmup_ticks(),
        }
    }
}

fn default_fail_timeout() -> i64 {
    5
}

fn default_remove_timeout() -> i64 {
    20
}

fn default_warmup_ticks() -> i64 {
    4
}

impl ProtocolConfig {
    /// Check the invariants between the constants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fail_timeout <= 0 {
            return Err(ConfigError::NonPositiveFailTimeout(self.fail_timeout));
        }
        if self.remove_timeout <= self.fail_timeout {
            return Err(ConfigError::RemoveNotAfterFail {
                fail_timeout: self.fail_timeout,
                remove_timeout: self.remove_timeout,
            });
        }
        if self.warmup_ticks < 0 {
            return Err(ConfigError::NegativeWarmup(self.warmup_ticks));
        }
        Ok(())
    }

    /// Whether gossip is allowed at logical time `now`.
    pub fn is_warmed_up(&self, now: i64) -> bool {
        now > self.warmup_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProtocolConfig::default();
        assert_eq!(config.fail_timeout, 5);
        assert_eq!(config.remove_timeout, 20);
        assert_eq!(config.warmup_ticks, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_remove_must_exceed_fail() {
        let config = ProtocolConfig {
            fail_timeout: 10,
            remove_timeout: 10,
            warmup_ticks: 0,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::RemoveNotAfterFail {
                fail_timeout: 10,
                remove_timeout: 10,
            })
        );
    }

    #[test]
    fn test_fail_timeout_must_be_positive() {
        let config = ProtocolConfig {
            fail_timeout: 0,
            ..ProtocolConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveFailTimeout(0)));
    }

    #[test]
    fn test_negative_warmup_rejected() {
        let config = ProtocolConfig {
            warmup_ticks: -1,
            ..ProtocolConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NegativeWarmup(-1)));
    }

    #[test]
    fn test_warmup_is_strict() {
        let config = ProtocolConfig::default();
        assert!(!config.is_warmed_up(4));
        assert!(config.is_warmed_up(5));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: ProtocolConfig = serde_json::from_str(r#"{"fail_timeout": 8}"#).unwrap();
        assert_eq!(config.fail_timeout, 8);
        assert_eq!(config.remove_timeout, 20);
        assert_eq!(config.warmup_ticks, 4);
    }
}
