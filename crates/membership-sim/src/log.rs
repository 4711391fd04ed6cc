//! Membership event log.
//!
//! Collects every add/remove reported during a run, stamped with the tick
//! at which it happened, and writes them out in a line-oriented text format:
//!
//! ```text
//! 1:0 [3] Node 2:0 joined at time 3
//! 2:0 [121] Node 4:0 removed at time 121
//! ```

use membership_core::{MembershipEvent, NodeIdentity};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// One logged membership event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub tick: i64,
    #[serde(flatten)]
    pub event: MembershipEvent,
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.event {
            MembershipEvent::NodeAdded { .. } => "joined",
            MembershipEvent::NodeRemoved { .. } => "removed",
        };
        write!(
            f,
            "{} [{}] Node {} {} at time {}",
            self.event.observer(),
            self.tick,
            self.event.node(),
            verb,
            self.tick
        )
    }
}

/// Thread-safe, append-only event log.
#[derive(Default)]
pub struct EventLog {
    records: Mutex<Vec<LogRecord>>,
    tick: AtomicI64,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tick stamped on subsequent records.
    pub fn set_tick(&self, tick: i64) {
        self.tick.store(tick, Ordering::Relaxed);
    }

    pub fn record(&self, event: &MembershipEvent) {
        let record = LogRecord {
            tick: self.tick.load(Ordering::Relaxed),
            event: event.clone(),
        };
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }

    /// Snapshot of everything logged so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observers that removed `node`, in log order (may repeat).
    pub fn removals_of(&self, node: NodeIdentity) -> Vec<NodeIdentity> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|r| match r.event {
                MembershipEvent::NodeRemoved { observer, node: n } if n == node => Some(observer),
                _ => None,
            })
            .collect()
    }

    /// Write the log, one record per line.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        for record in self.records() {
            writeln!(out, "{record}")?;
        }
        out.flush()
    }
}
