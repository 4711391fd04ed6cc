//! membership-sim: In-process simulator for the membership protocol.
//!
//! Runs a whole group of [`membership_core::MembershipNode`]s over an
//! emulated network that can lose messages, injects crash failures, and
//! reports how well the surviving tables match reality.

pub mod log;
pub mod network;
pub mod scenario;
pub mod simulation;

pub use log::{EventLog, LogRecord};
pub use network::{LossPolicy, NetHandle, Network, TrafficStats};
pub use scenario::{DropWindow, FailureMode, Scenario};
pub use simulation::{Simulation, SimulationReport};
