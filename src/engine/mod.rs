//! Simulation engine: allocation, business rules, and aggregation.
//!
//! A run is a single deterministic pass: orders are dealt to drivers
//! round-robin, each driver walks its orders against the clock, and the
//! per-order outcomes are folded into one [`SimulationResult`].
//!
//! [`SimulationResult`]: crate::types::SimulationResult

pub mod allocation;
pub mod rules;
pub mod simulator;
pub mod tally;

pub use rules::{BusinessRules, OrderOutcome};
pub use simulator::{DriverReport, FatigueCheckpoint, RouteTable, SimulationReport, Simulator};
pub use tally::Tally;
