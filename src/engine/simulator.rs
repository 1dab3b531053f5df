//! Per-driver simulation loop and run-level aggregation.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use super::allocation::assign_round_robin;
use super::rules::{BusinessRules, DriverClock, OrderOutcome};
use super::tally::Tally;
use crate::types::{Order, Route, SimulationRequest, SimulationResult};

/// Routes keyed by their business `route_id`.
pub type RouteTable = HashMap<i64, Route>;

/// Build a lookup table. A later route with the same `route_id` replaces
/// an earlier one.
pub fn route_table(routes: impl IntoIterator<Item = Route>) -> RouteTable {
    routes.into_iter().map(|r| (r.route_id, r)).collect()
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Where in the shift a driver was found to be fatigued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FatigueCheckpoint {
    /// While an order was being turned away by the working-hours cap.
    CapRejection,
    /// After the driver's last order.
    EndOfShift,
}

/// Everything one driver did during a run.
#[derive(Debug, Clone, Serialize)]
pub struct DriverReport {
    /// 0-based driver index.
    pub index: usize,
    pub outcomes: Vec<OrderOutcome>,
    pub work_minutes: u32,
    /// Clock at the end of the shift, minutes since midnight.
    pub finish_time: u32,
    pub fatigue: Option<FatigueCheckpoint>,
}

impl DriverReport {
    /// Human label, 1-based: `"Driver 1"`.
    pub fn label(&self) -> String {
        format!("Driver {}", self.index + 1)
    }

    pub fn is_fatigued(&self) -> bool {
        self.fatigue.is_some()
    }

    pub fn tally(&self) -> Tally {
        self.outcomes.iter().sum()
    }
}

/// Detailed output of a run: per-driver reports plus the aggregate.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub drivers: Vec<DriverReport>,
    pub totals: Tally,
    pub result: SimulationResult,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator {
    rules: BusinessRules,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(BusinessRules::default())
    }
}

impl Simulator {
    pub fn new(rules: BusinessRules) -> Self {
        Self { rules }
    }

    /// Walk one driver's orders in sequence.
    ///
    /// Fatigue is checked at each cap rejection and once more after the
    /// last order; a driver is recorded at most once.
    pub fn simulate_driver(
        &self,
        index: usize,
        orders: &[&Order],
        routes: &RouteTable,
        request: &SimulationRequest,
    ) -> DriverReport {
        let cap_minutes = request.max_hours * 60.0;
        let threshold = self.rules.fatigue_threshold_min;
        let mut clock = DriverClock::starting_at(request.start_time.minutes());
        let mut fatigue = None;
        let mut outcomes = Vec::with_capacity(orders.len());

        for order in orders {
            let outcome = self
                .rules
                .evaluate_order(order, routes.get(&order.route_id), clock, cap_minutes);

            match &outcome {
                OrderOutcome::SkippedOverCapacity { .. } => {
                    if clock.worked > threshold && fatigue.is_none() {
                        fatigue = Some(FatigueCheckpoint::CapRejection);
                    }
                }
                OrderOutcome::SkippedMissingRoute { order_id, route_id } => {
                    debug!(driver = index + 1, order_id, route_id, "Route not found, order skipped");
                }
                OrderOutcome::Delivered(_) => clock.advance(&outcome),
            }
            outcomes.push(outcome);
        }

        if clock.worked > threshold && fatigue.is_none() {
            fatigue = Some(FatigueCheckpoint::EndOfShift);
        }

        DriverReport {
            index,
            outcomes,
            work_minutes: clock.worked,
            finish_time: clock.current,
            fatigue,
        }
    }

    /// Run the full simulation over a snapshot of orders and routes.
    ///
    /// Orders are dealt round-robin by input position; drivers are processed
    /// in index order and their tallies summed afterwards.
    pub fn run(
        &self,
        request: &SimulationRequest,
        orders: &[Order],
        routes: &RouteTable,
    ) -> SimulationReport {
        let assignments = assign_round_robin(orders, request.num_drivers as usize);

        let drivers: Vec<DriverReport> = assignments
            .iter()
            .enumerate()
            .map(|(index, assigned)| self.simulate_driver(index, assigned, routes, request))
            .collect();

        for d in &drivers {
            debug!(
                driver = %d.label(),
                orders = d.outcomes.len(),
                delivered = d.outcomes.iter().filter(|o| o.is_delivered()).count(),
                work_minutes = d.work_minutes,
                fatigue = ?d.fatigue,
                "Driver shift simulated"
            );
        }

        let totals: Tally = drivers.iter().map(DriverReport::tally).sum();
        let fatigued_drivers: Vec<String> = drivers
            .iter()
            .filter(|d| d.is_fatigued())
            .map(DriverReport::label)
            .collect();

        let result = SimulationResult {
            total_profit: totals.profit,
            efficiency_score: totals.efficiency_score(),
            on_time_deliveries: totals.on_time,
            late_deliveries: totals.late,
            total_bonus: totals.bonus,
            total_penalties: totals.penalties,
            total_fuel_cost: totals.fuel_cost,
            fatigued_drivers,
        };

        info!(
            num_drivers = request.num_drivers,
            orders = orders.len(),
            routes = routes.len(),
            on_time = result.on_time_deliveries,
            late = result.late_deliveries,
            profit = %result.total_profit,
            efficiency = format!("{:.1}%", result.efficiency_score),
            fatigued = result.fatigued_drivers.len(),
            "Simulation complete"
        );

        SimulationReport {
            drivers,
            totals,
            result,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
