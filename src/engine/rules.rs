//! Business rules applied to a single order.
//!
//! Fuel cost, the late-delivery penalty, the high-value bonus, and the
//! working-hours cap. Every order evaluates to exactly one
//! [`OrderOutcome`]; nothing here touches shared state.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Order, Route, TrafficLevel};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Company rules used to score deliveries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BusinessRules {
    /// Base fuel cost per kilometre.
    pub fuel_cost_per_km: Decimal,
    /// Extra fuel cost per kilometre on `High` traffic routes.
    pub high_traffic_surcharge_per_km: Decimal,
    /// Minutes past the target time before a delivery counts as late.
    pub late_grace_min: u32,
    /// Flat penalty for a late delivery.
    pub late_penalty: Decimal,
    /// Order value above which an on-time delivery earns a bonus.
    pub high_value_threshold: Decimal,
    /// Bonus as a fraction of order value.
    pub high_value_bonus_rate: Decimal,
    /// Work minutes above which a driver is flagged as fatigued.
    pub fatigue_threshold_min: u32,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            fuel_cost_per_km: dec!(5),
            high_traffic_surcharge_per_km: dec!(2),
            late_grace_min: 10,
            late_penalty: dec!(50),
            high_value_threshold: dec!(1000),
            high_value_bonus_rate: dec!(0.1),
            fatigue_threshold_min: 8 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryStatus {
    OnTime,
    Late,
}

/// A completed delivery and its money.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub order_id: i64,
    pub status: DeliveryStatus,
    pub bonus: Decimal,
    pub penalty: Decimal,
    pub fuel_cost: Decimal,
    /// `value + bonus - penalty - fuel_cost`
    pub profit: Decimal,
    /// Minutes since midnight at hand-over.
    pub delivered_at: u32,
    pub travel_min: u32,
}

/// What happened to one order during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OrderOutcome {
    Delivered(Delivery),
    /// The order's route does not exist. Contributes nothing.
    SkippedMissingRoute { order_id: i64, route_id: i64 },
    /// Delivering would push the driver past `max_hours`. Fuel is still
    /// charged; no profit, penalty, bonus, or clock advance.
    SkippedOverCapacity { order_id: i64, fuel_cost: Decimal },
}

impl OrderOutcome {
    pub fn order_id(&self) -> i64 {
        match self {
            OrderOutcome::Delivered(d) => d.order_id,
            OrderOutcome::SkippedMissingRoute { order_id, .. } => *order_id,
            OrderOutcome::SkippedOverCapacity { order_id, .. } => *order_id,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, OrderOutcome::Delivered(_))
    }
}

// ---------------------------------------------------------------------------
// Driver clock
// ---------------------------------------------------------------------------

/// Where a driver stands in the shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverClock {
    /// Minutes since midnight. Not wrapped past 24:00.
    pub current: u32,
    /// Minutes spent delivering so far.
    pub worked: u32,
}

impl DriverClock {
    pub fn starting_at(minutes: u32) -> Self {
        Self {
            current: minutes,
            worked: 0,
        }
    }

    /// Advance past a delivery outcome. Only deliveries move the clock.
    pub fn advance(&mut self, outcome: &OrderOutcome) {
        if let OrderOutcome::Delivered(d) = outcome {
            self.current = d.delivered_at;
            self.worked = self.worked.saturating_add(d.travel_min);
        }
    }
}

// ---------------------------------------------------------------------------
// Rule evaluation
// ---------------------------------------------------------------------------

impl BusinessRules {
    /// Fuel for one trip over `route`. Saturates rather than overflowing.
    pub fn fuel_cost(&self, route: &Route) -> Decimal {
        let mut cost = route.distance_km.saturating_mul(self.fuel_cost_per_km);
        if route.traffic_level == TrafficLevel::High {
            cost = cost.saturating_add(
                route
                    .distance_km
                    .saturating_mul(self.high_traffic_surcharge_per_km),
            );
        }
        cost
    }

    /// Evaluate `order` for a driver at `clock` with a cap of `cap_minutes`
    /// of delivery work.
    pub fn evaluate_order(
        &self,
        order: &Order,
        route: Option<&Route>,
        clock: DriverClock,
        cap_minutes: f64,
    ) -> OrderOutcome {
        let Some(route) = route else {
            return OrderOutcome::SkippedMissingRoute {
                order_id: order.order_id,
                route_id: order.route_id,
            };
        };

        let fuel_cost = self.fuel_cost(route);
        let travel_min = route.base_time_min;

        if f64::from(clock.worked.saturating_add(travel_min)) > cap_minutes {
            return OrderOutcome::SkippedOverCapacity {
                order_id: order.order_id,
                fuel_cost,
            };
        }

        let expected = order.delivery_time.minutes();
        let delivered_at = clock.current.saturating_add(travel_min);

        let (status, penalty) = if delivered_at > expected.saturating_add(self.late_grace_min) {
            (DeliveryStatus::Late, self.late_penalty)
        } else {
            (DeliveryStatus::OnTime, Decimal::ZERO)
        };

        // Independent of the grace band: only strictly-on-time counts here.
        let bonus = if order.value_rs > self.high_value_threshold && delivered_at <= expected {
            order.value_rs.saturating_mul(self.high_value_bonus_rate)
        } else {
            Decimal::ZERO
        };

        OrderOutcome::Delivered(Delivery {
            order_id: order.order_id,
            status,
            bonus,
            penalty,
            fuel_cost,
            profit: order
                .value_rs
                .saturating_add(bonus)
                .saturating_sub(penalty)
                .saturating_sub(fuel_cost),
            delivered_at,
            travel_min,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
