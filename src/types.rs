//! Shared types for the GreenCart service.
//!
//! These types form the data model used across all modules: the reference
//! data the simulation reads (routes, orders), the bookkeeping entities
//! (drivers, users), and the simulation inputs and outputs.

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Clock time
// ---------------------------------------------------------------------------

/// `H:MM` / `HH:MM`, 24-hour clock.
static CLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$").expect("clock pattern is a valid regex")
});

/// A wall-clock time of day, stored as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u32);

impl ClockTime {
    /// Build from hours and minutes. Returns `None` outside `00:00..=23:59`.
    pub fn from_hm(hours: u32, minutes: u32) -> Option<Self> {
        (hours < 24 && minutes < 60).then_some(Self(hours * 60 + minutes))
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = GreenCartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GreenCartError::Validation(format!("Invalid time format (HH:MM): {s}"));
        if !CLOCK_PATTERN.is_match(s) {
            return Err(invalid());
        }
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let hours: u32 = h.parse().map_err(|_| invalid())?;
        let minutes: u32 = m.parse().map_err(|_| invalid())?;
        Self::from_hm(hours, minutes).ok_or_else(invalid)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// Traffic conditions on a route. Only `High` carries a fuel surcharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for TrafficLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrafficLevel::Low => write!(f, "Low"),
            TrafficLevel::Medium => write!(f, "Medium"),
            TrafficLevel::High => write!(f, "High"),
        }
    }
}

/// Case-sensitive: `"high"` is not `High`.
impl FromStr for TrafficLevel {
    type Err = GreenCartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(TrafficLevel::Low),
            "Medium" => Ok(TrafficLevel::Medium),
            "High" => Ok(TrafficLevel::High),
            other => Err(GreenCartError::Validation(format!(
                "Unknown traffic level: {other}"
            ))),
        }
    }
}

/// A delivery route. Read-only during a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Storage identifier.
    pub id: String,
    /// Business identifier referenced by orders.
    pub route_id: i64,
    pub distance_km: Decimal,
    pub traffic_level: TrafficLevel,
    pub base_time_min: u32,
}

/// Fields supplied when creating a route.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRoute {
    pub route_id: i64,
    pub distance_km: Decimal,
    pub traffic_level: TrafficLevel,
    pub base_time_min: u32,
}

/// Partial update for a route. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutePatch {
    pub route_id: Option<i64>,
    pub distance_km: Option<Decimal>,
    pub traffic_level: Option<TrafficLevel>,
    pub base_time_min: Option<u32>,
}

/// Longest trip a route may declare: one full day.
pub const MAX_BASE_TIME_MIN: u32 = 24 * 60;

/// Longest route distance accepted, in km.
pub const MAX_DISTANCE_KM: Decimal = dec!(100000);

/// Largest order value accepted.
pub const MAX_ORDER_VALUE: Decimal = dec!(1000000000);

fn check_distance(km: Decimal) -> Result<(), GreenCartError> {
    if km.is_sign_negative() || km > MAX_DISTANCE_KM {
        return Err(GreenCartError::Validation(format!(
            "distance_km must be between 0 and {MAX_DISTANCE_KM}"
        )));
    }
    Ok(())
}

fn check_base_time(minutes: u32) -> Result<(), GreenCartError> {
    if minutes > MAX_BASE_TIME_MIN {
        return Err(GreenCartError::Validation(format!(
            "base_time_min must not exceed {MAX_BASE_TIME_MIN}"
        )));
    }
    Ok(())
}

fn check_order_value(value: Decimal) -> Result<(), GreenCartError> {
    if value.is_sign_negative() || value > MAX_ORDER_VALUE {
        return Err(GreenCartError::Validation(format!(
            "value_rs must be between 0 and {MAX_ORDER_VALUE}"
        )));
    }
    Ok(())
}

impl NewRoute {
    pub fn validate(&self) -> Result<(), GreenCartError> {
        check_distance(self.distance_km)?;
        check_base_time(self.base_time_min)
    }
}

impl RoutePatch {
    /// Nothing is changed unless every supplied field is valid.
    pub fn apply(self, route: &mut Route) -> Result<(), GreenCartError> {
        if let Some(v) = self.distance_km {
            check_distance(v)?;
        }
        if let Some(v) = self.base_time_min {
            check_base_time(v)?;
        }

        if let Some(v) = self.route_id {
            route.route_id = v;
        }
        if let Some(v) = self.distance_km {
            route.distance_km = v;
        }
        if let Some(v) = self.traffic_level {
            route.traffic_level = v;
        }
        if let Some(v) = self.base_time_min {
            route.base_time_min = v;
        }
        Ok(())
    }
}

/// A customer order. Read-only during a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Storage identifier.
    pub id: String,
    pub order_id: i64,
    pub value_rs: Decimal,
    /// Business identifier of the route this order travels.
    pub route_id: i64,
    /// Target delivery time.
    pub delivery_time: ClockTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub order_id: i64,
    pub value_rs: Decimal,
    pub route_id: i64,
    pub delivery_time: ClockTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderPatch {
    pub order_id: Option<i64>,
    pub value_rs: Option<Decimal>,
    pub route_id: Option<i64>,
    pub delivery_time: Option<ClockTime>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), GreenCartError> {
        check_order_value(self.value_rs)
    }
}

impl OrderPatch {
    pub fn apply(self, order: &mut Order) -> Result<(), GreenCartError> {
        if let Some(v) = self.value_rs {
            check_order_value(v)?;
        }

        if let Some(v) = self.order_id {
            order.order_id = v;
        }
        if let Some(v) = self.value_rs {
            order.value_rs = v;
        }
        if let Some(v) = self.route_id {
            order.route_id = v;
        }
        if let Some(v) = self.delivery_time {
            order.delivery_time = v;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Bookkeeping entities
// ---------------------------------------------------------------------------

/// A driver on the roster. Not consulted by the simulation, which works
/// with an anonymous driver count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub shift_hours: u32,
    pub past_week_hours: Vec<u32>,
}

/// Create payload. All three fields are required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDriver {
    pub name: Option<String>,
    pub shift_hours: Option<u32>,
    pub past_week_hours: Option<Vec<u32>>,
}

impl NewDriver {
    /// Returns `(name, shift_hours, past_week_hours)` when every field is present.
    pub fn into_parts(self) -> Result<(String, u32, Vec<u32>), GreenCartError> {
        match (self.name, self.shift_hours, self.past_week_hours) {
            (Some(name), Some(shift), Some(hours)) if !name.trim().is_empty() && shift > 0 => {
                Ok((name, shift, hours))
            }
            _ => Err(GreenCartError::Validation("All fields required".into())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverPatch {
    pub name: Option<String>,
    pub shift_hours: Option<u32>,
    pub past_week_hours: Option<Vec<u32>>,
}

impl DriverPatch {
    pub fn apply(self, driver: &mut Driver) {
        if let Some(v) = self.name {
            driver.name = v;
        }
        if let Some(v) = self.shift_hours {
            driver.shift_hours = v;
        }
        if let Some(v) = self.past_week_hours {
            driver.past_week_hours = v;
        }
    }
}

/// A registered account. The hash is never serialized.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Simulation input
// ---------------------------------------------------------------------------

/// Upper bound on `num_drivers`; the engine keeps one report per driver.
pub const MAX_DRIVERS: u64 = 10_000;

/// Raw, loosely-typed simulation parameters as received from a caller.
///
/// Kept as JSON values so that missing or non-numeric inputs surface as
/// validation errors rather than deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationParams {
    #[serde(default)]
    pub num_drivers: Option<serde_json::Value>,
    #[serde(default)]
    pub start_time: Option<serde_json::Value>,
    #[serde(default)]
    pub max_hours: Option<serde_json::Value>,
}

/// Validated simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationRequest {
    pub num_drivers: u32,
    pub start_time: ClockTime,
    pub max_hours: f64,
}

impl SimulationParams {
    /// Validate into a [`SimulationRequest`]. Nothing else runs on failure.
    pub fn validate(&self) -> Result<SimulationRequest, GreenCartError> {
        let (Some(num_drivers), Some(start_time), Some(max_hours)) =
            (&self.num_drivers, &self.start_time, &self.max_hours)
        else {
            return Err(GreenCartError::Validation("All parameters required".into()));
        };

        let not_positive = || GreenCartError::Validation("Parameters must be positive numbers".into());

        let num_drivers = num_drivers.as_f64().ok_or_else(not_positive)?;
        if num_drivers <= 0.0 {
            return Err(not_positive());
        }
        if num_drivers.fract() != 0.0 {
            return Err(GreenCartError::Validation(
                "num_drivers must be a whole number".into(),
            ));
        }
        if num_drivers > MAX_DRIVERS as f64 {
            return Err(GreenCartError::Validation(format!(
                "num_drivers must not exceed {MAX_DRIVERS}"
            )));
        }

        let max_hours = max_hours.as_f64().ok_or_else(not_positive)?;
        if !max_hours.is_finite() || max_hours <= 0.0 {
            return Err(not_positive());
        }

        let start_time = start_time
            .as_str()
            .and_then(|s| s.parse::<ClockTime>().ok())
            .ok_or_else(|| GreenCartError::Validation("Invalid start time format (HH:MM)".into()))?;

        Ok(SimulationRequest {
            num_drivers: num_drivers as u32,
            start_time,
            max_hours,
        })
    }
}

// ---------------------------------------------------------------------------
// Simulation output
// ---------------------------------------------------------------------------

/// Aggregate outcome of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub total_profit: Decimal,
    /// Percentage of deliveries made on time, 0 to 100.
    pub efficiency_score: f64,
    pub on_time_deliveries: u32,
    pub late_deliveries: u32,
    pub total_bonus: Decimal,
    pub total_penalties: Decimal,
    pub total_fuel_cost: Decimal,
    pub fatigued_drivers: Vec<String>,
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "profit={:.2} efficiency={:.1}% on_time={} late={} bonus={:.2} penalties={:.2} fuel={:.2} fatigued={}",
            self.total_profit,
            self.efficiency_score,
            self.on_time_deliveries,
            self.late_deliveries,
            self.total_bonus,
            self.total_penalties,
            self.total_fuel_cost,
            self.fatigued_drivers.len(),
        )
    }
}

/// A persisted simulation run, owned by the user who requested it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationRecord {
    pub id: String,
    pub user_id: String,
    pub num_drivers: u32,
    pub start_time: ClockTime,
    pub max_hours: f64,
    #[serde(flatten)]
    pub result: SimulationResult,
    pub created_at: DateTime<Utc>,
}

impl SimulationRecord {
    pub fn new(user_id: &str, request: &SimulationRequest, result: SimulationResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            num_drivers: request.num_drivers,
            start_time: request.start_time,
            max_hours: request.max_hours,
            result,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for GreenCart.
#[derive(Debug, thiserror::Error)]
pub enum GreenCartError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The simulation ran but its result could not be recorded.
    #[error("Simulation completed but could not be recorded: {reason}")]
    Persistence {
        result: Box<SimulationResult>,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
