//! Seed data loading from CSV.
//!
//! On startup each reference table is filled from its CSV file, but only
//! while that table is still empty. A missing or malformed file is logged
//! and skipped; it never stops the service from starting.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info, warn};

use super::SqliteStore;
use crate::types::{ClockTime, NewDriver, NewOrder, NewRoute, TrafficLevel};

pub const DRIVERS_FILE: &str = "drivers.csv";
pub const ROUTES_FILE: &str = "routes.csv";
pub const ORDERS_FILE: &str = "orders.csv";

/// Rows inserted per table. `None` means the table was left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub drivers: Option<usize>,
    pub routes: Option<usize>,
    pub orders: Option<usize>,
}

// ---------------------------------------------------------------------------
// CSV rows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DriverRow {
    name: String,
    shift_hours: u32,
    /// `|`-separated hours, e.g. `6|8|7|7|7|6|10`.
    past_week_hours: String,
}

#[derive(Debug, Deserialize)]
struct RouteRow {
    route_id: i64,
    distance_km: String,
    traffic_level: String,
    base_time_min: u32,
}

#[derive(Debug, Deserialize)]
struct OrderRow {
    order_id: i64,
    value_rs: String,
    route_id: i64,
    delivery_time: String,
}

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn decimal(raw: &str, field: &str, line: usize) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("row {line}: invalid {field}: {raw}"))
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

pub fn parse_drivers<R: Read>(input: R) -> Result<Vec<NewDriver>> {
    let mut out = Vec::new();
    for (i, row) in reader(input).deserialize::<DriverRow>().enumerate() {
        let line = i + 2;
        let row = row.with_context(|| format!("row {line}: malformed driver"))?;
        let past_week_hours = row
            .past_week_hours
            .split('|')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse::<u32>()
                    .with_context(|| format!("row {line}: invalid past_week_hours entry: {s}"))
            })
            .collect::<Result<Vec<_>>>()?;
        out.push(NewDriver {
            name: Some(row.name),
            shift_hours: Some(row.shift_hours),
            past_week_hours: Some(past_week_hours),
        });
    }
    Ok(out)
}

pub fn parse_routes<R: Read>(input: R) -> Result<Vec<NewRoute>> {
    let mut out = Vec::new();
    for (i, row) in reader(input).deserialize::<RouteRow>().enumerate() {
        let line = i + 2;
        let row = row.with_context(|| format!("row {line}: malformed route"))?;
        let route = NewRoute {
            route_id: row.route_id,
            distance_km: decimal(&row.distance_km, "distance_km", line)?,
            traffic_level: row
                .traffic_level
                .parse::<TrafficLevel>()
                .with_context(|| format!("row {line}: invalid traffic_level"))?,
            base_time_min: row.base_time_min,
        };
        route
            .validate()
            .with_context(|| format!("row {line}: invalid route"))?;
        out.push(route);
    }
    Ok(out)
}

pub fn parse_orders<R: Read>(input: R) -> Result<Vec<NewOrder>> {
    let mut out = Vec::new();
    for (i, row) in reader(input).deserialize::<OrderRow>().enumerate() {
        let line = i + 2;
        let row = row.with_context(|| format!("row {line}: malformed order"))?;
        let order = NewOrder {
            order_id: row.order_id,
            value_rs: decimal(&row.value_rs, "value_rs", line)?,
            route_id: row.route_id,
            delivery_time: row
                .delivery_time
                .parse::<ClockTime>()
                .with_context(|| format!("row {line}: invalid delivery_time"))?,
        };
        order
            .validate()
            .with_context(|| format!("row {line}: invalid order"))?;
        out.push(order);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

fn open(dir: &Path, file: &str) -> Option<std::fs::File> {
    let path = dir.join(file);
    match std::fs::File::open(&path) {
        Ok(f) => Some(f),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Seed file not available, skipping");
            None
        }
    }
}

/// Fill empty reference tables from `data_dir`.
///
/// Only database errors while checking table counts are returned; problems
/// with an individual file are logged and that table is skipped.
pub async fn load_initial_data(store: &SqliteStore, data_dir: &Path) -> Result<BootstrapSummary> {
    let mut summary = BootstrapSummary::default();

    if store.count_drivers().await? == 0 {
        if let Some(file) = open(data_dir, DRIVERS_FILE) {
            summary.drivers = match parse_drivers(file) {
                Ok(rows) => report("drivers", store.insert_drivers(rows).await.map_err(Into::into)),
                Err(e) => report("drivers", Err(e)),
            };
        }
    }

    if store.count_routes().await? == 0 {
        if let Some(file) = open(data_dir, ROUTES_FILE) {
            summary.routes = match parse_routes(file) {
                Ok(rows) => report("routes", store.insert_routes(rows).await.map_err(Into::into)),
                Err(e) => report("routes", Err(e)),
            };
        }
    }

    if store.count_orders().await? == 0 {
        if let Some(file) = open(data_dir, ORDERS_FILE) {
            summary.orders = match parse_orders(file) {
                Ok(rows) => report("orders", store.insert_orders(rows).await.map_err(Into::into)),
                Err(e) => report("orders", Err(e)),
            };
        }
    }

    Ok(summary)
}

fn report(table: &str, outcome: Result<usize>) -> Option<usize> {
    match outcome {
        Ok(n) => {
            info!(table, rows = n, "Seed data loaded");
            Some(n)
        }
        Err(e) => {
            error!(table, error = %format!("{e:#}"), "Seed data load failed");
            None
        }
    }
}
