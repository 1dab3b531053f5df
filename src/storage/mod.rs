//! Persistence layer.
//!
//! SQLite via sqlx. The simulation service only needs the narrow
//! [`SimulationStore`] seam (a snapshot of orders and routes, and a place
//! to record results); the HTTP layer additionally uses the CRUD and
//! account methods on [`SqliteStore`].

pub mod bootstrap;
mod catalog;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{GreenCartError, Order, Route, SimulationRecord, SimulationResult, User};

// ---------------------------------------------------------------------------
// Seam used by the simulation service
// ---------------------------------------------------------------------------

/// Storage operations a simulation run depends on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SimulationStore: Send + Sync {
    /// All orders, in insertion order.
    async fn load_orders(&self) -> Result<Vec<Order>>;

    /// All routes, in insertion order.
    async fn load_routes(&self) -> Result<Vec<Route>>;

    /// Durably record a finished run.
    async fn save_simulation(&self, record: &SimulationRecord) -> Result<()>;

    /// A user's runs, most recent first.
    async fn list_simulations(&self, user_id: &str) -> Result<Vec<SimulationRecord>>;
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id            TEXT PRIMARY KEY,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at    TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS drivers (
        seq             INTEGER PRIMARY KEY AUTOINCREMENT,
        id              TEXT NOT NULL UNIQUE,
        name            TEXT NOT NULL,
        shift_hours     INTEGER NOT NULL,
        past_week_hours TEXT NOT NULL DEFAULT '[]'
    )",
    "CREATE TABLE IF NOT EXISTS routes (
        seq           INTEGER PRIMARY KEY AUTOINCREMENT,
        id            TEXT NOT NULL UNIQUE,
        route_id      INTEGER NOT NULL,
        distance_km   TEXT NOT NULL,
        traffic_level TEXT NOT NULL,
        base_time_min INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_routes_route_id ON routes(route_id)",
    "CREATE TABLE IF NOT EXISTS orders (
        seq           INTEGER PRIMARY KEY AUTOINCREMENT,
        id            TEXT NOT NULL UNIQUE,
        order_id      INTEGER NOT NULL,
        value_rs      TEXT NOT NULL,
        route_id      INTEGER NOT NULL,
        delivery_time TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS simulations (
        seq                INTEGER PRIMARY KEY AUTOINCREMENT,
        id                 TEXT NOT NULL UNIQUE,
        user_id            TEXT NOT NULL,
        num_drivers        INTEGER NOT NULL,
        start_time         TEXT NOT NULL,
        max_hours          REAL NOT NULL,
        total_profit       TEXT NOT NULL,
        efficiency_score   REAL NOT NULL,
        on_time_deliveries INTEGER NOT NULL,
        late_deliveries    INTEGER NOT NULL,
        total_bonus        TEXT NOT NULL,
        total_penalties    TEXT NOT NULL,
        total_fuel_cost    TEXT NOT NULL,
        fatigued_drivers   TEXT NOT NULL DEFAULT '[]',
        created_at         TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_simulations_user ON simulations(user_id, created_at)",
];

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply the schema.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url, "Database ready");
        Ok(store)
    }

    /// A private in-memory database. One pooled connection that never
    /// expires, since each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Schema migration failed")?;
        }
        debug!(statements = SCHEMA.len(), "Schema applied");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // -- Users ---------------------------------------------------------------

    /// Register a user. Duplicate usernames are a [`GreenCartError::Conflict`].
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, GreenCartError> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };

        let inserted = sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => {
                info!(user_id = %user.id, username, "User registered");
                Ok(user)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(GreenCartError::Conflict("Username already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, GreenCartError> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| -> Result<User, GreenCartError> {
            Ok(User {
                id: r.try_get("id")?,
                username: r.try_get("username")?,
                password_hash: r.try_get("password_hash")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl SimulationStore for SqliteStore {
    async fn load_orders(&self) -> Result<Vec<Order>> {
        Ok(self.list_orders().await?)
    }

    async fn load_routes(&self) -> Result<Vec<Route>> {
        Ok(self.list_routes().await?)
    }

    async fn save_simulation(&self, record: &SimulationRecord) -> Result<()> {
        let r = &record.result;
        let fatigued = serde_json::to_string(&r.fatigued_drivers)
            .context("Failed to serialise fatigued drivers")?;

        sqlx::query(
            "INSERT INTO simulations (
                id, user_id, num_drivers, start_time, max_hours,
                total_profit, efficiency_score, on_time_deliveries, late_deliveries,
                total_bonus, total_penalties, total_fuel_cost, fatigued_drivers, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(i64::from(record.num_drivers))
        .bind(record.start_time.to_string())
        .bind(record.max_hours)
        .bind(r.total_profit.to_string())
        .bind(r.efficiency_score)
        .bind(i64::from(r.on_time_deliveries))
        .bind(i64::from(r.late_deliveries))
        .bind(r.total_bonus.to_string())
        .bind(r.total_penalties.to_string())
        .bind(r.total_fuel_cost.to_string())
        .bind(fatigued)
        .bind(timestamp(record.created_at))
        .execute(&self.pool)
        .await
        .context("Failed to insert simulation")?;

        debug!(simulation_id = %record.id, user_id = %record.user_id, "Simulation saved");
        Ok(())
    }

    async fn list_simulations(&self, user_id: &str) -> Result<Vec<SimulationRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM simulations WHERE user_id = ? ORDER BY created_at DESC, seq DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query simulations")?;

        let records = rows
            .iter()
            .map(simulation_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 so that text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decimal_col(row: &SqliteRow, col: &str) -> Result<Decimal, GreenCartError> {
    let raw: String = row.try_get(col)?;
    Decimal::from_str(&raw)
        .map_err(|e| GreenCartError::Internal(anyhow::anyhow!("Bad decimal in {col}: {raw} ({e})")))
}

pub(crate) fn u32_col(row: &SqliteRow, col: &str) -> Result<u32, GreenCartError> {
    let raw: i64 = row.try_get(col)?;
    u32::try_from(raw)
        .map_err(|_| GreenCartError::Internal(anyhow::anyhow!("Out of range value in {col}: {raw}")))
}

pub(crate) fn parsed_col<T>(row: &SqliteRow, col: &str) -> Result<T, GreenCartError>
where
    T: FromStr<Err = GreenCartError>,
{
    let raw: String = row.try_get(col)?;
    raw.parse()
}

pub(crate) fn json_col<T: serde::de::DeserializeOwned>(row: &SqliteRow, col: &str) -> Result<T, GreenCartError> {
    let raw: String = row.try_get(col)?;
    serde_json::from_str(&raw)
        .map_err(|e| GreenCartError::Internal(anyhow::anyhow!("Bad JSON in {col}: {e}")))
}

fn simulation_from_row(row: &SqliteRow) -> Result<SimulationRecord, GreenCartError> {
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| GreenCartError::Internal(anyhow::anyhow!("Bad timestamp {created_at}: {e}")))?
        .with_timezone(&Utc);

    Ok(SimulationRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        num_drivers: u32_col(row, "num_drivers")?,
        start_time: parsed_col(row, "start_time")?,
        max_hours: row.try_get("max_hours")?,
        result: SimulationResult {
            total_profit: decimal_col(row, "total_profit")?,
            efficiency_score: row.try_get("efficiency_score")?,
            on_time_deliveries: u32_col(row, "on_time_deliveries")?,
            late_deliveries: u32_col(row, "late_deliveries")?,
            total_bonus: decimal_col(row, "total_bonus")?,
            total_penalties: decimal_col(row, "total_penalties")?,
            total_fuel_cost: decimal_col(row, "total_fuel_cost")?,
            fatigued_drivers: json_col(row, "fatigued_drivers")?,
        },
        created_at,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
