//! GreenCart Logistics API server.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the database (seeding empty tables from CSV), and serves the
//! HTTP API until Ctrl+C.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::{error, info};

use greencart::api::{self, AppState};
use greencart::auth::TokenIssuer;
use greencart::config;
use greencart::storage::{bootstrap, SqliteStore};

const BANNER: &str = r#"
  ____                       ____           _
 / ___|_ __ ___  ___ _ __   / ___|__ _ _ __| |_
| |  _| '__/ _ \/ _ \ '_ \ | |   / _` | '__| __|
| |_| | | |  __/  __/ | | || |__| (_| | |  | |_
 \____|_|  \___|\___|_| |_| \____\__,_|_|   \__|

  Logistics delivery simulation service
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        service = %cfg.service.name,
        database = %cfg.database.url,
        "GreenCart starting up"
    );

    // -- Storage ----------------------------------------------------------

    let store = SqliteStore::connect(&cfg.database.url, cfg.database.max_connections).await?;

    if cfg.bootstrap.enabled {
        let summary = bootstrap::load_initial_data(&store, &cfg.bootstrap.data_dir)
            .await
            .context("Failed to check tables for seeding")?;
        info!(
            drivers = ?summary.drivers,
            routes = ?summary.routes,
            orders = ?summary.orders,
            "Seed data check complete"
        );
    }

    // -- Server -----------------------------------------------------------

    let tokens = TokenIssuer::new(cfg.jwt_secret(), cfg.auth.token_ttl_secs);
    let state = AppState::new(store, tokens, cfg.rules.clone());

    let ip = cfg
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid server host: {}", cfg.server.host))?;
    let addr = SocketAddr::new(ip, cfg.port());

    api::serve(state, addr, shutdown_signal()).await?;

    info!("GreenCart shut down cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received."),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("greencart=info,tower_http=info"));

    let json_logging = std::env::var("GREENCART_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
